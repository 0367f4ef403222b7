// ABOUTME: Explicit configuration for both procedures, no process-wide globals
// ABOUTME: Built-in defaults plus optional TOML overrides loaded by the entry point

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::time::Duration;

/// Upper bound for `ready_timeout_secs` (one day)
pub const MAX_READY_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Where a remote command runs: a pod, its namespace and one of its containers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionTarget {
    pub pod: String,
    pub namespace: String,
    pub container: String,
}

impl ExecutionTarget {
    pub fn new(
        pod: impl Into<String>,
        namespace: impl Into<String>,
        container: impl Into<String>,
    ) -> Self {
        Self {
            pod: pod.into(),
            namespace: namespace.into(),
            container: container.into(),
        }
    }
}

impl fmt::Display for ExecutionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pod '{}' (namespace '{}', container '{}')",
            self.pod, self.namespace, self.container
        )
    }
}

/// Settings for the database migration procedure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseMigrationConfig {
    /// Pod running the old PostgreSQL server
    pub source: ExecutionTarget,
    /// Pod running the new PostgreSQL server
    pub destination: ExecutionTarget,
    /// Role used for catalog probes and pg_dump on the source
    pub source_user: String,
    /// Role used for catalog probes, pg_restore and grants on the destination
    pub dest_user: String,
    /// Path inside the destination container where the dump is staged
    pub remote_dump_path: String,
}

impl Default for DatabaseMigrationConfig {
    fn default() -> Self {
        Self {
            source: ExecutionTarget::new(
                "prod-postgres-cluster-0",
                "homelab",
                "prod-postgres-cluster",
            ),
            destination: ExecutionTarget::new("postgres-statefulset-0", "shared", "postgres"),
            source_user: "homelab".to_string(),
            dest_user: "postgres".to_string(),
            remote_dump_path: "/tmp/dump.dump".to_string(),
        }
    }
}

/// Settings for the helper pod used by the volume sync procedure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeSyncConfig {
    pub image: String,
    pub container: String,
    /// Mount point of the node host path inside the helper
    pub host_mount: String,
    /// Mount point of the claim inside the helper
    pub pvc_mount: String,
    /// Lifetime of the placeholder `sleep` process
    pub sleep_seconds: u64,
    pub ready_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for VolumeSyncConfig {
    fn default() -> Self {
        Self {
            image: "busybox:latest".to_string(),
            container: "sync".to_string(),
            host_mount: "/host-data".to_string(),
            pvc_mount: "/pvc-data".to_string(),
            sleep_seconds: 3600,
            ready_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(2),
        }
    }
}

/// Fully resolved configuration handed to the procedures
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub database: DatabaseMigrationConfig,
    pub volume: VolumeSyncConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    database: DatabaseSection,
    #[serde(default)]
    volume: VolumeSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DatabaseSection {
    source: Option<TargetSection>,
    destination: Option<TargetSection>,
    source_user: Option<String>,
    dest_user: Option<String>,
    remote_dump_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TargetSection {
    pod: Option<String>,
    namespace: Option<String>,
    container: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct VolumeSection {
    image: Option<String>,
    container: Option<String>,
    host_mount: Option<String>,
    pvc_mount: Option<String>,
    sleep_seconds: Option<u64>,
    ready_timeout_secs: Option<u64>,
    poll_interval_secs: Option<u64>,
}

impl TargetSection {
    fn apply(self, target: &mut ExecutionTarget) {
        if let Some(pod) = self.pod {
            target.pod = pod;
        }
        if let Some(namespace) = self.namespace {
            target.namespace = namespace;
        }
        if let Some(container) = self.container {
            target.container = container;
        }
    }
}

/// Load configuration from an optional TOML file
///
/// Every key is optional; anything not present keeps its built-in default.
///
/// ```toml
/// [database.source]
/// pod = "old-postgres-0"
/// namespace = "legacy"
///
/// [database]
/// dest_user = "admin"
///
/// [volume]
/// image = "alpine:3.20"
/// ready_timeout_secs = 120
/// ```
pub fn load_config(path: Option<&str>) -> Result<Config> {
    let mut config = Config::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path))?;
    let parsed: ConfigFile =
        toml::from_str(&raw).with_context(|| format!("Failed to parse TOML config at {}", path))?;

    let db = parsed.database;
    if let Some(source) = db.source {
        source.apply(&mut config.database.source);
    }
    if let Some(destination) = db.destination {
        destination.apply(&mut config.database.destination);
    }
    if let Some(user) = db.source_user {
        config.database.source_user = user;
    }
    if let Some(user) = db.dest_user {
        config.database.dest_user = user;
    }
    if let Some(dump_path) = db.remote_dump_path {
        config.database.remote_dump_path = dump_path;
    }

    let vol = parsed.volume;
    if let Some(image) = vol.image {
        config.volume.image = image;
    }
    if let Some(container) = vol.container {
        config.volume.container = container;
    }
    if let Some(mount) = vol.host_mount {
        config.volume.host_mount = mount;
    }
    if let Some(mount) = vol.pvc_mount {
        config.volume.pvc_mount = mount;
    }
    if let Some(secs) = vol.sleep_seconds {
        config.volume.sleep_seconds = secs;
    }
    if let Some(secs) = vol.ready_timeout_secs {
        if secs == 0 || secs > MAX_READY_TIMEOUT_SECS {
            bail!(
                "Invalid ready_timeout_secs {} in {}: must be between 1 and {}",
                secs,
                path,
                MAX_READY_TIMEOUT_SECS
            );
        }
        config.volume.ready_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = vol.poll_interval_secs {
        if secs == 0 {
            bail!("Invalid poll_interval_secs 0 in {}: must be at least 1", path);
        }
        config.volume.poll_interval = Duration::from_secs(secs);
    }

    tracing::debug!("Loaded configuration from {}", path);
    Ok(config)
}
