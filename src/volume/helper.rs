// ABOUTME: Lifecycle of the ephemeral helper pod: create, wait until Running, delete
// ABOUTME: Readiness polling is bounded and reports a tri-state instead of erroring

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant, SystemTime};

use crate::config::{ExecutionTarget, VolumeSyncConfig};
use crate::kube::{CommandRunner, Kubectl};
use crate::volume::manifest;

/// Outcome of waiting for the helper pod
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    Failed,
    TimedOut,
}

/// Name for the helper pod of one run
///
/// Derived from the claim name and the start time so a leftover from an
/// earlier failed run never collides with the new one.
pub fn helper_pod_name(pvc_name: &str, unix_secs: u64) -> String {
    format!("pvc-sync-{}-{}", pvc_name, unix_secs)
}

/// Helper pod bound to one claim and one host path
#[derive(Debug, Clone)]
pub struct HelperPod {
    pub name: String,
    pub namespace: String,
    pub container: String,
}

impl HelperPod {
    /// Allocate a unique name for a helper in `namespace`
    pub fn for_claim(pvc_name: &str, namespace: &str, config: &VolumeSyncConfig) -> Self {
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self {
            name: helper_pod_name(pvc_name, now),
            namespace: namespace.to_string(),
            container: config.container.clone(),
        }
    }

    /// Where commands inside the helper run
    pub fn target(&self) -> ExecutionTarget {
        ExecutionTarget::new(&self.name, &self.namespace, &self.container)
    }

    /// Submit the helper pod manifest
    pub async fn create<R: CommandRunner>(
        &self,
        kubectl: &Kubectl<R>,
        pvc_name: &str,
        host_path: &str,
        config: &VolumeSyncConfig,
    ) -> Result<()> {
        tracing::info!("Creating temporary pod '{}'...", self.name);

        let pod = manifest::helper_pod(&self.name, &self.namespace, pvc_name, host_path, config);
        let manifest = serde_json::to_string_pretty(&pod)
            .context("Failed to serialize helper pod manifest")?;

        kubectl.apply(&manifest).await.with_context(|| {
            format!(
                "Failed to create helper pod '{}' in namespace '{}'",
                self.name, self.namespace
            )
        })?;
        Ok(())
    }

    /// Poll the pod phase until it is Running, Failed, or `timeout` elapses
    ///
    /// A failed status query is treated like "not ready yet": the pod may not
    /// be visible to the API server immediately after apply.
    pub async fn await_ready<R: CommandRunner>(
        &self,
        kubectl: &Kubectl<R>,
        timeout: Duration,
        interval: Duration,
    ) -> Readiness {
        tracing::info!("Waiting for pod '{}' to be ready...", self.name);

        let spinner = ProgressBar::new_spinner();
        spinner.set_style(ProgressStyle::default_spinner());
        spinner.enable_steady_tick(Duration::from_millis(120));

        // a timeout too large to represent means no deadline
        let deadline = Instant::now().checked_add(timeout);
        let readiness = loop {
            match kubectl.pod_phase(&self.name, &self.namespace).await {
                Ok(phase) if phase == "Running" => break Readiness::Ready,
                Ok(phase) if phase == "Failed" => break Readiness::Failed,
                Ok(phase) => spinner.set_message(format!("pod phase: {}", phase)),
                Err(e) => tracing::debug!("Phase query for '{}' failed: {:#}", self.name, e),
            }

            let pause = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break Readiness::TimedOut;
                    }
                    interval.min(deadline - now)
                }
                None => interval,
            };
            tokio::time::sleep(pause).await;
        };

        spinner.finish_and_clear();
        match readiness {
            Readiness::Ready => tracing::info!("✓ Pod '{}' is ready", self.name),
            Readiness::Failed => tracing::error!("Pod '{}' failed to start", self.name),
            Readiness::TimedOut => tracing::error!(
                "Pod '{}' did not become ready within {} seconds",
                self.name,
                timeout.as_secs()
            ),
        }
        readiness
    }

    /// Delete the helper pod
    ///
    /// Best-effort and safe to repeat: an already-deleted pod is fine, and a
    /// failure is only logged.
    pub async fn teardown<R: CommandRunner>(&self, kubectl: &Kubectl<R>) {
        tracing::info!("Deleting temporary pod '{}'...", self.name);
        match kubectl.delete_pod(&self.name, &self.namespace).await {
            Ok(()) => tracing::info!("✓ Pod '{}' deleted", self.name),
            Err(e) => tracing::warn!(
                "⚠ Failed to delete pod '{}' in namespace '{}': {:#}",
                self.name,
                self.namespace,
                e
            ),
        }
    }
}
