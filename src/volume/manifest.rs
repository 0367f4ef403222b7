// ABOUTME: Typed Pod manifest for the sync helper, serialised to JSON for kubectl apply
// ABOUTME: Only the fields the helper needs are modelled

use serde::Serialize;

use crate::config::VolumeSyncConfig;

const HOST_VOLUME: &str = "host-data";
const PVC_VOLUME: &str = "pvc";

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Pod {
    pub api_version: &'static str,
    pub kind: &'static str,
    pub metadata: ObjectMeta,
    pub spec: PodSpec,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,
    pub labels: std::collections::BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    pub containers: Vec<Container>,
    pub volumes: Vec<Volume>,
    pub restart_policy: &'static str,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub name: String,
    pub image: String,
    pub command: Vec<String>,
    pub security_context: SecurityContext,
    pub volume_mounts: Vec<VolumeMount>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SecurityContext {
    pub privileged: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeMount {
    pub name: String,
    pub mount_path: String,
    pub read_only: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_path: Option<HostPathSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistent_volume_claim: Option<ClaimSource>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HostPathSource {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClaimSource {
    pub claim_name: String,
}

/// Describe the helper pod for one sync run
///
/// The host path is mounted read-only and the claim read-write; the single
/// container just sleeps so commands can be exec'd into it. The pod runs
/// privileged because host paths are often owned by arbitrary UIDs.
pub fn helper_pod(
    name: &str,
    namespace: &str,
    pvc_name: &str,
    host_path: &str,
    config: &VolumeSyncConfig,
) -> Pod {
    let mut labels = std::collections::BTreeMap::new();
    labels.insert(
        "app.kubernetes.io/managed-by".to_string(),
        "kube-migrate".to_string(),
    );

    Pod {
        api_version: "v1",
        kind: "Pod",
        metadata: ObjectMeta {
            name: name.to_string(),
            namespace: namespace.to_string(),
            labels,
        },
        spec: PodSpec {
            containers: vec![Container {
                name: config.container.clone(),
                image: config.image.clone(),
                command: vec!["sleep".to_string(), config.sleep_seconds.to_string()],
                security_context: SecurityContext { privileged: true },
                volume_mounts: vec![
                    VolumeMount {
                        name: HOST_VOLUME.to_string(),
                        mount_path: config.host_mount.clone(),
                        read_only: true,
                    },
                    VolumeMount {
                        name: PVC_VOLUME.to_string(),
                        mount_path: config.pvc_mount.clone(),
                        read_only: false,
                    },
                ],
            }],
            volumes: vec![
                Volume {
                    name: HOST_VOLUME.to_string(),
                    host_path: Some(HostPathSource {
                        path: host_path.to_string(),
                        kind: "DirectoryOrCreate",
                    }),
                    persistent_volume_claim: None,
                },
                Volume {
                    name: PVC_VOLUME.to_string(),
                    host_path: None,
                    persistent_volume_claim: Some(ClaimSource {
                        claim_name: pvc_name.to_string(),
                    }),
                },
            ],
            restart_policy: "Never",
        },
    }
}
