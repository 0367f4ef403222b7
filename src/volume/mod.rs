// ABOUTME: Volume sync building blocks: helper pod, bulk copy and verification
// ABOUTME: Sequenced by commands::sync_pvc

pub mod helper;
pub mod manifest;
pub mod transfer;
pub mod verify;

pub use helper::{helper_pod_name, HelperPod, Readiness};
pub use transfer::{bulk_copy, bulk_copy_script, count_files};
pub use verify::{verify_sync, MountStats, SyncReport, SIZE_TOLERANCE_BYTES};
