// ABOUTME: Post-copy verification comparing file counts and byte totals of both mounts
// ABOUTME: Mismatches are reported, never fatal: the copy itself is authoritative

use anyhow::Result;

use super::transfer::{count_files, total_bytes};
use crate::config::ExecutionTarget;
use crate::kube::{CommandRunner, Kubectl};
use crate::utils::format_bytes;

/// Allowed byte-total drift between the two mounts (block-size rounding)
pub const SIZE_TOLERANCE_BYTES: u64 = 1024;

/// File count and byte total of one mount
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MountStats {
    pub file_count: u64,
    pub total_bytes: u64,
}

/// Side-by-side stats for the host path and the claim
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub host: MountStats,
    pub dest: MountStats,
}

impl SyncReport {
    pub fn counts_match(&self) -> bool {
        self.host.file_count == self.dest.file_count
    }

    pub fn size_difference(&self) -> u64 {
        self.host.total_bytes.abs_diff(self.dest.total_bytes)
    }

    pub fn sizes_match(&self) -> bool {
        self.size_difference() < SIZE_TOLERANCE_BYTES
    }

    /// Equal file counts and byte totals within [`SIZE_TOLERANCE_BYTES`]
    pub fn is_match(&self) -> bool {
        self.counts_match() && self.sizes_match()
    }
}

/// Collect [`MountStats`] for `path` inside the helper
pub async fn collect_stats<R: CommandRunner>(
    kubectl: &Kubectl<R>,
    helper: &ExecutionTarget,
    path: &str,
) -> Result<MountStats> {
    Ok(MountStats {
        file_count: count_files(kubectl, helper, path).await?,
        total_bytes: total_bytes(kubectl, helper, path).await?,
    })
}

/// Compare the host mount against the claim mount and log the outcome
///
/// Returns the report so callers can act on it; the probes themselves can
/// still fail, which the caller should also treat as a warning.
pub async fn verify_sync<R: CommandRunner>(
    kubectl: &Kubectl<R>,
    helper: &ExecutionTarget,
    host_mount: &str,
    pvc_mount: &str,
) -> Result<SyncReport> {
    tracing::info!("Verifying sync...");

    let report = SyncReport {
        host: collect_stats(kubectl, helper, host_mount).await?,
        dest: collect_stats(kubectl, helper, pvc_mount).await?,
    };

    tracing::info!(
        "Host path: {} files, {} bytes ({})",
        report.host.file_count,
        report.host.total_bytes,
        format_bytes(report.host.total_bytes)
    );
    tracing::info!(
        "PVC:       {} files, {} bytes ({})",
        report.dest.file_count,
        report.dest.total_bytes,
        format_bytes(report.dest.total_bytes)
    );

    if report.counts_match() {
        tracing::info!("✓ File counts match");
    } else {
        tracing::warn!(
            "⚠ File counts differ ({} vs {})",
            report.host.file_count,
            report.dest.file_count
        );
    }

    if report.sizes_match() {
        tracing::info!("✓ Total sizes match (within tolerance)");
    } else {
        tracing::warn!("⚠ Size difference: {} bytes", report.size_difference());
    }

    Ok(report)
}
