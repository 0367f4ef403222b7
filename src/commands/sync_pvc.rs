// ABOUTME: Volume sync procedure: copy a node host path into a PVC via a helper pod
// ABOUTME: The helper pod is deleted on every exit path once it has been submitted

use anyhow::{bail, Result};

use crate::config::VolumeSyncConfig;
use crate::errors::MigrateError;
use crate::interrupt::InterruptSignal;
use crate::kube::{CommandRunner, Kubectl};
use crate::preconditions;
use crate::utils::normalize_host_path;
use crate::volume::{self, HelperPod, Readiness, SyncReport};

/// What to sync, as given on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPvcOptions {
    pub pvc_name: String,
    pub namespace: String,
    /// Directory on the Kubernetes node (not on this machine)
    pub host_path: String,
    pub verify: bool,
    pub dry_run: bool,
}

/// How a sync run ended when it did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Only the claim was checked
    DryRun,
    /// Data copied; `report` is present when verification ran and succeeded
    Synced { report: Option<SyncReport> },
}

/// Replace the contents of a PVC with a directory from the node's filesystem
///
/// A privileged helper pod mounts both the host path and the claim, and the
/// copy runs inside it. Everything already in the claim is deleted first;
/// there is no non-destructive mode. Verification, when requested, only
/// produces warnings.
///
/// # Errors
///
/// Returns an error if the claim does not exist, the helper pod cannot be
/// created or does not reach `Running` in time, the host path is not a
/// directory, the copy fails, or the operator interrupts.
pub async fn sync_pvc<R: CommandRunner>(
    kubectl: &Kubectl<R>,
    config: &VolumeSyncConfig,
    options: &SyncPvcOptions,
    interrupt: &InterruptSignal,
) -> Result<SyncOutcome> {
    let host_path = normalize_host_path(&options.host_path)?;

    tracing::info!("========================================");
    tracing::info!("PVC Sync from Kubernetes Node Host Path");
    tracing::info!("========================================");
    tracing::info!("PVC: {}", options.pvc_name);
    tracing::info!("Namespace: {}", options.namespace);
    tracing::info!("Host Path (on K8s node): {}", host_path);
    tracing::info!("========================================");

    let claim_exists = interrupt
        .guard(preconditions::volume_claim_exists(
            kubectl,
            &options.pvc_name,
            &options.namespace,
        ))
        .await?;
    if !claim_exists {
        bail!(
            "PVC '{}' not found in namespace '{}'",
            options.pvc_name,
            options.namespace
        );
    }
    tracing::info!("✓ PVC '{}' exists", options.pvc_name);
    tracing::info!(
        "✓ Will check host path '{}' once pod is created",
        host_path
    );

    if options.dry_run {
        tracing::info!("DRY RUN: Would sync data from Kubernetes node host path to PVC");
        tracing::info!("Remove --dry-run to perform actual sync");
        return Ok(SyncOutcome::DryRun);
    }

    let helper = HelperPod::for_claim(&options.pvc_name, &options.namespace, config);
    let outcome = sync_with_helper(kubectl, config, options, &host_path, &helper, interrupt).await;
    helper.teardown(kubectl).await;

    if outcome.is_ok() {
        tracing::info!("========================================");
        tracing::info!("✓ Sync completed successfully!");
        tracing::info!("========================================");
    }
    outcome
}

async fn sync_with_helper<R: CommandRunner>(
    kubectl: &Kubectl<R>,
    config: &VolumeSyncConfig,
    options: &SyncPvcOptions,
    host_path: &str,
    helper: &HelperPod,
    interrupt: &InterruptSignal,
) -> Result<SyncOutcome> {
    interrupt
        .run(helper.create(kubectl, &options.pvc_name, host_path, config))
        .await?;

    let readiness = interrupt
        .guard(helper.await_ready(kubectl, config.ready_timeout, config.poll_interval))
        .await?;
    match readiness {
        Readiness::Ready => {}
        Readiness::Failed => bail!(
            "Helper pod '{}' failed to start in namespace '{}'",
            helper.name,
            helper.namespace
        ),
        Readiness::TimedOut => bail!(
            "Helper pod '{}' did not become ready within {} seconds in namespace '{}'",
            helper.name,
            config.ready_timeout.as_secs(),
            helper.namespace
        ),
    }

    let target = helper.target();
    tracing::info!(
        "Syncing data from host path '{}' (mounted at {}) to PVC (mounted at {})...",
        host_path,
        config.host_mount,
        config.pvc_mount
    );

    tracing::info!("Verifying host path is accessible in pod...");
    let accessible = interrupt
        .guard(preconditions::directory_accessible(
            kubectl,
            &target,
            &config.host_mount,
        ))
        .await?;
    if !accessible {
        bail!(
            "Host path '{}' is not accessible in pod '{}' (expected a directory at {})",
            host_path,
            helper.name,
            config.host_mount
        );
    }
    tracing::info!("✓ Host path is accessible");

    match interrupt
        .run(volume::count_files(kubectl, &target, &config.host_mount))
        .await
    {
        Ok(0) => tracing::warn!("⚠ Host path appears to be empty"),
        Ok(count) => tracing::info!("Found {} files in host path", count),
        Err(e) if MigrateError::is_interrupted(&e) => return Err(e),
        Err(e) => tracing::debug!("Could not count files in host path: {:#}", e),
    }

    interrupt
        .run(volume::bulk_copy(
            kubectl,
            &target,
            &config.host_mount,
            &config.pvc_mount,
        ))
        .await?;

    if !options.verify {
        return Ok(SyncOutcome::Synced { report: None });
    }

    let verified = interrupt
        .run(volume::verify_sync(
            kubectl,
            &target,
            &config.host_mount,
            &config.pvc_mount,
        ))
        .await;
    let report = match verified {
        Ok(report) => {
            if !report.is_match() {
                tracing::warn!(
                    "⚠ Verification found differences; the copy itself reported success"
                );
            }
            Some(report)
        }
        Err(e) if MigrateError::is_interrupted(&e) => return Err(e),
        Err(e) => {
            tracing::warn!("⚠ Could not verify sync: {:#}", e);
            None
        }
    };

    Ok(SyncOutcome::Synced { report })
}
