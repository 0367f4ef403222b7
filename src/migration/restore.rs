// ABOUTME: Moves a dump into the destination pod and runs pg_restore against it
// ABOUTME: Local and remote staging files are removed whatever the outcome

use anyhow::{Context, Result};
use std::io::Write;

use crate::config::ExecutionTarget;
use crate::kube::{CommandRunner, Kubectl};

/// Options that change what pg_restore does to the destination
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreOptions {
    /// Drop existing objects before recreating them (`--clean`)
    pub clean: bool,
}

/// pg_restore invocation for a staged archive
///
/// Ownership and ACL restoration are always suppressed because the source
/// and destination servers use different role accounts. `--clean` is added
/// only when requested.
pub fn restore_command(
    db_name: &str,
    role: &str,
    archive_path: &str,
    options: RestoreOptions,
) -> Vec<String> {
    let mut cmd = vec![
        "pg_restore".to_string(),
        "-U".to_string(),
        role.to_string(),
        "-d".to_string(),
        db_name.to_string(),
        "-v".to_string(),
        "--no-owner".to_string(),
        "--no-acl".to_string(),
    ];
    if options.clean {
        cmd.push("--clean".to_string());
    }
    cmd.push(archive_path.to_string());
    cmd
}

/// Copy `payload` into the destination container at `remote_path`
///
/// The bytes go through a local temporary file and `kubectl cp`. The
/// temporary file is deleted when this function returns or its future is
/// dropped.
pub async fn stage_dump<R: CommandRunner>(
    kubectl: &Kubectl<R>,
    destination: &ExecutionTarget,
    payload: &[u8],
    remote_path: &str,
) -> Result<()> {
    let mut local = tempfile::Builder::new()
        .prefix("kube-migrate-")
        .suffix(".dump")
        .tempfile()
        .context("Failed to create local temporary file for the dump")?;
    local
        .write_all(payload)
        .and_then(|_| local.flush())
        .with_context(|| {
            format!(
                "Failed to write dump to temporary file {}",
                local.path().display()
            )
        })?;

    tracing::info!("Copying dump file to destination pod...");
    kubectl
        .copy_to(destination, local.path(), remote_path)
        .await
        .with_context(|| format!("Failed to copy dump to {} at {}", destination, remote_path))?;
    tracing::info!("✓ Dump file copied to {}", remote_path);

    if let Err(e) = local.close() {
        tracing::warn!("⚠ Failed to remove local temporary dump file: {}", e);
    }
    Ok(())
}

/// Run pg_restore against the staged archive
///
/// Without `--clean`, objects that already exist in the destination make
/// pg_restore report errors; those are returned to the caller, not hidden.
pub async fn restore_database<R: CommandRunner>(
    kubectl: &Kubectl<R>,
    destination: &ExecutionTarget,
    db_name: &str,
    role: &str,
    remote_path: &str,
    options: RestoreOptions,
) -> Result<()> {
    tracing::info!("Restoring database '{}' to destination server...", db_name);
    if options.clean {
        tracing::warn!(
            "⚠ Using --clean: all existing objects in destination database '{}' will be dropped",
            db_name
        );
    }

    kubectl
        .exec(
            destination,
            &restore_command(db_name, role, remote_path, options),
            None,
        )
        .await
        .with_context(|| {
            format!(
                "pg_restore failed for database '{}' as role '{}' on {}",
                db_name, role, destination
            )
        })?;

    tracing::info!("✓ Restored database '{}'", db_name);
    Ok(())
}

/// Delete the staged archive from the destination container
///
/// Best-effort: a failure is logged and never replaces the primary outcome.
pub async fn remove_remote_dump<R: CommandRunner>(
    kubectl: &Kubectl<R>,
    destination: &ExecutionTarget,
    remote_path: &str,
) {
    let command = vec!["rm".to_string(), "-f".to_string(), remote_path.to_string()];
    match kubectl.exec(destination, &command, None).await {
        Ok(_) => tracing::debug!("Removed remote dump file {}", remote_path),
        Err(e) => tracing::warn!(
            "⚠ Failed to remove remote dump file {} on {}: {:#}",
            remote_path,
            destination,
            e
        ),
    }
}
