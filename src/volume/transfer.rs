// ABOUTME: Bulk copy inside the helper pod: wipe the claim, then tar-pipe the host path in
// ABOUTME: Also provides the file-count and byte-total probes used around the copy

use anyhow::{Context, Result};

use crate::config::ExecutionTarget;
use crate::kube::{CommandRunner, Kubectl};

/// Shell script that replaces everything under `dest` with the contents of `source`
///
/// The wipe covers hidden entries (`.[!.]*` and `..?*`). The tar pipe
/// streams straight from one mount to the other, preserving metadata and
/// never staging a copy on the helper's own filesystem. Both ends of the
/// pipe are checked: the archive side records a failure in a status file
/// because `$?` only reports the extracting side.
pub fn bulk_copy_script(source: &str, dest: &str) -> String {
    format!(
        "rm -rf {dest}/* {dest}/..?* {dest}/.[!.]* 2>/dev/null || true\n\
         cd {source} || {{ echo \"Sync failed: cannot enter {source}\" >&2; exit 1; }}\n\
         create_status_file=$(mktemp) || exit 1\n\
         {{ tar -cf - . || echo \"$?\" > \"$create_status_file\"; }} | (cd {dest} && tar -xf -)\n\
         extract_status=$?\n\
         create_status=$(cat \"$create_status_file\")\n\
         rm -f \"$create_status_file\"\n\
         if [ -n \"$create_status\" ] || [ $extract_status -ne 0 ]; then echo \"Sync failed\" >&2; exit 1; fi\n\
         echo \"Sync completed successfully\"",
        source = source,
        dest = dest,
    )
}

/// Run the destructive copy from `source` to `dest` inside the helper
pub async fn bulk_copy<R: CommandRunner>(
    kubectl: &Kubectl<R>,
    helper: &ExecutionTarget,
    source: &str,
    dest: &str,
) -> Result<()> {
    tracing::info!("Syncing data using tar (this may take a while)...");

    let command = vec![
        "sh".to_string(),
        "-c".to_string(),
        bulk_copy_script(source, dest),
    ];
    kubectl
        .exec(helper, &command, None)
        .await
        .with_context(|| format!("Bulk copy from {} to {} failed in {}", source, dest, helper))?;

    tracing::info!("✓ Data sync completed");
    Ok(())
}

/// Number of regular files below `path`
pub async fn count_files<R: CommandRunner>(
    kubectl: &Kubectl<R>,
    helper: &ExecutionTarget,
    path: &str,
) -> Result<u64> {
    let command = vec![
        "sh".to_string(),
        "-c".to_string(),
        format!("find {} -type f | wc -l", path),
    ];
    let (stdout, _) = kubectl.exec(helper, &command, None).await?;
    parse_count(&stdout).with_context(|| format!("Unexpected file count output for {}", path))
}

/// Apparent size in bytes of everything below `path` (`du -sb`)
pub async fn total_bytes<R: CommandRunner>(
    kubectl: &Kubectl<R>,
    helper: &ExecutionTarget,
    path: &str,
) -> Result<u64> {
    let command = vec![
        "sh".to_string(),
        "-c".to_string(),
        format!("du -sb {} 2>/dev/null | cut -f1 || echo 0", path),
    ];
    let (stdout, _) = kubectl.exec(helper, &command, None).await?;
    parse_count(&stdout).with_context(|| format!("Unexpected size output for {}", path))
}

/// Parse a number printed by `wc -l` / `du`; blank output means zero
pub fn parse_count(output: &str) -> Result<u64> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    trimmed
        .parse::<u64>()
        .with_context(|| format!("'{}' is not a number", trimmed))
}
