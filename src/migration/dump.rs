// ABOUTME: Wrapper for pg_dump run inside the source pod
// ABOUTME: Captures a custom-format archive as raw bytes and rejects empty dumps

use anyhow::{bail, Context, Result};

use crate::config::ExecutionTarget;
use crate::kube::{CommandRunner, Kubectl};
use crate::utils::format_bytes;

/// pg_dump invocation producing a custom-format (`-F c`) archive on stdout
pub fn dump_command(db_name: &str, role: &str) -> Vec<String> {
    vec![
        "pg_dump".to_string(),
        "-U".to_string(),
        role.to_string(),
        "-F".to_string(),
        "c".to_string(),
        db_name.to_string(),
    ]
}

/// Dump `db_name` from the source pod
///
/// The archive is streamed back through `kubectl exec` stdout and never
/// decoded as text.
///
/// # Errors
///
/// Returns an error if pg_dump exits non-zero, or if it exits zero but
/// produced no bytes.
pub async fn dump_database<R: CommandRunner>(
    kubectl: &Kubectl<R>,
    source: &ExecutionTarget,
    db_name: &str,
    role: &str,
) -> Result<Vec<u8>> {
    tracing::info!("Dumping database '{}' from source server...", db_name);

    let (payload, stderr) = kubectl
        .exec_binary(source, &dump_command(db_name, role), None)
        .await
        .with_context(|| {
            format!(
                "pg_dump failed for database '{}' as role '{}' on {}",
                db_name, role, source
            )
        })?;

    if payload.is_empty() {
        bail!(
            "Failed to dump database '{}': dump is empty.\n\
             pg_dump stderr: {}",
            db_name,
            stderr.trim()
        );
    }

    tracing::info!(
        "✓ Dumped database '{}' ({} bytes, {})",
        db_name,
        payload.len(),
        format_bytes(payload.len() as u64)
    );
    Ok(payload)
}
