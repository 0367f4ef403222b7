// ABOUTME: Read-only probes run before any procedure mutates anything
// ABOUTME: Every probe answers a plain bool and treats a failed probe as "no"

use crate::config::ExecutionTarget;
use crate::kube::{CommandRunner, Kubectl};

/// Marker `kubectl get pod` prints in the STATUS column of a running pod
pub const RUNNING_MARKER: &str = "Running";

/// True iff the target pod exists and reports `Running`
pub async fn workload_running<R: CommandRunner>(
    kubectl: &Kubectl<R>,
    target: &ExecutionTarget,
) -> bool {
    match kubectl.get_pod(&target.pod, &target.namespace).await {
        Ok(stdout) => stdout.contains(RUNNING_MARKER),
        Err(e) => {
            tracing::debug!("Pod probe for {} failed: {:#}", target, e);
            false
        }
    }
}

/// SQL used to probe `pg_database` for a name
///
/// `db_name` must already have passed identifier validation.
pub fn database_exists_query(db_name: &str) -> String {
    format!(
        "SELECT 1 FROM pg_database WHERE datname='{}'",
        db_name.replace('\'', "''")
    )
}

/// True iff `db_name` is listed in the server's `pg_database` catalog
///
/// Fail-closed: when the probe itself fails (bad role, psql missing,
/// connection refused) the database is reported as absent rather than the
/// error being raised.
pub async fn database_exists<R: CommandRunner>(
    kubectl: &Kubectl<R>,
    target: &ExecutionTarget,
    db_name: &str,
    role: &str,
) -> bool {
    let command = vec![
        "psql".to_string(),
        "-U".to_string(),
        role.to_string(),
        "-tAc".to_string(),
        database_exists_query(db_name),
    ];

    match kubectl.exec(target, &command, None).await {
        Ok((stdout, _)) => stdout.trim() == "1",
        Err(e) => {
            tracing::debug!(
                "Database probe for '{}' as role '{}' on {} failed: {:#}",
                db_name,
                role,
                target,
                e
            );
            false
        }
    }
}

/// True iff `kubectl get pvc` finds the claim
pub async fn volume_claim_exists<R: CommandRunner>(
    kubectl: &Kubectl<R>,
    name: &str,
    namespace: &str,
) -> bool {
    kubectl.get_pvc(name, namespace).await.is_ok()
}

/// True iff `path` is a directory inside the target container
pub async fn directory_accessible<R: CommandRunner>(
    kubectl: &Kubectl<R>,
    target: &ExecutionTarget,
    path: &str,
) -> bool {
    let command = vec!["test".to_string(), "-d".to_string(), path.to_string()];
    kubectl.exec(target, &command, None).await.is_ok()
}
