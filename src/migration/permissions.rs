// ABOUTME: Post-restore permission repair for the application role
// ABOUTME: Re-grants what --no-owner/--no-acl left out, idempotent and best-effort

use anyhow::{Context, Result};

use crate::config::ExecutionTarget;
use crate::kube::{CommandRunner, Kubectl};

/// Schemas that belong to PostgreSQL itself and are never touched
pub const SYSTEM_SCHEMAS: &[&str] = &[
    "pg_catalog",
    "information_schema",
    "pg_toast",
    "pg_toast_temp_1",
];

/// Build the `DO` block that hands every user schema to `owner_role`
///
/// For each non-system schema: usage and create, all privileges on existing
/// tables and sequences, default privileges for future ones, and ownership
/// (except `public`, which stays with the server's owner). Finishes with
/// connect on the database itself. Both names must already be validated
/// identifiers.
pub fn permission_script(db_name: &str, owner_role: &str) -> String {
    let excluded = SYSTEM_SCHEMAS
        .iter()
        .map(|s| format!("'{}'", s))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"DO $$
DECLARE
    schema_rec RECORD;
BEGIN
    FOR schema_rec IN
        SELECT nspname FROM pg_namespace WHERE nspname NOT IN ({excluded})
    LOOP
        EXECUTE format('GRANT USAGE ON SCHEMA %I TO %I', schema_rec.nspname, '{role}');
        EXECUTE format('GRANT CREATE ON SCHEMA %I TO %I', schema_rec.nspname, '{role}');
        EXECUTE format('GRANT ALL PRIVILEGES ON ALL TABLES IN SCHEMA %I TO %I', schema_rec.nspname, '{role}');
        EXECUTE format('GRANT ALL PRIVILEGES ON ALL SEQUENCES IN SCHEMA %I TO %I', schema_rec.nspname, '{role}');
        EXECUTE format('ALTER DEFAULT PRIVILEGES IN SCHEMA %I GRANT ALL ON TABLES TO %I', schema_rec.nspname, '{role}');
        EXECUTE format('ALTER DEFAULT PRIVILEGES IN SCHEMA %I GRANT ALL ON SEQUENCES TO %I', schema_rec.nspname, '{role}');
        IF schema_rec.nspname != 'public' THEN
            EXECUTE format('ALTER SCHEMA %I OWNER TO %I', schema_rec.nspname, '{role}');
        END IF;
    END LOOP;

    EXECUTE format('GRANT CONNECT ON DATABASE %I TO %I', '{db}', '{role}');
END $$;"#,
        excluded = excluded,
        role = owner_role,
        db = db_name,
    )
}

/// Run the permission repair script on the destination
///
/// Callers treat a failure as a warning: the data is already restored and
/// grants can be fixed by hand.
pub async fn fix_permissions<R: CommandRunner>(
    kubectl: &Kubectl<R>,
    destination: &ExecutionTarget,
    db_name: &str,
    owner_role: &str,
    admin_role: &str,
) -> Result<()> {
    tracing::info!(
        "Fixing permissions for role '{}' on database '{}'...",
        owner_role,
        db_name
    );

    let command = vec![
        "psql".to_string(),
        "-U".to_string(),
        admin_role.to_string(),
        "-d".to_string(),
        db_name.to_string(),
        "-tAc".to_string(),
        permission_script(db_name, owner_role),
    ];

    kubectl
        .exec(destination, &command, None)
        .await
        .with_context(|| {
            format!(
                "Permission repair for role '{}' on database '{}' failed",
                owner_role, db_name
            )
        })?;

    tracing::info!("✓ Fixed permissions for role '{}'", owner_role);
    Ok(())
}
