// ABOUTME: Database migration procedure: validate, dump, stage, restore, re-grant
// ABOUTME: Linear and abort-on-failure; staged files are cleaned up on every exit path

use anyhow::{bail, Context, Result};

use crate::config::DatabaseMigrationConfig;
use crate::errors::MigrateError;
use crate::interrupt::InterruptSignal;
use crate::kube::{CommandRunner, Kubectl};
use crate::migration::{self, RestoreOptions};
use crate::preconditions;
use crate::utils::validate_postgres_identifier;

/// What to migrate, as given on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrateDbOptions {
    pub source_db: String,
    pub dest_db: String,
    /// Role on the source server
    pub source_user: String,
    /// Administrative role on the destination server
    pub dest_user: String,
    /// Drop existing destination objects before restoring
    pub clean: bool,
    /// Role that receives grants afterwards; defaults to the destination database name
    pub owner_role: Option<String>,
}

impl MigrateDbOptions {
    /// Options using the configured default roles
    pub fn new(
        source_db: impl Into<String>,
        dest_db: impl Into<String>,
        config: &DatabaseMigrationConfig,
    ) -> Self {
        Self {
            source_db: source_db.into(),
            dest_db: dest_db.into(),
            source_user: config.source_user.clone(),
            dest_user: config.dest_user.clone(),
            clean: false,
            owner_role: None,
        }
    }

    pub fn owner_role(&self) -> &str {
        self.owner_role.as_deref().unwrap_or(&self.dest_db)
    }
}

/// Migrate one database from the source server pod to the destination pod
///
/// Steps run in a fixed order and any failure before the restore aborts
/// without touching the destination. The permission repair at the end is
/// best-effort: its failure is logged and the migration still succeeds.
///
/// # Errors
///
/// Returns an error if either pod is not running, either database is
/// missing, the dump is empty or fails, the copy or restore fails, or the
/// operator interrupts ([`MigrateError::Interrupted`]).
pub async fn migrate_db<R: CommandRunner>(
    kubectl: &Kubectl<R>,
    config: &DatabaseMigrationConfig,
    options: &MigrateDbOptions,
    interrupt: &InterruptSignal,
) -> Result<()> {
    validate_options(options)?;

    let source = &config.source;
    let destination = &config.destination;

    tracing::info!("========================================");
    tracing::info!("PostgreSQL Database Migration");
    tracing::info!("========================================");
    tracing::info!(
        "Source: {} ({}) - Database: {}",
        source.pod,
        source.namespace,
        options.source_db
    );
    tracing::info!(
        "Destination: {} ({}) - Database: {}",
        destination.pod,
        destination.namespace,
        options.dest_db
    );
    tracing::info!("========================================");

    // Step 1: both server pods must be up
    tracing::info!("Checking source pod...");
    if !interrupt
        .guard(preconditions::workload_running(kubectl, source))
        .await?
    {
        bail!(
            "Source pod '{}' not found or not running in namespace '{}'",
            source.pod,
            source.namespace
        );
    }
    tracing::info!("✓ Source pod '{}' is running", source.pod);

    tracing::info!("Checking destination pod...");
    if !interrupt
        .guard(preconditions::workload_running(kubectl, destination))
        .await?
    {
        bail!(
            "Destination pod '{}' not found or not running in namespace '{}'",
            destination.pod,
            destination.namespace
        );
    }
    tracing::info!("✓ Destination pod '{}' is running", destination.pod);

    // Step 2: source database
    tracing::info!(
        "Checking if source database '{}' exists...",
        options.source_db
    );
    let source_exists = interrupt
        .guard(preconditions::database_exists(
            kubectl,
            source,
            &options.source_db,
            &options.source_user,
        ))
        .await?;
    if !source_exists {
        bail!(
            "Source database '{}' does not exist on pod '{}' (namespace '{}', checked as role '{}')",
            options.source_db,
            source.pod,
            source.namespace,
            options.source_user
        );
    }
    tracing::info!("✓ Source database '{}' exists", options.source_db);

    // Step 3: destination database, which this tool never creates
    tracing::info!(
        "Checking if destination database '{}' exists...",
        options.dest_db
    );
    let dest_exists = interrupt
        .guard(preconditions::database_exists(
            kubectl,
            destination,
            &options.dest_db,
            &options.dest_user,
        ))
        .await?;
    if !dest_exists {
        bail!(
            "Destination database '{}' does not exist on pod '{}' (namespace '{}', checked as role '{}'). \
             Please create it first.",
            options.dest_db,
            destination.pod,
            destination.namespace,
            options.dest_user
        );
    }
    tracing::info!("✓ Destination database '{}' exists", options.dest_db);

    // Step 4: dump
    let payload = interrupt
        .run(migration::dump_database(
            kubectl,
            source,
            &options.source_db,
            &options.source_user,
        ))
        .await?;

    // Step 5-6: stage and restore; the staged archive is removed either way
    transfer_and_restore(kubectl, config, options, &payload, interrupt).await?;

    // Step 7: permissions
    let owner_role = options.owner_role();
    if options.owner_role.is_none() {
        tracing::info!(
            "Granting to role '{}' (assumed to match the database name; use --owner-role to override)",
            owner_role
        );
    }
    let fixed = interrupt
        .run(migration::fix_permissions(
            kubectl,
            destination,
            &options.dest_db,
            owner_role,
            &options.dest_user,
        ))
        .await;
    match fixed {
        Ok(()) => {}
        Err(e) if MigrateError::is_interrupted(&e) => return Err(e),
        Err(e) => {
            tracing::warn!(
                "⚠ Could not fix all permissions automatically. You may need to fix them manually."
            );
            tracing::warn!("  Error: {:#}", e);
        }
    }

    tracing::info!("========================================");
    tracing::info!("✓ Migration completed successfully!");
    tracing::info!("========================================");
    Ok(())
}

async fn transfer_and_restore<R: CommandRunner>(
    kubectl: &Kubectl<R>,
    config: &DatabaseMigrationConfig,
    options: &MigrateDbOptions,
    payload: &[u8],
    interrupt: &InterruptSignal,
) -> Result<()> {
    let destination = &config.destination;
    let remote_path = config.remote_dump_path.as_str();

    let outcome: Result<()> = async {
        interrupt
            .run(migration::stage_dump(kubectl, destination, payload, remote_path))
            .await?;
        interrupt
            .run(migration::restore_database(
                kubectl,
                destination,
                &options.dest_db,
                &options.dest_user,
                remote_path,
                RestoreOptions {
                    clean: options.clean,
                },
            ))
            .await
    }
    .await;

    migration::remove_remote_dump(kubectl, destination, remote_path).await;
    outcome
}

fn validate_options(options: &MigrateDbOptions) -> Result<()> {
    validate_postgres_identifier(&options.source_db).context("Invalid source database name")?;
    validate_postgres_identifier(&options.dest_db).context("Invalid destination database name")?;
    validate_postgres_identifier(&options.source_user).context("Invalid --source-user")?;
    validate_postgres_identifier(&options.dest_user).context("Invalid --dest-user")?;
    if let Some(role) = &options.owner_role {
        validate_postgres_identifier(role).context("Invalid --owner-role")?;
    }
    Ok(())
}
