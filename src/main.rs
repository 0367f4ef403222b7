// ABOUTME: CLI entry point for kube-migrate
// ABOUTME: Parses commands, supplies configuration defaults and maps outcomes to exit codes

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::{theme::ColorfulTheme, Confirm};
use kube_migrate::commands::{self, MigrateDbOptions, SyncPvcOptions};
use kube_migrate::config::{self, Config};
use kube_migrate::errors::MigrateError;
use kube_migrate::interrupt::InterruptSignal;
use kube_migrate::kube::{Kubectl, SystemRunner};
use kube_migrate::utils;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "kube-migrate")]
#[command(
    about = "Move PostgreSQL databases and node host paths into Kubernetes",
    long_about = None
)]
struct Cli {
    /// TOML file overriding pod names, namespaces, roles and helper settings
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate a database between PostgreSQL server pods with pg_dump/pg_restore
    MigrateDb {
        /// Name of the database on the source server
        source_db: String,
        /// Name of the (already created) database on the destination server
        dest_db: String,
        /// PostgreSQL role for the source server [default: homelab]
        #[arg(long)]
        source_user: Option<String>,
        /// PostgreSQL role for the destination server [default: postgres]
        #[arg(long)]
        dest_user: Option<String>,
        /// Drop existing objects before restoring (DELETES all existing data in the destination database)
        #[arg(long)]
        clean: bool,
        /// Role that receives grants after the restore [default: the destination database name]
        #[arg(long)]
        owner_role: Option<String>,
        /// Skip the confirmation prompt for --clean
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Replace the contents of a PVC with a directory from a Kubernetes node
    SyncPvc {
        /// Name of the PVC to sync to
        pvc_name: String,
        /// Namespace where the PVC exists
        namespace: String,
        /// Host path on the Kubernetes node to sync from (source of truth)
        host_path: String,
        /// Verify sync by comparing file counts and sizes
        #[arg(long)]
        verify: bool,
        /// Only check that the PVC exists
        #[arg(long)]
        dry_run: bool,
        /// Skip the confirmation prompt before wiping the PVC
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging - default to INFO level if RUST_LOG not set
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if MigrateError::is_interrupted(&e) => {
            tracing::error!("Interrupted by user.");
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!("ERROR: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config: Config = config::load_config(cli.config.as_deref())?;
    utils::check_required_tools()?;

    let kubectl = Kubectl::new(SystemRunner);

    match cli.command {
        Commands::MigrateDb {
            source_db,
            dest_db,
            source_user,
            dest_user,
            clean,
            owner_role,
            yes,
        } => {
            let mut options = MigrateDbOptions::new(source_db, dest_db, &config.database);
            if let Some(user) = source_user {
                options.source_user = user;
            }
            if let Some(user) = dest_user {
                options.dest_user = user;
            }
            options.clean = clean;
            options.owner_role = owner_role;

            if options.clean && !yes {
                confirm(&format!(
                    "--clean will drop every existing object in destination database '{}'. Continue?",
                    options.dest_db
                ))?;
            }

            // installed after any prompt so Ctrl-C there still exits immediately
            let interrupt = InterruptSignal::ctrl_c();
            commands::migrate_db(&kubectl, &config.database, &options, &interrupt).await
        }
        Commands::SyncPvc {
            pvc_name,
            namespace,
            host_path,
            verify,
            dry_run,
            yes,
        } => {
            let options = SyncPvcOptions {
                pvc_name,
                namespace,
                host_path,
                verify,
                dry_run,
            };

            if !options.dry_run && !yes {
                confirm(&format!(
                    "All existing data in PVC '{}' (namespace '{}') will be deleted and replaced. Continue?",
                    options.pvc_name, options.namespace
                ))?;
            }

            let interrupt = InterruptSignal::ctrl_c();
            commands::sync_pvc(&kubectl, &config.volume, &options, &interrupt)
                .await
                .map(|_| ())
        }
    }
}

fn confirm(prompt: &str) -> Result<()> {
    let confirmed = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()
        .context("Failed to get confirmation (use --yes to skip the prompt)")?;

    if !confirmed {
        tracing::warn!("⚠ User cancelled operation");
        anyhow::bail!("Operation cancelled by user");
    }
    Ok(())
}
