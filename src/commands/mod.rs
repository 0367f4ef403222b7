// ABOUTME: Command implementations for each operator procedure
// ABOUTME: Exports migrate_db and sync_pvc

pub mod migrate_db;
pub mod sync_pvc;

pub use migrate_db::{migrate_db, MigrateDbOptions};
pub use sync_pvc::{sync_pvc, SyncOutcome, SyncPvcOptions};
