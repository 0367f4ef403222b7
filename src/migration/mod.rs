// ABOUTME: Database migration steps run through kubectl exec
// ABOUTME: Dump on the source pod, stage and restore on the destination, then re-grant

pub mod dump;
pub mod permissions;
pub mod restore;

pub use dump::{dump_command, dump_database};
pub use permissions::{fix_permissions, permission_script};
pub use restore::{
    remove_remote_dump, restore_command, restore_database, stage_dump, RestoreOptions,
};
