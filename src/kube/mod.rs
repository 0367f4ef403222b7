// ABOUTME: Cluster access layer: subprocess seam plus the kubectl remote executor
// ABOUTME: Everything that touches the cluster goes through Kubectl<R: CommandRunner>

pub mod executor;
pub mod runner;

pub use executor::Kubectl;
pub use runner::{CommandOutput, CommandRunner, SystemRunner};
