// ABOUTME: Library module for kube-migrate
// ABOUTME: Exports both procedures and their building blocks for the binary and tests

pub mod commands;
pub mod config;
pub mod errors;
pub mod interrupt;
pub mod kube;
pub mod migration;
pub mod preconditions;
pub mod utils;
pub mod volume;
