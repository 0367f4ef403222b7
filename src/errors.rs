// ABOUTME: Typed errors that callers need to tell apart from generic failures
// ABOUTME: Remote command failures keep the tool output, interruption is its own case

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrateError {
    /// A command run through kubectl exited non-zero.
    ///
    /// The tool output is kept verbatim so the operator can diagnose the
    /// failure without re-running anything.
    #[error(
        "Command `{command}` failed with exit code {}\nstdout: {stdout}\nstderr: {stderr}",
        describe_exit(.exit_code)
    )]
    RemoteExecution {
        command: String,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    /// The operator pressed Ctrl-C while a procedure was running.
    #[error("interrupted by user")]
    Interrupted,
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "unknown (terminated by signal)".to_string(),
    }
}

impl MigrateError {
    /// Returns true if `err` (or anything in its context chain) is an interruption
    pub fn is_interrupted(err: &anyhow::Error) -> bool {
        err.chain().any(|cause| {
            matches!(
                cause.downcast_ref::<MigrateError>(),
                Some(MigrateError::Interrupted)
            )
        })
    }

    /// Exit code of a remote execution failure, if `err` is one
    pub fn remote_exit_code(err: &anyhow::Error) -> Option<i32> {
        err.chain().find_map(|cause| match cause.downcast_ref::<MigrateError>() {
            Some(MigrateError::RemoteExecution { exit_code, .. }) => *exit_code,
            _ => None,
        })
    }
}
