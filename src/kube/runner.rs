// ABOUTME: Narrow subprocess seam every kubectl invocation goes through
// ABOUTME: SystemRunner shells out for real, tests plug in a scripted runner

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Raw result of one subprocess invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was terminated by a signal
    pub status: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Runs an external program to completion
///
/// Implementations return `Ok` for any process that actually ran, whatever
/// its exit status; `Err` is reserved for failing to run it at all (binary
/// missing, pipe broken, and so on).
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        stdin: Option<&[u8]>,
    ) -> Result<CommandOutput>;
}

/// Production runner backed by `tokio::process`
///
/// The child is killed if the future is dropped, so an interrupted step does
/// not leave a stray `kubectl exec` behind.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        stdin: Option<&[u8]>,
    ) -> Result<CommandOutput> {
        tracing::debug!("Running: {} {}", program, args.join(" "));

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to execute {}. Is it installed and in PATH?", program))?;

        // Feed stdin from a separate task so a chatty child can't deadlock on a full stdout pipe
        let writer = match (stdin, child.stdin.take()) {
            (Some(input), Some(mut pipe)) => {
                let input = input.to_vec();
                Some(tokio::spawn(async move {
                    let result = pipe.write_all(&input).await;
                    drop(pipe);
                    result
                }))
            }
            _ => None,
        };

        let output = child
            .wait_with_output()
            .await
            .with_context(|| format!("Failed to wait for {}", program))?;

        if let Some(writer) = writer {
            match writer.await {
                Ok(Ok(())) => {}
                // the child may legitimately exit before draining stdin
                Ok(Err(e)) => tracing::debug!("Writing stdin to {} failed: {}", program, e),
                Err(e) => tracing::debug!("stdin writer for {} panicked: {}", program, e),
            }
        }

        Ok(CommandOutput {
            status: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}
