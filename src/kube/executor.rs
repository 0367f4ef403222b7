// ABOUTME: kubectl wrapper: exec with checked status, file copy and pod/PVC queries
// ABOUTME: Non-zero exits become MigrateError::RemoteExecution with the tool output attached

use anyhow::{Context, Result};
use std::path::Path;

use super::runner::{CommandOutput, CommandRunner};
use crate::config::ExecutionTarget;
use crate::errors::MigrateError;

/// Remote executor for a Kubernetes cluster reached through `kubectl`
pub struct Kubectl<R> {
    runner: R,
    program: String,
}

impl<R: CommandRunner> Kubectl<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            program: "kubectl".to_string(),
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    async fn raw(&self, args: Vec<String>, stdin: Option<&[u8]>) -> Result<CommandOutput> {
        self.runner
            .run(&self.program, &args, stdin)
            .await
            .with_context(|| format!("Failed to run {} {}", self.program, args.join(" ")))
    }

    async fn checked(
        &self,
        args: Vec<String>,
        stdin: Option<&[u8]>,
        binary: bool,
    ) -> Result<CommandOutput> {
        let output = self.raw(args.clone(), stdin).await?;
        if output.success() {
            return Ok(output);
        }

        let stdout = if binary {
            format!("<{} bytes of binary output>", output.stdout.len())
        } else {
            output.stdout_text()
        };
        Err(MigrateError::RemoteExecution {
            command: format!("{} {}", self.program, args.join(" ")),
            exit_code: output.status,
            stdout,
            stderr: output.stderr_text(),
        }
        .into())
    }

    /// Run `command` inside `target` and return its stdout/stderr as text
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::RemoteExecution`] if the command exits non-zero,
    /// or a transport error if kubectl itself could not be run.
    pub async fn exec(
        &self,
        target: &ExecutionTarget,
        command: &[String],
        stdin: Option<&[u8]>,
    ) -> Result<(String, String)> {
        let args = exec_args(target, command, stdin.is_some());
        let output = self.checked(args, stdin, false).await?;
        Ok((output.stdout_text(), output.stderr_text()))
    }

    /// Run `command` inside `target` and return stdout untouched
    ///
    /// Use this for anything that may carry arbitrary bytes, such as a
    /// custom-format `pg_dump` archive.
    pub async fn exec_binary(
        &self,
        target: &ExecutionTarget,
        command: &[String],
        stdin: Option<&[u8]>,
    ) -> Result<(Vec<u8>, String)> {
        let args = exec_args(target, command, stdin.is_some());
        let output = self.checked(args, stdin, true).await?;
        let stderr = output.stderr_text();
        Ok((output.stdout, stderr))
    }

    /// Copy a local file into the target container's filesystem with `kubectl cp`
    pub async fn copy_to(
        &self,
        target: &ExecutionTarget,
        local_path: &Path,
        remote_path: &str,
    ) -> Result<()> {
        let args = vec![
            "cp".to_string(),
            local_path.display().to_string(),
            format!("{}/{}:{}", target.namespace, target.pod, remote_path),
            "-c".to_string(),
            target.container.clone(),
        ];
        self.checked(args, None, false).await?;
        Ok(())
    }

    /// `kubectl get pod <name> -n <namespace>`, returning the table output
    pub async fn get_pod(&self, name: &str, namespace: &str) -> Result<String> {
        let args = vec![
            "get".to_string(),
            "pod".to_string(),
            name.to_string(),
            "-n".to_string(),
            namespace.to_string(),
        ];
        Ok(self.checked(args, None, false).await?.stdout_text())
    }

    /// Current `.status.phase` of a pod (`Pending`, `Running`, `Failed`, ...)
    pub async fn pod_phase(&self, name: &str, namespace: &str) -> Result<String> {
        let args = vec![
            "get".to_string(),
            "pod".to_string(),
            name.to_string(),
            "-n".to_string(),
            namespace.to_string(),
            "-o".to_string(),
            "jsonpath={.status.phase}".to_string(),
        ];
        Ok(self
            .checked(args, None, false)
            .await?
            .stdout_text()
            .trim()
            .to_string())
    }

    /// `kubectl get pvc <name> -n <namespace>`; errors if the claim is missing
    pub async fn get_pvc(&self, name: &str, namespace: &str) -> Result<()> {
        let args = vec![
            "get".to_string(),
            "pvc".to_string(),
            name.to_string(),
            "-n".to_string(),
            namespace.to_string(),
        ];
        self.checked(args, None, false).await?;
        Ok(())
    }

    /// Submit a manifest (YAML or JSON) with `kubectl apply -f -`
    pub async fn apply(&self, manifest: &str) -> Result<()> {
        let args = vec!["apply".to_string(), "-f".to_string(), "-".to_string()];
        self.checked(args, Some(manifest.as_bytes()), false).await?;
        Ok(())
    }

    /// Delete a pod; deleting one that is already gone is not an error
    pub async fn delete_pod(&self, name: &str, namespace: &str) -> Result<()> {
        let args = vec![
            "delete".to_string(),
            "pod".to_string(),
            name.to_string(),
            "-n".to_string(),
            namespace.to_string(),
            "--ignore-not-found".to_string(),
        ];
        self.checked(args, None, false).await?;
        Ok(())
    }
}

fn exec_args(target: &ExecutionTarget, command: &[String], with_stdin: bool) -> Vec<String> {
    let mut args = vec![
        "exec".to_string(),
        "-n".to_string(),
        target.namespace.clone(),
        target.pod.clone(),
        "-c".to_string(),
        target.container.clone(),
    ];
    if with_stdin {
        args.push("-i".to_string());
    }
    args.push("--".to_string());
    args.extend(command.iter().cloned());
    args
}
