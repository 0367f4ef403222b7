// ABOUTME: Scripted stand-in for kubectl used by the procedure integration tests
// ABOUTME: Records every invocation and answers from a per-test handler closure

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use kube_migrate::kube::{CommandOutput, CommandRunner, Kubectl};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One recorded kubectl invocation
#[derive(Debug, Clone)]
pub struct Call {
    pub args: Vec<String>,
    pub stdin: Option<Vec<u8>>,
    /// Contents of the local file handed to `kubectl cp`, read at call time
    pub copied: Option<Vec<u8>>,
}

impl Call {
    /// Command run inside the pod for `kubectl exec` calls
    pub fn exec_command(&self) -> Option<&[String]> {
        if self.args.first().map(String::as_str) != Some("exec") {
            return None;
        }
        let split = self.args.iter().position(|a| a == "--")?;
        Some(&self.args[split + 1..])
    }

    /// Pod an exec call ran in
    pub fn exec_pod(&self) -> Option<&str> {
        self.exec_command()?;
        self.args.get(3).map(String::as_str)
    }

    pub fn execs(&self, program: &str) -> bool {
        self.exec_command()
            .and_then(|cmd| cmd.first())
            .map(|p| p == program)
            .unwrap_or(false)
    }

    pub fn is_kubectl(&self, verb: &str, kind: &str) -> bool {
        self.args.first().map(String::as_str) == Some(verb)
            && self.args.get(1).map(String::as_str) == Some(kind)
    }

    /// Shell script passed via `sh -c`
    pub fn shell_script(&self) -> Option<&str> {
        let cmd = self.exec_command()?;
        if cmd.len() == 3 && cmd[0] == "sh" && cmd[1] == "-c" {
            Some(cmd[2].as_str())
        } else {
            None
        }
    }
}

/// What the fake does for one invocation
pub enum Reply {
    Output(CommandOutput),
    /// Never finishes (until the caller drops the future)
    Hang,
    /// The kubectl binary itself could not be run
    SpawnError(String),
}

pub fn ok(stdout: impl AsRef<[u8]>) -> Reply {
    Reply::Output(CommandOutput {
        status: Some(0),
        stdout: stdout.as_ref().to_vec(),
        stderr: Vec::new(),
    })
}

pub fn fail(code: i32, stderr: &str) -> Reply {
    Reply::Output(CommandOutput {
        status: Some(code),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    })
}

type Handler = dyn Fn(&Call) -> Reply + Send + Sync;

pub struct FakeCluster {
    calls: Mutex<Vec<Call>>,
    handler: Box<Handler>,
}

impl FakeCluster {
    pub fn new(handler: impl Fn(&Call) -> Reply + Send + Sync + 'static) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            handler: Box::new(handler),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    pub fn find(&self, pred: impl Fn(&Call) -> bool) -> Option<Call> {
        self.calls().into_iter().find(|c| pred(c))
    }

    /// Index of the first call matching `pred`
    pub fn position(&self, pred: impl Fn(&Call) -> bool) -> Option<usize> {
        self.calls().iter().position(|c| pred(c))
    }
}

#[async_trait]
impl CommandRunner for FakeCluster {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        stdin: Option<&[u8]>,
    ) -> Result<CommandOutput> {
        assert_eq!(program, "kubectl");

        let copied = if args.first().map(String::as_str) == Some("cp") {
            std::fs::read(&args[1]).ok()
        } else {
            None
        };
        let call = Call {
            args: args.to_vec(),
            stdin: stdin.map(<[u8]>::to_vec),
            copied,
        };
        self.calls.lock().unwrap().push(call.clone());

        match (self.handler)(&call) {
            Reply::Output(output) => Ok(output),
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                anyhow::bail!("fake kubectl hung for an hour")
            }
            Reply::SpawnError(message) => anyhow::bail!(message),
        }
    }
}

/// Shared handle so a test can both drive the procedure and inspect calls
#[derive(Clone)]
pub struct SharedCluster(pub Arc<FakeCluster>);

#[async_trait]
impl CommandRunner for SharedCluster {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        stdin: Option<&[u8]>,
    ) -> Result<CommandOutput> {
        self.0.run(program, args, stdin).await
    }
}

pub fn kubectl(cluster: FakeCluster) -> (Kubectl<SharedCluster>, Arc<FakeCluster>) {
    let shared = Arc::new(cluster);
    (Kubectl::new(SharedCluster(shared.clone())), shared)
}
