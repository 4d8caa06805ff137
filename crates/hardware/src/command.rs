//! Execution of fixed diagnostic commands.
//!
//! A [`DiagnosticCommand`] runs once, captures stdout and stderr, and
//! reports the outcome as a [`CommandResult`]. There are no retries.

use std::io::ErrorKind;
use std::time::Duration;

use fold_core::hardware::CommandResult;
use tokio::process::Command;

/// Default time a diagnostic command may run before it is killed.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// A program plus its fixed argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticCommand {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl DiagnosticCommand {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `nvidia-smi` query used to decide whether an accelerator is present.
    pub fn accelerator_query() -> Self {
        Self::new(
            "nvidia-smi",
            [
                "--query-gpu=name,memory.total,memory.free,memory.used",
                "--format=csv,noheader",
            ],
        )
    }

    /// Runs `nvidia-smi` inside a throwaway CUDA container.
    ///
    /// The first run may pull the image, hence the longer timeout.
    pub fn container_runtime_query() -> Self {
        Self::new(
            "docker",
            [
                "run",
                "--rm",
                "--gpus=all",
                "nvidia/cuda:12.2.2-base-ubuntu20.04",
                "nvidia-smi",
            ],
        )
        .with_timeout(Duration::from_secs(300))
    }

    /// `nvidia-smi` query for per-GPU utilization and memory (no units).
    pub fn utilization_query() -> Self {
        Self::new(
            "nvidia-smi",
            [
                "--query-gpu=utilization.gpu,memory.used,memory.total",
                "--format=csv,noheader,nounits",
            ],
        )
        .with_timeout(Duration::from_secs(15))
    }

    /// Run the command to completion and capture its output.
    pub async fn run(&self) -> CommandResult {
        let child = Command::new(&self.program)
            .args(&self.args)
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => CommandResult::Exited {
                success: output.status.success(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            },
            Ok(Err(e)) if e.kind() == ErrorKind::NotFound => CommandResult::NotFound,
            Ok(Err(e)) => CommandResult::SpawnFailed(e.to_string()),
            Err(_) => CommandResult::TimedOut {
                secs: self.timeout.as_secs(),
            },
        }
    }
}
