//! Runs one folding job end-to-end.
//!
//! Writes the FASTA input, records probe results, starts the telemetry
//! monitor, launches the folding tool, follows its stdout, and publishes
//! the top-ranked model. Every failure ends in `status = error` with the
//! diagnostic fields gathered so far left in place.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use fold_cloud::{Destination, PublishError, Publisher};
use fold_core::job::GpuVerification;
use fold_core::output::{
    fasta_record, is_top_ranked_model, latest_result_dir, scan_line, verify_gpu_log,
    RESULT_LOG_FILE,
};
use fold_hardware::HardwareProbe;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{ChildStdout, Command};

use crate::config::PipelineConfig;
use crate::registry::JobHandle;
use crate::telemetry::TelemetryMonitor;

/// Everything the supervisor needs to run one job.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub job_id: String,
    pub name: String,
    pub sequence: String,
    pub destination: Option<Destination>,
}

/// Reasons a job ends in `error`.
///
/// The `Display` text becomes the record's `message`.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Non-zero exit; carries the tool's stderr.
    #[error("{0}")]
    ToolFailed(String),

    #[error("No results directory found")]
    NoResultsDirectory,

    #[error("No PDB files found in results directory")]
    NoResultFile,

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn io_error(context: impl Into<String>) -> impl FnOnce(std::io::Error) -> SupervisorError {
    let context = context.into();
    move |source| SupervisorError::Io { context, source }
}

/// Runs jobs against the configured folding tool.
pub struct Supervisor {
    config: Arc<PipelineConfig>,
    probe: Arc<dyn HardwareProbe>,
    publisher: Arc<Publisher>,
}

impl Supervisor {
    pub fn new(
        config: Arc<PipelineConfig>,
        probe: Arc<dyn HardwareProbe>,
        publisher: Arc<Publisher>,
    ) -> Self {
        Self {
            config,
            probe,
            publisher,
        }
    }

    /// Run the job to a terminal state. Never returns an error: failures
    /// are written to the record.
    pub async fn run(&self, job: &JobHandle, request: JobRequest) {
        let job_id = request.job_id.clone();
        match self.execute(job, &request).await {
            Ok(()) => {
                tracing::info!(job_id = %job_id, "Folding job completed");
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Folding job failed");
                job.update(|record| record.fail(e.to_string())).await;
            }
        }
    }

    async fn execute(&self, job: &JobHandle, request: &JobRequest) -> Result<(), SupervisorError> {
        let job_id = request.job_id.as_str();

        let fasta_path = self.config.fasta_path(job_id);
        tokio::fs::write(&fasta_path, fasta_record(&request.name, &request.sequence))
            .await
            .map_err(io_error(format!("Failed to write {}", fasta_path.display())))?;

        if !job.update(|record| record.start()).await {
            return Err(SupervisorError::Internal("job is no longer queued".into()));
        }

        let accelerator = self.probe.probe_accelerator().await;
        let container_runtime = self.probe.probe_container_runtime().await;
        job.update(|record| {
            record.record_accelerator(&accelerator);
            record.record_container_runtime(&container_runtime);
            record.destination = request.destination.as_ref().map(ToString::to_string);
        })
        .await;

        TelemetryMonitor::new(Arc::clone(&self.probe), self.config.telemetry_interval)
            .spawn(job.clone());

        let job_dir = self.config.job_dir(job_id);
        clear_previous_output(&job_dir).await?;
        tokio::fs::create_dir_all(&job_dir)
            .await
            .map_err(io_error(format!("Failed to create {}", job_dir.display())))?;

        let (status, stderr) = self.run_tool(job, &fasta_path, &job_dir).await?;
        if !status.success() {
            let stderr = stderr.trim();
            let message = if stderr.is_empty() {
                format!("Folding tool exited with {status}")
            } else {
                stderr.to_string()
            };
            return Err(SupervisorError::ToolFailed(message));
        }

        tracing::info!(job_id, "Folding tool finished successfully");

        let result_dir = find_result_dir(&job_dir)
            .await?
            .ok_or(SupervisorError::NoResultsDirectory)?;

        let verification = read_gpu_verification(&result_dir).await;
        if verification.gpu_used {
            tracing::info!(job_id, "GPU usage confirmed in tool log");
        } else {
            tracing::warn!(job_id, evidence = %verification.evidence, "No GPU usage confirmed in tool log");
        }
        job.update(|record| record.gpu_verification = Some(verification))
            .await;

        let artifact = find_top_ranked_model(&result_dir)
            .await?
            .ok_or(SupervisorError::NoResultFile)?;

        let publication = self
            .publisher
            .publish(job_id, &artifact, &job_dir, request.destination.as_ref())
            .await?;

        job.update(|record| record.complete(publication.result_file, publication.uploaded))
            .await;
        Ok(())
    }

    /// Launch the tool and follow its stdout until it exits.
    ///
    /// Stderr is drained concurrently so a chatty tool cannot block on a
    /// full pipe. Returns the exit status and the captured stderr.
    async fn run_tool(
        &self,
        job: &JobHandle,
        fasta_path: &Path,
        job_dir: &Path,
    ) -> Result<(ExitStatus, String), SupervisorError> {
        let tool = &self.config.tool;
        let args = tool.args(fasta_path, &self.config.data_dir, job_dir);

        tracing::info!(
            job_id = job.job_id(),
            program = %tool.program,
            args = ?args,
            "Starting folding tool",
        );

        let mut child = Command::new(&tool.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SupervisorError::Spawn {
                program: tool.program.clone(),
                source,
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SupervisorError::Internal("tool stdout was not captured".into()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| SupervisorError::Internal("tool stderr was not captured".into()))?;

        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            stderr.read_to_end(&mut buf).await.map(|_| buf)
        });

        if let Err(e) = follow_stdout(job, stdout).await {
            // Dropping `child` kills the tool.
            stderr_task.abort();
            return Err(e);
        }

        let status = child
            .wait()
            .await
            .map_err(io_error("Failed to wait for folding tool"))?;

        let stderr = stderr_task
            .await
            .map_err(|e| SupervisorError::Internal(format!("stderr reader failed: {e}")))?
            .map_err(io_error("Failed to read tool stderr"))?;

        Ok((status, String::from_utf8_lossy(&stderr).into_owned()))
    }
}

/// Follow the tool's stdout line by line, recording GPU evidence and
/// progress milestones as they appear.
async fn follow_stdout(job: &JobHandle, stdout: ChildStdout) -> Result<(), SupervisorError> {
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .await
            .map_err(io_error("Failed to read tool output"))?;
        if read == 0 {
            break;
        }

        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end();
        tracing::info!(job_id = job.job_id(), "tool: {line}");

        let signals = scan_line(line);
        if signals.gpu_evidence.is_none() && signals.progress.is_none() {
            continue;
        }
        job.update(|record| {
            if let Some(evidence) = signals.gpu_evidence {
                record.gpu_usage_detected = true;
                record.gpu_evidence = Some(evidence.to_string());
            }
            if let Some(progress) = signals.progress {
                record.progress = progress;
            }
        })
        .await;
    }
    Ok(())
}

/// Remove what an earlier run of the same job id left in `job_dir`, so the
/// result lookup only sees this run's output.
async fn clear_previous_output(job_dir: &Path) -> Result<(), SupervisorError> {
    match tokio::fs::remove_dir_all(job_dir).await {
        Ok(()) => {
            tracing::info!(job_dir = %job_dir.display(), "Cleared output of a previous run");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_error(format!("Failed to clear {}", job_dir.display()))(e)),
    }
}

/// The result subdirectory of a job: lexicographically last directory name.
async fn find_result_dir(job_dir: &Path) -> Result<Option<PathBuf>, SupervisorError> {
    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(job_dir)
        .await
        .map_err(io_error(format!("Failed to list {}", job_dir.display())))?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(io_error(format!("Failed to list {}", job_dir.display())))?
    {
        let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
        if is_dir {
            names.push(entry.file_name());
        }
    }

    Ok(latest_result_dir(names).map(|name| job_dir.join(name)))
}

/// First `*ranked_0*.pdb` file (by name) inside `result_dir`.
async fn find_top_ranked_model(result_dir: &Path) -> Result<Option<PathBuf>, SupervisorError> {
    let mut matches = Vec::new();
    let mut entries = tokio::fs::read_dir(result_dir)
        .await
        .map_err(io_error(format!("Failed to list {}", result_dir.display())))?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(io_error(format!("Failed to list {}", result_dir.display())))?
    {
        let name = entry.file_name();
        if is_top_ranked_model(&name.to_string_lossy()) {
            matches.push(name);
        }
    }

    matches.sort();
    Ok(matches.into_iter().next().map(|name| result_dir.join(name)))
}

/// Check the tool's `log.txt` for signs that it ran on a GPU.
async fn read_gpu_verification(result_dir: &Path) -> GpuVerification {
    match tokio::fs::read(result_dir.join(RESULT_LOG_FILE)).await {
        Ok(bytes) => verify_gpu_log(&String::from_utf8_lossy(&bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => GpuVerification {
            gpu_used: false,
            evidence: "No log.txt found".to_string(),
        },
        Err(e) => GpuVerification {
            gpu_used: false,
            evidence: e.to_string(),
        },
    }
}
