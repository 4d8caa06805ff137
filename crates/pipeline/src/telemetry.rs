//! Background GPU telemetry for a running job.
//!
//! Best effort: a sample that cannot be taken is skipped, never retried,
//! and only the most recent sample is kept on the record.

use std::sync::Arc;
use std::time::Duration;

use fold_core::job::JobStatus;
use fold_hardware::HardwareProbe;
use tokio::task::JoinHandle;

use crate::registry::JobHandle;

/// Periodic sampler tied to one job's lifetime.
pub struct TelemetryMonitor {
    probe: Arc<dyn HardwareProbe>,
    interval: Duration,
}

impl TelemetryMonitor {
    pub fn new(probe: Arc<dyn HardwareProbe>, interval: Duration) -> Self {
        Self { probe, interval }
    }

    /// Run the monitor on its own task.
    pub fn spawn(self, job: JobHandle) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(job).await })
    }

    /// Sample every `interval` until the job is no longer `running`.
    ///
    /// The status check and the write happen under the same record lock,
    /// so a sample is never stored after the job has left `running`.
    pub async fn run(&self, job: JobHandle) {
        let job_id = job.job_id().to_string();
        tracing::debug!(job_id = %job_id, "Telemetry monitor started");

        while job.status().await == JobStatus::Running {
            if let Some(sample) = self.probe.sample_telemetry().await {
                let summary = sample
                    .gpus
                    .iter()
                    .map(|g| {
                        format!(
                            "gpu{}={}%",
                            g.gpu_index,
                            g.utilization_percent.map_or("?".to_string(), |u| u.to_string())
                        )
                    })
                    .collect::<Vec<_>>()
                    .join(" ");

                let stored = job
                    .update(|record| {
                        if record.status != JobStatus::Running {
                            return false;
                        }
                        record.gpu_telemetry = Some(sample);
                        true
                    })
                    .await;

                if !stored {
                    break;
                }
                tracing::info!(job_id = %job_id, utilization = %summary, "GPU telemetry sample");
            }

            tokio::time::sleep(self.interval).await;
        }

        tracing::debug!(job_id = %job_id, "Telemetry monitor stopped");
    }
}
