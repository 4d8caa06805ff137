//! Accelerator availability probes and utilization sampling.
//!
//! [`NvidiaSmiProbe`] shells out to `nvidia-smi` and `docker`. Probing is
//! **gracefully optional** -- a host with no NVIDIA drivers (e.g. a
//! developer laptop) simply reports the accelerator as unavailable.

use async_trait::async_trait;
use chrono::Utc;
use fold_core::hardware::{
    classify_probe, parse_utilization, CommandResult, GpuTelemetry, ProbeOutcome,
};

use crate::command::DiagnosticCommand;

/// Source of hardware facts used while running a job.
///
/// The supervisor and telemetry monitor depend on this trait rather than
/// on `nvidia-smi` directly so they can run on hosts without GPUs.
#[async_trait]
pub trait HardwareProbe: Send + Sync {
    /// Is a hardware accelerator available on this host?
    async fn probe_accelerator(&self) -> ProbeOutcome;

    /// Can the container runtime reach the accelerator?
    async fn probe_container_runtime(&self) -> ProbeOutcome;

    /// Take one utilization sample. `None` when no reading could be taken.
    async fn sample_telemetry(&self) -> Option<GpuTelemetry>;
}

/// [`HardwareProbe`] backed by `nvidia-smi` and `docker run --gpus=all`.
#[derive(Debug, Clone)]
pub struct NvidiaSmiProbe {
    accelerator: DiagnosticCommand,
    container_runtime: DiagnosticCommand,
    utilization: DiagnosticCommand,
}

impl Default for NvidiaSmiProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl NvidiaSmiProbe {
    /// Probe with the standard `nvidia-smi` / `docker` commands.
    pub fn new() -> Self {
        Self::with_commands(
            DiagnosticCommand::accelerator_query(),
            DiagnosticCommand::container_runtime_query(),
            DiagnosticCommand::utilization_query(),
        )
    }

    /// Probe with custom commands (alternate binaries or paths).
    pub fn with_commands(
        accelerator: DiagnosticCommand,
        container_runtime: DiagnosticCommand,
        utilization: DiagnosticCommand,
    ) -> Self {
        Self {
            accelerator,
            container_runtime,
            utilization,
        }
    }
}

#[async_trait]
impl HardwareProbe for NvidiaSmiProbe {
    async fn probe_accelerator(&self) -> ProbeOutcome {
        let outcome = classify_probe(&self.accelerator.program, self.accelerator.run().await);
        if outcome.available {
            tracing::info!(gpu_info = %outcome.detail, "GPU detected");
        } else {
            tracing::warn!(detail = %outcome.detail, "No GPU detected");
        }
        outcome
    }

    async fn probe_container_runtime(&self) -> ProbeOutcome {
        let outcome = classify_probe(
            &self.container_runtime.program,
            self.container_runtime.run().await,
        );
        if outcome.available {
            tracing::info!("Container runtime GPU access confirmed");
        } else {
            tracing::warn!(detail = %outcome.detail, "Container runtime has no GPU access");
        }
        outcome
    }

    async fn sample_telemetry(&self) -> Option<GpuTelemetry> {
        match self.utilization.run().await {
            CommandResult::Exited {
                success: true,
                stdout,
                ..
            } => {
                let gpus = parse_utilization(&stdout);
                if gpus.is_empty() {
                    return None;
                }
                Some(GpuTelemetry {
                    gpus,
                    sampled_at: Utc::now(),
                })
            }
            other => {
                tracing::debug!(result = ?other, "GPU utilization sample unavailable");
                None
            }
        }
    }
}
