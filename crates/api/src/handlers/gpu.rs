//! Accelerator diagnostics endpoint.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use fold_core::hardware::ProbeOutcome;
use fold_core::job::{GpuVerification, JobStatus};
use fold_core::types::Timestamp;
use fold_hardware::inventory::{self, ContainerGpuUsage, InventoryError};
use serde::Serialize;

use crate::state::AppState;

/// Either the inventory result or the reason it could not be gathered.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Inventory<T> {
    Available(T),
    Unavailable { error: String },
}

impl<T> Inventory<T> {
    /// Result of an inventory lookup that may also have run out of time.
    fn gathered(result: Result<Result<T, InventoryError>, String>) -> Self {
        match result {
            Ok(inner) => inner.into(),
            Err(error) => {
                tracing::warn!(error = %error, "GPU inventory command timed out");
                Self::Unavailable { error }
            }
        }
    }
}

impl<T> From<Result<T, InventoryError>> for Inventory<T> {
    fn from(result: Result<T, InventoryError>) -> Self {
        match result {
            Ok(value) => Self::Available(value),
            Err(e) => {
                tracing::warn!(error = %e, "GPU inventory command failed");
                Self::Unavailable {
                    error: e.to_string(),
                }
            }
        }
    }
}

/// A job that showed signs of running on a GPU.
#[derive(Debug, Serialize)]
pub struct JobGpuUsage {
    pub job_id: String,
    pub status: JobStatus,
    pub progress: u8,
    pub gpu_evidence: Option<String>,
    pub gpu_verification: Option<GpuVerification>,
}

#[derive(Debug, Serialize)]
pub struct GpuInfoResponse {
    pub system_gpu_available: bool,
    pub system_gpu_info: String,
    pub docker_gpu_access: bool,
    pub docker_gpu_info: String,
    pub detailed_gpu_info: Inventory<BTreeMap<String, BTreeMap<String, String>>>,
    pub jobs_using_gpu: Vec<JobGpuUsage>,
    pub docker_containers: Inventory<Vec<ContainerGpuUsage>>,
    pub timestamp: Timestamp,
}

/// GET /gpu-info
///
/// Probes, detailed per-GPU readings, jobs with GPU evidence, and
/// containers that can reach a GPU. The four lookups run concurrently,
/// each bounded by `gpu_info_timeout_secs`, and degrade independently.
pub async fn gpu_info(State(state): State<AppState>) -> Json<GpuInfoResponse> {
    let limit = Duration::from_secs(state.config.gpu_info_timeout_secs);

    let (accelerator, container_runtime, detailed_gpu_info, docker_containers) = tokio::join!(
        within(limit, state.probe.probe_accelerator()),
        within(limit, state.probe.probe_container_runtime()),
        within(limit, inventory::detailed_gpu_info()),
        within(limit, inventory::docker_containers()),
    );

    let accelerator = accelerator.unwrap_or_else(|e| ProbeOutcome::unavailable(e));
    let container_runtime = container_runtime.unwrap_or_else(|e| ProbeOutcome::unavailable(e));
    let detailed_gpu_info = Inventory::gathered(detailed_gpu_info);
    let docker_containers = Inventory::gathered(docker_containers);

    let mut jobs_using_gpu: Vec<JobGpuUsage> = state
        .registry
        .list()
        .await
        .into_iter()
        .filter(|r| {
            r.gpu_usage_detected
                || r.gpu_verification.as_ref().is_some_and(|v| v.gpu_used)
        })
        .map(|r| JobGpuUsage {
            job_id: r.job_id,
            status: r.status,
            progress: r.progress,
            gpu_evidence: r.gpu_evidence,
            gpu_verification: r.gpu_verification,
        })
        .collect();
    jobs_using_gpu.sort_by(|a, b| a.job_id.cmp(&b.job_id));

    Json(GpuInfoResponse {
        system_gpu_available: accelerator.available,
        system_gpu_info: accelerator.detail,
        docker_gpu_access: container_runtime.available,
        docker_gpu_info: container_runtime.detail,
        detailed_gpu_info,
        jobs_using_gpu,
        docker_containers,
        timestamp: Utc::now(),
    })
}

/// Await `fut` for at most `limit`.
async fn within<T>(limit: Duration, fut: impl Future<Output = T>) -> Result<T, String> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| format!("Timed out after {}s", limit.as_secs()))
}
