//! Bounded background execution of folding jobs.
//!
//! Admission is capped at `max_queued_jobs` (queued plus running); beyond
//! that, submissions are refused instead of piling up. A semaphore caps how
//! many admitted jobs run the tool at once.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;

use crate::config::PipelineConfig;
use crate::registry::{JobHandle, JobRegistry, RegistryError};
use crate::supervisor::{JobRequest, Supervisor};

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("Server is at capacity ({limit} jobs in flight)")]
    AtCapacity { limit: usize },

    #[error("Server is shutting down")]
    ShuttingDown,

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Holds one admission slot; released on drop.
struct AdmissionSlot {
    admitted: Arc<AtomicUsize>,
}

impl Drop for AdmissionSlot {
    fn drop(&mut self) {
        self.admitted.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Runs submitted jobs on background tasks.
pub struct JobExecutor {
    registry: Arc<JobRegistry>,
    supervisor: Arc<Supervisor>,
    permits: Arc<Semaphore>,
    admitted: Arc<AtomicUsize>,
    max_queued: usize,
    tracker: TaskTracker,
}

impl JobExecutor {
    pub fn new(
        registry: Arc<JobRegistry>,
        supervisor: Arc<Supervisor>,
        max_concurrent: usize,
        max_queued: usize,
    ) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            registry,
            supervisor,
            permits: Arc::new(Semaphore::new(max_concurrent)),
            admitted: Arc::new(AtomicUsize::new(0)),
            max_queued: max_queued.max(max_concurrent),
            tracker: TaskTracker::new(),
        }
    }

    /// Executor sized from the pipeline configuration.
    pub fn from_config(
        config: &PipelineConfig,
        registry: Arc<JobRegistry>,
        supervisor: Arc<Supervisor>,
    ) -> Self {
        Self::new(
            registry,
            supervisor,
            config.max_concurrent_jobs,
            config.max_queued_jobs,
        )
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Jobs admitted and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.admitted.load(Ordering::SeqCst)
    }

    /// Register the job and start it in the background.
    ///
    /// Returns once the job is recorded as `submitted`; the tool runs later.
    pub async fn submit(&self, request: JobRequest) -> Result<(), ExecutorError> {
        if self.permits.is_closed() {
            return Err(ExecutorError::ShuttingDown);
        }
        let slot = self.reserve_slot()?;
        let job = self.registry.create(&request.job_id, &request.name).await?;

        tracing::info!(
            job_id = %request.job_id,
            in_flight = self.in_flight(),
            "Job submitted",
        );

        let permits = Arc::clone(&self.permits);
        let supervisor = Arc::clone(&self.supervisor);
        self.tracker.spawn(async move {
            let _slot = slot;
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    tracing::warn!(job_id = job.job_id(), "Executor closed before job started");
                    job.update(|r| r.fail("Server is shutting down")).await;
                    return;
                }
            };
            run_guarded(supervisor, job, request).await;
        });

        Ok(())
    }

    fn reserve_slot(&self) -> Result<AdmissionSlot, ExecutorError> {
        let limit = self.max_queued;
        self.admitted
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < limit).then_some(n + 1)
            })
            .map_err(|_| ExecutorError::AtCapacity { limit })?;

        Ok(AdmissionSlot {
            admitted: Arc::clone(&self.admitted),
        })
    }

    /// Stop admitting work and wait up to `timeout` for running jobs.
    ///
    /// Jobs still waiting for a permit are failed. Returns `false` if the
    /// timeout elapsed with jobs still running.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.tracker.close();
        self.permits.close();

        match tokio::time::timeout(timeout, self.tracker.wait()).await {
            Ok(()) => {
                tracing::info!("All jobs drained");
                true
            }
            Err(_) => {
                tracing::warn!(
                    in_flight = self.in_flight(),
                    "Shutdown timeout elapsed with jobs still running"
                );
                false
            }
        }
    }
}

/// Run the supervisor on its own task so a panic lands on the record
/// instead of leaving the job stuck in `running`.
async fn run_guarded(supervisor: Arc<Supervisor>, job: JobHandle, request: JobRequest) {
    let inner = job.clone();
    let result = tokio::spawn(async move { supervisor.run(&inner, request).await }).await;

    if let Err(e) = result {
        tracing::error!(job_id = job.job_id(), error = %e, "Job task aborted");
        job.update(|r| r.fail("Internal error while running job"))
            .await;
    }
}
