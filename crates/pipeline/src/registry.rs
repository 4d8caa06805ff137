//! In-memory job registry.
//!
//! Every job's [`JobRecord`] lives behind its own mutex. The outer map
//! lock is held only long enough to find or insert an entry, so updates
//! to different jobs never wait on each other, while every update to one
//! job is a single read-modify-write critical section.
//!
//! Records are never removed; the registry grows for the life of the
//! process and is lost on restart.

use std::collections::HashMap;
use std::sync::Arc;

use fold_core::job::{JobRecord, JobStatus};
use tokio::sync::{Mutex, RwLock};

/// Errors from registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Job '{job_id}' is already {status}")]
    AlreadyActive { job_id: String, status: JobStatus },
}

/// Shared handle to one job's record.
///
/// Handed to the supervisor and the telemetry monitor so they keep
/// writing to the record they were started for, even if the id is later
/// resubmitted.
#[derive(Debug, Clone)]
pub struct JobHandle {
    job_id: Arc<str>,
    record: Arc<Mutex<JobRecord>>,
}

impl JobHandle {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Apply `f` to the record atomically and refresh `updated_at`.
    pub async fn update<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut JobRecord) -> R,
    {
        let mut record = self.record.lock().await;
        let out = f(&mut record);
        record.touch();
        out
    }

    /// Copy of the current record.
    pub async fn snapshot(&self) -> JobRecord {
        self.record.lock().await.clone()
    }

    pub async fn status(&self) -> JobStatus {
        self.record.lock().await.status
    }
}

/// Process-wide map from job id to job record.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, JobHandle>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new job in `submitted` state.
    ///
    /// Fails if a job with the same id is still queued or running. A job
    /// that already reached a terminal state is replaced.
    pub async fn create(&self, job_id: &str, name: &str) -> Result<JobHandle, RegistryError> {
        let mut jobs = self.jobs.write().await;

        if let Some(existing) = jobs.get(job_id) {
            let status = existing.status().await;
            if !status.is_terminal() {
                return Err(RegistryError::AlreadyActive {
                    job_id: job_id.to_string(),
                    status,
                });
            }
            tracing::info!(job_id, previous = %status, "Replacing finished job record");
        }

        let handle = JobHandle {
            job_id: Arc::from(job_id),
            record: Arc::new(Mutex::new(JobRecord::submitted(job_id, name))),
        };
        jobs.insert(job_id.to_string(), handle.clone());
        Ok(handle)
    }

    /// Handle to a job, if registered.
    pub async fn handle(&self, job_id: &str) -> Option<JobHandle> {
        self.jobs.read().await.get(job_id).cloned()
    }

    /// Copy of a job's record. `None` means the job was never submitted.
    pub async fn get(&self, job_id: &str) -> Option<JobRecord> {
        let handle = self.handle(job_id).await?;
        Some(handle.snapshot().await)
    }

    pub async fn status(&self, job_id: &str) -> Option<JobStatus> {
        let handle = self.handle(job_id).await?;
        Some(handle.status().await)
    }

    /// Apply `f` to a job's record atomically. `None` if the job is unknown.
    pub async fn update<F, R>(&self, job_id: &str, f: F) -> Option<R>
    where
        F: FnOnce(&mut JobRecord) -> R,
    {
        let handle = self.handle(job_id).await?;
        Some(handle.update(f).await)
    }

    /// Copies of every record, in no particular order.
    pub async fn list(&self) -> Vec<JobRecord> {
        let handles: Vec<JobHandle> = self.jobs.read().await.values().cloned().collect();

        let mut records = Vec::with_capacity(handles.len());
        for handle in handles {
            records.push(handle.snapshot().await);
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let registry = JobRegistry::new();
        assert!(registry.get("missing").await.is_none());
        assert!(registry.status("missing").await.is_none());
        assert!(registry.update("missing", |r| r.progress = 5).await.is_none());
    }

    #[tokio::test]
    async fn create_registers_submitted_record() {
        let registry = JobRegistry::new();
        registry.create("job-1", "protein").await.unwrap();

        let record = registry.get("job-1").await.unwrap();
        assert_eq!(record.status, JobStatus::Submitted);
        assert_eq!(record.progress, 0);
        assert_eq!(record.name, "protein");
    }

    #[tokio::test]
    async fn duplicate_active_submission_rejected() {
        let registry = JobRegistry::new();
        registry.create("job-1", "protein").await.unwrap();

        let err = registry.create("job-1", "protein").await.unwrap_err();
        assert_matches!(
            err,
            RegistryError::AlreadyActive { status: JobStatus::Submitted, .. }
        );
    }

    #[tokio::test]
    async fn finished_job_can_be_resubmitted() {
        let registry = JobRegistry::new();
        let first = registry.create("job-1", "protein").await.unwrap();
        first.update(|r| r.fail("boom")).await;

        let second = registry.create("job-1", "again").await.unwrap();
        assert_eq!(second.status().await, JobStatus::Submitted);
        assert_eq!(registry.get("job-1").await.unwrap().name, "again");

        // The old handle still points at the old record.
        assert_eq!(first.status().await, JobStatus::Error);
    }

    #[tokio::test]
    async fn update_returns_closure_result() {
        let registry = JobRegistry::new();
        registry.create("job-1", "protein").await.unwrap();

        let progress = registry
            .update("job-1", |r| {
                r.progress = 30;
                r.progress
            })
            .await;
        assert_eq!(progress, Some(30));
        assert_eq!(registry.list().await.len(), 1);
    }
}
