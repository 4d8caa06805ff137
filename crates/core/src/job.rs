//! Job lifecycle types.
//!
//! A [`JobRecord`] is the single tracked view of one folding request. It is
//! mutated in place by the supervisor and the telemetry monitor and read by
//! the status / result endpoints.

use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::hardware::{GpuTelemetry, ProbeOutcome};
use crate::types::Timestamp;

/// Display label used when a submission does not name its protein.
pub const DEFAULT_JOB_NAME: &str = "protein";

/// Maximum length of a caller-supplied job id.
const MAX_JOB_ID_LEN: usize = 128;

/// Lifecycle state of a job.
///
/// Transitions only move forward: `submitted -> running -> (completed | error)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Submitted,
    Running,
    Completed,
    Error,
}

impl JobStatus {
    /// Wire name of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    /// `true` once the job can no longer change state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// Whether moving from `self` to `next` respects the forward-only order.
    ///
    /// Any non-terminal state may fail straight to `Error`.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        match (self, next) {
            (Self::Submitted, Self::Running) => true,
            (Self::Running, Self::Completed) => true,
            (Self::Submitted | Self::Running, Self::Error) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of scanning the tool's own log for evidence that it ran on a GPU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuVerification {
    pub gpu_used: bool,
    pub evidence: String,
}

/// Tracked state of a single job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    pub name: String,
    pub status: JobStatus,
    /// Heuristic checkpoint percentage (0, 30, 70, 100), not a measurement.
    pub progress: u8,
    pub gpu_available: Option<bool>,
    pub gpu_info: Option<String>,
    pub docker_gpu_access: Option<bool>,
    pub docker_gpu_info: Option<String>,
    pub gpu_usage_detected: bool,
    pub gpu_evidence: Option<String>,
    /// Latest telemetry sample; each poll replaces the previous one.
    pub gpu_telemetry: Option<GpuTelemetry>,
    pub gpu_verification: Option<GpuVerification>,
    /// Human-readable description of where the artifact is uploaded.
    pub destination: Option<String>,
    /// Canonical local artifact path. Present iff `status == Completed`.
    pub result_file: Option<PathBuf>,
    pub uploaded: Option<bool>,
    /// Failure description. Present only when `status == Error`.
    pub message: Option<String>,
    pub submitted_at: Timestamp,
    pub updated_at: Timestamp,
}

impl JobRecord {
    /// A freshly accepted submission.
    pub fn submitted(job_id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            job_id: job_id.into(),
            name: name.into(),
            status: JobStatus::Submitted,
            progress: 0,
            gpu_available: None,
            gpu_info: None,
            docker_gpu_access: None,
            docker_gpu_info: None,
            gpu_usage_detected: false,
            gpu_evidence: None,
            gpu_telemetry: None,
            gpu_verification: None,
            destination: None,
            result_file: None,
            uploaded: None,
            message: None,
            submitted_at: now,
            updated_at: now,
        }
    }

    /// Move to `running` and reset progress.
    ///
    /// Returns `false` and leaves the record alone unless it is `submitted`.
    pub fn start(&mut self) -> bool {
        if !self.status.can_transition_to(JobStatus::Running) {
            return false;
        }
        self.status = JobStatus::Running;
        self.progress = 0;
        true
    }

    /// Store the accelerator probe result.
    pub fn record_accelerator(&mut self, probe: &ProbeOutcome) {
        self.gpu_available = Some(probe.available);
        self.gpu_info = Some(probe.detail.clone());
    }

    /// Store the container runtime probe result.
    pub fn record_container_runtime(&mut self, probe: &ProbeOutcome) {
        self.docker_gpu_access = Some(probe.available);
        self.docker_gpu_info = Some(probe.detail.clone());
    }

    /// Mark the job completed with its canonical artifact path.
    ///
    /// Returns `false` and leaves the record alone unless it is `running`.
    pub fn complete(&mut self, result_file: PathBuf, uploaded: bool) -> bool {
        if !self.status.can_transition_to(JobStatus::Completed) {
            return false;
        }
        self.status = JobStatus::Completed;
        self.progress = 100;
        self.result_file = Some(result_file);
        self.uploaded = Some(uploaded);
        self.message = None;
        true
    }

    /// Mark the job failed.
    ///
    /// Diagnostic fields gathered so far (probe results, telemetry, GPU
    /// evidence) are left untouched. A job that already finished is not
    /// changed and `false` is returned.
    pub fn fail(&mut self, message: impl Into<String>) -> bool {
        if !self.status.can_transition_to(JobStatus::Error) {
            return false;
        }
        self.status = JobStatus::Error;
        self.result_file = None;
        self.message = Some(message.into());
        true
    }

    /// Refresh `updated_at`. Called by the registry after every mutation.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Validate a caller-supplied job id.
///
/// Job ids become file names (`<id>.fasta`, `<output>/<id>/`), so only
/// ASCII alphanumerics, hyphen, underscore and dot are accepted and the id
/// may not start with a dot.
pub fn validate_job_id(job_id: &str) -> Result<(), CoreError> {
    let valid = !job_id.is_empty()
        && job_id.len() <= MAX_JOB_ID_LEN
        && !job_id.starts_with('.')
        && job_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');

    if valid {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Invalid job id '{job_id}': use 1-{MAX_JOB_ID_LEN} characters from [A-Za-z0-9._-] \
             not starting with '.'"
        )))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
