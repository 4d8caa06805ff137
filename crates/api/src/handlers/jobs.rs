//! Handlers for job submission, status, and result download.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use axum::Json;
use fold_cloud::Destination;
use fold_core::error::CoreError;
use fold_core::job::{validate_job_id, JobRecord, JobStatus, DEFAULT_JOB_NAME};
use fold_pipeline::supervisor::JobRequest;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Body of `POST /predict`. Field names follow the existing clients.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictRequest {
    /// Generated when absent.
    pub job_id: Option<String>,
    pub sequence: Option<String>,
    pub name: Option<String>,
    /// `aws` (default) or `azure`.
    pub platform: Option<String>,
    pub bucket_name: Option<String>,
    pub object_key: Option<String>,
    pub storage_account: Option<String>,
    pub container_name: Option<String>,
    pub blob_name: Option<String>,
    /// Pre-signed (S3) or SAS (Azure) URL.
    pub storage_url: Option<String>,
}

impl PredictRequest {
    /// Upload destination described by the body, if any.
    ///
    /// A complete provider triple gives a structured destination carrying
    /// `storageUrl` as its fallback; a lone `storageUrl` gives a URL-only one.
    pub fn destination(&self) -> Result<Option<Destination>, CoreError> {
        let storage_url = non_empty(&self.storage_url);

        let structured = match self.platform.as_deref().unwrap_or("aws") {
            "aws" => match (non_empty(&self.bucket_name), non_empty(&self.object_key)) {
                (Some(bucket), Some(object_key)) => Some(Destination::Aws {
                    bucket,
                    object_key,
                    presigned_url: storage_url.clone(),
                }),
                _ => None,
            },
            "azure" => match (
                non_empty(&self.storage_account),
                non_empty(&self.container_name),
                non_empty(&self.blob_name),
            ) {
                (Some(storage_account), Some(container_name), Some(blob_name)) => {
                    Some(Destination::Azure {
                        storage_account,
                        container_name,
                        blob_name,
                        sas_url: storage_url.clone(),
                    })
                }
                _ => None,
            },
            other => {
                return Err(CoreError::Validation(format!(
                    "Unsupported platform '{other}': expected 'aws' or 'azure'"
                )))
            }
        };

        Ok(structured.or_else(|| storage_url.map(|url| Destination::UrlOnly { url })))
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub job_id: String,
    pub status: JobStatus,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /predict
///
/// Register the job and start it in the background. Returns immediately.
pub async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> AppResult<Json<SubmitResponse>> {
    let Json(body) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let sequence = non_empty(&body.sequence)
        .ok_or_else(|| AppError::BadRequest("Protein sequence is required".into()))?;

    let job_id = match non_empty(&body.job_id) {
        Some(id) => id,
        None => uuid::Uuid::new_v4().to_string(),
    };
    validate_job_id(&job_id)?;

    let destination = body.destination()?;
    let name = non_empty(&body.name).unwrap_or_else(|| DEFAULT_JOB_NAME.to_string());

    tracing::info!(
        job_id = %job_id,
        name = %name,
        sequence_len = sequence.len(),
        destination = ?destination.as_ref().map(ToString::to_string),
        "Folding job requested",
    );

    state
        .executor
        .submit(JobRequest {
            job_id: job_id.clone(),
            name,
            sequence,
            destination,
        })
        .await?;

    Ok(Json(SubmitResponse {
        job_id,
        status: JobStatus::Submitted,
    }))
}

/// GET /status/{job_id}
pub async fn get_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Json<JobRecord>> {
    let record = find_job(&state, &job_id).await?;
    Ok(Json(record))
}

/// GET /result/{job_id}
///
/// Streams the canonical `ranked_0.pdb` as an attachment once the job is
/// `completed`.
pub async fn get_result(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Response> {
    let record = find_job(&state, &job_id).await?;

    if record.status != JobStatus::Completed {
        return Err(AppError::BadRequest("Job not completed yet".into()));
    }

    let result_file = record.result_file.ok_or_else(|| CoreError::NotFound {
        entity: "Result file",
        id: job_id.clone(),
    })?;

    let bytes = match tokio::fs::read(&result_file).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(CoreError::NotFound {
                entity: "Result file",
                id: job_id,
            }
            .into())
        }
        Err(e) => {
            return Err(AppError::InternalError(format!(
                "Failed to read {}: {e}",
                result_file.display()
            )))
        }
    };

    let file_name = result_file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("{job_id}.pdb"));

    Ok((
        [
            (CONTENT_TYPE, "chemical/x-pdb".to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}

async fn find_job(state: &AppState, job_id: &str) -> Result<JobRecord, CoreError> {
    state
        .registry
        .get(job_id)
        .await
        .ok_or_else(|| CoreError::NotFound {
            entity: "Job",
            id: job_id.to_string(),
        })
}
