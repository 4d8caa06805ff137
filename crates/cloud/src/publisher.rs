//! Result publication for finished jobs.
//!
//! [`Publisher::publish`] copies the artifact to a fixed path inside the
//! job directory and attempts the upload. Upload failure is reported as
//! `uploaded = false`, never as an error: only the local copy can fail a
//! publication.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use fold_core::output::CANONICAL_RESULT_FILE;

use crate::azure::AzureBlobStore;
use crate::destination::Destination;
use crate::presigned::PresignedUpload;
use crate::s3::S3Store;
use crate::store::ObjectStore;

/// Errors that prevent a result from being made available locally.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("failed to copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Outcome of a publication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    /// Canonical local copy of the artifact.
    pub result_file: PathBuf,
    /// Whether any upload path succeeded.
    pub uploaded: bool,
}

/// Copies artifacts to their canonical path and uploads them.
pub struct Publisher {
    aws: Arc<dyn ObjectStore>,
    azure: Arc<dyn ObjectStore>,
    fallback: PresignedUpload,
}

impl Publisher {
    /// Publisher with explicit provider stores.
    pub fn new(aws: Arc<dyn ObjectStore>, azure: Arc<dyn ObjectStore>) -> Self {
        Self {
            aws,
            azure,
            fallback: PresignedUpload::new(),
        }
    }

    /// Publisher with the real S3 and Azure stores.
    pub async fn from_env() -> Self {
        Self::new(
            Arc::new(S3Store::from_env().await),
            Arc::new(AzureBlobStore::new()),
        )
    }

    /// Upload `artifact` (when a destination is given) and copy it to
    /// `<job_dir>/ranked_0.pdb`.
    pub async fn publish(
        &self,
        job_id: &str,
        artifact: &Path,
        job_dir: &Path,
        destination: Option<&Destination>,
    ) -> Result<Publication, PublishError> {
        let uploaded = match destination {
            Some(dest) => self.upload(job_id, artifact, dest).await,
            None => false,
        };

        let result_file = job_dir.join(CANONICAL_RESULT_FILE);
        tokio::fs::copy(artifact, &result_file)
            .await
            .map_err(|source| PublishError::Copy {
                from: artifact.to_path_buf(),
                to: result_file.clone(),
                source,
            })?;

        Ok(Publication {
            result_file,
            uploaded,
        })
    }

    /// Primary store first, then the pre-authorized URL if there is one.
    async fn upload(&self, job_id: &str, artifact: &Path, destination: &Destination) -> bool {
        let primary = match destination {
            Destination::Aws { .. } => Some(&self.aws),
            Destination::Azure { .. } => Some(&self.azure),
            Destination::UrlOnly { .. } => None,
        };

        if let Some(store) = primary {
            match store.put(artifact, destination).await {
                Ok(()) => {
                    tracing::info!(
                        job_id,
                        store = store.name(),
                        destination = %destination,
                        "Result uploaded",
                    );
                    return true;
                }
                Err(e) => {
                    tracing::error!(
                        job_id,
                        store = store.name(),
                        error = %e,
                        "Primary upload failed",
                    );
                }
            }
        }

        let Some(url) = destination.fallback_url() else {
            return false;
        };

        tracing::info!(job_id, "Uploading result with pre-authorized URL");
        match self.fallback.put(url, artifact).await {
            Ok(()) => {
                tracing::info!(job_id, destination = %destination, "Result uploaded via pre-authorized URL");
                true
            }
            Err(e) => {
                tracing::error!(job_id, error = %e, "Pre-authorized URL upload failed");
                false
            }
        }
    }
}
