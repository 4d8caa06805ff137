use std::path::Path;

use async_trait::async_trait;

use crate::destination::Destination;

/// Errors from a single upload attempt.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// The local artifact could not be read.
    #[error("failed to read artifact: {0}")]
    Io(#[from] std::io::Error),

    /// The store does not handle this kind of destination.
    #[error("{store} cannot upload to {destination}")]
    UnsupportedDestination {
        store: &'static str,
        destination: String,
    },

    /// The provider SDK or HTTP layer reported a failure.
    #[error("{provider} upload failed: {message}")]
    Provider {
        provider: &'static str,
        message: String,
    },

    /// The remote end answered with a non-success status.
    #[error("upload rejected ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// A durable object store: "put these bytes at this named location".
///
/// One implementation per cloud provider. Transient failures are returned
/// as errors; the caller decides whether to fall back.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &'static str;

    /// Upload the file at `local` to `destination`.
    async fn put(&self, local: &Path, destination: &Destination) -> Result<(), UploadError>;
}
