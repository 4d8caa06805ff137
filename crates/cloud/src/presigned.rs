//! Raw HTTP PUT to a pre-authorized URL (S3 pre-signed URL or Azure SAS URL).

use std::path::Path;

use crate::store::UploadError;

/// Header Azure requires on a SAS `PUT` creating a block blob. S3 ignores it.
const BLOB_TYPE_HEADER: &str = "x-ms-blob-type";

/// Uploads with a single `PUT` carrying the file as the request body.
#[derive(Debug, Clone, Default)]
pub struct PresignedUpload {
    client: reqwest::Client,
}

impl PresignedUpload {
    pub fn new() -> Self {
        Self::default()
    }

    /// `PUT` the file at `local` to `url`. Any 2xx answer is success.
    pub async fn put(&self, url: &str, local: &Path) -> Result<(), UploadError> {
        let bytes = tokio::fs::read(local).await?;

        let response = self
            .client
            .put(url)
            .header(BLOB_TYPE_HEADER, "BlockBlob")
            .body(bytes)
            .send()
            .await
            .map_err(|e| UploadError::Provider {
                provider: "http",
                message: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(UploadError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}
