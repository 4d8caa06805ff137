//! Amazon S3 uploads through the AWS SDK.

use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;

use crate::destination::Destination;
use crate::store::{ObjectStore, UploadError};

const PROVIDER: &str = "s3";

/// [`ObjectStore`] for [`Destination::Aws`].
///
/// Credentials come from the default AWS provider chain (environment,
/// profile, instance role).
#[derive(Debug, Clone)]
pub struct S3Store {
    client: aws_sdk_s3::Client,
}

impl S3Store {
    /// Build a client from the ambient AWS configuration.
    pub async fn from_env() -> Self {
        let config = aws_config::load_from_env().await;
        Self {
            client: aws_sdk_s3::Client::new(&config),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn put(&self, local: &Path, destination: &Destination) -> Result<(), UploadError> {
        let Destination::Aws {
            bucket, object_key, ..
        } = destination
        else {
            return Err(UploadError::UnsupportedDestination {
                store: PROVIDER,
                destination: destination.to_string(),
            });
        };

        let body = ByteStream::from_path(local)
            .await
            .map_err(|e| UploadError::Provider {
                provider: PROVIDER,
                message: e.to_string(),
            })?;

        tracing::info!(bucket = %bucket, key = %object_key, "Uploading result to S3");

        self.client
            .put_object()
            .bucket(bucket)
            .key(object_key)
            .body(body)
            .send()
            .await
            .map_err(|e| UploadError::Provider {
                provider: PROVIDER,
                message: DisplayErrorContext(&e).to_string(),
            })?;

        Ok(())
    }
}
