//! Azure Blob Storage uploads through `object_store`.

use std::path::Path;

use async_trait::async_trait;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore as _, PutPayload};

use crate::destination::Destination;
use crate::store::{ObjectStore, UploadError};

const PROVIDER: &str = "azure";

/// [`ObjectStore`] for [`Destination::Azure`].
///
/// A client is built per upload because account and container come from
/// the request. Credentials are read from the `AZURE_*` environment
/// variables; with none set, the managed identity endpoint is used.
#[derive(Debug, Clone, Default)]
pub struct AzureBlobStore;

impl AzureBlobStore {
    pub fn new() -> Self {
        Self
    }
}

fn provider_error(e: impl std::fmt::Display) -> UploadError {
    UploadError::Provider {
        provider: PROVIDER,
        message: e.to_string(),
    }
}

#[async_trait]
impl ObjectStore for AzureBlobStore {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn put(&self, local: &Path, destination: &Destination) -> Result<(), UploadError> {
        let Destination::Azure {
            storage_account,
            container_name,
            blob_name,
            ..
        } = destination
        else {
            return Err(UploadError::UnsupportedDestination {
                store: PROVIDER,
                destination: destination.to_string(),
            });
        };

        let store = MicrosoftAzureBuilder::from_env()
            .with_account(storage_account)
            .with_container_name(container_name)
            .build()
            .map_err(provider_error)?;

        let location = ObjectPath::parse(blob_name).map_err(provider_error)?;
        let bytes = tokio::fs::read(local).await?;

        tracing::info!(
            account = %storage_account,
            container = %container_name,
            blob = %blob_name,
            "Uploading result to Azure Blob Storage",
        );

        store
            .put(&location, PutPayload::from(bytes))
            .await
            .map_err(provider_error)?;

        Ok(())
    }
}
