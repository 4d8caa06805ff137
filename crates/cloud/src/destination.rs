//! Where a finished artifact should be uploaded.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Upload target for a job's artifact, tagged by cloud provider.
///
/// Each structured variant may carry a pre-authorized URL used as a
/// fallback when the credentialed upload fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "platform", rename_all = "snake_case")]
pub enum Destination {
    /// S3 object, uploaded with the default AWS credential chain.
    Aws {
        bucket: String,
        object_key: String,
        presigned_url: Option<String>,
    },
    /// Azure blob, uploaded with managed identity / environment credentials.
    Azure {
        storage_account: String,
        container_name: String,
        blob_name: String,
        sas_url: Option<String>,
    },
    /// Only a pre-authorized URL; uploaded with a plain PUT.
    UrlOnly { url: String },
}

impl Destination {
    /// The pre-authorized URL, if any.
    pub fn fallback_url(&self) -> Option<&str> {
        match self {
            Self::Aws { presigned_url, .. } => presigned_url.as_deref(),
            Self::Azure { sas_url, .. } => sas_url.as_deref(),
            Self::UrlOnly { url } => Some(url),
        }
    }
}

/// Description safe to log and to show in status records: never includes
/// the signed URL's query string.
impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aws {
                bucket, object_key, ..
            } => write!(f, "s3://{bucket}/{object_key}"),
            Self::Azure {
                storage_account,
                container_name,
                blob_name,
                ..
            } => write!(
                f,
                "https://{storage_account}.blob.core.windows.net/{container_name}/{blob_name}"
            ),
            Self::UrlOnly { url } => {
                let without_query = url.split('?').next().unwrap_or(url);
                write!(f, "{without_query}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_url_per_variant() {
        let aws = Destination::Aws {
            bucket: "b".into(),
            object_key: "k".into(),
            presigned_url: Some("https://b.s3.amazonaws.com/k?X-Amz-Signature=abc".into()),
        };
        assert!(aws.fallback_url().is_some());

        let azure = Destination::Azure {
            storage_account: "acct".into(),
            container_name: "c".into(),
            blob_name: "n".into(),
            sas_url: None,
        };
        assert!(azure.fallback_url().is_none());
    }

    #[test]
    fn display_hides_signature() {
        let dest = Destination::UrlOnly {
            url: "https://acct.blob.core.windows.net/c/n.pdb?sv=2022&sig=secret".into(),
        };
        assert_eq!(dest.to_string(), "https://acct.blob.core.windows.net/c/n.pdb");

        let aws = Destination::Aws {
            bucket: "results".into(),
            object_key: "jobs/job-1.pdb".into(),
            presigned_url: Some("https://x?sig=secret".into()),
        };
        assert_eq!(aws.to_string(), "s3://results/jobs/job-1.pdb");
    }

    #[test]
    fn serializes_with_platform_tag() {
        let azure = Destination::Azure {
            storage_account: "acct".into(),
            container_name: "c".into(),
            blob_name: "n".into(),
            sas_url: None,
        };
        let json = serde_json::to_value(&azure).unwrap();
        assert_eq!(json["platform"], "azure");
        assert_eq!(json["blob_name"], "n");
    }
}
