//! Bucket administration through the AWS SDK.
//!
//! OpenDAL operators are scoped to one bucket, so bucket-level calls
//! (existence check, creation, inventory) go through `aws-sdk-s3` with
//! path-style addressing, which MinIO requires.

use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::operation::head_bucket::HeadBucketError;
use aws_sdk_s3::primitives::DateTimeFormat;
use tracing::info;

use super::config::StorageProvider;
use super::error::StorageError;

/// Bucket listing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketInfo {
    /// Bucket name.
    pub name: String,
    /// Creation date (RFC 3339), when reported.
    pub creation_date: Option<String>,
}

/// Outcome of [`BucketAdmin::ensure_bucket`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketStatus {
    /// Bucket was already present.
    Existing,
    /// Bucket was created.
    Created,
}

/// Bucket-level operations against an S3-compatible server.
#[derive(Debug, Clone)]
pub struct BucketAdmin {
    client: Client,
}

impl BucketAdmin {
    /// Create an admin client for an S3-compatible endpoint.
    #[must_use]
    pub fn new(endpoint: &str, region: &str, access_key_id: &str, secret_access_key: &str) -> Self {
        let creds = Credentials::new(access_key_id, secret_access_key, None, None, "filegate");

        let config = aws_sdk_s3::Config::builder()
            .behavior_version_latest()
            .endpoint_url(endpoint)
            .region(Region::new(region.to_string()))
            .credentials_provider(creds)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(config),
        }
    }

    /// Admin client for the provider, if it is S3-compatible.
    #[must_use]
    pub fn for_provider(provider: &StorageProvider) -> Option<Self> {
        match provider {
            StorageProvider::S3 {
                endpoint,
                access_key_id,
                secret_access_key,
                region,
                ..
            } => Some(Self::new(endpoint, region, access_key_id, secret_access_key)),
            StorageProvider::LocalFs { .. } | StorageProvider::Memory => None,
        }
    }

    /// Make sure a bucket exists, creating it when missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the existence check or creation fails.
    pub async fn ensure_bucket(&self, bucket: &str) -> Result<BucketStatus, StorageError> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => {
                info!(bucket, "Bucket already exists");
                Ok(BucketStatus::Existing)
            }
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(HeadBucketError::is_not_found) =>
            {
                self.client
                    .create_bucket()
                    .bucket(bucket)
                    .send()
                    .await
                    .map_err(|e| {
                        StorageError::operation(format!(
                            "failed to create bucket '{bucket}': {}",
                            DisplayErrorContext(&e)
                        ))
                    })?;
                info!(bucket, "Created bucket");
                Ok(BucketStatus::Created)
            }
            Err(err) => Err(StorageError::operation(format!(
                "failed to check bucket '{bucket}': {}",
                DisplayErrorContext(&err)
            ))),
        }
    }

    /// List all buckets visible to the credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list_buckets(&self) -> Result<Vec<BucketInfo>, StorageError> {
        let output = self.client.list_buckets().send().await.map_err(|e| {
            StorageError::operation(format!(
                "failed to list buckets: {}",
                DisplayErrorContext(&e)
            ))
        })?;

        Ok(output
            .buckets()
            .iter()
            .map(|bucket| BucketInfo {
                name: bucket.name().unwrap_or_default().to_string(),
                creation_date: bucket
                    .creation_date()
                    .and_then(|date| date.fmt(DateTimeFormat::DateTime).ok()),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_only_for_s3() {
        let s3 = StorageProvider::s3(
            "http://localhost:9000",
            "api-uploads",
            "minioadmin",
            "minioadmin",
            "us-east-1",
        );
        assert!(BucketAdmin::for_provider(&s3).is_some());
        assert!(BucketAdmin::for_provider(&StorageProvider::Memory).is_none());
        assert!(BucketAdmin::for_provider(&StorageProvider::local_fs("./storage")).is_none());
    }
}
