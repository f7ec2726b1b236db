//! Storage service implementation using Apache OpenDAL.

use std::collections::HashMap;
use std::io;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use futures::stream::BoxStream;
use opendal::{Metadata, Operator, services};
use tracing::debug;

use super::config::{StorageConfig, StorageProvider};
use super::error::StorageError;
use super::keys::validate_key;

/// Presigned URL for upload or download.
#[derive(Debug, Clone)]
pub struct PresignedUrl {
    /// The presigned URL.
    pub url: String,
    /// HTTP method to use (PUT for upload, GET for download).
    pub method: String,
    /// When the URL expires.
    pub expires_at: DateTime<Utc>,
    /// Required headers for the request.
    pub headers: HashMap<String, String>,
}

/// Object listing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Object key.
    pub key: String,
    /// Size in bytes.
    pub size: u64,
    /// Content type, when the backend reports it.
    pub content_type: Option<String>,
    /// Last modification time, when the backend reports it.
    pub last_modified: Option<String>,
}

impl ObjectInfo {
    fn from_metadata(key: impl Into<String>, meta: &Metadata) -> Self {
        Self {
            key: key.into(),
            size: meta.content_length(),
            content_type: meta.content_type().map(String::from),
            last_modified: meta.last_modified().map(|ts| ts.to_string()),
        }
    }
}

/// Result of a completed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedObject {
    /// Bucket the object was written to.
    pub bucket: String,
    /// Object key.
    pub key: String,
    /// Size in bytes.
    pub size: u64,
    /// Stored content type.
    pub content_type: String,
}

/// An object opened for streaming.
pub struct ObjectDownload {
    /// Object metadata.
    pub info: ObjectInfo,
    /// Object content.
    pub stream: BoxStream<'static, io::Result<Bytes>>,
}

impl std::fmt::Debug for ObjectDownload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectDownload")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

/// Storage service for uploaded files.
pub struct StorageService {
    operator: Operator,
    config: StorageConfig,
}

impl StorageService {
    /// Create a new storage service from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage provider cannot be initialized.
    pub fn from_config(config: StorageConfig) -> Result<Self, StorageError> {
        let operator = Self::create_operator(&config.provider)?;
        Ok(Self { operator, config })
    }

    /// Create OpenDAL operator from provider config.
    fn create_operator(provider: &StorageProvider) -> Result<Operator, StorageError> {
        match provider {
            StorageProvider::S3 {
                endpoint,
                bucket,
                access_key_id,
                secret_access_key,
                region,
            } => {
                let builder = services::S3::default()
                    .endpoint(endpoint)
                    .bucket(bucket)
                    .access_key_id(access_key_id)
                    .secret_access_key(secret_access_key)
                    .region(region);

                Ok(Operator::new(builder)
                    .map_err(|e| StorageError::configuration(e.to_string()))?
                    .finish())
            }
            StorageProvider::LocalFs { root } => {
                let builder = services::Fs::default().root(
                    root.to_str()
                        .ok_or_else(|| StorageError::configuration("invalid path"))?,
                );

                Ok(Operator::new(builder)
                    .map_err(|e| StorageError::configuration(e.to_string()))?
                    .finish())
            }
            StorageProvider::Memory => Ok(Operator::new(services::Memory::default())
                .map_err(|e| StorageError::configuration(e.to_string()))?
                .finish()),
        }
    }

    /// Validate an upload size against the configured limit.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::FileTooLarge` if the size exceeds the limit.
    pub fn validate_upload(&self, size: u64) -> Result<(), StorageError> {
        if size > self.config.max_file_size {
            return Err(StorageError::file_too_large(
                size,
                self.config.max_file_size,
            ));
        }
        Ok(())
    }

    /// Write an object.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid, the file is too large, or the
    /// backend write fails.
    pub async fn upload(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<UploadedObject, StorageError> {
        validate_key(key)?;
        let size = data.len() as u64;
        self.validate_upload(size)?;

        // Fs and memory backends reject a content type they cannot store.
        let mut write = self.operator.write_with(key, data);
        if self.operator.info().full_capability().write_with_content_type {
            write = write.content_type(content_type);
        }
        write
            .await
            .map_err(|e| StorageError::from_opendal(&e, key))?;

        debug!(bucket = %self.bucket(), key, size, "Object written");

        Ok(UploadedObject {
            bucket: self.bucket().to_string(),
            key: key.to_string(),
            size,
            content_type: content_type.to_string(),
        })
    }

    /// List every object in the bucket.
    ///
    /// Backends whose listings omit size or modification time (fs, memory)
    /// are completed with a stat per entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing fails.
    pub async fn list_objects(&self) -> Result<Vec<ObjectInfo>, StorageError> {
        let entries = self
            .operator
            .list_with("/")
            .recursive(true)
            .await
            .map_err(|e| StorageError::from_opendal(&e, "/"))?;

        let capability = self.operator.info().full_capability();
        let listing_complete =
            capability.list_has_content_length && capability.list_has_last_modified;

        let mut objects = Vec::with_capacity(entries.len());
        for entry in entries {
            if !entry.metadata().mode().is_file() {
                continue;
            }
            if listing_complete {
                objects.push(ObjectInfo::from_metadata(entry.path(), entry.metadata()));
                continue;
            }
            match self.operator.stat(entry.path()).await {
                Ok(meta) => objects.push(ObjectInfo::from_metadata(entry.path(), &meta)),
                // Deleted between list and stat.
                Err(e) if e.kind() == opendal::ErrorKind::NotFound => {}
                Err(e) => return Err(StorageError::from_opendal(&e, entry.path())),
            }
        }

        Ok(objects)
    }

    /// Fetch object metadata.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the object does not exist.
    pub async fn stat(&self, key: &str) -> Result<ObjectInfo, StorageError> {
        validate_key(key)?;
        let meta = self
            .operator
            .stat(key)
            .await
            .map_err(|e| StorageError::from_opendal(&e, key))?;

        Ok(ObjectInfo::from_metadata(key, &meta))
    }

    /// Open an object for streaming.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the object does not exist.
    pub async fn open(&self, key: &str) -> Result<ObjectDownload, StorageError> {
        let info = self.stat(key).await?;

        let stream = self
            .operator
            .reader(key)
            .await
            .map_err(|e| StorageError::from_opendal(&e, key))?
            .into_bytes_stream(..)
            .await
            .map_err(|e| StorageError::from_opendal(&e, key))?;

        Ok(ObjectDownload {
            info,
            stream: stream.boxed(),
        })
    }

    /// Delete an object. Deleting a missing object succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if deletion fails.
    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        self.operator
            .delete(key)
            .await
            .map_err(|e| StorageError::from_opendal(&e, key))
    }

    /// Generate presigned URL for download.
    ///
    /// # Errors
    ///
    /// Returns an error if presigning is not supported or fails.
    pub async fn presign_download(&self, key: &str) -> Result<PresignedUrl, StorageError> {
        validate_key(key)?;
        let ttl = Duration::from_secs(self.config.presign_ttl_secs);

        let presigned = self
            .operator
            .presign_read(key, ttl)
            .await
            .map_err(|e| StorageError::from_opendal_presign(&e, key))?;

        Ok(PresignedUrl {
            url: presigned.uri().to_string(),
            method: presigned.method().to_string(),
            expires_at: expires_at(self.config.presign_ttl_secs),
            headers: HashMap::new(),
        })
    }

    /// Get the storage provider name.
    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.config.provider.name()
    }

    /// Get the bucket name.
    #[must_use]
    pub fn bucket(&self) -> &str {
        self.config.provider.bucket()
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }
}

/// Absolute expiry for a TTL starting now.
pub(crate) fn expires_at(ttl_secs: u64) -> DateTime<Utc> {
    Utc::now() + chrono::Duration::seconds(i64::try_from(ttl_secs).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    fn memory_service() -> StorageService {
        StorageService::from_config(StorageConfig::new(StorageProvider::Memory))
            .expect("should create service")
    }

    async fn read_all(download: ObjectDownload) -> Vec<u8> {
        download
            .stream
            .try_fold(Vec::new(), |mut acc, chunk| async move {
                acc.extend_from_slice(&chunk);
                Ok(acc)
            })
            .await
            .expect("stream should complete")
    }

    #[test]
    fn test_validate_upload_size() {
        let config = StorageConfig::new(StorageProvider::Memory).with_max_file_size(1024);
        let service = StorageService::from_config(config).expect("should create service");

        assert!(service.validate_upload(512).is_ok());
        assert!(service.validate_upload(1024).is_ok());

        let err = service.validate_upload(2048).unwrap_err();
        assert!(matches!(err, StorageError::FileTooLarge { size: 2048, max: 1024 }));
    }

    #[tokio::test]
    async fn test_upload_and_open_round_trip() {
        let service = memory_service();

        let uploaded = service
            .upload("hello.txt", Bytes::from_static(b"hello world"), "text/plain")
            .await
            .expect("upload");
        assert_eq!(uploaded.key, "hello.txt");
        assert_eq!(uploaded.size, 11);
        assert_eq!(uploaded.bucket, "memory");

        let download = service.open("hello.txt").await.expect("open");
        assert_eq!(download.info.size, 11);
        assert_eq!(read_all(download).await, b"hello world");
    }

    #[tokio::test]
    async fn test_upload_too_large_is_rejected() {
        let config = StorageConfig::new(StorageProvider::Memory).with_max_file_size(4);
        let service = StorageService::from_config(config).expect("should create service");

        let err = service
            .upload("big.bin", Bytes::from_static(b"12345"), "application/octet-stream")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::FileTooLarge { .. }));
        assert!(matches!(
            service.stat("big.bin").await,
            Err(StorageError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_objects_recursive() {
        let service = memory_service();
        service
            .upload("a.txt", Bytes::from_static(b"a"), "text/plain")
            .await
            .expect("upload a");
        service
            .upload("nested/b.txt", Bytes::from_static(b"bb"), "text/plain")
            .await
            .expect("upload b");

        let mut keys: Vec<String> = service
            .list_objects()
            .await
            .expect("list")
            .into_iter()
            .map(|o| o.key)
            .collect();
        keys.sort();
        assert_eq!(keys, vec!["a.txt", "nested/b.txt"]);
    }

    #[tokio::test]
    async fn test_list_objects_reports_size_on_memory() {
        let service = memory_service();
        service
            .upload("a.txt", Bytes::from_static(b"hello world"), "text/plain")
            .await
            .expect("upload");

        let objects = service.list_objects().await.expect("list");
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].key, "a.txt");
        assert_eq!(objects[0].size, 11);
    }

    #[tokio::test]
    async fn test_list_objects_reports_size_and_mtime_on_local_fs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = StorageConfig::new(StorageProvider::local_fs(dir.path()));
        let service = StorageService::from_config(config).expect("should create service");
        service
            .upload("a.txt", Bytes::from_static(b"hello world"), "text/plain")
            .await
            .expect("upload a");
        service
            .upload("nested/b.txt", Bytes::from_static(b"bb"), "text/plain")
            .await
            .expect("upload b");

        let mut objects = service.list_objects().await.expect("list");
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].key, "a.txt");
        assert_eq!(objects[0].size, 11);
        assert!(objects[0].last_modified.is_some());
        assert_eq!(objects[1].key, "nested/b.txt");
        assert_eq!(objects[1].size, 2);
    }

    #[tokio::test]
    async fn test_list_empty_bucket() {
        let service = memory_service();
        assert!(service.list_objects().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn test_open_missing_object() {
        let service = memory_service();
        let err = service.open("missing.pdf").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { ref key } if key == "missing.pdf"));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let service = memory_service();
        service
            .upload("gone.txt", Bytes::from_static(b"x"), "text/plain")
            .await
            .expect("upload");

        service.delete("gone.txt").await.expect("first delete");
        service.delete("gone.txt").await.expect("second delete");
        assert!(matches!(
            service.stat("gone.txt").await,
            Err(StorageError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_presign_not_supported_by_memory() {
        let service = memory_service();
        let err = service.presign_download("file.txt").await.unwrap_err();
        assert!(matches!(err, StorageError::PresignNotSupported));
    }

    #[tokio::test]
    async fn test_presign_download_s3() {
        let config = StorageConfig::new(StorageProvider::s3(
            "http://localhost:9000",
            "api-uploads",
            "minioadmin",
            "minioadmin",
            "us-east-1",
        ))
        .with_presign_ttl(900);
        let service = StorageService::from_config(config).expect("should create service");

        let presigned = service.presign_download("report.pdf").await.expect("presign");
        assert_eq!(presigned.method, "GET");
        assert!(presigned.url.contains("api-uploads/report.pdf"));
        assert!(presigned.url.contains("X-Amz-Expires=900"));
        assert!(presigned.expires_at > Utc::now());
    }

    #[tokio::test]
    async fn test_local_fs_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = StorageConfig::new(StorageProvider::local_fs(dir.path()));
        let service = StorageService::from_config(config).expect("should create service");

        service
            .upload("local.txt", Bytes::from_static(b"on disk"), "text/plain")
            .await
            .expect("upload");
        let info = service.stat("local.txt").await.expect("stat");
        assert_eq!(info.size, 7);
        assert!(dir.path().join("local.txt").exists());
    }
}
