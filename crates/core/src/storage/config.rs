//! Storage configuration types.

use std::path::PathBuf;

/// Storage provider configuration.
#[derive(Debug, Clone)]
pub enum StorageProvider {
    /// S3-compatible storage: MinIO, Cloudflare R2, AWS S3
    S3 {
        /// S3 endpoint URL.
        endpoint: String,
        /// S3 bucket name.
        bucket: String,
        /// Access key ID.
        access_key_id: String,
        /// Secret access key.
        secret_access_key: String,
        /// Signing region.
        region: String,
    },
    /// Local filesystem (development only)
    LocalFs {
        /// Root directory path.
        root: PathBuf,
    },
    /// Process memory (tests)
    Memory,
}

impl StorageProvider {
    /// Create S3-compatible provider (MinIO, Cloudflare R2, AWS S3).
    #[must_use]
    pub fn s3(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self::S3 {
            endpoint: endpoint.into(),
            bucket: bucket.into(),
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            region: region.into(),
        }
    }

    /// Create local filesystem provider (development only).
    #[must_use]
    pub fn local_fs(root: impl Into<PathBuf>) -> Self {
        Self::LocalFs { root: root.into() }
    }

    /// Get the provider name for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::S3 { .. } => "s3",
            Self::LocalFs { .. } => "local",
            Self::Memory => "memory",
        }
    }

    /// Get the bucket name.
    #[must_use]
    pub fn bucket(&self) -> &str {
        match self {
            Self::S3 { bucket, .. } => bucket,
            Self::LocalFs { root } => root.to_str().unwrap_or("local"),
            Self::Memory => "memory",
        }
    }
}

/// Storage service configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Storage provider configuration.
    pub provider: StorageProvider,
    /// Maximum file size in bytes.
    pub max_file_size: u64,
    /// Presigned URL TTL in seconds.
    pub presign_ttl_secs: u64,
}

impl StorageConfig {
    /// Default max file size: 100MB.
    pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;
    /// Default presign TTL: 1 hour.
    pub const DEFAULT_PRESIGN_TTL: u64 = 3600;

    /// Create a new storage config with default settings.
    #[must_use]
    pub fn new(provider: StorageProvider) -> Self {
        Self {
            provider,
            max_file_size: Self::DEFAULT_MAX_FILE_SIZE,
            presign_ttl_secs: Self::DEFAULT_PRESIGN_TTL,
        }
    }

    /// Set maximum file size.
    #[must_use]
    pub fn with_max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = size;
        self
    }

    /// Set presigned URL TTL.
    #[must_use]
    pub fn with_presign_ttl(mut self, secs: u64) -> Self {
        self.presign_ttl_secs = secs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_provider_s3() {
        let provider = StorageProvider::s3(
            "http://localhost:9000",
            "api-uploads",
            "access_key",
            "secret_key",
            "us-east-1",
        );
        assert_eq!(provider.name(), "s3");
        assert_eq!(provider.bucket(), "api-uploads");
    }

    #[test]
    fn test_storage_provider_local() {
        let provider = StorageProvider::local_fs("./storage");
        assert_eq!(provider.name(), "local");
        assert_eq!(provider.bucket(), "./storage");
    }

    #[test]
    fn test_storage_config_defaults() {
        let config = StorageConfig::new(StorageProvider::Memory);
        assert_eq!(config.max_file_size, StorageConfig::DEFAULT_MAX_FILE_SIZE);
        assert_eq!(config.presign_ttl_secs, StorageConfig::DEFAULT_PRESIGN_TTL);

        let config = config.with_max_file_size(10).with_presign_ttl(60);
        assert_eq!(config.max_file_size, 10);
        assert_eq!(config.presign_ttl_secs, 60);
    }
}
