//! Presigned direct uploads to Cloudflare R2.
//!
//! The caller names the target bucket, so one OpenDAL operator is built per
//! bucket and kept in a small cache.

use std::collections::HashMap;
use std::time::Duration;

use moka::sync::Cache;
use opendal::{Operator, services};
use tracing::debug;

use super::error::StorageError;
use super::keys::validate_key;
use super::service::{PresignedUrl, expires_at};

/// Content type signed into every R2 upload URL.
pub const R2_CONTENT_TYPE: &str = "application/octet-stream";

/// Cache policy signed into every R2 upload URL.
pub const R2_CACHE_CONTROL: &str = "no-store, no-cache, must-revalidate, max-age=0";

/// Expiry used when the caller does not ask for one.
const DEFAULT_EXPIRY_SECS: u64 = 3600;

const MAX_CACHED_BUCKETS: u64 = 64;

/// Issues presigned PUT URLs against an R2 account.
pub struct R2Presigner {
    endpoint: String,
    access_key_id: String,
    secret_access_key: String,
    region: String,
    max_expiry_secs: u64,
    operators: Cache<String, Operator>,
}

impl std::fmt::Debug for R2Presigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("R2Presigner")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("max_expiry_secs", &self.max_expiry_secs)
            .finish_non_exhaustive()
    }
}

impl R2Presigner {
    /// Create a presigner for the R2 endpoint.
    #[must_use]
    pub fn new(
        endpoint: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        region: impl Into<String>,
        max_expiry_secs: u64,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            region: region.into(),
            max_expiry_secs,
            operators: Cache::new(MAX_CACHED_BUCKETS),
        }
    }

    /// Resolve the lifetime of a URL from the requested seconds.
    ///
    /// Missing, zero, or negative values fall back to one hour.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidExpiry` above the configured maximum.
    pub fn resolve_expiry(&self, requested: Option<i64>) -> Result<u64, StorageError> {
        let secs = requested
            .and_then(|secs| u64::try_from(secs).ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_EXPIRY_SECS);

        if secs > self.max_expiry_secs {
            return Err(StorageError::InvalidExpiry {
                requested: secs,
                max: self.max_expiry_secs,
            });
        }
        Ok(secs)
    }

    /// Presign a direct upload of `key` into `bucket`.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid names or expiry, or if signing fails.
    pub async fn presign_upload(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Option<i64>,
    ) -> Result<PresignedUrl, StorageError> {
        validate_bucket_name(bucket)?;
        validate_key(key)?;
        let ttl_secs = self.resolve_expiry(expires_in)?;

        let operator = self.operator_for(bucket)?;
        let presigned = operator
            .presign_write_with(key, Duration::from_secs(ttl_secs))
            .content_type(R2_CONTENT_TYPE)
            .cache_control(R2_CACHE_CONTROL)
            .await
            .map_err(|e| StorageError::from_opendal_presign(&e, key))?;

        let mut headers = HashMap::new();
        for (name, value) in presigned.header() {
            if let Ok(value) = value.to_str() {
                set_header(&mut headers, name.as_str(), value);
            }
        }
        set_header(&mut headers, "Content-Type", R2_CONTENT_TYPE);
        set_header(&mut headers, "Cache-Control", R2_CACHE_CONTROL);
        set_header(&mut headers, "Pragma", "no-cache");
        set_header(&mut headers, "Expires", "0");

        debug!(bucket, key, ttl_secs, "Presigned R2 upload");

        Ok(PresignedUrl {
            url: presigned.uri().to_string(),
            method: presigned.method().to_string(),
            expires_at: expires_at(ttl_secs),
            headers,
        })
    }

    fn operator_for(&self, bucket: &str) -> Result<Operator, StorageError> {
        if let Some(operator) = self.operators.get(bucket) {
            return Ok(operator);
        }

        let builder = services::S3::default()
            .endpoint(&self.endpoint)
            .bucket(bucket)
            .access_key_id(&self.access_key_id)
            .secret_access_key(&self.secret_access_key)
            .region(&self.region);

        let operator = Operator::new(builder)
            .map_err(|e| StorageError::configuration(e.to_string()))?
            .finish();

        self.operators.insert(bucket.to_string(), operator.clone());
        Ok(operator)
    }
}

/// Insert a header, replacing any entry whose name differs only in case.
fn set_header(headers: &mut HashMap<String, String>, name: &str, value: &str) {
    headers.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
    headers.insert(name.to_string(), value.to_string());
}

/// S3 bucket naming rules: 3-63 chars of lowercase letters, digits, `.`
/// and `-`, starting and ending with a letter or digit.
fn validate_bucket_name(bucket: &str) -> Result<(), StorageError> {
    let valid_len = (3..=63).contains(&bucket.len());
    let valid_chars = bucket
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-');
    let valid_edges = bucket
        .chars()
        .next()
        .zip(bucket.chars().last())
        .is_some_and(|(first, last)| first.is_ascii_alphanumeric() && last.is_ascii_alphanumeric());

    if valid_len && valid_chars && valid_edges {
        Ok(())
    } else {
        Err(StorageError::InvalidBucket(bucket.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn presigner() -> R2Presigner {
        R2Presigner::new(
            "https://acct123.r2.cloudflarestorage.com",
            "r2-key",
            "r2-secret",
            "auto",
            604_800,
        )
    }

    #[rstest]
    #[case(None, 3600)]
    #[case(Some(0), 3600)]
    #[case(Some(-5), 3600)]
    #[case(Some(900), 900)]
    #[case(Some(604_800), 604_800)]
    fn test_resolve_expiry(#[case] requested: Option<i64>, #[case] expected: u64) {
        assert_eq!(presigner().resolve_expiry(requested).unwrap(), expected);
    }

    #[test]
    fn test_resolve_expiry_above_max() {
        let err = presigner().resolve_expiry(Some(604_801)).unwrap_err();
        assert!(matches!(err, StorageError::InvalidExpiry { max: 604_800, .. }));
    }

    #[rstest]
    #[case("uploads", true)]
    #[case("my-bucket.v2", true)]
    #[case("ab", false)]
    #[case("Uploads", false)]
    #[case("-uploads", false)]
    #[case("uploads_", false)]
    #[case("", false)]
    fn test_validate_bucket_name(#[case] bucket: &str, #[case] ok: bool) {
        assert_eq!(validate_bucket_name(bucket).is_ok(), ok);
    }

    #[test]
    fn test_set_header_replaces_case_insensitively() {
        let mut headers = HashMap::new();
        set_header(&mut headers, "content-type", "text/plain");
        set_header(&mut headers, "Content-Type", R2_CONTENT_TYPE);
        assert_eq!(headers.len(), 1);
        assert_eq!(headers["Content-Type"], R2_CONTENT_TYPE);
    }

    #[tokio::test]
    async fn test_presign_upload() {
        let presigner = presigner();
        let presigned = presigner
            .presign_upload("uploads", "videos/clip.mp4", Some(900))
            .await
            .expect("presign");

        assert_eq!(presigned.method, "PUT");
        assert!(
            presigned
                .url
                .starts_with("https://acct123.r2.cloudflarestorage.com/uploads/videos/clip.mp4")
        );
        assert!(presigned.url.contains("X-Amz-Expires=900"));
        assert_eq!(presigned.headers["Cache-Control"], R2_CACHE_CONTROL);
        assert_eq!(presigned.headers["Content-Type"], R2_CONTENT_TYPE);
        assert_eq!(presigned.headers["Pragma"], "no-cache");
        assert_eq!(presigned.headers["Expires"], "0");
    }

    #[tokio::test]
    async fn test_presign_upload_reuses_operator() {
        let presigner = presigner();
        presigner
            .presign_upload("uploads", "a.bin", None)
            .await
            .expect("first");
        presigner
            .presign_upload("uploads", "b.bin", None)
            .await
            .expect("second");
        presigner.operators.run_pending_tasks();
        assert_eq!(presigner.operators.entry_count(), 1);
    }

    #[tokio::test]
    async fn test_presign_upload_rejects_bad_input() {
        let presigner = presigner();
        assert!(matches!(
            presigner.presign_upload("Bad_Bucket", "a.bin", None).await,
            Err(StorageError::InvalidBucket(_))
        ));
        assert!(matches!(
            presigner.presign_upload("uploads", "", None).await,
            Err(StorageError::InvalidKey(_))
        ));
    }
}
