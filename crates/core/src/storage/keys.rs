//! Object key and content type derivation for uploads.

use super::error::StorageError;

/// Content type used when neither the client nor the extension tells us.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Derive an object key from a client-supplied filename.
///
/// Browsers may send a full path; only the last segment is kept.
///
/// # Errors
///
/// Returns `StorageError::InvalidKey` for empty names, `.`/`..`, or names
/// containing control characters.
pub fn object_key_from_filename(filename: &str) -> Result<String, StorageError> {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if name.is_empty() || name == "." || name == ".." {
        return Err(StorageError::InvalidKey(filename.to_string()));
    }

    if name.chars().any(char::is_control) {
        return Err(StorageError::InvalidKey(filename.to_string()));
    }

    Ok(name.to_string())
}

/// Check a key received in a URL path before handing it to the backend.
///
/// # Errors
///
/// Returns `StorageError::InvalidKey` for empty keys, keys naming a
/// directory, or keys with `.`/`..` segments.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let invalid = key.is_empty()
        || key.ends_with('/')
        || key.chars().any(char::is_control)
        || key.split('/').any(|segment| segment == "." || segment == "..");

    if invalid {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Pick the content type for an upload.
///
/// A non-empty declared type wins; otherwise it is guessed from the
/// extension, falling back to `application/octet-stream`.
#[must_use]
pub fn content_type_for(filename: &str, declared: Option<&str>) -> String {
    if let Some(declared) = declared.map(str::trim).filter(|ct| !ct.is_empty()) {
        return declared.to_string();
    }

    mime_guess::from_path(filename)
        .first_raw()
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string()
}
