//! Object storage for uploaded files using Apache OpenDAL.
//!
//! This module provides vendor-agnostic object storage with support for:
//! - S3-compatible: MinIO, Cloudflare R2, AWS S3
//! - Local filesystem (development only)
//! - In-memory (tests)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Apache OpenDAL                              │
//! │                   (Unified Storage API)                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ op.write_with("key", data) │ op.presign_read("key", duration)   │
//! │ op.reader("key")           │ op.presign_write_with(...)         │
//! │ op.list_with("/")          │ op.stat("key") / op.delete("key")  │
//! ├─────────────────────────────────────────────────────────────────┤
//! │        aws-sdk-s3: HeadBucket / CreateBucket / ListBuckets       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

mod buckets;
mod config;
mod error;
mod keys;
mod r2;
mod service;

pub use buckets::{BucketAdmin, BucketInfo, BucketStatus};
pub use config::{StorageConfig, StorageProvider};
pub use error::StorageError;
pub use keys::{DEFAULT_CONTENT_TYPE, content_type_for, object_key_from_filename};
pub use r2::{R2Presigner, R2_CACHE_CONTROL, R2_CONTENT_TYPE};
pub use service::{ObjectDownload, ObjectInfo, PresignedUrl, StorageService, UploadedObject};
