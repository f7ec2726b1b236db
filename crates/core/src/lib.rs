//! Core storage logic for Filegate.
//!
//! This crate wraps the object store behind a small, typed API with ZERO web
//! dependencies. Handlers in `filegate-api` only translate HTTP to these calls.
//!
//! # Modules
//!
//! - `storage` - Object operations, bucket administration, R2 presigning

pub mod storage;
