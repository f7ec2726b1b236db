//! Shared types, errors, and configuration for Filegate.
//!
//! This crate provides common pieces used across all other crates:
//! - Layered application configuration
//! - Application-wide error type with HTTP status mapping
//! - Client for the external token verification service

pub mod auth;
pub mod config;
pub mod error;

pub use auth::{AuthClient, AuthError, TokenError, extract_token};
pub use config::AppConfig;
pub use error::{AppError, AppResult};
