//! HTTP middleware: correlation IDs, request logging, CORS, and auth.

pub mod auth;
pub mod correlation;
pub mod cors;
pub mod trace;
