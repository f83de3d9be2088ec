//! # tally-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve `/api/visitor`: any method increments the counter and returns
//!   `{"visitors": <count>}`
//! - Serve `/health` for liveness probes
//! - Map application errors into opaque `5xx` JSON responses
//! - Optionally answer CORS requests for browser callers
//!
//! ## Dependency rule
//! Depends on `tally-app` (for port traits and services) and `tally-domain`
//! (for error types used in response mapping). Never leaks axum types
//! into the domain.

pub mod api;
pub mod error;
pub mod router;
pub mod state;
