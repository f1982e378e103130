//! Core data models for the Vimeo upload service.
//!
//! Upload records map to SQLite rows via `sqlx::FromRow`; everything that
//! crosses the HTTP boundary serializes as JSON via `serde`.

pub mod privacy;
pub mod response;
pub mod upload;
pub mod video;
