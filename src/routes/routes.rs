//! Defines routes for the upload service.
//!
//! ## Structure
//! - **Ajax endpoints** (POST, require `x-user-id` and a `nonce` field)
//!   - `POST /ajax/dgv_handle_upload`   — multipart video upload
//!   - `POST /ajax/dgv_handle_settings` — save Vimeo credentials
//!   - `POST /ajax/dgv_store_upload`    — record a browser-side Vimeo upload
//!
//! - **Read endpoints**
//!   - `GET /nonce`               — anti-forgery token for the current user
//!   - `GET /uploads`             — list upload records
//!   - `GET /uploads/{id}`        — one record with privacy and Vimeo response
//!   - `GET /uploads/{id}/embed`  — player iframe (public)
//!
//! - **Probes**: `GET /healthz`, `GET /readyz`

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        record_handlers::{embed_upload, get_upload, list_uploads},
        settings_handlers::{handle_settings, issue_nonce},
        upload_handlers::{handle_upload, store_upload},
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Build the router; `max_upload_bytes` caps the upload request body.
pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route(
            "/ajax/dgv_handle_upload",
            post(handle_upload).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/ajax/dgv_handle_settings", post(handle_settings))
        .route("/ajax/dgv_store_upload", post(store_upload))
        .route("/nonce", get(issue_nonce))
        .route("/uploads", get(list_uploads))
        .route("/uploads/{id}", get(get_upload))
        .route("/uploads/{id}/embed", get(embed_upload))
}
