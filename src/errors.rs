use crate::{
    models::response::{ApiResponse, MessageData},
    services::{
        record_store::StoreError, settings_service::SettingsError, upload_service::UploadError,
        vimeo_client::VimeoError,
    },
};
use axum::{
    Json,
    extract::{multipart::MultipartRejection, rejection::FormRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

/// Error returned by handlers; rendered as `{"success": false, "data": {"message": ...}}`.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    /// Shortcut for a failed anti-forgery or identity check.
    pub fn unauthorized() -> Self {
        Self::new(StatusCode::FORBIDDEN, "Unauthorized action")
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(ApiResponse::failure(MessageData::new(self.message)));
        (self.status, body).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::RecordNotFound(_) => AppError::not_found(err.to_string()),
            other => {
                tracing::error!("store error: {}", other);
                AppError::internal(other.to_string())
            }
        }
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        let status = match &err {
            UploadError::Unauthorized => StatusCode::FORBIDDEN,
            UploadError::NoFile
            | UploadError::MissingTempFile
            | UploadError::InvalidPrivacy(_)
            | UploadError::InvalidResponse(_)
            | UploadError::Malformed(_) => StatusCode::BAD_REQUEST,
            UploadError::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            UploadError::Staging(source) => {
                tracing::error!("staging failed: {}", source);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            UploadError::Remote(VimeoError::Request(_) | VimeoError::Upload(_)) => {
                StatusCode::BAD_GATEWAY
            }
            UploadError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        AppError::new(status, err.to_string())
    }
}

impl From<SettingsError> for AppError {
    fn from(err: SettingsError) -> Self {
        let status = match &err {
            SettingsError::Unauthorized => StatusCode::FORBIDDEN,
            SettingsError::MissingField(_) => StatusCode::BAD_REQUEST,
            SettingsError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        AppError::new(status, err.to_string())
    }
}

impl From<FormRejection> for AppError {
    fn from(rejection: FormRejection) -> Self {
        AppError::new(rejection.status(), rejection.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::new(rejection.status(), rejection.body_text())
    }
}
