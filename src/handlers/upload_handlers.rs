//! `POST /ajax/dgv_handle_upload` — multipart video upload, and
//! `POST /ajax/dgv_store_upload` — record an upload the browser sent to
//! Vimeo directly.
//!
//! The file part is spooled to the incoming directory as it streams in; the
//! workflow itself lives in `UploadService`.

use crate::{
    errors::AppError,
    handlers::auth::CurrentUser,
    models::{response::ApiResponse, video::UploadResponse},
    services::upload_service::{
        IncomingFile, SPOOL_PREFIX, StoreUploadForm, UploadError, UploadForm, UploadRequest,
    },
    state::AppState,
};
use axum::{
    Form, Json,
    extract::{
        Multipart, State,
        multipart::{Field, MultipartError, MultipartRejection},
        rejection::FormRejection,
    },
    http::StatusCode,
};
use futures::{TryStreamExt, pin_mut};
use serde::Serialize;
use std::{io, path::Path};
use tempfile::TempPath;
use tokio::{fs::File, io::AsyncWriteExt};
use tokio_util::io::StreamReader;
use uuid::Uuid;

#[derive(Serialize, Debug)]
pub struct UploadData {
    pub message: String,
    pub response: UploadResponse,
    pub record_id: Option<Uuid>,
}

pub async fn handle_upload(
    State(state): State<AppState>,
    user: CurrentUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ApiResponse<UploadData>>, AppError> {
    let mut multipart = multipart?;
    let mut request = UploadRequest {
        nonce: None,
        file: None,
        form: UploadForm::default(),
    };

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let original_name = field.file_name().unwrap_or_default().to_string();
                // an empty file input still sends a part, but with no file name
                let temp = if original_name.is_empty() {
                    None
                } else {
                    Some(spool(field, &state.incoming_dir).await?)
                };
                request.file = Some(IncomingFile {
                    original_name,
                    temp,
                });
            }
            "nonce" => request.nonce = Some(field.text().await.map_err(malformed)?),
            "privacy_view" => {
                request.form.privacy_view = Some(field.text().await.map_err(malformed)?)
            }
            "title" => request.form.title = Some(field.text().await.map_err(malformed)?),
            "description" => {
                request.form.description = Some(field.text().await.map_err(malformed)?)
            }
            other => tracing::debug!("ignoring multipart field `{}`", other),
        }
    }

    let outcome = state.uploads.handle_upload(user.id, request).await?;

    Ok(Json(ApiResponse::success(UploadData {
        message: "Video uploaded successfully!".into(),
        response: outcome.response,
        record_id: outcome.record_id,
    })))
}

#[derive(Serialize, Debug)]
pub struct StoredData {
    pub message: String,
    pub record_id: Uuid,
}

pub async fn store_upload(
    State(state): State<AppState>,
    user: CurrentUser,
    form: Result<Form<StoreUploadForm>, FormRejection>,
) -> Result<Json<ApiResponse<StoredData>>, AppError> {
    let Form(form) = form?;
    let record_id = state.uploads.store_upload(user.id, form).await?;

    Ok(Json(ApiResponse::success(StoredData {
        message: "Video stored successfully!".into(),
        record_id,
    })))
}

/// Stream a file part into a new temp file under `dir`.
async fn spool(field: Field<'_>, dir: &Path) -> Result<TempPath, UploadError> {
    let temp = tempfile::Builder::new()
        .prefix(SPOOL_PREFIX)
        .tempfile_in(dir)
        .map_err(UploadError::Staging)?
        .into_temp_path();
    let mut file = File::create(&temp).await.map_err(UploadError::Staging)?;

    let reader = StreamReader::new(field.map_err(io::Error::other));
    pin_mut!(reader);
    tokio::io::copy(&mut reader, &mut file)
        .await
        .map_err(spool_error)?;
    file.flush().await.map_err(UploadError::Staging)?;

    Ok(temp)
}

/// Errors coming out of the request stream are the client's; anything else
/// happened while writing the spool file.
fn spool_error(err: io::Error) -> UploadError {
    match err
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<MultipartError>())
    {
        Some(multipart) => classify(multipart.status(), multipart.body_text()),
        None => UploadError::Staging(err),
    }
}

fn malformed(err: MultipartError) -> UploadError {
    classify(err.status(), err.body_text())
}

fn classify(status: StatusCode, message: String) -> UploadError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        UploadError::TooLarge
    } else {
        UploadError::Malformed(message)
    }
}
