//! Read access to upload records and the public player embed.

use crate::{
    errors::AppError,
    handlers::auth::CurrentUser,
    models::{
        response::ApiResponse,
        upload::{UploadDetails, UploadSummary},
    },
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, State},
    response::Html,
};
use uuid::Uuid;

/// `GET /uploads` — records with their Vimeo id. With the author-only
/// setting on, non-admin users get just their own uploads.
pub async fn list_uploads(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<ApiResponse<Vec<UploadSummary>>>, AppError> {
    let author = if !user.is_admin && state.settings.credentials.author_uploads_only().await? {
        Some(user.id)
    } else {
        None
    };
    let records = state.records.get_records(author).await?;
    Ok(Json(ApiResponse::success(records)))
}

/// `GET /uploads/{id}` — one record with its privacy and Vimeo response.
pub async fn get_upload(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<UploadDetails>>, AppError> {
    let details = state.records.get_details(id).await?;
    Ok(Json(ApiResponse::success(details)))
}

/// `GET /uploads/{id}/embed` — responsive player iframe for a record.
pub async fn embed_upload(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Html<String>, AppError> {
    let vimeo_id = state
        .records
        .get_remote_id(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("upload `{}` has no Vimeo video", id)))?;

    Ok(Html(embed_html(&vimeo_id)))
}

fn embed_html(vimeo_id: &str) -> String {
    format!(
        concat!(
            r#"<div class="dgv-embed-container">"#,
            r#"<iframe src="https://player.vimeo.com/video/{}" frameborder="0" "#,
            r#"allow="autoplay; fullscreen; picture-in-picture" allowfullscreen></iframe>"#,
            r#"</div>"#
        ),
        html_escape(vimeo_id)
    )
}

fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embed_points_at_player() {
        let html = embed_html("76979871");
        assert!(html.contains(r#"src="https://player.vimeo.com/video/76979871""#));
        assert!(html.starts_with(r#"<div class="dgv-embed-container">"#));
    }

    #[test]
    fn embed_escapes_id() {
        assert!(embed_html(r#"1"><script>"#).contains("1&quot;&gt;&lt;script&gt;"));
    }
}
