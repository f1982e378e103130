use crate::{
    errors::AppError,
    handlers::auth::CurrentUser,
    models::response::{ApiResponse, MessageData},
    services::settings_service::SettingsForm,
    state::AppState,
};
use axum::{
    Form, Json,
    extract::{State, rejection::FormRejection},
};
use serde::Serialize;

/// `POST /ajax/dgv_handle_settings` — save the Vimeo credentials.
pub async fn handle_settings(
    State(state): State<AppState>,
    user: CurrentUser,
    form: Result<Form<SettingsForm>, FormRejection>,
) -> Result<Json<ApiResponse<MessageData>>, AppError> {
    let Form(form) = form?;
    state.settings.handle_settings(user.id, form).await?;
    Ok(Json(ApiResponse::success(MessageData::new(
        "Settings saved successfully!",
    ))))
}

#[derive(Serialize, Debug)]
pub struct NonceData {
    pub nonce: String,
    pub action: String,
}

/// `GET /nonce` — anti-forgery token for the current user, to be sent back
/// as the `nonce` field of state-changing requests.
pub async fn issue_nonce(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Json<ApiResponse<NonceData>> {
    Json(ApiResponse::success(NonceData {
        nonce: state.nonces.create(user.id),
        action: state.nonces.action().to_string(),
    }))
}
