//! Validation and persistence of the Vimeo API credentials.

use crate::services::{
    credential_store::{CredentialStore, Credentials, Settings},
    nonce_service::NonceService,
    record_store::StoreError,
};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Unauthorized action")]
    Unauthorized,
    #[error("Error: {0} is required.")]
    MissingField(&'static str),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Body of `POST /ajax/dgv_handle_settings`.
#[derive(Debug, Default, Deserialize)]
pub struct SettingsForm {
    pub nonce: Option<String>,
    pub dgv_client_id: Option<String>,
    pub dgv_client_secret: Option<String>,
    pub dgv_access_token: Option<String>,

    /// Checkbox; `1` when ticked, absent otherwise.
    pub dgv_author_uploads_only: Option<String>,
}

#[derive(Clone)]
pub struct SettingsService {
    pub credentials: CredentialStore,
    pub nonces: NonceService,
}

impl SettingsService {
    pub fn new(credentials: CredentialStore, nonces: NonceService) -> Self {
        Self {
            credentials,
            nonces,
        }
    }

    /// Validate the three credentials, then save them together with the
    /// author-only switch.
    ///
    /// Nothing is written unless every credential is present and non-blank;
    /// the first failing field (in form order) is reported.
    pub async fn handle_settings(
        &self,
        user_id: i64,
        form: SettingsForm,
    ) -> Result<(), SettingsError> {
        let nonce = form.nonce.as_deref().unwrap_or_default();
        if !self.nonces.verify(nonce, user_id) {
            return Err(SettingsError::Unauthorized);
        }

        let credentials = Credentials {
            client_id: required(form.dgv_client_id, "Client ID")?,
            client_secret: required(form.dgv_client_secret, "Client Secret")?,
            access_token: required(form.dgv_access_token, "Access Token")?,
        };

        let settings = Settings {
            credentials,
            author_uploads_only: form.dgv_author_uploads_only.as_deref().map(str::trim) == Some("1"),
        };

        self.credentials.save(&settings).await?;
        info!("Vimeo credentials updated by user {}", user_id);
        Ok(())
    }
}

fn required(value: Option<String>, label: &'static str) -> Result<String, SettingsError> {
    match value.as_deref().map(str::trim) {
        Some(trimmed) if !trimmed.is_empty() => Ok(trimmed.to_string()),
        _ => Err(SettingsError::MissingField(label)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use std::sync::Arc;

    const USER: i64 = 1;

    async fn service() -> SettingsService {
        let db = Arc::new(test_pool().await);
        SettingsService::new(
            CredentialStore::new(db),
            NonceService::new("secret", "dgvsecurity"),
        )
    }

    fn full_form(service: &SettingsService) -> SettingsForm {
        SettingsForm {
            nonce: Some(service.nonces.create(USER)),
            dgv_client_id: Some("client".into()),
            dgv_client_secret: Some("shh".into()),
            dgv_access_token: Some("token".into()),
            dgv_author_uploads_only: None,
        }
    }

    #[tokio::test]
    async fn saves_all_three_fields() {
        let service = service().await;
        service
            .handle_settings(USER, full_form(&service))
            .await
            .unwrap();

        let saved = service.credentials.load().await.unwrap();
        assert_eq!(saved.client_id, "client");
        assert_eq!(saved.client_secret, "shh");
        assert_eq!(saved.access_token, "token");
        assert!(!service.credentials.author_uploads_only().await.unwrap());
    }

    #[tokio::test]
    async fn ticked_checkbox_enables_author_only_listing() {
        let service = service().await;
        let form = SettingsForm {
            dgv_author_uploads_only: Some("1".into()),
            ..full_form(&service)
        };
        service.handle_settings(USER, form).await.unwrap();
        assert!(service.credentials.author_uploads_only().await.unwrap());
    }

    #[tokio::test]
    async fn missing_field_is_named_and_nothing_is_saved() {
        let service = service().await;
        let form = SettingsForm {
            dgv_client_secret: None,
            ..full_form(&service)
        };
        let err = service.handle_settings(USER, form).await.unwrap_err();

        assert_eq!(err.to_string(), "Error: Client Secret is required.");
        assert_eq!(service.credentials.load().await.unwrap(), Credentials::default());
    }

    #[tokio::test]
    async fn blank_field_counts_as_missing() {
        let service = service().await;
        let form = SettingsForm {
            dgv_access_token: Some("   ".into()),
            ..full_form(&service)
        };
        let err = service.handle_settings(USER, form).await.unwrap_err();
        assert_eq!(err.to_string(), "Error: Access Token is required.");
    }

    #[tokio::test]
    async fn first_missing_field_wins() {
        let service = service().await;
        let form = SettingsForm {
            nonce: Some(service.nonces.create(USER)),
            ..SettingsForm::default()
        };
        let err = service.handle_settings(USER, form).await.unwrap_err();
        assert_eq!(err.to_string(), "Error: Client ID is required.");
    }

    #[tokio::test]
    async fn bad_nonce_is_unauthorized_and_saves_nothing() {
        let service = service().await;
        let form = SettingsForm {
            nonce: Some("bogus".into()),
            ..full_form(&service)
        };
        let err = service.handle_settings(USER, form).await.unwrap_err();

        assert!(matches!(err, SettingsError::Unauthorized));
        assert_eq!(service.credentials.load().await.unwrap(), Credentials::default());
    }
}
