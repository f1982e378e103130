//! Key/value option storage for the Vimeo API credentials and the listing
//! visibility switch.

use sqlx::SqlitePool;
use std::sync::Arc;

use super::record_store::StoreResult;

pub const OPTION_CLIENT_ID: &str = "dgv_client_id";
pub const OPTION_CLIENT_SECRET: &str = "dgv_client_secret";
pub const OPTION_ACCESS_TOKEN: &str = "dgv_access_token";
pub const OPTION_AUTHOR_UPLOADS_ONLY: &str = "dgv_author_uploads_only";

/// Vimeo API credentials. Unset options read back as empty strings.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub access_token: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Everything the settings form saves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub credentials: Credentials,

    /// Non-admin users only see their own uploads when set.
    pub author_uploads_only: bool,
}

#[derive(Clone)]
pub struct CredentialStore {
    db: Arc<SqlitePool>,
}

impl CredentialStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Read a single option, `None` when it was never saved.
    pub async fn get_option(&self, name: &str) -> StoreResult<Option<String>> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM options WHERE name = ?")
            .bind(name)
            .fetch_optional(&*self.db)
            .await?;
        Ok(value)
    }

    /// Load all three credentials.
    pub async fn load(&self) -> StoreResult<Credentials> {
        Ok(Credentials {
            client_id: self.get_option(OPTION_CLIENT_ID).await?.unwrap_or_default(),
            client_secret: self
                .get_option(OPTION_CLIENT_SECRET)
                .await?
                .unwrap_or_default(),
            access_token: self
                .get_option(OPTION_ACCESS_TOKEN)
                .await?
                .unwrap_or_default(),
        })
    }

    pub async fn author_uploads_only(&self) -> StoreResult<bool> {
        Ok(self.get_option(OPTION_AUTHOR_UPLOADS_ONLY).await?.as_deref() == Some("1"))
    }

    /// Persist every setting in one transaction, in the order client id,
    /// client secret, access token, author-only switch.
    pub async fn save(&self, settings: &Settings) -> StoreResult<()> {
        let credentials = &settings.credentials;
        let author_only = if settings.author_uploads_only { "1" } else { "0" };
        let mut tx = self.db.begin().await?;
        for (name, value) in [
            (OPTION_CLIENT_ID, credentials.client_id.as_str()),
            (OPTION_CLIENT_SECRET, credentials.client_secret.as_str()),
            (OPTION_ACCESS_TOKEN, credentials.access_token.as_str()),
            (OPTION_AUTHOR_UPLOADS_ONLY, author_only),
        ] {
            sqlx::query(
                "INSERT INTO options (name, value) VALUES (?, ?)
                 ON CONFLICT(name) DO UPDATE SET value = excluded.value",
            )
            .bind(name)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
