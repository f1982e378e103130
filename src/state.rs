//! Shared state handed to every handler.

use crate::services::{
    credential_store::CredentialStore, nonce_service::NonceService, record_store::RecordStore,
    settings_service::SettingsService, upload_service::UploadService,
    vimeo_client::VimeoConnector,
};
use sqlx::SqlitePool;
use std::{path::PathBuf, sync::Arc};

/// Built once at startup and cloned into each request.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<SqlitePool>,
    pub uploads: UploadService,
    pub settings: SettingsService,
    pub records: RecordStore,
    pub nonces: NonceService,

    /// Directory multipart file bodies are spooled to.
    pub incoming_dir: PathBuf,
}

impl AppState {
    pub fn new(
        db: Arc<SqlitePool>,
        nonces: NonceService,
        connector: Arc<dyn VimeoConnector>,
        upload_dir: impl Into<PathBuf>,
        incoming_dir: impl Into<PathBuf>,
    ) -> Self {
        let credentials = CredentialStore::new(db.clone());
        let records = RecordStore::new(db.clone());
        Self {
            uploads: UploadService::new(
                credentials.clone(),
                records.clone(),
                nonces.clone(),
                connector,
                upload_dir,
            ),
            settings: SettingsService::new(credentials, nonces.clone()),
            records,
            nonces,
            incoming_dir: incoming_dir.into(),
            db,
        }
    }
}
