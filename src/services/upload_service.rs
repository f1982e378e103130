//! UploadService — the upload-and-persist workflow.
//!
//! An upload is checked, moved from the incoming spool into the staging
//! directory under a sanitized unique name, sent to Vimeo, and recorded.
//! Incoming and staged files are held as `TempPath` guards so they are
//! removed on every exit path, including Vimeo failures.
//!
//! Browsers that upload straight to Vimeo only report the result back; that
//! path goes through [`UploadService::store_upload`] and skips the file steps.

use crate::{
    models::{
        privacy::{Privacy, PrivacyView},
        upload::{META_PRIVACY, META_RESPONSE, NewUploadRecord},
        video::{UploadResponse, VideoMetadata},
    },
    services::{
        credential_store::CredentialStore,
        nonce_service::NonceService,
        record_store::{RecordStore, StoreError},
        sanitize::{staging_file_name, strip_all_tags},
        vimeo_client::{VimeoConnector, VimeoError},
    },
};
use serde::{Deserialize, Serialize};
use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};
use tempfile::{PathPersistError, TempPath};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Unauthorized action")]
    Unauthorized,
    #[error("No file uploaded...")]
    NoFile,
    #[error("File does not exist on the server.")]
    MissingTempFile,
    #[error("Error uploading file. Please check your disk space or permissions.")]
    Staging(#[source] io::Error),
    #[error("Invalid privacy view: `{0}`.")]
    InvalidPrivacy(String),
    #[error("Malformed upload request: {0}")]
    Malformed(String),
    #[error("The uploaded file exceeds the maximum upload size.")]
    TooLarge,
    #[error("Invalid Vimeo response: {0}")]
    InvalidResponse(String),
    #[error(transparent)]
    Remote(#[from] VimeoError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type UploadResult<T> = Result<T, UploadError>;

/// Name prefix of request bodies spooled to the incoming directory.
pub const SPOOL_PREFIX: &str = ".incoming-";

/// The `file` part of an upload request.
#[derive(Debug)]
pub struct IncomingFile {
    /// File name as sent by the client. Never used as a path directly.
    pub original_name: String,

    /// Spooled request body; `None` when the part carried no file.
    pub temp: Option<TempPath>,
}

/// Optional text fields of an upload request.
///
/// Missing or empty values fall back to: `privacy_view` = `anybody`,
/// `title` = empty, `description` = empty.
#[derive(Debug, Default, Clone)]
pub struct UploadForm {
    pub privacy_view: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
}

impl UploadForm {
    /// Validate the fields and build the metadata sent to Vimeo.
    pub fn into_metadata(self) -> UploadResult<VideoMetadata> {
        let view = match non_empty(self.privacy_view) {
            Some(raw) => raw
                .parse::<PrivacyView>()
                .map_err(|unknown| UploadError::InvalidPrivacy(unknown.0))?,
            None => PrivacyView::default(),
        };

        Ok(VideoMetadata {
            name: non_empty(self.title).unwrap_or_default(),
            description: non_empty(self.description).unwrap_or_default(),
            privacy: Privacy { view },
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Body of `POST /ajax/dgv_store_upload`: the result of an upload the
/// browser already sent to Vimeo itself.
#[derive(Debug, Default, Deserialize)]
pub struct StoreUploadForm {
    pub nonce: Option<String>,
    pub privacy_view: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,

    /// Vimeo's JSON response for the created video; must carry its `uri`.
    pub response: Option<String>,
}

#[derive(Debug)]
pub struct UploadRequest {
    pub nonce: Option<String>,
    pub file: Option<IncomingFile>,
    pub form: UploadForm,
}

/// Result of a successful upload.
#[derive(Debug, Serialize)]
pub struct UploadOutcome {
    /// Raw Vimeo response.
    pub response: UploadResponse,

    /// Local record id, `None` if the record could not be written.
    pub record_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct UploadService {
    pub credentials: CredentialStore,
    pub records: RecordStore,
    pub nonces: NonceService,
    pub connector: Arc<dyn VimeoConnector>,

    /// Directory staged files are moved into before being sent.
    pub upload_dir: PathBuf,
}

impl UploadService {
    pub fn new(
        credentials: CredentialStore,
        records: RecordStore,
        nonces: NonceService,
        connector: Arc<dyn VimeoConnector>,
        upload_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            credentials,
            records,
            nonces,
            connector,
            upload_dir: upload_dir.into(),
        }
    }

    /// Run the full workflow for one request made by `user_id`.
    ///
    /// Checks run in order and the first failure ends the request:
    /// anti-forgery token, file part present, spooled file present, move into
    /// staging, field validation, Vimeo upload. A record is written only after
    /// Vimeo accepted the file.
    pub async fn handle_upload(
        &self,
        user_id: i64,
        request: UploadRequest,
    ) -> UploadResult<UploadOutcome> {
        let nonce = request.nonce.as_deref().unwrap_or_default();
        if !self.nonces.verify(nonce, user_id) {
            return Err(UploadError::Unauthorized);
        }

        let file = request.file.ok_or(UploadError::NoFile)?;
        let temp = match file.temp {
            Some(temp) if fs::try_exists(&temp).await.unwrap_or(false) => temp,
            _ => return Err(UploadError::MissingTempFile),
        };

        if let Err(err) = fs::create_dir_all(&self.upload_dir).await {
            debug!(
                "could not create upload dir {}: {}",
                self.upload_dir.display(),
                err
            );
        }

        let destination = self.upload_dir.join(staging_file_name(&file.original_name));
        let staged = stage(temp, &destination)
            .await
            .map_err(UploadError::Staging)?;

        let metadata = request.form.into_metadata()?;

        let credentials = self.credentials.load().await?;
        let uploader = self.connector.connect(credentials);

        info!(
            "uploading {} ({}) to Vimeo for user {}",
            file.original_name,
            staged.display(),
            user_id
        );
        let response = uploader.upload(&staged, &metadata).await.map_err(|err| {
            warn!("Vimeo upload of {} failed: {}", file.original_name, err);
            err
        })?;

        if let Err(err) = staged.close() {
            warn!("failed to remove staged file {}: {}", destination.display(), err);
        }

        let record_id = self.persist(user_id, &metadata, &response).await;
        info!(
            "uploaded {} as {} (record {:?})",
            file.original_name, response.uri, record_id
        );

        Ok(UploadOutcome {
            response,
            record_id,
        })
    }

    /// Record an upload the client already completed against Vimeo.
    ///
    /// Checks the token, then the fields, then the reported response, and
    /// writes the record with its privacy and response metadata.
    pub async fn store_upload(&self, user_id: i64, form: StoreUploadForm) -> UploadResult<Uuid> {
        let nonce = form.nonce.as_deref().unwrap_or_default();
        if !self.nonces.verify(nonce, user_id) {
            return Err(UploadError::Unauthorized);
        }

        let metadata = UploadForm {
            privacy_view: form.privacy_view,
            title: form.title,
            description: form.description,
        }
        .into_metadata()?;
        let response = parse_reported_response(form.response)?;

        let id = self.write_record(user_id, &metadata, &response).await?;
        info!(
            "stored client upload {} as record {} for user {}",
            response.uri, id, user_id
        );
        Ok(id)
    }

    /// Write the record after a server-side upload.
    ///
    /// The video already exists on Vimeo at this point, so failures are
    /// logged and reported through a missing record id instead of failing
    /// the request.
    async fn persist(
        &self,
        author_id: i64,
        metadata: &VideoMetadata,
        response: &UploadResponse,
    ) -> Option<Uuid> {
        match self.write_record(author_id, metadata, response).await {
            Ok(id) => Some(id),
            Err(err) => {
                warn!("could not record upload {}: {}", response.uri, err);
                None
            }
        }
    }

    async fn write_record(
        &self,
        author_id: i64,
        metadata: &VideoMetadata,
        response: &UploadResponse,
    ) -> Result<Uuid, StoreError> {
        let fields = NewUploadRecord {
            title: strip_all_tags(&metadata.name),
            description: metadata.description.clone(),
            author_id,
        };
        let id = self.records.create_record(&fields).await?;

        for (key, value) in [
            (META_PRIVACY, serde_json::to_string(&metadata.privacy)),
            (META_RESPONSE, serde_json::to_string(response)),
        ] {
            let value = value.map_err(|source| StoreError::InvalidMeta {
                key: key.to_string(),
                source,
            })?;
            self.records.set_meta(id, key, &value).await?;
        }

        Ok(id)
    }
}

fn parse_reported_response(raw: Option<String>) -> UploadResult<UploadResponse> {
    let raw = non_empty(raw)
        .ok_or_else(|| UploadError::InvalidResponse("response is required".into()))?;
    let response: UploadResponse = serde_json::from_str(&raw)
        .map_err(|err| UploadError::InvalidResponse(err.to_string()))?;
    if response.video_id().is_none() {
        return Err(UploadError::InvalidResponse(format!(
            "`{}` is not a video uri",
            response.uri
        )));
    }
    Ok(response)
}

/// Move the spooled file to `destination`, returning a guard that removes
/// it when dropped. Falls back to copying when a rename is not possible
/// (e.g. the spool lives on another filesystem).
async fn stage(temp: TempPath, destination: &Path) -> io::Result<TempPath> {
    match temp.persist(destination) {
        Ok(()) => TempPath::try_from_path(destination),
        Err(PathPersistError { error, path: temp }) => {
            debug!("rename into staging failed ({}), copying instead", error);
            let staged = TempPath::try_from_path(destination)?;
            fs::copy(&temp, &staged).await?;
            drop(temp);
            Ok(staged)
        }
    }
}
