//! Vimeo API adapter.
//!
//! The upload workflow only needs one operation, [`VideoUploader::upload`].
//! [`VimeoClient`] implements it against the real API: it creates the video
//! with the `tus` approach and then PATCHes the file to the returned upload
//! link in fixed-size chunks.

use crate::{
    models::video::{UploadResponse, VideoMetadata},
    services::credential_store::Credentials,
};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{StatusCode, header};
use serde::{Deserialize, Serialize};
use std::{
    io::SeekFrom,
    path::Path,
    sync::Arc,
};
use thiserror::Error;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt},
};
use tracing::{debug, warn};

pub const DEFAULT_API_URL: &str = "https://api.vimeo.com";
pub const DEFAULT_CHUNK_SIZE: u64 = 16 * 1024 * 1024;

const ACCEPT_HEADER: &str = "application/vnd.vimeo.*+json;version=3.4";
const TUS_VERSION: &str = "1.0.0";
const MAX_CHUNK_ATTEMPTS: u32 = 5;

#[derive(Debug, Error)]
pub enum VimeoError {
    /// The API rejected or failed a request (auth, quota, bad metadata, ...).
    #[error("{0}")]
    Request(String),
    /// The file could not be transferred to the upload link.
    #[error("{0}")]
    Upload(String),
}

/// Uploads a local file to Vimeo.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VideoUploader: Send + Sync {
    async fn upload(
        &self,
        file_path: &Path,
        metadata: &VideoMetadata,
    ) -> Result<UploadResponse, VimeoError>;
}

/// Builds an uploader from the credentials read for the current request.
pub trait VimeoConnector: Send + Sync {
    fn connect(&self, credentials: Credentials) -> Box<dyn VideoUploader>;
}

/// Connector producing [`VimeoClient`]s that share one HTTP client.
#[derive(Clone)]
pub struct HttpConnector {
    http: reqwest::Client,
    api_url: Arc<str>,
    chunk_size: u64,
}

impl HttpConnector {
    pub fn new(api_url: impl Into<String>, chunk_size: u64) -> Result<Self, VimeoError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("vimeo-uploader/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| VimeoError::Request(format!("Failed to create HTTP client: {}", e)))?;
        let api_url: String = api_url.into();
        Ok(Self {
            http,
            api_url: Arc::from(api_url.trim_end_matches('/')),
            chunk_size: chunk_size.max(1),
        })
    }
}

impl VimeoConnector for HttpConnector {
    fn connect(&self, credentials: Credentials) -> Box<dyn VideoUploader> {
        Box::new(VimeoClient {
            http: self.http.clone(),
            api_url: self.api_url.clone(),
            chunk_size: self.chunk_size,
            credentials,
        })
    }
}

pub struct VimeoClient {
    http: reqwest::Client,
    api_url: Arc<str>,
    chunk_size: u64,
    credentials: Credentials,
}

#[derive(Serialize)]
struct CreateVideoRequest<'a> {
    upload: UploadApproach,
    #[serde(flatten)]
    metadata: &'a VideoMetadata,
}

#[derive(Serialize)]
struct UploadApproach {
    approach: &'static str,
    size: String,
}

#[derive(Deserialize)]
struct UploadLink {
    upload: UploadLinkInner,
}

#[derive(Deserialize)]
struct UploadLinkInner {
    upload_link: String,
}

#[derive(Deserialize)]
struct ApiError {
    error: Option<String>,
    developer_message: Option<String>,
}

impl VimeoClient {
    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.credentials.access_token.is_empty() {
            request.basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
        } else {
            request.bearer_auth(&self.credentials.access_token)
        }
    }

    /// Create the video resource and return the raw response body.
    async fn create_video(&self, size: u64, metadata: &VideoMetadata) -> Result<String, VimeoError> {
        let body = CreateVideoRequest {
            upload: UploadApproach {
                approach: "tus",
                size: size.to_string(),
            },
            metadata,
        };

        let url = format!("{}/me/videos", self.api_url);
        let response = self
            .authorize(self.http.post(&url))
            .header(header::ACCEPT, ACCEPT_HEADER)
            .json(&body)
            .send()
            .await
            .map_err(|e| VimeoError::Request(format!("Request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| VimeoError::Request(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(VimeoError::Request(api_error_message(status, &text)));
        }
        Ok(text)
    }

    /// Send one chunk; returns the offset the server acknowledged.
    async fn patch_chunk(&self, link: &str, offset: u64, chunk: Bytes) -> Result<u64, String> {
        let response = self
            .http
            .patch(link)
            .header("Tus-Resumable", TUS_VERSION)
            .header("Upload-Offset", offset.to_string())
            .header(header::CONTENT_TYPE, "application/offset+octet-stream")
            .body(chunk)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("server answered {}", response.status()));
        }
        upload_offset(&response).ok_or_else(|| "missing Upload-Offset header".to_string())
    }

    /// Ask the server how many bytes it has.
    async fn server_offset(&self, link: &str) -> Option<u64> {
        let response = self
            .http
            .head(link)
            .header("Tus-Resumable", TUS_VERSION)
            .send()
            .await
            .ok()?;
        upload_offset(&response)
    }

    async fn send_file(&self, path: &Path, size: u64, link: &str) -> Result<(), VimeoError> {
        let mut file = File::open(path)
            .await
            .map_err(|e| VimeoError::Upload(format!("Unable to open {}: {}", path.display(), e)))?;

        let mut offset = 0u64;
        let mut failures = 0u32;
        while offset < size {
            let len = (size - offset).min(self.chunk_size) as usize;
            let mut buf = vec![0u8; len];
            file.seek(SeekFrom::Start(offset))
                .await
                .map_err(|e| VimeoError::Upload(format!("Unable to read file: {}", e)))?;
            file.read_exact(&mut buf)
                .await
                .map_err(|e| VimeoError::Upload(format!("Unable to read file: {}", e)))?;

            match self.patch_chunk(link, offset, Bytes::from(buf)).await {
                Ok(acked) if acked > offset => {
                    debug!("uploaded {} of {} bytes", acked, size);
                    offset = acked;
                    failures = 0;
                }
                Ok(acked) => {
                    failures += 1;
                    warn!("upload link did not advance past offset {}", acked);
                }
                Err(err) => {
                    failures += 1;
                    warn!("chunk at offset {} failed: {}", offset, err);
                    if let Some(server) = self.server_offset(link).await {
                        offset = server;
                    }
                }
            }

            if failures >= MAX_CHUNK_ATTEMPTS {
                return Err(VimeoError::Upload(format!(
                    "Unable to complete upload after {} attempts at offset {}.",
                    MAX_CHUNK_ATTEMPTS, offset
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl VideoUploader for VimeoClient {
    async fn upload(
        &self,
        file_path: &Path,
        metadata: &VideoMetadata,
    ) -> Result<UploadResponse, VimeoError> {
        let size = tokio::fs::metadata(file_path)
            .await
            .map_err(|e| {
                VimeoError::Upload(format!("Unable to locate file to upload: {}", e))
            })?
            .len();

        let raw = self.create_video(size, metadata).await?;
        let link: UploadLink = serde_json::from_str(&raw)
            .map_err(|e| VimeoError::Request(format!("Unexpected response from Vimeo: {}", e)))?;
        let response: UploadResponse = serde_json::from_str(&raw)
            .map_err(|e| VimeoError::Request(format!("Unexpected response from Vimeo: {}", e)))?;

        self.send_file(file_path, size, &link.upload.upload_link)
            .await?;
        debug!("finished uploading {} as {}", file_path.display(), response.uri);
        Ok(response)
    }
}

fn upload_offset(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get("Upload-Offset")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

fn api_error_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiError>(body) {
        Ok(ApiError {
            error: Some(error), ..
        }) => error,
        Ok(ApiError {
            developer_message: Some(message),
            ..
        }) => message,
        _ => format!("Vimeo API error ({})", status),
    }
}

/// Connector that hands out a fixed uploader; used by tests.
#[cfg(test)]
pub struct StaticConnector(std::sync::Mutex<Option<Box<dyn VideoUploader>>>);

#[cfg(test)]
impl StaticConnector {
    pub fn new(uploader: impl VideoUploader + 'static) -> Self {
        Self(std::sync::Mutex::new(Some(Box::new(uploader))))
    }
}

#[cfg(test)]
impl VimeoConnector for StaticConnector {
    fn connect(&self, _credentials: Credentials) -> Box<dyn VideoUploader> {
        self.0
            .lock()
            .unwrap()
            .take()
            .expect("StaticConnector used more than once")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::privacy::{Privacy, PrivacyView};
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_partial_json, header as header_eq, method, path},
    };

    fn metadata() -> VideoMetadata {
        VideoMetadata {
            name: "Demo".into(),
            description: "A demo".into(),
            privacy: Privacy {
                view: PrivacyView::Unlisted,
            },
        }
    }

    fn credentials(token: &str) -> Credentials {
        Credentials {
            client_id: "id".into(),
            client_secret: "secret".into(),
            access_token: token.into(),
        }
    }

    fn write_file(bytes: &[u8]) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), bytes).unwrap();
        file
    }

    #[tokio::test]
    async fn uploads_in_chunks_and_returns_creation_response() {
        let server = MockServer::start().await;
        let link = format!("{}/upload/abc", server.uri());

        Mock::given(method("POST"))
            .and(path("/me/videos"))
            .and(header_eq("authorization", "Bearer token"))
            .and(body_partial_json(json!({
                "upload": { "approach": "tus", "size": "10" },
                "name": "Demo",
                "privacy": { "view": "unlisted" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "uri": "/videos/555",
                "link": "https://vimeo.com/555",
                "upload": { "approach": "tus", "upload_link": link }
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("PATCH"))
            .and(path("/upload/abc"))
            .and(header_eq("upload-offset", "0"))
            .respond_with(ResponseTemplate::new(204).insert_header("Upload-Offset", "6"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/upload/abc"))
            .and(header_eq("upload-offset", "6"))
            .respond_with(ResponseTemplate::new(204).insert_header("Upload-Offset", "10"))
            .expect(1)
            .mount(&server)
            .await;

        let file = write_file(b"0123456789");
        let connector = HttpConnector::new(server.uri(), 6).unwrap();
        let uploader = connector.connect(credentials("token"));

        let response = uploader.upload(file.path(), &metadata()).await.unwrap();
        assert_eq!(response.uri, "/videos/555");
        assert_eq!(response.video_id(), Some("555"));
        assert_eq!(response.extra["link"], "https://vimeo.com/555");
    }

    #[tokio::test]
    async fn api_rejection_is_a_request_error_with_api_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/me/videos"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": "You must provide a valid authenticated access token."
            })))
            .mount(&server)
            .await;

        let file = write_file(b"abc");
        let connector = HttpConnector::new(server.uri(), 1024).unwrap();
        let err = connector
            .connect(credentials(""))
            .upload(file.path(), &metadata())
            .await
            .unwrap_err();

        assert!(matches!(err, VimeoError::Request(_)));
        assert_eq!(
            err.to_string(),
            "You must provide a valid authenticated access token."
        );
    }

    #[tokio::test]
    async fn repeated_chunk_failures_are_an_upload_error() {
        let server = MockServer::start().await;
        let link = format!("{}/upload/broken", server.uri());
        Mock::given(method("POST"))
            .and(path("/me/videos"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "uri": "/videos/1",
                "upload": { "upload_link": link }
            })))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/upload/broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/upload/broken"))
            .respond_with(ResponseTemplate::new(200).insert_header("Upload-Offset", "0"))
            .mount(&server)
            .await;

        let file = write_file(b"abc");
        let connector = HttpConnector::new(server.uri(), 1024).unwrap();
        let err = connector
            .connect(credentials("token"))
            .upload(file.path(), &metadata())
            .await
            .unwrap_err();

        assert!(matches!(err, VimeoError::Upload(_)));
    }

    #[test]
    fn error_message_falls_back_to_status() {
        assert_eq!(
            api_error_message(StatusCode::BAD_GATEWAY, "<html>"),
            "Vimeo API error (502 Bad Gateway)"
        );
        assert_eq!(
            api_error_message(StatusCode::BAD_REQUEST, r#"{"developer_message":"bad size"}"#),
            "bad size"
        );
    }
}
