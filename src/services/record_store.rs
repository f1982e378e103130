//! RecordStore — upload records in SQLite plus key/value record metadata.
//!
//! Records are created once per successful Vimeo upload and never updated by
//! the upload workflow afterwards. Privacy and the raw Vimeo response are
//! attached as `upload_meta` rows.

use crate::models::{
    privacy::Privacy,
    upload::{
        META_PRIVACY, META_RESPONSE, NewUploadRecord, RECORD_TYPE, STATUS_PUBLISH, UploadDetails,
        UploadRecord, UploadSummary,
    },
    video::UploadResponse,
};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("upload `{0}` not found")]
    RecordNotFound(Uuid),
    #[error("metadata `{key}` is not valid JSON: {source}")]
    InvalidMeta {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Clone)]
pub struct RecordStore {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,
}

impl RecordStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Insert a published upload record and return its id.
    pub async fn create_record(&self, fields: &NewUploadRecord) -> StoreResult<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO uploads (id, title, description, status, record_type, author_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(STATUS_PUBLISH)
        .bind(RECORD_TYPE)
        .bind(fields.author_id)
        .bind(Utc::now())
        .execute(&*self.db)
        .await?;

        debug!("created upload record {}", id);
        Ok(id)
    }

    /// Insert or replace a metadata value on a record.
    pub async fn set_meta(&self, id: Uuid, key: &str, value: &str) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO upload_meta (upload_id, meta_key, meta_value) VALUES (?, ?, ?)
             ON CONFLICT(upload_id, meta_key) DO UPDATE SET meta_value = excluded.meta_value",
        )
        .bind(id)
        .bind(key)
        .bind(value)
        .execute(&*self.db)
        .await?;
        Ok(())
    }

    pub async fn get_meta(&self, id: Uuid, key: &str) -> StoreResult<Option<String>> {
        let value = sqlx::query_scalar::<_, String>(
            "SELECT meta_value FROM upload_meta WHERE upload_id = ? AND meta_key = ?",
        )
        .bind(id)
        .bind(key)
        .fetch_optional(&*self.db)
        .await?;
        Ok(value)
    }

    /// Fetch a single record row.
    ///
    /// Returns RecordNotFound if missing.
    pub async fn get_record(&self, id: Uuid) -> StoreResult<UploadRecord> {
        sqlx::query_as::<_, UploadRecord>(
            "SELECT id, title, description, status, record_type, author_id, created_at
             FROM uploads WHERE id = ?",
        )
        .bind(id)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => StoreError::RecordNotFound(id),
            other => StoreError::Sqlx(other),
        })
    }

    /// Fetch a record together with its privacy and Vimeo response.
    pub async fn get_details(&self, id: Uuid) -> StoreResult<UploadDetails> {
        let record = self.get_record(id).await?;
        let privacy = self.get_json_meta::<Privacy>(id, META_PRIVACY).await?;
        let response = self.get_json_meta::<UploadResponse>(id, META_RESPONSE).await?;
        let vimeo_id = response
            .as_ref()
            .and_then(|r| r.video_id())
            .map(str::to_string);

        Ok(UploadDetails {
            record,
            privacy,
            response,
            vimeo_id,
        })
    }

    /// List records newest first, with their Vimeo id. `author` limits the
    /// list to one user's uploads.
    ///
    /// Records whose stored response cannot be parsed are listed without an id.
    pub async fn get_records(&self, author: Option<i64>) -> StoreResult<Vec<UploadSummary>> {
        let rows = sqlx::query_as::<_, (Uuid, String, Option<String>)>(
            "SELECT u.id, u.title, m.meta_value
             FROM uploads u
             LEFT JOIN upload_meta m ON m.upload_id = u.id AND m.meta_key = ?
             WHERE u.record_type = ? AND (? IS NULL OR u.author_id = ?)
             ORDER BY u.created_at DESC",
        )
        .bind(META_RESPONSE)
        .bind(RECORD_TYPE)
        .bind(author)
        .bind(author)
        .fetch_all(&*self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, title, raw)| {
                let vimeo_id = raw.and_then(|raw| match parse_response(&raw) {
                    Ok(response) => response.video_id().map(str::to_string),
                    Err(err) => {
                        warn!("upload {} has an unreadable response: {}", id, err);
                        None
                    }
                });
                UploadSummary {
                    id,
                    title,
                    vimeo_id,
                }
            })
            .collect())
    }

    /// Vimeo video id recorded for an upload.
    ///
    /// Returns RecordNotFound when the record does not exist and `None` when
    /// it exists without a stored response.
    pub async fn get_remote_id(&self, id: Uuid) -> StoreResult<Option<String>> {
        self.get_record(id).await?;
        let response = self.get_json_meta::<UploadResponse>(id, META_RESPONSE).await?;
        Ok(response.and_then(|r| r.video_id().map(str::to_string)))
    }

    async fn get_json_meta<T: serde::de::DeserializeOwned>(
        &self,
        id: Uuid,
        key: &str,
    ) -> StoreResult<Option<T>> {
        match self.get_meta(id, key).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| StoreError::InvalidMeta {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }
}

fn parse_response(raw: &str) -> serde_json::Result<UploadResponse> {
    serde_json::from_str(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use serde_json::json;

    async fn store() -> RecordStore {
        RecordStore::new(Arc::new(test_pool().await))
    }

    fn new_record(title: &str) -> NewUploadRecord {
        NewUploadRecord {
            title: title.into(),
            description: "<p>body</p>".into(),
            author_id: 7,
        }
    }

    #[tokio::test]
    async fn remote_id_round_trips_through_response_meta() {
        let store = store().await;
        let id = store.create_record(&new_record("Launch")).await.unwrap();
        let response = json!({ "uri": "/videos/424242", "link": "https://vimeo.com/424242" });
        store
            .set_meta(id, META_RESPONSE, &response.to_string())
            .await
            .unwrap();

        assert_eq!(
            store.get_remote_id(id).await.unwrap().as_deref(),
            Some("424242")
        );
    }

    #[tokio::test]
    async fn created_record_is_published_with_type_and_author() {
        let store = store().await;
        let id = store.create_record(&new_record("Launch")).await.unwrap();
        let record = store.get_record(id).await.unwrap();

        assert_eq!(record.title, "Launch");
        assert_eq!(record.description, "<p>body</p>");
        assert_eq!(record.status, STATUS_PUBLISH);
        assert_eq!(record.record_type, RECORD_TYPE);
        assert_eq!(record.author_id, 7);
    }

    #[tokio::test]
    async fn missing_record_is_not_found() {
        let store = store().await;
        let err = store.get_remote_id(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, StoreError::RecordNotFound(_)));
    }

    #[tokio::test]
    async fn listing_includes_records_without_response() {
        let store = store().await;
        let with = store.create_record(&new_record("with")).await.unwrap();
        store
            .set_meta(with, META_RESPONSE, r#"{"uri":"/videos/1"}"#)
            .await
            .unwrap();
        let without = store.create_record(&new_record("without")).await.unwrap();

        let mut records = store.get_records(None).await.unwrap();
        records.sort_by(|a, b| a.title.cmp(&b.title));
        assert_eq!(
            records,
            vec![
                UploadSummary {
                    id: with,
                    title: "with".into(),
                    vimeo_id: Some("1".into()),
                },
                UploadSummary {
                    id: without,
                    title: "without".into(),
                    vimeo_id: None,
                },
            ]
        );
    }

    #[tokio::test]
    async fn listing_can_be_limited_to_one_author() {
        let store = store().await;
        let mine = store.create_record(&new_record("mine")).await.unwrap();
        store
            .create_record(&NewUploadRecord {
                author_id: 8,
                ..new_record("theirs")
            })
            .await
            .unwrap();

        let records = store.get_records(Some(7)).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, mine);
        assert_eq!(store.get_records(None).await.unwrap().len(), 2);
        assert!(store.get_records(Some(99)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn details_carry_privacy_and_response() {
        let store = store().await;
        let id = store.create_record(&new_record("x")).await.unwrap();
        store
            .set_meta(id, META_PRIVACY, r#"{"view":"unlisted"}"#)
            .await
            .unwrap();
        store
            .set_meta(id, META_RESPONSE, r#"{"uri":"/videos/9","status":"available"}"#)
            .await
            .unwrap();

        let details = store.get_details(id).await.unwrap();
        assert_eq!(
            details.privacy.map(|p| p.view),
            Some(crate::models::privacy::PrivacyView::Unlisted)
        );
        assert_eq!(details.vimeo_id.as_deref(), Some("9"));
    }
}
