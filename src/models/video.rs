//! Payloads exchanged with the Vimeo API.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::privacy::Privacy;

/// Metadata sent alongside a new video.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct VideoMetadata {
    pub name: String,
    pub description: String,
    pub privacy: Privacy,
}

/// Response returned by Vimeo when a video is created.
///
/// Only `uri` is interpreted; every other field (link, status, transcode
/// state, ...) is kept verbatim so the stored payload matches what the API
/// sent.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UploadResponse {
    pub uri: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UploadResponse {
    /// Vimeo video id, i.e. the last segment of `uri` (`/videos/123` -> `123`).
    pub fn video_id(&self) -> Option<&str> {
        self.uri
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|id| !id.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn video_id_is_last_uri_segment() {
        let response: UploadResponse =
            serde_json::from_value(json!({ "uri": "/videos/76979871", "status": "uploading" }))
                .unwrap();
        assert_eq!(response.video_id(), Some("76979871"));
        assert_eq!(response.extra["status"], "uploading");
    }

    #[test]
    fn empty_uri_has_no_video_id() {
        let response = UploadResponse {
            uri: String::new(),
            extra: Map::new(),
        };
        assert_eq!(response.video_id(), None);
    }
}
