//! JSON envelope shared by every endpoint: `{"success": bool, "data": ...}`.

use serde::Serialize;

#[derive(Serialize, Debug)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }

    pub fn failure(data: T) -> Self {
        Self {
            success: false,
            data,
        }
    }
}

/// Payload carrying only a human-readable message.
#[derive(Serialize, Debug)]
pub struct MessageData {
    pub message: String,
}

impl MessageData {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
