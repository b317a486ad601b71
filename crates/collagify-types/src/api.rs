use serde::{Deserialize, Serialize};

// -- Envelope --

/// Every Bot API method answers with this envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<i64>,
}

impl<T> ApiResponse<T> {
    pub fn success(result: T) -> Self {
        Self {
            ok: true,
            result: Some(result),
            description: None,
            error_code: None,
        }
    }

    pub fn failure(error_code: i64, description: impl Into<String>) -> Self {
        Self {
            ok: false,
            result: None,
            description: Some(description.into()),
            error_code: Some(error_code),
        }
    }
}

// -- Files --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetFileRequest {
    pub file_id: String,
}

/// File metadata returned by `getFile`. `file_path` is what the download
/// link is built from; it stays valid for at least one hour.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct File {
    pub file_id: String,
    #[serde(default)]
    pub file_unique_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

// -- Updates --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetUpdatesRequest {
    pub offset: i64,
    pub timeout: u64,
    pub allowed_updates: Vec<String>,
}

// -- Messages --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteMessagesRequest {
    pub chat_id: i64,
    pub message_ids: Vec<i64>,
}

/// Bot identity returned by `getMe`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BotUser {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_envelope_has_no_result() {
        let raw = r#"{"ok":false,"error_code":400,"description":"Bad Request: message to delete not found"}"#;
        let resp: ApiResponse<bool> = serde_json::from_str(raw).unwrap();
        assert!(!resp.ok);
        assert!(resp.result.is_none());
        assert_eq!(resp.error_code, Some(400));
    }

    #[test]
    fn file_envelope_carries_path() {
        let raw = r#"{"ok":true,"result":{"file_id":"red.jpeg","file_path":"photos/file_1.jpg"}}"#;
        let resp: ApiResponse<File> = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.result.unwrap().file_path.as_deref(), Some("photos/file_1.jpg"));
    }
}
