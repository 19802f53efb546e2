//! Public types for the chat API
use serde::{Deserialize, Serialize};

/// Sentinel payload that ends every chat stream.
pub const DONE: &str = "[DONE]";

/// Response header announcing that every payload is one line of text.
/// Clients append a line break to each payload of such a stream.
pub const FRAMING_HEADER: &str = "x-localai-framing";
pub const LINE_FRAMING: &str = "lines";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StreamChatRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ResetChatRequest {
    #[serde(default)]
    pub chat_id: Option<String>,
}

/// Either `{"ok": true}` or `{"error": "..."}`
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ResetChatResponse {
    Ok { ok: bool },
    Error { error: String },
}

impl ResetChatResponse {
    pub fn ok() -> Self {
        Self::Ok { ok: true }
    }

    pub fn error(msg: &str) -> Self {
        Self::Error {
            error: msg.to_string(),
        }
    }
}
