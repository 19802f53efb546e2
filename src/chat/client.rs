use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};

use super::ChatError;
use super::decoder::decode_stream;
use crate::api::public::chat::{
    FRAMING_HEADER, LINE_FRAMING, ResetChatRequest, ResetChatResponse, StreamChatRequest,
};
use crate::api::public::system::{AvailableModelsResponse, ModelsResponse};

/// Stream of decoded payloads for one answer.
pub type PayloadStream = BoxStream<'static, Result<String, ChatError>>;

/// HTTP client for the chat server.
#[derive(Clone, Debug)]
pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
}

impl ChatClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Start streaming the answer to a prompt. A non-2xx response is
    /// an error before any payload is read.
    ///
    /// When the server marks the stream as line framed, each payload
    /// is one line of the answer and gets its line break back.
    pub async fn stream_chat(&self, request: &StreamChatRequest) -> Result<PayloadStream, ChatError> {
        let response = self
            .http
            .post(self.url("/stream_chat"))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::HttpStatus {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let line_framed = response
            .headers()
            .get(FRAMING_HEADER)
            .is_some_and(|v| v.as_bytes() == LINE_FRAMING.as_bytes());

        let body = response.bytes_stream().map_err(ChatError::from);
        let payloads = decode_stream(body);
        if line_framed {
            Ok(payloads.map_ok(|line| line + "\n").boxed())
        } else {
            Ok(payloads.boxed())
        }
    }

    /// Drop the server-side context of a chat. An `error` reported by
    /// the server is returned as `ChatError::Server`.
    pub async fn reset_chat(&self, chat_id: &str) -> Result<(), ChatError> {
        let response: ResetChatResponse = self
            .http
            .post(self.url("/reset_chat"))
            .json(&ResetChatRequest {
                chat_id: Some(chat_id.to_string()),
            })
            .send()
            .await?
            .json()
            .await?;

        match response {
            ResetChatResponse::Ok { .. } => Ok(()),
            ResetChatResponse::Error { error } => Err(ChatError::Server(error)),
        }
    }

    /// The models the server accepts.
    pub async fn available_models(&self) -> Result<AvailableModelsResponse, ChatError> {
        let response = self
            .http
            .get(self.url("/config/models"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response)
    }

    /// The models installed on the server's machine.
    pub async fn installed_models(&self) -> Result<Vec<String>, ChatError> {
        let response: ModelsResponse = self.http.get(self.url("/models")).send().await?.json().await?;
        match response {
            ModelsResponse::Models { models } => Ok(models),
            ModelsResponse::Error { error } => Err(ChatError::Server(error)),
        }
    }
}
