use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::api::stream::{byte_lines, extract_data_payload, fragments, Frame};
use crate::api::{construct_api_url, format_api_error, get_json, send_checked};
use crate::core::backend::{BackendKind, ChatBackend, Credentials, FragmentStream};
use crate::core::error::ChatError;
use crate::core::message::Message;

const KIND: BackendKind = BackendKind::OpenAi;

#[derive(Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
    pub stream: bool,
}

#[derive(Deserialize)]
pub struct ChatResponseDelta {
    pub content: Option<String>,
}

#[derive(Deserialize)]
pub struct ChatResponseChoice {
    pub delta: ChatResponseDelta,
}

#[derive(Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatResponseChoice>,
}

#[derive(Deserialize)]
pub struct ModelInfo {
    pub id: String,
}

#[derive(Deserialize)]
pub struct ModelsResponse {
    pub data: Vec<ModelInfo>,
}

/// Interprets one SSE line of a `chat/completions` stream.
pub fn parse_event(line: &str) -> Result<Frame, ChatError> {
    let Some(payload) = extract_data_payload(line) else {
        return Ok(Frame::Skip);
    };
    if payload == "[DONE]" {
        return Ok(Frame::Done);
    }
    if payload.trim().is_empty() {
        return Ok(Frame::Skip);
    }

    let value: Value = serde_json::from_str(payload)
        .map_err(|_| ChatError::request(KIND.tag(), format_api_error(payload)))?;
    if value.get("error").is_some() {
        return Err(ChatError::request(KIND.tag(), format_api_error(payload)));
    }
    let response: ChatResponse = serde_json::from_value(value)
        .map_err(|_| ChatError::request(KIND.tag(), format_api_error(payload)))?;

    Ok(response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .map_or(Frame::Skip, Frame::Text))
}

pub struct OpenAiBackend {
    client: reqwest::Client,
    credentials: Credentials,
}

impl OpenAiBackend {
    pub fn new(client: reqwest::Client, credentials: Credentials) -> Self {
        Self {
            client,
            credentials,
        }
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.header("Authorization", format!("Bearer {}", self.credentials.api_key))
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    fn kind(&self) -> BackendKind {
        KIND
    }

    async fn fetch_models(&self) -> Result<Vec<String>, ChatError> {
        let url = construct_api_url(&self.credentials.base_url, "models");
        let request = self.authorized(self.client.get(url));
        let response: ModelsResponse = get_json(KIND, request).await?;
        Ok(response.data.into_iter().map(|model| model.id).collect())
    }

    async fn stream_chat(
        &self,
        model: &str,
        messages: &[Message],
    ) -> Result<FragmentStream, ChatError> {
        let url = construct_api_url(&self.credentials.base_url, "chat/completions");
        debug!(%url, model, "posting chat request");
        let request = self.authorized(self.client.post(url)).json(&ChatRequest {
            model,
            messages,
            stream: true,
        });
        let response = send_checked(KIND, request).await?;
        Ok(fragments(byte_lines(KIND, response.bytes_stream()), parse_event))
    }
}
