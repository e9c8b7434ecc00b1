use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::stream::{byte_lines, extract_data_payload, fragments, Frame};
use crate::api::{construct_api_url, format_api_error, get_json, send_checked};
use crate::core::backend::{BackendKind, ChatBackend, Credentials, FragmentStream};
use crate::core::error::ChatError;
use crate::core::message::{Conversation, Message};

const KIND: BackendKind = BackendKind::Anthropic;
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: &'a [Message],
    stream: bool,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    ContentBlockDelta { delta: Delta },
    MessageStop,
    Error,
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Delta {
    TextDelta { text: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct ModelInfo {
    id: String,
}

#[derive(Deserialize)]
struct ModelsResponse {
    data: Vec<ModelInfo>,
}

/// Interprets one SSE line of a `messages` stream. `event:` lines are
/// redundant with the payload's `type` and are skipped.
pub fn parse_event(line: &str) -> Result<Frame, ChatError> {
    let Some(payload) = extract_data_payload(line) else {
        return Ok(Frame::Skip);
    };
    if payload.trim().is_empty() {
        return Ok(Frame::Skip);
    }
    let event: StreamEvent = serde_json::from_str(payload)
        .map_err(|_| ChatError::request(KIND.tag(), format_api_error(payload)))?;
    match event {
        StreamEvent::ContentBlockDelta {
            delta: Delta::TextDelta { text },
        } => Ok(Frame::Text(text)),
        StreamEvent::MessageStop => Ok(Frame::Done),
        StreamEvent::Error => Err(ChatError::request(KIND.tag(), format_api_error(payload))),
        _ => Ok(Frame::Skip),
    }
}

pub struct AnthropicBackend {
    client: reqwest::Client,
    credentials: Credentials,
}

impl AnthropicBackend {
    pub fn new(client: reqwest::Client, credentials: Credentials) -> Self {
        Self {
            client,
            credentials,
        }
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("x-api-key", &self.credentials.api_key)
            .header("anthropic-version", API_VERSION)
    }
}

#[async_trait]
impl ChatBackend for AnthropicBackend {
    fn kind(&self) -> BackendKind {
        KIND
    }

    async fn fetch_models(&self) -> Result<Vec<String>, ChatError> {
        let url = construct_api_url(&self.credentials.base_url, "models");
        let response: ModelsResponse = get_json(KIND, self.authorized(self.client.get(url))).await?;
        Ok(response.data.into_iter().map(|model| model.id).collect())
    }

    async fn stream_chat(
        &self,
        model: &str,
        messages: &[Message],
    ) -> Result<FragmentStream, ChatError> {
        let (system, turns) = Conversation::split_system(messages);
        let url = construct_api_url(&self.credentials.base_url, "messages");
        debug!(%url, model, "posting messages request");
        let request = self.authorized(self.client.post(url)).json(&MessagesRequest {
            model,
            max_tokens: MAX_TOKENS,
            system,
            messages: turns,
            stream: true,
        });
        let response = send_checked(KIND, request).await?;
        Ok(fragments(byte_lines(KIND, response.bytes_stream()), parse_event))
    }
}
