use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::stream::{byte_lines, fragments, Frame};
use crate::api::{construct_api_url, format_api_error, get_json, send_checked};
use crate::core::backend::{BackendKind, ChatBackend, Credentials, FragmentStream};
use crate::core::error::ChatError;
use crate::core::message::Message;

const KIND: BackendKind = BackendKind::Ollama;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
}

#[derive(Deserialize, Default)]
struct ChunkMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct TagInfo {
    name: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagInfo>,
}

/// Interprets one NDJSON line of an `/api/chat` stream.
pub fn parse_line(line: &str) -> Result<Frame, ChatError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Frame::Skip);
    }
    let chunk: ChatChunk = serde_json::from_str(line)
        .map_err(|_| ChatError::request(KIND.tag(), format_api_error(line)))?;
    if let Some(error) = chunk.error {
        return Err(ChatError::request(KIND.tag(), error));
    }
    if chunk.done {
        return Ok(Frame::Done);
    }
    Ok(Frame::Text(chunk.message.unwrap_or_default().content))
}

pub struct OllamaBackend {
    client: reqwest::Client,
    credentials: Credentials,
}

impl OllamaBackend {
    pub fn new(client: reqwest::Client, credentials: Credentials) -> Self {
        Self {
            client,
            credentials,
        }
    }
}

#[async_trait]
impl ChatBackend for OllamaBackend {
    fn kind(&self) -> BackendKind {
        KIND
    }

    async fn fetch_models(&self) -> Result<Vec<String>, ChatError> {
        let url = construct_api_url(&self.credentials.base_url, "api/tags");
        let response: TagsResponse = get_json(KIND, self.client.get(url)).await?;
        Ok(response.models.into_iter().map(|tag| tag.name).collect())
    }

    async fn stream_chat(
        &self,
        model: &str,
        messages: &[Message],
    ) -> Result<FragmentStream, ChatError> {
        let url = construct_api_url(&self.credentials.base_url, "api/chat");
        debug!(%url, model, "posting chat request");
        let request = self.client.post(url).json(&ChatRequest {
            model,
            messages,
            stream: true,
        });
        let response = send_checked(KIND, request).await?;
        Ok(fragments(byte_lines(KIND, response.bytes_stream()), parse_line))
    }
}
