use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::api::stream::{byte_lines, extract_data_payload, fragments, Frame};
use crate::api::{construct_api_url, format_api_error, get_json, send_checked};
use crate::core::backend::{BackendKind, ChatBackend, Credentials, FragmentStream};
use crate::core::error::ChatError;
use crate::core::message::{Conversation, Message, Role};

const KIND: BackendKind = BackendKind::Gemini;

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Serialize, Debug, PartialEq, Eq)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelInfo {
    name: String,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

#[derive(Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

fn text_content(role: Option<&'static str>, text: &str) -> Content {
    Content {
        role,
        parts: vec![Part {
            text: text.to_string(),
        }],
    }
}

fn build_request(messages: &[Message]) -> GenerateRequest {
    let (system, turns) = Conversation::split_system(messages);
    let contents = turns
        .iter()
        .map(|message| {
            let role = match message.role {
                Role::Assistant => "model",
                Role::User | Role::System => "user",
            };
            text_content(Some(role), &message.content)
        })
        .collect();
    GenerateRequest {
        contents,
        system_instruction: system.map(|text| text_content(None, text)),
    }
}

/// Interprets one SSE line of a `streamGenerateContent` stream. The stream
/// has no terminator; it ends when the connection closes.
pub fn parse_event(line: &str) -> Result<Frame, ChatError> {
    let Some(payload) = extract_data_payload(line) else {
        return Ok(Frame::Skip);
    };
    if payload.trim().is_empty() {
        return Ok(Frame::Skip);
    }
    let value: Value = serde_json::from_str(payload)
        .map_err(|_| ChatError::request(KIND.tag(), format_api_error(payload)))?;
    if value.get("error").is_some() {
        return Err(ChatError::request(KIND.tag(), format_api_error(payload)));
    }
    let chunk: GenerateChunk = serde_json::from_value(value)
        .map_err(|_| ChatError::request(KIND.tag(), format_api_error(payload)))?;
    let text: String = chunk
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| content.parts.into_iter().map(|part| part.text).collect())
        .unwrap_or_default();
    Ok(Frame::Text(text))
}

pub struct GeminiBackend {
    client: reqwest::Client,
    credentials: Credentials,
}

impl GeminiBackend {
    pub fn new(client: reqwest::Client, credentials: Credentials) -> Self {
        Self {
            client,
            credentials,
        }
    }
}

#[async_trait]
impl ChatBackend for GeminiBackend {
    fn kind(&self) -> BackendKind {
        KIND
    }

    async fn fetch_models(&self) -> Result<Vec<String>, ChatError> {
        let url = construct_api_url(&self.credentials.base_url, "models");
        let request = self
            .client
            .get(url)
            .query(&[("key", self.credentials.api_key.as_str()), ("pageSize", "1000")]);
        let response: ModelsResponse = get_json(KIND, request).await?;
        Ok(response
            .models
            .into_iter()
            .filter(|model| {
                model
                    .supported_generation_methods
                    .iter()
                    .any(|method| method == "generateContent")
            })
            .map(|model| {
                model
                    .name
                    .strip_prefix("models/")
                    .map(str::to_string)
                    .unwrap_or(model.name)
            })
            .collect())
    }

    async fn stream_chat(
        &self,
        model: &str,
        messages: &[Message],
    ) -> Result<FragmentStream, ChatError> {
        let url = construct_api_url(
            &self.credentials.base_url,
            &format!("models/{model}:streamGenerateContent"),
        );
        debug!(%url, model, "posting generate request");
        let request = self
            .client
            .post(url)
            .query(&[("alt", "sse"), ("key", self.credentials.api_key.as_str())])
            .json(&build_request(messages));
        let response = send_checked(KIND, request).await?;
        Ok(fragments(byte_lines(KIND, response.bytes_stream()), parse_event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::serve_once;
    use futures_util::TryStreamExt;

    fn backend(base_url: String) -> GeminiBackend {
        GeminiBackend::new(
            reqwest::Client::new(),
            Credentials {
                kind: KIND,
                api_key: "gk-test".to_string(),
                base_url,
            },
        )
    }

    #[test]
    fn request_maps_roles_and_system_instruction() {
        let request = build_request(&[
            Message::system("be brief"),
            Message::user("hi"),
            Message::assistant("hello"),
            Message::user("bye"),
        ]);
        let roles: Vec<_> = request.contents.iter().map(|c| c.role).collect();
        assert_eq!(roles, vec![Some("user"), Some("model"), Some("user")]);
        assert_eq!(request.system_instruction, Some(text_content(None, "be brief")));

        let json = serde_json::to_string(&request).expect("json");
        assert!(json.contains(r#""systemInstruction":{"parts":[{"text":"be brief"}]}"#));
    }

    #[test]
    fn parse_event_joins_candidate_parts() {
        assert_eq!(
            parse_event(r#"data: {"candidates":[{"content":{"parts":[{"text":"Pa"},{"text":"ris"}],"role":"model"}}]}"#),
            Ok(Frame::Text("Paris".to_string()))
        );
        assert_eq!(
            parse_event(r#"data: {"candidates":[{"finishReason":"STOP"}]}"#),
            Ok(Frame::Text(String::new()))
        );
        assert!(parse_event(r#"data: {"error":{"code":429,"message":"Resource exhausted"}}"#).is_err());
    }

    #[tokio::test]
    async fn streams_until_connection_closes() {
        let body = concat!(
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Paris\"}],\"role\":\"model\"}}]}\r\n\r\n",
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\" is the capital.\"}],\"role\":\"model\"},\"finishReason\":\"STOP\"}]}\r\n\r\n",
        );
        let (base_url, server) = serve_once(200, "text/event-stream", body).await;
        let stream = backend(base_url)
            .stream_chat("gemini-1.5-flash", &[Message::user("capital of France?")])
            .await
            .expect("stream");
        let fragments: Vec<String> = stream.try_collect().await.expect("fragments");
        assert_eq!(fragments.concat(), "Paris is the capital.");

        let request = server.await.expect("server");
        assert!(request.starts_with("POST /models/gemini-1.5-flash:streamGenerateContent?alt=sse&key=gk-test"));
    }

    #[tokio::test]
    async fn lists_generation_models_without_prefix() {
        let body = r#"{"models":[
            {"name":"models/gemini-1.5-flash","supportedGenerationMethods":["generateContent","countTokens"]},
            {"name":"models/text-embedding-004","supportedGenerationMethods":["embedContent"]}
        ]}"#;
        let (base_url, _server) = serve_once(200, "application/json", body).await;
        let models = backend(base_url).fetch_models().await.expect("models");
        assert_eq!(models, vec!["gemini-1.5-flash"]);
    }
}
