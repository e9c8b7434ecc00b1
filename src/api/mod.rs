//! HTTP transports for the supported chat APIs.
//!
//! Each submodule owns its wire payloads and a pure parser for one stream
//! event, so framing can be tested without a network.

pub mod anthropic;
pub mod gemini;
pub mod ollama;
pub mod openai;
pub(crate) mod stream;

use serde::de::DeserializeOwned;

use crate::core::backend::BackendKind;
use crate::core::error::ChatError;

/// Joins `base_url` and `endpoint` with exactly one slash between them.
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let endpoint = endpoint.trim_start_matches('/');
    format!("{base}/{endpoint}")
}

/// Renders an error body for display: JSON is pretty-printed under a one-line
/// summary when one can be found, anything else is fenced verbatim.
pub fn format_api_error(error_text: &str) -> String {
    let trimmed = error_text.trim();

    if trimmed.is_empty() {
        return "API Error:\n```\n<empty>\n```".to_string();
    }

    if let Ok(json_value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Ok(pretty_json) = serde_json::to_string_pretty(&json_value) {
            return match extract_error_summary(&json_value) {
                Some(summary) if !summary.is_empty() => {
                    format!("API Error: {summary}\n```json\n{pretty_json}\n```")
                }
                _ => format!("API Error:\n```json\n{pretty_json}\n```"),
            };
        }
    }

    if trimmed.starts_with('<') && trimmed.ends_with('>') {
        format!("API Error:\n```xml\n{trimmed}\n```")
    } else {
        format!("API Error:\n```\n{trimmed}\n```")
    }
}

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .or_else(|| value.get("error").and_then(|v| v.as_str()))
        .or_else(|| value.get("message").and_then(|v| v.as_str()))
        // Gemini wraps errors in a one-element array.
        .or_else(|| value.pointer("/0/error/message").and_then(|v| v.as_str()))?;

    Some(summary.split_whitespace().collect::<Vec<_>>().join(" "))
}

pub(crate) fn transport_error(kind: BackendKind, err: reqwest::Error) -> ChatError {
    ChatError::request(kind.tag(), err.to_string())
}

/// Sends `request`, turning transport failures and non-2xx replies into
/// [`ChatError::Request`].
pub(crate) async fn send_checked(
    kind: BackendKind,
    request: reqwest::RequestBuilder,
) -> Result<reqwest::Response, ChatError> {
    let response = request
        .send()
        .await
        .map_err(|err| transport_error(kind, err))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<no body>".to_string());
    tracing::debug!(backend = kind.tag(), %status, "request rejected");
    Err(ChatError::request(
        kind.tag(),
        format!("HTTP {status}\n{}", format_api_error(&body)),
    ))
}

pub(crate) async fn get_json<T: DeserializeOwned>(
    kind: BackendKind,
    request: reqwest::RequestBuilder,
) -> Result<T, ChatError> {
    let response = send_checked(kind, request).await?;
    response
        .json::<T>()
        .await
        .map_err(|err| transport_error(kind, err))
}
