//! Backend identities, credentials and the transport trait every vendor
//! implements.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use std::fmt;

use crate::core::error::ChatError;
use crate::core::message::Message;

/// Incremental reply text. Every item is a non-empty fragment; the stream ends
/// when the backend has finished the reply.
pub type FragmentStream = BoxStream<'static, Result<String, ChatError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BackendKind {
    OpenAi,
    Ollama,
    Anthropic,
    Gemini,
}

impl BackendKind {
    /// All known backends in priority order.
    pub const ALL: [BackendKind; 4] = [
        BackendKind::OpenAi,
        BackendKind::Ollama,
        BackendKind::Anthropic,
        BackendKind::Gemini,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            BackendKind::OpenAi => "openai",
            BackendKind::Ollama => "ollama",
            BackendKind::Anthropic => "anthropic",
            BackendKind::Gemini => "gemini",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BackendKind::OpenAi => "OpenAI",
            BackendKind::Ollama => "Ollama",
            BackendKind::Anthropic => "Anthropic",
            BackendKind::Gemini => "Gemini",
        }
    }

    /// The environment variable whose presence makes this backend available.
    pub fn credential_var(self) -> &'static str {
        match self {
            BackendKind::OpenAi => "OPENAI_API_KEY",
            BackendKind::Ollama => "OLLAMA_URL",
            BackendKind::Anthropic => "ANTHROPIC_API_KEY",
            BackendKind::Gemini => "GEMINI_API_KEY",
        }
    }

    pub fn default_model(self) -> Option<&'static str> {
        match self {
            BackendKind::OpenAi => Some("gpt-4o-mini"),
            BackendKind::Ollama => None,
            BackendKind::Anthropic => Some("claude-3-5-sonnet"),
            BackendKind::Gemini => Some("gemini-1.5-flash"),
        }
    }

    /// Used when a backend reports no models and nothing is cached.
    pub fn fallback_models(self) -> &'static [&'static str] {
        match self {
            BackendKind::OpenAi => &["gpt-4o-mini", "gpt-4o"],
            BackendKind::Ollama => &["llama3.1:latest"],
            BackendKind::Anthropic => &["claude-3-5-sonnet-20240620"],
            BackendKind::Gemini => &["gemini-1.5-flash", "gemini-1.5-pro"],
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.tag().eq_ignore_ascii_case(tag))
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Everything a transport needs to reach its vendor.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub kind: BackendKind,
    /// API key, or empty for backends that do not authenticate.
    pub api_key: String,
    pub base_url: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("kind", &self.kind)
            .field("api_key", &if self.api_key.is_empty() { "" } else { "<redacted>" })
            .field("base_url", &self.base_url)
            .finish()
    }
}

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

impl Credentials {
    /// Reads credentials for `kind` through `lookup` (normally the process
    /// environment). Empty values count as absent.
    pub fn from_lookup<F>(kind: BackendKind, lookup: F) -> Result<Self, ChatError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = kind.credential_var();
        let value = lookup(var)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ChatError::configuration(kind.tag(), format!("{var} is not set")))?;

        let (api_key, base_url) = match kind {
            BackendKind::OpenAi => (
                value,
                lookup("OPENAI_BASE_URL")
                    .filter(|v| !v.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            ),
            BackendKind::Ollama => (String::new(), value),
            BackendKind::Anthropic => (value, DEFAULT_ANTHROPIC_BASE_URL.to_string()),
            BackendKind::Gemini => (value, DEFAULT_GEMINI_BASE_URL.to_string()),
        };

        Ok(Self {
            kind,
            api_key,
            base_url,
        })
    }
}

/// One vendor's chat API.
///
/// Transports are stateless with respect to the conversation: the provider
/// passes the full history on every call.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Fetches the model identifiers the vendor currently offers.
    async fn fetch_models(&self) -> Result<Vec<String>, ChatError>;

    /// Opens a streamed completion for `messages` (the last one is the new
    /// user turn).
    async fn stream_chat(
        &self,
        model: &str,
        messages: &[Message],
    ) -> Result<FragmentStream, ChatError>;
}
