use std::time::Duration;
use tracing::debug;

use crate::api::{anthropic::AnthropicBackend, gemini::GeminiBackend, ollama::OllamaBackend, openai::OpenAiBackend};
use crate::core::backend::{BackendKind, ChatBackend, Credentials};
use crate::core::config::Config;
use crate::core::error::ChatError;
use crate::core::model_cache::ModelCache;
use crate::core::provider::Provider;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Turns a backend's credentials into a transport.
pub trait BackendFactory: Send + Sync {
    fn build(&self, credentials: Credentials) -> Box<dyn ChatBackend>;
}

/// Builds the HTTP transports, all sharing one connection pool.
#[derive(Default, Clone)]
pub struct HttpBackendFactory {
    client: reqwest::Client,
}

impl HttpBackendFactory {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl BackendFactory for HttpBackendFactory {
    fn build(&self, credentials: Credentials) -> Box<dyn ChatBackend> {
        let client = self.client.clone();
        match credentials.kind {
            BackendKind::OpenAi => Box::new(OpenAiBackend::new(client, credentials)),
            BackendKind::Ollama => Box::new(OllamaBackend::new(client, credentials)),
            BackendKind::Anthropic => Box::new(AnthropicBackend::new(client, credentials)),
            BackendKind::Gemini => Box::new(GeminiBackend::new(client, credentials)),
        }
    }
}

/// The backends whose credentials were found at startup.
pub struct Registry {
    credentials: Vec<Credentials>,
    factory: Box<dyn BackendFactory>,
}

impl Registry {
    pub fn from_env() -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self::from_lookup(
            |key| std::env::var(key).ok(),
            Box::new(HttpBackendFactory::new(client)),
        )
    }

    pub fn from_lookup<F>(lookup: F, factory: Box<dyn BackendFactory>) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let credentials = BackendKind::ALL
            .into_iter()
            .filter_map(|kind| match Credentials::from_lookup(kind, &lookup) {
                Ok(credentials) => Some(credentials),
                Err(err) => {
                    debug!(backend = kind.tag(), error = %err, "backend unavailable");
                    None
                }
            })
            .collect();
        Self {
            credentials,
            factory,
        }
    }

    /// Available backends in priority order.
    pub fn available_backends(&self) -> Vec<BackendKind> {
        self.credentials.iter().map(|c| c.kind).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// The first available backend whose tag contains `hint`, ignoring case.
    pub fn resolve(&self, hint: &str) -> Result<BackendKind, ChatError> {
        let needle = hint.trim().to_lowercase();
        if needle.is_empty() {
            return Err(ChatError::unknown_provider(hint));
        }
        self.credentials
            .iter()
            .map(|c| c.kind)
            .find(|kind| kind.tag().contains(&needle))
            .ok_or_else(|| ChatError::unknown_provider(hint))
    }

    pub async fn create(
        &self,
        kind: BackendKind,
        config: &Config,
        model: Option<&str>,
        primer: Option<String>,
        cache: &mut ModelCache,
    ) -> Result<Provider, ChatError> {
        let credentials = self
            .credentials
            .iter()
            .find(|c| c.kind == kind)
            .cloned()
            .ok_or_else(|| {
                ChatError::configuration(kind.tag(), format!("{} is not set", kind.credential_var()))
            })?;
        let backend = self.factory.build(credentials);
        Provider::new(backend, config, model, primer, cache).await
    }
}
