use tracing::{debug, info};

use crate::core::backend::FragmentStream;
use crate::core::config::Config;
use crate::core::error::ChatError;
use crate::core::model_cache::ModelCache;
use crate::core::provider::{ModelListing, Provider};
use crate::core::registry::Registry;
use crate::core::reply::CompletedReply;

/// Long-lived state built once at startup.
pub struct AppContext {
    pub registry: Registry,
    pub config: Config,
    pub cache: ModelCache,
    /// System instruction seeding every fresh conversation.
    pub primer: Option<String>,
}

/// The active provider plus everything needed to replace it.
pub struct Session {
    context: AppContext,
    provider: Provider,
    warnings: Vec<String>,
}

impl Session {
    /// Picks the startup backend: `provider_hint`, else the configured default
    /// provider, else the first available backend. `model` only applies to the
    /// startup backend.
    pub async fn start(
        mut context: AppContext,
        provider_hint: Option<&str>,
        model: Option<&str>,
    ) -> Result<Self, ChatError> {
        let available = context.registry.available_backends();
        let Some(&first) = available.first() else {
            return Err(ChatError::configuration("azc", "no backends configured"));
        };

        let mut warnings = Vec::new();
        let hint = provider_hint
            .map(str::to_string)
            .or_else(|| context.config.default_provider.clone());
        let kind = match hint {
            Some(hint) => match context.registry.resolve(&hint) {
                Ok(kind) => kind,
                Err(err) => {
                    debug!(hint = %hint, "default provider not available");
                    warnings.push(format!("{err}; using {}", first.tag()));
                    first
                }
            },
            None => first,
        };

        let mut provider = context
            .registry
            .create(kind, &context.config, model, context.primer.clone(), &mut context.cache)
            .await?;
        warnings.extend(provider.take_warnings());
        info!(provider = %provider.identify(), "session started");

        Ok(Self {
            context,
            provider,
            warnings,
        })
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    /// Warnings gathered since the last call, for display.
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    pub async fn send(&mut self, text: &str) -> Result<FragmentStream, ChatError> {
        self.provider.chat(text).await
    }

    pub fn complete_turn(&mut self, reply: CompletedReply) {
        self.provider.complete_turn(reply);
    }

    pub fn abandon_turn(&mut self) {
        self.provider.abandon_turn();
    }

    /// Replaces the active provider. On failure the current one is kept.
    pub async fn switch_provider(&mut self, hint: &str) -> Result<&Provider, ChatError> {
        let kind = self.context.registry.resolve(hint)?;
        let mut provider = self
            .context
            .registry
            .create(
                kind,
                &self.context.config,
                None,
                self.context.primer.clone(),
                &mut self.context.cache,
            )
            .await?;
        self.warnings.extend(provider.take_warnings());
        info!(from = %self.provider.identify(), to = %provider.identify(), "switched provider");
        self.provider = provider;
        Ok(&self.provider)
    }

    pub fn switch_model(&mut self, partial: &str) -> Result<&str, ChatError> {
        self.provider.set_model(partial)
    }

    pub fn reset(&mut self) {
        self.provider.new_conversation(None);
    }

    pub async fn list_models(&mut self) -> ModelListing {
        self.provider.list_models(&mut self.context.cache).await
    }
}
