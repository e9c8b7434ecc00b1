//! A configured backend bound to one model and one conversation.

use futures_util::future;
use futures_util::{StreamExt, TryStreamExt};
use tracing::debug;

use crate::core::backend::{BackendKind, ChatBackend, FragmentStream};
use crate::core::config::Config;
use crate::core::error::ChatError;
use crate::core::message::Conversation;
use crate::core::model_cache::ModelCache;
use crate::core::reply::CompletedReply;

/// Result of an explicit model listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelListing {
    pub models: Vec<String>,
    /// Set when the list could not be refreshed and is possibly stale.
    pub warning: Option<String>,
}

pub struct Provider {
    backend: Box<dyn ChatBackend>,
    models: Vec<String>,
    model: String,
    conversation: Conversation,
    warnings: Vec<String>,
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("kind", &self.backend.kind())
            .field("model", &self.model)
            .field("models", &self.models.len())
            .field("messages", &self.conversation.len())
            .finish()
    }
}

fn fallback_models(kind: BackendKind) -> Vec<String> {
    kind.fallback_models()
        .iter()
        .map(|model| model.to_string())
        .collect()
}

/// First model containing `partial`, in list order. Case-sensitive.
pub fn find_model<'a>(models: &'a [String], partial: &str) -> Option<&'a str> {
    models
        .iter()
        .find(|model| model.contains(partial))
        .map(String::as_str)
}

impl Provider {
    /// Binds `backend` to a model. Candidates are tried in order: `requested`,
    /// the configured default, the vendor default; the first listed model is
    /// used when none of them match. Fallbacks taken on the way are kept for
    /// [`Provider::take_warnings`].
    pub async fn new(
        backend: Box<dyn ChatBackend>,
        config: &Config,
        requested: Option<&str>,
        primer: Option<String>,
        cache: &mut ModelCache,
    ) -> Result<Self, ChatError> {
        let kind = backend.kind();
        let mut warnings = Vec::new();
        let models = initial_models(backend.as_ref(), cache, &mut warnings).await;

        let mut model = None;
        for candidate in [requested, config.default_model(kind.tag())].into_iter().flatten() {
            match find_model(&models, candidate) {
                Some(found) => {
                    model = Some(found.to_string());
                    break;
                }
                None => {
                    debug!(backend = kind.tag(), candidate, "model not offered");
                    warnings.push(format!("{} does not offer {candidate}", kind.label()));
                }
            }
        }
        let model = model
            .or_else(|| kind.default_model().and_then(|d| find_model(&models, d)).map(str::to_string))
            .or_else(|| models.first().cloned());
        let Some(model) = model else {
            return Err(ChatError::model_not_found(kind.tag(), "<any>"));
        };
        debug!(backend = kind.tag(), model = %model, "provider ready");

        Ok(Self {
            backend,
            models,
            model,
            conversation: Conversation::new(primer),
            warnings,
        })
    }

    /// Warnings from construction, for display; empties the list.
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// `"<tag>:<model>"`.
    pub fn identify(&self) -> String {
        format!("{}:{}", self.kind().tag(), self.model)
    }

    pub fn user_turn_count(&self) -> usize {
        self.conversation.user_turns()
    }

    /// Refreshes the model list from the backend. On failure the last known
    /// list is kept and the listing carries a warning.
    pub async fn list_models(&mut self, cache: &mut ModelCache) -> ModelListing {
        let kind = self.kind();
        let mut warnings = Vec::new();
        match self.backend.fetch_models().await {
            Ok(models) if !models.is_empty() => {
                if let Err(err) = cache.set(kind.tag(), &models) {
                    warnings.push(format!("could not update model cache: {err}"));
                }
                self.models = models;
            }
            Ok(_) => {
                warnings.push(format!("{} reported no models; showing defaults", kind.label()));
                self.models = fallback_models(kind);
            }
            Err(err) => {
                debug!(backend = kind.tag(), error = %err, "model listing failed");
                warnings.push(format!("{err}; showing last known models"));
            }
        }
        ModelListing {
            models: self.models.clone(),
            warning: (!warnings.is_empty()).then(|| warnings.join("; ")),
        }
    }

    /// Switches to the first listed model containing `partial`. The current
    /// model is kept when nothing matches.
    pub fn set_model(&mut self, partial: &str) -> Result<&str, ChatError> {
        let found = find_model(&self.models, partial)
            .ok_or_else(|| ChatError::model_not_found(self.kind().tag(), partial))?;
        self.model = found.to_string();
        Ok(&self.model)
    }

    /// Appends `text` as a user turn and opens the reply stream. If the stream
    /// cannot be opened the user turn is removed again.
    pub async fn chat(&mut self, text: &str) -> Result<FragmentStream, ChatError> {
        self.conversation.push_user(text);
        debug!(
            backend = self.kind().tag(),
            model = %self.model,
            messages = self.conversation.len(),
            "opening chat stream"
        );
        match self
            .backend
            .stream_chat(&self.model, self.conversation.messages())
            .await
        {
            Ok(stream) => Ok(stream
                .try_filter(|fragment| future::ready(!fragment.is_empty()))
                .boxed()),
            Err(err) => {
                self.conversation.pop_pending_user();
                Err(err)
            }
        }
    }

    /// Commits a fully drained reply as the assistant turn.
    pub fn complete_turn(&mut self, reply: CompletedReply) {
        self.conversation.push_assistant(reply.into_string());
    }

    /// Drops the pending user turn of an interrupted or failed reply.
    pub fn abandon_turn(&mut self) {
        if self.conversation.pop_pending_user().is_some() {
            debug!(backend = self.kind().tag(), "abandoned pending turn");
        }
    }

    pub fn new_conversation(&mut self, primer: Option<String>) {
        self.conversation.reset(primer);
    }
}

async fn initial_models(
    backend: &dyn ChatBackend,
    cache: &mut ModelCache,
    warnings: &mut Vec<String>,
) -> Vec<String> {
    let kind = backend.kind();
    let cached = cache.get(kind.tag());
    if !cached.is_empty() {
        return cached;
    }

    match backend.fetch_models().await {
        Ok(models) if !models.is_empty() => {
            if let Err(err) = cache.set(kind.tag(), &models) {
                debug!(backend = kind.tag(), error = %err, "could not write model cache");
                warnings.push(format!("could not update model cache: {err}"));
            }
            models
        }
        Ok(_) => {
            debug!(backend = kind.tag(), "no models reported");
            warnings.push(format!("{} reported no models; using default models", kind.label()));
            fallback_models(kind)
        }
        Err(err) => {
            debug!(backend = kind.tag(), error = %err, "model listing failed");
            warnings.push(format!("{err}; using default models"));
            fallback_models(kind)
        }
    }
}
