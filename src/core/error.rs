use std::error::Error;
use std::fmt;

/// Failures surfaced by providers, the registry and the session.
///
/// Every variant except [`ChatError::Configuration`] is recoverable at the
/// prompt: the caller reports it and keeps the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    /// Required credentials or endpoint settings are missing.
    Configuration { backend: String, message: String },

    /// A provider hint matched none of the available backends.
    UnknownProvider { hint: String },

    /// A model name matched nothing in the backend's model list.
    ModelNotFound { backend: String, model: String },

    /// Transport, authentication or stream failure while talking to a backend.
    Request { backend: String, message: String },
}

impl ChatError {
    pub fn configuration(backend: impl Into<String>, message: impl Into<String>) -> Self {
        ChatError::Configuration {
            backend: backend.into(),
            message: message.into(),
        }
    }

    pub fn unknown_provider(hint: impl Into<String>) -> Self {
        ChatError::UnknownProvider { hint: hint.into() }
    }

    pub fn model_not_found(backend: impl Into<String>, model: impl Into<String>) -> Self {
        ChatError::ModelNotFound {
            backend: backend.into(),
            model: model.into(),
        }
    }

    pub fn request(backend: impl Into<String>, message: impl Into<String>) -> Self {
        ChatError::Request {
            backend: backend.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatError::Configuration { backend, message } => {
                write!(f, "{backend} is not configured: {message}")
            }
            ChatError::UnknownProvider { hint } => {
                write!(f, "Cannot find provider with <{hint}>")
            }
            ChatError::ModelNotFound { backend, model } => {
                write!(f, "Model {model} not found for {backend}")
            }
            ChatError::Request { backend, message } => {
                write!(f, "{backend} request failed: {message}")
            }
        }
    }
}

impl Error for ChatError {}
