//! In-memory backends and a one-shot HTTP responder for tests.

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::core::backend::{BackendKind, ChatBackend, Credentials, FragmentStream};
use crate::core::error::ChatError;
use crate::core::message::Message;
use crate::core::registry::BackendFactory;

enum Script {
    Fragments(Vec<Result<String, ChatError>>),
    Hang(Vec<String>),
    Late(Duration, Vec<String>),
    Refuse(ChatError),
}

struct State {
    models: Result<Vec<String>, ChatError>,
    listing_delay: Duration,
    replies: VecDeque<Script>,
    requests: Vec<Vec<Message>>,
}

/// A backend that answers from a queue of scripted replies. Clones share
/// state, so a test can keep a handle after boxing one into a provider.
#[derive(Clone)]
pub struct ScriptedBackend {
    kind: BackendKind,
    state: Arc<Mutex<State>>,
}

impl ScriptedBackend {
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            state: Arc::new(Mutex::new(State {
                models: Ok(kind.fallback_models().iter().map(|m| m.to_string()).collect()),
                listing_delay: Duration::ZERO,
                replies: VecDeque::new(),
                requests: Vec::new(),
            })),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("scripted state")
    }

    pub fn with_models(self, models: &[&str]) -> Self {
        self.set_models(Ok(models.iter().map(|m| m.to_string()).collect()));
        self
    }

    pub fn failing_models(self, err: ChatError) -> Self {
        self.set_models(Err(err));
        self
    }

    pub fn set_models(&self, models: Result<Vec<String>, ChatError>) {
        self.state().models = models;
    }

    pub fn reply(self, fragments: &[&str]) -> Self {
        let script = fragments.iter().map(|f| Ok(f.to_string())).collect();
        self.state().replies.push_back(Script::Fragments(script));
        self
    }

    /// Streams `fragments`, then fails with `err`.
    pub fn reply_then_fail(self, fragments: &[&str], err: ChatError) -> Self {
        let mut script: Vec<_> = fragments.iter().map(|f| Ok(f.to_string())).collect();
        script.push(Err(err));
        self.state().replies.push_back(Script::Fragments(script));
        self
    }

    /// Streams `fragments`, then never finishes.
    pub fn reply_then_hang(self, fragments: &[&str]) -> Self {
        let script = fragments.iter().map(|f| f.to_string()).collect();
        self.state().replies.push_back(Script::Hang(script));
        self
    }

    /// Waits `delay` before the stream opens, then streams `fragments`.
    pub fn reply_after(self, delay: Duration, fragments: &[&str]) -> Self {
        let script = fragments.iter().map(|f| f.to_string()).collect();
        self.state().replies.push_back(Script::Late(delay, script));
        self
    }

    /// Makes later model listings wait `delay` before answering.
    pub fn set_listing_delay(&self, delay: Duration) {
        self.state().listing_delay = delay;
    }

    pub fn refuse(self, err: ChatError) -> Self {
        self.state().replies.push_back(Script::Refuse(err));
        self
    }

    /// Histories passed to `stream_chat`, oldest first.
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.state().requests.clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn fetch_models(&self) -> Result<Vec<String>, ChatError> {
        let (models, delay) = {
            let state = self.state();
            (state.models.clone(), state.listing_delay)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        models
    }

    async fn stream_chat(
        &self,
        _model: &str,
        messages: &[Message],
    ) -> Result<FragmentStream, ChatError> {
        let script = {
            let mut state = self.state();
            state.requests.push(messages.to_vec());
            state.replies.pop_front()
        };
        match script {
            Some(Script::Fragments(items)) => Ok(stream::iter(items).boxed()),
            Some(Script::Hang(items)) => Ok(stream::iter(items.into_iter().map(Ok))
                .chain(stream::pending())
                .boxed()),
            Some(Script::Late(delay, items)) => {
                tokio::time::sleep(delay).await;
                Ok(stream::iter(items.into_iter().map(Ok)).boxed())
            }
            Some(Script::Refuse(err)) => Err(err),
            None => Err(ChatError::request(self.kind.tag(), "no scripted reply")),
        }
    }
}

/// Hands out clones of pre-built scripted backends.
#[derive(Default)]
pub struct ScriptedFactory {
    backends: HashMap<BackendKind, ScriptedBackend>,
}

impl ScriptedFactory {
    pub fn with(mut self, backend: ScriptedBackend) -> Self {
        self.backends.insert(backend.kind, backend);
        self
    }
}

impl BackendFactory for ScriptedFactory {
    fn build(&self, credentials: Credentials) -> Box<dyn ChatBackend> {
        let backend = self
            .backends
            .get(&credentials.kind)
            .cloned()
            .unwrap_or_else(|| ScriptedBackend::new(credentials.kind));
        Box::new(backend)
    }
}

/// A lookup that reports a credential for each of `kinds`.
pub fn credentials_for(kinds: &[BackendKind]) -> impl Fn(&str) -> Option<String> {
    let vars: Vec<(&'static str, String)> = kinds
        .iter()
        .map(|kind| {
            let value = match kind {
                BackendKind::Ollama => "http://127.0.0.1:11434".to_string(),
                other => format!("test-key-{}", other.tag()),
            };
            (kind.credential_var(), value)
        })
        .collect();
    move |key| {
        vars.iter()
            .find(|(var, _)| *var == key)
            .map(|(_, value)| value.clone())
    }
}

/// Serves exactly one HTTP response on a local port. Resolves to the raw
/// request (head and body) once the exchange is done.
pub async fn serve_once(
    status: u16,
    content_type: &str,
    body: impl Into<String>,
) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let content_type = content_type.to_string();
    let body = body.into();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let mut request = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let read = socket.read(&mut chunk).await.expect("read");
            if read == 0 {
                break;
            }
            request.extend_from_slice(&chunk[..read]);
            if request_complete(&request) {
                break;
            }
        }

        let response = format!(
            "HTTP/1.1 {status} Test\r\ncontent-type: {content_type}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.expect("write");
        socket.shutdown().await.ok();
        String::from_utf8_lossy(&request).into_owned()
    });

    (format!("http://{addr}"), handle)
}

fn request_complete(raw: &[u8]) -> bool {
    let Some(head_end) = raw.windows(4).position(|w| w == b"\r\n\r\n") else {
        return false;
    };
    let head = String::from_utf8_lossy(&raw[..head_end]).to_ascii_lowercase();
    let length = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    raw.len() >= head_end + 4 + length
}
