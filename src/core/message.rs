use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl AsRef<str> for Role {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl TryFrom<&str> for Role {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            _ => Err(format!("invalid message role: {value}")),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        value.as_str().to_string()
    }
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}

/// Ordered, append-only message history owned by a single provider.
///
/// The primer, when set, is always the first message of a fresh history.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    primer: Option<String>,
}

impl Conversation {
    pub fn new(primer: Option<String>) -> Self {
        let mut conversation = Self {
            messages: Vec::new(),
            primer: primer.filter(|p| !p.is_empty()),
        };
        conversation.reset(None);
        conversation
    }

    /// Clears the history. A non-empty `primer` replaces the stored one; the
    /// stored primer, if any, then seeds the new history.
    pub fn reset(&mut self, primer: Option<String>) {
        self.messages.clear();
        if let Some(primer) = primer.filter(|p| !p.is_empty()) {
            self.primer = Some(primer);
        }
        if let Some(primer) = &self.primer {
            self.messages.push(Message::system(primer.clone()));
        }
    }

    pub fn primer(&self) -> Option<&str> {
        self.primer.as_deref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn user_turns(&self) -> usize {
        self.messages.iter().filter(|m| m.is_user()).count()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(Message::assistant(content));
    }

    /// Removes a trailing user message that never received a reply.
    pub fn pop_pending_user(&mut self) -> Option<Message> {
        if self.messages.last().is_some_and(Message::is_user) {
            self.messages.pop()
        } else {
            None
        }
    }

    /// Splits the history into the system instruction and the remaining
    /// turns, for APIs that carry the system prompt out of band.
    pub fn split_system(messages: &[Message]) -> (Option<&str>, &[Message]) {
        match messages.split_first() {
            Some((first, rest)) if first.role == Role::System => {
                (Some(first.content.as_str()), rest)
            }
            _ => (None, messages),
        }
    }
}
