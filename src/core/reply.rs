/// Accumulates streamed fragments in arrival order.
#[derive(Debug, Default, Clone)]
pub struct ReplyBuffer {
    text: String,
    fragments: usize,
}

/// The full text of a reply whose stream drained without error. Only this
/// type can be committed to a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedReply(String);

impl ReplyBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: &str) {
        self.text.push_str(fragment);
        self.fragments += 1;
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments
    }

    pub fn finish(self) -> CompletedReply {
        CompletedReply(self.text)
    }
}

impl CompletedReply {
    pub fn text(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}
