use std::fmt;

/// Provider used when a binding is addressed with an empty provider name.
pub const DEFAULT_PROVIDER: &str = "codex";

/// Conversation identity handed over by the transport. Opaque to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for ConversationId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for ConversationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ConversationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Persisted key for a binding: `<provider>:<conversation>`.
pub fn session_key(provider: &str, conversation: &ConversationId) -> String {
    let provider = provider.trim().to_lowercase();
    let provider = if provider.is_empty() {
        DEFAULT_PROVIDER
    } else {
        provider.as_str()
    };
    format!("{}:{}", provider, conversation)
}
