//! Core data types used throughout the retrieval and memory pipeline.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// A contiguous, non-empty slice of a normalized source document, as
/// produced by the chunker. Offsets are character positions in the
/// normalized text, so `0 <= start_offset < end_offset <= text length`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkPiece {
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
    pub chunk_index: i64,
}

/// A stored chunk together with its decoded embedding, in insertion order.
#[derive(Debug, Clone)]
pub struct StoredVector {
    pub doc_name: String,
    pub chunk_index: i64,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// A ranked retrieval result.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub doc_name: String,
    pub chunk_index: i64,
    pub text: String,
    pub similarity: f32,
}

/// Speaker of a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }

    /// Parse a stored role string. Unknown roles map to `None` so stale
    /// rows are skipped rather than crashing retrieval.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "system" => Some(ChatRole::System),
            "user" => Some(ChatRole::User),
            "assistant" => Some(ChatRole::Assistant),
            _ => None,
        }
    }
}

/// One role/content pair, the unit consumed by completion providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }
}

/// Conversation mode. Memory is partitioned by mode: each (chat, mode)
/// stream has its own history and, for [`ChatMode::Summary`], its own
/// running summary. A closed enum so adding a mode is a compile-time
/// visible change rather than a stray string tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ChatMode {
    /// Plain chat with capped raw history.
    Text,
    /// Retrieval-augmented: relevant document chunks are folded into the
    /// prompt.
    Rag,
    /// Compacted memory: older turns are folded into a running summary.
    Summary,
    /// Answers must be a single JSON object; invalid output goes through
    /// one repair pass.
    Structured,
}

impl ChatMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatMode::Text => "text",
            ChatMode::Rag => "rag",
            ChatMode::Summary => "summary",
            ChatMode::Structured => "structured",
        }
    }

    /// Whether this mode's context is built from a running summary plus a
    /// tail window instead of the plain capped history.
    pub fn uses_summary(&self) -> bool {
        matches!(self, ChatMode::Summary)
    }
}

impl std::fmt::Display for ChatMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The running summary for one (chat, mode) stream. `last_message_id` is
/// the highest message id already folded in; it only ever moves forward.
#[derive(Debug, Clone, Default)]
pub struct ConversationSummary {
    pub summary: String,
    pub last_message_id: i64,
    pub updated_at: String,
}

/// Per-chat settings. Every field is optional: `None` means "use the
/// configured default".
#[derive(Debug, Clone, Default)]
pub struct ChatSettings {
    pub temperature: Option<f64>,
    pub memory_enabled: Option<bool>,
    pub model: Option<String>,
}
