//! Conversation turn and wire frame types for Murmur.
//!
//! These types model chat conversations: the immutable turns that make up
//! a history, conversation listing metadata, and the JSON frames streamed
//! to the client over SSE.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Re-export MessageRole from the engine module (turns and prompts share it).
pub use crate::engine::MessageRole;

/// One message (user or assistant) in a conversation.
///
/// Immutable once created. Turns are ordered by `created_at` within a
/// conversation; only `User` and `Assistant` roles ever appear in a history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    /// Create a turn stamped with the current time.
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// Listing metadata for one stored conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMeta {
    pub id: String,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One JSON frame on the client-facing event stream.
///
/// All keys are optional on the wire; absent keys are omitted entirely.
/// Exactly one terminal frame (`continuing: false`) ends every request,
/// and it is always the last frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Frame {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continuing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Frame {
    /// A token frame: carries one text fragment, stream continues.
    pub fn token(text: impl Into<String>) -> Self {
        Self {
            token: Some(text.into()),
            continuing: Some(true),
            ..Self::default()
        }
    }

    /// The normal terminal frame.
    pub fn terminal() -> Self {
        Self {
            continuing: Some(false),
            ..Self::default()
        }
    }

    /// An error terminal frame: reason plus `continuing: false` in one frame.
    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            error: Some(reason.into()),
            continuing: Some(false),
            ..Self::default()
        }
    }

    /// A title frame, emitted after the first completed exchange.
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    /// Whether this frame ends the stream.
    pub fn is_terminal(&self) -> bool {
        self.continuing == Some(false)
    }
}
