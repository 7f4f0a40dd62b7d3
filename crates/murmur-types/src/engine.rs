//! Generation engine request/event types for Murmur.
//!
//! These types model the boundary to the text-generation engine: prompt
//! messages, the explicit generation configuration, the token events that
//! flow through the relay, and engine error handling.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of a message in a generation prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(MessageRole::System),
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(format!("invalid message role: '{other}'")),
        }
    }
}

/// A single entry in the ordered prompt sent to the generation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: MessageRole,
    pub content: String,
}

impl PromptMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Explicit generation parameters passed through to the engine.
///
/// Every recognized option is enumerated here with a default; unknown keys
/// in config files are rejected rather than silently merged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerationConfig {
    /// Upper bound on generated tokens per response.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f64,
    /// Nucleus sampling cutoff.
    pub top_p: f64,
    /// Top-k sampling cutoff.
    pub top_k: u32,
    /// Whether sampling is enabled at all (greedy decoding when false).
    pub sampling_enabled: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: 0.7,
            top_p: 0.95,
            top_k: 50,
            sampling_enabled: true,
        }
    }
}

/// Events carried by the token relay for one streaming request.
///
/// Zero or more `Token` events arrive strictly before exactly one terminal
/// event (`Done` or `Failed`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenEvent {
    /// One fragment of generated text, in production order.
    Token(String),
    /// Generation finished normally.
    Done,
    /// Generation failed; carries a human-readable reason.
    Failed(String),
}

impl TokenEvent {
    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TokenEvent::Done | TokenEvent::Failed(_))
    }
}

/// Errors from generation engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("engine request failed: {0}")]
    Request(String),

    #[error("engine stream error: {0}")]
    Stream(String),

    #[error("engine response malformed: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_role_roundtrip() {
        for role in [MessageRole::System, MessageRole::User, MessageRole::Assistant] {
            let s = role.to_string();
            let parsed: MessageRole = s.parse().unwrap();
            assert_eq!(role, parsed);
        }
    }

    #[test]
    fn test_message_role_serde() {
        let role = MessageRole::Assistant;
        let json = serde_json::to_string(&role).unwrap();
        assert_eq!(json, "\"assistant\"");
        let parsed: MessageRole = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, MessageRole::Assistant);
    }

    #[test]
    fn test_generation_config_defaults() {
        let config = GenerationConfig::default();
        assert_eq!(config.max_tokens, 1024);
        assert!((config.temperature - 0.7).abs() < f64::EPSILON);
        assert!((config.top_p - 0.95).abs() < f64::EPSILON);
        assert_eq!(config.top_k, 50);
        assert!(config.sampling_enabled);
    }

    #[test]
    fn test_generation_config_partial_deserialize() {
        let config: GenerationConfig =
            serde_json::from_str(r#"{"max_tokens": 256, "temperature": 0.2}"#).unwrap();
        assert_eq!(config.max_tokens, 256);
        assert!((config.temperature - 0.2).abs() < f64::EPSILON);
        // Unspecified fields fall back to defaults
        assert_eq!(config.top_k, 50);
    }

    #[test]
    fn test_generation_config_rejects_unknown_keys() {
        let result =
            serde_json::from_str::<GenerationConfig>(r#"{"max_tokens": 256, "beam_width": 4}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_token_event_terminal() {
        assert!(!TokenEvent::Token("hi".to_string()).is_terminal());
        assert!(TokenEvent::Done.is_terminal());
        assert!(TokenEvent::Failed("boom".to_string()).is_terminal());
    }

    #[test]
    fn test_engine_error_display() {
        let err = EngineError::Stream("connection reset".to_string());
        assert_eq!(err.to_string(), "engine stream error: connection reset");
    }
}
