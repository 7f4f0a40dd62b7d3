//! Conversation title generation.
//!
//! `generate_title` derives a short title from the first user-assistant
//! exchange via a low-temperature engine call. The engine is blocking, so
//! the call runs on a dedicated blocking task, like any other generation.

use std::sync::Arc;

use murmur_types::engine::{EngineError, GenerationConfig, MessageRole, PromptMessage};

use crate::engine::GenerationEngine;

/// System prompt for the title generation call.
const TITLE_SYSTEM_PROMPT: &str = "Generate a short, descriptive title (3-7 words) for this \
conversation based on the first exchange. The title should capture the main topic or intent. \
Return ONLY the title text, nothing else.";

/// Hard cap on title length, applied after trimming.
const MAX_TITLE_CHARS: usize = 80;

/// Length of the fallback title cut from the first user message.
const FALLBACK_TITLE_CHARS: usize = 40;

/// Generate a title from the first completed exchange.
///
/// Runs at temperature 0.3 with a tight token budget; the result is
/// trimmed of whitespace and surrounding quotes and capped in length.
pub async fn generate_title(
    engine: Arc<dyn GenerationEngine>,
    first_user_message: &str,
    first_assistant_message: &str,
) -> Result<String, EngineError> {
    let prompt = vec![
        PromptMessage::new(MessageRole::System, TITLE_SYSTEM_PROMPT),
        PromptMessage::new(MessageRole::User, first_user_message),
        PromptMessage::new(MessageRole::Assistant, first_assistant_message),
        PromptMessage::new(
            MessageRole::User,
            "Based on our exchange above, generate a title.",
        ),
    ];
    let config = GenerationConfig {
        max_tokens: 24,
        temperature: 0.3,
        ..GenerationConfig::default()
    };

    let raw = tokio::task::spawn_blocking(move || -> Result<String, EngineError> {
        let mut collected = String::new();
        for fragment in engine.generate(&prompt, &config)? {
            collected.push_str(&fragment?);
        }
        Ok(collected)
    })
    .await
    .map_err(|e| EngineError::Stream(format!("title generation task failed: {e}")))??;

    Ok(tidy_title(&raw))
}

/// Fallback when the engine cannot produce a title: the first user
/// message, cut to a display-friendly length.
pub fn fallback_title(first_user_message: &str) -> String {
    let trimmed = first_user_message.trim();
    if trimmed.chars().count() <= FALLBACK_TITLE_CHARS {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(FALLBACK_TITLE_CHARS).collect();
    format!("{}...", cut.trim_end())
}

/// Trim whitespace and surrounding quotes, keep the first line, cap length.
fn tidy_title(raw: &str) -> String {
    let first_line = raw.lines().next().unwrap_or_default();
    let trimmed = first_line
        .trim()
        .trim_matches('"')
        .trim_matches('\'')
        .trim();
    trimmed.chars().take(MAX_TITLE_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedEngine;

    #[tokio::test]
    async fn collects_fragments_and_tidies() {
        let engine: Arc<dyn GenerationEngine> =
            Arc::new(ScriptedEngine::new(vec![vec!["\"Debugging ", "Rust ", "Lifetimes\""]]));
        let title = generate_title(engine, "help with lifetimes", "sure").await.unwrap();
        assert_eq!(title, "Debugging Rust Lifetimes");
    }

    #[tokio::test]
    async fn engine_failure_propagates() {
        let engine: Arc<dyn GenerationEngine> = Arc::new(ScriptedEngine::refusing(
            EngineError::Request("down".to_string()),
        ));
        let result = generate_title(engine, "hi", "hello").await;
        assert!(result.is_err());
    }

    #[test]
    fn tidy_title_trims_quotes_and_whitespace() {
        assert_eq!(tidy_title("  \"Planning a Trip\"  "), "Planning a Trip");
        assert_eq!(tidy_title("'Quick question'"), "Quick question");
        assert_eq!(tidy_title("  Plain title  "), "Plain title");
    }

    #[test]
    fn tidy_title_keeps_first_line_only() {
        assert_eq!(tidy_title("Title here\nwith a stray explanation"), "Title here");
    }

    #[test]
    fn fallback_title_short_message_is_unchanged() {
        assert_eq!(fallback_title("  Hi there  "), "Hi there");
    }

    #[test]
    fn fallback_title_truncates_long_messages() {
        let long = "a".repeat(100);
        let title = fallback_title(&long);
        assert!(title.ends_with("..."));
        assert!(title.chars().count() <= FALLBACK_TITLE_CHARS + 3);
    }
}
