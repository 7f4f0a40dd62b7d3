//! In-memory conversation session with bounded-window trimming.
//!
//! The session is the authoritative in-memory history for one
//! conversation and writes through to the `TurnStore`. The prompting
//! window is bounded (`2 * max_pairs` turns); the stored history is not,
//! so history-for-display and history-for-prompting may diverge.

use tracing::warn;

use murmur_types::chat::{MessageRole, Turn};
use murmur_types::engine::PromptMessage;

use crate::chat::store::TurnStore;

/// One conversation's in-memory history and trimming state.
///
/// Mutated only by the request flow that is actively streaming against it;
/// at most one in-flight generation per conversation is assumed.
pub struct ConversationSession {
    id: String,
    owner_id: String,
    turns: Vec<Turn>,
    max_pairs: usize,
    system_prompt: String,
    title: Option<String>,
}

impl ConversationSession {
    /// Hydrate a session from the store.
    ///
    /// A store read failure falls back to an empty history (logged, never
    /// an error): losing the window is preferable to refusing the chat.
    pub async fn load<S: TurnStore>(
        store: &S,
        owner_id: &str,
        conversation_id: &str,
        max_pairs: usize,
        system_prompt: &str,
    ) -> Self {
        let turns = match store.read_all(conversation_id).await {
            Ok(turns) => turns,
            Err(e) => {
                warn!(
                    conversation_id,
                    error = %e,
                    "failed to hydrate conversation history, starting empty"
                );
                Vec::new()
            }
        };
        let title = match store.get_title(conversation_id).await {
            Ok(title) => title,
            Err(e) => {
                warn!(conversation_id, error = %e, "failed to read conversation title");
                None
            }
        };

        let mut session = Self {
            id: conversation_id.to_string(),
            owner_id: owner_id.to_string(),
            turns,
            max_pairs,
            system_prompt: system_prompt.to_string(),
            title,
        };
        // Stored history may exceed the window; the prompt view never does.
        session.trim();
        session
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Append the user's turn and persist it before returning.
    ///
    /// Persisting up front means a crash during generation cannot lose the
    /// user's message. A store failure is logged and the turn stays
    /// in-memory only.
    pub async fn append_user<S: TurnStore>(&mut self, store: &S, text: &str) -> Turn {
        let turn = Turn::new(MessageRole::User, text);
        if let Err(e) = store.append(&self.id, &self.owner_id, &turn).await {
            warn!(
                conversation_id = %self.id,
                error = %e,
                "user turn not durably saved"
            );
        }
        self.turns.push(turn.clone());
        turn
    }

    /// Commit the accumulated assistant response: append, persist, trim.
    pub async fn commit_assistant<S: TurnStore>(&mut self, store: &S, text: &str) -> Turn {
        let turn = Turn::new(MessageRole::Assistant, text);
        if let Err(e) = store.append(&self.id, &self.owner_id, &turn).await {
            warn!(
                conversation_id = %self.id,
                error = %e,
                "assistant turn not durably saved"
            );
        }
        self.turns.push(turn.clone());
        self.trim();
        turn
    }

    /// Build the generation prompt: optional system prompt first, then the
    /// last `2 * max_pairs` turns in order.
    pub fn windowed_prompt(&self) -> Vec<PromptMessage> {
        let window = self.window();
        let mut prompt = Vec::with_capacity(window.len() + 1);
        if !self.system_prompt.is_empty() {
            prompt.push(PromptMessage::new(
                MessageRole::System,
                self.system_prompt.clone(),
            ));
        }
        for turn in window {
            prompt.push(PromptMessage::new(turn.role.clone(), turn.content.clone()));
        }
        prompt
    }

    /// Record the conversation title in memory and write through.
    pub async fn set_title<S: TurnStore>(&mut self, store: &S, title: &str) {
        if let Err(e) = store.set_title(&self.id, title).await {
            warn!(
                conversation_id = %self.id,
                error = %e,
                "conversation title not durably saved"
            );
        }
        self.title = Some(title.to_string());
    }

    /// Drop oldest turns until `len(turns) <= 2 * max_pairs` holds.
    fn trim(&mut self) {
        let cap = self.max_pairs * 2;
        if self.turns.len() > cap {
            self.turns.drain(..self.turns.len() - cap);
        }
    }

    fn window(&self) -> &[Turn] {
        let cap = self.max_pairs * 2;
        let start = self.turns.len().saturating_sub(cap);
        &self.turns[start..]
    }
}
