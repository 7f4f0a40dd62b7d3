//! Process-wide session registry.
//!
//! Maps `(owner_id, conversation_id)` to live sessions. Entries are
//! created on demand and never evicted; over a long process lifetime this
//! grows unbounded (a TTL sweep would slot in here without touching
//! callers).

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::chat::session::ConversationSession;
use crate::chat::store::TurnStore;

type SessionKey = (String, String);

/// Shared registry of in-memory conversation sessions.
///
/// Lookups and insertions are safe under concurrent requests; the entry
/// API makes insert-if-absent atomic, so two racing first requests for
/// one conversation end up sharing a single session.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionKey, Arc<Mutex<ConversationSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the session for `(owner_id, conversation_id)`, hydrating it
    /// from the store on first reference.
    ///
    /// Two concurrent first references may both hydrate; the entry API
    /// keeps exactly one and both callers receive it.
    pub async fn get_or_load<S: TurnStore>(
        &self,
        store: &S,
        owner_id: &str,
        conversation_id: &str,
        max_pairs: usize,
        system_prompt: &str,
    ) -> Arc<Mutex<ConversationSession>> {
        let key = (owner_id.to_string(), conversation_id.to_string());
        if let Some(existing) = self.sessions.get(&key) {
            return existing.clone();
        }

        let loaded =
            ConversationSession::load(store, owner_id, conversation_id, max_pairs, system_prompt)
                .await;
        self.sessions
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(loaded)))
            .clone()
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryTurnStore;

    #[tokio::test]
    async fn same_key_returns_same_session() {
        let registry = SessionRegistry::new();
        let store = MemoryTurnStore::new();

        let a = registry.get_or_load(&store, "u1", "c1", 5, "").await;
        let b = registry.get_or_load(&store, "u1", "c1", 5, "").await;

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn keys_are_scoped_by_owner_and_conversation() {
        let registry = SessionRegistry::new();
        let store = MemoryTurnStore::new();

        let a = registry.get_or_load(&store, "u1", "c1", 5, "").await;
        let b = registry.get_or_load(&store, "u2", "c1", 5, "").await;
        let c = registry.get_or_load(&store, "u1", "c2", 5, "").await;

        assert!(!Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(registry.len(), 3);
    }

    #[tokio::test]
    async fn hydrates_existing_history_on_first_reference() {
        let registry = SessionRegistry::new();
        let store = MemoryTurnStore::new();
        {
            let mut session =
                ConversationSession::load(&store, "u1", "c1", 5, "").await;
            session.append_user(&store, "earlier").await;
        }

        let session = registry.get_or_load(&store, "u1", "c1", 5, "").await;
        let session = session.lock().await;
        assert_eq!(session.turns().len(), 1);
        assert_eq!(session.turns()[0].content, "earlier");
    }
}
