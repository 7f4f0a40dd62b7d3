//! TurnStore trait definition.
//!
//! Append-only, per-conversation ordered log of turns plus conversation
//! metadata (title, listing). Uses native async fn in traits (RPITIT);
//! implementations live in murmur-infra (e.g., `SqliteTurnStore`).

use murmur_types::chat::{ConversationMeta, Turn};
use murmur_types::error::StoreError;

/// Persistence port for conversation turns and metadata.
///
/// Each `append` is a single atomic write; concurrent appends from
/// different conversations must not interleave-corrupt. Contents are
/// durable across process restarts.
pub trait TurnStore: Send + Sync {
    /// Append one turn to a conversation's log.
    ///
    /// Creates the conversation record lazily on first append, owned by
    /// `owner_id`.
    fn append(
        &self,
        conversation_id: &str,
        owner_id: &str,
        turn: &Turn,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Read a conversation's full log in timestamp order.
    fn read_all(
        &self,
        conversation_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Turn>, StoreError>> + Send;

    /// Set the conversation's title.
    fn set_title(
        &self,
        conversation_id: &str,
        title: &str,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Get the conversation's title, if one has been assigned.
    fn get_title(
        &self,
        conversation_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<String>, StoreError>> + Send;

    /// Create a conversation record explicitly (listing surface).
    fn create_conversation(
        &self,
        owner_id: &str,
        conversation_id: &str,
        title: Option<&str>,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// List an owner's conversations, most recent first.
    fn list_conversations(
        &self,
        owner_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<ConversationMeta>, StoreError>> + Send;
}
