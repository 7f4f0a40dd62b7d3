//! Conversation management endpoints.
//!
//! POST /api/conversations -- mint a conversation id
//! GET  /api/conversations -- list the owner's conversations
//! GET  /api/conversations/{id}/history -- full stored history
//!
//! History always returns the complete store contents for display; the
//! prompting window the session maintains is bounded separately.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use murmur_core::chat::store::TurnStore;
use murmur_types::chat::MessageRole;

use crate::http::error::AppError;
use crate::http::handlers::owner_from_headers;
use crate::state::AppState;

/// Title given to conversations created before their first exchange.
const NEW_CONVERSATION_TITLE: &str = "New Conversation";

#[derive(Debug, Serialize)]
pub struct CreatedConversation {
    pub conversation_id: String,
}

/// POST /api/conversations -- create a new conversation.
pub async fn create_conversation(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CreatedConversation>, AppError> {
    let owner_id = owner_from_headers(&headers);
    let conversation_id = uuid::Uuid::new_v4().to_string();

    state
        .store
        .create_conversation(&owner_id, &conversation_id, Some(NEW_CONVERSATION_TITLE))
        .await?;

    Ok(Json(CreatedConversation { conversation_id }))
}

#[derive(Debug, Serialize)]
pub struct ConversationListEntry {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ConversationList {
    pub conversations: Vec<ConversationListEntry>,
}

/// GET /api/conversations -- list conversations, most recent first.
pub async fn list_conversations(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ConversationList>, AppError> {
    let owner_id = owner_from_headers(&headers);
    let conversations = state
        .store
        .list_conversations(&owner_id)
        .await?
        .into_iter()
        .map(|meta| ConversationListEntry {
            id: meta.id,
            title: meta
                .title
                .unwrap_or_else(|| NEW_CONVERSATION_TITLE.to_string()),
            created_at: meta.created_at,
        })
        .collect();

    Ok(Json(ConversationList { conversations }))
}

/// One displayed history entry, shaped for the chat frontend.
#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    pub text: String,
    #[serde(rename = "isUser")]
    pub is_user: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub history: Vec<HistoryEntry>,
    pub conversation_id: String,
}

/// GET /api/conversations/{id}/history -- full stored history for display.
pub async fn get_history(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> Result<Json<HistoryResponse>, AppError> {
    let history = state
        .store
        .read_all(&conversation_id)
        .await?
        .into_iter()
        .map(|turn| HistoryEntry {
            text: turn.content,
            is_user: turn.role == MessageRole::User,
            timestamp: turn.created_at,
        })
        .collect();

    Ok(Json(HistoryResponse {
        history,
        conversation_id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_entry_uses_frontend_key_names() {
        let entry = HistoryEntry {
            text: "hello".to_string(),
            is_user: true,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["text"], "hello");
        assert_eq!(json["isUser"], true);
        assert!(json.get("is_user").is_none());
    }
}
