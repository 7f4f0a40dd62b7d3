//! SQLite turn store implementation.
//!
//! Implements `TurnStore` from `murmur-core` using sqlx with split
//! read/write pools: raw queries, private Row structs, writer pool for
//! INSERT/UPDATE, reader pool for SELECT. Conversation rows are created
//! lazily on first append so a client-minted conversation id just works.

use chrono::{DateTime, Utc};
use sqlx::Row;

use murmur_core::chat::store::TurnStore;
use murmur_types::chat::{ConversationMeta, MessageRole, Turn};
use murmur_types::error::StoreError;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `TurnStore`.
pub struct SqliteTurnStore {
    pool: DatabasePool,
}

impl SqliteTurnStore {
    /// Create a new store backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

/// Internal row type for mapping SQLite rows to domain Turn.
struct TurnRow {
    role: String,
    content: String,
    created_at: String,
}

impl TurnRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            role: row.try_get("role")?,
            content: row.try_get("content")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_turn(self) -> Result<Turn, StoreError> {
        let role: MessageRole = self
            .role
            .parse()
            .map_err(|e: String| StoreError::Query(e))?;
        let created_at = parse_datetime(&self.created_at)?;

        Ok(Turn {
            role,
            content: self.content,
            created_at,
        })
    }
}

/// Internal row type for mapping SQLite rows to domain ConversationMeta.
struct ConversationRow {
    id: String,
    title: Option<String>,
    created_at: String,
}

impl ConversationRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_meta(self) -> Result<ConversationMeta, StoreError> {
        let created_at = parse_datetime(&self.created_at)?;
        Ok(ConversationMeta {
            id: self.id,
            title: self.title,
            created_at,
        })
    }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Query(format!("invalid timestamp '{s}': {e}")))
}

impl TurnStore for SqliteTurnStore {
    async fn append(
        &self,
        conversation_id: &str,
        owner_id: &str,
        turn: &Turn,
    ) -> Result<(), StoreError> {
        // One transaction so the lazy conversation row and the turn land
        // together (single atomic write per append).
        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        sqlx::query(
            "INSERT OR IGNORE INTO conversations (id, owner_id, title, created_at)
             VALUES (?, ?, NULL, ?)",
        )
        .bind(conversation_id)
        .bind(owner_id)
        .bind(turn.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        sqlx::query(
            "INSERT INTO turns (conversation_id, role, content, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(conversation_id)
        .bind(turn.role.to_string())
        .bind(&turn.content)
        .bind(turn.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Query(e.to_string()))
    }

    async fn read_all(&self, conversation_id: &str) -> Result<Vec<Turn>, StoreError> {
        let rows = sqlx::query(
            "SELECT role, content, created_at FROM turns
             WHERE conversation_id = ?
             ORDER BY created_at ASC, id ASC",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        rows.iter()
            .map(|row| {
                TurnRow::from_row(row)
                    .map_err(|e| StoreError::Query(e.to_string()))?
                    .into_turn()
            })
            .collect()
    }

    async fn set_title(&self, conversation_id: &str, title: &str) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE conversations SET title = ? WHERE id = ?")
            .bind(title)
            .bind(conversation_id)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn get_title(&self, conversation_id: &str) -> Result<Option<String>, StoreError> {
        let row = sqlx::query("SELECT title FROM conversations WHERE id = ?")
            .bind(conversation_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        match row {
            Some(row) => row
                .try_get("title")
                .map_err(|e| StoreError::Query(e.to_string())),
            None => Ok(None),
        }
    }

    async fn create_conversation(
        &self,
        owner_id: &str,
        conversation_id: &str,
        title: Option<&str>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT OR IGNORE INTO conversations (id, owner_id, title, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(conversation_id)
        .bind(owner_id)
        .bind(title)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }

    async fn list_conversations(&self, owner_id: &str) -> Result<Vec<ConversationMeta>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, title, created_at FROM conversations
             WHERE owner_id = ?
             ORDER BY created_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        rows.iter()
            .map(|row| {
                ConversationRow::from_row(row)
                    .map_err(|e| StoreError::Query(e.to_string()))?
                    .into_meta()
            })
            .collect()
    }
}
