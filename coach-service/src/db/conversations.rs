//! AI conversation transcript operations.

use chrono::Utc;
use rusqlite::{OptionalExtension, TransactionBehavior, params};

use super::Database;
use super::models::{Conversation, ConversationMessage};
use crate::error::{DatabaseError, ServiceResult};

impl Database {
    /// Insert a new conversation
    pub fn insert_conversation(&self, conv: &Conversation) -> ServiceResult<()> {
        let conn = self.lock()?;

        let messages_json =
            serde_json::to_string(&conv.messages).map_err(DatabaseError::Serialization)?;

        conn.execute(
            "INSERT INTO conversations (id, created_at, updated_at, messages) VALUES (?1, ?2, ?3, ?4)",
            params![
                conv.id,
                conv.created_at.to_rfc3339(),
                conv.updated_at.to_rfc3339(),
                messages_json,
            ],
        )
        .map_err(DatabaseError::Query)?;

        Ok(())
    }

    /// Get a conversation by ID
    pub fn get_conversation(&self, id: &str) -> ServiceResult<Option<Conversation>> {
        let conn = self.lock()?;

        conn.query_row(
            "SELECT id, created_at, updated_at, messages FROM conversations WHERE id = ?1",
            params![id],
            Conversation::from_row,
        )
        .optional()
        .map_err(DatabaseError::Query)
        .map_err(Into::into)
    }

    /// Append messages to a conversation; returns false if it does not exist
    pub fn append_conversation_messages(
        &self,
        id: &str,
        new_messages: &[ConversationMessage],
    ) -> ServiceResult<bool> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(DatabaseError::Query)?;

        let existing: Option<String> = tx
            .query_row(
                "SELECT messages FROM conversations WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .map_err(DatabaseError::Query)?;

        let Some(existing) = existing else {
            return Ok(false);
        };

        let mut messages: Vec<ConversationMessage> =
            serde_json::from_str(&existing).map_err(DatabaseError::Serialization)?;
        messages.extend_from_slice(new_messages);

        let messages_json =
            serde_json::to_string(&messages).map_err(DatabaseError::Serialization)?;
        tx.execute(
            "UPDATE conversations SET messages = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, messages_json, Utc::now().to_rfc3339()],
        )
        .map_err(DatabaseError::Query)?;

        tx.commit().map_err(DatabaseError::Query)?;

        Ok(true)
    }
}
