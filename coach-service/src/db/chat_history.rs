//! Chat history operations.
//!
//! The log for a user is one JSON array. Appends run inside an immediate
//! transaction so a read-modify-write never loses a concurrent pair.

use chrono::Utc;
use rusqlite::{OptionalExtension, TransactionBehavior, params};
use tracing::warn;

use super::Database;
use super::models::{ChatHistory, ChatMessage, MessageRole};
use crate::error::{DatabaseError, ServiceResult};

/// One learner/assistant exchange to append
#[derive(Debug, Clone)]
pub struct Exchange<'a> {
    pub skill: &'a str,
    pub conversation_id: &'a str,
    pub user_text: &'a str,
    pub assistant_text: &'a str,
}

impl Database {
    /// Get the chat history for a user, if any has been recorded
    pub fn get_chat_history(&self, user_id: &str) -> ServiceResult<Option<ChatHistory>> {
        let conn = self.lock()?;

        let messages: Option<String> = conn
            .query_row(
                "SELECT messages FROM chat_histories WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(DatabaseError::Query)?;

        let Some(messages) = messages else {
            return Ok(None);
        };

        let messages: Vec<ChatMessage> =
            serde_json::from_str(&messages).map_err(DatabaseError::Serialization)?;

        Ok(Some(ChatHistory {
            user_id: user_id.to_string(),
            messages,
        }))
    }

    /// Append a user/assistant pair sharing one UTC timestamp.
    ///
    /// A missing or undecodable history is replaced by a fresh one.
    pub fn append_exchange(&self, user_id: &str, exchange: &Exchange<'_>) -> ServiceResult<()> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(DatabaseError::Query)?;

        let existing: Option<String> = tx
            .query_row(
                "SELECT messages FROM chat_histories WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(DatabaseError::Query)?;

        let mut messages: Vec<ChatMessage> = match existing {
            Some(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                warn!(user_id = %user_id, error = %e, "Chat history undecodable, starting fresh");
                Vec::new()
            }),
            None => Vec::new(),
        };

        let now = Utc::now();
        let message = |role, text: &str| ChatMessage {
            role,
            text: text.to_string(),
            skill: exchange.skill.to_string(),
            conversation_id: exchange.conversation_id.to_string(),
            timestamp: now,
        };
        messages.push(message(MessageRole::User, exchange.user_text));
        messages.push(message(MessageRole::Assistant, exchange.assistant_text));

        let json = serde_json::to_string(&messages).map_err(DatabaseError::Serialization)?;
        tx.execute(
            r#"
            INSERT INTO chat_histories (user_id, messages, updated_at) VALUES (?1, ?2, datetime('now'))
            ON CONFLICT(user_id) DO UPDATE SET
                messages = excluded.messages,
                updated_at = excluded.updated_at
            "#,
            params![user_id, json],
        )
        .map_err(DatabaseError::Query)?;

        tx.commit().map_err(DatabaseError::Query)?;

        Ok(())
    }
}
