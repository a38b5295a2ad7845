//! AI conversation backend.
//!
//! A conversation is a stored transcript; each message is answered by
//! replaying the transcript to Ollama behind the configured system prompt.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::OllamaConfig;
use crate::db::{Conversation, ConversationMessage, Database, MessageRole};
use crate::error::{AiError, ServiceResult};
use crate::ollama::{ChatMessage, OllamaClient};

/// Conversational AI service used for tutoring chat and summaries
#[async_trait]
pub trait ConversationBackend: Send + Sync {
    /// Start an empty conversation and return its id
    async fn create_conversation(&self) -> ServiceResult<String>;

    /// Send a learner message and return the assistant's reply
    async fn send_message(&self, conversation_id: &str, text: &str) -> ServiceResult<String>;

    /// One-shot summary of `content`
    async fn summarize(&self, content: &str) -> ServiceResult<String>;
}

/// [`ConversationBackend`] backed by Ollama with transcripts in SQLite
pub struct OllamaConversations {
    client: OllamaClient,
    db: Arc<Database>,
    chat_system_prompt: String,
    summary_system_prompt: String,
}

impl OllamaConversations {
    pub fn new(config: &OllamaConfig, db: Arc<Database>) -> ServiceResult<Self> {
        Ok(Self {
            client: OllamaClient::new(config)?,
            db,
            chat_system_prompt: config.chat_system_prompt.clone(),
            summary_system_prompt: config.summary_system_prompt.clone(),
        })
    }

    pub async fn health_check(&self) -> bool {
        self.client.health_check().await
    }
}

fn role_name(role: MessageRole) -> &'static str {
    match role {
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
        MessageRole::System => "system",
    }
}

#[async_trait]
impl ConversationBackend for OllamaConversations {
    async fn create_conversation(&self) -> ServiceResult<String> {
        let now = Utc::now();
        let conversation = Conversation {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
        };
        self.db.insert_conversation(&conversation)?;

        info!(conversation_id = %conversation.id, "Created conversation");
        Ok(conversation.id)
    }

    async fn send_message(&self, conversation_id: &str, text: &str) -> ServiceResult<String> {
        let conversation = self.db.get_conversation(conversation_id)?.ok_or_else(|| {
            AiError::ConversationNotFound {
                conversation_id: conversation_id.to_string(),
            }
        })?;

        let mut messages = Vec::with_capacity(conversation.messages.len() + 2);
        messages.push(ChatMessage::new("system", &self.chat_system_prompt));
        messages.extend(
            conversation
                .messages
                .iter()
                .map(|m| ChatMessage::new(role_name(m.role), &m.content)),
        );
        messages.push(ChatMessage::new("user", text));

        debug!(
            conversation_id = %conversation_id,
            history = conversation.messages.len(),
            "Sending message to AI backend"
        );

        let reply = self.client.chat(messages).await?;
        if reply.trim().is_empty() {
            return Err(AiError::EmptyOutput.into());
        }

        let now = Utc::now();
        let turn = [
            ConversationMessage {
                role: MessageRole::User,
                content: text.to_string(),
                timestamp: now,
            },
            ConversationMessage {
                role: MessageRole::Assistant,
                content: reply.clone(),
                timestamp: now,
            },
        ];
        if !self.db.append_conversation_messages(conversation_id, &turn)? {
            return Err(AiError::ConversationNotFound {
                conversation_id: conversation_id.to_string(),
            }
            .into());
        }

        Ok(reply)
    }

    async fn summarize(&self, content: &str) -> ServiceResult<String> {
        let messages = vec![
            ChatMessage::new("system", &self.summary_system_prompt),
            ChatMessage::new("user", content),
        ];

        let summary = self.client.chat(messages).await?;
        if summary.trim().is_empty() {
            return Err(AiError::EmptyOutput.into());
        }
        Ok(summary)
    }
}
