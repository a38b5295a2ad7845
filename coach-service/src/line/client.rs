//! LINE Messaging API client.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use hmac::{Hmac, Mac};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use sha2::Sha256;
use tracing::debug;

use super::messages::OutboundMessage;
use crate::config::LineConfig;
use crate::error::PlatformError;

/// Messages accepted by a single reply or push call
pub const MAX_MESSAGES_PER_REQUEST: usize = 5;

/// Chat platform operations used by the coaching flows
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Answer an event with its one-time reply token
    async fn reply(
        &self,
        reply_token: &str,
        messages: &[OutboundMessage],
    ) -> Result<(), PlatformError>;

    /// Send to a user without a reply token
    async fn push(&self, user_id: &str, messages: &[OutboundMessage]) -> Result<(), PlatformError>;

    /// Download the binary content of a media message
    async fn message_content(&self, message_id: &str) -> Result<Bytes, PlatformError>;

    /// Display name of a user
    async fn profile_name(&self, user_id: &str) -> Result<String, PlatformError>;
}

/// Verify `X-Line-Signature` (base64 HMAC-SHA256 of the raw body)
pub fn verify_signature(
    channel_secret: &str,
    body: &[u8],
    signature: &str,
) -> Result<(), PlatformError> {
    let expected = BASE64
        .decode(signature.trim())
        .map_err(|_| PlatformError::InvalidSignature)?;
    let mut mac = Hmac::<Sha256>::new_from_slice(channel_secret.as_bytes())
        .map_err(|_| PlatformError::InvalidSignature)?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| PlatformError::InvalidSignature)
}

/// [`ChatPlatform`] over the LINE Messaging API
pub struct LineClient {
    client: Client,
    access_token: String,
    api_base_url: String,
    data_api_base_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Profile {
    display_name: String,
}

impl LineClient {
    pub fn new(config: &LineConfig) -> Result<Self, PlatformError> {
        let client = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            client,
            access_token: config.channel_access_token.clone(),
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            data_api_base_url: config.data_api_base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post_messages(&self, path: &str, body: Value) -> Result<(), PlatformError> {
        let url = format!("{}{}", self.api_base_url, path);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

async fn check_status(response: Response) -> Result<Response, PlatformError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    Err(PlatformError::Api { status, message })
}

fn encode_messages(messages: &[OutboundMessage]) -> Vec<Value> {
    messages.iter().map(OutboundMessage::to_json).collect()
}

#[async_trait]
impl ChatPlatform for LineClient {
    async fn reply(
        &self,
        reply_token: &str,
        messages: &[OutboundMessage],
    ) -> Result<(), PlatformError> {
        debug!(count = messages.len(), "Replying");
        self.post_messages(
            "/v2/bot/message/reply",
            json!({ "replyToken": reply_token, "messages": encode_messages(messages) }),
        )
        .await
    }

    async fn push(&self, user_id: &str, messages: &[OutboundMessage]) -> Result<(), PlatformError> {
        debug!(user_id = %user_id, count = messages.len(), "Pushing");
        self.post_messages(
            "/v2/bot/message/push",
            json!({ "to": user_id, "messages": encode_messages(messages) }),
        )
        .await
    }

    async fn message_content(&self, message_id: &str) -> Result<Bytes, PlatformError> {
        let url = format!(
            "{}/v2/bot/message/{}/content",
            self.data_api_base_url, message_id
        );
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.bytes().await?)
    }

    async fn profile_name(&self, user_id: &str) -> Result<String, PlatformError> {
        let url = format!("{}/v2/bot/profile/{}", self.api_base_url, user_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let profile: Profile = check_status(response).await?.json().await?;
        Ok(profile.display_name)
    }
}
