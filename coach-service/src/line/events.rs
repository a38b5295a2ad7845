//! Webhook payload decoding.

use serde::Deserialize;

use crate::error::PlatformError;

/// An event from one user, ready for dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub user_id: String,
    pub reply_token: Option<String>,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Text { text: String },
    Video { message_id: String },
    /// Image, sticker, audio and other message types
    OtherMessage,
    Postback { data: String },
    Follow,
    Unsupported { event_type: String },
}

#[derive(Debug, Deserialize)]
struct WebhookBody {
    #[serde(default)]
    events: Vec<RawEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvent {
    #[serde(rename = "type")]
    event_type: String,
    reply_token: Option<String>,
    source: Option<RawSource>,
    message: Option<RawMessage>,
    postback: Option<RawPostback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSource {
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(rename = "type")]
    message_type: String,
    id: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPostback {
    data: String,
}

impl RawEvent {
    fn into_event(self) -> Option<InboundEvent> {
        let user_id = self.source.and_then(|s| s.user_id)?;

        let kind = match (self.event_type.as_str(), self.message, self.postback) {
            ("message", Some(message), _) => match (message.message_type.as_str(), message.text) {
                ("text", Some(text)) => EventKind::Text { text },
                ("video", _) => EventKind::Video {
                    message_id: message.id,
                },
                _ => EventKind::OtherMessage,
            },
            ("postback", _, Some(postback)) => EventKind::Postback {
                data: postback.data,
            },
            ("follow", _, _) => EventKind::Follow,
            (other, _, _) => EventKind::Unsupported {
                event_type: other.to_string(),
            },
        };

        Some(InboundEvent {
            user_id,
            reply_token: self.reply_token,
            kind,
        })
    }
}

/// Decode a webhook body; events without a user id are dropped
pub fn parse_webhook(body: &[u8]) -> Result<Vec<InboundEvent>, PlatformError> {
    let body: WebhookBody = serde_json::from_slice(body).map_err(PlatformError::MalformedBody)?;
    Ok(body
        .events
        .into_iter()
        .filter_map(RawEvent::into_event)
        .collect())
}
