//! Outbound message types and their LINE JSON encoding.

use serde_json::{Value, json};

/// Quick reply button carrying a postback
#[derive(Debug, Clone, PartialEq)]
pub struct QuickReplyItem {
    pub label: String,
    pub data: String,
    pub display_text: Option<String>,
}

impl QuickReplyItem {
    pub fn postback(label: impl Into<String>, data: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            display_text: Some(label.clone()),
            label,
            data: data.into(),
        }
    }

    fn to_json(&self) -> Value {
        let mut action = json!({
            "type": "postback",
            "label": self.label,
            "data": self.data,
        });
        if let Some(display_text) = &self.display_text {
            action["displayText"] = json!(display_text);
        }
        json!({ "type": "action", "action": action })
    }
}

/// A message sent back to the learner
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    Text {
        text: String,
        quick_reply: Vec<QuickReplyItem>,
    },
    Video {
        original_content_url: String,
        preview_image_url: String,
    },
    Flex {
        alt_text: String,
        contents: Value,
    },
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        OutboundMessage::Text {
            text: text.into(),
            quick_reply: Vec::new(),
        }
    }

    pub fn text_with_quick_reply(text: impl Into<String>, items: Vec<QuickReplyItem>) -> Self {
        OutboundMessage::Text {
            text: text.into(),
            quick_reply: items,
        }
    }

    /// Text body if this is a text message
    pub fn as_text(&self) -> Option<&str> {
        match self {
            OutboundMessage::Text { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            OutboundMessage::Text { text, quick_reply } => {
                let mut message = json!({ "type": "text", "text": text });
                if !quick_reply.is_empty() {
                    let items: Vec<Value> = quick_reply.iter().map(QuickReplyItem::to_json).collect();
                    message["quickReply"] = json!({ "items": items });
                }
                message
            }
            OutboundMessage::Video {
                original_content_url,
                preview_image_url,
            } => json!({
                "type": "video",
                "originalContentUrl": original_content_url,
                "previewImageUrl": preview_image_url,
            }),
            OutboundMessage::Flex { alt_text, contents } => json!({
                "type": "flex",
                "altText": alt_text,
                "contents": contents,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_with_quick_reply() {
        let message = OutboundMessage::text_with_quick_reply(
            "已進入和GPT對話模式",
            vec![QuickReplyItem::postback("結束對話", r#"{"stop":true}"#)],
        );
        let json = message.to_json();

        assert_eq!(json["type"], "text");
        let action = &json["quickReply"]["items"][0]["action"];
        assert_eq!(action["type"], "postback");
        assert_eq!(action["label"], "結束對話");
        assert_eq!(action["data"], r#"{"stop":true}"#);
    }

    #[test]
    fn test_plain_text_has_no_quick_reply() {
        let json = OutboundMessage::text("hi").to_json();
        assert!(json.get("quickReply").is_none());
    }

    #[test]
    fn test_video() {
        let json = OutboundMessage::Video {
            original_content_url: "https://x/a.mp4".to_string(),
            preview_image_url: "https://x/a.jpeg".to_string(),
        }
        .to_json();
        assert_eq!(json["originalContentUrl"], "https://x/a.mp4");
        assert_eq!(json["previewImageUrl"], "https://x/a.jpeg");
    }
}
