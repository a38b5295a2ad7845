//! LINE Messaging API adapter.
//!
//! Inbound webhook payloads are decoded into [`InboundEvent`]s, outbound
//! replies are built as [`OutboundMessage`]s and delivered through the
//! [`ChatPlatform`] trait.

mod client;
mod events;
mod messages;
mod render;

pub use client::{ChatPlatform, LineClient, MAX_MESSAGES_PER_REQUEST, verify_signature};
pub use events::{EventKind, InboundEvent, parse_webhook};
pub use messages::{OutboundMessage, QuickReplyItem};
pub use render::{PortfolioLabels, portfolio_carousels};
