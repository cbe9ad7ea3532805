//! Chat transport
//!
//! Inbound events arrive either by long polling (`telegram::run_polling`) or
//! through the webhook router; both convert Telegram updates into
//! `InboundEvent`s and hand them to an `EventSink`.

pub mod telegram;
pub mod webhook;

use crate::db::ChatId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Identifier of a message within its chat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub i64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One event from a chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub chat_id: ChatId,
    pub kind: InboundKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundKind {
    Text {
        text: String,
        message_id: MessageId,
    },
    /// Inline keyboard button press
    Callback {
        id: String,
        data: String,
        /// Message carrying the pressed keyboard
        message_id: MessageId,
    },
    Document {
        file_id: String,
        file_name: Option<String>,
    },
    Dice {
        value: u8,
    },
}

impl InboundKind {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            InboundKind::Text { .. } => "text",
            InboundKind::Callback { .. } => "callback",
            InboundKind::Document { .. } => "document",
            InboundKind::Dice { .. } => "dice",
        }
    }
}

#[cfg(test)]
impl InboundEvent {
    pub fn text(chat_id: ChatId, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            kind: InboundKind::Text {
                text: text.into(),
                message_id: MessageId(0),
            },
        }
    }

    pub fn callback(chat_id: ChatId, data: impl Into<String>, message_id: MessageId) -> Self {
        Self {
            chat_id,
            kind: InboundKind::Callback {
                id: format!("cb-{chat_id}-{message_id}"),
                data: data.into(),
                message_id,
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{method} rejected: {description}")]
    Api {
        method: &'static str,
        description: String,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
