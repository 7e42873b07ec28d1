//! Core Types
//!
//! Transport-neutral identifiers, inbound events and keyboard descriptions.
//! The Telegram adapter converts teloxide types into these before routing.

use std::fmt;

/// Stable per-user identifier (Telegram user id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub i64);

/// Chat the event arrived in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Message id inside a chat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message the bot itself sent (used for later edit/delete)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentMessage {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// Payload of an inbound chat message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    Text(String),
    Document {
        file_id: String,
        file_name: Option<String>,
    },
    Photo,
    /// Stickers, voice notes, locations and anything else without text
    Other,
}

/// Inbound chat message, already stripped of transport specifics
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub user_id: UserId,
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub content: MessageContent,
}

/// Inline-keyboard button press
#[derive(Debug, Clone)]
pub struct InboundCallback {
    pub id: String,
    pub user_id: UserId,
    /// Message carrying the keyboard; absent when Telegram no longer has it
    pub message: Option<SentMessage>,
    pub data: Option<String>,
}

/// One inline button: label shown to the user, payload sent back on press
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyboardButton {
    pub label: String,
    pub payload: String,
}

impl KeyboardButton {
    pub fn new(label: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            payload: payload.into(),
        }
    }
}

/// Inline keyboard as rows of buttons
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<KeyboardButton>>,
}

impl Keyboard {
    pub fn new(rows: Vec<Vec<KeyboardButton>>) -> Self {
        Self { rows }
    }

    /// All buttons in row order
    pub fn buttons(&self) -> impl Iterator<Item = &KeyboardButton> {
        self.rows.iter().flatten()
    }
}
