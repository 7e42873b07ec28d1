//! Response Formatting
//!
//! User-visible texts, keyboards and message splitting. Everything the user
//! reads is built here so handlers only decide *what* to say.

use crate::models::ModelId;
use crate::personas::PersonaId;
use crate::services::TokenBalance;
use crate::types::{Keyboard, KeyboardButton};

/// Telegram rejects messages over 4096 characters; stay below in bytes
pub const MAX_MESSAGE_LEN: usize = 4000;

pub const WAITING_TEXT: &str = "⌛️ Waiting for the answer...";
pub const TOP_UP_TEXT: &str = "💎 Top up balance - /buy";
pub const EMPTY_RESPONSE_TEXT: &str = "(no response)";

pub const PHOTO_UNSUPPORTED_TEXT: &str =
    "😔 Unfortunately, photos are not supported yet!\n\nFollow the updates in our channel.";
pub const FILE_UNSUPPORTED_TEXT: &str =
    "😔 Unfortunately, this file type is not supported!\n\nFollow the updates in our channel.";

pub const DIALOG_ALREADY_EMPTY_TEXT: &str = "The dialog is already empty!";
pub const DIALOG_CLEARED_TEXT: &str = "Dialog context cleared! 👌🏻";
pub const DIALOG_CLEAR_FAILED_TEXT: &str = "Error 😔: Could not clear the dialog context!";

pub const CHOOSE_PERSONA_TEXT: &str = "Choose the bot mode: ⚙️";
pub const CHOOSE_MODEL_TEXT: &str = "Choose the model: 🤖";
pub const PERSONA_ALREADY_SELECTED_TEXT: &str = "This mode is already selected!";
pub const PERSONA_CHANGED_TEXT: &str = "Mode changed!";

pub const AGREEMENT_TEXT: &str = "Before you start, please read and accept the terms of use. \
     Your messages are sent to a third-party language model provider.";
pub const AGREEMENT_BUTTON_TEXT: &str = "✅ I agree";
pub const AGREEMENT_ACCEPTED_TEXT: &str = "Thank you! You can start chatting now.";
pub const AGREEMENT_PAYLOAD: &str = "agreement:accept";

pub const SUBSCRIBE_TEXT: &str = "To use the bot, please subscribe to our channel first";

/// Mark the current choice on a keyboard
pub fn checked_text(label: &str) -> String {
    format!("✅ {}", label)
}

pub fn answer_text(response: &str, usage_delta: i64) -> String {
    format!("{}\n\n✨ Tokens used: {}", response, usage_delta)
}

pub fn quota_text(message: &str) -> String {
    format!("{}\n{}", message.trim_end(), TOP_UP_TEXT)
}

pub fn balance_text(balances: &[(ModelId, TokenBalance)]) -> String {
    let mut text = String::from("💵 Current balance:\n");
    for (model, balance) in balances {
        text.push_str(&format!("\n🤖  `{}` : {} tokens", model.label(), balance.tokens));
    }
    text
}

pub fn model_already_selected_text(model: ModelId) -> String {
    format!("Model {} is already selected!", model.label())
}

pub fn model_changed_text(model: ModelId) -> String {
    format!("Model changed to {}", checked_text(model.label()))
}

pub fn subscribe_text(channel: &str) -> String {
    format!("{}: {}", SUBSCRIBE_TEXT, channel)
}

fn label_for(label: &str, selected: bool) -> String {
    if selected {
        checked_text(label)
    } else {
        label.to_string()
    }
}

/// Persona keyboard, two buttons per row
pub fn persona_keyboard(current: PersonaId) -> Keyboard {
    let buttons: Vec<KeyboardButton> = PersonaId::ALL
        .iter()
        .map(|p| KeyboardButton::new(label_for(p.label(), *p == current), p.payload()))
        .collect();
    Keyboard::new(buttons.chunks(2).map(|row| row.to_vec()).collect())
}

/// Model keyboard, one row
pub fn model_keyboard(current: ModelId) -> Keyboard {
    let row = ModelId::SELECTABLE
        .iter()
        .map(|m| KeyboardButton::new(label_for(m.label(), *m == current), m.payload()))
        .collect();
    Keyboard::new(vec![row])
}

pub fn agreement_keyboard() -> Keyboard {
    Keyboard::new(vec![vec![KeyboardButton::new(AGREEMENT_BUTTON_TEXT, AGREEMENT_PAYLOAD)]])
}

/// Split text into chunks of at most `MAX_MESSAGE_LEN` bytes on char
/// boundaries. Empty input yields a single placeholder chunk.
pub fn split_message(text: &str) -> Vec<String> {
    if text.is_empty() {
        return vec![EMPTY_RESPONSE_TEXT.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;
    while !remaining.is_empty() {
        let split_at = remaining
            .char_indices()
            .take_while(|(i, c)| i + c.len_utf8() <= MAX_MESSAGE_LEN)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(remaining.len());
        let (chunk, rest) = remaining.split_at(split_at);
        chunks.push(chunk.to_string());
        remaining = rest;
    }
    chunks
}
