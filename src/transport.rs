//! Chat transport primitives used by handlers.
//!
//! `telegram::TelegramTransport` is the production implementation; tests use
//! a recording mock.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ChatId, Keyboard, SentMessage};

#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send plain text. Long texts are split by the caller.
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<SentMessage>;

    async fn send_keyboard(&self, chat_id: ChatId, text: &str, keyboard: &Keyboard) -> Result<SentMessage>;

    /// Replace the inline keyboard of an earlier message
    async fn edit_keyboard(&self, message: SentMessage, keyboard: &Keyboard) -> Result<()>;

    async fn delete_message(&self, message: SentMessage) -> Result<()>;

    /// Stop the client spinner, optionally with a toast
    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> Result<()>;

    async fn send_typing(&self, chat_id: ChatId) -> Result<()>;

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>>;
}
