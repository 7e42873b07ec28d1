//! Telegram integration
//!
//! Adapters from teloxide to the crate's traits:
//!
//! - [`TelegramTransport`]: [`ChatTransport`] over the Bot API
//! - [`TelegramEligibility`]: consent prompt and channel membership check
//! - [`run_telegram_bot`]: long-polling dispatcher feeding [`BotRouter`]
//!
//! Updates are handled on spawned tasks so a long completion never blocks the
//! next update from the same chat; the single-flight guard decides what runs.

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use std::sync::Arc;
use teloxide::{
    dispatching::{Dispatcher, UpdateFilterExt},
    dptree,
    error_handlers::LoggingErrorHandler,
    net::Download,
    prelude::*,
    types::{ChatAction, InlineKeyboardButton, InlineKeyboardMarkup, Recipient, Update},
};
use tracing::{debug, info, warn};

use crate::backend::HttpBackend;
use crate::config::Config;
use crate::error::Result;
use crate::handlers::{BotRouter, BotServices};
use crate::render;
use crate::services::Eligibility;
use crate::session::{InMemorySessionStore, SessionStore, SqliteSessionStore};
use crate::transport::ChatTransport;
use crate::types::{self, InboundCallback, InboundMessage, Keyboard, MessageContent, SentMessage};

fn tg_chat(chat_id: types::ChatId) -> teloxide::types::ChatId {
    teloxide::types::ChatId(chat_id.0)
}

fn tg_message(message_id: types::MessageId) -> teloxide::types::MessageId {
    teloxide::types::MessageId(message_id.0)
}

fn sent(message: &Message) -> SentMessage {
    SentMessage {
        chat_id: types::ChatId(message.chat.id.0),
        message_id: types::MessageId(message.id.0),
    }
}

fn markup(keyboard: &Keyboard) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(keyboard.rows.iter().map(|row| {
        row.iter()
            .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.payload.clone()))
            .collect::<Vec<_>>()
    }))
}

/// Convert a teloxide message; `None` for messages without a sender
pub fn inbound_message(msg: &Message) -> Option<InboundMessage> {
    let user = msg.from.as_ref()?;

    let content = if msg.photo().is_some() {
        MessageContent::Photo
    } else if let Some(doc) = msg.document() {
        MessageContent::Document {
            file_id: doc.file.id.to_string(),
            file_name: doc.file_name.clone(),
        }
    } else if let Some(text) = msg.text() {
        MessageContent::Text(text.to_string())
    } else {
        MessageContent::Other
    };

    Some(InboundMessage {
        user_id: types::UserId(user.id.0 as i64),
        chat_id: types::ChatId(msg.chat.id.0),
        message_id: types::MessageId(msg.id.0),
        content,
    })
}

pub fn inbound_callback(query: &CallbackQuery) -> InboundCallback {
    InboundCallback {
        id: query.id.to_string(),
        user_id: types::UserId(query.from.id.0 as i64),
        message: query.message.as_ref().map(|m| SentMessage {
            chat_id: types::ChatId(m.chat().id.0),
            message_id: types::MessageId(m.id().0),
        }),
        data: query.data.clone(),
    }
}

/// `@name` or a numeric chat id
pub fn channel_recipient(channel: &str) -> Recipient {
    let channel = channel.trim();
    if let Ok(id) = channel.parse::<i64>() {
        return Recipient::Id(teloxide::types::ChatId(id));
    }
    if channel.starts_with('@') {
        Recipient::ChannelUsername(channel.to_string())
    } else {
        Recipient::ChannelUsername(format!("@{}", channel))
    }
}

/// Bot API transport
#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn send_text(&self, chat_id: types::ChatId, text: &str) -> Result<SentMessage> {
        let message = self.bot.send_message(tg_chat(chat_id), text).await?;
        Ok(sent(&message))
    }

    async fn send_keyboard(&self, chat_id: types::ChatId, text: &str, keyboard: &Keyboard) -> Result<SentMessage> {
        let message = self
            .bot
            .send_message(tg_chat(chat_id), text)
            .reply_markup(markup(keyboard))
            .await?;
        Ok(sent(&message))
    }

    async fn edit_keyboard(&self, message: SentMessage, keyboard: &Keyboard) -> Result<()> {
        self.bot
            .edit_message_reply_markup(tg_chat(message.chat_id), tg_message(message.message_id))
            .reply_markup(markup(keyboard))
            .await?;
        Ok(())
    }

    async fn delete_message(&self, message: SentMessage) -> Result<()> {
        self.bot
            .delete_message(tg_chat(message.chat_id), tg_message(message.message_id))
            .await?;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        let request = self.bot.answer_callback_query(callback_id.to_string());
        match text {
            Some(text) => request.text(text).await?,
            None => request.await?,
        };
        Ok(())
    }

    async fn send_typing(&self, chat_id: types::ChatId) -> Result<()> {
        self.bot.send_chat_action(tg_chat(chat_id), ChatAction::Typing).await?;
        Ok(())
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>> {
        let file = self.bot.get_file(file_id.to_string()).await?;
        let mut buf = Vec::with_capacity(file.size as usize);
        self.bot.download_file(&file.path, &mut buf).await?;
        Ok(buf)
    }
}

/// Consent and membership checks. Both prompt the user when they fail.
pub struct TelegramEligibility {
    bot: Bot,
    store: Arc<dyn SessionStore>,
    transport: Arc<dyn ChatTransport>,
    require_agreement: bool,
    channel: Option<String>,
}

impl TelegramEligibility {
    pub fn new(
        bot: Bot,
        store: Arc<dyn SessionStore>,
        transport: Arc<dyn ChatTransport>,
        require_agreement: bool,
        channel: Option<String>,
    ) -> Self {
        Self {
            bot,
            store,
            transport,
            require_agreement,
            channel,
        }
    }
}

#[async_trait]
impl Eligibility for TelegramEligibility {
    async fn check_agreement(&self, message: &InboundMessage) -> Result<bool> {
        if !self.require_agreement || self.store.has_agreed(message.user_id)? {
            return Ok(true);
        }

        debug!("Asking user {} to accept the agreement", message.user_id);
        self.transport
            .send_keyboard(message.chat_id, render::AGREEMENT_TEXT, &render::agreement_keyboard())
            .await?;
        Ok(false)
    }

    async fn check_membership(&self, message: &InboundMessage) -> Result<bool> {
        let Some(channel) = &self.channel else {
            return Ok(true);
        };

        let user = teloxide::types::UserId(message.user_id.0 as u64);
        let member = self.bot.get_chat_member(channel_recipient(channel), user).await?;
        if member.kind.is_present() {
            return Ok(true);
        }

        debug!("User {} is not a member of {}", message.user_id, channel);
        self.transport
            .send_text(message.chat_id, &render::subscribe_text(channel))
            .await?;
        Ok(false)
    }
}

/// Run Telegram bot with explicit Dispatcher for reliable polling
pub async fn run_telegram_bot(config: Config) -> AnyResult<()> {
    let bot = Bot::new(&config.telegram_token);

    let store: Arc<dyn SessionStore> = match &config.session_db_path {
        Some(path) => Arc::new(SqliteSessionStore::open(path)?),
        None => {
            info!("SESSION_DB_PATH not set, sessions are kept in memory");
            Arc::new(InMemorySessionStore::new())
        }
    };

    let backend = Arc::new(HttpBackend::new(config.backend.clone())?);
    let transport: Arc<dyn ChatTransport> = Arc::new(TelegramTransport::new(bot.clone()));
    let eligibility = Arc::new(TelegramEligibility::new(
        bot.clone(),
        Arc::clone(&store),
        Arc::clone(&transport),
        config.require_agreement,
        config.membership_channel.clone(),
    ));

    let router = Arc::new(BotRouter::new(
        BotServices {
            store,
            gateway: backend.clone(),
            accounting: backend,
            eligibility,
            transport,
        },
        config.flow,
    ));

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(message_handler))
        .branch(Update::filter_callback_query().endpoint(callback_handler));

    info!(
        "Starting dispatcher with long polling (completions={}, tokens={})",
        config.backend.completions_url, config.backend.tokenize_url
    );

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![router])
        .default_handler(|upd| async move {
            debug!("Unhandled update: {:?}", upd);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("Error in update handler"))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    warn!("Dispatcher stopped");
    Ok(())
}

/// Message handler endpoint for the dispatcher
async fn message_handler(msg: Message, router: Arc<BotRouter>) -> ResponseResult<()> {
    let Some(inbound) = inbound_message(&msg) else {
        debug!("Ignoring message without sender in chat {}", msg.chat.id.0);
        return Ok(());
    };

    let preview = msg.text().unwrap_or("<non-text>").chars().take(50).collect::<String>();
    info!(
        ">>> Message received: user={}, chat={}, text={:?}",
        inbound.user_id, inbound.chat_id, preview
    );

    tokio::spawn(async move {
        let outcome = router.handle_message(&inbound).await;
        debug!("Message handled: user={}, outcome={:?}", inbound.user_id, outcome);
    });
    Ok(())
}

/// Callback query handler for inline keyboard buttons
async fn callback_handler(query: CallbackQuery, router: Arc<BotRouter>) -> ResponseResult<()> {
    let inbound = inbound_callback(&query);
    tokio::spawn(async move {
        let outcome = router.handle_callback(&inbound).await;
        debug!("Callback handled: user={}, outcome={:?}", inbound.user_id, outcome);
    });
    Ok(())
}
