//! Management Handlers
//!
//! `BotRouter` owns the collaborators and runs the handler chosen by
//! [`crate::dispatch`]. Free text and decoded documents go through the
//! [`CompletionFlow`]; everything else is handled here directly.
//!
//! Handler errors are logged and swallowed at the `handle_*` boundary.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::dispatch::{self, CallbackRoute, Route};
use crate::error::{BotError, Result};
use crate::models::ModelId;
use crate::orchestrator::{CompletionFlow, FlowExit, FlowSettings};
use crate::personas::PersonaId;
use crate::render;
use crate::services::{CompletionGateway, DialogClear, Eligibility, TokenAccounting};
use crate::session::SessionStore;
use crate::transport::ChatTransport;
use crate::types::{InboundCallback, InboundMessage, Keyboard, SentMessage};

/// What a handler did, mostly for logs and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    Completion(FlowExit),
    Handled,
    /// Ineligible user on a gated handler
    Skipped,
    Ignored,
}

/// All collaborators the router needs
#[derive(Clone)]
pub struct BotServices {
    pub store: Arc<dyn SessionStore>,
    pub gateway: Arc<dyn CompletionGateway>,
    pub accounting: Arc<dyn TokenAccounting>,
    pub eligibility: Arc<dyn Eligibility>,
    pub transport: Arc<dyn ChatTransport>,
}

#[derive(Clone)]
pub struct BotRouter {
    services: BotServices,
    flow: CompletionFlow,
    settings: FlowSettings,
}

impl BotRouter {
    pub fn new(services: BotServices, settings: FlowSettings) -> Self {
        let flow = CompletionFlow::new(
            Arc::clone(&services.store),
            Arc::clone(&services.gateway),
            Arc::clone(&services.accounting),
            Arc::clone(&services.eligibility),
            Arc::clone(&services.transport),
            settings,
        );
        Self { services, flow, settings }
    }

    /// Route and handle one inbound message
    pub async fn handle_message(&self, message: &InboundMessage) -> HandlerOutcome {
        let route = dispatch::route_message(message);
        debug!("Message route: user={}, route={:?}", message.user_id, route);

        let result = match route {
            Route::UnsupportedMedia => self.handle_unsupported_media(message).await,
            Route::Document { file_id } => self.handle_document(message, &file_id).await,
            Route::Balance => self.handle_balance(message).await,
            Route::ClearContext => self.handle_clear_context(message).await,
            Route::ChangePersona => self.handle_change_persona(message).await,
            Route::ChangeModel => self.handle_change_model(message).await,
            Route::Completion(text) => Ok(HandlerOutcome::Completion(self.flow.run(message, &text).await)),
            Route::Ignore => Ok(HandlerOutcome::Ignored),
        };

        result.unwrap_or_else(|e| {
            error!("Error handling message from user {}: {}", message.user_id, e);
            HandlerOutcome::Handled
        })
    }

    /// Route and handle one button press
    pub async fn handle_callback(&self, callback: &InboundCallback) -> HandlerOutcome {
        let route = dispatch::route_callback(callback.data.as_deref());
        info!(
            "Callback query: user={}, data={}",
            callback.user_id,
            callback.data.as_deref().unwrap_or("<none>")
        );

        let result = match route {
            CallbackRoute::SelectPersona(persona) => self.select_persona(callback, persona).await,
            CallbackRoute::SelectModel(model) => self.select_model(callback, model).await,
            CallbackRoute::AcceptAgreement => self.accept_agreement(callback).await,
            CallbackRoute::Unknown => self
                .services
                .transport
                .answer_callback(&callback.id, None)
                .await
                .map(|_| HandlerOutcome::Ignored),
        };

        result.unwrap_or_else(|e| {
            error!("Error handling callback from user {}: {}", callback.user_id, e);
            HandlerOutcome::Handled
        })
    }

    async fn handle_unsupported_media(&self, message: &InboundMessage) -> Result<HandlerOutcome> {
        self.services
            .transport
            .send_text(message.chat_id, render::PHOTO_UNSUPPORTED_TEXT)
            .await?;
        Ok(HandlerOutcome::Handled)
    }

    /// Download, decode as UTF-8 and run the completion flow. Only a decode
    /// failure is shown to the user.
    async fn handle_document(&self, message: &InboundMessage, file_id: &str) -> Result<HandlerOutcome> {
        let text = match self.read_document(file_id).await {
            Ok(text) => text,
            Err(BotError::Decode(e)) => {
                info!("Document from user {} is not text: {}", message.user_id, e);
                self.services
                    .transport
                    .send_text(message.chat_id, render::FILE_UNSUPPORTED_TEXT)
                    .await?;
                return Ok(HandlerOutcome::Handled);
            }
            Err(e) => {
                warn!("Failed to read document from user {}: {}", message.user_id, e);
                return Ok(HandlerOutcome::Handled);
            }
        };

        Ok(HandlerOutcome::Completion(self.flow.run(message, &text).await))
    }

    async fn read_document(&self, file_id: &str) -> Result<String> {
        let bytes = self.services.transport.download_file(file_id).await?;
        debug!("Downloaded document {} ({} bytes)", file_id, bytes.len());
        Ok(String::from_utf8(bytes)?)
    }

    async fn handle_balance(&self, message: &InboundMessage) -> Result<HandlerOutcome> {
        let mut balances = Vec::with_capacity(ModelId::ACCOUNTED.len());
        for model in ModelId::ACCOUNTED {
            let balance = self.services.accounting.tokens(message.user_id, model).await?;
            balances.push((model, balance));
        }

        self.services
            .transport
            .send_text(message.chat_id, &render::balance_text(&balances))
            .await?;
        Ok(HandlerOutcome::Handled)
    }

    async fn handle_clear_context(&self, message: &InboundMessage) -> Result<HandlerOutcome> {
        let user_id = message.user_id;
        let model = self.services.store.model(user_id)?;

        let text = if model.is_managed() {
            match self.services.accounting.clear_dialog(user_id, model).await? {
                DialogClear::NotFound => render::DIALOG_ALREADY_EMPTY_TEXT,
                DialogClear::Failed => render::DIALOG_CLEAR_FAILED_TEXT,
                DialogClear::Cleared => render::DIALOG_CLEARED_TEXT,
            }
        } else if self.services.gateway.history(user_id).await?.is_empty() {
            render::DIALOG_ALREADY_EMPTY_TEXT
        } else {
            self.services.gateway.clear_history(user_id).await?;
            render::DIALOG_CLEARED_TEXT
        };

        info!("Clear context: user={}, model={}", user_id, model.payload());
        self.services.transport.send_text(message.chat_id, text).await?;
        Ok(HandlerOutcome::Handled)
    }

    async fn is_eligible(&self, message: &InboundMessage) -> Result<bool> {
        Ok(self.services.eligibility.check_agreement(message).await?
            && self.services.eligibility.check_membership(message).await?)
    }

    async fn handle_change_persona(&self, message: &InboundMessage) -> Result<HandlerOutcome> {
        if !self.is_eligible(message).await? {
            return Ok(HandlerOutcome::Skipped);
        }

        let current = self.services.store.persona(message.user_id)?;
        self.services
            .transport
            .send_keyboard(message.chat_id, render::CHOOSE_PERSONA_TEXT, &render::persona_keyboard(current))
            .await?;
        self.delete_after_settle(self.trigger(message)).await;
        Ok(HandlerOutcome::Handled)
    }

    async fn handle_change_model(&self, message: &InboundMessage) -> Result<HandlerOutcome> {
        if !self.is_eligible(message).await? {
            return Ok(HandlerOutcome::Skipped);
        }

        let current = self.services.store.model(message.user_id)?;
        self.services
            .transport
            .send_keyboard(message.chat_id, render::CHOOSE_MODEL_TEXT, &render::model_keyboard(current))
            .await?;
        self.delete_after_settle(self.trigger(message)).await;
        Ok(HandlerOutcome::Handled)
    }

    async fn select_persona(&self, callback: &InboundCallback, persona: PersonaId) -> Result<HandlerOutcome> {
        let user_id = callback.user_id;
        let current = self.services.store.persona(user_id)?;
        let model = self.services.store.model(user_id)?;

        if persona == current {
            self.services
                .transport
                .answer_callback(&callback.id, Some(render::PERSONA_ALREADY_SELECTED_TEXT))
                .await?;
            return Ok(HandlerOutcome::Handled);
        }

        self.services.store.set_persona(user_id, persona)?;
        info!("Persona changed: user={}, persona={}", user_id, persona.payload());

        self.refresh_keyboard(callback.message, &render::persona_keyboard(persona))
            .await;

        // Old dialog was built under the previous system message
        match self.services.accounting.clear_dialog(user_id, model).await {
            Ok(status) => debug!("Dialog clear after persona switch: user={}, status={:?}", user_id, status),
            Err(e) => warn!("Dialog clear after persona switch failed for user {}: {}", user_id, e),
        }

        tokio::time::sleep(self.settings.settle_delay).await;
        self.services
            .transport
            .answer_callback(&callback.id, Some(render::PERSONA_CHANGED_TEXT))
            .await?;
        self.delete_keyboard(callback.message).await;
        Ok(HandlerOutcome::Handled)
    }

    async fn select_model(&self, callback: &InboundCallback, model: ModelId) -> Result<HandlerOutcome> {
        let user_id = callback.user_id;
        let current = self.services.store.model(user_id)?;

        if model == current {
            self.services
                .transport
                .answer_callback(&callback.id, Some(render::model_already_selected_text(current).as_str()))
                .await?;
            return Ok(HandlerOutcome::Handled);
        }

        self.services.store.set_model(user_id, model)?;
        info!("Model changed: user={}, model={}", user_id, model.payload());

        self.refresh_keyboard(callback.message, &render::model_keyboard(model))
            .await;

        tokio::time::sleep(self.settings.settle_delay).await;
        self.services
            .transport
            .answer_callback(&callback.id, Some(render::model_changed_text(model).as_str()))
            .await?;
        self.delete_keyboard(callback.message).await;
        Ok(HandlerOutcome::Handled)
    }

    async fn accept_agreement(&self, callback: &InboundCallback) -> Result<HandlerOutcome> {
        self.services.store.set_agreed(callback.user_id, true)?;
        info!("Agreement accepted: user={}", callback.user_id);

        self.services
            .transport
            .answer_callback(&callback.id, Some(render::AGREEMENT_ACCEPTED_TEXT))
            .await?;
        self.delete_keyboard(callback.message).await;
        Ok(HandlerOutcome::Handled)
    }

    fn trigger(&self, message: &InboundMessage) -> SentMessage {
        SentMessage {
            chat_id: message.chat_id,
            message_id: message.message_id,
        }
    }

    async fn delete_after_settle(&self, message: SentMessage) {
        tokio::time::sleep(self.settings.settle_delay).await;
        if let Err(e) = self.services.transport.delete_message(message).await {
            warn!("Failed to delete message in chat {}: {}", message.chat_id, e);
        }
    }

    /// A stale or deleted keyboard must not abort a saved selection
    async fn refresh_keyboard(&self, message: Option<SentMessage>, keyboard: &Keyboard) {
        let Some(message) = message else {
            return;
        };
        if let Err(e) = self.services.transport.edit_keyboard(message, keyboard).await {
            warn!("Failed to edit keyboard in chat {}: {}", message.chat_id, e);
        }
    }

    async fn delete_keyboard(&self, message: Option<SentMessage>) {
        let Some(message) = message else {
            return;
        };
        if let Err(e) = self.services.transport.delete_message(message).await {
            warn!("Failed to delete keyboard in chat {}: {}", message.chat_id, e);
        }
    }
}
