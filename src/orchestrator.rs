//! Completion Orchestration Flow
//!
//! Drives one completion request through
//! `Idle → EligibilityCheck → AcquiringGuard → CallingGateway → Rendering → Idle`.
//!
//! The guard is held as a [`FlightPermit`], so the in-flight flag is cleared
//! on every exit: success, quota or generic failure, timeout, and any fault
//! propagated with `?`. Faults never reach the user; they are logged and the
//! flow reports [`FlowExit::Faulted`].
//!
//! A placeholder message is shown for the whole flow and removed after
//! `settle_delay` once the flow exits.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::guard::{FlightPermit, SingleFlightGuard};
use crate::render;
use crate::services::{
    CompletionGateway, CompletionOutcome, CompletionRequest, Eligibility, TokenAccounting,
};
use crate::session::SessionStore;
use crate::transport::ChatTransport;
use crate::types::{ChatId, InboundMessage};

/// Timing knobs of the flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowSettings {
    /// Pause before deleting transient UI messages
    pub settle_delay: Duration,
    /// Upper bound on a single gateway call
    pub completion_timeout: Duration,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(500),
            completion_timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    EligibilityCheck,
    AcquiringGuard,
    CallingGateway,
    Rendering,
}

/// How a flow ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowExit {
    /// Consent or membership missing
    Ineligible,
    /// Another completion is running for this user
    Busy,
    QuotaExceeded,
    Failed,
    Answered { usage_delta: i64 },
    TimedOut,
    Faulted,
}

/// Tokens spent by one call. Balances may move concurrently, so a negative
/// difference counts as zero.
pub fn usage_delta(tokens_before: i64, tokens_after: i64) -> i64 {
    tokens_before.saturating_sub(tokens_after).max(0)
}

/// Shared collaborators of the completion flow
#[derive(Clone)]
pub struct CompletionFlow {
    store: Arc<dyn SessionStore>,
    guard: SingleFlightGuard,
    gateway: Arc<dyn CompletionGateway>,
    accounting: Arc<dyn TokenAccounting>,
    eligibility: Arc<dyn Eligibility>,
    transport: Arc<dyn ChatTransport>,
    settings: FlowSettings,
}

impl CompletionFlow {
    pub fn new(
        store: Arc<dyn SessionStore>,
        gateway: Arc<dyn CompletionGateway>,
        accounting: Arc<dyn TokenAccounting>,
        eligibility: Arc<dyn Eligibility>,
        transport: Arc<dyn ChatTransport>,
        settings: FlowSettings,
    ) -> Self {
        Self {
            guard: SingleFlightGuard::new(Arc::clone(&store)),
            store,
            gateway,
            accounting,
            eligibility,
            transport,
            settings,
        }
    }

    /// Run the flow for `text` on behalf of `message`'s sender
    pub async fn run(&self, message: &InboundMessage, text: &str) -> FlowExit {
        let placeholder = match self.transport.send_text(message.chat_id, render::WAITING_TEXT).await {
            Ok(sent) => Some(sent),
            Err(e) => {
                warn!("Failed to send placeholder to chat {}: {}", message.chat_id, e);
                None
            }
        };

        let exit = match self.execute(message, text).await {
            Ok(exit) => exit,
            Err(e) => {
                warn!("Completion flow faulted for user {}: {}", message.user_id, e);
                FlowExit::Faulted
            }
        };
        self.transition(message, FlowState::Idle);
        info!("Completion flow finished: user={}, exit={:?}", message.user_id, exit);

        if let Some(placeholder) = placeholder {
            tokio::time::sleep(self.settings.settle_delay).await;
            if let Err(e) = self.transport.delete_message(placeholder).await {
                warn!("Failed to delete placeholder in chat {}: {}", message.chat_id, e);
            }
        }

        exit
    }

    fn transition(&self, message: &InboundMessage, state: FlowState) {
        debug!("Flow state: user={}, state={:?}", message.user_id, state);
    }

    async fn execute(&self, message: &InboundMessage, text: &str) -> Result<FlowExit> {
        let user_id = message.user_id;

        self.transition(message, FlowState::EligibilityCheck);
        if !self.eligibility.check_agreement(message).await? {
            debug!("User {} has not accepted the agreement", user_id);
            return Ok(FlowExit::Ineligible);
        }
        if !self.eligibility.check_membership(message).await? {
            debug!("User {} is not a channel member", user_id);
            return Ok(FlowExit::Ineligible);
        }

        self.transition(message, FlowState::AcquiringGuard);
        let Some(permit) = self.guard.acquire(user_id) else {
            info!("Request already in flight for user {}, skipping", user_id);
            return Ok(FlowExit::Busy);
        };

        self.transition(message, FlowState::CallingGateway);
        self.call_gateway(message, text, permit).await
    }

    async fn call_gateway(
        &self,
        message: &InboundMessage,
        text: &str,
        permit: FlightPermit,
    ) -> Result<FlowExit> {
        let user_id = message.user_id;
        let model = self.store.model(user_id)?;
        let persona = self.store.persona(user_id)?;

        if let Err(e) = self.transport.send_typing(message.chat_id).await {
            debug!("Typing indicator failed for chat {}: {}", message.chat_id, e);
        }

        let tokens_before = self.accounting.tokens(user_id, model).await?;

        let request = CompletionRequest {
            user_id,
            text: text.to_string(),
            persona_text: persona.system_message().to_string(),
            model_variant: model.variant().to_string(),
            bot_model: model,
        };
        debug!(
            "Calling gateway: user={}, model={}, persona={}, chars={}",
            user_id,
            model.payload(),
            persona.payload(),
            text.chars().count()
        );

        let reply = match tokio::time::timeout(self.settings.completion_timeout, self.gateway.complete(request)).await {
            Ok(reply) => reply?,
            Err(_) => {
                warn!(
                    "Gateway call for user {} timed out after {:?}",
                    user_id, self.settings.completion_timeout
                );
                return Ok(FlowExit::TimedOut);
            }
        };

        let reported_tokens = reply.reported_tokens();
        match reply.classify() {
            CompletionOutcome::QuotaExceeded { message: text } => {
                permit.release();
                self.transition(message, FlowState::Rendering);
                self.send_long(message.chat_id, &render::quota_text(&text)).await?;
                Ok(FlowExit::QuotaExceeded)
            }
            CompletionOutcome::Failed { message: text } => {
                permit.release();
                self.transition(message, FlowState::Rendering);
                warn!("Gateway reported failure for user {}: {}", user_id, text);
                self.send_long(message.chat_id, &text).await?;
                Ok(FlowExit::Failed)
            }
            CompletionOutcome::Answered { text } => {
                let tokens_after = self.accounting.tokens(user_id, model).await?;
                permit.release();

                let usage_delta = usage_delta(tokens_before.tokens, tokens_after.tokens);
                debug!(
                    "Usage for user {}: delta={}, reported={:?}",
                    user_id, usage_delta, reported_tokens
                );
                self.transition(message, FlowState::Rendering);
                self.send_long(message.chat_id, &render::answer_text(&text, usage_delta)).await?;
                Ok(FlowExit::Answered { usage_delta })
            }
        }
    }

    async fn send_long(&self, chat_id: ChatId, text: &str) -> Result<()> {
        for chunk in render::split_message(text) {
            self.transport.send_text(chat_id, &chunk).await?;
        }
        Ok(())
    }
}
