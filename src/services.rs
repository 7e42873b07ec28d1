//! External Service Interfaces
//!
//! The message layer talks to three collaborators it does not implement:
//!
//! - **Completion gateway**: runs a completion for a user
//! - **Token accounting**: balances and managed dialog context
//! - **Eligibility**: consent and channel-membership checks
//!
//! Failures the collaborators expect (quota, generic backend errors) come back
//! as values; `Err` is reserved for faults.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::ModelId;
use crate::types::{InboundMessage, UserId};

/// Error text the backend returns when the user's token balance is exhausted
pub const QUOTA_EXCEEDED_MESSAGE: &str = "Error 😔: Token usage limit exceeded.";

/// One completion call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub user_id: UserId,
    pub text: String,
    /// Rendered system message of the selected persona
    pub persona_text: String,
    /// Backend model name (see [`ModelId::variant`])
    pub model_variant: String,
    /// Bot-level model, used by the backend for accounting
    pub bot_model: ModelId,
}

/// Token usage reported with a completion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub tokens: i64,
}

/// Raw completion result as the backend reports it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionReply {
    pub success: bool,
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub usage: Option<Usage>,
}

/// Classified completion result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    Answered { text: String },
    QuotaExceeded { message: String },
    Failed { message: String },
}

impl CompletionReply {
    pub fn answered(text: impl Into<String>, tokens: i64) -> Self {
        Self {
            success: true,
            response: text.into(),
            usage: Some(Usage { tokens }),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            response: message.into(),
            usage: None,
        }
    }

    /// Tokens the backend says it spent; only logged, billing uses balances
    pub fn reported_tokens(&self) -> Option<i64> {
        self.usage.map(|u| u.tokens)
    }

    pub fn classify(self) -> CompletionOutcome {
        if self.success {
            return CompletionOutcome::Answered { text: self.response };
        }
        if self.response.trim() == QUOTA_EXCEEDED_MESSAGE {
            return CompletionOutcome::QuotaExceeded { message: self.response };
        }
        CompletionOutcome::Failed { message: self.response }
    }
}

/// Token balance for one user and model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBalance {
    #[serde(default)]
    pub tokens: i64,
}

/// Result of clearing the managed dialog context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogClear {
    Cleared,
    /// Nothing to clear
    NotFound,
    /// Backend returned nothing usable
    Failed,
}

/// Entry of the locally kept history for legacy models
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
}

#[async_trait]
pub trait CompletionGateway: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionReply>;

    /// Local history kept for legacy models
    async fn history(&self, user_id: UserId) -> Result<Vec<HistoryEntry>>;

    async fn clear_history(&self, user_id: UserId) -> Result<()>;
}

#[async_trait]
pub trait TokenAccounting: Send + Sync {
    async fn tokens(&self, user_id: UserId, model: ModelId) -> Result<TokenBalance>;

    async fn clear_dialog(&self, user_id: UserId, model: ModelId) -> Result<DialogClear>;
}

/// Preconditions for using the bot. Implementations may prompt the user
/// (consent button, subscribe link) before returning false.
#[async_trait]
pub trait Eligibility: Send + Sync {
    async fn check_agreement(&self, message: &InboundMessage) -> Result<bool>;

    async fn check_membership(&self, message: &InboundMessage) -> Result<bool>;
}
