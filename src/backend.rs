//! HTTP Backend Client
//!
//! JSON-over-HTTP adapter for the completion and token accounting services:
//!
//! - `POST {completions_url}/completions` runs a completion
//! - `GET {tokenize_url}/tokens?userId=&model=` reads a balance
//! - `DELETE {tokenize_url}/dialog?userId=&model=` clears the managed dialog
//!
//! Managed models keep their dialog in the accounting service. For legacy
//! models the client keeps a bounded rolling history per user and sends it
//! with every request.

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{BotError, Result};
use crate::models::ModelId;
use crate::services::{
    CompletionGateway, CompletionReply, CompletionRequest, DialogClear, HistoryEntry,
    TokenAccounting, TokenBalance,
};
use crate::types::UserId;

/// Entries kept per user for legacy models (user + assistant turns)
pub const LEGACY_HISTORY_LIMIT: usize = 20;

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub completions_url: String,
    pub tokenize_url: String,
    /// Sent as a bearer token to both services
    pub api_key: Option<String>,
    pub request_timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            completions_url: "http://localhost:8080".to_string(),
            tokenize_url: "http://localhost:8081".to_string(),
            api_key: None,
            request_timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletionBody<'a> {
    user_id: i64,
    content: &'a str,
    system_message: &'a str,
    model: &'a str,
    bot_model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    history: Option<&'a [HistoryEntry]>,
}

#[derive(Debug, Deserialize)]
struct ClearDialogResponse {
    #[serde(default)]
    status: Option<u16>,
}

pub struct HttpBackend {
    config: BackendConfig,
    client: reqwest::Client,
    legacy_history: DashMap<UserId, Vec<HistoryEntry>>,
}

impl HttpBackend {
    pub fn new(config: BackendConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            config,
            client,
            legacy_history: DashMap::new(),
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    fn url(base: &str, path: &str) -> String {
        format!("{}/{}", base.trim_end_matches('/'), path)
    }

    fn record_exchange(&self, user_id: UserId, question: &str, answer: &str) {
        let mut history = self.legacy_history.entry(user_id).or_default();
        history.push(HistoryEntry {
            role: "user".to_string(),
            content: question.to_string(),
        });
        history.push(HistoryEntry {
            role: "assistant".to_string(),
            content: answer.to_string(),
        });
        let overflow = history.len().saturating_sub(LEGACY_HISTORY_LIMIT);
        if overflow > 0 {
            history.drain(..overflow);
        }
    }
}

#[async_trait]
impl CompletionGateway for HttpBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionReply> {
        // Legacy requests only come from sessions persisted before gpt-4 left the keyboard
        let legacy = !request.bot_model.is_managed();
        let history = if legacy {
            Some(self.history(request.user_id).await?)
        } else {
            None
        };

        let body = CompletionBody {
            user_id: request.user_id.0,
            content: &request.text,
            system_message: &request.persona_text,
            model: &request.model_variant,
            bot_model: request.bot_model.payload(),
            history: history.as_deref(),
        };

        let response = self
            .authorize(self.client.post(Self::url(&self.config.completions_url, "completions")))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;
        let reply = match serde_json::from_slice::<CompletionReply>(&bytes) {
            Ok(reply) => reply,
            Err(e) if status.is_success() => return Err(e.into()),
            Err(_) => {
                warn!("Completion backend returned {} for user {}", status, request.user_id);
                CompletionReply::failed(format!("Error 😔: completion service returned {}", status))
            }
        };

        if legacy && reply.success {
            self.record_exchange(request.user_id, &request.text, &reply.response);
        }
        Ok(reply)
    }

    async fn history(&self, user_id: UserId) -> Result<Vec<HistoryEntry>> {
        Ok(self
            .legacy_history
            .get(&user_id)
            .map(|h| h.value().clone())
            .unwrap_or_default())
    }

    async fn clear_history(&self, user_id: UserId) -> Result<()> {
        self.legacy_history.remove(&user_id);
        debug!("Cleared legacy history for user {}", user_id);
        Ok(())
    }
}

#[async_trait]
impl TokenAccounting for HttpBackend {
    async fn tokens(&self, user_id: UserId, model: ModelId) -> Result<TokenBalance> {
        let response = self
            .authorize(self.client.get(Self::url(&self.config.tokenize_url, "tokens")))
            .query(&[("userId", user_id.0.to_string()), ("model", model.payload().to_string())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BotError::Gateway(format!(
                "token balance request failed: {}",
                response.status()
            )));
        }

        Ok(response.json::<TokenBalance>().await?)
    }

    async fn clear_dialog(&self, user_id: UserId, model: ModelId) -> Result<DialogClear> {
        let response = self
            .authorize(self.client.delete(Self::url(&self.config.tokenize_url, "dialog")))
            .query(&[("userId", user_id.0.to_string()), ("model", model.payload().to_string())])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(DialogClear::NotFound);
        }
        if !status.is_success() {
            warn!("Dialog clear for user {} returned {}", user_id, status);
            return Ok(DialogClear::Failed);
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(DialogClear::Failed);
        }
        Ok(classify_clear(serde_json::from_slice::<Option<ClearDialogResponse>>(&bytes)?))
    }
}

/// Map the accounting service's `{status}` body (or `null`) to a result
fn classify_clear(body: Option<ClearDialogResponse>) -> DialogClear {
    match body {
        None => DialogClear::Failed,
        Some(ClearDialogResponse { status: Some(404) }) => DialogClear::NotFound,
        Some(_) => DialogClear::Cleared,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> HttpBackend {
        HttpBackend::new(BackendConfig::default()).unwrap()
    }

    #[test]
    fn test_url_join() {
        assert_eq!(HttpBackend::url("http://h:1/", "tokens"), "http://h:1/tokens");
        assert_eq!(HttpBackend::url("http://h:1", "dialog"), "http://h:1/dialog");
    }

    #[test]
    fn test_completion_body_wire_names() {
        let body = CompletionBody {
            user_id: 7,
            content: "hello",
            system_message: "be nice",
            model: "gpt-4o",
            bot_model: "gpt-4o",
            history: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["userId"], 7);
        assert_eq!(json["systemMessage"], "be nice");
        assert_eq!(json["botModel"], "gpt-4o");
        assert!(json.get("history").is_none());
    }

    #[test]
    fn test_classify_clear_body() {
        assert_eq!(classify_clear(None), DialogClear::Failed);
        assert_eq!(
            classify_clear(Some(ClearDialogResponse { status: Some(404) })),
            DialogClear::NotFound
        );
        assert_eq!(
            classify_clear(Some(ClearDialogResponse { status: Some(200) })),
            DialogClear::Cleared
        );
        assert_eq!(classify_clear(Some(ClearDialogResponse { status: None })), DialogClear::Cleared);
    }

    #[tokio::test]
    async fn test_legacy_history_is_bounded() {
        let backend = backend();
        let user = UserId(1);

        for i in 0..15 {
            backend.record_exchange(user, &format!("q{}", i), &format!("a{}", i));
        }

        let history = backend.history(user).await.unwrap();
        assert_eq!(history.len(), LEGACY_HISTORY_LIMIT);
        assert_eq!(history.last().unwrap().content, "a14");
        assert_eq!(history[0].content, "q5");

        backend.clear_history(user).await.unwrap();
        assert!(backend.history(user).await.unwrap().is_empty());
    }
}
