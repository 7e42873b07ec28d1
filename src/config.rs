//! Configuration management

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::backend::BackendConfig;
use crate::orchestrator::FlowSettings;

/// Bot configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram bot token
    pub telegram_token: String,

    /// Completion and token accounting endpoints
    pub backend: BackendConfig,

    /// Settle delay and completion timeout
    pub flow: FlowSettings,

    /// Channel users must join (`@name` or numeric id); unset disables the check
    pub membership_channel: Option<String>,

    /// Show the consent prompt before first use
    pub require_agreement: bool,

    /// SQLite file for persisted selections; unset keeps sessions in memory
    pub session_db_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let telegram_token = var("TELEGRAM_BOT_TOKEN").context("TELEGRAM_BOT_TOKEN must be set")?;

        let completion_timeout_secs = match var("COMPLETION_TIMEOUT_SECS") {
            Some(v) => v
                .parse::<u64>()
                .with_context(|| format!("Invalid COMPLETION_TIMEOUT_SECS: {}", v))?,
            None => 120,
        };
        if completion_timeout_secs == 0 {
            bail!("COMPLETION_TIMEOUT_SECS must be greater than zero");
        }

        let settle_delay_ms = match var("UI_SETTLE_DELAY_MS") {
            Some(v) => v
                .parse::<u64>()
                .with_context(|| format!("Invalid UI_SETTLE_DELAY_MS: {}", v))?,
            None => 500,
        };

        let completion_timeout = Duration::from_secs(completion_timeout_secs);
        let defaults = BackendConfig::default();
        let backend = BackendConfig {
            completions_url: var("COMPLETIONS_URL").unwrap_or(defaults.completions_url),
            tokenize_url: var("TOKENIZE_URL").unwrap_or(defaults.tokenize_url),
            api_key: var("BACKEND_API_KEY"),
            request_timeout: completion_timeout,
        };

        let require_agreement = var("REQUIRE_AGREEMENT")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(true);

        Ok(Self {
            telegram_token,
            backend,
            flow: FlowSettings {
                settle_delay: Duration::from_millis(settle_delay_ms),
                completion_timeout,
            },
            membership_channel: var("MEMBERSHIP_CHANNEL"),
            require_agreement,
            session_db_path: var("SESSION_DB_PATH").map(PathBuf::from),
        })
    }
}
