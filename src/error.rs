//! Error Types
//!
//! Library-wide error enum. Busy and ineligible outcomes are not errors;
//! they are reported as [`crate::orchestrator::FlowExit`] variants.

/// Errors raised by collaborators and adapters
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("File is not valid UTF-8 text: {0}")]
    Decode(#[from] std::string::FromUtf8Error),
}

impl From<teloxide::RequestError> for BotError {
    fn from(e: teloxide::RequestError) -> Self {
        BotError::Transport(e.to_string())
    }
}

impl From<teloxide::DownloadError> for BotError {
    fn from(e: teloxide::DownloadError) -> Self {
        BotError::Transport(format!("download failed: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
