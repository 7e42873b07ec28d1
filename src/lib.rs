//! GPT Bot Router
//!
//! Telegram message layer for an LLM chat bot. Inbound messages and button
//! presses are routed to handlers; free text and text files become
//! completion requests guarded so that each user has at most one in flight.
//!
//! # Architecture
//!
//! ```text
//! Telegram ──► telegram ──► dispatch ──► handlers ──► orchestrator ──► CompletionGateway
//!  (teloxide)   (adapters)   (routes)      │              │
//!                                          │              └── guard (single-flight)
//!                                          ├── TokenAccounting (balance, dialog clear)
//!                                          └── SessionStore (model, persona, consent)
//! ```

pub mod backend;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod guard;
pub mod handlers;
pub mod models;
pub mod orchestrator;
pub mod personas;
pub mod render;
pub mod services;
pub mod session;
pub mod telegram;
pub mod transport;
pub mod types;

pub use backend::{BackendConfig, HttpBackend};
pub use config::Config;
pub use dispatch::{route_callback, route_message, CallbackRoute, Route};
pub use error::{BotError, Result};
pub use guard::{FlightPermit, SingleFlightGuard};
pub use handlers::{BotRouter, BotServices, HandlerOutcome};
pub use models::ModelId;
pub use orchestrator::{CompletionFlow, FlowExit, FlowSettings, FlowState};
pub use personas::PersonaId;
pub use services::{
    CompletionGateway, CompletionOutcome, CompletionReply, CompletionRequest, DialogClear,
    Eligibility, HistoryEntry, TokenAccounting, TokenBalance, Usage,
};
pub use session::{InMemorySessionStore, SessionStore, SqliteSessionStore, UserSession};
pub use transport::ChatTransport;
