//! Conversation State Store
//!
//! Per-user session state: in-flight flag, selected model, selected persona
//! and consent flag. Sessions are created with defaults on first access and
//! live for the lifetime of the process (or of the database, for the SQLite
//! store).
//!
//! The in-flight flag is never persisted: a restart always starts idle.

mod memory;
mod sqlite;

pub use memory::InMemorySessionStore;
pub use sqlite::SqliteSessionStore;

use crate::error::Result;
use crate::models::ModelId;
use crate::personas::PersonaId;
use crate::types::UserId;

/// Snapshot of one user's session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UserSession {
    pub in_flight: bool,
    pub model: ModelId,
    pub persona: PersonaId,
    pub agreed: bool,
}

/// Keyed session store shared by all handlers
pub trait SessionStore: Send + Sync {
    fn in_flight(&self, user_id: UserId) -> Result<bool>;

    fn set_in_flight(&self, user_id: UserId, in_flight: bool) -> Result<()>;

    /// Set the in-flight flag to `new` only if it currently equals `current`.
    /// Returns whether the swap happened.
    ///
    /// The default is a plain read-then-write and is only safe when handlers
    /// cannot interleave between the two calls. Stores shared across threads
    /// must override it with a real compare-and-swap.
    fn compare_and_set_in_flight(&self, user_id: UserId, current: bool, new: bool) -> Result<bool> {
        if self.in_flight(user_id)? != current {
            return Ok(false);
        }
        self.set_in_flight(user_id, new)?;
        Ok(true)
    }

    fn model(&self, user_id: UserId) -> Result<ModelId>;

    fn set_model(&self, user_id: UserId, model: ModelId) -> Result<()>;

    fn persona(&self, user_id: UserId) -> Result<PersonaId>;

    fn set_persona(&self, user_id: UserId, persona: PersonaId) -> Result<()>;

    fn has_agreed(&self, user_id: UserId) -> Result<bool>;

    fn set_agreed(&self, user_id: UserId, agreed: bool) -> Result<()>;

    /// Full snapshot, mostly for diagnostics and tests
    fn snapshot(&self, user_id: UserId) -> Result<UserSession> {
        Ok(UserSession {
            in_flight: self.in_flight(user_id)?,
            model: self.model(user_id)?,
            persona: self.persona(user_id)?,
            agreed: self.has_agreed(user_id)?,
        })
    }
}
