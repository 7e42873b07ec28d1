//! In-memory session store backed by `DashMap`.

use dashmap::DashMap;

use super::{SessionStore, UserSession};
use crate::error::Result;
use crate::models::ModelId;
use crate::personas::PersonaId;
use crate::types::UserId;

/// Process-wide session map; each key is guarded by its shard lock, so the
/// in-flight compare-and-set is atomic across threads.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<UserId, UserSession>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of users seen so far
    pub fn user_count(&self) -> usize {
        self.sessions.len()
    }

    fn read<T>(&self, user_id: UserId, f: impl FnOnce(&UserSession) -> T) -> T {
        match self.sessions.get(&user_id) {
            Some(session) => f(session.value()),
            None => f(&UserSession::default()),
        }
    }

    fn update(&self, user_id: UserId, f: impl FnOnce(&mut UserSession)) {
        let mut entry = self.sessions.entry(user_id).or_default();
        f(entry.value_mut());
    }
}

impl SessionStore for InMemorySessionStore {
    fn in_flight(&self, user_id: UserId) -> Result<bool> {
        Ok(self.read(user_id, |s| s.in_flight))
    }

    fn set_in_flight(&self, user_id: UserId, in_flight: bool) -> Result<()> {
        self.update(user_id, |s| s.in_flight = in_flight);
        Ok(())
    }

    fn compare_and_set_in_flight(&self, user_id: UserId, current: bool, new: bool) -> Result<bool> {
        // The entry guard holds the shard write lock for the whole check-and-set
        let mut entry = self.sessions.entry(user_id).or_default();
        let session = entry.value_mut();
        if session.in_flight != current {
            return Ok(false);
        }
        session.in_flight = new;
        Ok(true)
    }

    fn model(&self, user_id: UserId) -> Result<ModelId> {
        Ok(self.read(user_id, |s| s.model))
    }

    fn set_model(&self, user_id: UserId, model: ModelId) -> Result<()> {
        self.update(user_id, |s| s.model = model);
        Ok(())
    }

    fn persona(&self, user_id: UserId) -> Result<PersonaId> {
        Ok(self.read(user_id, |s| s.persona))
    }

    fn set_persona(&self, user_id: UserId, persona: PersonaId) -> Result<()> {
        self.update(user_id, |s| s.persona = persona);
        Ok(())
    }

    fn has_agreed(&self, user_id: UserId) -> Result<bool> {
        Ok(self.read(user_id, |s| s.agreed))
    }

    fn set_agreed(&self, user_id: UserId, agreed: bool) -> Result<()> {
        self.update(user_id, |s| s.agreed = agreed);
        Ok(())
    }
}
