//! Single-Flight Request Guard
//!
//! At most one completion may be running per user. The guard is a thin layer
//! over the session store's in-flight flag:
//!
//! - `try_acquire` flips the flag `false → true` with a compare-and-set
//! - `release` unconditionally clears it
//! - `acquire` returns a [`FlightPermit`] that clears it on drop, so every exit
//!   path of a guarded flow (early return, `?`, timeout, panic unwind) releases
//!
//! A busy guard is a normal outcome, not an error.

use std::sync::Arc;
use tracing::{debug, error};

use crate::session::SessionStore;
use crate::types::UserId;

#[derive(Clone)]
pub struct SingleFlightGuard {
    store: Arc<dyn SessionStore>,
}

impl SingleFlightGuard {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Mark the user in-flight. Returns false if a request is already running.
    /// A store failure is treated as busy.
    pub fn try_acquire(&self, user_id: UserId) -> bool {
        match self.store.compare_and_set_in_flight(user_id, false, true) {
            Ok(acquired) => acquired,
            Err(e) => {
                error!("In-flight check failed for user {}: {}", user_id, e);
                false
            }
        }
    }

    /// Clear the in-flight flag
    pub fn release(&self, user_id: UserId) {
        if let Err(e) = self.store.set_in_flight(user_id, false) {
            error!("Failed to release in-flight flag for user {}: {}", user_id, e);
        }
    }

    /// Acquire a scoped permit, or `None` if the user is busy
    pub fn acquire(&self, user_id: UserId) -> Option<FlightPermit> {
        if !self.try_acquire(user_id) {
            return None;
        }
        debug!("In-flight acquired for user {}", user_id);
        Some(FlightPermit {
            guard: self.clone(),
            user_id,
            released: false,
        })
    }

    pub fn is_in_flight(&self, user_id: UserId) -> bool {
        self.store.in_flight(user_id).unwrap_or(false)
    }
}

/// Held while a completion runs; releases the user's flag exactly once
pub struct FlightPermit {
    guard: SingleFlightGuard,
    user_id: UserId,
    released: bool,
}

impl FlightPermit {
    /// Release before the end of scope (e.g. before rendering the answer)
    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if !self.released {
            self.released = true;
            self.guard.release(self.user_id);
            debug!("In-flight released for user {}", self.user_id);
        }
    }
}

impl Drop for FlightPermit {
    fn drop(&mut self) {
        self.release_once();
    }
}
