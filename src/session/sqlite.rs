//! SQLite-backed session store.
//!
//! Persists model, persona and consent per user. The in-flight flag stays in
//! memory so a crash mid-request never leaves a user stuck after restart.

use dashmap::DashMap;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::{debug, info, warn};

use super::SessionStore;
use crate::error::Result;
use crate::models::ModelId;
use crate::personas::PersonaId;
use crate::types::UserId;

/// Persisted selections for one user
#[derive(Debug, Clone, Copy, Default)]
struct StoredSelection {
    model: ModelId,
    persona: PersonaId,
    agreed: bool,
}

/// Session store with SQLite backend
pub struct SqliteSessionStore {
    conn: Mutex<Connection>,
    in_flight: DashMap<UserId, bool>,
}

impl SqliteSessionStore {
    /// Open or create the session database
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        let store = Self::with_connection(conn)?;
        info!("Session store opened: {}", path.display());
        Ok(store)
    }

    /// In-memory database, used by tests
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS user_sessions (
                user_id INTEGER PRIMARY KEY,
                model TEXT NOT NULL,
                persona TEXT NOT NULL,
                agreed INTEGER NOT NULL DEFAULT 0,
                updated_at INTEGER NOT NULL
            );
            "#,
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            in_flight: DashMap::new(),
        })
    }

    fn load(&self, user_id: UserId) -> Result<StoredSelection> {
        let conn = self.conn.lock();
        Self::load_row(&conn, user_id)
    }

    fn load_row(conn: &Connection, user_id: UserId) -> Result<StoredSelection> {
        let row = conn
            .query_row(
                "SELECT model, persona, agreed FROM user_sessions WHERE user_id = ?1",
                params![user_id.0],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, bool>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((model, persona, agreed)) = row else {
            return Ok(StoredSelection::default());
        };

        // Rows written by older releases may name models or personas that no longer exist
        let model = ModelId::from_payload(&model).unwrap_or_else(|| {
            warn!("Unknown stored model {:?} for user {}, using default", model, user_id);
            ModelId::default()
        });
        let persona = PersonaId::from_payload(&persona).unwrap_or_else(|| {
            warn!("Unknown stored persona {:?} for user {}, using default", persona, user_id);
            PersonaId::default()
        });

        Ok(StoredSelection { model, persona, agreed })
    }

    /// Read-modify-write under a single lock
    fn save(&self, user_id: UserId, f: impl FnOnce(&mut StoredSelection)) -> Result<()> {
        let conn = self.conn.lock();
        let mut selection = Self::load_row(&conn, user_id)?;
        f(&mut selection);

        conn.execute(
            "INSERT INTO user_sessions (user_id, model, persona, agreed, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(user_id) DO UPDATE
             SET model = excluded.model,
                 persona = excluded.persona,
                 agreed = excluded.agreed,
                 updated_at = excluded.updated_at",
            params![
                user_id.0,
                selection.model.payload(),
                selection.persona.payload(),
                selection.agreed,
                chrono::Utc::now().timestamp(),
            ],
        )?;

        debug!("Saved session for user {}", user_id);
        Ok(())
    }

    /// Number of users with persisted selections
    pub fn count(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM user_sessions", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl SessionStore for SqliteSessionStore {
    fn in_flight(&self, user_id: UserId) -> Result<bool> {
        Ok(self.in_flight.get(&user_id).map(|v| *v).unwrap_or(false))
    }

    fn set_in_flight(&self, user_id: UserId, in_flight: bool) -> Result<()> {
        self.in_flight.insert(user_id, in_flight);
        Ok(())
    }

    fn compare_and_set_in_flight(&self, user_id: UserId, current: bool, new: bool) -> Result<bool> {
        let mut entry = self.in_flight.entry(user_id).or_insert(false);
        if *entry != current {
            return Ok(false);
        }
        *entry = new;
        Ok(true)
    }

    fn model(&self, user_id: UserId) -> Result<ModelId> {
        Ok(self.load(user_id)?.model)
    }

    fn set_model(&self, user_id: UserId, model: ModelId) -> Result<()> {
        self.save(user_id, |s| s.model = model)
    }

    fn persona(&self, user_id: UserId) -> Result<PersonaId> {
        Ok(self.load(user_id)?.persona)
    }

    fn set_persona(&self, user_id: UserId, persona: PersonaId) -> Result<()> {
        self.save(user_id, |s| s.persona = persona)
    }

    fn has_agreed(&self, user_id: UserId) -> Result<bool> {
        Ok(self.load(user_id)?.agreed)
    }

    fn set_agreed(&self, user_id: UserId, agreed: bool) -> Result<()> {
        self.save(user_id, |s| s.agreed = agreed)
    }
}
