//! Session Store Integration Tests
//!
//! SQLite persistence of model, persona and consent across reopen.

use gptbot_router::types::UserId;
use gptbot_router::{ModelId, PersonaId, SessionStore, SingleFlightGuard, SqliteSessionStore};
use std::sync::Arc;
use tempfile::TempDir;

fn create_test_store(name: &str) -> (SqliteSessionStore, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join(format!("{}.db", name));
    let store = SqliteSessionStore::open(&db_path).expect("Failed to create store");
    (store, temp_dir)
}

#[test]
fn test_selections_survive_reopen() {
    let (store, temp) = create_test_store("reopen");
    let user = UserId(12345);

    store.set_model(user, ModelId::Gpt4o).unwrap();
    store.set_persona(user, PersonaId::Teacher).unwrap();
    store.set_agreed(user, true).unwrap();
    drop(store);

    let reopened = SqliteSessionStore::open(&temp.path().join("reopen.db")).unwrap();
    let session = reopened.snapshot(user).unwrap();
    assert_eq!(session.model, ModelId::Gpt4o);
    assert_eq!(session.persona, PersonaId::Teacher);
    assert!(session.agreed);
    assert!(!session.in_flight);
}

#[test]
fn test_in_flight_resets_on_restart() {
    let (store, temp) = create_test_store("restart");
    let user = UserId(7);

    store.set_model(user, ModelId::Gpt4o).unwrap();
    assert!(store.compare_and_set_in_flight(user, false, true).unwrap());
    drop(store);

    let reopened = SqliteSessionStore::open(&temp.path().join("restart.db")).unwrap();
    assert!(!reopened.in_flight(user).unwrap());
}

#[test]
fn test_nested_path_is_created() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("data").join("bot").join("sessions.db");

    let store = SqliteSessionStore::open(&db_path).unwrap();
    store.set_persona(UserId(1), PersonaId::Coder).unwrap();

    assert!(db_path.exists());
    assert_eq!(store.count().unwrap(), 1);
}

#[test]
fn test_guard_over_sqlite_store() {
    let (store, _temp) = create_test_store("guard");
    let guard = SingleFlightGuard::new(Arc::new(store));
    let user = UserId(99);

    let permit = guard.acquire(user).expect("first acquire");
    assert!(guard.acquire(user).is_none());
    drop(permit);
    assert!(guard.acquire(user).is_some());
}

#[test]
fn test_concurrent_acquire_has_single_winner() {
    let (store, _temp) = create_test_store("concurrent");
    let guard = SingleFlightGuard::new(Arc::new(store));
    let user = UserId(5);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let guard = guard.clone();
            std::thread::spawn(move || guard.try_acquire(user))
        })
        .collect();

    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|won| *won)
        .count();
    assert_eq!(winners, 1);
}

#[test]
fn test_stored_legacy_model_is_restored_but_not_selectable() {
    let (store, temp) = create_test_store("legacy");
    let user = UserId(42);

    store.set_model(user, ModelId::Gpt4Legacy).unwrap();
    drop(store);

    let reopened = SqliteSessionStore::open(&temp.path().join("legacy.db")).unwrap();
    assert_eq!(reopened.model(user).unwrap(), ModelId::Gpt4Legacy);
    assert!(!reopened.model(user).unwrap().is_managed());
    assert_eq!(
        gptbot_router::dispatch::route_callback(Some("gpt-4")),
        gptbot_router::dispatch::CallbackRoute::Unknown
    );
}
