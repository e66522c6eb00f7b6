#![allow(dead_code)]

use fanclub_chat_lib::libs::config::ChatConfig;
use fanclub_chat_lib::libs::core::ids::UserId;
use fanclub_chat_lib::libs::core::session::ChatSession;
use fanclub_chat_lib::libs::storage::database::database::open_store;
use fanclub_chat_lib::libs::storage::database::storage_sqllite::{SqliteStore, SqliteTransaction};
use fanclub_chat_lib::libs::storage::database::storage_traits::{
    Storage, Transactional, UserStore,
};
use fanclub_chat_lib::libs::storage::records::UserRecord;
use rand::distr::Alphanumeric;
use rand::Rng;
use std::sync::Once;
use std::time::Duration;
use tempfile::TempDir;

pub const ALICE: &str = "00191520";
pub const BOB: &str = "20202020";
pub const CAROL: &str = "59200311";
pub const OUTSIDER: &str = "12345678";

static TRACING: Once = Once::new();

/// A fresh database in its own temp directory. Keep it alive for the test.
pub struct TestDb {
    pub store: SqliteStore,
    _dir: TempDir,
}

impl TestDb {
    pub fn tx(&self) -> SqliteTransaction {
        self.store
            .begin()
            .expect("Failed to create SQLITE TRANSACTION")
    }

    pub fn session(&self, user_id: &str) -> ChatSession<SqliteStore> {
        ChatSession::start(self.store.clone(), test_config(), &UserId::from(user_id))
            .expect("Failed to start chat session")
    }
}

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

/// Renders immediately so tests do not have to wait out the throttle.
pub fn test_config() -> ChatConfig {
    ChatConfig {
        render_delay: Duration::ZERO,
        ..ChatConfig::default()
    }
}

pub fn setup_db() -> TestDb {
    init_tracing();
    let dir = tempfile::tempdir().expect("Failed to create test directory");
    let path = dir.path().join("chat.db");
    let store = open_store(path.to_str().expect("temp path is utf-8"))
        .expect("Failed to open chat database");
    TestDb { store, _dir: dir }
}

/// Database with Alice, Bob, Carol (all VIP) and one non-VIP user.
pub fn setup_seeded_db() -> TestDb {
    let db = setup_db();
    let mut tx = db.tx();
    for (id, username, name) in [
        (ALICE, Some("alice"), Some("Alice")),
        (BOB, Some("bobby"), Some("Bob")),
        (CAROL, Some("carol"), None),
        (OUTSIDER, Some("outsider"), Some("Outsider")),
    ] {
        tx.store_user(&UserRecord::new(
            UserId::from(id),
            username.map(str::to_string),
            name.map(str::to_string),
            0,
        ))
        .expect("Failed to store user");
    }
    tx.commit().expect("Failed to commit seed users");
    db
}

pub fn random_text(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
