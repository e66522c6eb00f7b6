use crate::libs::storage::database::storage_sqllite::SqliteStore;
use crate::libs::storage::database::storage_traits::StoreError;
use rusqlite::Connection;

/// Opens (creating if needed) the chat database at `path` and brings the
/// schema up to date.
pub fn open_store(path: &str) -> Result<SqliteStore, StoreError> {
    tracing::info!(path = %path, "opening chat database");
    let store = SqliteStore::new(path)?;
    let connection = store.new_connection()?;
    db_migration(&connection)?;
    Ok(store)
}

pub fn db_migration(connection: &Connection) -> Result<(), StoreError> {
    tracing::debug!("applying chat schema");

    connection.execute_batch(
        "BEGIN;

        CREATE TABLE IF NOT EXISTS users (
            user_id TEXT PRIMARY KEY,
            username TEXT,
            display_name TEXT,
            last_login INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS presence (
            user_id TEXT PRIMARY KEY,
            status TEXT NOT NULL,
            last_seen INTEGER NOT NULL,
            name TEXT NOT NULL,

            CHECK (status IN ('online', 'idle', 'offline'))
        );

        CREATE TABLE IF NOT EXISTS chat_groups (
            group_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            admin_id TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS group_members (
            group_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            position INTEGER NOT NULL,

            PRIMARY KEY (group_id, user_id),
            FOREIGN KEY (group_id) REFERENCES chat_groups(group_id) ON DELETE CASCADE
        );
        CREATE INDEX IF NOT EXISTS idx_group_members_user_id ON group_members(user_id);

        CREATE TABLE IF NOT EXISTS messages (
            message_id TEXT PRIMARY KEY,
            conversation_id TEXT NOT NULL,
            sender_id TEXT NOT NULL,
            sender_name TEXT NOT NULL,
            text TEXT NOT NULL,
            image_data_url TEXT,
            image_file_name TEXT,
            image_file_size INTEGER,
            reply_to BLOB,
            mentions BLOB NOT NULL,
            timestamp INTEGER NOT NULL,
            is_read BOOLEAN NOT NULL DEFAULT false,
            deleted_for_everyone BOOLEAN NOT NULL DEFAULT false,
            deleted_by TEXT,
            deleted_at INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_messages_conversation_id_timestamp
            ON messages(conversation_id, timestamp);

        CREATE TABLE IF NOT EXISTS message_deletions (
            message_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            deleted_at INTEGER NOT NULL,

            PRIMARY KEY (message_id, user_id),
            FOREIGN KEY (message_id) REFERENCES messages(message_id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS app_settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );

        INSERT OR IGNORE INTO app_settings (key, value) VALUES
            ('render_delay_ms', '100'),
            ('max_image_bytes', '5242880'),
            ('app_version', '0.1.0');

        COMMIT;",
    )?;

    Ok(())
}
