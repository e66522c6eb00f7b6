use crate::libs::core::ids::{ConversationId, GroupId, MessageId, UserId};
use crate::libs::core::models::{ImageAttachment, Mention, PresenceStatus, ReplyRef};
use crate::libs::storage::database::storage_traits::{
    ChatStore, GroupStore, MessageStore, PresenceStore, SettingsStore, Storage, StoreError,
    Transactional, UserStore,
};
use crate::libs::storage::feed::{ChangeEvent, ChangeFeed, ChangeKind, Subscription};
use crate::libs::storage::records::{GroupRecord, MessageRecord, PresenceRecord, UserRecord};
use bincode::config::standard;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

const MESSAGE_COLUMNS: &str = "message_id, conversation_id, sender_id, sender_name, text,
     image_data_url, image_file_name, image_file_size, reply_to, mentions,
     timestamp, is_read, deleted_for_everyone";

/// A write transaction on one pooled connection.
///
/// Change events are queued while the transaction runs and only published
/// once it commits. Dropping an uncommitted transaction rolls it back.
pub struct SqliteTransaction {
    conn: PooledConnection<SqliteConnectionManager>,
    feed: ChangeFeed,
    events: Vec<ChangeEvent>,
    open: bool,
}

impl SqliteTransaction {
    pub fn new(
        conn: PooledConnection<SqliteConnectionManager>,
        feed: ChangeFeed,
    ) -> Result<Self, StoreError> {
        conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(Self {
            conn,
            feed,
            events: Vec::new(),
            open: true,
        })
    }

    fn touch(&mut self, conversation_id: &ConversationId, kind: ChangeKind) {
        self.queue(ChangeEvent {
            conversation_id: Some(conversation_id.clone()),
            kind,
        });
    }

    fn queue(&mut self, event: ChangeEvent) {
        if !self.events.contains(&event) {
            self.events.push(event);
        }
    }

    fn load_deletions(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<HashMap<MessageId, BTreeSet<UserId>>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT d.message_id, d.user_id
             FROM message_deletions d
             JOIN messages m ON m.message_id = d.message_id
             WHERE m.conversation_id = ?1",
        )?;
        let rows = stmt.query_map(params![conversation_id], |row| {
            Ok((row.get::<_, MessageId>(0)?, row.get::<_, UserId>(1)?))
        })?;

        let mut deletions: HashMap<MessageId, BTreeSet<UserId>> = HashMap::new();
        for row in rows {
            let (message_id, user_id) = row?;
            deletions.entry(message_id).or_default().insert(user_id);
        }
        Ok(deletions)
    }

    fn load_members(&self, group_id: &GroupId) -> Result<Vec<UserId>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id FROM group_members WHERE group_id = ?1 ORDER BY position ASC",
        )?;
        let rows = stmt.query_map(params![group_id], |row| row.get::<_, UserId>(0))?;

        let mut members = Vec::new();
        for row in rows {
            members.push(row?);
        }
        Ok(members)
    }

    fn insert_members(&self, group_id: &GroupId, members: &[UserId]) -> Result<(), StoreError> {
        let mut stmt = self.conn.prepare(
            "INSERT INTO group_members (group_id, user_id, position) VALUES (?1, ?2, ?3)",
        )?;
        for (position, member) in members.iter().enumerate() {
            stmt.execute(params![group_id, member, position as i64])?;
        }
        Ok(())
    }
}

impl Transactional for SqliteTransaction {
    fn commit(mut self) -> Result<(), StoreError> {
        self.conn.execute_batch("COMMIT")?;
        self.open = false;
        let events = std::mem::take(&mut self.events);
        self.feed.publish(events);
        Ok(())
    }

    fn rollback(mut self) -> Result<(), StoreError> {
        self.open = false;
        self.events.clear();
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        if self.open {
            if let Err(err) = self.conn.execute_batch("ROLLBACK") {
                tracing::warn!(error = %err, "failed to roll back abandoned transaction");
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct SqliteStore {
    conn_pool: Pool<SqliteConnectionManager>,
    feed: ChangeFeed,
}

impl SqliteStore {
    pub fn new(db_path: &str) -> Result<Self, StoreError> {
        let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
            conn.busy_timeout(Duration::from_secs(5))?;
            conn.execute_batch("PRAGMA foreign_keys = ON;")
        });
        let pool = Pool::new(manager)?;
        Ok(Self {
            conn_pool: pool,
            feed: ChangeFeed::new(),
        })
    }

    pub fn new_connection(&self) -> Result<PooledConnection<SqliteConnectionManager>, StoreError> {
        Ok(self.conn_pool.get()?)
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }
}

impl Storage for SqliteStore {
    type Transaction = SqliteTransaction;

    fn begin(&self) -> Result<SqliteTransaction, StoreError> {
        SqliteTransaction::new(self.new_connection()?, self.feed.clone())
    }

    fn subscribe(&self, conversation_id: &ConversationId) -> Subscription {
        self.feed.subscribe(conversation_id)
    }

    fn subscribe_all(&self) -> Subscription {
        self.feed.subscribe_all()
    }
}

impl ChatStore for SqliteTransaction {}

impl UserStore for SqliteTransaction {
    fn store_user(&mut self, record: &UserRecord) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO users (user_id, username, display_name, last_login)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id) DO UPDATE SET
                username = excluded.username,
                display_name = excluded.display_name,
                last_login = excluded.last_login",
            params![
                record.user_id,
                record.username,
                record.name,
                record.last_login
            ],
        )?;
        Ok(())
    }

    fn load_user_by_id(&mut self, user_id: &UserId) -> Result<UserRecord, StoreError> {
        self.conn
            .query_row(
                "SELECT user_id, username, display_name, last_login FROM users WHERE user_id = ?1",
                params![user_id],
                row_to_user,
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound(format!("user {}", user_id)))
    }

    fn load_users(&mut self) -> Result<Vec<UserRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, username, display_name, last_login FROM users ORDER BY user_id ASC",
        )?;
        let rows = stmt.query_map([], row_to_user)?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }
}

impl PresenceStore for SqliteTransaction {
    fn store_presence(
        &mut self,
        user_id: &UserId,
        status: PresenceStatus,
        last_seen: i64,
        name: &str,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO presence (user_id, status, last_seen, name)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id) DO UPDATE SET
                status = excluded.status,
                last_seen = excluded.last_seen,
                name = excluded.name",
            params![user_id, status, last_seen, name],
        )?;

        self.queue(ChangeEvent {
            conversation_id: None,
            kind: ChangeKind::PresenceChanged {
                user_id: user_id.clone(),
                status,
            },
        });
        Ok(())
    }

    fn load_presence(&mut self) -> Result<Vec<PresenceRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT user_id, status, last_seen, name FROM presence")?;
        let rows = stmt.query_map([], |row| {
            Ok(PresenceRecord {
                user_id: row.get(0)?,
                status: row.get(1)?,
                last_seen: row.get(2)?,
                name: row.get(3)?,
            })
        })?;

        let mut presence = Vec::new();
        for row in rows {
            presence.push(row?);
        }
        Ok(presence)
    }
}

impl GroupStore for SqliteTransaction {
    fn store_group(&mut self, record: &GroupRecord) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO chat_groups (group_id, name, admin_id, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                record.group_id,
                record.name,
                record.admin_id,
                record.created_at
            ],
        )?;
        self.insert_members(&record.group_id, &record.members)?;
        Ok(())
    }

    fn load_group(&mut self, group_id: &GroupId) -> Result<GroupRecord, StoreError> {
        let group = self
            .conn
            .query_row(
                "SELECT group_id, name, admin_id, created_at FROM chat_groups WHERE group_id = ?1",
                params![group_id],
                row_to_group,
            )
            .optional()?;

        let mut group = group.ok_or_else(|| StoreError::NotFound(format!("group {}", group_id)))?;
        group.members = self.load_members(&group.group_id)?;
        Ok(group)
    }

    fn load_groups_for_member(&mut self, user_id: &UserId) -> Result<Vec<GroupRecord>, StoreError> {
        let mut groups = {
            let mut stmt = self.conn.prepare(
                "SELECT g.group_id, g.name, g.admin_id, g.created_at
                 FROM chat_groups g
                 JOIN group_members m ON m.group_id = g.group_id
                 WHERE m.user_id = ?1
                 ORDER BY g.created_at ASC, g.group_id ASC",
            )?;
            let rows = stmt.query_map(params![user_id], row_to_group)?;

            let mut groups = Vec::new();
            for row in rows {
                groups.push(row?);
            }
            groups
        };

        for group in groups.iter_mut() {
            group.members = self.load_members(&group.group_id)?;
        }
        Ok(groups)
    }

    fn update_group_members(
        &mut self,
        group_id: &GroupId,
        members: &[UserId],
    ) -> Result<(), StoreError> {
        let exists = self
            .conn
            .query_row(
                "SELECT 1 FROM chat_groups WHERE group_id = ?1",
                params![group_id],
                |_| Ok(()),
            )
            .optional()?;
        if exists.is_none() {
            return Err(StoreError::NotFound(format!("group {}", group_id)));
        }

        self.conn.execute(
            "DELETE FROM group_members WHERE group_id = ?1",
            params![group_id],
        )?;
        self.insert_members(group_id, members)
    }
}

impl MessageStore for SqliteTransaction {
    fn store_message(&mut self, message: &MessageRecord) -> Result<(), StoreError> {
        let mentions = bincode::serde::encode_to_vec(&message.mentions, standard())?;
        let reply_to = message
            .reply_to
            .as_ref()
            .map(|reply| bincode::serde::encode_to_vec(reply, standard()))
            .transpose()?;
        let image = message.image.as_ref();

        self.conn.execute(
            &format!(
                "INSERT INTO messages ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                MESSAGE_COLUMNS
            ),
            params![
                message.message_id,
                message.conversation_id,
                message.sender_id,
                message.sender_name,
                message.text,
                image.map(|image| image.data_url.as_str()),
                image.map(|image| image.file_name.as_str()),
                image.map(|image| image.file_size as i64),
                reply_to,
                mentions,
                message.timestamp,
                message.is_read,
                message.deleted_for_everyone,
            ],
        )?;

        for user_id in &message.deleted_for {
            self.conn.execute(
                "INSERT OR IGNORE INTO message_deletions (message_id, user_id, deleted_at)
                 VALUES (?1, ?2, ?3)",
                params![message.message_id, user_id, message.timestamp],
            )?;
        }

        self.touch(
            &message.conversation_id,
            ChangeKind::MessageAdded {
                message_id: message.message_id,
                sender_id: message.sender_id.clone(),
            },
        );
        Ok(())
    }

    fn load_message(
        &mut self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
    ) -> Result<MessageRecord, StoreError> {
        let message = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM messages WHERE conversation_id = ?1 AND message_id = ?2",
                    MESSAGE_COLUMNS
                ),
                params![conversation_id, message_id],
                row_to_message,
            )
            .optional()?;

        let mut message =
            message.ok_or_else(|| StoreError::NotFound(format!("message {}", message_id)))?;

        let mut stmt = self
            .conn
            .prepare("SELECT user_id FROM message_deletions WHERE message_id = ?1")?;
        let rows = stmt.query_map(params![message_id], |row| row.get::<_, UserId>(0))?;
        for row in rows {
            message.deleted_for.insert(row?);
        }
        Ok(message)
    }

    fn load_messages(
        &mut self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<MessageRecord>, StoreError> {
        let mut deletions = self.load_deletions(conversation_id)?;

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM messages WHERE conversation_id = ?1 ORDER BY timestamp ASC, message_id ASC",
            MESSAGE_COLUMNS
        ))?;
        let rows = stmt.query_map(params![conversation_id], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            let mut message = row?;
            if let Some(deleted_for) = deletions.remove(&message.message_id) {
                message.deleted_for = deleted_for;
            }
            messages.push(message);
        }
        Ok(messages)
    }

    fn delete_for_user(
        &mut self,
        conversation_id: &ConversationId,
        message_ids: &[MessageId],
        user_id: &UserId,
        deleted_at: i64,
    ) -> Result<usize, StoreError> {
        let mut affected = 0;
        {
            let mut stmt = self.conn.prepare(
                "INSERT OR IGNORE INTO message_deletions (message_id, user_id, deleted_at)
                 SELECT message_id, ?2, ?3 FROM messages
                 WHERE message_id = ?1 AND conversation_id = ?4",
            )?;
            for message_id in message_ids {
                affected += stmt.execute(params![message_id, user_id, deleted_at, conversation_id])?;
            }
        }

        if affected > 0 {
            self.touch(conversation_id, ChangeKind::MessagesUpdated);
        }
        Ok(affected)
    }

    fn delete_for_everyone(
        &mut self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
        deleted_by: &UserId,
        deleted_at: i64,
    ) -> Result<usize, StoreError> {
        let affected = self.conn.execute(
            "UPDATE messages
             SET deleted_for_everyone = true, deleted_by = ?1, deleted_at = ?2
             WHERE message_id = ?3 AND conversation_id = ?4 AND deleted_for_everyone = false",
            params![deleted_by, deleted_at, message_id, conversation_id],
        )?;

        if affected > 0 {
            self.touch(conversation_id, ChangeKind::MessagesUpdated);
        }
        Ok(affected)
    }

    fn mark_read(
        &mut self,
        conversation_id: &ConversationId,
        reader: &UserId,
    ) -> Result<usize, StoreError> {
        let affected = self.conn.execute(
            "UPDATE messages SET is_read = true
             WHERE conversation_id = ?1 AND is_read = false AND sender_id != ?2",
            params![conversation_id, reader],
        )?;

        if affected > 0 {
            self.touch(conversation_id, ChangeKind::MessagesUpdated);
        }
        Ok(affected)
    }
}

impl SettingsStore for SqliteTransaction {
    fn load_settings(&mut self) -> Result<HashMap<String, String>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT key, value FROM app_settings")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

        let mut settings = HashMap::new();
        for row in rows {
            let (key, value) = row?;
            settings.insert(key, value);
        }
        Ok(settings)
    }

    fn store_setting(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO app_settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = strftime('%s', 'now')",
            params![key, value],
        )?;
        Ok(())
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord::new(
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
    ))
}

fn row_to_group(row: &rusqlite::Row<'_>) -> rusqlite::Result<GroupRecord> {
    Ok(GroupRecord {
        group_id: row.get(0)?,
        name: row.get(1)?,
        admin_id: row.get(2)?,
        members: Vec::new(),
        created_at: row.get(3)?,
    })
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRecord> {
    let image_data_url: Option<String> = row.get(5)?;
    let image_file_name: Option<String> = row.get(6)?;
    let image_file_size: Option<i64> = row.get(7)?;
    let image = image_data_url.map(|data_url| ImageAttachment {
        data_url,
        file_name: image_file_name.unwrap_or_default(),
        file_size: image_file_size.unwrap_or(0).max(0) as u64,
    });

    let reply_to = row
        .get::<_, Option<Vec<u8>>>(8)?
        .map(|bytes| decode_blob::<ReplyRef>(8, &bytes))
        .transpose()?;
    let mentions_bytes: Vec<u8> = row.get(9)?;
    let mentions = decode_blob::<Vec<Mention>>(9, &mentions_bytes)?;

    Ok(MessageRecord {
        message_id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_id: row.get(2)?,
        sender_name: row.get(3)?,
        text: row.get(4)?,
        image,
        reply_to,
        mentions,
        timestamp: row.get(10)?,
        is_read: row.get(11)?,
        deleted_for_everyone: row.get(12)?,
        deleted_for: BTreeSet::new(),
    })
}

fn decode_blob<T: serde::de::DeserializeOwned>(column: usize, bytes: &[u8]) -> rusqlite::Result<T> {
    bincode::serde::decode_from_slice(bytes, standard())
        .map(|(value, _len)| value)
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Blob, Box::new(e))
        })
}
