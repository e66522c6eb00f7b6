use crate::libs::core::ids::{ConversationId, GroupId, MessageId, UserId};
use crate::libs::core::models::PresenceStatus;
use crate::libs::storage::feed::Subscription;
use crate::libs::storage::records::{GroupRecord, MessageRecord, PresenceRecord, UserRecord};
use bincode::error::{DecodeError, EncodeError};
use std::collections::HashMap;
use thiserror::Error;

pub trait Storage {
    type Transaction: Transactional + ChatStore;

    fn begin(&self) -> Result<Self::Transaction, StoreError>;
    fn subscribe(&self, conversation_id: &ConversationId) -> Subscription;
    fn subscribe_all(&self) -> Subscription;
}

pub trait Transactional {
    fn commit(self) -> Result<(), StoreError>;
    fn rollback(self) -> Result<(), StoreError>;
}

pub trait UserStore {
    fn store_user(&mut self, record: &UserRecord) -> Result<(), StoreError>;
    fn load_user_by_id(&mut self, user_id: &UserId) -> Result<UserRecord, StoreError>;
    fn load_users(&mut self) -> Result<Vec<UserRecord>, StoreError>;
}

pub trait PresenceStore {
    fn store_presence(
        &mut self,
        user_id: &UserId,
        status: PresenceStatus,
        last_seen: i64,
        name: &str,
    ) -> Result<(), StoreError>;
    fn load_presence(&mut self) -> Result<Vec<PresenceRecord>, StoreError>;
}

pub trait GroupStore {
    fn store_group(&mut self, record: &GroupRecord) -> Result<(), StoreError>;
    fn load_group(&mut self, group_id: &GroupId) -> Result<GroupRecord, StoreError>;
    fn load_groups_for_member(&mut self, user_id: &UserId) -> Result<Vec<GroupRecord>, StoreError>;
    fn update_group_members(
        &mut self,
        group_id: &GroupId,
        members: &[UserId],
    ) -> Result<(), StoreError>;
}

pub trait MessageStore {
    fn store_message(&mut self, message: &MessageRecord) -> Result<(), StoreError>;
    fn load_message(
        &mut self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
    ) -> Result<MessageRecord, StoreError>;
    /// Oldest first.
    fn load_messages(
        &mut self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<MessageRecord>, StoreError>;
    fn delete_for_user(
        &mut self,
        conversation_id: &ConversationId,
        message_ids: &[MessageId],
        user_id: &UserId,
        deleted_at: i64,
    ) -> Result<usize, StoreError>;
    fn delete_for_everyone(
        &mut self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
        deleted_by: &UserId,
        deleted_at: i64,
    ) -> Result<usize, StoreError>;
    /// Marks unread messages not sent by `reader` as read.
    fn mark_read(
        &mut self,
        conversation_id: &ConversationId,
        reader: &UserId,
    ) -> Result<usize, StoreError>;
}

pub trait SettingsStore {
    fn load_settings(&mut self) -> Result<HashMap<String, String>, StoreError>;
    fn store_setting(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
}

pub trait ChatStore: UserStore + PresenceStore + GroupStore + MessageStore + SettingsStore {}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Sqlite Error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("ConnectionPool Error: {0}")]
    ConnectionPool(#[from] r2d2::Error),
    #[error("Serialisation Error: {0}")]
    Serialisation(#[from] EncodeError),
    #[error("Deserialisation Error: {0}")]
    Deserialisation(#[from] DecodeError),
    #[error("Record not found: {0}")]
    NotFound(String),
}
