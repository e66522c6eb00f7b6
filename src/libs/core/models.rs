use crate::libs::core::ids::{MessageId, UserId};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, uniffi::Enum)]
pub enum PresenceStatus {
    Online,
    Idle,
    Offline,
}

impl PresenceStatus {
    pub fn label(&self) -> &'static str {
        match self {
            PresenceStatus::Online => "Online",
            // The sidebar only distinguishes online from everything else.
            PresenceStatus::Idle | PresenceStatus::Offline => "Offline",
        }
    }
}

impl FromSql for PresenceStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "online" => Ok(PresenceStatus::Online),
            "idle" => Ok(PresenceStatus::Idle),
            "offline" => Ok(PresenceStatus::Offline),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

impl ToSql for PresenceStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            PresenceStatus::Online => Ok(ToSqlOutput::from("online")),
            PresenceStatus::Idle => Ok(ToSqlOutput::from("idle")),
            PresenceStatus::Offline => Ok(ToSqlOutput::from("offline")),
        }
    }
}

/// Who a deletion applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, uniffi::Enum)]
pub enum DeleteScope {
    ForMe,
    ForEveryone,
}

impl DeleteScope {
    /// Warning shown in the delete confirmation dialog.
    pub fn warning(&self, is_group: bool) -> &'static str {
        match (self, is_group) {
            (DeleteScope::ForMe, _) => {
                "This message will only be deleted from your view. Others will still see it."
            }
            (DeleteScope::ForEveryone, true) => "This message will be deleted for all group members.",
            (DeleteScope::ForEveryone, false) => {
                "This message will be deleted for both you and the recipient."
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    pub user_id: UserId,
    pub name: String,
}

/// Denormalised copy of the message being replied to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRef {
    pub message_id: MessageId,
    pub sender_id: UserId,
    pub sender_name: String,
    pub text: String,
    pub timestamp: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageAttachment {
    pub data_url: String,
    pub file_name: String,
    pub file_size: u64,
}
