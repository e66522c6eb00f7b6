use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

const DIRECT_PREFIX: &str = "direct:";
const GROUP_PREFIX: &str = "group:";

/// A member's unique id, e.g. `"00191520"`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl ToSql for UserId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0.as_str()))
    }
}

impl FromSql for UserId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(UserId(value.as_str()?.to_string()))
    }
}

macro_rules! uuid_key {
    ($name:ident) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name {
            pub uuid: Uuid,
        }

        impl $name {
            pub fn generate() -> Self {
                Self {
                    uuid: Uuid::now_v7(),
                }
            }

            pub fn parse(value: &str) -> Result<Self, uuid::Error> {
                Uuid::parse_str(value).map(|uuid| Self { uuid })
            }
        }

        impl From<[u8; 16]> for $name {
            fn from(bytes: [u8; 16]) -> Self {
                Self {
                    uuid: Uuid::from_bytes(bytes),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.uuid)
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.uuid.to_string()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let uuid_str = value.as_str()?;
                Uuid::parse_str(uuid_str)
                    .map(|uuid| Self { uuid })
                    .map_err(|e| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

uuid_key!(GroupId);
uuid_key!(MessageId);

/// Key of a message list: either a pair of members or a group.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConversationId {
    Direct(String),
    Group(GroupId),
}

impl ConversationId {
    /// Room id shared by two members regardless of who asks.
    pub fn direct(a: &UserId, b: &UserId) -> Self {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        ConversationId::Direct(format!("{}_{}", low, high))
    }

    pub fn group(group_id: GroupId) -> Self {
        ConversationId::Group(group_id)
    }

    pub fn is_group(&self) -> bool {
        matches!(self, ConversationId::Group(_))
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        if let Some(room) = value.strip_prefix(DIRECT_PREFIX) {
            if room.is_empty() {
                return Err(format!("empty direct conversation id: {}", value));
            }
            Ok(ConversationId::Direct(room.to_string()))
        } else if let Some(group) = value.strip_prefix(GROUP_PREFIX) {
            GroupId::parse(group)
                .map(ConversationId::Group)
                .map_err(|e| e.to_string())
        } else {
            Err(format!("unknown conversation id: {}", value))
        }
    }

    fn storage_key(&self) -> String {
        match self {
            ConversationId::Direct(room) => format!("{}{}", DIRECT_PREFIX, room),
            ConversationId::Group(group) => format!("{}{}", GROUP_PREFIX, group),
        }
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversationId::Direct(room) => f.write_str(room),
            ConversationId::Group(group) => write!(f, "{}", group),
        }
    }
}

impl ToSql for ConversationId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.storage_key()))
    }
}

impl FromSql for ConversationId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        ConversationId::parse(raw).map_err(|e| FromSqlError::Other(e.into()))
    }
}
