use crate::libs::core::ids::{ConversationId, GroupId, MessageId, UserId};
use crate::libs::core::models::{ImageAttachment, Mention, PresenceStatus, ReplyRef};
use std::collections::BTreeSet;

#[derive(Clone, Debug, PartialEq)]
pub struct UserRecord {
    pub user_id: UserId,
    pub username: Option<String>,
    pub name: Option<String>,
    pub last_login: i64,
}

impl UserRecord {
    pub fn new(
        user_id: UserId,
        username: Option<String>,
        name: Option<String>,
        last_login: i64,
    ) -> Self {
        Self {
            user_id,
            username,
            name,
            last_login,
        }
    }

    /// Name shown in the sidebar: display name, then username, then the id.
    pub fn display_name(&self) -> String {
        self.name
            .as_deref()
            .filter(|name| !name.is_empty())
            .or(self.username.as_deref().filter(|name| !name.is_empty()))
            .map(str::to_string)
            .unwrap_or_else(|| fallback_name(&self.user_id))
    }
}

pub fn fallback_name(user_id: &UserId) -> String {
    format!("VIP {}", user_id)
}

#[derive(Clone, Debug, PartialEq)]
pub struct PresenceRecord {
    pub user_id: UserId,
    pub status: PresenceStatus,
    pub last_seen: i64,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GroupRecord {
    pub group_id: GroupId,
    pub name: String,
    pub admin_id: UserId,
    pub members: Vec<UserId>,
    pub created_at: i64,
}

impl GroupRecord {
    pub fn conversation_id(&self) -> ConversationId {
        ConversationId::group(self.group_id)
    }

    pub fn is_member(&self, user_id: &UserId) -> bool {
        self.members.contains(user_id)
    }

    pub fn is_admin(&self, user_id: &UserId) -> bool {
        &self.admin_id == user_id
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MessageRecord {
    pub message_id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub sender_name: String,
    pub text: String,
    pub image: Option<ImageAttachment>,
    pub reply_to: Option<ReplyRef>,
    pub mentions: Vec<Mention>,
    pub timestamp: i64,
    pub is_read: bool,
    pub deleted_for_everyone: bool,
    /// Viewers who deleted this message from their own view.
    pub deleted_for: BTreeSet<UserId>,
}

impl MessageRecord {
    pub fn new(
        conversation_id: ConversationId,
        sender_id: UserId,
        sender_name: String,
        text: String,
        timestamp: i64,
    ) -> Self {
        Self {
            message_id: MessageId::generate(),
            conversation_id,
            sender_id,
            sender_name,
            text,
            image: None,
            reply_to: None,
            mentions: Vec::new(),
            timestamp,
            is_read: false,
            deleted_for_everyone: false,
            deleted_for: BTreeSet::new(),
        }
    }

    pub fn is_deleted_for(&self, viewer: &UserId) -> bool {
        self.deleted_for_everyone || self.deleted_for.contains(viewer)
    }

    pub fn as_reply_ref(&self) -> ReplyRef {
        ReplyRef {
            message_id: self.message_id,
            sender_id: self.sender_id.clone(),
            sender_name: self.sender_name.clone(),
            text: self.text.clone(),
            timestamp: self.timestamp,
        }
    }
}
