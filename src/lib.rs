pub mod libs;

use crate::libs::config::ChatConfig;
use crate::libs::core::ids::{GroupId, MessageId, UserId};
use crate::libs::core::mentions;
use crate::libs::core::models::{DeleteScope, PresenceStatus};
use crate::libs::core::session::ChatSession;
use crate::libs::storage::database::database::open_store;
use crate::libs::storage::database::storage_sqllite::SqliteStore;
use crate::libs::storage::database::storage_traits::{SettingsStore, Storage, StoreError, Transactional};
use crate::libs::uniffi::models::{
    ChatHeader, ContactView, GroupView, MentionInsertion, MessageView, ReplyPreview,
};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use thiserror::Error;

uniffi::setup_scaffolding!();

#[derive(Error, Debug, uniffi::Error)]
#[uniffi(flat_error)]
pub enum ChatError {
    #[error("Storage Error: {0}")]
    Store(#[from] StoreError),
    #[error("Access denied: {0} is not a VIP member")]
    NotVip(String),
    #[error("Unknown user: {0}")]
    UnknownUser(String),
    #[error("Unknown group: {0}")]
    UnknownGroup(String),
    #[error("Invalid id: {0}")]
    InvalidId(String),
    #[error("No chat selected")]
    NoChatSelected,
    #[error("Message is empty")]
    EmptyMessage,
    #[error("Message not found: {0}")]
    MessageNotFound(String),
    #[error("Only the sender can delete this message")]
    NotMessageOwner,
    #[error("Only the group admin can manage members")]
    NotGroupAdmin,
    #[error("The group admin cannot be removed")]
    CannotRemoveAdmin,
    #[error("Please enter a group name")]
    EmptyGroupName,
    #[error("Please select at least one member")]
    NoGroupMembers,
    #[error("Please select at least one member to add")]
    NoMembersSelected,
    #[error("Image size should be less than {max} bytes, got {size}")]
    ImageTooLarge { size: u64, max: u64 },
    #[error("Please select an image file, got {0}")]
    NotAnImage(String),
    #[error("Chat session is unavailable")]
    SessionUnavailable,
}

/// Foreign-facing handle around a [`ChatSession`] backed by SQLite.
#[derive(uniffi::Object)]
pub struct ChatClient {
    session: Mutex<ChatSession<SqliteStore>>,
}

#[uniffi::export]
impl ChatClient {
    /// Opens the database at `database_path` (an empty path falls back to the
    /// configured one) and starts a session for `user_id`.
    #[uniffi::constructor]
    pub fn new(database_path: String, user_id: String) -> Result<Arc<Self>, ChatError> {
        let env_config = ChatConfig::from_env();
        let path = if database_path.is_empty() {
            env_config.database_path
        } else {
            database_path
        };

        let store = open_store(&path)?;
        let settings = {
            let mut tx = store.begin()?;
            let settings = tx.load_settings()?;
            tx.commit()?;
            settings
        };
        let mut config = ChatConfig::load(&settings);
        config.database_path = path;

        let session = ChatSession::start(store, config, &UserId::from(user_id.as_str()))?;
        Ok(Arc::new(Self {
            session: Mutex::new(session),
        }))
    }

    pub fn contacts(&self) -> Result<Vec<ContactView>, ChatError> {
        Ok(self.session()?.contacts())
    }

    pub fn groups(&self) -> Result<Vec<GroupView>, ChatError> {
        Ok(self.session()?.groups())
    }

    pub fn refresh(&self) -> Result<(), ChatError> {
        let mut session = self.session()?;
        session.refresh_contacts()?;
        session.refresh_groups()?;
        session.refresh_presence()
    }

    pub fn select_user(&self, user_id: String) -> Result<(), ChatError> {
        self.session()?
            .select_user(&UserId::from(user_id.as_str()), Instant::now())
    }

    pub fn select_group(&self, group_id: String) -> Result<(), ChatError> {
        let group_id = parse_group_id(&group_id)?;
        self.session()?.select_group(&group_id, Instant::now())
    }

    pub fn close_chat(&self) -> Result<(), ChatError> {
        self.session()?.close_chat();
        Ok(())
    }

    pub fn header(&self) -> Result<Option<ChatHeader>, ChatError> {
        Ok(self.session()?.header())
    }

    /// Call from the UI loop; returns the message list when a render is due.
    pub fn pump(&self) -> Result<Option<Vec<MessageView>>, ChatError> {
        self.session()?.pump(Instant::now())
    }

    pub fn send_message(&self, text: String) -> Result<String, ChatError> {
        let message_id = self.session()?.send_message(&text)?;
        Ok(message_id.to_string())
    }

    pub fn set_reply_to(&self, message_id: String) -> Result<ReplyPreview, ChatError> {
        let message_id = parse_message_id(&message_id)?;
        self.session()?.set_reply_to(&message_id)
    }

    pub fn clear_reply(&self) -> Result<(), ChatError> {
        self.session()?.clear_reply();
        Ok(())
    }

    pub fn attach_image(
        &self,
        file_name: String,
        mime_type: String,
        bytes: Vec<u8>,
    ) -> Result<(), ChatError> {
        self.session()?.attach_image(&file_name, &mime_type, &bytes)
    }

    pub fn remove_image(&self) -> Result<(), ChatError> {
        self.session()?.remove_image();
        Ok(())
    }

    pub fn delete_prompt(&self, message_id: String) -> Result<String, ChatError> {
        let message_id = parse_message_id(&message_id)?;
        self.session()?.delete_prompt(&message_id)
    }

    pub fn delete_warning(&self, scope: DeleteScope) -> Result<String, ChatError> {
        Ok(self.session()?.delete_warning(scope).to_string())
    }

    pub fn delete_message(&self, message_id: String, scope: DeleteScope) -> Result<(), ChatError> {
        let message_id = parse_message_id(&message_id)?;
        self.session()?.delete_message(&message_id, scope)
    }

    pub fn clear_chat(&self) -> Result<u32, ChatError> {
        Ok(self.session()?.clear_chat()? as u32)
    }

    pub fn set_presence(&self, status: PresenceStatus) -> Result<(), ChatError> {
        self.session()?.set_presence(status)
    }

    pub fn disconnect(&self) -> Result<(), ChatError> {
        self.session()?.disconnect()
    }

    pub fn mention_candidates(&self) -> Result<Vec<ContactView>, ChatError> {
        Ok(self.session()?.mention_candidates())
    }

    pub fn create_group(&self, name: String, members: Vec<String>) -> Result<String, ChatError> {
        let members = to_user_ids(&members);
        let group_id = self.session()?.create_group(&name, &members, Instant::now())?;
        Ok(group_id.to_string())
    }

    pub fn add_members(&self, members: Vec<String>) -> Result<(), ChatError> {
        self.session()?.add_members(&to_user_ids(&members))
    }

    pub fn remove_member(&self, member: String) -> Result<(), ChatError> {
        self.session()?.remove_member(&UserId::from(member.as_str()))
    }

    pub fn available_members(&self) -> Result<Vec<ContactView>, ChatError> {
        Ok(self.session()?.available_members())
    }

    pub fn nav_badge(&self) -> Result<Option<String>, ChatError> {
        Ok(self.session()?.nav_badge())
    }
}

impl ChatClient {
    fn session(&self) -> Result<MutexGuard<'_, ChatSession<SqliteStore>>, ChatError> {
        self.session.lock().map_err(|_| ChatError::SessionUnavailable)
    }
}

/// Inserts `@name ` at `cursor`. Both the given and the returned cursor are
/// UTF-16 indices, the unit Kotlin and Swift text fields use.
#[uniffi::export]
pub fn insert_mention(input: String, cursor: u32, name: String) -> MentionInsertion {
    let byte_cursor = mentions::byte_offset_of_utf16(&input, cursor as usize);
    let (text, byte_cursor) = mentions::insert_mention(&input, byte_cursor, &name);
    let cursor = mentions::utf16_offset_of_byte(&text, byte_cursor) as u32;
    MentionInsertion { text, cursor }
}

fn parse_group_id(raw: &str) -> Result<GroupId, ChatError> {
    GroupId::parse(raw).map_err(|_| ChatError::InvalidId(raw.to_string()))
}

fn parse_message_id(raw: &str) -> Result<MessageId, ChatError> {
    MessageId::parse(raw).map_err(|_| ChatError::InvalidId(raw.to_string()))
}

fn to_user_ids(raw: &[String]) -> Vec<UserId> {
    raw.iter().map(|id| UserId::from(id.as_str())).collect()
}
