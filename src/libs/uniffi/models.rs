// Rust models for the types handed to the front-end

use crate::libs::core::mentions::Segment;
use crate::libs::core::models::PresenceStatus;

#[derive(Clone, Debug, PartialEq, Eq, uniffi::Enum)]
pub enum TextSegment {
    Plain { text: String },
    Mention { name: String },
}

impl From<Segment> for TextSegment {
    fn from(segment: Segment) -> Self {
        match segment {
            Segment::Plain(text) => TextSegment::Plain { text },
            Segment::Mention(name) => TextSegment::Mention { name },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, uniffi::Record)]
pub struct ReplyPreview {
    pub sender_name: String,
    pub snippet: String,
}

#[derive(Clone, Debug, PartialEq, Eq, uniffi::Record)]
pub struct MessageView {
    pub message_id: String,
    pub sender_id: String,
    pub is_outgoing: bool,
    /// Shown above received messages only.
    pub sender_label: Option<String>,
    pub segments: Vec<TextSegment>,
    pub image_data_url: Option<String>,
    pub reply: Option<ReplyPreview>,
    pub timestamp: i64,
    pub time_label: String,
    /// Read receipt, outgoing messages only.
    pub seen: Option<bool>,
    pub mentions_me: bool,
    pub is_tombstone: bool,
}

impl MessageView {
    pub fn plain_text(&self) -> String {
        self.segments
            .iter()
            .map(|segment| match segment {
                TextSegment::Plain { text } => text.clone(),
                TextSegment::Mention { name } => format!("@{}", name),
            })
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, uniffi::Record)]
pub struct ContactView {
    pub user_id: String,
    pub name: String,
    pub status: PresenceStatus,
    pub status_label: String,
    pub unread: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, uniffi::Record)]
pub struct GroupView {
    pub group_id: String,
    pub name: String,
    pub member_count: u32,
    pub unread: u32,
    pub is_admin: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, uniffi::Record)]
pub struct ChatHeader {
    pub title: String,
    pub is_group: bool,
    pub status_line: String,
    pub is_admin: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, uniffi::Record)]
pub struct MentionInsertion {
    pub text: String,
    /// UTF-16 index just past the inserted mention.
    pub cursor: u32,
}
