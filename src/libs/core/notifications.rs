use crate::libs::core::ids::ConversationId;
use std::collections::HashMap;

const BADGE_CAP: u32 = 99;

/// Unread counters per conversation, kept for the lifetime of a session.
#[derive(Debug, Default)]
pub struct NotificationTally {
    unread: HashMap<ConversationId, u32>,
}

impl NotificationTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, conversation: &ConversationId) {
        *self.unread.entry(conversation.clone()).or_insert(0) += 1;
    }

    pub fn clear(&mut self, conversation: &ConversationId) {
        self.unread.insert(conversation.clone(), 0);
    }

    pub fn unread(&self, conversation: &ConversationId) -> u32 {
        self.unread.get(conversation).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.unread.values().sum()
    }

    /// Label for the chat link in the navigation bar, `None` when nothing is
    /// unread.
    pub fn badge_label(&self) -> Option<String> {
        match self.total() {
            0 => None,
            n if n > BADGE_CAP => Some(format!("{}+", BADGE_CAP)),
            n => Some(n.to_string()),
        }
    }
}
