//! In-process change notifications standing in for live value listeners.
//!
//! Transactions collect the conversations they touched and publish them after
//! a successful commit. Dropping a [`Subscription`] detaches its listener.

use crate::libs::core::ids::{ConversationId, MessageId, UserId};
use crate::libs::core::models::PresenceStatus;
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, Weak};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    MessageAdded {
        message_id: MessageId,
        sender_id: UserId,
    },
    MessagesUpdated,
    PresenceChanged {
        user_id: UserId,
        status: PresenceStatus,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeEvent {
    /// `None` for member-wide changes, which only reach [`ChangeFeed::subscribe_all`].
    pub conversation_id: Option<ConversationId>,
    pub kind: ChangeKind,
}

#[derive(Debug)]
struct Listener {
    filter: Option<ConversationId>,
    sender: Sender<ChangeEvent>,
}

#[derive(Debug, Default)]
struct Listeners {
    next_id: u64,
    by_id: HashMap<u64, Listener>,
}

#[derive(Clone, Debug, Default)]
pub struct ChangeFeed {
    listeners: Arc<Mutex<Listeners>>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen to one conversation.
    pub fn subscribe(&self, conversation_id: &ConversationId) -> Subscription {
        self.attach(Some(conversation_id.clone()))
    }

    /// Listen to every conversation.
    pub fn subscribe_all(&self) -> Subscription {
        self.attach(None)
    }

    fn attach(&self, filter: Option<ConversationId>) -> Subscription {
        let (sender, receiver) = mpsc::channel();
        let id = match self.listeners.lock() {
            Ok(mut listeners) => {
                let id = listeners.next_id;
                listeners.next_id += 1;
                listeners.by_id.insert(id, Listener { filter, sender });
                id
            }
            Err(_) => {
                // sender is dropped here, the receiver just never yields
                tracing::warn!("change feed lock poisoned, subscription will stay silent");
                u64::MAX
            }
        };
        Subscription {
            id,
            receiver,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    pub fn publish(&self, events: Vec<ChangeEvent>) {
        if events.is_empty() {
            return;
        }
        let Ok(mut listeners) = self.listeners.lock() else {
            tracing::warn!(count = events.len(), "change feed lock poisoned, events dropped");
            return;
        };
        listeners.by_id.retain(|_, listener| {
            events
                .iter()
                .filter(|event| {
                    listener
                        .filter
                        .as_ref()
                        .map_or(true, |filter| event.conversation_id.as_ref() == Some(filter))
                })
                .all(|event| listener.sender.send(event.clone()).is_ok())
        });
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .map(|listeners| listeners.by_id.len())
            .unwrap_or(0)
    }
}

#[derive(Debug)]
pub struct Subscription {
    id: u64,
    receiver: Receiver<ChangeEvent>,
    listeners: Weak<Mutex<Listeners>>,
}

impl Subscription {
    /// Everything published since the last drain.
    pub fn drain(&self) -> Vec<ChangeEvent> {
        self.receiver.try_iter().collect()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            if let Ok(mut listeners) = listeners.lock() {
                listeners.by_id.remove(&self.id);
            }
        }
    }
}
