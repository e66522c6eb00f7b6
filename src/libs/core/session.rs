//! The chat controller for one logged-in member.
//!
//! A session owns everything the page used to keep in globals: the member,
//! their contacts and groups, the current selection, reply/image drafts, the
//! unread tally and the live listener on the selected conversation. The
//! caller drives it with [`ChatSession::pump`] from its event loop.

use crate::libs::config::ChatConfig;
use crate::libs::core::groups;
use crate::libs::core::ids::{ConversationId, GroupId, MessageId, UserId};
use crate::libs::core::images;
use crate::libs::core::mentions::{self, highlight, mentions_user};
use crate::libs::core::models::{DeleteScope, ImageAttachment, PresenceStatus};
use crate::libs::core::notifications::NotificationTally;
use crate::libs::core::reply::{self, IMAGE_LABEL, QUOTE_PREVIEW_CHARS};
use crate::libs::core::throttle::RenderThrottle;
use crate::libs::core::visibility::{visibility_for, Visibility};
use crate::libs::storage::database::storage_traits::{
    GroupStore, MessageStore, PresenceStore, Storage, StoreError, Transactional, UserStore,
};
use crate::libs::storage::feed::{ChangeKind, Subscription};
use crate::libs::storage::records::{fallback_name, GroupRecord, MessageRecord, PresenceRecord, UserRecord};
use crate::libs::uniffi::models::{ChatHeader, ContactView, GroupView, MessageView, ReplyPreview};
use crate::ChatError;
use chrono::{Local, TimeZone, Utc};
use std::collections::HashMap;
use std::time::Instant;

#[derive(Clone, Debug, PartialEq)]
pub enum Selection {
    Direct(UserRecord),
    Group(GroupRecord),
}

impl Selection {
    pub fn conversation_id(&self, me: &UserId) -> ConversationId {
        match self {
            Selection::Direct(contact) => ConversationId::direct(me, &contact.user_id),
            Selection::Group(group) => group.conversation_id(),
        }
    }
}

struct ConversationListener {
    conversation_id: ConversationId,
    subscription: Subscription,
    throttle: RenderThrottle<Vec<MessageRecord>>,
}

#[derive(Default)]
struct Draft {
    reply_to: Option<MessageRecord>,
    image: Option<ImageAttachment>,
}

pub struct ChatSession<S: Storage> {
    store: S,
    config: ChatConfig,
    me: UserRecord,
    contacts: Vec<UserRecord>,
    groups: Vec<GroupRecord>,
    presence: HashMap<UserId, PresenceRecord>,
    selection: Option<Selection>,
    listener: Option<ConversationListener>,
    inbox: Subscription,
    tally: NotificationTally,
    draft: Draft,
    /// Every message seen in a render, for reply previews.
    cache: HashMap<MessageId, MessageRecord>,
    connected: bool,
}

impl<S: Storage> ChatSession<S> {
    /// Opens a session for `user_id`, who must be on the VIP list and known
    /// to the store. Marks the member online.
    pub fn start(store: S, config: ChatConfig, user_id: &UserId) -> Result<Self, ChatError> {
        if !config.is_vip(user_id) {
            tracing::warn!(user_id = %user_id, "chat refused for non-VIP member");
            return Err(ChatError::NotVip(user_id.to_string()));
        }

        let me = {
            let mut tx = store.begin()?;
            let me = tx
                .load_user_by_id(user_id)
                .map_err(|e| not_found_as(e, ChatError::UnknownUser(user_id.to_string())))?;
            tx.commit()?;
            me
        };

        let inbox = store.subscribe_all();
        let mut session = Self {
            store,
            config,
            me,
            contacts: Vec::new(),
            groups: Vec::new(),
            presence: HashMap::new(),
            selection: None,
            listener: None,
            inbox,
            tally: NotificationTally::new(),
            draft: Draft::default(),
            cache: HashMap::new(),
            connected: true,
        };

        session.set_presence(PresenceStatus::Online)?;
        session.refresh_contacts()?;
        session.refresh_groups()?;
        session.refresh_presence()?;

        tracing::info!(
            user_id = %user_id,
            contacts = session.contacts.len(),
            groups = session.groups.len(),
            "chat session started"
        );
        Ok(session)
    }

    fn with_store<T>(
        &self,
        f: impl FnOnce(&mut S::Transaction) -> Result<T, ChatError>,
    ) -> Result<T, ChatError> {
        let mut tx = self.store.begin()?;
        let value = f(&mut tx)?;
        tx.commit()?;
        Ok(value)
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn selected_conversation(&self) -> Option<ConversationId> {
        self.selection
            .as_ref()
            .map(|selection| selection.conversation_id(&self.me.user_id))
    }

    pub fn tally(&self) -> &NotificationTally {
        &self.tally
    }

    pub fn nav_badge(&self) -> Option<String> {
        self.tally.badge_label()
    }

    // -- contacts, groups, presence --

    pub fn refresh_contacts(&mut self) -> Result<(), ChatError> {
        let users = self.with_store(|tx| Ok(tx.load_users()?))?;
        self.contacts = users
            .into_iter()
            .filter(|user| self.config.is_vip(&user.user_id) && user.user_id != self.me.user_id)
            .collect();
        Ok(())
    }

    pub fn refresh_groups(&mut self) -> Result<(), ChatError> {
        let me = self.me.user_id.clone();
        self.groups = self.with_store(|tx| Ok(tx.load_groups_for_member(&me)?))?;

        if let Some(Selection::Group(selected)) = &mut self.selection {
            if let Some(fresh) = self.groups.iter().find(|g| g.group_id == selected.group_id) {
                *selected = fresh.clone();
            }
        }
        Ok(())
    }

    pub fn refresh_presence(&mut self) -> Result<(), ChatError> {
        let records = self.with_store(|tx| Ok(tx.load_presence()?))?;
        self.presence = records
            .into_iter()
            .map(|record| (record.user_id.clone(), record))
            .collect();
        Ok(())
    }

    pub fn status_of(&self, user_id: &UserId) -> PresenceStatus {
        self.presence
            .get(user_id)
            .map(|record| record.status)
            .unwrap_or(PresenceStatus::Offline)
    }

    /// Focus maps to online, blur to idle.
    pub fn set_presence(&mut self, status: PresenceStatus) -> Result<(), ChatError> {
        let me = self.me.user_id.clone();
        let name = self.me.display_name();
        let last_seen = now_millis();
        self.with_store(|tx| Ok(tx.store_presence(&me, status, last_seen, &name)?))?;

        self.presence.insert(
            me.clone(),
            PresenceRecord {
                user_id: me,
                status,
                last_seen,
                name,
            },
        );
        Ok(())
    }

    /// Writes the offline status. Also runs when the session is dropped.
    pub fn disconnect(&mut self) -> Result<(), ChatError> {
        if !self.connected {
            return Ok(());
        }
        self.close_chat();
        self.set_presence(PresenceStatus::Offline)?;
        self.connected = false;
        tracing::info!(user_id = %self.me.user_id, "chat session disconnected");
        Ok(())
    }

    pub fn contacts(&self) -> Vec<ContactView> {
        self.contacts
            .iter()
            .map(|contact| self.contact_view(contact))
            .collect()
    }

    pub fn groups(&self) -> Vec<GroupView> {
        self.groups
            .iter()
            .map(|group| GroupView {
                group_id: group.group_id.to_string(),
                name: group.name.clone(),
                member_count: group.members.len() as u32,
                unread: self.tally.unread(&group.conversation_id()),
                is_admin: group.is_admin(&self.me.user_id),
            })
            .collect()
    }

    fn contact_view(&self, contact: &UserRecord) -> ContactView {
        let status = self.status_of(&contact.user_id);
        ContactView {
            user_id: contact.user_id.to_string(),
            name: contact.display_name(),
            status,
            status_label: status.label().to_string(),
            unread: self
                .tally
                .unread(&ConversationId::direct(&self.me.user_id, &contact.user_id)),
        }
    }

    pub fn sender_name(&self, sender_id: &UserId) -> String {
        if sender_id == &self.me.user_id {
            return self.me.display_name();
        }
        self.contacts
            .iter()
            .find(|contact| &contact.user_id == sender_id)
            .map(UserRecord::display_name)
            .unwrap_or_else(|| fallback_name(sender_id))
    }

    // -- selection --

    /// Opens the direct chat with `user_id`. `now` starts the render delay of
    /// the first snapshot, on the same clock later passed to [`Self::pump`].
    pub fn select_user(&mut self, user_id: &UserId, now: Instant) -> Result<(), ChatError> {
        let contact = self
            .contacts
            .iter()
            .find(|contact| &contact.user_id == user_id)
            .cloned()
            .ok_or_else(|| ChatError::UnknownUser(user_id.to_string()))?;
        self.select(Selection::Direct(contact), now)
    }

    pub fn select_group(&mut self, group_id: &GroupId, now: Instant) -> Result<(), ChatError> {
        let group = self
            .groups
            .iter()
            .find(|group| &group.group_id == group_id)
            .cloned()
            .ok_or_else(|| ChatError::UnknownGroup(group_id.to_string()))?;
        self.select(Selection::Group(group), now)
    }

    fn select(&mut self, selection: Selection, now: Instant) -> Result<(), ChatError> {
        let conversation_id = selection.conversation_id(&self.me.user_id);

        // the old listener detaches before the new one attaches
        self.listener = None;
        self.selection = Some(selection);
        self.tally.clear(&conversation_id);
        self.draft.reply_to = None;

        let subscription = self.store.subscribe(&conversation_id);
        let snapshot = self.with_store(|tx| Ok(tx.load_messages(&conversation_id)?))?;
        let mut throttle = RenderThrottle::new(self.config.render_delay);
        throttle.offer(snapshot, now);

        tracing::debug!(conversation = %conversation_id, "conversation selected");
        self.listener = Some(ConversationListener {
            conversation_id,
            subscription,
            throttle,
        });
        Ok(())
    }

    /// Back to the conversation list: drops the listener and both drafts.
    pub fn close_chat(&mut self) {
        self.listener = None;
        self.selection = None;
        self.draft = Draft::default();
    }

    pub fn header(&self) -> Option<ChatHeader> {
        let header = match self.selection.as_ref()? {
            Selection::Direct(contact) => ChatHeader {
                title: contact.display_name(),
                is_group: false,
                status_line: match self.status_of(&contact.user_id) {
                    PresenceStatus::Online => "Online".to_string(),
                    _ => "Offline".to_string(),
                },
                is_admin: false,
            },
            Selection::Group(group) => ChatHeader {
                title: group.name.clone(),
                is_group: true,
                status_line: format!(
                    "{} members | {} online",
                    group.members.len(),
                    groups::online_count(group, &self.presence)
                ),
                is_admin: group.is_admin(&self.me.user_id),
            },
        };
        Some(header)
    }

    // -- live updates --

    /// Drains change notifications and renders the selected conversation when
    /// its throttled update is due. Returns `None` when nothing is due.
    pub fn pump(&mut self, now: Instant) -> Result<Option<Vec<MessageView>>, ChatError> {
        self.drain_inbox()?;

        let (conversation_id, changed) = match &self.listener {
            Some(listener) => (
                listener.conversation_id.clone(),
                !listener.subscription.drain().is_empty(),
            ),
            None => return Ok(None),
        };

        if changed {
            let snapshot = self.with_store(|tx| Ok(tx.load_messages(&conversation_id)?))?;
            if let Some(listener) = self.listener.as_mut() {
                if !listener.throttle.offer(snapshot, now) {
                    tracing::trace!(conversation = %conversation_id, "update coalesced");
                }
            }
        }

        let flush = match self.listener.as_mut() {
            Some(listener) => listener.throttle.poll(now),
            None => None,
        };
        let Some(flush) = flush else {
            return Ok(None);
        };

        let mut views = self.render(flush.snapshot);
        if flush.refetch {
            let fresh = self.with_store(|tx| Ok(tx.load_messages(&conversation_id)?))?;
            views = self.render(fresh);
        }
        self.mark_read()?;
        Ok(Some(views))
    }

    /// Tallies messages from others outside the selected conversation and
    /// picks up presence changes of any member.
    fn drain_inbox(&mut self) -> Result<(), ChatError> {
        let selected = self.selected_conversation();
        let mut groups_refreshed = false;
        let mut presence_changed = false;

        for event in self.inbox.drain() {
            let sender_id = match &event.kind {
                ChangeKind::PresenceChanged { .. } => {
                    presence_changed = true;
                    continue;
                }
                ChangeKind::MessagesUpdated => continue,
                ChangeKind::MessageAdded { sender_id, .. } => sender_id,
            };
            let Some(conversation_id) = &event.conversation_id else {
                continue;
            };
            if Some(conversation_id) == selected.as_ref() || sender_id == &self.me.user_id {
                continue;
            }

            if !self.is_my_conversation(conversation_id)
                && conversation_id.is_group()
                && !groups_refreshed
            {
                // someone may have added us to a new group
                self.refresh_groups()?;
                groups_refreshed = true;
            }
            if self.is_my_conversation(conversation_id) {
                self.tally.record(conversation_id);
            }
        }

        if presence_changed {
            self.refresh_presence()?;
        }
        Ok(())
    }

    fn is_my_conversation(&self, conversation_id: &ConversationId) -> bool {
        match conversation_id {
            ConversationId::Direct(_) => self.contacts.iter().any(|contact| {
                &ConversationId::direct(&self.me.user_id, &contact.user_id) == conversation_id
            }),
            ConversationId::Group(group_id) => {
                self.groups.iter().any(|group| &group.group_id == group_id)
            }
        }
    }

    /// Turns a message list into views for this viewer. Messages still
    /// visible to someone are cached for later reply previews.
    pub fn render(&mut self, messages: Vec<MessageRecord>) -> Vec<MessageView> {
        for message in &messages {
            if message.deleted_for_everyone {
                self.cache.remove(&message.message_id);
            } else {
                self.cache.insert(message.message_id, message.clone());
            }
        }
        messages
            .iter()
            .filter_map(|message| self.view_of(message))
            .collect()
    }

    fn view_of(&self, message: &MessageRecord) -> Option<MessageView> {
        let me = &self.me.user_id;
        let is_outgoing = &message.sender_id == me;
        let mut view = MessageView {
            message_id: message.message_id.to_string(),
            sender_id: message.sender_id.to_string(),
            is_outgoing,
            sender_label: None,
            segments: Vec::new(),
            image_data_url: None,
            reply: None,
            timestamp: message.timestamp,
            time_label: time_label(message.timestamp),
            seen: None,
            mentions_me: false,
            is_tombstone: false,
        };

        match visibility_for(message, me) {
            Visibility::Hidden => None,
            Visibility::Tombstone => {
                view.is_tombstone = true;
                Some(view)
            }
            Visibility::Visible => {
                view.sender_label = (!is_outgoing).then(|| self.sender_name(&message.sender_id));
                view.segments = highlight(&message.text, &message.mentions)
                    .into_iter()
                    .map(Into::into)
                    .collect();
                view.image_data_url = message.image.as_ref().map(|image| image.data_url.clone());
                view.reply = message
                    .reply_to
                    .as_ref()
                    .and_then(|reply| self.quote_preview(&reply.message_id));
                view.seen = is_outgoing.then_some(message.is_read);
                view.mentions_me = !is_outgoing && mentions_user(&message.mentions, me);
                Some(view)
            }
        }
    }

    fn quote_preview(&self, message_id: &MessageId) -> Option<ReplyPreview> {
        let quoted = self.cache.get(message_id)?;
        if quoted.deleted_for_everyone {
            return None;
        }
        Some(ReplyPreview {
            sender_name: self.sender_name(&quoted.sender_id),
            snippet: reply::preview_text(&quoted.text, QUOTE_PREVIEW_CHARS, IMAGE_LABEL),
        })
    }

    // -- drafts --

    pub fn set_reply_to(&mut self, message_id: &MessageId) -> Result<ReplyPreview, ChatError> {
        let conversation_id = self.selected_conversation().ok_or(ChatError::NoChatSelected)?;
        let message = self
            .cache
            .get(message_id)
            .filter(|message| message.conversation_id == conversation_id)
            .cloned()
            .ok_or_else(|| ChatError::MessageNotFound(message_id.to_string()))?;

        let preview = ReplyPreview {
            sender_name: self.sender_name(&message.sender_id),
            snippet: reply::draft_preview(&message),
        };
        self.draft.reply_to = Some(message);
        Ok(preview)
    }

    pub fn clear_reply(&mut self) {
        self.draft.reply_to = None;
    }

    pub fn attach_image(
        &mut self,
        file_name: &str,
        mime_type: &str,
        bytes: &[u8],
    ) -> Result<(), ChatError> {
        if self.selection.is_none() {
            return Err(ChatError::NoChatSelected);
        }
        let image = images::attach_image(file_name, mime_type, bytes, self.config.max_image_bytes)?;
        self.draft.image = Some(image);
        Ok(())
    }

    pub fn remove_image(&mut self) {
        self.draft.image = None;
    }

    // -- messages --

    pub fn send_message(&mut self, text: &str) -> Result<MessageId, ChatError> {
        let conversation_id = self.selected_conversation().ok_or(ChatError::NoChatSelected)?;
        let text = text.trim();
        if text.is_empty() && self.draft.image.is_none() {
            return Err(ChatError::EmptyMessage);
        }

        let mut message = MessageRecord::new(
            conversation_id.clone(),
            self.me.user_id.clone(),
            self.me.display_name(),
            text.to_string(),
            now_millis(),
        );
        message.mentions = mentions::extract_mentions(text, &self.contacts);
        message.reply_to = self.draft.reply_to.as_ref().map(|quoted| {
            let mut reply = quoted.as_reply_ref();
            if reply.sender_name.is_empty() {
                reply.sender_name = self.sender_name(&quoted.sender_id);
            }
            reply
        });
        message.image = self.draft.image.clone();

        self.with_store(|tx| Ok(tx.store_message(&message)?))?;
        self.draft = Draft::default();

        tracing::info!(
            conversation = %conversation_id,
            message_id = %message.message_id,
            mentions = message.mentions.len(),
            has_image = message.image.is_some(),
            "message sent"
        );
        Ok(message.message_id)
    }

    /// Only the sender may delete a message, for themselves or for everyone.
    pub fn delete_message(&mut self, message_id: &MessageId, scope: DeleteScope) -> Result<(), ChatError> {
        let conversation_id = self.selected_conversation().ok_or(ChatError::NoChatSelected)?;
        let me = self.me.user_id.clone();
        let deleted_at = now_millis();

        self.with_store(|tx| {
            let message = tx
                .load_message(&conversation_id, message_id)
                .map_err(|e| not_found_as(e, ChatError::MessageNotFound(message_id.to_string())))?;
            if message.sender_id != me {
                return Err(ChatError::NotMessageOwner);
            }
            match scope {
                DeleteScope::ForMe => {
                    tx.delete_for_user(&conversation_id, &[*message_id], &me, deleted_at)?
                }
                DeleteScope::ForEveryone => {
                    tx.delete_for_everyone(&conversation_id, message_id, &me, deleted_at)?
                }
            };
            Ok(())
        })?;

        if scope == DeleteScope::ForEveryone {
            self.cache.remove(message_id);
        }
        tracing::info!(conversation = %conversation_id, message_id = %message_id, ?scope, "message deleted");
        Ok(())
    }

    pub fn delete_prompt(&self, message_id: &MessageId) -> Result<String, ChatError> {
        self.cache
            .get(message_id)
            .map(reply::delete_prompt)
            .ok_or_else(|| ChatError::MessageNotFound(message_id.to_string()))
    }

    pub fn delete_warning(&self, scope: DeleteScope) -> &'static str {
        let is_group = matches!(self.selection, Some(Selection::Group(_)));
        scope.warning(is_group)
    }

    /// Hides every message of the selected conversation from this member only.
    pub fn clear_chat(&mut self) -> Result<usize, ChatError> {
        let conversation_id = self.selected_conversation().ok_or(ChatError::NoChatSelected)?;
        let me = self.me.user_id.clone();
        let deleted_at = now_millis();

        let cleared = self.with_store(|tx| {
            let ids: Vec<MessageId> = tx
                .load_messages(&conversation_id)?
                .iter()
                .map(|message| message.message_id)
                .collect();
            Ok(tx.delete_for_user(&conversation_id, &ids, &me, deleted_at)?)
        })?;

        tracing::info!(conversation = %conversation_id, cleared, "chat cleared for member");
        Ok(cleared)
    }

    pub fn mark_read(&mut self) -> Result<usize, ChatError> {
        let Some(conversation_id) = self.selected_conversation() else {
            return Ok(0);
        };
        let me = self.me.user_id.clone();
        self.with_store(|tx| Ok(tx.mark_read(&conversation_id, &me)?))
    }

    // -- mentions --

    /// Who can be picked from the `@` dropdown in the selected conversation.
    pub fn mention_candidates(&self) -> Vec<ContactView> {
        match &self.selection {
            Some(Selection::Direct(contact)) => vec![self.contact_view(contact)],
            Some(Selection::Group(group)) => group
                .members
                .iter()
                .filter(|member| *member != &self.me.user_id)
                .filter_map(|member| self.contacts.iter().find(|c| &c.user_id == member))
                .map(|contact| self.contact_view(contact))
                .collect(),
            None => Vec::new(),
        }
    }

    // -- groups --

    pub fn create_group(
        &mut self,
        name: &str,
        members: &[UserId],
        now: Instant,
    ) -> Result<GroupId, ChatError> {
        let group = groups::new_group(name, &self.me.user_id, members, now_millis())?;
        self.with_store(|tx| Ok(tx.store_group(&group)?))?;

        tracing::info!(group_id = %group.group_id, name = %group.name, members = group.members.len(), "group created");
        let group_id = group.group_id;
        self.groups.push(group.clone());
        self.select(Selection::Group(group), now)?;
        Ok(group_id)
    }

    fn selected_group(&self) -> Result<&GroupRecord, ChatError> {
        match &self.selection {
            Some(Selection::Group(group)) => Ok(group),
            _ => Err(ChatError::NoChatSelected),
        }
    }

    pub fn add_members(&mut self, added: &[UserId]) -> Result<(), ChatError> {
        let group = self.selected_group()?;
        let members = groups::with_added_members(group, &self.me.user_id, added)?;
        let group_id = group.group_id;

        self.with_store(|tx| Ok(tx.update_group_members(&group_id, &members)?))?;
        tracing::info!(group_id = %group_id, added = added.len(), "group members added");
        self.refresh_groups()
    }

    pub fn remove_member(&mut self, member: &UserId) -> Result<(), ChatError> {
        let group = self.selected_group()?;
        let members = groups::without_member(group, &self.me.user_id, member)?;
        let group_id = group.group_id;

        self.with_store(|tx| Ok(tx.update_group_members(&group_id, &members)?))?;
        tracing::info!(group_id = %group_id, member = %member, "group member removed");
        self.refresh_groups()
    }

    /// Contacts who could still be added to the selected group.
    pub fn available_members(&self) -> Vec<ContactView> {
        let Ok(group) = self.selected_group() else {
            return Vec::new();
        };
        self.contacts
            .iter()
            .filter(|contact| !group.is_member(&contact.user_id))
            .map(|contact| self.contact_view(contact))
            .collect()
    }
}

impl<S: Storage> Drop for ChatSession<S> {
    fn drop(&mut self) {
        if let Err(err) = self.disconnect() {
            tracing::warn!(user_id = %self.me.user_id, error = %err, "failed to mark member offline");
        }
    }
}

fn not_found_as(err: StoreError, replacement: ChatError) -> ChatError {
    match err {
        StoreError::NotFound(_) => replacement,
        other => ChatError::Store(other),
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn time_label(timestamp: i64) -> String {
    Local
        .timestamp_millis_opt(timestamp)
        .single()
        .map(|time| time.format("%H:%M").to_string())
        .unwrap_or_default()
}
