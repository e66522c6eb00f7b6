use crate::libs::core::ids::UserId;
use crate::libs::storage::records::MessageRecord;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    /// Deleted by this viewer only; shown as "This message was deleted".
    Tombstone,
    Hidden,
}

pub fn visibility_for(message: &MessageRecord, viewer: &UserId) -> Visibility {
    if message.deleted_for_everyone {
        Visibility::Hidden
    } else if message.deleted_for.contains(viewer) {
        Visibility::Tombstone
    } else {
        Visibility::Visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::core::ids::ConversationId;

    fn message() -> MessageRecord {
        let alice = UserId::from("00191520");
        let bob = UserId::from("20202020");
        MessageRecord::new(
            ConversationId::direct(&alice, &bob),
            alice,
            "Alice".to_string(),
            "hello".to_string(),
            1_700_000_000_000,
        )
    }

    #[test]
    fn plain_message_is_visible_to_everyone() {
        let message = message();
        assert_eq!(visibility_for(&message, &UserId::from("00191520")), Visibility::Visible);
        assert_eq!(visibility_for(&message, &UserId::from("20202020")), Visibility::Visible);
    }

    #[test]
    fn deleted_for_self_only_affects_the_deleter() {
        let mut message = message();
        message.deleted_for.insert(UserId::from("20202020"));
        assert_eq!(visibility_for(&message, &UserId::from("20202020")), Visibility::Tombstone);
        assert_eq!(visibility_for(&message, &UserId::from("00191520")), Visibility::Visible);
    }

    #[test]
    fn deleted_for_everyone_is_hidden_from_all() {
        let mut message = message();
        message.deleted_for.insert(UserId::from("20202020"));
        message.deleted_for_everyone = true;
        for viewer in ["00191520", "20202020", "59200311"] {
            assert_eq!(visibility_for(&message, &UserId::from(viewer)), Visibility::Hidden);
        }
    }
}
