mod common;

use crate::common::*;
use fanclub_chat_lib::libs::config::ChatConfig;
use fanclub_chat_lib::libs::core::ids::{ConversationId, MessageId, UserId};
use fanclub_chat_lib::libs::core::models::{DeleteScope, PresenceStatus};
use fanclub_chat_lib::libs::core::session::ChatSession;
use fanclub_chat_lib::libs::storage::database::storage_sqllite::SqliteStore;
use fanclub_chat_lib::libs::uniffi::models::{MessageView, ReplyPreview, TextSegment};
use fanclub_chat_lib::ChatError;
use std::time::{Duration, Instant};

fn render(session: &mut ChatSession<SqliteStore>) -> Vec<MessageView> {
    session
        .pump(Instant::now())
        .expect("Failed to pump session")
        .expect("A render should be due")
}

fn texts(views: &[MessageView]) -> Vec<String> {
    views.iter().map(MessageView::plain_text).collect()
}

#[test]
fn test_only_vip_members_can_start() {
    let db = setup_seeded_db();

    let outsider = ChatSession::start(db.store.clone(), test_config(), &UserId::from(OUTSIDER));
    assert!(matches!(outsider, Err(ChatError::NotVip(_))));

    let unknown = ChatSession::start(db.store.clone(), test_config(), &UserId::from("00192621"));
    assert!(matches!(unknown, Err(ChatError::UnknownUser(_))));
}

#[test]
fn test_contacts_exclude_self_and_non_vip() {
    let db = setup_seeded_db();
    let alice = db.session(ALICE);

    let contacts = alice.contacts();
    let names: Vec<&str> = contacts.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Bob", "carol"]);
    assert!(contacts
        .iter()
        .all(|contact| contact.status == PresenceStatus::Offline));
    assert_eq!(alice.status_of(&UserId::from(ALICE)), PresenceStatus::Online);
}

#[test]
fn test_direct_message_flow_with_read_receipts() {
    let db = setup_seeded_db();
    let mut alice = db.session(ALICE);
    let mut bob = db.session(BOB);

    alice.select_user(&UserId::from(BOB), Instant::now()).expect("Failed to select Bob");
    assert!(render(&mut alice).is_empty());
    bob.select_user(&UserId::from(ALICE), Instant::now()).expect("Failed to select Alice");
    assert!(render(&mut bob).is_empty());

    alice.send_message("  Hi @Bob  ").expect("Failed to send");

    let sent = render(&mut alice);
    assert_eq!(sent.len(), 1);
    assert!(sent[0].is_outgoing);
    assert_eq!(sent[0].sender_label, None);
    assert_eq!(sent[0].seen, Some(false));
    assert!(!sent[0].mentions_me);

    let received = render(&mut bob);
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].sender_label.as_deref(), Some("Alice"));
    assert_eq!(received[0].seen, None);
    assert!(received[0].mentions_me);
    assert_eq!(
        received[0].segments,
        vec![
            TextSegment::Plain {
                text: "Hi ".to_string()
            },
            TextSegment::Mention {
                name: "Bob".to_string()
            },
        ]
    );
    assert_eq!(bob.nav_badge(), None, "Open conversation is not tallied");

    // Bob's render marked the message read
    let seen = render(&mut alice);
    assert_eq!(seen[0].seen, Some(true));
}

#[test]
fn test_selecting_conversation_clears_unread() {
    let db = setup_seeded_db();
    let mut alice = db.session(ALICE);
    let mut bob = db.session(BOB);

    alice.select_user(&UserId::from(BOB), Instant::now()).expect("Failed to select Bob");
    alice.send_message("one").expect("Failed to send");
    alice.send_message("two").expect("Failed to send");

    assert_eq!(bob.pump(Instant::now()).expect("Failed to pump"), None);
    let direct = ConversationId::direct(&UserId::from(ALICE), &UserId::from(BOB));
    assert_eq!(bob.tally().unread(&direct), 2);
    assert_eq!(bob.nav_badge().as_deref(), Some("2"));
    let alice_contact = bob
        .contacts()
        .into_iter()
        .find(|contact| contact.user_id == ALICE)
        .expect("Alice should be a contact");
    assert_eq!(alice_contact.unread, 2);

    // own messages are never tallied
    alice.pump(Instant::now()).expect("Failed to pump");
    assert_eq!(alice.nav_badge(), None);

    bob.select_user(&UserId::from(ALICE), Instant::now()).expect("Failed to select Alice");
    assert_eq!(bob.tally().unread(&direct), 0);
    assert_eq!(bob.nav_badge(), None);
    assert_eq!(texts(&render(&mut bob)), vec!["one", "two"]);
}

#[test]
fn test_nav_badge_caps_at_99() {
    let db = setup_seeded_db();
    let mut alice = db.session(ALICE);
    let mut bob = db.session(BOB);

    alice.select_user(&UserId::from(BOB), Instant::now()).expect("Failed to select Bob");
    for n in 0..100 {
        alice.send_message(&format!("spam {}", n)).expect("Failed to send");
    }
    bob.pump(Instant::now()).expect("Failed to pump");
    assert_eq!(bob.nav_badge().as_deref(), Some("99+"));
}

#[test]
fn test_deleted_for_everyone_never_renders() {
    let db = setup_seeded_db();
    let mut alice = db.session(ALICE);
    let mut bob = db.session(BOB);

    alice.select_user(&UserId::from(BOB), Instant::now()).expect("Failed to select Bob");
    let oops = alice.send_message("oops").expect("Failed to send");
    alice.send_message("keep").expect("Failed to send");
    bob.select_user(&UserId::from(ALICE), Instant::now()).expect("Failed to select Alice");
    assert_eq!(texts(&render(&mut bob)), vec!["oops", "keep"]);

    assert!(matches!(
        bob.delete_message(&oops, DeleteScope::ForEveryone),
        Err(ChatError::NotMessageOwner)
    ));

    alice
        .delete_message(&oops, DeleteScope::ForEveryone)
        .expect("Failed to delete");

    let bob_view = render(&mut bob);
    assert_eq!(texts(&bob_view), vec!["keep"]);
    assert!(bob_view.iter().all(|view| !view.is_tombstone));

    let alice_view = render(&mut alice);
    assert_eq!(texts(&alice_view), vec!["keep"]);
    assert!(matches!(
        alice.delete_prompt(&oops),
        Err(ChatError::MessageNotFound(_))
    ));
}

#[test]
fn test_delete_for_me_leaves_tombstone() {
    let db = setup_seeded_db();
    let mut alice = db.session(ALICE);
    let mut bob = db.session(BOB);

    alice.select_user(&UserId::from(BOB), Instant::now()).expect("Failed to select Bob");
    let oops = alice.send_message("oops").expect("Failed to send");
    render(&mut alice);

    assert_eq!(
        alice.delete_prompt(&oops).expect("Prompt for cached message"),
        "Are you sure you want to delete \"oops\"?"
    );
    assert_eq!(
        alice.delete_warning(DeleteScope::ForEveryone),
        "This message will be deleted for both you and the recipient."
    );

    alice
        .delete_message(&oops, DeleteScope::ForMe)
        .expect("Failed to delete");
    let view = render(&mut alice);
    assert_eq!(view.len(), 1);
    assert!(view[0].is_tombstone);
    assert!(view[0].segments.is_empty());

    bob.select_user(&UserId::from(ALICE), Instant::now()).expect("Failed to select Alice");
    assert_eq!(texts(&render(&mut bob)), vec!["oops"]);

    assert!(matches!(
        alice.delete_message(&MessageId::generate(), DeleteScope::ForMe),
        Err(ChatError::MessageNotFound(_))
    ));
}

#[test]
fn test_clear_chat_hides_history_for_me_only() {
    let db = setup_seeded_db();
    let mut alice = db.session(ALICE);
    let mut bob = db.session(BOB);

    assert!(matches!(alice.clear_chat(), Err(ChatError::NoChatSelected)));

    alice.select_user(&UserId::from(BOB), Instant::now()).expect("Failed to select Bob");
    bob.select_user(&UserId::from(ALICE), Instant::now()).expect("Failed to select Alice");
    alice.send_message("first").expect("Failed to send");
    bob.send_message("second").expect("Failed to send");

    assert_eq!(alice.clear_chat().expect("Failed to clear"), 2);
    let cleared = render(&mut alice);
    assert_eq!(cleared.len(), 2);
    assert!(cleared.iter().all(|view| view.is_tombstone));

    assert_eq!(texts(&render(&mut bob)), vec!["first", "second"]);
}

#[test]
fn test_reply_quotes_original() {
    let db = setup_seeded_db();
    let mut alice = db.session(ALICE);
    let mut bob = db.session(BOB);

    alice.select_user(&UserId::from(BOB), Instant::now()).expect("Failed to select Bob");
    let long = random_text(80);
    let question = alice.send_message(&long).expect("Failed to send");

    bob.select_user(&UserId::from(ALICE), Instant::now()).expect("Failed to select Alice");
    render(&mut bob);

    let draft = bob.set_reply_to(&question).expect("Failed to set reply");
    assert_eq!(draft.sender_name, "Alice");
    assert_eq!(draft.snippet, long, "Draft preview allows 100 characters");

    bob.send_message("At the park").expect("Failed to send");
    bob.send_message("no quote").expect("Failed to send");

    let views = render(&mut bob);
    assert_eq!(views.len(), 3);
    assert_eq!(
        views[1].reply,
        Some(ReplyPreview {
            sender_name: "Alice".to_string(),
            snippet: format!("{}...", &long[..50]),
        })
    );
    assert_eq!(views[2].reply, None, "Reply draft clears after sending");

    assert!(matches!(
        bob.set_reply_to(&MessageId::generate()),
        Err(ChatError::MessageNotFound(_))
    ));
}

#[test]
fn test_image_messages() {
    let db = setup_seeded_db();
    let mut alice = db.session(ALICE);

    assert!(matches!(
        alice.attach_image("poster.png", "image/png", b"\x89PNG"),
        Err(ChatError::NoChatSelected)
    ));

    alice.select_user(&UserId::from(CAROL), Instant::now()).expect("Failed to select Carol");
    assert!(matches!(alice.send_message("   "), Err(ChatError::EmptyMessage)));
    assert!(matches!(
        alice.attach_image("notes.txt", "text/plain", b"hello"),
        Err(ChatError::NotAnImage(_))
    ));
    let too_big = vec![0u8; 5 * 1024 * 1024 + 1];
    assert!(matches!(
        alice.attach_image("huge.png", "image/png", &too_big),
        Err(ChatError::ImageTooLarge { .. })
    ));

    alice
        .attach_image("poster.png", "image/png", b"\x89PNG")
        .expect("Failed to attach image");
    let image = alice.send_message("").expect("Image alone can be sent");

    let views = render(&mut alice);
    assert_eq!(
        views[0].image_data_url.as_deref(),
        Some("data:image/png;base64,iVBORw==")
    );
    assert_eq!(
        alice.set_reply_to(&image).expect("Failed to set reply").snippet,
        "📷 Image"
    );
    assert_eq!(
        alice.delete_prompt(&image).expect("Prompt for cached message"),
        "Are you sure you want to delete \"this image\"?"
    );

    // the attachment was consumed by the send
    assert!(matches!(alice.send_message(""), Err(ChatError::EmptyMessage)));
}

#[test]
fn test_render_throttle_coalesces_bursts() {
    let db = setup_seeded_db();
    let config = ChatConfig {
        render_delay: Duration::from_millis(100),
        ..ChatConfig::default()
    };
    let mut alice = ChatSession::start(db.store.clone(), config, &UserId::from(ALICE))
        .expect("Failed to start session");
    let mut bob = db.session(BOB);

    let start = Instant::now();
    alice.select_user(&UserId::from(BOB), start).expect("Failed to select Bob");
    assert_eq!(alice.pump(start).expect("Failed to pump"), None);

    bob.select_user(&UserId::from(ALICE), Instant::now()).expect("Failed to select Alice");
    for text in ["a", "b", "c"] {
        bob.send_message(text).expect("Failed to send");
    }
    assert_eq!(alice.pump(start).expect("Failed to pump"), None);
    assert_eq!(
        alice
            .pump(start + Duration::from_millis(99))
            .expect("Failed to pump"),
        None,
        "The selection time starts the delay"
    );

    let flushed = alice
        .pump(start + Duration::from_millis(100))
        .expect("Failed to pump")
        .expect("Delayed render should flush");
    assert_eq!(texts(&flushed), vec!["a", "b", "c"]);

    assert_eq!(
        alice
            .pump(start + Duration::from_millis(150))
            .expect("Failed to pump"),
        None
    );
}

#[test]
fn test_group_administration() {
    let db = setup_seeded_db();
    let mut alice = db.session(ALICE);
    let mut bob = db.session(BOB);

    assert!(matches!(
        alice.create_group("   ", &[UserId::from(BOB)], Instant::now()),
        Err(ChatError::EmptyGroupName)
    ));
    assert!(matches!(
        alice.create_group("Poster Team", &[], Instant::now()),
        Err(ChatError::NoGroupMembers)
    ));

    alice.pump(Instant::now()).expect("Failed to pump");

    let group_id = alice
        .create_group("Poster Team", &[UserId::from(BOB)], Instant::now())
        .expect("Failed to create group");
    let header = alice.header().expect("New group is selected");
    assert_eq!(header.title, "Poster Team");
    assert!(header.is_group && header.is_admin);
    assert_eq!(header.status_line, "2 members | 2 online");

    let available: Vec<String> = alice
        .available_members()
        .into_iter()
        .map(|contact| contact.user_id)
        .collect();
    assert_eq!(available, vec![CAROL.to_string()]);

    assert!(matches!(alice.add_members(&[]), Err(ChatError::NoMembersSelected)));
    alice
        .add_members(&[UserId::from(CAROL)])
        .expect("Failed to add Carol");
    assert_eq!(
        alice.header().map(|header| header.status_line).as_deref(),
        Some("3 members | 2 online")
    );
    assert_eq!(alice.mention_candidates().len(), 2);

    bob.refresh_groups().expect("Failed to refresh groups");
    let bob_groups = bob.groups();
    assert_eq!(bob_groups.len(), 1);
    assert!(!bob_groups[0].is_admin);
    bob.select_group(&group_id, Instant::now()).expect("Failed to select group");
    assert!(matches!(
        bob.add_members(&[UserId::from(CAROL)]),
        Err(ChatError::NotGroupAdmin)
    ));
    assert!(matches!(
        bob.remove_member(&UserId::from(CAROL)),
        Err(ChatError::NotGroupAdmin)
    ));

    assert!(matches!(
        alice.remove_member(&UserId::from(ALICE)),
        Err(ChatError::CannotRemoveAdmin)
    ));
    alice
        .remove_member(&UserId::from(BOB))
        .expect("Failed to remove Bob");
    assert_eq!(alice.groups()[0].member_count, 2);

    bob.refresh_groups().expect("Failed to refresh groups");
    assert!(bob.groups().is_empty());
}

#[test]
fn test_group_messages_reach_members() {
    let db = setup_seeded_db();
    let mut alice = db.session(ALICE);
    let mut carol = db.session(CAROL);

    let group_id = alice
        .create_group("Poster Team", &[UserId::from(BOB), UserId::from(CAROL)], Instant::now())
        .expect("Failed to create group");
    assert_eq!(
        alice.delete_warning(DeleteScope::ForEveryone),
        "This message will be deleted for all group members."
    );
    alice.send_message("Welcome @carol").expect("Failed to send");

    // Carol started before the group existed
    carol.pump(Instant::now()).expect("Failed to pump");
    let groups = carol.groups();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].unread, 1);

    carol.select_group(&group_id, Instant::now()).expect("Failed to select group");
    let views = render(&mut carol);
    assert_eq!(views[0].sender_label.as_deref(), Some("Alice"));
    assert!(views[0].mentions_me);
    assert_eq!(carol.groups()[0].unread, 0);
}

#[test]
fn test_presence_follows_sessions() {
    let db = setup_seeded_db();
    let mut alice = db.session(ALICE);
    alice
        .select_user(&UserId::from(BOB), Instant::now())
        .expect("Failed to select Bob");

    let status_line = |alice: &ChatSession<SqliteStore>| {
        alice.header().map(|header| header.status_line)
    };
    assert_eq!(status_line(&alice).as_deref(), Some("Offline"));

    let mut bob = db.session(BOB);
    alice.pump(Instant::now()).expect("Failed to pump");
    assert_eq!(status_line(&alice).as_deref(), Some("Online"));
    let bob_contact = alice
        .contacts()
        .into_iter()
        .find(|contact| contact.user_id == BOB)
        .expect("Bob should be a contact");
    assert_eq!(bob_contact.status, PresenceStatus::Online);

    bob.set_presence(PresenceStatus::Idle).expect("Failed to set idle");
    alice.pump(Instant::now()).expect("Failed to pump");
    assert_eq!(alice.status_of(&UserId::from(BOB)), PresenceStatus::Idle);
    assert_eq!(status_line(&alice).as_deref(), Some("Offline"));

    bob.set_presence(PresenceStatus::Online).expect("Failed to set online");
    drop(bob);
    alice.pump(Instant::now()).expect("Failed to pump");
    assert_eq!(alice.status_of(&UserId::from(BOB)), PresenceStatus::Offline);

    alice.disconnect().expect("Failed to disconnect");
    assert!(alice.selection().is_none());
}

#[test]
fn test_group_online_count_is_live() {
    let db = setup_seeded_db();
    let mut alice = db.session(ALICE);
    alice
        .create_group(
            "Poster Team",
            &[UserId::from(BOB), UserId::from(CAROL)],
            Instant::now(),
        )
        .expect("Failed to create group");
    let status_line = |alice: &ChatSession<SqliteStore>| {
        alice.header().map(|header| header.status_line)
    };
    assert_eq!(status_line(&alice).as_deref(), Some("3 members | 1 online"));

    let carol = db.session(CAROL);
    alice.pump(Instant::now()).expect("Failed to pump");
    assert_eq!(status_line(&alice).as_deref(), Some("3 members | 2 online"));

    drop(carol);
    alice.pump(Instant::now()).expect("Failed to pump");
    assert_eq!(status_line(&alice).as_deref(), Some("3 members | 1 online"));
}
