//! `@name` handling: extracting mentions from outgoing text, splitting stored
//! text into highlighted segments, and inserting a mention at the cursor.

use crate::libs::core::ids::UserId;
use crate::libs::core::models::Mention;
use crate::libs::storage::records::UserRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static MENTION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@([A-Za-z0-9_]+)").expect("mention pattern is valid"));

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    Plain(String),
    Mention(String),
}

/// Resolves every `@token` in `text` against `contacts`.
///
/// A token matches the first contact whose display name or username contains
/// it, ignoring case. Each contact is reported once, in order of first match.
pub fn extract_mentions(text: &str, contacts: &[UserRecord]) -> Vec<Mention> {
    let mut mentions = Vec::new();
    let mut seen: HashSet<&UserId> = HashSet::new();

    for capture in MENTION_PATTERN.captures_iter(text) {
        let token = capture[1].to_lowercase();
        let matched = contacts.iter().find(|contact| {
            contact.display_name().to_lowercase().contains(&token)
                || contact
                    .username
                    .as_deref()
                    .is_some_and(|username| username.to_lowercase().contains(&token))
        });

        if let Some(contact) = matched {
            if seen.insert(&contact.user_id) {
                mentions.push(Mention {
                    user_id: contact.user_id.clone(),
                    name: contact.display_name(),
                });
            }
        }
    }

    mentions
}

/// Splits `text` so that each `@name` of a recorded mention becomes its own
/// segment.
pub fn highlight(text: &str, mentions: &[Mention]) -> Vec<Segment> {
    let needles: Vec<String> = mentions
        .iter()
        .filter(|mention| !mention.name.is_empty())
        .map(|mention| format!("@{}", mention.name))
        .collect();

    let mut segments = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        // earliest occurrence wins, longest name on a tie
        let next = needles
            .iter()
            .filter_map(|needle| rest.find(needle.as_str()).map(|at| (at, needle)))
            .min_by(|(a_at, a), (b_at, b)| a_at.cmp(b_at).then(b.len().cmp(&a.len())));

        match next {
            Some((at, needle)) => {
                if at > 0 {
                    push_plain(&mut segments, &rest[..at]);
                }
                segments.push(Segment::Mention(needle[1..].to_string()));
                rest = &rest[at + needle.len()..];
            }
            None => {
                push_plain(&mut segments, rest);
                break;
            }
        }
    }

    segments
}

fn push_plain(segments: &mut Vec<Segment>, text: &str) {
    if let Some(Segment::Plain(previous)) = segments.last_mut() {
        previous.push_str(text);
    } else {
        segments.push(Segment::Plain(text.to_string()));
    }
}

pub fn mentions_user(mentions: &[Mention], user_id: &UserId) -> bool {
    mentions.iter().any(|mention| &mention.user_id == user_id)
}

/// Inserts `@name ` at byte offset `cursor`, completing a partially typed
/// `@token` directly before the cursor. Returns the new text and cursor.
pub fn insert_mention(input: &str, cursor: usize, name: &str) -> (String, usize) {
    let mut cursor = cursor.min(input.len());
    while !input.is_char_boundary(cursor) {
        cursor -= 1;
    }

    let (before, after) = input.split_at(cursor);
    let inserted = format!("@{} ", name);

    let start = match before.rfind('@') {
        Some(at) if !before[at + 1..].contains(' ') => at,
        _ => cursor,
    };

    let text = format!("{}{}{}", &before[..start], inserted, after);
    (text, start + inserted.len())
}

/// Byte offset of the UTF-16 index `units`, as text fields on the front end
/// report their cursor. Clamped to the end of `text`; an index inside a
/// surrogate pair resolves to the start of that character.
pub fn byte_offset_of_utf16(text: &str, units: usize) -> usize {
    let mut seen = 0;
    for (at, ch) in text.char_indices() {
        if seen + ch.len_utf16() > units {
            return at;
        }
        seen += ch.len_utf16();
    }
    text.len()
}

/// UTF-16 index of the byte offset `byte` in `text`.
pub fn utf16_offset_of_byte(text: &str, byte: usize) -> usize {
    text.char_indices()
        .take_while(|(at, _)| *at < byte)
        .map(|(_, ch)| ch.len_utf16())
        .sum()
}
