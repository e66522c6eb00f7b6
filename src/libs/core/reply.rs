use crate::libs::storage::records::MessageRecord;

pub const QUOTE_PREVIEW_CHARS: usize = 50;
pub const DRAFT_PREVIEW_CHARS: usize = 100;
pub const IMAGE_LABEL: &str = "📷 Image";

/// First `limit` characters of `text`, with `...` appended when cut.
pub fn snippet(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Snippet, or `empty_label` when the message has no text.
pub fn preview_text(text: &str, limit: usize, empty_label: &str) -> String {
    if text.is_empty() {
        empty_label.to_string()
    } else {
        snippet(text, limit)
    }
}

/// Text for the "Replying to" bar above the input.
pub fn draft_preview(message: &MessageRecord) -> String {
    preview_text(&message.text, DRAFT_PREVIEW_CHARS, IMAGE_LABEL)
}

/// Question shown before deleting a message.
pub fn delete_prompt(message: &MessageRecord) -> String {
    format!(
        "Are you sure you want to delete \"{}\"?",
        preview_text(&message.text, DRAFT_PREVIEW_CHARS, "this image")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(snippet("hello", 50), "hello");
        assert_eq!(snippet(&"a".repeat(50), 50), "a".repeat(50));
    }

    #[test]
    fn long_text_is_cut_on_char_boundary() {
        let text = "ক".repeat(60);
        let cut = snippet(&text, 50);
        assert_eq!(cut.chars().count(), 53);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn empty_text_uses_label() {
        assert_eq!(preview_text("", 50, IMAGE_LABEL), IMAGE_LABEL);
        assert_eq!(preview_text("", 100, "this image"), "this image");
    }
}
