//! Small shared helpers: ids, timestamps and text slicing.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current Unix time in milliseconds.
#[must_use]
#[allow(clippy::cast_possible_truncation)] // u64 millis covers ~584 million years
pub fn timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}

/// Generate a unique message id.
#[must_use]
pub fn generate_message_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Truncate a string to at most `max_chars` characters, appending `...` when
/// something was cut.
#[must_use]
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

/// Split text into chunks no longer than `max_len` bytes, preferring line
/// boundaries. Never splits inside a UTF-8 character.
#[must_use]
pub fn split_into_chunks(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len || max_len == 0 {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        if current.len() + line.len() + 1 > max_len {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            // Hard-wrap lines that do not fit on their own
            if line.len() > max_len {
                let mut piece = String::new();
                for ch in line.chars() {
                    if piece.len() + ch.len_utf8() > max_len {
                        chunks.push(std::mem::take(&mut piece));
                    }
                    piece.push(ch);
                }
                if !piece.is_empty() {
                    chunks.push(piece);
                }
                continue;
            }
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}
