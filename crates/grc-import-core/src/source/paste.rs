//! Pasted text or HTML.

use std::sync::LazyLock;

use regex::Regex;

use crate::source::SourceError;

static TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"</?[a-zA-Z][a-zA-Z0-9-]*(?:\s[^<>]*)?/?>").expect("tag pattern is valid")
});

/// Pasted content, classified by whether it looks like markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pasted {
    /// Plain text.
    Text(String),
    /// HTML markup.
    Html(String),
}

/// Accepts pasted input of at least `min_len` non-blank characters.
///
/// # Errors
///
/// Returns [`SourceError::InputTooShort`] if the trimmed input is shorter
/// than `min_len` characters.
pub fn read_paste(input: &str, min_len: usize) -> Result<Pasted, SourceError> {
    let trimmed = input.trim();
    let len = trimmed.chars().count();
    if len < min_len {
        return Err(SourceError::InputTooShort { len, min: min_len });
    }

    if TAG.is_match(trimmed) {
        Ok(Pasted::Html(trimmed.to_string()))
    } else {
        Ok(Pasted::Text(trimmed.to_string()))
    }
}
