//! Normalization of user-written text and media references

use crate::config::MAX_CONTENT_BYTES;

/// Normalized text plus optional media of a comment or post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content {
    pub text: String,
    pub media: Option<String>,
}

impl Content {
    /// Normalize raw input. Returns `None` when both text and media end up
    /// empty, which callers treat as a silent rejection.
    pub fn normalize(text: &str, media: Option<&str>) -> Option<Self> {
        let text = normalize_text(text);
        let media = media
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string);

        if text.is_empty() && media.is_none() {
            return None;
        }

        Some(Self { text, media })
    }
}

/// Trim, drop control characters other than newline and tab, and cap the
/// result at `MAX_CONTENT_BYTES` on a char boundary
pub fn normalize_text(raw: &str) -> String {
    let mut text: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect();

    if text.len() > MAX_CONTENT_BYTES {
        let mut end = MAX_CONTENT_BYTES;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
    }

    text
}
