//! Text validation helpers shared by the post and comment workflows.

use crate::domain::error::DomainError;

/// Maximum characters of post text shown as a page title or listing header.
pub const PREVIEW_CHARS: usize = 30;

/// Validate a required free-text field, returning the trimmed value.
pub fn required_text(field: &'static str, raw: &str) -> Result<String, DomainError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DomainError::empty_field(field));
    }
    Ok(trimmed.to_string())
}

/// First [`PREVIEW_CHARS`] characters of a post body, for titles and logs.
pub fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}

/// Usernames double as URL path segments, so the alphabet is restricted.
pub fn valid_username(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate.len() <= 64
        && candidate
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '.')
}
