//! User input validation. Runs before any external call is made.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

/// Longest free-text input accepted from a form field.
pub const MAX_QUERY_CHARS: usize = 1000;

/// Longest pasted lyrics accepted by the analysis pages.
pub const MAX_LYRICS_CHARS: usize = 20_000;

static IDENTIFIER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*(\.[A-Za-z_][A-Za-z0-9_$]*){0,2}$").unwrap()
});

/// Trim a free-text query and reject empty or oversized input.
pub fn validate_query(raw: &str) -> Result<String> {
    validate_text(raw, MAX_QUERY_CHARS)
}

/// Same as [`validate_query`] with an explicit character limit.
pub fn validate_text(raw: &str, max_chars: usize) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput("Please enter some text first.".into()));
    }
    let chars = trimmed.chars().count();
    if chars > max_chars {
        return Err(Error::InvalidInput(format!(
            "Input is too long ({} characters, limit {}).",
            chars, max_chars
        )));
    }
    Ok(trimmed.to_string())
}

/// Check a (possibly `db.schema.` qualified) table identifier before it is
/// spliced into SQL text. Identifiers cannot be bound as parameters.
pub fn validate_identifier(name: &str) -> Result<&str> {
    if IDENTIFIER_RE.is_match(name) {
        Ok(name)
    } else {
        Err(Error::Config(format!("Invalid table identifier: {:?}", name)))
    }
}
