//! Character-based length checks for user supplied text.
//!
//! Lengths are counted in `char`s, never bytes, so multi-byte input is
//! measured the way users see it.

pub fn char_len(value: &str) -> usize {
    value.chars().count()
}

/// Trims `value` and checks that its length lies within `min..=max`.
/// Returns the trimmed string, or a message naming `field`.
pub fn bounded(field: &str, value: &str, min: usize, max: usize) -> Result<String, String> {
    let trimmed = value.trim();
    let len = char_len(trimmed);
    if len < min || len > max {
        if min <= 1 {
            if len == 0 {
                return Err(format!("{field} is required"));
            }
            return Err(format!("{field} must be at most {max} characters"));
        }
        return Err(format!(
            "{field} must be between {min} and {max} characters (got {len})"
        ));
    }
    Ok(trimmed.to_string())
}

/// Like [`bounded`] for optional fields: blank input becomes `None`.
pub fn optional_bounded(field: &str, value: Option<&str>, max: usize) -> Result<Option<String>, String> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => bounded(field, v, 1, max).map(Some),
    }
}

/// Cuts `value` to at most `max` chars without splitting a code point.
pub fn truncate_chars(value: &str, max: usize) -> &str {
    match value.char_indices().nth(max) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}
