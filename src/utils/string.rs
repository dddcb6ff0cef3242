//! String utilities
//!
//! Character-safe truncation for key previews and logged error messages.

/// Truncate a string to at most `max_chars` characters
///
/// Cuts on a character boundary, so multi-byte input never panics.
///
/// # Example
/// ```
/// use tale_key_pool::utils::truncate_str;
///
/// assert_eq!(truncate_str("AIzaSyExampleKey", 8), "AIzaSyEx");
/// assert_eq!(truncate_str("키-프리뷰", 2), "키-");
/// assert_eq!(truncate_str("short", 100), "short");
/// ```
pub fn truncate_str(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Truncate a string and append `suffix` if anything was cut
pub fn truncate_with_suffix(s: &str, max_chars: usize, suffix: &str) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}{}", &s[..idx], suffix),
        None => s.to_string(),
    }
}
