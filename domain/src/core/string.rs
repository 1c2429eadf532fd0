//! String helpers

/// Truncate a string to at most `max_chars` characters, appending an
/// ellipsis when content was cut. Safe on multi-byte UTF-8 input.
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let cut: String = s.chars().take(max_chars).collect();
    format!("{}...", cut)
}
