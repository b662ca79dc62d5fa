/// Appended to a body snippet that was cut short.
pub const TRUNCATION_SUFFIX: &str = "... <truncated>";

/// First `max_chars` characters of `text`, never splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Display snippet: truncated to `max_chars` with [`TRUNCATION_SUFFIX`] when cut.
pub fn snippet(text: &str, max_chars: usize) -> String {
    let head = truncate_chars(text, max_chars);
    if head.len() < text.len() {
        format!("{head}{TRUNCATION_SUFFIX}")
    } else {
        head.to_string()
    }
}
