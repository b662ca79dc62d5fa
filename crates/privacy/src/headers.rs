use std::collections::BTreeMap;

/// Replacement value written over every sensitive header.
pub const REDACTED_MARKER: &str = "<redacted>";

/// Header names (lowercase) whose values never leave the engine.
pub const SENSITIVE_HEADERS: [&str; 4] = ["cookie", "authorization", "x-csrf-token", "x-xsrf-token"];

pub fn is_sensitive_header(name: &str) -> bool {
    SENSITIVE_HEADERS
        .iter()
        .any(|sensitive| sensitive.eq_ignore_ascii_case(name))
}

/// Returns a copy of `headers` with sensitive values replaced by [`REDACTED_MARKER`].
pub fn redact_headers(headers: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            let value = if is_sensitive_header(name) {
                REDACTED_MARKER.to_string()
            } else {
                value.clone()
            };
            (name.clone(), value)
        })
        .collect()
}

/// Redacts in place and returns the names that were masked.
pub fn redact_headers_in_place(headers: &mut BTreeMap<String, String>) -> Vec<String> {
    let mut masked = Vec::new();
    for (name, value) in headers.iter_mut() {
        if is_sensitive_header(name) {
            *value = REDACTED_MARKER.to_string();
            masked.push(name.clone());
        }
    }
    masked
}
