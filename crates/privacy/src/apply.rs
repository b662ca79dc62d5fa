use crate::errors::{PrivacyError, PrivacyResult};
use crate::headers::{is_sensitive_header, REDACTED_MARKER};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct RedactReport {
    pub applied: bool,
    pub fields: Vec<String>,
}

impl RedactReport {
    fn from_fields(fields: Vec<String>) -> Self {
        Self {
            applied: !fields.is_empty(),
            fields,
        }
    }
}

/// Redacts every `headers` object found anywhere inside an export payload.
///
/// Applied to serialized dumps right before they are written, so payloads assembled
/// outside the typed model still cannot carry credentials to disk.
pub fn apply_export(value: &mut JsonValue) -> PrivacyResult<RedactReport> {
    if !(value.is_object() || value.is_array()) {
        return Err(PrivacyError::Unsupported("export root must be an object or array"));
    }
    let mut affected = Vec::new();
    redact_value(String::new(), value, &mut affected);
    Ok(RedactReport::from_fields(affected))
}

fn redact_value(path: String, value: &mut JsonValue, affected: &mut Vec<String>) {
    match value {
        JsonValue::Object(map) => {
            for (key, val) in map.iter_mut() {
                let nested_path = if path.is_empty() {
                    key.to_string()
                } else {
                    format!("{}.{}", path, key)
                };
                if key.eq_ignore_ascii_case("headers") {
                    if let JsonValue::Object(headers) = val {
                        for (name, header) in headers.iter_mut() {
                            if is_sensitive_header(name) {
                                *header = JsonValue::String(REDACTED_MARKER.to_string());
                                affected.push(format!("{}.{}", nested_path, name));
                            }
                        }
                        continue;
                    }
                }
                redact_value(nested_path, val, affected);
            }
        }
        JsonValue::Array(items) => {
            for (idx, item) in items.iter_mut().enumerate() {
                let nested_path = if path.is_empty() {
                    format!("[{}]", idx)
                } else {
                    format!("{}[{}]", path, idx)
                };
                redact_value(nested_path, item, affected);
            }
        }
        _ => {}
    }
}
