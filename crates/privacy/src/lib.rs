//! Redaction applied to every captured exchange before it leaves the engine.
//!
//! The sensitive header set and the replacement marker are fixed. Nothing here is
//! configurable at runtime: a record that crosses the display or persistence boundary
//! has already passed through [`redact_headers`] or [`apply_export`].

pub mod apply;
pub mod errors;
pub mod headers;
pub mod text;

pub use apply::{apply_export, RedactReport};
pub use errors::{PrivacyError, PrivacyResult};
pub use headers::{
    is_sensitive_header, redact_headers, redact_headers_in_place, REDACTED_MARKER,
    SENSITIVE_HEADERS,
};
pub use text::{snippet, truncate_chars, TRUNCATION_SUFFIX};
