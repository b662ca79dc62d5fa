use std::fmt;

use network_tap::{FetchError, SourceError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// High-level error categories surfaced by the adapter.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdapterErrorKind {
    #[error("browser launch failed")]
    Launch,
    #[error("cdp i/o failure")]
    CdpIo,
    #[error("cdp command rejected")]
    Protocol,
    #[error("cdp command timed out")]
    Timeout,
    #[error("invalid url")]
    InvalidUrl,
    #[error("internal error")]
    Internal,
}

/// Error plus the context a caller needs to report or retry it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdapterError {
    pub kind: AdapterErrorKind,
    pub hint: Option<String>,
    pub retriable: bool,
    pub data: Option<serde_json::Value>,
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(hint) = &self.hint {
            write!(f, ": {}", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for AdapterError {}

impl AdapterError {
    pub fn new(kind: AdapterErrorKind) -> Self {
        Self {
            kind,
            hint: None,
            retriable: false,
            data: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn retriable(mut self, flag: bool) -> Self {
        self.retriable = flag;
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

// A rejected getResponseBody means the body is gone; anything else is the transport.
impl From<AdapterError> for FetchError {
    fn from(err: AdapterError) -> Self {
        match err.kind {
            AdapterErrorKind::Protocol => FetchError::Unavailable(err.to_string()),
            _ => FetchError::Source(err.to_string()),
        }
    }
}

impl From<AdapterError> for SourceError {
    fn from(err: AdapterError) -> Self {
        SourceError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_hint() {
        let err = AdapterError::new(AdapterErrorKind::Timeout).with_hint("Page.navigate");
        assert_eq!(err.to_string(), "cdp command timed out: Page.navigate");
    }

    #[test]
    fn protocol_rejection_maps_to_unavailable_body() {
        let rejected = AdapterError::new(AdapterErrorKind::Protocol).with_hint("no resource");
        assert!(matches!(FetchError::from(rejected), FetchError::Unavailable(_)));
        let io = AdapterError::new(AdapterErrorKind::CdpIo);
        assert!(matches!(FetchError::from(io), FetchError::Source(_)));
    }
}
