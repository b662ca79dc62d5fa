//! Errors surfaced by the probe library. The CLI wraps these in `anyhow` with context.

use std::path::PathBuf;

use cdp_adapter::AdapterError;
use network_tap::TapError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("{action} failed for {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Tap(#[from] TapError),
    #[error(transparent)]
    Browser(#[from] AdapterError),
    #[error("phase `{phase}` could not be driven: {reason}")]
    Driver { phase: String, reason: String },
}

impl ProbeError {
    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}

pub type ProbeResult<T> = Result<T, ProbeError>;
