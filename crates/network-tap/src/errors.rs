//! Error surface of the engine. Only [`TapError`] is ever returned to callers as a
//! failure; decode and fetch errors are recovered inside the pipeline.

use thiserror::Error;

use crate::rules::ActionKind;

/// A raw log entry that could not be turned into a lifecycle event.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("params is not an object")]
    ParamsNotObject,
    #[error("missing request id")]
    MissingRequestId,
    #[error("missing or non-numeric response status")]
    InvalidStatus,
    #[error("malformed log envelope: {0}")]
    Envelope(String),
}

/// Body retrieval failed; always substituted with an empty body by the fetcher.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("response body unavailable: {0}")]
    Unavailable(String),
    #[error("body source failure: {0}")]
    Source(String),
}

/// The collaborator could not hand over a log batch.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("network log source closed")]
    Closed,
    #[error("network log source failure: {0}")]
    Internal(String),
}

#[derive(Debug, Error)]
pub enum TapError {
    #[error("unknown action `{0}`")]
    UnknownAction(String),
    #[error("invalid pattern `{pattern}` for {action}: {source}")]
    InvalidPattern {
        action: ActionKind,
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("capture dump: {0}")]
    Dump(#[from] serde_json::Error),
}
