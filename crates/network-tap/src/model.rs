//! Records produced by the correlator and carried through aggregation.

use std::collections::BTreeMap;
use std::fmt;

use probe_privacy::redact_headers;
use serde::{Deserialize, Serialize};

pub type Headers = BTreeMap<String, String>;

/// Identifier the browser assigns to one request/response exchange.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExchangeId(pub String);

impl ExchangeId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ExchangeId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl From<String> for ExchangeId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRecord {
    /// Issue order within the originating phase, starting at 1.
    #[serde(alias = "seq")]
    pub sequence: u64,
    pub url: String,
    pub method: String,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_data: Option<String>,
}

impl RequestRecord {
    pub fn redacted(&self) -> Self {
        Self {
            headers: redact_headers(&self.headers),
            ..self.clone()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseRecord {
    pub status: i64,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default)]
    pub mime_type: String,
}

impl ResponseRecord {
    pub fn redacted(&self) -> Self {
        Self {
            headers: redact_headers(&self.headers),
            ..self.clone()
        }
    }
}

/// Everything one interaction phase produced. Immutable once the correlator hands it out.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseSnapshot {
    pub phase: String,
    #[serde(default, alias = "reqs")]
    pub requests: BTreeMap<ExchangeId, RequestRecord>,
    #[serde(default, alias = "resps")]
    pub responses: BTreeMap<ExchangeId, ResponseRecord>,
}

impl PhaseSnapshot {
    pub fn new(phase: impl Into<String>) -> Self {
        Self {
            phase: phase.into(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty() && self.responses.is_empty()
    }

    /// Request ids that never saw a response in this phase.
    pub fn pending(&self) -> impl Iterator<Item = &ExchangeId> {
        self.requests
            .keys()
            .filter(move |id| !self.responses.contains_key(*id))
    }

    pub fn redacted(&self) -> Self {
        Self {
            phase: self.phase.clone(),
            requests: self
                .requests
                .iter()
                .map(|(id, record)| (id.clone(), record.redacted()))
                .collect(),
            responses: self
                .responses
                .iter()
                .map(|(id, record)| (id.clone(), record.redacted()))
                .collect(),
        }
    }
}
