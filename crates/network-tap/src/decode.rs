//! Event Log Decoder: raw DevTools log entries to typed lifecycle events.
//!
//! The browser log format is loose and varies between versions, so decoding is
//! best-effort. A malformed entry is dropped and counted; it never aborts the batch.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::DecodeError;
use crate::metrics;
use crate::model::{ExchangeId, Headers};

pub const REQUEST_WILL_BE_SENT: &str = "Network.requestWillBeSent";
pub const RESPONSE_RECEIVED: &str = "Network.responseReceived";

/// One opaque log envelope as emitted by the browser.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawLogEntry {
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl RawLogEntry {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetworkEvent {
    RequestInitiated {
        id: ExchangeId,
        url: String,
        method: String,
        headers: Headers,
        post_data: Option<String>,
    },
    ResponseArrived {
        id: ExchangeId,
        status: i64,
        headers: Headers,
        mime_type: String,
    },
}

impl NetworkEvent {
    pub fn id(&self) -> &ExchangeId {
        match self {
            NetworkEvent::RequestInitiated { id, .. } | NetworkEvent::ResponseArrived { id, .. } => {
                id
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecodeStats {
    pub decoded: usize,
    pub ignored: usize,
    pub dropped: usize,
}

#[derive(Clone, Debug, Default)]
pub struct DecodedBatch {
    pub events: Vec<NetworkEvent>,
    pub stats: DecodeStats,
}

/// Decodes a single entry. `Ok(None)` means the entry is well-formed but not a
/// request/response lifecycle event (e.g. `Network.loadingFinished`).
pub fn decode_entry(entry: &RawLogEntry) -> Result<Option<NetworkEvent>, DecodeError> {
    match entry.method.as_str() {
        REQUEST_WILL_BE_SENT => decode_request(&entry.params).map(Some),
        RESPONSE_RECEIVED => decode_response(&entry.params).map(Some),
        _ => Ok(None),
    }
}

pub fn decode_batch<'a, I>(entries: I) -> DecodedBatch
where
    I: IntoIterator<Item = &'a RawLogEntry>,
{
    let mut batch = DecodedBatch::default();
    for entry in entries {
        match decode_entry(entry) {
            Ok(Some(event)) => {
                batch.stats.decoded += 1;
                batch.events.push(event);
            }
            Ok(None) => batch.stats.ignored += 1,
            Err(err) => {
                batch.stats.dropped += 1;
                debug!(target: "network-tap", method = %entry.method, %err, "dropping malformed log entry");
            }
        }
    }
    metrics::record_decode(&batch.stats);
    batch
}

/// Unwraps a ChromeDriver performance-log line into its inner entry.
///
/// Accepts the doubly wrapped form `{"message": "<json>", ...}` whose string decodes to
/// `{"message": {"method", "params"}, "webview": ...}`, as well as a bare entry.
pub fn unwrap_performance_entry(line: &Value) -> Result<RawLogEntry, DecodeError> {
    if line.get("method").is_some() {
        return parse_entry(line.clone());
    }

    let message = line
        .get("message")
        .ok_or_else(|| DecodeError::Envelope("missing message".into()))?;
    let inner = match message {
        Value::String(raw) => serde_json::from_str::<Value>(raw)
            .map_err(|err| DecodeError::Envelope(err.to_string()))?,
        other => other.clone(),
    };

    match inner.get("message") {
        Some(payload) => parse_entry(payload.clone()),
        None => parse_entry(inner),
    }
}

/// Unwraps every line of a performance log, dropping the ones that do not parse.
pub fn unwrap_performance_log(lines: &[Value]) -> Vec<RawLogEntry> {
    let mut entries = Vec::with_capacity(lines.len());
    let mut dropped = 0usize;
    for line in lines {
        match unwrap_performance_entry(line) {
            Ok(entry) => entries.push(entry),
            Err(err) => {
                dropped += 1;
                debug!(target: "network-tap", %err, "skipping undecodable performance log line");
            }
        }
    }
    if dropped > 0 {
        metrics::record_decode(&DecodeStats {
            dropped,
            ..DecodeStats::default()
        });
    }
    entries
}

fn parse_entry(value: Value) -> Result<RawLogEntry, DecodeError> {
    serde_json::from_value(value).map_err(|err| DecodeError::Envelope(err.to_string()))
}

fn params_object(params: &Value) -> Result<&Map<String, Value>, DecodeError> {
    params.as_object().ok_or(DecodeError::ParamsNotObject)
}

fn request_id(params: &Map<String, Value>) -> Result<ExchangeId, DecodeError> {
    params
        .get("requestId")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(ExchangeId::from)
        .ok_or(DecodeError::MissingRequestId)
}

fn decode_request(params: &Value) -> Result<NetworkEvent, DecodeError> {
    let params = params_object(params)?;
    let id = request_id(params)?;
    let request = params.get("request").and_then(Value::as_object);
    let field = |name: &str| request.and_then(|r| r.get(name));

    Ok(NetworkEvent::RequestInitiated {
        id,
        url: field("url")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        method: field("method")
            .and_then(Value::as_str)
            .unwrap_or("GET")
            .to_string(),
        headers: field("headers").map(decode_headers).unwrap_or_default(),
        post_data: field("postData")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

fn decode_response(params: &Value) -> Result<NetworkEvent, DecodeError> {
    let params = params_object(params)?;
    let id = request_id(params)?;
    let response = params.get("response").and_then(Value::as_object);
    let field = |name: &str| response.and_then(|r| r.get(name));

    let status = field("status")
        .and_then(status_code)
        .ok_or(DecodeError::InvalidStatus)?;

    Ok(NetworkEvent::ResponseArrived {
        id,
        status,
        headers: field("headers").map(decode_headers).unwrap_or_default(),
        mime_type: field("mimeType")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    })
}

// DevTools occasionally reports integral statuses as floats.
fn status_code(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|status| status.fract() == 0.0)
            .map(|status| status as i64)
    })
}

fn decode_headers(value: &Value) -> Headers {
    value
        .as_object()
        .map(|map| {
            map.iter()
                .map(|(name, value)| {
                    let value = match value {
                        Value::String(text) => text.clone(),
                        other => other.to_string(),
                    };
                    (name.clone(), value)
                })
                .collect()
        })
        .unwrap_or_default()
}
