//! Network log recorder for one observed tab.
//!
//! [`NetworkRecorder::attach`] opens a fresh tab, attaches a flat session to it and
//! enables the Network domain. A background pump copies that session's `Network.*`
//! events into a buffer; each [`NetworkLogSource::drain_log`] call hands the buffer
//! over and starts a new one, which gives the engine exactly one batch per phase.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use network_tap::{BodySource, ExchangeId, FetchError, FetchedBody, NetworkLogSource, RawLogEntry, SourceError};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};
use url::Url;

use crate::error::{AdapterError, AdapterErrorKind};
use crate::transport::{CdpTransport, CommandTarget};

/// Upper bound on the request body Chrome attaches to `requestWillBeSent`.
const MAX_POST_DATA_SIZE: u64 = 64 * 1024;

pub struct NetworkRecorder {
    transport: Arc<dyn CdpTransport>,
    target_id: String,
    session_id: String,
    buffer: Arc<Mutex<Vec<RawLogEntry>>>,
    closed: Arc<AtomicBool>,
    pump: JoinHandle<()>,
}

impl NetworkRecorder {
    pub async fn attach(transport: Arc<dyn CdpTransport>) -> Result<Self, AdapterError> {
        let created = transport
            .send_command(
                CommandTarget::Browser,
                "Target.createTarget",
                json!({ "url": "about:blank" }),
            )
            .await?;
        let target_id = string_field(&created, "targetId")?;

        let attached = transport
            .send_command(
                CommandTarget::Browser,
                "Target.attachToTarget",
                json!({ "targetId": target_id, "flatten": true }),
            )
            .await?;
        let session_id = string_field(&attached, "sessionId")?;

        transport
            .send_command(
                CommandTarget::Session(session_id.clone()),
                "Network.enable",
                json!({ "maxPostDataSize": MAX_POST_DATA_SIZE }),
            )
            .await?;

        let buffer = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let pump = tokio::spawn(pump_events(
            transport.clone(),
            session_id.clone(),
            buffer.clone(),
            closed.clone(),
        ));

        info!(target: "cdp-adapter", %target_id, %session_id, "network recorder attached");
        Ok(Self {
            transport,
            target_id,
            session_id,
            buffer,
            closed,
            pump,
        })
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Entries captured since the last drain.
    pub fn buffered(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Points the observed tab at `url`. Only http(s) URLs are accepted.
    pub async fn navigate(&self, url: &str) -> Result<(), AdapterError> {
        let parsed = Url::parse(url).map_err(|err| {
            AdapterError::new(AdapterErrorKind::InvalidUrl).with_hint(format!("{url}: {err}"))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AdapterError::new(AdapterErrorKind::InvalidUrl)
                .with_hint(format!("unsupported scheme `{}`", parsed.scheme())));
        }

        let result = self
            .transport
            .send_command(
                self.session(),
                "Page.navigate",
                json!({ "url": parsed.as_str() }),
            )
            .await?;
        if let Some(reason) = result.get("errorText").and_then(Value::as_str) {
            return Err(AdapterError::new(AdapterErrorKind::Protocol)
                .with_hint(format!("navigation to {parsed} failed: {reason}")));
        }
        debug!(target: "cdp-adapter", url = %parsed, "navigation committed");
        Ok(())
    }

    /// Closes the observed tab. The pump stops when the transport goes away.
    pub async fn close(&self) -> Result<(), AdapterError> {
        self.transport
            .send_command(
                CommandTarget::Browser,
                "Target.closeTarget",
                json!({ "targetId": self.target_id }),
            )
            .await
            .map(|_| ())
    }

    fn session(&self) -> CommandTarget {
        CommandTarget::Session(self.session_id.clone())
    }
}

impl Drop for NetworkRecorder {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

async fn pump_events(
    transport: Arc<dyn CdpTransport>,
    session_id: String,
    buffer: Arc<Mutex<Vec<RawLogEntry>>>,
    closed: Arc<AtomicBool>,
) {
    while let Some(event) = transport.next_event().await {
        if event.session_id.as_deref() != Some(session_id.as_str()) {
            continue;
        }
        if !event.method.starts_with("Network.") {
            continue;
        }
        trace!(target: "cdp-adapter", method = %event.method, "network event buffered");
        buffer.lock().push(RawLogEntry::new(event.method, event.params));
    }
    closed.store(true, Ordering::Relaxed);
    debug!(target: "cdp-adapter", %session_id, "event stream ended");
}

fn string_field(value: &Value, field: &str) -> Result<String, AdapterError> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            AdapterError::new(AdapterErrorKind::Internal)
                .with_hint(format!("cdp result missing `{field}`"))
                .with_data(value.clone())
        })
}

#[async_trait]
impl NetworkLogSource for NetworkRecorder {
    async fn drain_log(&self) -> Result<Vec<RawLogEntry>, SourceError> {
        let batch = std::mem::take(&mut *self.buffer.lock());
        if batch.is_empty() && self.closed.load(Ordering::Relaxed) {
            return Err(SourceError::Closed);
        }
        debug!(target: "cdp-adapter", entries = batch.len(), "network log drained");
        Ok(batch)
    }
}

#[async_trait]
impl BodySource for NetworkRecorder {
    async fn response_body(&self, id: &ExchangeId) -> Result<FetchedBody, FetchError> {
        let result = self
            .transport
            .send_command(
                self.session(),
                "Network.getResponseBody",
                json!({ "requestId": id.as_str() }),
            )
            .await?;
        let body = result
            .get("body")
            .and_then(Value::as_str)
            .ok_or_else(|| FetchError::Source("getResponseBody returned no body".into()))?;
        Ok(FetchedBody {
            body: body.to_string(),
            base64_encoded: result
                .get("base64Encoded")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
    }
}
