//! Raw DevTools transport: one websocket, commands in, events out.
//!
//! A pump task owns the chromiumoxide [`Connection`]. Callers hand it commands over a
//! channel and wait on a oneshot for the matching response; events are forwarded to a
//! bounded queue read through [`CdpTransport::next_event`].

use std::collections::HashMap;
use std::convert::TryInto;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::target::SessionId;
use chromiumoxide::cdp::events::CdpEventMessage;
use chromiumoxide::conn::Connection;
use chromiumoxide::error::CdpError;
use chromiumoxide_types::{CallId, CdpJsonEventMessage, Message, MethodId, Response};
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::CdpConfig;
use crate::error::{AdapterError, AdapterErrorKind};
use crate::launch::{launch, ChildGuard};

const COMMAND_QUEUE: usize = 128;
const EVENT_QUEUE: usize = 4096;
const KEEPALIVE_METHOD: &str = "Browser.getVersion";

#[derive(Clone, Debug, PartialEq)]
pub struct TransportEvent {
    pub method: String,
    pub params: Value,
    pub session_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandTarget {
    Browser,
    Session(String),
}

#[async_trait]
pub trait CdpTransport: Send + Sync {
    /// Next event from any session; `None` once the connection is gone.
    async fn next_event(&self) -> Option<TransportEvent>;

    async fn send_command(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, AdapterError>;
}

type Reply = oneshot::Sender<Result<Value, AdapterError>>;

struct Outgoing {
    target: CommandTarget,
    method: String,
    params: Value,
    reply: Reply,
}

/// Chromium connection, launched locally or attached through `websocket_url`.
pub struct ChromiumTransport {
    cfg: CdpConfig,
    commands: mpsc::Sender<Outgoing>,
    events: Mutex<mpsc::Receiver<TransportEvent>>,
    alive: Arc<AtomicBool>,
    pump: JoinHandle<()>,
    keepalive: Option<JoinHandle<()>>,
    _browser: Option<ChildGuard>,
}

impl ChromiumTransport {
    pub async fn connect(cfg: CdpConfig) -> Result<Self, AdapterError> {
        let (browser, ws_url) = match cfg.websocket_url.clone() {
            Some(url) => (None, url),
            None => {
                let (guard, url) = launch(&cfg).await?;
                (Some(guard), url)
            }
        };

        let conn = Connection::<CdpEventMessage>::connect(&ws_url)
            .await
            .map_err(|err| {
                AdapterError::new(AdapterErrorKind::CdpIo)
                    .with_hint(err.to_string())
                    .with_data(json!({ "ws_url": ws_url }))
            })?;

        let (commands, command_rx) = mpsc::channel(COMMAND_QUEUE);
        let (event_tx, events) = mpsc::channel(EVENT_QUEUE);
        let alive = Arc::new(AtomicBool::new(true));

        let pump_alive = alive.clone();
        let pump = tokio::spawn(async move {
            if let Err(err) = run_pump(conn, command_rx, event_tx).await {
                error!(target: "cdp-transport", %err, "connection pump stopped");
            }
            pump_alive.store(false, Ordering::Relaxed);
        });

        let keepalive = spawn_keepalive(
            commands.clone(),
            alive.clone(),
            Duration::from_millis(cfg.heartbeat_interval_ms),
        );

        info!(target: "cdp-transport", url = %ws_url, launched = browser.is_some(), "chromium connection established");
        Ok(Self {
            cfg,
            commands,
            events: Mutex::new(events),
            alive,
            pump,
            keepalive,
            _browser: browser,
        })
    }

    pub fn config(&self) -> &CdpConfig {
        &self.cfg
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl CdpTransport for ChromiumTransport {
    async fn next_event(&self) -> Option<TransportEvent> {
        self.events.lock().await.recv().await
    }

    async fn send_command(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, AdapterError> {
        if !self.is_alive() {
            return Err(AdapterError::new(AdapterErrorKind::CdpIo)
                .with_hint(format!("connection closed before {method}")));
        }
        let deadline = Duration::from_millis(self.cfg.default_deadline_ms);
        round_trip(&self.commands, target, method, params, deadline).await
    }
}

impl Drop for ChromiumTransport {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Relaxed);
        self.pump.abort();
        if let Some(keepalive) = &self.keepalive {
            keepalive.abort();
        }
    }
}

async fn round_trip(
    commands: &mpsc::Sender<Outgoing>,
    target: CommandTarget,
    method: &str,
    params: Value,
    deadline: Duration,
) -> Result<Value, AdapterError> {
    let (reply, response) = oneshot::channel();
    commands
        .send(Outgoing {
            target,
            method: method.to_string(),
            params,
            reply,
        })
        .await
        .map_err(|_| AdapterError::new(AdapterErrorKind::CdpIo).with_hint("connection pump is gone"))?;

    match timeout(deadline, response).await {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => Err(AdapterError::new(AdapterErrorKind::CdpIo)
            .with_hint(format!("{method}: response dropped"))),
        Err(_) => Err(AdapterError::new(AdapterErrorKind::Timeout)
            .with_hint(method.to_string())
            .retriable(true)),
    }
}

/// Pings the browser while the operator works in the window, so an idle
/// websocket is not reaped between phases.
fn spawn_keepalive(
    commands: mpsc::Sender<Outgoing>,
    alive: Arc<AtomicBool>,
    period: Duration,
) -> Option<JoinHandle<()>> {
    if period.is_zero() {
        return None;
    }
    let deadline = period.min(Duration::from_secs(5));
    Some(tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;
        while alive.load(Ordering::Relaxed) {
            ticker.tick().await;
            let ping = round_trip(
                &commands,
                CommandTarget::Browser,
                KEEPALIVE_METHOD,
                json!({}),
                deadline,
            )
            .await;
            if let Err(err) = ping {
                warn!(target: "cdp-transport", %err, "keepalive failed; stopping");
                break;
            }
        }
    }))
}

async fn run_pump(
    mut conn: Connection<CdpEventMessage>,
    mut commands: mpsc::Receiver<Outgoing>,
    events: mpsc::Sender<TransportEvent>,
) -> Result<(), AdapterError> {
    let mut pending: HashMap<CallId, Reply> = HashMap::new();

    loop {
        tokio::select! {
            Some(outgoing) = commands.recv() => {
                let session = match outgoing.target {
                    CommandTarget::Browser => None,
                    CommandTarget::Session(id) => Some(SessionId::from(id)),
                };
                let method: MethodId = outgoing.method.clone().into();
                match conn.submit_command(method, session, outgoing.params) {
                    Ok(call_id) => {
                        pending.insert(call_id, outgoing.reply);
                    }
                    Err(err) => {
                        let err = AdapterError::new(AdapterErrorKind::CdpIo)
                            .with_hint(format!("{}: {err}", outgoing.method));
                        let _ = outgoing.reply.send(Err(err.clone()));
                        fail_pending(&mut pending, &err);
                        return Err(err);
                    }
                }
            }
            message = conn.next() => match message {
                Some(Ok(Message::Response(response))) => {
                    if let Some(reply) = pending.remove(&response.id) {
                        let _ = reply.send(response_payload(response));
                    }
                }
                Some(Ok(Message::Event(event))) => match to_transport_event(event) {
                    Ok(event) => {
                        if events.send(event).await.is_err() {
                            debug!(target: "cdp-transport", "event receiver dropped");
                        }
                    }
                    Err(err) => warn!(target: "cdp-transport", %err, "undecodable cdp event"),
                },
                Some(Err(err)) => {
                    let err = classify_cdp_error(err);
                    fail_pending(&mut pending, &err);
                    return Err(err);
                }
                None => {
                    let err = AdapterError::new(AdapterErrorKind::CdpIo).with_hint("cdp connection closed");
                    fail_pending(&mut pending, &err);
                    debug!(target: "cdp-transport", "websocket closed by the browser");
                    return Ok(());
                }
            },
        }
    }
}

fn fail_pending(pending: &mut HashMap<CallId, Reply>, err: &AdapterError) {
    for (_, reply) in pending.drain() {
        let _ = reply.send(Err(err.clone()));
    }
}

fn to_transport_event(event: CdpEventMessage) -> Result<TransportEvent, AdapterError> {
    let raw: CdpJsonEventMessage = event.try_into().map_err(|err| {
        AdapterError::new(AdapterErrorKind::Internal).with_hint(format!("event decode: {err}"))
    })?;
    Ok(TransportEvent {
        method: raw.method.into_owned(),
        params: raw.params,
        session_id: raw.session_id,
    })
}

/// A CDP error reply is the browser refusing the command, not a transport fault.
fn response_payload(response: Response) -> Result<Value, AdapterError> {
    match (response.result, response.error) {
        (Some(result), _) => Ok(result),
        (None, Some(error)) => Err(AdapterError::new(AdapterErrorKind::Protocol)
            .with_hint(format!("cdp error {}: {}", error.code, error.message))
            .with_data(json!({ "code": error.code }))),
        (None, None) => {
            Err(AdapterError::new(AdapterErrorKind::Internal).with_hint("empty cdp response"))
        }
    }
}

fn classify_cdp_error(err: CdpError) -> AdapterError {
    let hint = err.to_string();
    match err {
        CdpError::Timeout => AdapterError::new(AdapterErrorKind::Timeout)
            .with_hint(hint)
            .retriable(true),
        CdpError::Serde(_) | CdpError::DecodeError(_) => {
            AdapterError::new(AdapterErrorKind::Internal).with_hint(hint)
        }
        _ => AdapterError::new(AdapterErrorKind::CdpIo)
            .with_hint(hint)
            .retriable(true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(raw: Value) -> Response {
        serde_json::from_value(raw).expect("cdp response")
    }

    #[test]
    fn error_reply_is_a_protocol_rejection() {
        let err = response_payload(response(json!({
            "id": 3,
            "error": { "code": -32000, "message": "No resource with given identifier found" }
        })))
        .unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::Protocol);
        assert!(err.to_string().contains("No resource"));
        assert_eq!(err.data, Some(json!({ "code": -32000 })));
    }

    #[test]
    fn result_is_passed_through() {
        let value = response_payload(response(json!({ "id": 1, "result": { "frameId": "F" } })))
            .expect("payload");
        assert_eq!(value["frameId"], "F");
    }

    #[test]
    fn cdp_timeouts_are_retriable() {
        let err = classify_cdp_error(CdpError::Timeout);
        assert_eq!(err.kind, AdapterErrorKind::Timeout);
        assert!(err.retriable);
    }

    #[tokio::test]
    async fn round_trip_times_out_without_a_pump() {
        let (commands, _pending) = mpsc::channel(1);
        let err = round_trip(
            &commands,
            CommandTarget::Browser,
            "Network.enable",
            json!({}),
            Duration::from_millis(10),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::Timeout);
        assert_eq!(err.hint.as_deref(), Some("Network.enable"));
    }
}
