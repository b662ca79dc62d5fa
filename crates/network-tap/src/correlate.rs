//! Request/Response Correlator: one instance per phase.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::decode::NetworkEvent;
use crate::metrics;
use crate::model::{ExchangeId, PhaseSnapshot, RequestRecord, ResponseRecord};

/// Assembles the exchanges of a single phase. Last write wins for a recurring id.
#[derive(Debug)]
pub struct Correlator {
    phase: String,
    next_sequence: u64,
    requests: BTreeMap<ExchangeId, RequestRecord>,
    responses: BTreeMap<ExchangeId, ResponseRecord>,
}

impl Correlator {
    pub fn new(phase: impl Into<String>) -> Self {
        Self {
            phase: phase.into(),
            next_sequence: 0,
            requests: BTreeMap::new(),
            responses: BTreeMap::new(),
        }
    }

    pub fn phase(&self) -> &str {
        &self.phase
    }

    pub fn ingest(&mut self, event: NetworkEvent) {
        match event {
            NetworkEvent::RequestInitiated {
                id,
                url,
                method,
                headers,
                post_data,
            } => {
                // Redirects reuse the id; the reissued request takes a fresh sequence.
                self.next_sequence += 1;
                let record = RequestRecord {
                    sequence: self.next_sequence,
                    url,
                    method,
                    headers,
                    post_data,
                };
                if self.requests.insert(id.clone(), record).is_some() {
                    trace!(target: "network-tap", phase = %self.phase, %id, "request reissued");
                }
            }
            NetworkEvent::ResponseArrived {
                id,
                status,
                headers,
                mime_type,
            } => {
                if !self.requests.contains_key(&id) {
                    trace!(target: "network-tap", phase = %self.phase, %id, "response without request");
                }
                self.responses.insert(
                    id,
                    ResponseRecord {
                        status,
                        headers,
                        mime_type,
                    },
                );
            }
        }
    }

    pub fn ingest_all<I>(&mut self, events: I)
    where
        I: IntoIterator<Item = NetworkEvent>,
    {
        for event in events {
            self.ingest(event);
        }
    }

    pub fn finish(self) -> PhaseSnapshot {
        debug!(
            target: "network-tap",
            phase = %self.phase,
            requests = self.requests.len(),
            responses = self.responses.len(),
            "phase correlated"
        );
        metrics::record_phase();
        PhaseSnapshot {
            phase: self.phase,
            requests: self.requests,
            responses: self.responses,
        }
    }
}

/// Correlates one phase's events into its snapshot.
pub fn correlate<I>(phase: impl Into<String>, events: I) -> PhaseSnapshot
where
    I: IntoIterator<Item = NetworkEvent>,
{
    let mut correlator = Correlator::new(phase);
    correlator.ingest_all(events);
    correlator.finish()
}
