//! Snapshot Aggregator: folds phase snapshots into one combined view.
//!
//! The fold is a plain overwrite by [`ExchangeId`]. Request and response halves are
//! replaced independently and never merged field by field, so the last phase that
//! carried a half for an id owns that half entirely, even when an earlier phase saw
//! more detail.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::model::{ExchangeId, PhaseSnapshot, RequestRecord, ResponseRecord};

/// Which snapshot supplied the winning request record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseOrigin {
    /// Position of the snapshot in the fold, starting at 0.
    pub index: usize,
    pub phase: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedView {
    requests: BTreeMap<ExchangeId, RequestRecord>,
    responses: BTreeMap<ExchangeId, ResponseRecord>,
    origins: BTreeMap<ExchangeId, PhaseOrigin>,
}

impl CombinedView {
    pub fn requests(&self) -> &BTreeMap<ExchangeId, RequestRecord> {
        &self.requests
    }

    pub fn responses(&self) -> &BTreeMap<ExchangeId, ResponseRecord> {
        &self.responses
    }

    pub fn origin(&self, id: &ExchangeId) -> Option<&PhaseOrigin> {
        self.origins.get(id)
    }

    pub fn request(&self, id: &ExchangeId) -> Option<&RequestRecord> {
        self.requests.get(id)
    }

    pub fn response(&self, id: &ExchangeId) -> Option<&ResponseRecord> {
        self.responses.get(id)
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty() && self.responses.is_empty()
    }
}

/// Left fold over snapshots in phase-execution order.
#[derive(Debug, Default)]
pub struct Aggregator {
    view: CombinedView,
    phases: usize,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fold(&mut self, snapshot: &PhaseSnapshot) {
        let index = self.phases;
        self.phases += 1;
        for (id, record) in &snapshot.requests {
            self.view.requests.insert(id.clone(), record.clone());
            self.view.origins.insert(
                id.clone(),
                PhaseOrigin {
                    index,
                    phase: snapshot.phase.clone(),
                },
            );
        }
        for (id, record) in &snapshot.responses {
            self.view.responses.insert(id.clone(), record.clone());
        }
        debug!(
            target: "network-tap",
            phase = %snapshot.phase,
            index,
            requests = self.view.requests.len(),
            responses = self.view.responses.len(),
            "snapshot folded"
        );
    }

    pub fn view(&self) -> &CombinedView {
        &self.view
    }

    pub fn finish(self) -> CombinedView {
        self.view
    }
}

pub fn aggregate<'a, I>(snapshots: I) -> CombinedView
where
    I: IntoIterator<Item = &'a PhaseSnapshot>,
{
    let mut aggregator = Aggregator::new();
    for snapshot in snapshots {
        aggregator.fold(snapshot);
    }
    aggregator.finish()
}
