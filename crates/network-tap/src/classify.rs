//! Action Classifier: buckets combined requests by the first matching action.

use std::collections::BTreeMap;

use tracing::trace;

use crate::aggregate::CombinedView;
use crate::metrics;
use crate::model::{ExchangeId, RequestRecord};
use crate::rules::{ActionKind, RuleTable};

/// A bucketed request together with its id and the fold position of its phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Candidate<'a> {
    pub id: &'a ExchangeId,
    pub request: &'a RequestRecord,
    pub phase_index: usize,
}

impl<'a> Candidate<'a> {
    pub fn new(id: &'a ExchangeId, request: &'a RequestRecord, phase_index: usize) -> Self {
        Self {
            id,
            request,
            phase_index,
        }
    }
}

/// One (possibly empty) bucket per action. Every action key is always present.
#[derive(Clone, Debug)]
pub struct Buckets<'a> {
    buckets: BTreeMap<ActionKind, Vec<Candidate<'a>>>,
}

impl<'a> Buckets<'a> {
    fn empty() -> Self {
        Self {
            buckets: ActionKind::ALL
                .into_iter()
                .map(|action| (action, Vec::new()))
                .collect(),
        }
    }

    pub fn get(&self, action: ActionKind) -> &[Candidate<'a>] {
        self.buckets
            .get(&action)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ActionKind, &[Candidate<'a>])> {
        self.buckets
            .iter()
            .map(|(action, candidates)| (*action, candidates.as_slice()))
    }

    /// Number of requests that landed in any bucket.
    pub fn classified(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }
}

pub fn bucket_requests<'a>(view: &'a CombinedView, rules: &RuleTable) -> Buckets<'a> {
    let mut buckets = Buckets::empty();
    for (id, request) in view.requests() {
        let Some(action) = rules.classify_url(&request.url) else {
            continue;
        };
        trace!(target: "network-tap", %id, %action, url = %request.url, "request classified");
        metrics::record_classified(action);
        let phase_index = view.origin(id).map(|origin| origin.index).unwrap_or_default();
        buckets
            .buckets
            .entry(action)
            .or_default()
            .push(Candidate::new(id, request, phase_index));
    }
    buckets
}
