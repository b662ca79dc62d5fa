use std::sync::atomic::{AtomicU64, Ordering};

use lazy_static::lazy_static;
use prometheus::{core::Collector, IntCounter, IntCounterVec, Registry};
use tracing::error;

use crate::decode::DecodeStats;
use crate::rules::ActionKind;

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct TapMetricsSnapshot {
    pub entries_decoded: u64,
    pub entries_ignored: u64,
    pub entries_dropped: u64,
    pub phases: u64,
    pub classified: u64,
    pub body_fetch_failures: u64,
}

static ENTRIES_DECODED: AtomicU64 = AtomicU64::new(0);
static ENTRIES_IGNORED: AtomicU64 = AtomicU64::new(0);
static ENTRIES_DROPPED: AtomicU64 = AtomicU64::new(0);
static PHASES: AtomicU64 = AtomicU64::new(0);
static CLASSIFIED: AtomicU64 = AtomicU64::new(0);
static BODY_FETCH_FAILURES: AtomicU64 = AtomicU64::new(0);

lazy_static! {
    static ref TAP_ENTRIES_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("probe_tap_log_entries_total", "Raw log entries seen by the decoder"),
        &["outcome"]
    )
    .unwrap();
    static ref TAP_PHASES_TOTAL: IntCounter =
        IntCounter::new("probe_tap_phases_total", "Phase snapshots produced").unwrap();
    static ref TAP_CLASSIFIED_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new(
            "probe_tap_classified_requests_total",
            "Requests bucketed under an action"
        ),
        &["action"]
    )
    .unwrap();
    static ref TAP_BODY_FETCH_FAILURES_TOTAL: IntCounter = IntCounter::new(
        "probe_tap_body_fetch_failures_total",
        "Response bodies substituted with an empty body",
    )
    .unwrap();
}

fn register<C>(registry: &Registry, collector: C)
where
    C: Collector + Clone + Send + Sync + 'static,
{
    if let Err(err) = registry.register(Box::new(collector.clone())) {
        if !matches!(err, prometheus::Error::AlreadyReg) {
            error!(?err, "failed to register network tap metric");
        }
    }
}

pub fn register_metrics(registry: &Registry) {
    register(registry, TAP_ENTRIES_TOTAL.clone());
    register(registry, TAP_PHASES_TOTAL.clone());
    register(registry, TAP_CLASSIFIED_TOTAL.clone());
    register(registry, TAP_BODY_FETCH_FAILURES_TOTAL.clone());
}

pub fn record_decode(stats: &DecodeStats) {
    let pairs = [
        ("decoded", stats.decoded, &ENTRIES_DECODED),
        ("ignored", stats.ignored, &ENTRIES_IGNORED),
        ("dropped", stats.dropped, &ENTRIES_DROPPED),
    ];
    for (outcome, count, total) in pairs {
        if count == 0 {
            continue;
        }
        total.fetch_add(count as u64, Ordering::Relaxed);
        TAP_ENTRIES_TOTAL
            .with_label_values(&[outcome])
            .inc_by(count as u64);
    }
}

pub fn record_phase() {
    PHASES.fetch_add(1, Ordering::Relaxed);
    TAP_PHASES_TOTAL.inc();
}

pub fn record_classified(action: ActionKind) {
    CLASSIFIED.fetch_add(1, Ordering::Relaxed);
    TAP_CLASSIFIED_TOTAL
        .with_label_values(&[action.as_str()])
        .inc();
}

pub fn record_body_fetch_failure() {
    BODY_FETCH_FAILURES.fetch_add(1, Ordering::Relaxed);
    TAP_BODY_FETCH_FAILURES_TOTAL.inc();
}

pub fn snapshot() -> TapMetricsSnapshot {
    TapMetricsSnapshot {
        entries_decoded: ENTRIES_DECODED.load(Ordering::Relaxed),
        entries_ignored: ENTRIES_IGNORED.load(Ordering::Relaxed),
        entries_dropped: ENTRIES_DROPPED.load(Ordering::Relaxed),
        phases: PHASES.load(Ordering::Relaxed),
        classified: CLASSIFIED.load(Ordering::Relaxed),
        body_fetch_failures: BODY_FETCH_FAILURES.load(Ordering::Relaxed),
    }
}

/// Zeroes the snapshot counters. Prometheus series keep their totals.
pub fn reset() {
    for counter in [
        &ENTRIES_DECODED,
        &ENTRIES_IGNORED,
        &ENTRIES_DROPPED,
        &PHASES,
        &CLASSIFIED,
        &BODY_FETCH_FAILURES,
    ] {
        counter.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Counters are process-wide and other tests run in parallel, so only deltas are checked.
    #[test]
    fn records_decode_outcomes() {
        let before = snapshot();
        record_decode(&DecodeStats {
            decoded: 2,
            ignored: 1,
            dropped: 3,
        });
        record_body_fetch_failure();
        let after = snapshot();
        assert!(after.entries_decoded >= before.entries_decoded + 2);
        assert!(after.entries_ignored >= before.entries_ignored + 1);
        assert!(after.entries_dropped >= before.entries_dropped + 3);
        assert!(after.body_fetch_failures >= before.body_fetch_failures + 1);
    }

    #[test]
    fn registration_is_idempotent() {
        let registry = Registry::new();
        register_metrics(&registry);
        register_metrics(&registry);
        record_phase();
        assert!(registry
            .gather()
            .iter()
            .any(|family| family.get_name() == "probe_tap_phases_total"));
    }
}
