//! Capture session orchestration.
//!
//! A [`CaptureSession`] walks a [`PhasePlan`] in order. For every phase the
//! [`PhaseDriver`] performs the interaction, the session waits for the network to
//! settle and then drains exactly one batch from the [`NetworkLogSource`], which is
//! decoded and correlated into that phase's snapshot. Phases never overlap, so the
//! fold order of the snapshots is the plan order.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use network_tap::{
    aggregate, classify, correlate, decode_batch, ActionReport, BodyFetcher, CaptureDump,
    CombinedView, NetworkLogSource, PhaseSnapshot, RuleTable, TapError,
};
use tracing::{info, warn};

use crate::errors::{ProbeError, ProbeResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseStep {
    /// Point the observed tab at a URL.
    Navigate(String),
    /// Ask the operator to perform an interaction in the headed browser.
    Operator(String),
    /// Nothing to drive; the batch is already recorded.
    Observe,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhasePlan {
    phases: Vec<(String, PhaseStep)>,
}

impl PhasePlan {
    pub fn new(phases: Vec<(String, PhaseStep)>) -> Self {
        Self { phases }
    }

    /// The storefront walk: product page, add to cart, cart, checkout and the sign-in probe.
    pub fn storefront(start_url: &str, cart_url: &str, signin_probe: bool) -> Self {
        let mut phases = vec![
            ("pdp".to_string(), PhaseStep::Navigate(start_url.to_string())),
            (
                "add_to_cart".to_string(),
                PhaseStep::Operator("Click \"Add to Cart\" on the product page".to_string()),
            ),
            ("cart".to_string(), PhaseStep::Navigate(cart_url.to_string())),
            (
                "checkout".to_string(),
                PhaseStep::Operator("Click \"Checkout\" on the cart page".to_string()),
            ),
        ];
        if signin_probe {
            phases.push((
                "signin".to_string(),
                PhaseStep::Operator(
                    "Open the sign-in form and submit a probe email only (no password)".to_string(),
                ),
            ));
        }
        Self { phases }
    }

    /// Phases whose batches were recorded elsewhere.
    pub fn observe_only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            phases: names
                .into_iter()
                .map(|name| (name.into(), PhaseStep::Observe))
                .collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PhaseStep)> {
        self.phases.iter().map(|(name, step)| (name.as_str(), step))
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// A plan needs at least one phase and unique, non-blank names.
    pub fn validate(&self) -> ProbeResult<()> {
        if self.is_empty() {
            return Err(ProbeError::Config("phase list is empty".into()));
        }
        let mut seen = BTreeSet::new();
        for (name, _) in self.iter() {
            if name.trim().is_empty() {
                return Err(ProbeError::Config("phase name must not be empty".into()));
            }
            if !seen.insert(name) {
                return Err(ProbeError::Config(format!("phase `{name}` is listed twice")));
            }
        }
        Ok(())
    }
}

/// Performs the browser-side part of a phase.
#[async_trait]
pub trait PhaseDriver: Send + Sync {
    async fn perform(&self, phase: &str, step: &PhaseStep) -> ProbeResult<()>;
}

/// Driver for recorded input: every step is a no-op.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDriver;

#[async_trait]
impl PhaseDriver for NullDriver {
    async fn perform(&self, _phase: &str, _step: &PhaseStep) -> ProbeResult<()> {
        Ok(())
    }
}

pub struct CaptureSession {
    source: Arc<dyn NetworkLogSource>,
    driver: Arc<dyn PhaseDriver>,
    settle: Duration,
    snapshots: Vec<PhaseSnapshot>,
}

impl CaptureSession {
    pub fn new(source: Arc<dyn NetworkLogSource>, driver: Arc<dyn PhaseDriver>) -> Self {
        Self {
            source,
            driver,
            settle: Duration::ZERO,
            snapshots: Vec::new(),
        }
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Drives one phase and stores its snapshot.
    ///
    /// A driver failure is logged and the phase is still captured: whatever traffic
    /// the attempt produced is worth keeping. Only a dead log source is an error.
    pub async fn capture_phase(&mut self, phase: &str, step: &PhaseStep) -> ProbeResult<&PhaseSnapshot> {
        info!(target: "checkout-probe", %phase, "phase started");
        if let Err(err) = self.driver.perform(phase, step).await {
            warn!(target: "checkout-probe", %phase, error = %err, "phase interaction failed; capturing anyway");
        }
        if !self.settle.is_zero() {
            tokio::time::sleep(self.settle).await;
        }

        let entries = self.source.drain_log().await.map_err(TapError::from)?;
        let batch = decode_batch(&entries);
        let snapshot = correlate(phase, batch.events);
        info!(
            target: "checkout-probe",
            %phase,
            entries = entries.len(),
            dropped = batch.stats.dropped,
            requests = snapshot.requests.len(),
            responses = snapshot.responses.len(),
            "phase captured"
        );
        self.snapshots.push(snapshot);
        Ok(&self.snapshots[self.snapshots.len() - 1])
    }

    /// Runs every phase in order. Stops at the first phase whose log cannot be drained;
    /// snapshots captured before that stay available.
    pub async fn run(&mut self, plan: &PhasePlan) -> ProbeResult<()> {
        for (phase, step) in plan.iter() {
            self.capture_phase(phase, step).await?;
        }
        Ok(())
    }

    pub fn snapshots(&self) -> &[PhaseSnapshot] {
        &self.snapshots
    }

    pub fn combined(&self) -> CombinedView {
        aggregate(&self.snapshots)
    }

    pub async fn classify(&self, rules: &RuleTable, fetcher: &BodyFetcher) -> ActionReport {
        classify(&self.combined(), rules, fetcher).await
    }

    pub fn dump(&self) -> CaptureDump {
        CaptureDump::new(&self.snapshots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use network_tap::{ActionKind, RawLogEntry, ReplaySource, SourceError};
    use serde_json::json;
    use std::sync::Mutex;

    /// Records performed phases; fails the ones named in `failing`.
    #[derive(Default)]
    struct Recorder {
        performed: Mutex<Vec<String>>,
        failing: Vec<&'static str>,
    }

    #[async_trait]
    impl PhaseDriver for Recorder {
        async fn perform(&self, phase: &str, _step: &PhaseStep) -> ProbeResult<()> {
            self.performed.lock().unwrap().push(phase.to_string());
            if self.failing.iter().any(|failing| *failing == phase) {
                return Err(ProbeError::Driver {
                    phase: phase.to_string(),
                    reason: "button not found".into(),
                });
            }
            Ok(())
        }
    }

    fn request(id: &str, url: &str) -> RawLogEntry {
        RawLogEntry::new(
            "Network.requestWillBeSent",
            json!({ "requestId": id, "request": { "url": url, "method": "POST" } }),
        )
    }

    struct ClosedSource;

    #[async_trait]
    impl NetworkLogSource for ClosedSource {
        async fn drain_log(&self) -> Result<Vec<RawLogEntry>, SourceError> {
            Err(SourceError::Closed)
        }
    }

    #[tokio::test]
    async fn phases_run_in_plan_order_even_when_a_step_fails() {
        let source = Arc::new(ReplaySource::new(vec![
            vec![request("1", "https://shop.test/graphql")],
            vec![request("2", "https://shop.test/cart/add")],
        ]));
        let driver = Arc::new(Recorder {
            failing: vec!["add_to_cart"],
            ..Recorder::default()
        });
        let plan = PhasePlan::new(vec![
            ("pdp".into(), PhaseStep::Navigate("https://shop.test/p".into())),
            ("add_to_cart".into(), PhaseStep::Operator("add".into())),
        ]);

        let mut session = CaptureSession::new(source, driver.clone());
        session.run(&plan).await.expect("run");

        assert_eq!(*driver.performed.lock().unwrap(), vec!["pdp", "add_to_cart"]);
        let phases: Vec<_> = session.snapshots().iter().map(|s| s.phase.as_str()).collect();
        assert_eq!(phases, vec!["pdp", "add_to_cart"]);

        let report = session
            .classify(&RuleTable::default(), &BodyFetcher::offline())
            .await;
        assert_eq!(report.observed_count(), 2);
        assert!(report.get(ActionKind::AddToCart).is_some());
        assert_eq!(session.dump().phases().len(), 2);
    }

    #[tokio::test]
    async fn exhausted_replay_yields_empty_phases() {
        let mut session = CaptureSession::new(Arc::new(ReplaySource::default()), Arc::new(NullDriver));
        session
            .run(&PhasePlan::observe_only(["pdp", "cart"]))
            .await
            .expect("run");
        assert!(session.snapshots().iter().all(PhaseSnapshot::is_empty));
        assert!(session.combined().is_empty());
    }

    #[tokio::test]
    async fn closed_source_stops_the_run() {
        let mut session = CaptureSession::new(Arc::new(ClosedSource), Arc::new(NullDriver));
        let err = session
            .run(&PhasePlan::observe_only(["pdp"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Tap(TapError::Source(SourceError::Closed))));
        assert!(session.snapshots().is_empty());
    }
}
