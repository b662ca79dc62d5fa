//! Probe configuration, loaded from YAML by the CLI.

use std::collections::BTreeMap;
use std::path::PathBuf;

use cdp_adapter::CdpConfig;
use network_tap::{ActionKind, RuleTable};
use serde::{Deserialize, Serialize};

use crate::errors::ProbeResult;
use crate::session::{PhasePlan, PhaseStep};

pub const DEFAULT_START_URL: &str =
    "https://www.webstaurantstore.com/choice-2-1-2-mexican-flag-food-pick/500PKFLAGMXCASE.html";
pub const DEFAULT_CART_URL: &str = "https://www.webstaurantstore.com/cart/";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Product page opened in the `pdp` phase.
    pub start_url: String,
    pub cart_url: String,
    pub dump_file: PathBuf,
    /// Display limit for request and response bodies in human output.
    pub max_body_chars: usize,
    /// Pause after each phase before the network log is drained.
    pub settle_ms: u64,
    pub signin_probe: bool,
    /// Replaces the default phase list when present.
    pub phases: Option<Vec<PhaseConfig>>,
    /// Per-action pattern lists that replace the built-in ones.
    pub actions: BTreeMap<ActionKind, Vec<String>>,
    pub browser: CdpConfig,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            start_url: DEFAULT_START_URL.to_string(),
            cart_url: DEFAULT_CART_URL.to_string(),
            dump_file: PathBuf::from("capture_dump.json"),
            max_body_chars: 2000,
            settle_ms: 1500,
            signin_probe: true,
            phases: None,
            actions: BTreeMap::new(),
            browser: CdpConfig::default(),
        }
    }
}

/// One configured phase: a navigation target, an operator prompt, or both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseConfig {
    pub name: String,
    #[serde(default)]
    pub navigate: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
}

impl ProbeConfig {
    /// Compiles the effective rule table. Invalid patterns fail here, before any capture.
    pub fn rule_table(&self) -> ProbeResult<RuleTable> {
        Ok(RuleTable::with_overrides(&self.actions)?)
    }

    /// Browser settings with `CHECKOUT_PROBE_*` environment overrides applied.
    pub fn cdp_config(&self) -> CdpConfig {
        self.browser.clone().with_env_overrides()
    }

    pub fn phase_plan(&self) -> ProbeResult<PhasePlan> {
        let plan = match &self.phases {
            Some(phases) => PhasePlan::new(
                phases
                    .iter()
                    .map(|phase| (phase.name.clone(), step_for(phase)))
                    .collect(),
            ),
            None => PhasePlan::storefront(&self.start_url, &self.cart_url, self.signin_probe),
        };
        plan.validate()?;
        Ok(plan)
    }
}

fn step_for(phase: &PhaseConfig) -> PhaseStep {
    match (&phase.navigate, &phase.prompt) {
        (Some(url), _) => PhaseStep::Navigate(url.clone()),
        (None, Some(prompt)) => PhaseStep::Operator(prompt.clone()),
        (None, None) => PhaseStep::Operator(format!("Perform the `{}` step", phase.name)),
    }
}
