//! Checkout probe library
//!
//! Drives a storefront checkout flow phase by phase, captures the DevTools network log
//! of each phase and maps the captured exchanges onto checkout actions.

pub mod config;
pub mod errors;
pub mod metrics;
pub mod render;
pub mod session;

pub use config::{PhaseConfig, ProbeConfig, DEFAULT_CART_URL, DEFAULT_START_URL};
pub use errors::{ProbeError, ProbeResult};
pub use render::render_report;
pub use session::{CaptureSession, NullDriver, PhaseDriver, PhasePlan, PhaseStep};
