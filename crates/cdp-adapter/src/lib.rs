//! Chrome DevTools Protocol collaborator for the capture engine.
//!
//! [`ChromiumTransport`] owns the websocket to a launched (or already running)
//! Chromium. [`NetworkRecorder`] sits on top of it and implements the engine's
//! [`network_tap::NetworkLogSource`] and [`network_tap::BodySource`] seams.

pub mod config;
pub mod error;
mod launch;
pub mod recorder;
pub mod transport;

pub use config::{detect_chrome_executable, parse_flag, CdpConfig};
pub use error::{AdapterError, AdapterErrorKind};
pub use recorder::NetworkRecorder;
pub use transport::{CdpTransport, ChromiumTransport, CommandTarget, TransportEvent};
