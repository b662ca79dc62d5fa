//! Network capture and action classification engine.
//!
//! Raw DevTools `Network.*` log entries flow through the pipeline one phase at a time:
//!
//! ```text
//! RawLogEntry batch -> decode -> Correlator -> PhaseSnapshot
//! [PhaseSnapshot]   -> aggregate -> CombinedView
//! CombinedView      -> bucket_requests -> select_best -> BodyFetcher -> ActionReport
//! ```
//!
//! Everything up to body retrieval is synchronous and deterministic. The browser side of
//! the pipeline (supplying log batches and response bodies) sits behind the
//! [`NetworkLogSource`] and [`BodySource`] traits.

pub mod aggregate;
pub mod body;
pub mod classify;
pub mod correlate;
pub mod decode;
pub mod dump;
pub mod errors;
pub mod metrics;
pub mod model;
pub mod report;
pub mod rules;
pub mod select;
pub mod source;

pub use aggregate::{aggregate, Aggregator, CombinedView, PhaseOrigin};
pub use body::{BodyFetcher, BodySource, FetchedBody, NoBodies};
pub use classify::{bucket_requests, Buckets, Candidate};
pub use correlate::{correlate, Correlator};
pub use decode::{
    decode_batch, decode_entry, unwrap_performance_entry, unwrap_performance_log, DecodeStats,
    DecodedBatch, NetworkEvent, RawLogEntry,
};
pub use dump::CaptureDump;
pub use errors::{DecodeError, FetchError, SourceError, TapError};
pub use model::{ExchangeId, Headers, PhaseSnapshot, RequestRecord, ResponseRecord};
pub use report::{classify, ActionReport, SelectedExchange};
pub use rules::{ActionKind, ActionRule, RuleTable};
pub use select::{priority_rank, select_best};
pub use source::{NetworkLogSource, ReplaySource};
