//! Structured events streamed to subscribers.
//!
//! Every notification a subscriber sees goes through the
//! [`EventEmitter`] facade, which keeps the wire schema and the job
//! registry in sync.

mod emitter;
mod types;

pub use emitter::EventEmitter;
pub use types::{ClientEvent, LogLevel, ProcessStatus, RunPaths};
