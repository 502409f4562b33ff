//! Multi-stage pipeline orchestration.
//!
//! Sequences the external stages — image processing, PDF generation,
//! and the conditional catalog update — over one timestamp-named
//! working-directory set, and converts every stage failure into a
//! single failure completion event.

mod config;
mod orchestrator;
mod records;

pub use config::PipelineConfig;
pub use orchestrator::{PipelineError, PipelineOrchestrator};
pub use records::{parse_records, InputRecord};
