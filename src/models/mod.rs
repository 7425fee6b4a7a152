//! Data models
//!
//! Core types shared across the engine: run descriptors, case results,
//! run outcomes, and the aggregated report.

mod descriptor;
mod outcome;

pub use descriptor::RunDescriptor;
pub use outcome::{AggregatedReport, CaseResult, CaseStatus, RunOutcome, RunState, SuiteReport};
