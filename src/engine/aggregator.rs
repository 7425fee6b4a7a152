//! Thread-safe result aggregation
//!
//! Workers record run outcomes concurrently; the final report is snapshotted
//! in suite discovery order, independent of completion order.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::warn;

use crate::models::{AggregatedReport, RunDescriptor, RunOutcome, SuiteReport};

struct Inner {
    /// One slot per discovered suite, in discovery order
    slots: Vec<Option<RunOutcome>>,
    scenarios: Vec<String>,
    notes: Vec<String>,
}

/// Accumulates per-suite outcomes from concurrently running workers
///
/// Each suite gets exactly one slot; a second record for the same suite is a
/// programming error (first write wins, logged).
pub struct ResultAggregator {
    names: Vec<String>,
    index: HashMap<String, usize>,
    inner: Mutex<Inner>,
    started_at: DateTime<Utc>,
}

impl ResultAggregator {
    pub fn new(descriptors: &[RunDescriptor]) -> Self {
        let names: Vec<String> = descriptors.iter().map(|d| d.suite.clone()).collect();
        let index = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        let slots = names.iter().map(|_| None).collect();
        Self {
            names,
            index,
            inner: Mutex::new(Inner {
                slots,
                scenarios: Vec::new(),
                notes: Vec::new(),
            }),
            started_at: Utc::now(),
        }
    }

    /// Record the terminal outcome of one suite run. Thread-safe; never
    /// loses or interleaves entries.
    pub fn record(&self, outcome: RunOutcome) {
        let slot = match self.index.get(&outcome.suite) {
            Some(&i) => i,
            None => {
                debug_assert!(false, "outcome for undiscovered suite {}", outcome.suite);
                warn!("Dropping outcome for undiscovered suite '{}'", outcome.suite);
                return;
            }
        };

        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.slots[slot].is_some() {
            debug_assert!(false, "duplicate outcome for suite {}", outcome.suite);
            warn!("Duplicate outcome for suite '{}', keeping first", outcome.suite);
            return;
        }
        inner.slots[slot] = Some(outcome);
    }

    /// Record a scenario tag (feature/platform gate that altered behavior).
    pub fn add_scenario(&self, tag: impl Into<String>) {
        let tag = tag.into();
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if !inner.scenarios.contains(&tag) {
            inner.scenarios.push(tag);
        }
    }

    /// Record a free-text engine-level note.
    pub fn add_note(&self, note: impl Into<String>) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.notes.push(note.into());
    }

    /// Snapshot the report. Callable only once no workers remain active;
    /// consuming the aggregator enforces that statically. A suite missing
    /// its outcome (a worker panicked) still appears, as cancelled.
    pub fn finalize(self, error_count: usize) -> AggregatedReport {
        let inner = self
            .inner
            .into_inner()
            .unwrap_or_else(|e| e.into_inner());

        let suites = inner
            .slots
            .into_iter()
            .zip(self.names)
            .map(|(slot, name)| match slot {
                Some(outcome) => SuiteReport {
                    suite: outcome.suite,
                    state: outcome.state,
                    cases: outcome.cases,
                    notes: outcome.notes,
                },
                None => {
                    warn!("Suite '{name}' reached no terminal state, reporting as cancelled");
                    SuiteReport {
                        suite: name,
                        state: crate::models::RunState::Cancelled,
                        cases: Vec::new(),
                        notes: vec!["no outcome recorded".to_string()],
                    }
                }
            })
            .collect();

        AggregatedReport {
            suites,
            error_count,
            scenarios: inner.scenarios,
            notes: inner.notes,
            started_at: self.started_at,
            completed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CaseResult, RunState};
    use std::sync::Arc;

    fn descriptors(names: &[&str]) -> Vec<RunDescriptor> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| RunDescriptor::new(*name, "s.py", "run", "tmp", i))
            .collect()
    }

    #[test]
    fn report_follows_discovery_order() {
        let agg = ResultAggregator::new(&descriptors(&["a", "b", "c"]));

        // Record in reverse completion order.
        agg.record(RunOutcome::finished("c", vec![CaseResult::passed("c1", 1)]));
        agg.record(RunOutcome::finished("a", vec![CaseResult::passed("a1", 1)]));
        agg.record(RunOutcome::finished("b", vec![CaseResult::passed("b1", 1)]));

        let report = agg.finalize(0);
        let order: Vec<&str> = report.suites.iter().map(|s| s.suite.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn duplicate_record_keeps_first() {
        let agg = ResultAggregator::new(&descriptors(&["a"]));
        agg.record(RunOutcome::finished("a", vec![CaseResult::passed("first", 1)]));

        // debug_assert fires in debug builds; release keeps the first write.
        if !cfg!(debug_assertions) {
            agg.record(RunOutcome::finished("a", vec![CaseResult::passed("second", 1)]));
        }

        let report = agg.finalize(0);
        assert_eq!(report.suites[0].cases[0].name, "first");
    }

    #[test]
    fn missing_outcome_becomes_cancelled() {
        let agg = ResultAggregator::new(&descriptors(&["a", "b"]));
        agg.record(RunOutcome::finished("a", vec![CaseResult::passed("a1", 1)]));

        let report = agg.finalize(0);
        assert_eq!(report.suites.len(), 2);
        assert_eq!(report.suites[1].state, RunState::Cancelled);
        assert!(report.suites[1].cases.is_empty());
    }

    #[test]
    fn scenarios_are_deduplicated() {
        let agg = ResultAggregator::new(&descriptors(&["a"]));
        agg.add_scenario("skip:a");
        agg.add_scenario("skip:a");
        agg.add_note("one");

        agg.record(RunOutcome::skipped("a", "gated"));
        let report = agg.finalize(0);
        assert_eq!(report.scenarios, vec!["skip:a"]);
        assert_eq!(report.notes, vec!["one"]);
    }

    #[test]
    fn concurrent_records_are_never_lost() {
        let names: Vec<String> = (0..64).map(|i| format!("s{i:02}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let agg = Arc::new(ResultAggregator::new(&descriptors(&refs)));

        let mut handles = Vec::new();
        for name in &names {
            let agg = Arc::clone(&agg);
            let name = name.clone();
            handles.push(std::thread::spawn(move || {
                agg.record(RunOutcome::finished(
                    name.clone(),
                    vec![CaseResult::passed(format!("{name}_case"), 1)],
                ));
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        let agg = Arc::into_inner(agg).unwrap();
        let report = agg.finalize(0);
        assert_eq!(report.total_cases(), 64);
        let order: Vec<&str> = report.suites.iter().map(|s| s.suite.as_str()).collect();
        assert_eq!(order, refs);
    }
}
