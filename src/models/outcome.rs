//! Run outcome and report models
//!
//! Defines case statuses, per-run outcomes, and the aggregated report
//! handed to the external report writer.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a single test case
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    Passed,
    Failed,
    Skipped,
    Error,
}

impl CaseStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            CaseStatus::Passed => "✓",
            CaseStatus::Failed => "✗",
            CaseStatus::Skipped => "○",
            CaseStatus::Error => "!",
        }
    }

    /// Failed and error cases both count against the global error total.
    pub fn is_error(&self) -> bool {
        matches!(self, CaseStatus::Failed | CaseStatus::Error)
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseStatus::Passed => write!(f, "PASS"),
            CaseStatus::Failed => write!(f, "FAIL"),
            CaseStatus::Skipped => write!(f, "SKIP"),
            CaseStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// Result of a single test case within a suite run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CaseResult {
    pub name: String,
    pub status: CaseStatus,
    pub duration_ms: u64,
    /// Failure or error detail, when the case did not pass
    pub detail: Option<String>,
    /// Captured diagnostic notes (signal numbers, stderr excerpts)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl CaseResult {
    pub fn passed(name: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            name: name.into(),
            status: CaseStatus::Passed,
            duration_ms,
            detail: None,
            notes: Vec::new(),
        }
    }

    pub fn failed(name: impl Into<String>, duration_ms: u64, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CaseStatus::Failed,
            duration_ms,
            detail: Some(detail.into()),
            notes: Vec::new(),
        }
    }

    pub fn skipped(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CaseStatus::Skipped,
            duration_ms: 0,
            detail: Some(reason.into()),
            notes: Vec::new(),
        }
    }

    pub fn error(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CaseStatus::Error,
            duration_ms: 0,
            detail: Some(detail.into()),
            notes: Vec::new(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

impl fmt::Display for CaseResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} [{}ms]",
            self.status.symbol(),
            self.name,
            self.status,
            self.duration_ms
        )?;
        if let Some(detail) = &self.detail {
            write!(f, " - {detail}")?;
        }
        Ok(())
    }
}

/// Lifecycle state of one suite run
///
/// `Pending → Dispatched → Running` then exactly one terminal state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Pending,
    Dispatched,
    Running,
    Completed,
    Failed,
    TimedOut,
    Cancelled,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::Failed | RunState::TimedOut | RunState::Cancelled
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Pending => write!(f, "pending"),
            RunState::Dispatched => write!(f, "dispatched"),
            RunState::Running => write!(f, "running"),
            RunState::Completed => write!(f, "completed"),
            RunState::Failed => write!(f, "failed"),
            RunState::TimedOut => write!(f, "timed-out"),
            RunState::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Outcome of one suite run, produced by exactly one worker
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunOutcome {
    pub suite: String,
    pub state: RunState,
    /// Case results in suite declaration order
    pub cases: Vec<CaseResult>,
    /// Engine-level annotations for this run
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl RunOutcome {
    /// Build an outcome from the cases a finished run reported. The terminal
    /// state is `Failed` when any case failed or errored, `Completed`
    /// otherwise (skipped-only runs complete cleanly).
    pub fn finished(suite: impl Into<String>, cases: Vec<CaseResult>) -> Self {
        let state = if cases.iter().any(|c| c.status.is_error()) {
            RunState::Failed
        } else {
            RunState::Completed
        };
        Self {
            suite: suite.into(),
            state,
            cases,
            notes: Vec::new(),
        }
    }

    /// A run whose only recorded case is a policy skip.
    pub fn skipped(suite: impl Into<String>, reason: impl Into<String>) -> Self {
        let suite = suite.into();
        let case = CaseResult::skipped(suite.clone(), reason);
        Self {
            suite,
            state: RunState::Completed,
            cases: vec![case],
            notes: Vec::new(),
        }
    }

    /// A run terminated for exceeding its time budget. Counts as one error.
    pub fn timed_out(suite: impl Into<String>, timeout_secs: u64) -> Self {
        let suite = suite.into();
        let case = CaseResult::error(
            suite.clone(),
            format!("run exceeded timeout of {timeout_secs}s"),
        );
        Self {
            suite,
            state: RunState::TimedOut,
            cases: vec![case],
            notes: Vec::new(),
        }
    }

    /// A run that never reached (or never finished) execution because of an
    /// external stop request. Contributes no cases and no errors.
    pub fn cancelled(suite: impl Into<String>, note: impl Into<String>) -> Self {
        Self {
            suite: suite.into(),
            state: RunState::Cancelled,
            cases: Vec::new(),
            notes: vec![note.into()],
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Number of cases counting against the global error total.
    pub fn error_cases(&self) -> usize {
        self.cases.iter().filter(|c| c.status.is_error()).count()
    }
}

/// Report entry for one suite
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SuiteReport {
    pub suite: String,
    pub state: RunState,
    pub cases: Vec<CaseResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

/// Unified report over all discovered suites
///
/// Suite entries are in discovery order and case lists in declaration order,
/// so the report is reproducible regardless of completion order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AggregatedReport {
    pub suites: Vec<SuiteReport>,
    /// Total failed + error cases across all runs
    pub error_count: usize,
    /// Feature/platform gates that altered behavior during this run
    pub scenarios: Vec<String>,
    /// Free-text engine-level annotations
    pub notes: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl AggregatedReport {
    pub fn total_cases(&self) -> usize {
        self.suites.iter().map(|s| s.cases.len()).sum()
    }

    pub fn count_status(&self, status: CaseStatus) -> usize {
        self.suites
            .iter()
            .flat_map(|s| s.cases.iter())
            .filter(|c| c.status == status)
            .count()
    }

    pub fn count_state(&self, state: RunState) -> usize {
        self.suites.iter().filter(|s| s.state == state).count()
    }

    pub fn is_all_passed(&self) -> bool {
        self.error_count == 0 && self.count_state(RunState::Cancelled) == 0
    }
}

impl fmt::Display for AggregatedReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Test Report - {} suites", self.suites.len())?;
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        for suite in &self.suites {
            writeln!(f, "  {} [{}]", suite.suite, suite.state)?;
            for case in &suite.cases {
                writeln!(f, "    {case}")?;
            }
        }
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(
            f,
            "Cases: {} | Pass: {} | Fail: {} | Skip: {} | Error: {}",
            self.total_cases(),
            self.count_status(CaseStatus::Passed),
            self.count_status(CaseStatus::Failed),
            self.count_status(CaseStatus::Skipped),
            self.count_status(CaseStatus::Error),
        )?;
        writeln!(
            f,
            "Suites: {} completed | {} failed | {} timed-out | {} cancelled | errors: {}",
            self.count_state(RunState::Completed),
            self.count_state(RunState::Failed),
            self.count_state(RunState::TimedOut),
            self.count_state(RunState::Cancelled),
            self.error_count,
        )?;
        if !self.scenarios.is_empty() {
            writeln!(f, "Scenarios: {}", self.scenarios.join(", "))?;
        }
        for note in &self.notes {
            writeln!(f, "Note: {note}")?;
        }
        Ok(())
    }
}
