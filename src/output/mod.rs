//! Report hand-off
//!
//! Serializes the aggregated report for the external report writer and
//! renders the console summary.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::models::AggregatedReport;

/// Output format for the console rendering
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportFormat {
    Summary,
    Json,
}

impl ReportFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "summary" | "table" => Some(ReportFormat::Summary),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

/// Render the report for the console.
pub fn render(report: &AggregatedReport, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Summary => Ok(report.to_string()),
        ReportFormat::Json => {
            serde_json::to_string_pretty(report).context("failed to serialize report")
        }
    }
}

/// Write the structured report snapshot into the workspace XML data root,
/// where the external report writer picks it up.
pub fn write_report(report: &AggregatedReport, xml_root: &Path) -> Result<PathBuf> {
    let path = xml_root.join("report.json");
    let content = serde_json::to_string_pretty(report).context("failed to serialize report")?;
    std::fs::write(&path, content)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!("Report written to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CaseResult, RunOutcome, RunState, SuiteReport};
    use chrono::Utc;
    use tempfile::tempdir;

    fn sample_report() -> AggregatedReport {
        let outcome = RunOutcome::finished("alpha", vec![CaseResult::passed("a1", 3)]);
        AggregatedReport {
            suites: vec![SuiteReport {
                suite: outcome.suite,
                state: outcome.state,
                cases: outcome.cases,
                notes: outcome.notes,
            }],
            error_count: 0,
            scenarios: Vec::new(),
            notes: Vec::new(),
            started_at: Utc::now(),
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn format_parse() {
        assert_eq!(ReportFormat::parse("JSON"), Some(ReportFormat::Json));
        assert_eq!(ReportFormat::parse("table"), Some(ReportFormat::Summary));
        assert_eq!(ReportFormat::parse("xml"), None);
    }

    #[test]
    fn summary_lists_suites() {
        let rendered = render(&sample_report(), ReportFormat::Summary).unwrap();
        assert!(rendered.contains("alpha"));
        assert!(rendered.contains("Pass: 1"));
    }

    #[test]
    fn report_snapshot_round_trips() {
        let dir = tempdir().unwrap();
        let path = write_report(&sample_report(), dir.path()).unwrap();

        let content = std::fs::read_to_string(path).unwrap();
        let loaded: AggregatedReport = serde_json::from_str(&content).unwrap();
        assert_eq!(loaded.suites.len(), 1);
        assert_eq!(loaded.suites[0].state, RunState::Completed);
    }
}
