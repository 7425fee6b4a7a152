//! Simulator process invocation
//!
//! The boundary between the engine and the external simulator binary. One
//! process per run, launched in the suite's isolated run directory with the
//! resolved rank/thread/argument set; exit status and captured streams are
//! mapped to a run outcome.
//!
//! Case-level results are read from stdout lines of the form
//! `CASE <name> <PASS|FAIL|SKIP|ERROR> [duration_ms] [detail...]`. A run
//! that reports no case lines is summarized as a single synthetic case
//! named after the suite.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::config::EngineSettings;
use crate::models::{CaseResult, CaseStatus, RunDescriptor, RunOutcome};
use crate::utils::Timer;

/// Seam between the scheduler and the simulator boundary. The scheduler only
/// ever sees this trait, so tests can substitute a stub.
pub trait Invoker: Send + Sync {
    fn invoke(
        &self,
        descriptor: RunDescriptor,
        settings: Arc<EngineSettings>,
    ) -> BoxFuture<'static, RunOutcome>;
}

/// Spawns the real simulator binary
pub struct ProcessInvoker;

impl Invoker for ProcessInvoker {
    fn invoke(
        &self,
        descriptor: RunDescriptor,
        settings: Arc<EngineSettings>,
    ) -> BoxFuture<'static, RunOutcome> {
        run_simulator(descriptor, settings).boxed()
    }
}

async fn run_simulator(descriptor: RunDescriptor, settings: Arc<EngineSettings>) -> RunOutcome {
    let suite = descriptor.suite.clone();
    let ranks = descriptor.num_ranks.unwrap_or(settings.num_ranks);
    let threads = descriptor.num_threads.unwrap_or(settings.num_threads);

    let mut cmd = Command::new(&settings.sim_binary);
    cmd.arg("-n")
        .arg(ranks.to_string())
        .arg("-t")
        .arg(threads.to_string())
        .args(&settings.global_args)
        .args(&descriptor.extra_args)
        .arg(&descriptor.script)
        .current_dir(&descriptor.run_dir)
        .env("SIMTEST_TMPDIR", &descriptor.tmp_dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        // The scheduler may drop this invocation on timeout or cancellation;
        // the child must not outlive it.
        .kill_on_drop(true);

    debug!("Spawning simulator for {suite} (ranks={ranks}, threads={threads})");
    let timer = Timer::start(format!("run {suite}"));

    let output = match cmd.output().await {
        Ok(output) => output,
        Err(e) => {
            error!("Failed to spawn simulator for {suite}: {e}");
            return RunOutcome::finished(
                suite.clone(),
                vec![CaseResult::error(
                    suite,
                    format!("failed to spawn simulator: {e}"),
                )],
            );
        }
    };

    let elapsed_ms = timer.elapsed_ms();
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    let mut cases = parse_case_lines(&stdout);

    if output.status.success() {
        if cases.is_empty() {
            cases.push(CaseResult::passed(suite.clone(), elapsed_ms));
        }
    } else if let Some(code) = output.status.code() {
        // The suite may have reported its own failing cases before exiting
        // non-zero; only synthesize one when it did not.
        if !cases.iter().any(|c| c.status.is_error()) {
            cases.push(CaseResult::error(
                suite.clone(),
                format!("simulator exited with status {code}"),
            ));
        }
    } else {
        let detail = signal_detail(&output.status);
        error!("Simulator for {suite} {detail}");
        cases.push(CaseResult::error(suite.clone(), detail));
    }

    let failed = cases.iter().any(|c| c.status.is_error());
    if settings.debug || (settings.log_fail && failed) {
        persist_captured(&descriptor, &stdout, &stderr);
    }
    if settings.log_fail && failed && !stderr.is_empty() {
        info!("Captured stderr for {suite}:\n{stderr}");
    }

    RunOutcome::finished(suite, cases).with_note(format!("run finished in {elapsed_ms}ms"))
}

/// Parse `CASE <name> <status> [duration_ms] [detail...]` lines.
fn parse_case_lines(stdout: &str) -> Vec<CaseResult> {
    let mut cases = Vec::new();
    for line in stdout.lines() {
        let mut tokens = line.split_whitespace();
        if tokens.next() != Some("CASE") {
            continue;
        }
        let (name, status) = match (tokens.next(), tokens.next()) {
            (Some(name), Some(status)) => (name, status),
            _ => continue,
        };
        let status = match status {
            "PASS" => CaseStatus::Passed,
            "FAIL" => CaseStatus::Failed,
            "SKIP" => CaseStatus::Skipped,
            "ERROR" => CaseStatus::Error,
            other => {
                debug!("Ignoring case line with unknown status '{other}'");
                continue;
            }
        };

        let rest: Vec<&str> = tokens.collect();
        let (duration_ms, detail_tokens) = match rest.first().and_then(|t| t.parse::<u64>().ok()) {
            Some(ms) => (ms, &rest[1..]),
            None => (0, &rest[..]),
        };
        let detail = if detail_tokens.is_empty() {
            None
        } else {
            Some(detail_tokens.join(" "))
        };

        cases.push(CaseResult {
            name: name.to_string(),
            status,
            duration_ms,
            detail,
            notes: Vec::new(),
        });
    }
    cases
}

#[cfg(unix)]
fn signal_detail(status: &std::process::ExitStatus) -> String {
    use std::os::unix::process::ExitStatusExt;
    match status.signal() {
        Some(sig) => format!("terminated by signal {sig}"),
        None => "terminated without exit status".to_string(),
    }
}

#[cfg(not(unix))]
fn signal_detail(_status: &std::process::ExitStatus) -> String {
    "terminated without exit status".to_string()
}

/// Keep captured streams next to the run for later inspection. Best-effort;
/// a write failure must not fail the run.
fn persist_captured(descriptor: &RunDescriptor, stdout: &str, stderr: &str) {
    for (name, content) in [("simulator.out", stdout), ("simulator.err", stderr)] {
        let path = descriptor.run_dir.join(name);
        if let Err(e) = std::fs::write(&path, content) {
            debug!("Could not write {}: {e}", path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RunState;
    use tempfile::tempdir;

    #[test]
    fn parses_case_lines() {
        let stdout = "\
some banner\n\
CASE link_setup PASS 12\n\
CASE clock_drift FAIL 340 expected 10us got 11us\n\
CASE mpi_only SKIP requires 2 ranks\n\
CASE weird BOGUS 1\n\
not a case line\n";

        let cases = parse_case_lines(stdout);
        assert_eq!(cases.len(), 3);
        assert_eq!(cases[0].name, "link_setup");
        assert_eq!(cases[0].status, CaseStatus::Passed);
        assert_eq!(cases[0].duration_ms, 12);
        assert_eq!(cases[1].status, CaseStatus::Failed);
        assert_eq!(cases[1].detail.as_deref(), Some("expected 10us got 11us"));
        assert_eq!(cases[2].status, CaseStatus::Skipped);
        assert_eq!(cases[2].duration_ms, 0);
    }

    #[test]
    fn case_line_without_duration() {
        let cases = parse_case_lines("CASE a PASS\n");
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].duration_ms, 0);
        assert_eq!(cases[0].detail, None);
    }

    #[cfg(unix)]
    fn fake_sim(dir: &std::path::Path, body: &str) -> std::path::PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("fakesim");
        std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    fn descriptor_in(dir: &std::path::Path) -> RunDescriptor {
        let run_dir = dir.join("run");
        let tmp_dir = dir.join("tmp");
        std::fs::create_dir_all(&run_dir).unwrap();
        std::fs::create_dir_all(&tmp_dir).unwrap();
        RunDescriptor::new("alpha", dir.join("testsuite_alpha.py"), run_dir, tmp_dir, 0)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn clean_exit_without_case_lines_is_one_pass() {
        let dir = tempdir().unwrap();
        let sim = fake_sim(dir.path(), "echo hello\nexit 0\n");
        let mut settings = EngineSettings::default();
        settings.sim_binary = sim;

        let outcome = run_simulator(descriptor_in(dir.path()), Arc::new(settings)).await;
        assert_eq!(outcome.state, RunState::Completed);
        assert_eq!(outcome.cases.len(), 1);
        assert_eq!(outcome.cases[0].status, CaseStatus::Passed);
        assert_eq!(outcome.cases[0].name, "alpha");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn reported_cases_plus_nonzero_exit() {
        let dir = tempdir().unwrap();
        let sim = fake_sim(
            dir.path(),
            "echo 'CASE a PASS 5'\necho 'CASE b FAIL 3 mismatch'\nexit 1\n",
        );
        let mut settings = EngineSettings::default();
        settings.sim_binary = sim;

        let outcome = run_simulator(descriptor_in(dir.path()), Arc::new(settings)).await;
        assert_eq!(outcome.state, RunState::Failed);
        // The suite reported its own failure; no synthetic case is added.
        assert_eq!(outcome.cases.len(), 2);
        assert_eq!(outcome.error_cases(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_without_failures_synthesizes_error() {
        let dir = tempdir().unwrap();
        let sim = fake_sim(dir.path(), "echo 'CASE a PASS 5'\nexit 3\n");
        let mut settings = EngineSettings::default();
        settings.sim_binary = sim;

        let outcome = run_simulator(descriptor_in(dir.path()), Arc::new(settings)).await;
        assert_eq!(outcome.state, RunState::Failed);
        assert_eq!(outcome.cases.len(), 2);
        assert_eq!(outcome.cases[1].status, CaseStatus::Error);
        assert!(outcome.cases[1]
            .detail
            .as_deref()
            .unwrap()
            .contains("status 3"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn missing_binary_is_an_error_case() {
        let dir = tempdir().unwrap();
        let mut settings = EngineSettings::default();
        settings.sim_binary = dir.path().join("no_such_sim");

        let outcome = run_simulator(descriptor_in(dir.path()), Arc::new(settings)).await;
        assert_eq!(outcome.state, RunState::Failed);
        assert_eq!(outcome.error_cases(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn debug_mode_persists_captured_output() {
        let dir = tempdir().unwrap();
        let sim = fake_sim(dir.path(), "echo stdout_text\necho stderr_text >&2\nexit 0\n");
        let mut settings = EngineSettings::default();
        settings.sim_binary = sim;
        settings.debug = true;

        let descriptor = descriptor_in(dir.path());
        let run_dir = descriptor.run_dir.clone();
        run_simulator(descriptor, Arc::new(settings)).await;

        let captured = std::fs::read_to_string(run_dir.join("simulator.out")).unwrap();
        assert!(captured.contains("stdout_text"));
    }
}
