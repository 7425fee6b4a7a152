//! Run descriptors
//!
//! A descriptor is the unit of work for the scheduler: one discovered test
//! suite with its script, workspace subpaths, and run-specific overrides.

#![allow(dead_code)]

use std::path::PathBuf;

/// One schedulable suite run
///
/// Immutable once constructed; consumed exactly once by exactly one worker.
#[derive(Clone, Debug)]
pub struct RunDescriptor {
    /// Suite name (script file stem)
    pub suite: String,
    /// Path to the suite script handed to the simulator
    pub script: PathBuf,
    /// Per-suite working directory under the workspace run root
    pub run_dir: PathBuf,
    /// Per-suite scratch directory under the workspace tmp root
    pub tmp_dir: PathBuf,
    /// Position in discovery order; fixes report ordering
    pub index: usize,
    /// Override for the simulator rank count
    pub num_ranks: Option<u32>,
    /// Override for the simulator thread count
    pub num_threads: Option<u32>,
    /// Extra simulator arguments for this suite only
    pub extra_args: Vec<String>,
    /// Set when a scenario gate decided at discovery time skips this suite
    pub skip_reason: Option<String>,
    /// Per-run timeout override in seconds
    pub timeout_secs: Option<u64>,
}

impl RunDescriptor {
    pub fn new(
        suite: impl Into<String>,
        script: impl Into<PathBuf>,
        run_dir: impl Into<PathBuf>,
        tmp_dir: impl Into<PathBuf>,
        index: usize,
    ) -> Self {
        Self {
            suite: suite.into(),
            script: script.into(),
            run_dir: run_dir.into(),
            tmp_dir: tmp_dir.into(),
            index,
            num_ranks: None,
            num_threads: None,
            extra_args: Vec::new(),
            skip_reason: None,
            timeout_secs: None,
        }
    }

    pub fn with_ranks(mut self, ranks: u32) -> Self {
        self.num_ranks = Some(ranks);
        self
    }

    pub fn with_threads(mut self, threads: u32) -> Self {
        self.num_threads = Some(threads);
        self
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    pub fn with_skip_reason(mut self, reason: impl Into<String>) -> Self {
        self.skip_reason = Some(reason.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}
