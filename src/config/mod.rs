//! Engine configuration
//!
//! Typed settings snapshot built from the resolved configuration, plus the
//! layered file/include resolver.

#![allow(dead_code)]

pub mod resolver;

pub use resolver::{ConfigError, ConfigResolver, EffectiveConfig, IncludeConflict};

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Configuration file locations (in order of precedence)
const CONFIG_LOCATIONS: &[&str] = &[
    "./simtest.yaml",
    "./simtest.yml",
    "./.simtest.yaml",
    "~/.config/simtest/config.yaml",
    "~/.simtest.yaml",
];

/// Console verbosity, ordered quiet < normal < loud < debug
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Quiet,
    Normal,
    Loud,
    Debug,
}

impl Verbosity {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "quiet" => Some(Verbosity::Quiet),
            "normal" => Some(Verbosity::Normal),
            "loud" => Some(Verbosity::Loud),
            "debug" => Some(Verbosity::Debug),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "quiet",
            Verbosity::Normal => "normal",
            Verbosity::Loud => "loud",
            Verbosity::Debug => "debug",
        }
    }
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable engine settings snapshot
///
/// Built once from the effective configuration (CLI flags may override
/// before scheduling starts); the scheduler and workers read it behind an
/// `Arc` and never write it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Run suites concurrently instead of strictly sequentially
    pub concurrent: bool,

    /// Worker pool size when concurrent (must be positive)
    pub thread_limit: usize,

    /// Keep captured simulator output for every run
    pub debug: bool,

    /// Dump captured output to the log when a run fails
    pub log_fail: bool,

    /// Force-execute cases that would otherwise be skipped
    pub ignore_skips: bool,

    /// Console verbosity level
    pub verbosity: Verbosity,

    /// Default simulator rank count
    pub num_ranks: u32,

    /// Default simulator thread count (distinct from the engine pool size)
    pub num_threads: u32,

    /// Extra arguments appended to every simulator invocation
    pub global_args: Vec<String>,

    /// Path to the simulator executable
    pub sim_binary: PathBuf,

    /// Default per-run timeout in seconds (descriptors may override)
    pub run_timeout_secs: Option<u64>,

    /// Suites skipped by configuration, by name
    pub skip_suites: Vec<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            concurrent: false,
            thread_limit: 8,
            debug: false,
            log_fail: false,
            ignore_skips: false,
            verbosity: Verbosity::Normal,
            num_ranks: 1,
            num_threads: 1,
            global_args: Vec::new(),
            sim_binary: PathBuf::from("sim"),
            run_timeout_secs: None,
            skip_suites: Vec::new(),
        }
    }
}

impl EngineSettings {
    /// Build settings from the resolved configuration. Malformed values in
    /// the effective mapping are fatal, the same as a malformed base file.
    pub fn from_effective(config: &EffectiveConfig) -> Result<Self> {
        let mut settings = Self::default();

        if let Some(v) = config.get_bool("concurrent")? {
            settings.concurrent = v;
        }
        if let Some(v) = config.get_u64("thread_limit")? {
            if v == 0 {
                bail!("config key 'thread_limit' must be positive");
            }
            settings.thread_limit = v as usize;
        }
        if let Some(v) = config.get_bool("debug")? {
            settings.debug = v;
        }
        if let Some(v) = config.get_bool("log_fail")? {
            settings.log_fail = v;
        }
        if let Some(v) = config.get_bool("ignore_skips")? {
            settings.ignore_skips = v;
        }
        if let Some(raw) = config.get("verbosity") {
            settings.verbosity = Verbosity::parse(raw)
                .ok_or_else(|| anyhow::anyhow!("unknown verbosity level: '{raw}'"))?;
        }
        if let Some(v) = config.get_u32("num_ranks")? {
            settings.num_ranks = v;
        }
        if let Some(v) = config.get_u32("num_threads")? {
            settings.num_threads = v;
        }
        if let Some(raw) = config.get("global_args") {
            settings.global_args = raw.split_whitespace().map(String::from).collect();
        }
        if let Some(raw) = config.get("sim_binary") {
            settings.sim_binary = PathBuf::from(raw);
        }
        if let Some(v) = config.get_u64("run_timeout_secs")? {
            settings.run_timeout_secs = Some(v);
        }
        if let Some(raw) = config.get("skip_suites") {
            settings.skip_suites = raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        Ok(settings)
    }

    pub fn with_concurrent(mut self, concurrent: bool) -> Self {
        self.concurrent = concurrent;
        self
    }

    pub fn with_thread_limit(mut self, limit: usize) -> Self {
        self.thread_limit = limit;
        self
    }

    pub fn with_ignore_skips(mut self, ignore: bool) -> Self {
        self.ignore_skips = ignore;
        self
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Effective worker pool size for the scheduler.
    pub fn pool_size(&self) -> usize {
        if self.concurrent {
            self.thread_limit
        } else {
            1
        }
    }
}

/// Find a base configuration file in the standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    for location in CONFIG_LOCATIONS {
        let path = expand_path(location);
        if path.exists() {
            return Some(path);
        }
    }
    None
}

/// Expand ~ to home directory
fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn verbosity_ordering() {
        assert!(Verbosity::Quiet < Verbosity::Normal);
        assert!(Verbosity::Normal < Verbosity::Loud);
        assert!(Verbosity::Loud < Verbosity::Debug);
    }

    #[test]
    fn verbosity_parse() {
        assert_eq!(Verbosity::parse("LOUD"), Some(Verbosity::Loud));
        assert_eq!(Verbosity::parse("chatty"), None);
    }

    #[test]
    fn default_settings() {
        let settings = EngineSettings::default();
        assert!(!settings.concurrent);
        assert_eq!(settings.thread_limit, 8);
        assert_eq!(settings.num_ranks, 1);
        assert_eq!(settings.pool_size(), 1);
    }

    #[test]
    fn settings_from_effective() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("base.yaml");
        std::fs::write(
            &base,
            "concurrent: true\nthread_limit: 4\nverbosity: loud\n\
             global_args: \"--stop-at 10us\"\nskip_suites: \"alpha, beta\"\n",
        )
        .unwrap();

        let effective = ConfigResolver::new().with_base(&base).resolve().unwrap();
        let settings = EngineSettings::from_effective(&effective).unwrap();

        assert!(settings.concurrent);
        assert_eq!(settings.thread_limit, 4);
        assert_eq!(settings.pool_size(), 4);
        assert_eq!(settings.verbosity, Verbosity::Loud);
        assert_eq!(settings.global_args, vec!["--stop-at", "10us"]);
        assert_eq!(settings.skip_suites, vec!["alpha", "beta"]);
    }

    #[test]
    fn zero_thread_limit_is_rejected() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("base.yaml");
        std::fs::write(&base, "thread_limit: 0\n").unwrap();

        let effective = ConfigResolver::new().with_base(&base).resolve().unwrap();
        assert!(EngineSettings::from_effective(&effective).is_err());
    }

    #[test]
    fn expand_plain_path() {
        assert_eq!(expand_path("./x.yaml"), PathBuf::from("./x.yaml"));
    }
}
