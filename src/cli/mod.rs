//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Verbosity;

/// Test orchestration engine for discrete-event simulator test suites
#[derive(Parser, Debug)]
#[command(name = "simtest")]
#[command(version)]
#[command(about = "Discover and run simulator test suites, emit a unified report")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run discovered test suites
    Run(RunArgs),

    /// List discovered test suites
    List(ListArgs),

    /// Show the resolved configuration
    Config(ConfigArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Base configuration file (searched in standard locations if omitted)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory of core-scoped include fragments (repeatable)
    #[arg(long = "core-include")]
    pub core_includes: Vec<PathBuf>,

    /// Directory of element-scoped include fragments (repeatable)
    #[arg(long = "element-include")]
    pub element_includes: Vec<PathBuf>,

    /// Directory to scan for testsuite_*.py scripts (repeatable)
    #[arg(short, long = "suite-dir", default_value = ".")]
    pub suite_dirs: Vec<PathBuf>,

    /// Top-level output directory
    #[arg(short, long, default_value = "./sim_test_outputs")]
    pub output_dir: PathBuf,

    /// Clear prior run/tmp/xml data before starting
    #[arg(long)]
    pub clear: bool,

    /// Run suites concurrently
    #[arg(long)]
    pub concurrent: bool,

    /// Worker pool size when concurrent
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Simulator rank count
    #[arg(short, long)]
    pub ranks: Option<u32>,

    /// Simulator thread count (passed to the simulator, not the pool)
    #[arg(long)]
    pub sim_threads: Option<u32>,

    /// Simulator binary
    #[arg(long)]
    pub sim_binary: Option<PathBuf>,

    /// Extra simulator argument (repeatable)
    #[arg(long = "sim-arg")]
    pub sim_args: Vec<String>,

    /// Force-execute cases that would otherwise be skipped
    #[arg(long)]
    pub ignore_skips: bool,

    /// Per-run timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Suites to skip (comma-separated names)
    #[arg(long)]
    pub skip: Option<String>,

    /// Console output format (summary, json)
    #[arg(short, long, default_value = "summary")]
    pub format: String,

    /// Increase verbosity (-v loud, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet output (errors and warnings only)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl RunArgs {
    /// Verbosity explicitly requested on the command line, if any. An
    /// absent flag is not an override of the configured value.
    pub fn verbosity_override(&self) -> Option<Verbosity> {
        if self.quiet {
            Some(Verbosity::Quiet)
        } else {
            match self.verbose {
                0 => None,
                1 => Some(Verbosity::Loud),
                _ => Some(Verbosity::Debug),
            }
        }
    }
}

/// Arguments for the list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Directory to scan for testsuite_*.py scripts (repeatable)
    #[arg(short, long = "suite-dir", default_value = ".")]
    pub suite_dirs: Vec<PathBuf>,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Base configuration file (searched in standard locations if omitted)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory of core-scoped include fragments (repeatable)
    #[arg(long = "core-include")]
    pub core_includes: Vec<PathBuf>,

    /// Directory of element-scoped include fragments (repeatable)
    #[arg(long = "element-include")]
    pub element_includes: Vec<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run_defaults() {
        let args = Args::parse_from(["simtest", "run"]);
        match args.command {
            Command::Run(run) => {
                assert!(!run.concurrent);
                assert_eq!(run.threads, None);
                assert_eq!(run.output_dir, PathBuf::from("./sim_test_outputs"));
                assert_eq!(run.format, "summary");
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn parse_run_overrides() {
        let args = Args::parse_from([
            "simtest",
            "run",
            "--concurrent",
            "--threads",
            "4",
            "--ranks",
            "2",
            "--suite-dir",
            "suites",
            "--core-include",
            "conf/core",
            "-vv",
        ]);
        match args.command {
            Command::Run(run) => {
                assert!(run.concurrent);
                assert_eq!(run.threads, Some(4));
                assert_eq!(run.ranks, Some(2));
                assert_eq!(run.verbose, 2);
                assert_eq!(run.core_includes, vec![PathBuf::from("conf/core")]);
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        assert!(Args::try_parse_from(["simtest", "run", "-q", "-v"]).is_err());
    }

    fn run_args(argv: &[&str]) -> RunArgs {
        match Args::parse_from(argv).command {
            Command::Run(run) => run,
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn absent_flags_do_not_override_verbosity() {
        assert_eq!(run_args(&["simtest", "run"]).verbosity_override(), None);
        assert_eq!(
            run_args(&["simtest", "run", "-v"]).verbosity_override(),
            Some(Verbosity::Loud)
        );
        assert_eq!(
            run_args(&["simtest", "run", "-vv"]).verbosity_override(),
            Some(Verbosity::Debug)
        );
        assert_eq!(
            run_args(&["simtest", "run", "-q"]).verbosity_override(),
            Some(Verbosity::Quiet)
        );
    }

    #[test]
    fn file_verbosity_survives_absent_flags() {
        use crate::config::{ConfigResolver, EngineSettings};

        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("base.yaml");
        std::fs::write(&base, "verbosity: loud\n").unwrap();

        let effective = ConfigResolver::new().with_base(&base).resolve().unwrap();
        let mut settings = EngineSettings::from_effective(&effective).unwrap();

        let run = run_args(&["simtest", "run"]);
        if let Some(v) = run.verbosity_override() {
            settings.verbosity = v;
        }
        assert_eq!(settings.verbosity, Verbosity::Loud);

        let run = run_args(&["simtest", "run", "-q"]);
        if let Some(v) = run.verbosity_override() {
            settings.verbosity = v;
        }
        assert_eq!(settings.verbosity, Verbosity::Quiet);
    }
}
