//! simtest - test orchestration engine for a discrete-event simulator
//!
//! Discovers test suites, runs each as an isolated invocation of the
//! external simulator binary, and aggregates pass/fail/skip outcomes into a
//! unified, reproducible report.
//!
//! ## Usage
//!
//! ```bash
//! # Run all suites found under ./suites, four at a time
//! simtest run --suite-dir suites --concurrent --threads 4
//!
//! # Sequential run with a per-run timeout and two simulator ranks
//! simtest run --suite-dir suites --ranks 2 --timeout 300
//!
//! # List discovered suites
//! simtest list --suite-dir suites
//!
//! # Show the resolved configuration with include provenance
//! simtest config --config simtest.yaml --core-include conf/core
//! ```

use anyhow::{bail, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{debug, info, warn};

mod cli;
mod config;
mod discovery;
mod engine;
mod invoker;
mod models;
mod output;
mod utils;
mod workspace;

use cli::{Args, Command};
use config::{ConfigResolver, EngineSettings, Verbosity};
use engine::{EngineContext, Scheduler};
use invoker::ProcessInvoker;
use models::RunState;
use output::ReportFormat;
use workspace::Workspace;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Run(run_args) => run_suites(run_args).await,
        Command::List(list_args) => {
            list_suites(list_args);
            Ok(())
        }
        Command::Config(config_args) => show_config(config_args),
    }
}

fn resolve_effective(
    base: Option<std::path::PathBuf>,
    core_includes: &[std::path::PathBuf],
    element_includes: &[std::path::PathBuf],
) -> Result<config::EffectiveConfig> {
    let mut resolver = ConfigResolver::new();
    if let Some(base) = base.or_else(config::find_config_file) {
        resolver = resolver.with_base(base);
    }
    for dir in core_includes {
        resolver = resolver.add_core_include_dir(dir);
    }
    for dir in element_includes {
        resolver = resolver.add_element_include_dir(dir);
    }
    resolver.resolve()
}

async fn run_suites(args: cli::RunArgs) -> Result<()> {
    let effective = resolve_effective(
        args.config.clone(),
        &args.core_includes,
        &args.element_includes,
    )?;
    let mut settings = EngineSettings::from_effective(&effective)?;

    // CLI overrides; the only legal write window is before scheduling.
    // An absent flag is not an override, so a file-set verbosity holds.
    if let Some(verbosity) = args.verbosity_override() {
        settings.verbosity = verbosity;
    }
    if args.concurrent {
        settings.concurrent = true;
    }
    if let Some(threads) = args.threads {
        if threads == 0 {
            bail!("--threads must be positive");
        }
        settings.thread_limit = threads;
    }
    if let Some(ranks) = args.ranks {
        settings.num_ranks = ranks;
    }
    if let Some(threads) = args.sim_threads {
        settings.num_threads = threads;
    }
    if let Some(binary) = args.sim_binary {
        settings.sim_binary = binary;
    }
    settings.global_args.extend(args.sim_args);
    if args.ignore_skips {
        settings.ignore_skips = true;
    }
    if let Some(secs) = args.timeout {
        settings.run_timeout_secs = Some(secs);
    }
    if let Some(skip) = &args.skip {
        settings.skip_suites.extend(
            skip.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        );
    }

    // Resolution ran before the subscriber existed; replay its diagnostics.
    utils::logger::init_logger(settings.verbosity);
    for line in &effective.applied {
        debug!("config: {line}");
    }
    for conflict in &effective.conflicts {
        warn!(
            "config: element include {} may not override core key '{}' \
             (kept '{}', rejected '{}')",
            conflict.fragment.display(),
            conflict.key,
            conflict.kept,
            conflict.rejected
        );
    }

    let workspace = Workspace::prepare(&args.output_dir)?;
    if args.clear {
        workspace.clear()?;
    }

    let descriptors = discovery::discover_suites(&args.suite_dirs, &workspace, &settings)?;
    if descriptors.is_empty() {
        warn!("No test suites discovered, nothing to run");
        return Ok(());
    }
    info!("Discovered {} test suites", descriptors.len());

    let ctx = Arc::new(EngineContext::new(settings));
    {
        let ctx = Arc::clone(&ctx);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                ctx.request_stop();
            }
        });
    }

    let scheduler = Scheduler::new(Arc::new(ProcessInvoker));
    let report = scheduler.run_all(descriptors, Arc::clone(&ctx)).await;

    output::write_report(&report, workspace.xml_root())?;

    let format = ReportFormat::parse(&args.format).unwrap_or(ReportFormat::Summary);
    println!("{}", output::render(&report, format)?);

    let cancelled = report.count_state(RunState::Cancelled);
    if report.error_count > 0 {
        bail!("{} case(s) failed or errored", report.error_count);
    }
    if cancelled > 0 {
        bail!("run cancelled with {cancelled} suite(s) not completed");
    }
    Ok(())
}

fn list_suites(args: cli::ListArgs) {
    utils::logger::init_logger(Verbosity::Normal);

    let scripts = discovery::find_suite_scripts(&args.suite_dirs);
    if scripts.is_empty() {
        println!("No test suites found");
        return;
    }
    println!("Discovered {} test suites:", scripts.len());
    for script in scripts {
        println!("  {}", script.display());
    }
}

fn show_config(args: cli::ConfigArgs) -> Result<()> {
    utils::logger::init_logger(Verbosity::Normal);

    let effective = resolve_effective(args.config, &args.core_includes, &args.element_includes)?;

    println!("Resolution log:");
    for line in &effective.applied {
        println!("  {line}");
    }
    if !effective.conflicts.is_empty() {
        println!("Conflicts (core value kept):");
        for conflict in &effective.conflicts {
            println!(
                "  {} = {} (rejected {} from {})",
                conflict.key,
                conflict.kept,
                conflict.rejected,
                conflict.fragment.display()
            );
        }
    }
    println!("Effective configuration:");
    for (key, value) in effective.iter() {
        println!("  {key} = {value}");
    }
    Ok(())
}
