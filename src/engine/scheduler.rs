//! Concurrent run scheduling
//!
//! Dispatches run descriptors across a bounded worker pool: strictly
//! sequential in discovery order when concurrency is off, otherwise up to
//! `thread_limit` workers pulling queued descriptors FIFO. Every descriptor
//! reaches exactly one terminal state in the report, including those
//! cancelled before they ever started.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, info, warn};

use crate::config::EngineSettings;
use crate::engine::{EngineContext, ResultAggregator};
use crate::invoker::Invoker;
use crate::models::{AggregatedReport, RunDescriptor, RunOutcome};

/// How long an in-flight run may keep going after a stop request before its
/// invocation is dropped (killing the child process).
const CANCEL_GRACE: Duration = Duration::from_secs(5);

/// Fans suite runs out over the worker pool and collects the report
pub struct Scheduler {
    invoker: Arc<dyn Invoker>,
}

impl Scheduler {
    pub fn new(invoker: Arc<dyn Invoker>) -> Self {
        Self { invoker }
    }

    /// Run every descriptor to a terminal state and return the aggregated
    /// report. Suite ordering in the report follows discovery order no
    /// matter how completion interleaves.
    pub async fn run_all(
        &self,
        descriptors: Vec<RunDescriptor>,
        ctx: Arc<EngineContext>,
    ) -> AggregatedReport {
        let settings = ctx.settings();
        let aggregator = Arc::new(ResultAggregator::new(&descriptors));

        info!(
            "Scheduling {} suites ({})",
            descriptors.len(),
            if settings.concurrent {
                format!("concurrent, {} workers", settings.thread_limit)
            } else {
                "sequential".to_string()
            }
        );

        if settings.concurrent {
            self.run_concurrent(descriptors, &ctx, &settings, &aggregator)
                .await;
        } else {
            self.run_sequential(descriptors, &ctx, &settings, &aggregator)
                .await;
        }

        let aggregator = Arc::into_inner(aggregator).expect("workers still hold the aggregator");
        aggregator.finalize(ctx.error_count())
    }

    async fn run_sequential(
        &self,
        descriptors: Vec<RunDescriptor>,
        ctx: &EngineContext,
        settings: &Arc<EngineSettings>,
        aggregator: &ResultAggregator,
    ) {
        for descriptor in descriptors {
            if ctx.stop_requested() {
                aggregator.record(RunOutcome::cancelled(
                    descriptor.suite,
                    "cancelled before dispatch",
                ));
                continue;
            }

            ctx.set_current_suite(&descriptor.suite);
            let outcome = run_one(
                self.invoker.as_ref(),
                descriptor,
                ctx,
                Arc::clone(settings),
                aggregator,
            )
            .await;
            ctx.clear_current_suite();

            ctx.add_errors(outcome.error_cases());
            aggregator.record(outcome);
        }
    }

    async fn run_concurrent(
        &self,
        descriptors: Vec<RunDescriptor>,
        ctx: &Arc<EngineContext>,
        settings: &Arc<EngineSettings>,
        aggregator: &Arc<ResultAggregator>,
    ) {
        // Workers queue FIFO on the semaphore; spawning in discovery order
        // keeps dispatch order aligned with it.
        let semaphore = Arc::new(Semaphore::new(settings.thread_limit));
        let mut handles = Vec::new();

        for descriptor in descriptors {
            let semaphore = Arc::clone(&semaphore);
            let ctx = Arc::clone(ctx);
            let settings = Arc::clone(settings);
            let aggregator = Arc::clone(aggregator);
            let invoker = Arc::clone(&self.invoker);

            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("worker semaphore closed");

                if ctx.stop_requested() {
                    aggregator.record(RunOutcome::cancelled(
                        descriptor.suite,
                        "cancelled before dispatch",
                    ));
                    return;
                }

                let outcome =
                    run_one(invoker.as_ref(), descriptor, &ctx, settings, &aggregator).await;
                ctx.add_errors(outcome.error_cases());
                aggregator.record(outcome);
            }));
        }

        for result in join_all(handles).await {
            if let Err(e) = result {
                // The aggregator backfills the missing suite as cancelled.
                warn!("Worker task failed: {e}");
            }
        }
    }
}

/// Execute one descriptor to a terminal outcome: skip policy, timeout, and
/// cancellation grace are all applied here.
async fn run_one(
    invoker: &dyn Invoker,
    descriptor: RunDescriptor,
    ctx: &EngineContext,
    settings: Arc<EngineSettings>,
    aggregator: &ResultAggregator,
) -> RunOutcome {
    if let Some(reason) = descriptor.skip_reason.clone() {
        if settings.ignore_skips {
            debug!("Ignoring skip for {} ({reason})", descriptor.suite);
        } else {
            aggregator.add_scenario(format!("skip:{}", descriptor.suite));
            return RunOutcome::skipped(descriptor.suite, reason);
        }
    }

    let suite = descriptor.suite.clone();
    let timeout_secs = descriptor.timeout_secs.or(settings.run_timeout_secs);
    debug!("Dispatching {suite}");

    let invocation = invoker.invoke(descriptor, settings);
    tokio::pin!(invocation);

    let timeout_sleep = async {
        match timeout_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(timeout_sleep);

    let mut stop_rx = ctx.stop_receiver();

    tokio::select! {
        outcome = &mut invocation => outcome,
        _ = &mut timeout_sleep => {
            let secs = timeout_secs.unwrap_or_default();
            warn!("Run {suite} exceeded its {secs}s timeout, terminating");
            RunOutcome::timed_out(suite, secs)
        }
        _ = wait_for_stop(&mut stop_rx) => {
            // Let the in-flight run finish within the grace period before
            // dropping the invocation (which kills the child). The per-run
            // timeout keeps running and still fires if it expires first.
            let grace = tokio::time::sleep(CANCEL_GRACE);
            tokio::pin!(grace);
            tokio::select! {
                outcome = &mut invocation => outcome,
                _ = &mut timeout_sleep => {
                    let secs = timeout_secs.unwrap_or_default();
                    warn!("Run {suite} exceeded its {secs}s timeout, terminating");
                    RunOutcome::timed_out(suite, secs)
                }
                _ = &mut grace => {
                    warn!("Run {suite} terminated after cancellation grace period");
                    RunOutcome::cancelled(suite, "terminated after cancellation grace period")
                }
            }
        }
    }
}

async fn wait_for_stop(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|stop| *stop).await.is_err() {
        // Sender gone means no stop can ever arrive.
        std::future::pending::<()>().await;
    }
}
