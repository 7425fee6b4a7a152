//! Scheduling engine
//!
//! The engine context plus the concurrent scheduler and result aggregator.

#![allow(dead_code)]

mod aggregator;
mod scheduler;

pub use aggregator::ResultAggregator;
pub use scheduler::Scheduler;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::info;

use crate::config::EngineSettings;

/// Shared engine state, constructed once and passed to the scheduler and
/// all workers. Replaces any notion of process-wide globals: the settings
/// snapshot is read-only, the error counter is atomic, and the stop signal
/// is a watch channel every worker can subscribe to.
pub struct EngineContext {
    settings: Arc<EngineSettings>,
    error_count: AtomicUsize,
    stop_tx: watch::Sender<bool>,
    /// Name of the suite currently running. Single-writer, only maintained
    /// in sequential mode; concurrent mode leaves it unset.
    current_suite: Mutex<Option<String>>,
}

impl EngineContext {
    pub fn new(settings: EngineSettings) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            settings: Arc::new(settings),
            error_count: AtomicUsize::new(0),
            stop_tx,
            current_suite: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> Arc<EngineSettings> {
        Arc::clone(&self.settings)
    }

    /// Halt dispatch of new work. In-flight runs get a bounded grace period.
    pub fn request_stop(&self) {
        if !*self.stop_tx.borrow() {
            info!("Stop requested; no new runs will be dispatched");
        }
        let _ = self.stop_tx.send(true);
    }

    pub fn stop_requested(&self) -> bool {
        *self.stop_tx.borrow()
    }

    pub fn stop_receiver(&self) -> watch::Receiver<bool> {
        self.stop_tx.subscribe()
    }

    /// Add to the global error count. Visible mid-run for diagnostics,
    /// authoritative only after every run reaches a terminal state.
    pub fn add_errors(&self, n: usize) {
        if n > 0 {
            self.error_count.fetch_add(n, Ordering::Relaxed);
        }
    }

    pub fn error_count(&self) -> usize {
        self.error_count.load(Ordering::Relaxed)
    }

    pub fn set_current_suite(&self, suite: &str) {
        *self.current_suite.lock().unwrap_or_else(|e| e.into_inner()) = Some(suite.to_string());
    }

    pub fn clear_current_suite(&self) {
        *self.current_suite.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    pub fn current_suite(&self) -> Option<String> {
        self.current_suite
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
