//! Orderly shutdown.
//!
//! Shutdown signals end-of-stream on every queue, waits a bounded time for
//! every thread to return, then releases the queues. A thread that misses
//! the deadline is reported, not waited for.

use crate::context::AppContext;
use crate::dispatcher::DispatchStats;
use crate::error::EventProcessingError;
use crate::worker::WorkerStats;
use fams_common::frame::Category;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// What a thread returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadSummary {
    /// The dispatcher.
    Dispatcher(DispatchStats),
    /// A category worker.
    Worker {
        /// Category served.
        category: Category,
        /// Final counters.
        stats: WorkerStats,
    },
}

/// Outcome of a clean shutdown.
#[derive(Debug, Clone, Default)]
pub struct ShutdownReport {
    /// Every joined thread with its summary, in registration order.
    pub threads: Vec<(String, ThreadSummary)>,
    /// Time from the first end signal to the last join.
    pub elapsed: Duration,
}

impl ShutdownReport {
    /// Stats of the dispatcher, if it was joined.
    pub fn dispatcher(&self) -> Option<&DispatchStats> {
        self.threads.iter().find_map(|(_, summary)| match summary {
            ThreadSummary::Dispatcher(stats) => Some(stats),
            ThreadSummary::Worker { .. } => None,
        })
    }

    /// Sum of worker counters of `category`.
    pub fn worker_totals(&self, category: Category) -> WorkerStats {
        let mut total = WorkerStats::default();
        for (_, summary) in &self.threads {
            if let ThreadSummary::Worker { category: c, stats } = summary {
                if *c == category {
                    total.frames += stats.frames;
                    total.rejected += stats.rejected;
                    total.stored += stats.stored;
                    total.store_errors += stats.store_errors;
                    total.unknown_ports += stats.unknown_ports;
                    total.alerts += stats.alerts;
                    total.all_clears += stats.all_clears;
                }
            }
        }
        total
    }
}

/// Owns every thread handle of the daemon.
#[derive(Debug)]
pub struct ShutdownCoordinator {
    ctx: Arc<AppContext>,
    threads: Vec<(String, JoinHandle<ThreadSummary>)>,
}

impl ShutdownCoordinator {
    /// Coordinator for the queues of `ctx`.
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self {
            ctx,
            threads: Vec::new(),
        }
    }

    /// Track a spawned thread.
    pub fn register(&mut self, name: impl Into<String>, handle: JoinHandle<ThreadSummary>) {
        self.threads.push((name.into(), handle));
    }

    /// Number of tracked threads.
    pub fn len(&self) -> usize {
        self.threads.len()
    }

    /// Whether no thread is tracked.
    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    /// Stop everything.
    ///
    /// Queues are released even when the join fails.
    ///
    /// # Errors
    ///
    /// - [`EventProcessingError::JoinTimeout`] naming the threads still running
    /// - [`EventProcessingError::ThreadPanicked`] for the first panicked thread
    pub fn shutdown(self, timeout: Duration) -> Result<ShutdownReport, EventProcessingError> {
        let started = Instant::now();
        info!(threads = self.threads.len(), ?timeout, "shutting down");
        self.ctx.queues.signal_end_all();

        let deadline = started + timeout;
        while Instant::now() < deadline && !self.threads.iter().all(|(_, h)| h.is_finished()) {
            std::thread::sleep(JOIN_POLL_INTERVAL);
        }

        let mut report = ShutdownReport::default();
        let mut remaining = Vec::new();
        let mut panicked = None;
        for (name, handle) in self.threads {
            if !handle.is_finished() {
                warn!(thread = %name, "thread still running at the join deadline");
                remaining.push(name);
                continue;
            }
            match handle.join() {
                Ok(summary) => report.threads.push((name, summary)),
                Err(_) => {
                    error!(thread = %name, "thread panicked");
                    panicked.get_or_insert(name);
                }
            }
        }
        report.elapsed = started.elapsed();

        self.ctx.queues.release_all();

        if !remaining.is_empty() {
            return Err(EventProcessingError::JoinTimeout { remaining, timeout });
        }
        if let Some(name) = panicked {
            return Err(EventProcessingError::ThreadPanicked(name));
        }
        info!(joined = report.threads.len(), elapsed = ?report.elapsed, "shutdown complete");
        Ok(report)
    }
}

/// One-shot shutdown request shared between the signal handler and `main`.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl ShutdownHandle {
    /// Untriggered handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. Repeated calls are harmless.
    pub fn trigger(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock() = true;
        cvar.notify_all();
    }

    /// Whether shutdown was requested.
    pub fn is_triggered(&self) -> bool {
        *self.inner.0.lock()
    }

    /// Block until shutdown is requested or `timeout` passes. Returns whether
    /// shutdown was requested.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let (lock, cvar) = &*self.inner;
        let mut triggered = lock.lock();
        while !*triggered {
            if cvar.wait_until(&mut triggered, deadline).timed_out() {
                break;
            }
        }
        *triggered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_handle_wakes_waiter() {
        let handle = ShutdownHandle::new();
        assert!(!handle.is_triggered());
        let waiter = {
            let handle = handle.clone();
            thread::spawn(move || handle.wait_timeout(Duration::from_secs(10)))
        };
        thread::sleep(Duration::from_millis(20));
        handle.trigger();
        handle.trigger();
        assert!(waiter.join().unwrap());
        assert!(handle.is_triggered());
    }

    #[test]
    fn test_wait_timeout() {
        let handle = ShutdownHandle::new();
        assert!(!handle.wait_timeout(Duration::from_millis(20)));
        handle.trigger();
        assert!(handle.wait_timeout(Duration::from_millis(20)));
    }

    #[test]
    fn test_worker_totals() {
        let stats = |frames| WorkerStats {
            frames,
            stored: frames * 2,
            alerts: 1,
            all_clears: frames % 2,
            ..WorkerStats::default()
        };
        let report = ShutdownReport {
            threads: vec![
                ("dispatcher".into(), ThreadSummary::Dispatcher(DispatchStats::default())),
                (
                    "worker-sensor-0".into(),
                    ThreadSummary::Worker { category: Category::Sensor, stats: stats(3) },
                ),
                (
                    "worker-sensor-1".into(),
                    ThreadSummary::Worker { category: Category::Sensor, stats: stats(4) },
                ),
                (
                    "worker-outside-0".into(),
                    ThreadSummary::Worker { category: Category::Outside, stats: stats(9) },
                ),
            ],
            elapsed: Duration::ZERO,
        };
        assert!(report.dispatcher().is_some());
        let sensor = report.worker_totals(Category::Sensor);
        assert_eq!(sensor.frames, 7);
        assert_eq!(sensor.stored, 14);
        assert_eq!(sensor.alerts, 2);
        assert_eq!(sensor.all_clears, 1);
        assert_eq!(report.worker_totals(Category::Cistern), WorkerStats::default());
    }
}
