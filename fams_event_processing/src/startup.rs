//! Startup readiness collector.
//!
//! Every spawned thread reports exactly once, ready or failed. The main
//! thread waits for all reports, the first failure, or the deadline,
//! whichever comes first.

use crate::error::EventProcessingError;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Default)]
struct Reports {
    ready: Vec<String>,
    failure: Option<(String, String)>,
}

/// Shared result collector. Cloning yields another handle to the same reports.
#[derive(Debug, Clone)]
pub struct StartupReport {
    expected: usize,
    inner: Arc<(Mutex<Reports>, Condvar)>,
}

impl StartupReport {
    /// Collector waiting for `expected` threads.
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            inner: Arc::new((Mutex::new(Reports::default()), Condvar::new())),
        }
    }

    /// Record that `thread` is ready.
    pub fn ready(&self, thread: &str) {
        let (lock, cvar) = &*self.inner;
        lock.lock().ready.push(thread.to_string());
        debug!(thread, "ready");
        cvar.notify_all();
    }

    /// Record that `thread` could not start. Only the first failure is kept.
    pub fn failed(&self, thread: &str, reason: impl Into<String>) {
        let (lock, cvar) = &*self.inner;
        let mut reports = lock.lock();
        if reports.failure.is_none() {
            reports.failure = Some((thread.to_string(), reason.into()));
        }
        cvar.notify_all();
    }

    /// Threads that reported ready so far.
    pub fn ready_count(&self) -> usize {
        self.inner.0.lock().ready.len()
    }

    /// Block until every thread is ready, one failed, or `timeout` passes.
    ///
    /// # Errors
    ///
    /// - [`EventProcessingError::StartupFailed`] with the first failure
    /// - [`EventProcessingError::StartupTimeout`] if the deadline passes
    pub fn wait(&self, timeout: Duration) -> Result<(), EventProcessingError> {
        let deadline = Instant::now() + timeout;
        let (lock, cvar) = &*self.inner;
        let mut reports = lock.lock();
        loop {
            if let Some((thread, reason)) = &reports.failure {
                return Err(EventProcessingError::StartupFailed {
                    thread: thread.clone(),
                    reason: reason.clone(),
                });
            }
            if reports.ready.len() >= self.expected {
                return Ok(());
            }
            if cvar.wait_until(&mut reports, deadline).timed_out() {
                // Reports may have landed together with the timeout.
                if reports.failure.is_none() && reports.ready.len() < self.expected {
                    return Err(EventProcessingError::StartupTimeout {
                        ready: reports.ready.len(),
                        expected: self.expected,
                        timeout,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_all_ready() {
        let report = StartupReport::new(3);
        let handles: Vec<_> = (0..3)
            .map(|i| {
                let report = report.clone();
                thread::spawn(move || report.ready(&format!("worker-{i}")))
            })
            .collect();
        report.wait(Duration::from_secs(5)).unwrap();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(report.ready_count(), 3);
    }

    #[test]
    fn test_first_failure_returns_early() {
        let report = StartupReport::new(10);
        let failing = report.clone();
        thread::spawn(move || {
            failing.failed("worker-3", "no connection");
            failing.failed("worker-4", "also broken");
        });

        let started = Instant::now();
        let err = report.wait(Duration::from_secs(30)).unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(5));
        match err {
            EventProcessingError::StartupFailed { thread, reason } => {
                assert_eq!(thread, "worker-3");
                assert_eq!(reason, "no connection");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_timeout() {
        let report = StartupReport::new(2);
        report.ready("dispatcher");
        let err = report.wait(Duration::from_millis(30)).unwrap_err();
        assert!(matches!(
            err,
            EventProcessingError::StartupTimeout { ready: 1, expected: 2, .. }
        ));
    }
}
