//! Daemon assembly: spawn the dispatcher and worker pool, wait for every
//! thread to report ready, hand back a running [`EventProcessor`].

use crate::context::AppContext;
use crate::dispatcher::{DISPATCHER_THREAD, run_dispatcher};
use crate::error::EventProcessingError;
use crate::shutdown::{ShutdownCoordinator, ShutdownReport, ThreadSummary};
use crate::startup::StartupReport;
use crate::worker::{run_worker, worker_thread_name};
use fams_common::frame::Category;
use std::sync::Arc;
use std::thread;
use tracing::{error, info, warn};

/// A running event processing daemon.
#[derive(Debug)]
pub struct EventProcessor {
    ctx: Arc<AppContext>,
    coordinator: ShutdownCoordinator,
}

impl EventProcessor {
    /// Spawn every thread and wait for readiness.
    ///
    /// On any failure the threads already spawned are stopped and the queues
    /// released before the error is returned.
    ///
    /// # Errors
    ///
    /// - [`EventProcessingError::ThreadSpawn`] if the OS refuses a thread
    /// - [`EventProcessingError::StartupFailed`] if a thread reports a failure
    /// - [`EventProcessingError::StartupTimeout`] if readiness takes too long
    pub fn start(ctx: Arc<AppContext>) -> Result<Self, EventProcessingError> {
        let workers = &ctx.config.workers;
        let report = StartupReport::new(1 + workers.total());
        let mut coordinator = ShutdownCoordinator::new(Arc::clone(&ctx));

        if let Err(e) = spawn_all(&ctx, &report, &mut coordinator) {
            error!("thread spawn failed: {}", e);
            abort(coordinator, &ctx);
            return Err(e);
        }

        let startup_timeout = ctx.config.shutdown.startup_timeout();
        if let Err(e) = report.wait(startup_timeout) {
            error!("startup failed: {}", e);
            abort(coordinator, &ctx);
            return Err(e);
        }

        info!(
            service = %ctx.config.shared.service_name,
            threads = coordinator.len(),
            "event processing running"
        );
        Ok(Self { ctx, coordinator })
    }

    /// Shared application context.
    pub fn context(&self) -> &Arc<AppContext> {
        &self.ctx
    }

    /// Stop every thread and release the queues.
    ///
    /// # Errors
    ///
    /// See [`ShutdownCoordinator::shutdown`].
    pub fn shutdown(self) -> Result<ShutdownReport, EventProcessingError> {
        let timeout = self.ctx.config.shutdown.join_timeout();
        self.coordinator.shutdown(timeout)
    }
}

fn spawn_all(
    ctx: &Arc<AppContext>,
    report: &StartupReport,
    coordinator: &mut ShutdownCoordinator,
) -> Result<(), EventProcessingError> {
    let handle = {
        let ctx = Arc::clone(ctx);
        let report = report.clone();
        spawn(DISPATCHER_THREAD, move || {
            ThreadSummary::Dispatcher(run_dispatcher(ctx, report))
        })?
    };
    coordinator.register(DISPATCHER_THREAD, handle);

    for category in Category::ALL {
        for index in 0..ctx.config.workers.threads(category) {
            let name = worker_thread_name(category, index);
            let ctx = Arc::clone(ctx);
            let report = report.clone();
            let handle = spawn(&name, move || ThreadSummary::Worker {
                category,
                stats: run_worker(ctx, category, index, report),
            })?;
            coordinator.register(name, handle);
        }
    }
    Ok(())
}

fn spawn<F>(name: &str, f: F) -> Result<thread::JoinHandle<ThreadSummary>, EventProcessingError>
where
    F: FnOnce() -> ThreadSummary + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(f)
        .map_err(|source| EventProcessingError::ThreadSpawn {
            name: name.to_string(),
            source,
        })
}

fn abort(coordinator: ShutdownCoordinator, ctx: &AppContext) {
    if let Err(e) = coordinator.shutdown(ctx.config.shutdown.join_timeout()) {
        warn!("cleanup after failed startup: {}", e);
    }
}
