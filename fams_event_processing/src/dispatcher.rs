//! Ingress fan-out by category tag.
//!
//! The dispatcher reads the first byte of each message and forwards the
//! exact bytes to the matching egress queue. Bodies are never decoded.

use crate::context::{AppContext, QueueSet};
use crate::startup::StartupReport;
use fams_common::frame::{Category, FrameError, peek_category};
use fams_shared_memory::{Received, SharedQueue};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Thread name of the dispatcher.
pub const DISPATCHER_THREAD: &str = "dispatcher";

/// Pause after a failed receive before trying again.
const RECEIVE_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Counters reported when the dispatcher stops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Messages taken off the ingress queue.
    pub received: u64,
    /// Messages forwarded, indexed by `tag - 1`.
    pub routed: [u64; 5],
    /// Messages with an unknown tag or no bytes.
    pub dropped: u64,
    /// Messages lost because the egress send failed.
    pub forward_errors: u64,
}

impl DispatchStats {
    /// Messages forwarded to `category`.
    pub fn routed_to(&self, category: Category) -> u64 {
        self.routed[category.tag() as usize - 1]
    }
}

/// What happened to one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Forwarded to the egress queue of this category.
    Forwarded(Category),
    /// Dropped: empty or unknown tag.
    Dropped,
    /// Egress send failed.
    Failed(Category),
}

/// Routes ingress messages to egress queues.
#[derive(Debug)]
pub struct Dispatcher<'q> {
    queues: &'q QueueSet,
    stats: DispatchStats,
}

impl<'q> Dispatcher<'q> {
    /// Dispatcher over `queues`.
    pub fn new(queues: &'q QueueSet) -> Self {
        Self {
            queues,
            stats: DispatchStats::default(),
        }
    }

    /// Forward one message.
    pub fn dispatch(&mut self, message: &[u8]) -> Route {
        self.stats.received += 1;
        let category = match peek_category(message) {
            Ok(category) => category,
            Err(FrameError::UnknownCategory { tag }) => {
                warn!(tag, len = message.len(), "unknown frame tag, message dropped");
                self.stats.dropped += 1;
                return Route::Dropped;
            }
            Err(e) => {
                warn!(len = message.len(), "unroutable message dropped: {}", e);
                self.stats.dropped += 1;
                return Route::Dropped;
            }
        };

        let queue = self.queues.egress(category);
        match queue.send(message) {
            Ok(()) => {
                self.stats.routed[category.tag() as usize - 1] += 1;
                debug!(%category, len = message.len(), "forwarded");
                Route::Forwarded(category)
            }
            Err(e) => {
                error!(%category, queue = %queue.name(), "drop message: {}", e);
                self.stats.forward_errors += 1;
                Route::Failed(category)
            }
        }
    }

    /// Receive and forward until end-of-stream.
    pub fn run(mut self) -> DispatchStats {
        let ingress: &SharedQueue = self.queues.ingress();
        loop {
            match ingress.receive() {
                Ok(Received::Message(bytes)) => {
                    self.dispatch(&bytes);
                }
                Ok(Received::EndOfStream) => break,
                Err(e) => {
                    error!(queue = %ingress.name(), "receive failed: {}", e);
                    std::thread::sleep(RECEIVE_RETRY_DELAY);
                }
            }
        }
        info!(
            received = self.stats.received,
            routed = ?self.stats.routed,
            dropped = self.stats.dropped,
            forward_errors = self.stats.forward_errors,
            "dispatcher stopped"
        );
        self.stats
    }

    /// Counters so far.
    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }
}

/// Thread entry point: report ready, then run until end-of-stream.
pub fn run_dispatcher(ctx: Arc<AppContext>, report: StartupReport) -> DispatchStats {
    let dispatcher = Dispatcher::new(&ctx.queues);
    report.ready(DISPATCHER_THREAD);
    info!(queue = %ctx.queues.ingress().name(), "dispatcher running");
    dispatcher.run()
}
