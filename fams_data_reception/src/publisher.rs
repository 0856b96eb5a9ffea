//! Ingress queue producer.

use crate::error::{ReceptionError, ReceptionResult};
use crate::request::BatchRequest;
use fams_shared_memory::{QueueError, SharedQueue};
use std::io::BufRead;
use tracing::{debug, info, warn};

/// Counters of one publishing run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishStats {
    /// Frames sent.
    pub published: u64,
    /// Documents rejected before sending.
    pub rejected: u64,
    /// Frame bytes sent.
    pub bytes: u64,
}

/// Attached producer of the ingress queue.
#[derive(Debug)]
pub struct Publisher {
    queue: SharedQueue,
    stats: PublishStats,
}

impl Publisher {
    /// Attach to the queue `name` created by the daemon.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::NotFound`] while the daemon is not running.
    pub fn open(name: &str) -> ReceptionResult<Self> {
        let queue = SharedQueue::open(name)?;
        info!(queue = %name, capacity = queue.capacity(), "attached to ingress queue");
        Ok(Self::with_queue(queue))
    }

    /// Publish through an already attached queue.
    pub fn with_queue(queue: SharedQueue) -> Self {
        Self {
            queue,
            stats: PublishStats::default(),
        }
    }

    /// Validate, encode and send one batch. Blocks while the queue is full.
    ///
    /// # Errors
    ///
    /// - [`ReceptionError::InvalidBatch`] or [`ReceptionError::Frame`] for a
    ///   bad batch, nothing is sent
    /// - [`ReceptionError::Queue`] if the queue ended or refused the frame
    pub fn publish(&mut self, request: &BatchRequest) -> ReceptionResult<usize> {
        let frame = request.validate().and_then(|()| request.to_frame());
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                self.stats.rejected += 1;
                return Err(e);
            }
        };
        self.queue.send(&frame)?;
        self.stats.published += 1;
        self.stats.bytes += frame.len() as u64;
        debug!(category = %request.category(), samples = request.len(), len = frame.len(), "published");
        Ok(frame.len())
    }

    /// Publish one JSON document per line until end of input.
    ///
    /// Blank lines are skipped. A malformed or invalid document is logged and
    /// counted, the run continues.
    ///
    /// # Errors
    ///
    /// Stops at the first read failure or queue failure, including the end of
    /// the stream signalled by the daemon.
    pub fn publish_lines<R: BufRead>(&mut self, reader: R) -> ReceptionResult<PublishStats> {
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let text = line.trim();
            if text.is_empty() {
                continue;
            }
            let request = match BatchRequest::from_json(text) {
                Ok(request) => request,
                Err(source) => {
                    let e = ReceptionError::Parse { line: index + 1, source };
                    warn!("{}", e);
                    self.stats.rejected += 1;
                    continue;
                }
            };
            match self.publish(&request) {
                Ok(_) => {}
                Err(ReceptionError::Queue(e)) => {
                    if matches!(e, QueueError::Ended { .. }) {
                        warn!(queue = %self.queue.name(), "ingress queue ended, stopping");
                    }
                    return Err(ReceptionError::Queue(e));
                }
                Err(e) => warn!(line = index + 1, "batch rejected: {}", e),
            }
        }
        info!(
            published = self.stats.published,
            rejected = self.stats.rejected,
            bytes = self.stats.bytes,
            "input drained"
        );
        Ok(self.stats)
    }

    /// Counters so far.
    pub fn stats(&self) -> PublishStats {
        self.stats
    }
}
