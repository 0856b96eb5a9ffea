//! Reception error types.

use fams_common::frame::{Category, FrameError};
use fams_shared_memory::QueueError;
use thiserror::Error;

/// Errors raised while turning batches into frames and publishing them.
#[derive(Debug, Error)]
pub enum ReceptionError {
    /// A line is not a valid batch document.
    #[error("Line {line}: invalid batch JSON: {source}")]
    Parse {
        /// 1-based input line
        line: usize,
        /// Underlying JSON error
        source: serde_json::Error,
    },

    /// A batch failed validation.
    #[error("Invalid {category} batch: {reason}")]
    InvalidBatch {
        /// Batch category
        category: Category,
        /// What is wrong
        reason: String,
    },

    /// The batch could not be encoded.
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    /// The ingress queue refused the frame.
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// Reading the input failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for reception operations.
pub type ReceptionResult<T> = Result<T, ReceptionError>;
