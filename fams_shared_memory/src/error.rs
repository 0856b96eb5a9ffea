//! Error types for shared queue operations

use thiserror::Error;

/// Errors that can occur during shared queue operations
#[derive(Error, Debug)]
pub enum QueueError {
    /// Queue already exists and its creator is still alive
    #[error("Queue already exists: {name}")]
    AlreadyExists {
        /// Queue name
        name: String,
    },

    /// Queue not found
    #[error("Queue not found: {name}")]
    NotFound {
        /// Queue name
        name: String,
    },

    /// Invalid queue name
    #[error("Invalid queue name: '{name}'")]
    InvalidName {
        /// Rejected name
        name: String,
    },

    /// Invalid ring capacity
    #[error("Invalid queue capacity: {capacity} bytes (must be {min}..={max})")]
    InvalidCapacity {
        /// Requested capacity
        capacity: usize,
        /// Smallest accepted capacity
        min: usize,
        /// Largest accepted capacity
        max: usize,
    },

    /// Message can never fit in the ring
    #[error("Message of {size} bytes exceeds queue capacity {capacity}")]
    MessageTooLarge {
        /// Message size in bytes
        size: usize,
        /// Queue capacity in bytes
        capacity: usize,
    },

    /// Empty messages are not representable
    #[error("Empty message")]
    EmptyMessage,

    /// Segment header failed validation
    #[error("Invalid queue header for {name}: {reason}")]
    InvalidHeader {
        /// Queue name
        name: String,
        /// What failed
        reason: String,
    },

    /// End-of-stream was signaled; no further sends are accepted
    #[error("Queue ended: {name}")]
    Ended {
        /// Queue name
        name: String,
    },

    /// pthread synchronisation primitive failed
    #[error("Synchronisation error in {operation}: errno {code}")]
    Sync {
        /// Failing pthread call
        operation: &'static str,
        /// Returned error code
        code: i32,
    },

    /// IO error
    #[error("IO error: {source}")]
    Io {
        /// Source IO error
        #[from]
        source: std::io::Error,
    },

    /// Nix system call error
    #[error("System call error: {source}")]
    Nix {
        /// Source nix error
        #[from]
        source: nix::Error,
    },
}

/// Result type for shared queue operations
pub type QueueResult<T> = Result<T, QueueError>;
