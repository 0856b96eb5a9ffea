//! Error types of the event processing daemon.

use fams_common::config::ConfigError;
use fams_shared_memory::QueueError;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by a statement executor.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No statement is registered under this name.
    #[error("Unknown statement '{name}'")]
    UnknownStatement {
        /// Statement name
        name: String,
    },

    /// Parameters do not match what the statement expects.
    #[error("Invalid parameters for '{statement}': {reason}")]
    InvalidParams {
        /// Statement name
        statement: String,
        /// What was wrong
        reason: String,
    },

    /// Statement failed inside the engine.
    #[error("Statement '{statement}' failed: {reason}")]
    Execution {
        /// Statement name
        statement: String,
        /// Engine message
        reason: String,
    },

    /// A connection could not be opened.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Journal file I/O failed.
    #[error("Journal I/O error: {source}")]
    Journal {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// Journal entry could not be serialised.
    #[error("Journal serialisation error: {source}")]
    Serialize {
        /// Underlying JSON error
        #[from]
        source: serde_json::Error,
    },
}

/// Result type for statement execution.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by a mail sender.
#[derive(Debug, Error)]
pub enum MailError {
    /// Nobody to send to.
    #[error("Mail has no recipients")]
    NoRecipients,

    /// The transport refused the message.
    #[error("Mail transport failed: {0}")]
    Transport(String),

    /// Outbox file I/O failed.
    #[error("Outbox I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// Outbox entry could not be serialised.
    #[error("Outbox serialisation error: {source}")]
    Serialize {
        /// Underlying JSON error
        #[from]
        source: serde_json::Error,
    },
}

/// Top-level daemon errors. Everything here is fatal and maps to exit code 1.
#[derive(Debug, Error)]
pub enum EventProcessingError {
    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A queue could not be created or attached.
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// The store could not be opened.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The mail transport could not be set up.
    #[error("Mail setup error: {0}")]
    Mail(#[from] MailError),

    /// An OS thread could not be spawned.
    #[error("Failed to spawn thread '{name}': {source}")]
    ThreadSpawn {
        /// Thread name
        name: String,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// A thread reported a startup failure.
    #[error("Thread '{thread}' failed to start: {reason}")]
    StartupFailed {
        /// Thread name
        thread: String,
        /// Failure reason
        reason: String,
    },

    /// Not every thread reported readiness before the deadline.
    #[error("Startup timed out after {timeout:?}: {ready}/{expected} threads ready")]
    StartupTimeout {
        /// Threads that reported ready
        ready: usize,
        /// Threads expected
        expected: usize,
        /// Deadline that passed
        timeout: Duration,
    },

    /// Threads still running when the join deadline passed.
    #[error("Threads did not stop within {timeout:?}: {remaining:?}")]
    JoinTimeout {
        /// Names of the threads still running
        remaining: Vec<String>,
        /// Deadline that passed
        timeout: Duration,
    },

    /// A thread panicked.
    #[error("Thread '{0}' panicked")]
    ThreadPanicked(String),

    /// The signal handler could not be installed.
    #[error("Signal handler error: {0}")]
    SignalHandler(#[from] ctrlc::Error),
}
