//! # FAMS Shared Memory Queues
//!
//! Named, capacity-bounded message queues shared between independent
//! processes on one Linux host. A queue is a file under `/dev/shm`
//! holding a small header and a ring buffer of length-prefixed records.
//!
//! ## Features
//!
//! - **Message boundaries**: every `send` is delivered whole by exactly one `receive`
//! - **Blocking flow control**: senders block while full, receivers while empty
//! - **Competing consumers**: any number of threads and processes may receive
//! - **End-of-stream**: `signal_end` wakes every blocked thread in every process
//! - **Crash recovery**: robust mutex; stale segments of dead creators are reclaimed
//!
//! ## Synchronisation
//!
//! The header embeds a `PTHREAD_PROCESS_SHARED` robust mutex and two
//! condition variables (`not_empty`, `not_full`) using `CLOCK_MONOTONIC`.
//! Callers never take locks of their own around `send`/`receive`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fams_shared_memory::{QueueResult, Received, SharedQueue};
//!
//! fn main() -> QueueResult<()> {
//!     // Daemon side: create and own the queue.
//!     let queue = SharedQueue::create("DataReception_EventProcessing", 1 << 20)?;
//!
//!     // Producer side (any process): attach and send.
//!     let producer = SharedQueue::open("DataReception_EventProcessing")?;
//!     producer.send(b"frame bytes")?;
//!
//!     match queue.receive()? {
//!         Received::Message(bytes) => println!("{} bytes", bytes.len()),
//!         Received::EndOfStream => println!("shutting down"),
//!     }
//!
//!     queue.signal_end()?;
//!     queue.release()?;
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod platform;
pub mod queue;
pub mod segment;

pub use error::{QueueError, QueueResult};
pub use queue::{Received, SharedQueue};
pub use segment::{MAX_CAPACITY, MIN_CAPACITY, QueueHeader, QueueState};

/// Initialize tracing for queue tools and tests
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    // A subscriber may already be installed by the host process.
    let _ = tracing::subscriber::set_global_default(subscriber);
}
