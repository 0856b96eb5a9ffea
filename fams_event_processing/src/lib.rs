//! # FAMS Event Processing
//!
//! The hub of the FAMS telemetry backbone. Reception processes push encoded
//! frames into one shared ingress queue; this daemon fans them out by
//! category, persists every sample and raises debounced threshold alerts.
//!
//! # Module Structure
//!
//! - [`dispatcher`] - Routes ingress messages to per-category egress queues
//! - [`worker`] - Per-category workers: decode, upsert, monitor
//! - [`readings`] - Frame to sample extraction
//! - [`salinity`] - Practical salinity from conductivity
//! - [`monitor`] - Threshold checks with K-sample debounce
//! - [`mail`] - Alert mail composition and transports
//! - [`store`] - Named-statement store interface and in-memory engine
//! - [`startup`] - Thread readiness collector
//! - [`shutdown`] - Ordered shutdown and the signal handle
//! - [`daemon`] - Assembly of all threads
//! - [`context`] - Queues and collaborators handed to every thread
//! - [`config`] - Daemon configuration
//! - [`error`] - Error types
//!
//! # Architecture
//!
//! ```text
//!  reception ──► ingress ──► dispatcher ──┬──► sensor        ──► workers ──┐
//!  processes     queue                    ├──► cistern       ──► workers ──┤
//!                                         ├──► nitrification ──► workers ──┼──► store
//!                                         ├──► outside       ──► workers ──┤     │
//!                                         └──► water_replace ──► workers ──┘     ▼
//!                                                                            monitor ──► mail
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod context;
pub mod daemon;
pub mod dispatcher;
pub mod error;
pub mod mail;
pub mod monitor;
pub mod readings;
pub mod salinity;
pub mod shutdown;
pub mod startup;
pub mod store;
pub mod worker;

pub use crate::config::EventProcessingConfig;
pub use crate::context::{AppContext, QueueSet};
pub use crate::daemon::EventProcessor;
pub use crate::error::EventProcessingError;
pub use crate::shutdown::{ShutdownHandle, ShutdownReport};
