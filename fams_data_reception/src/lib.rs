//! # FAMS Data Reception
//!
//! Producer side of the ingress queue. Sensor batches arrive as JSON
//! documents, are checked, encoded as frames and sent to the queue created by
//! the event processing daemon.
//!
//! # Module Structure
//!
//! - [`request`] - Batch documents and their validation
//! - [`publisher`] - Ingress queue producer
//! - [`error`] - Error types
//!
//! # Input format
//!
//! One document per line:
//!
//! ```json
//! {"category":"outside","batch":{"accumulated_time":["2024-05-01 10:00:00"],"room_temp":[21.5],"humidity":[48.0],"atmospheric_pressure":[1012.0]}}
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod publisher;
pub mod request;

pub use error::{ReceptionError, ReceptionResult};
pub use publisher::{PublishStats, Publisher};
pub use request::BatchRequest;
