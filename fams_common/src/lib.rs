//! FAMS Common Library
//!
//! Shared building blocks for every crate of the FAMS telemetry workspace:
//! the binary frame codec that carries sensor batches between processes,
//! the sensor metric catalogue, configuration loading and system constants.
//!
//! # Module Structure
//!
//! - [`frame`] - Frame categories, wire layout, encoder and borrowed decoder views
//! - [`metric`] - Sensor port types (metric catalogue)
//! - [`config`] - Configuration loading traits and shared queue settings
//! - [`consts`] - System-wide constants and defaults
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```toml
//! [dependencies]
//! fams_common = { workspace = true }
//! ```
//!
//! ```rust
//! use fams_common::frame::outside::OutsideBatch;
//! use fams_common::frame::{Category, DecodedFrame, decode};
//!
//! let batch = OutsideBatch {
//!     accumulated_time: vec!["2024-05-01 10:00:00".into()],
//!     room_temp: vec![21.5],
//!     humidity: vec![48.0],
//!     atmospheric_pressure: vec![1012.0],
//! };
//! let bytes = batch.encode().unwrap();
//! match decode(&bytes).unwrap() {
//!     DecodedFrame::Outside(frame) => assert_eq!(frame.room_temp().next(), Some(21.5)),
//!     other => panic!("unexpected {:?}", other.category()),
//! }
//! assert_eq!(Category::from_u8(bytes[0]), Some(Category::Outside));
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod consts;
pub mod frame;
pub mod metric;
pub mod prelude;
