//! Prelude module for common re-exports.
//!
//! ```rust
//! use fams_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, QueueSettings, QueueSpec, SharedConfig};

// ─── Frames ─────────────────────────────────────────────────────────
pub use crate::frame::cistern::{CisternBatch, CisternFrame};
pub use crate::frame::nitrification::{NitrificationBatch, NitrificationFrame};
pub use crate::frame::outside::{OutsideBatch, OutsideFrame};
pub use crate::frame::sensor::{SensorBatch, SensorFrame};
pub use crate::frame::water_replace::{WaterReplaceBatch, WaterReplaceFrame};
pub use crate::frame::{Category, DecodedFrame, FrameError, FrameView, decode, peek_category};

// ─── Metrics ────────────────────────────────────────────────────────
pub use crate::metric::MetricType;
