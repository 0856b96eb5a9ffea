//! System-wide constants for the FAMS workspace.
//!
//! Single source of truth for wire-format widths, queue names and
//! configuration defaults. Imported by all crates.

use static_assertions::const_assert;

// ─── Frame wire format ──────────────────────────────────────────────

/// Current frame format version, written after the category tag.
pub const FRAME_FORMAT_VERSION: u8 = 1;

/// Bytes before the section table: tag, version, two reserved bytes.
pub const FRAME_PREAMBLE_LEN: usize = 4;

/// Bytes per section table entry: `u32` offset + `u32` count.
pub const SECTION_ENTRY_LEN: usize = 8;

/// Upper bound on sections declared by any category layout.
pub const MAX_SECTIONS: usize = 8;

/// Width of an accumulated-time text slot (including the terminating null).
pub const TIME_SLOT_LEN: usize = 25;

/// Width of a cistern code text slot (including the terminating null).
pub const CODE_SLOT_LEN: usize = 6;

const_assert!(TIME_SLOT_LEN > 1);
const_assert!(CODE_SLOT_LEN > 1);

// ─── Queue names ────────────────────────────────────────────────────

/// Ingress queue written by reception processes, drained by the dispatcher.
pub const INGRESS_QUEUE_NAME: &str = "DataReception_EventProcessing";

/// Egress queue for multi-channel port sensor frames.
pub const SENSOR_QUEUE_NAME: &str = "Processing_Sensor";

/// Egress queue for cistern (tank) frames.
pub const CISTERN_QUEUE_NAME: &str = "Cistern_Processing_Sensor";

/// Egress queue for nitrification tank frames.
pub const NITRIFICATION_QUEUE_NAME: &str = "Nitrification_Processing_Sensor";

/// Egress queue for outdoor / weather frames.
pub const OUTSIDE_QUEUE_NAME: &str = "Outside_Processing_Sensor";

/// Egress queue for water-replacement tank frames.
pub const WATER_REPLACE_QUEUE_NAME: &str = "WaterReplace_Processing_Sensor";

/// Default queue capacity in bytes (1 MiB).
pub const DEFAULT_QUEUE_CAPACITY: usize = 1 << 20;

// ─── Site-level resources ───────────────────────────────────────────

/// Resource id used for nitrification tank samples.
pub const NITRIFICATION_RESOURCE: &str = "nitrification";

/// Resource id used for outdoor samples.
pub const OUTSIDE_RESOURCE: &str = "outside";

/// Resource id used for water-replacement tank samples.
pub const WATER_REPLACE_RESOURCE: &str = "water_replace";

// ─── Processing defaults ────────────────────────────────────────────

/// Default worker thread count per category.
pub const DEFAULT_WORKER_THREADS: usize = 10;

/// Default number of consecutive samples (K) before alert / all-clear mail.
pub const DEFAULT_VIOLATION_COUNT: u32 = 5;

/// Default conductivity sensor coefficient used for salinity conversion.
pub const DEFAULT_CONDUCTIVITY_COEFFICIENT: f64 = 0.757;

/// Default SMTP host.
pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";

/// Default SMTP port.
pub const DEFAULT_SMTP_PORT: u16 = 25;

/// Default bounded join timeout at shutdown, in milliseconds.
pub const DEFAULT_JOIN_TIMEOUT_MS: u64 = 5_000;

/// Default time the daemon waits for worker readiness, in milliseconds.
pub const DEFAULT_STARTUP_TIMEOUT_MS: u64 = 10_000;

/// Default configuration file of the event processing daemon.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/fams/event_processing.toml";
