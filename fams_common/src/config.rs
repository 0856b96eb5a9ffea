//! Configuration loading traits and shared settings.
//!
//! Every FAMS binary reads one TOML file. The pieces both the daemon and the
//! reception publisher need (log level, service name, queue names and
//! capacities) live here; binary-specific sections embed them.
//!
//! # Usage
//!
//! ```rust,no_run
//! use fams_common::config::{ConfigError, ConfigLoader, QueueSettings, SharedConfig};
//! use serde::Deserialize;
//! use std::path::Path;
//!
//! #[derive(Debug, Deserialize)]
//! struct PublisherConfig {
//!     shared: SharedConfig,
//!     #[serde(default)]
//!     queues: QueueSettings,
//! }
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = PublisherConfig::load(Path::new("reception.toml"))?;
//!     config.queues.validate()?;
//!     println!("ingress: {}", config.queues.ingress.name);
//!     Ok(())
//! }
//! ```

use crate::consts::{
    CISTERN_QUEUE_NAME, DEFAULT_QUEUE_CAPACITY, INGRESS_QUEUE_NAME, NITRIFICATION_QUEUE_NAME,
    OUTSIDE_QUEUE_NAME, SENSOR_QUEUE_NAME, WATER_REPLACE_QUEUE_NAME,
};
use crate::frame::Category;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Smallest queue capacity accepted by [`QueueSettings::validate`].
pub const MIN_QUEUE_CAPACITY: usize = 4096;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_directive(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Common configuration fields shared across all FAMS applications.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "fams-event-processing"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    pub service_name: String,
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Name and byte capacity of one shared queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSpec {
    /// Queue name (the shared memory object is `/dev/shm/fams_<name>`).
    pub name: String,

    /// Ring capacity in bytes.
    #[serde(default = "default_capacity")]
    pub capacity_bytes: usize,
}

impl QueueSpec {
    /// Queue spec with the default capacity.
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            capacity_bytes: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

fn default_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_ingress() -> QueueSpec {
    QueueSpec::named(INGRESS_QUEUE_NAME)
}

fn default_sensor() -> QueueSpec {
    QueueSpec::named(SENSOR_QUEUE_NAME)
}

fn default_cistern() -> QueueSpec {
    QueueSpec::named(CISTERN_QUEUE_NAME)
}

fn default_nitrification() -> QueueSpec {
    QueueSpec::named(NITRIFICATION_QUEUE_NAME)
}

fn default_outside() -> QueueSpec {
    QueueSpec::named(OUTSIDE_QUEUE_NAME)
}

fn default_water_replace() -> QueueSpec {
    QueueSpec::named(WATER_REPLACE_QUEUE_NAME)
}

/// The ingress queue plus one egress queue per category.
///
/// # TOML Example
///
/// ```toml
/// [queues.ingress]
/// name = "DataReception_EventProcessing"
/// capacity_bytes = 2097152
///
/// [queues.outside]
/// name = "Outside_Processing_Sensor"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSettings {
    /// Queue shared with reception processes.
    #[serde(default = "default_ingress")]
    pub ingress: QueueSpec,
    /// Multi-channel port sensor egress.
    #[serde(default = "default_sensor")]
    pub sensor: QueueSpec,
    /// Cistern egress.
    #[serde(default = "default_cistern")]
    pub cistern: QueueSpec,
    /// Nitrification tank egress.
    #[serde(default = "default_nitrification")]
    pub nitrification: QueueSpec,
    /// Outdoor egress.
    #[serde(default = "default_outside")]
    pub outside: QueueSpec,
    /// Water-replacement tank egress.
    #[serde(default = "default_water_replace")]
    pub water_replace: QueueSpec,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            ingress: default_ingress(),
            sensor: default_sensor(),
            cistern: default_cistern(),
            nitrification: default_nitrification(),
            outside: default_outside(),
            water_replace: default_water_replace(),
        }
    }
}

impl QueueSettings {
    /// Egress queue spec of a category.
    pub fn egress(&self, category: Category) -> &QueueSpec {
        match category {
            Category::Sensor => &self.sensor,
            Category::Cistern => &self.cistern,
            Category::Nitrification => &self.nitrification,
            Category::Outside => &self.outside,
            Category::WaterReplace => &self.water_replace,
        }
    }

    /// Every queue, ingress first.
    pub fn all(&self) -> [&QueueSpec; 6] {
        [
            &self.ingress,
            &self.sensor,
            &self.cistern,
            &self.nitrification,
            &self.outside,
            &self.water_replace,
        ]
    }

    /// Prefix every queue name, keeping parallel deployments (and tests) apart.
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        for spec in [
            &mut self.ingress,
            &mut self.sensor,
            &mut self.cistern,
            &mut self.nitrification,
            &mut self.outside,
            &mut self.water_replace,
        ] {
            spec.name = format!("{prefix}{}", spec.name);
        }
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - a queue name is empty or contains `/`
    /// - two queues share a name
    /// - a capacity is below [`MIN_QUEUE_CAPACITY`]
    pub fn validate(&self) -> Result<(), ConfigError> {
        let all = self.all();
        for (i, spec) in all.iter().enumerate() {
            if spec.name.is_empty() || spec.name.contains('/') {
                return Err(ConfigError::ValidationError(format!(
                    "invalid queue name '{}'",
                    spec.name
                )));
            }
            if spec.capacity_bytes < MIN_QUEUE_CAPACITY {
                return Err(ConfigError::ValidationError(format!(
                    "queue '{}' capacity {} is below {}",
                    spec.name, spec.capacity_bytes, MIN_QUEUE_CAPACITY
                )));
            }
            if all[i + 1..].iter().any(|other| other.name == spec.name) {
                return Err(ConfigError::ValidationError(format!(
                    "queue name '{}' used twice",
                    spec.name
                )));
            }
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// A blanket implementation covers every `serde::de::DeserializeOwned` type.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if the file is unreadable or the TOML is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
