//! Daemon configuration.
//!
//! Loaded from one TOML file through [`ConfigLoader`]. Only `[shared]` is
//! mandatory; every other section falls back to its defaults.
//!
//! ```toml
//! [shared]
//! service_name = "fams-event-processing"
//!
//! [workers]
//! sensor = 1
//!
//! [monitor]
//! violation_count = 3
//! categories = ["cistern", "outside"]
//!
//! [mail]
//! sender = "fams@example.com"
//! recipients = ["operator@example.com"]
//!
//! [[store.thresholds]]
//! resource = "outside"
//! metric = "room_temp"
//! min = 10.0
//! max = 35.0
//! ```
//!
//! [`ConfigLoader`]: fams_common::config::ConfigLoader

use fams_common::config::{ConfigError, QueueSettings, SharedConfig};
use fams_common::consts::{
    DEFAULT_CONDUCTIVITY_COEFFICIENT, DEFAULT_JOIN_TIMEOUT_MS, DEFAULT_SMTP_HOST,
    DEFAULT_SMTP_PORT, DEFAULT_STARTUP_TIMEOUT_MS, DEFAULT_VIOLATION_COUNT,
    DEFAULT_WORKER_THREADS,
};
use fams_common::frame::Category;
use fams_common::metric::MetricType;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Upper bound on threads per category.
pub const MAX_WORKER_THREADS: usize = 256;

/// Placeholder replaced by the violation summary in `body_exceeded`.
pub const CONTENT_PLACEHOLDER: &str = "{content}";

/// Complete daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventProcessingConfig {
    /// Common settings.
    pub shared: SharedConfig,
    /// Queue names and capacities.
    #[serde(default)]
    pub queues: QueueSettings,
    /// Threads per category.
    #[serde(default)]
    pub workers: WorkerSettings,
    /// Threshold monitoring.
    #[serde(default)]
    pub monitor: MonitorSettings,
    /// Alert mail.
    #[serde(default)]
    pub mail: MailSettings,
    /// Reference store.
    #[serde(default)]
    pub store: StoreSettings,
    /// Startup and shutdown deadlines.
    #[serde(default)]
    pub shutdown: ShutdownSettings,
}

impl EventProcessingConfig {
    /// Minimal configuration with every section at its default.
    pub fn with_service_name(service_name: &str) -> Self {
        Self {
            shared: SharedConfig {
                log_level: Default::default(),
                service_name: service_name.to_string(),
            },
            queues: QueueSettings::default(),
            workers: WorkerSettings::default(),
            monitor: MonitorSettings::default(),
            mail: MailSettings::default(),
            store: StoreSettings::default(),
            shutdown: ShutdownSettings::default(),
        }
    }

    /// Validate every section.
    ///
    /// # Errors
    ///
    /// Returns the first `ConfigError::ValidationError` found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.queues.validate()?;
        self.workers.validate()?;
        self.monitor.validate()?;
        self.mail.validate()?;
        self.store.validate()?;
        self.shutdown.validate()
    }

    /// Effective configuration as TOML, SMTP password masked.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        let mut shown = self.clone();
        if shown.mail.password.is_some() {
            shown.mail.password = Some("********".to_string());
        }
        toml::to_string(&shown).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

fn default_threads() -> usize {
    DEFAULT_WORKER_THREADS
}

/// Worker threads per category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSettings {
    /// Port sensor workers.
    #[serde(default = "default_threads")]
    pub sensor: usize,
    /// Cistern workers.
    #[serde(default = "default_threads")]
    pub cistern: usize,
    /// Nitrification workers.
    #[serde(default = "default_threads")]
    pub nitrification: usize,
    /// Outdoor workers.
    #[serde(default = "default_threads")]
    pub outside: usize,
    /// Water-replacement workers.
    #[serde(default = "default_threads")]
    pub water_replace: usize,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self::uniform(DEFAULT_WORKER_THREADS)
    }
}

impl WorkerSettings {
    /// Same thread count for every category.
    pub fn uniform(threads: usize) -> Self {
        Self {
            sensor: threads,
            cistern: threads,
            nitrification: threads,
            outside: threads,
            water_replace: threads,
        }
    }

    /// Thread count of a category.
    pub fn threads(&self, category: Category) -> usize {
        match category {
            Category::Sensor => self.sensor,
            Category::Cistern => self.cistern,
            Category::Nitrification => self.nitrification,
            Category::Outside => self.outside,
            Category::WaterReplace => self.water_replace,
        }
    }

    /// Sum over all categories.
    pub fn total(&self) -> usize {
        Category::ALL.iter().map(|c| self.threads(*c)).sum()
    }

    /// Every category needs between 1 and [`MAX_WORKER_THREADS`] threads.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for category in Category::ALL {
            let threads = self.threads(category);
            if threads == 0 || threads > MAX_WORKER_THREADS {
                return Err(ConfigError::ValidationError(format!(
                    "workers.{} must be in 1..={}, got {}",
                    category.name(),
                    MAX_WORKER_THREADS,
                    threads
                )));
            }
        }
        Ok(())
    }
}

fn default_violation_count() -> u32 {
    DEFAULT_VIOLATION_COUNT
}

fn default_true() -> bool {
    true
}

fn default_monitored() -> Vec<Category> {
    vec![Category::Sensor, Category::Cistern, Category::Outside]
}

fn default_coefficient() -> f64 {
    DEFAULT_CONDUCTIVITY_COEFFICIENT
}

/// Threshold monitoring settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorSettings {
    /// Consecutive samples (K) needed to raise or clear an alert.
    #[serde(default = "default_violation_count")]
    pub violation_count: u32,
    /// Re-send the exceeded mail every K samples while a violation persists.
    #[serde(default = "default_true")]
    pub remind_while_occurring: bool,
    /// Categories whose samples are checked against thresholds.
    #[serde(default = "default_monitored")]
    pub categories: Vec<Category>,
    /// Multiplier turning raw cistern conductivity into µS/cm.
    #[serde(default = "default_coefficient")]
    pub conductivity_coefficient: f64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            violation_count: DEFAULT_VIOLATION_COUNT,
            remind_while_occurring: true,
            categories: default_monitored(),
            conductivity_coefficient: DEFAULT_CONDUCTIVITY_COEFFICIENT,
        }
    }
}

impl MonitorSettings {
    /// True if samples of `category` go through the monitor.
    pub fn is_monitored(&self, category: Category) -> bool {
        self.categories.contains(&category)
    }

    /// Validate the settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `violation_count` is zero or
    /// the coefficient is not a positive finite number.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.violation_count == 0 {
            return Err(ConfigError::ValidationError(
                "monitor.violation_count must be at least 1".to_string(),
            ));
        }
        if !(self.conductivity_coefficient.is_finite() && self.conductivity_coefficient > 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "monitor.conductivity_coefficient must be positive, got {}",
                self.conductivity_coefficient
            )));
        }
        Ok(())
    }
}

/// How alert mail leaves the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailTransport {
    /// Write each mail to the log.
    #[default]
    Log,
    /// Append each mail as a JSON line to `outbox_path` for a relay to pick up.
    Outbox,
}

fn default_host() -> String {
    DEFAULT_SMTP_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_SMTP_PORT
}

fn default_subject() -> String {
    "[FAMS] Sensor values back within standard".to_string()
}

fn default_body() -> String {
    "All monitored sensor values are back within their thresholds.".to_string()
}

fn default_subject_exceeded() -> String {
    "[FAMS] Sensor values out of standard".to_string()
}

fn default_body_exceeded() -> String {
    format!("The following sensor values are out of standard:\n\n{CONTENT_PLACEHOLDER}")
}

/// Alert mail settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailSettings {
    /// SMTP host.
    #[serde(default = "default_host")]
    pub hostname: String,
    /// SMTP port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// From address.
    #[serde(default)]
    pub sender: String,
    /// Fixed recipients; observers from the store are added at send time.
    #[serde(default)]
    pub recipients: Vec<String>,
    /// SMTP user.
    #[serde(default)]
    pub username: Option<String>,
    /// SMTP password.
    #[serde(default)]
    pub password: Option<String>,
    /// All-clear subject.
    #[serde(default = "default_subject")]
    pub subject: String,
    /// All-clear body.
    #[serde(default = "default_body")]
    pub body: String,
    /// Exceeded subject.
    #[serde(default = "default_subject_exceeded")]
    pub subject_exceeded: String,
    /// Exceeded body; `{content}` is replaced by the violation list.
    #[serde(default = "default_body_exceeded")]
    pub body_exceeded: String,
    /// Delivery mechanism.
    #[serde(default)]
    pub transport: MailTransport,
    /// Outbox file for [`MailTransport::Outbox`].
    #[serde(default)]
    pub outbox_path: Option<PathBuf>,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            hostname: default_host(),
            port: DEFAULT_SMTP_PORT,
            sender: String::new(),
            recipients: Vec::new(),
            username: None,
            password: None,
            subject: default_subject(),
            body: default_body(),
            subject_exceeded: default_subject_exceeded(),
            body_exceeded: default_body_exceeded(),
            transport: MailTransport::Log,
            outbox_path: None,
        }
    }
}

impl MailSettings {
    /// Validate the settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - the outbox transport has no `outbox_path`
    /// - a recipient or the sender is not an address
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transport == MailTransport::Outbox && self.outbox_path.is_none() {
            return Err(ConfigError::ValidationError(
                "mail.outbox_path is required for the outbox transport".to_string(),
            ));
        }
        if !self.sender.is_empty() && !self.sender.contains('@') {
            return Err(ConfigError::ValidationError(format!(
                "mail.sender '{}' is not an address",
                self.sender
            )));
        }
        if let Some(bad) = self.recipients.iter().find(|r| !r.contains('@')) {
            return Err(ConfigError::ValidationError(format!(
                "mail recipient '{bad}' is not an address"
            )));
        }
        Ok(())
    }
}

/// One seeded threshold row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSpec {
    /// Resource id (cistern code or fixed resource name).
    pub resource: String,
    /// Metric the bounds apply to.
    pub metric: MetricType,
    /// Lower bound, inclusive.
    pub min: f64,
    /// Upper bound, inclusive.
    pub max: f64,
}

/// Reference store settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Append every write as a JSON line to this file.
    #[serde(default)]
    pub journal_path: Option<PathBuf>,
    /// Thresholds loaded at startup.
    #[serde(default)]
    pub thresholds: Vec<ThresholdSpec>,
    /// Observer addresses returned by `SELECT_OBSERVERS_QUERY`.
    #[serde(default)]
    pub observers: Vec<String>,
}

impl StoreSettings {
    /// Every threshold needs finite bounds with `min <= max`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for spec in &self.thresholds {
            if !(spec.min.is_finite() && spec.max.is_finite()) || spec.min > spec.max {
                return Err(ConfigError::ValidationError(format!(
                    "threshold {}/{} has invalid bounds [{}, {}]",
                    spec.resource, spec.metric, spec.min, spec.max
                )));
            }
        }
        Ok(())
    }
}

fn default_join_timeout() -> u64 {
    DEFAULT_JOIN_TIMEOUT_MS
}

fn default_startup_timeout() -> u64 {
    DEFAULT_STARTUP_TIMEOUT_MS
}

/// Startup and shutdown deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownSettings {
    /// Bound on joining all threads after end-of-stream.
    #[serde(default = "default_join_timeout")]
    pub join_timeout_ms: u64,
    /// Bound on waiting for every thread to report readiness.
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_ms: u64,
}

impl Default for ShutdownSettings {
    fn default() -> Self {
        Self {
            join_timeout_ms: DEFAULT_JOIN_TIMEOUT_MS,
            startup_timeout_ms: DEFAULT_STARTUP_TIMEOUT_MS,
        }
    }
}

impl ShutdownSettings {
    /// Join deadline.
    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    /// Startup deadline.
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    /// Both deadlines must be non-zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.join_timeout_ms == 0 || self.startup_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "shutdown timeouts must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
