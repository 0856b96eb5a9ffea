//! Alert mail collaborator.
//!
//! The monitor composes a [`MailMessage`] and hands it to a [`MailSender`].
//! Delivery is best-effort: the caller logs a failure and moves on.

use crate::config::{CONTENT_PLACEHOLDER, MailSettings, MailTransport};
use crate::error::MailError;
use chrono::{DateTime, Utc};
use fams_common::metric::MetricType;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// One outgoing mail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailMessage {
    /// SMTP host.
    pub host: String,
    /// SMTP port.
    pub port: u16,
    /// From address.
    pub sender: String,
    /// To addresses.
    pub recipients: Vec<String>,
    /// Subject line.
    pub subject: String,
    /// Plain text body.
    pub body: String,
}

/// Delivers alert mail.
pub trait MailSender: Send + Sync {
    /// Send one message.
    fn send(&self, message: &MailMessage) -> Result<(), MailError>;
}

/// Side of the threshold a value fell on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Below the lower bound.
    Below,
    /// Above the upper bound.
    Above,
}

impl Direction {
    /// Phrase used in messages.
    pub const fn phrase(self) -> &'static str {
        match self {
            Self::Below => "below standard",
            Self::Above => "above standard",
        }
    }
}

/// One line of an exceeded mail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationLine {
    /// Sample timestamp.
    pub happened_at: String,
    /// Resource id.
    pub resource: String,
    /// Metric.
    pub metric: MetricType,
    /// Sample value.
    pub value: f64,
    /// Which bound was crossed.
    pub direction: Direction,
}

impl fmt::Display for ViolationLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}  {}  {}: {:.3}",
            self.happened_at,
            self.resource,
            self.metric.label(),
            self.value
        )?;
        let unit = self.metric.unit();
        if !unit.is_empty() {
            write!(f, " {unit}")?;
        }
        write!(f, " ({})", self.direction.phrase())
    }
}

fn envelope(settings: &MailSettings, recipients: Vec<String>, subject: &str, body: String) -> MailMessage {
    MailMessage {
        host: settings.hostname.clone(),
        port: settings.port,
        sender: settings.sender.clone(),
        recipients,
        subject: subject.to_string(),
        body,
    }
}

/// Compose the exceeded mail listing `violations`.
pub fn exceeded_message(
    settings: &MailSettings,
    recipients: Vec<String>,
    violations: &[ViolationLine],
) -> MailMessage {
    let content = violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n");
    let body = if settings.body_exceeded.contains(CONTENT_PLACEHOLDER) {
        settings.body_exceeded.replace(CONTENT_PLACEHOLDER, &content)
    } else {
        format!("{}\n\n{}", settings.body_exceeded, content)
    };
    envelope(settings, recipients, &settings.subject_exceeded, body)
}

/// Compose the all-clear mail.
pub fn all_clear_message(settings: &MailSettings, recipients: Vec<String>) -> MailMessage {
    envelope(settings, recipients, &settings.subject, settings.body.clone())
}

/// Writes every mail to the log.
#[derive(Debug, Default)]
pub struct LogMailer;

impl MailSender for LogMailer {
    fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        if message.recipients.is_empty() {
            return Err(MailError::NoRecipients);
        }
        info!(
            host = %message.host,
            port = message.port,
            recipients = ?message.recipients,
            subject = %message.subject,
            "alert mail:\n{}",
            message.body
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct OutboxEntry<'a> {
    queued_at: DateTime<Utc>,
    #[serde(flatten)]
    message: &'a MailMessage,
}

/// Appends every mail as one JSON line to a file.
#[derive(Debug)]
pub struct OutboxMailer {
    path: PathBuf,
    file: Mutex<File>,
}

impl OutboxMailer {
    /// Open (or create) the outbox at `path`.
    pub fn open(path: &Path) -> Result<Self, MailError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    /// Outbox file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MailSender for OutboxMailer {
    fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        if message.recipients.is_empty() {
            return Err(MailError::NoRecipients);
        }
        let mut line = serde_json::to_vec(&OutboxEntry {
            queued_at: Utc::now(),
            message,
        })?;
        line.push(b'\n');
        // One write per entry keeps lines from concurrent workers whole.
        self.file.lock().write_all(&line)?;
        Ok(())
    }
}

/// Keeps sent mail in memory.
#[derive(Debug, Default)]
pub struct MemoryOutbox {
    sent: Mutex<Vec<MailMessage>>,
    failing: Mutex<bool>,
}

impl MemoryOutbox {
    /// Empty outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything sent so far.
    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().clone()
    }

    /// Number of messages sent with `subject`.
    pub fn count_subject(&self, subject: &str) -> usize {
        self.sent.lock().iter().filter(|m| m.subject == subject).count()
    }

    /// Make every send fail (nothing is recorded while failing).
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }
}

impl MailSender for MemoryOutbox {
    fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        if *self.failing.lock() {
            return Err(MailError::Transport("outbox offline".to_string()));
        }
        if message.recipients.is_empty() {
            return Err(MailError::NoRecipients);
        }
        self.sent.lock().push(message.clone());
        Ok(())
    }
}

/// Build the sender selected by `settings.transport`.
///
/// # Errors
///
/// Returns [`MailError::Io`] if the outbox cannot be opened.
pub fn mailer_from_settings(settings: &MailSettings) -> Result<Arc<dyn MailSender>, MailError> {
    match (settings.transport, &settings.outbox_path) {
        (MailTransport::Outbox, Some(path)) => Ok(Arc::new(OutboxMailer::open(path)?)),
        (MailTransport::Outbox, None) => Err(MailError::Transport(
            "outbox transport without outbox_path".to_string(),
        )),
        (MailTransport::Log, _) => Ok(Arc::new(LogMailer)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};

    fn line(metric: MetricType, value: f64, direction: Direction) -> ViolationLine {
        ViolationLine {
            happened_at: "2024-05-01 10:00:00".to_string(),
            resource: "outside".to_string(),
            metric,
            value,
            direction,
        }
    }

    #[test]
    fn test_violation_line_format() {
        let text = line(MetricType::RoomTemp, 41.0, Direction::Above).to_string();
        assert_eq!(
            text,
            "2024-05-01 10:00:00  outside  room temperature: 41.000 °C (above standard)"
        );
        let text = line(MetricType::Ph, 5.5, Direction::Below).to_string();
        assert!(text.ends_with("pH: 5.500 (below standard)"));
    }

    #[test]
    fn test_exceeded_message_fills_placeholder() {
        let settings = MailSettings {
            sender: "fams@example.com".to_string(),
            body_exceeded: "Alert:\n{content}\n-- FAMS".to_string(),
            ..Default::default()
        };
        let message = exceeded_message(
            &settings,
            vec!["ops@example.com".to_string()],
            &[
                line(MetricType::RoomTemp, 41.0, Direction::Above),
                line(MetricType::Humidity, 5.0, Direction::Below),
            ],
        );
        assert_eq!(message.subject, settings.subject_exceeded);
        assert_eq!(message.host, "smtp.gmail.com");
        assert!(message.body.starts_with("Alert:\n2024-05-01"));
        assert!(message.body.contains("humidity: 5.000 % (below standard)"));
        assert!(message.body.ends_with("-- FAMS"));
    }

    #[test]
    fn test_all_clear_message() {
        let settings = MailSettings::default();
        let message = all_clear_message(&settings, vec!["ops@example.com".to_string()]);
        assert_eq!(message.subject, settings.subject);
        assert_eq!(message.body, settings.body);
    }

    #[test]
    fn test_memory_outbox_failures() {
        let outbox = MemoryOutbox::new();
        let message = all_clear_message(&MailSettings::default(), vec!["a@example.com".to_string()]);
        outbox.send(&message).unwrap();
        outbox.set_failing(true);
        assert!(matches!(outbox.send(&message), Err(MailError::Transport(_))));
        outbox.set_failing(false);
        let nobody = all_clear_message(&MailSettings::default(), Vec::new());
        assert!(matches!(outbox.send(&nobody), Err(MailError::NoRecipients)));
        assert_eq!(outbox.sent().len(), 1);
    }

    #[test]
    fn test_outbox_mailer_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outbox.jsonl");
        let settings = MailSettings {
            transport: MailTransport::Outbox,
            outbox_path: Some(path.clone()),
            ..Default::default()
        };
        let mailer = mailer_from_settings(&settings).unwrap();
        let message = all_clear_message(&settings, vec!["a@example.com".to_string()]);
        mailer.send(&message).unwrap();
        mailer.send(&message).unwrap();

        let lines: Vec<String> = BufReader::new(File::open(&path).unwrap())
            .lines()
            .map(Result::unwrap)
            .collect();
        assert_eq!(lines.len(), 2);
        let entry: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(entry["subject"], settings.subject.as_str());
        assert!(entry["queued_at"].is_string());
    }
}
