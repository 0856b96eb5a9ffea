//! Threshold violation tracking and alert debounce.
//!
//! Every monitored sample is checked against the bounds returned by
//! `SELECT_THRESHOLD_DATA`, queried fresh for each sample. Per
//! `(resource, metric)` pair a [`ViolationState`] tracks whether an error
//! message row is open and how many consecutive samples violated or were
//! clean.
//!
//! With `K = violation_count`:
//!
//! - K consecutive violations with no alert outstanding send one exceeded
//!   mail. While the alert stays outstanding, every K further violations send
//!   a reminder (if enabled).
//! - K consecutive clean samples with an alert outstanding send one all-clear
//!   mail and clear the alert.
//!
//! Workers of one category compete for frames, so a resource's samples
//! reach several threads. The category's single [`Monitor`] lives in a
//! [`MonitorSet`] and every worker locks it for the thresholds of a sample.

use crate::config::{MailSettings, MonitorSettings};
use crate::mail::{Direction, MailSender, ViolationLine, all_clear_message, exceeded_message};
use crate::store::statements::{
    INSERT_ERROR_MESSAGE_DATA, SELECT_OBSERVERS_QUERY, SELECT_THRESHOLD_DATA,
    UPDATE_STATUS_RESOLVED_ERROR_MESSAGE_DATA,
};
use crate::store::{ErrorStatus, Param, StatementExecutor};
use crate::error::StoreResult;
use fams_common::frame::Category;
use fams_common::metric::MetricType;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Debounce state of one `(resource, metric)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViolationState {
    /// Whether an error message row is open.
    pub status: ErrorStatus,
    /// Consecutive violating samples since the last reset.
    pub violating: u32,
    /// Consecutive clean samples since the last reset.
    pub clean: u32,
    /// An exceeded mail was sent and no all-clear yet.
    pub alert_sent: bool,
}

/// Bounds check of one value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    /// Within `[min, max]`.
    Within,
    /// Outside the bounds.
    Violation(Direction),
}

/// Check `value` against inclusive bounds.
pub fn check(value: f64, min: f64, max: f64) -> Verdict {
    if value < min {
        Verdict::Violation(Direction::Below)
    } else if value > max {
        Verdict::Violation(Direction::Above)
    } else {
        Verdict::Within
    }
}

/// Mail sent as the result of one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alert {
    /// First exceeded mail.
    Exceeded,
    /// Repeated exceeded mail while the violation persists.
    Reminder,
    /// All-clear mail.
    AllClear,
}

/// One value to check.
#[derive(Debug, Clone, Copy)]
pub struct Observation<'a> {
    /// Category the sample came from.
    pub category: Category,
    /// Resource id.
    pub resource: &'a str,
    /// Sample timestamp.
    pub time: &'a str,
    /// Metric.
    pub metric: MetricType,
    /// Value.
    pub value: f64,
}

type Key = (String, MetricType);

/// Threshold monitor of one category.
pub struct Monitor {
    violation_count: u32,
    remind: bool,
    mail: MailSettings,
    mailer: Arc<dyn MailSender>,
    states: HashMap<Key, ViolationState>,
    active: BTreeMap<Key, ViolationLine>,
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("violation_count", &self.violation_count)
            .field("remind", &self.remind)
            .field("tracked", &self.states.len())
            .field("active", &self.active.len())
            .finish()
    }
}

impl Monitor {
    /// Create a monitor.
    pub fn new(settings: &MonitorSettings, mail: MailSettings, mailer: Arc<dyn MailSender>) -> Self {
        Self {
            violation_count: settings.violation_count.max(1),
            remind: settings.remind_while_occurring,
            mail,
            mailer,
            states: HashMap::new(),
            active: BTreeMap::new(),
        }
    }

    /// State of a pair, if it has been observed.
    pub fn state(&self, resource: &str, metric: MetricType) -> Option<&ViolationState> {
        self.states.get(&(resource.to_string(), metric))
    }

    /// Pairs currently violating.
    pub fn active_violations(&self) -> impl Iterator<Item = &ViolationLine> {
        self.active.values()
    }

    /// Check one value and advance its state.
    ///
    /// A failed threshold query or a pair without thresholds leaves the state
    /// untouched. Store and mail failures past that point are logged.
    pub fn observe(&mut self, db: &mut dyn StatementExecutor, obs: &Observation<'_>) -> Option<Alert> {
        let (min, max) = match query_bounds(db, obs.resource, obs.metric) {
            Ok(Some(bounds)) => bounds,
            Ok(None) => {
                debug!(resource = obs.resource, metric = %obs.metric, "no threshold configured");
                return None;
            }
            Err(e) => {
                warn!(resource = obs.resource, metric = %obs.metric, "threshold query failed: {}", e);
                return None;
            }
        };
        if !obs.value.is_finite() {
            warn!(resource = obs.resource, metric = %obs.metric, "non-finite value skipped");
            return None;
        }

        match check(obs.value, min, max) {
            Verdict::Violation(direction) => self.on_violation(db, obs, direction),
            Verdict::Within => self.on_clean(db, obs),
        }
    }

    fn on_violation(
        &mut self,
        db: &mut dyn StatementExecutor,
        obs: &Observation<'_>,
        direction: Direction,
    ) -> Option<Alert> {
        let key = (obs.resource.to_string(), obs.metric);
        let line = ViolationLine {
            happened_at: obs.time.to_string(),
            resource: obs.resource.to_string(),
            metric: obs.metric,
            value: obs.value,
            direction,
        };

        let mut state = self.states.get(&key).copied().unwrap_or_default();
        if state.status == ErrorStatus::Resolved {
            let params = [
                Param::from(format!("{} {}", obs.metric.label(), direction.phrase())),
                Param::from(obs.time),
                Param::from(obs.resource),
                Param::from(obs.category.name()),
                Param::from(obs.metric.port_type()),
            ];
            // The row stays missing, the transition still happens.
            if let Err(e) = db.execute(INSERT_ERROR_MESSAGE_DATA, &params) {
                error!(resource = obs.resource, metric = %obs.metric, "error message insert failed: {}", e);
            }
            state.status = ErrorStatus::Occurring;
            info!(resource = obs.resource, metric = %obs.metric, value = obs.value, "{}", direction.phrase());
        }
        self.active.insert(key.clone(), line);

        state.violating = state.violating.saturating_add(1);
        state.clean = 0;

        let mut alert = None;
        if state.violating >= self.violation_count {
            if !state.alert_sent {
                alert = Some(Alert::Exceeded);
            } else if self.remind {
                alert = Some(Alert::Reminder);
            }
        }
        if let Some(kind) = alert {
            self.send_exceeded(db, kind);
            state.alert_sent = true;
            state.violating = 0;
        }

        self.states.insert(key, state);
        alert
    }

    fn on_clean(&mut self, db: &mut dyn StatementExecutor, obs: &Observation<'_>) -> Option<Alert> {
        let key = (obs.resource.to_string(), obs.metric);
        let mut state = self.states.get(&key).copied().unwrap_or_default();

        if state.status == ErrorStatus::Occurring {
            let params = [
                Param::from(obs.resource),
                Param::from(obs.metric.port_type()),
                Param::from(obs.time),
            ];
            if let Err(e) = db.execute(UPDATE_STATUS_RESOLVED_ERROR_MESSAGE_DATA, &params) {
                error!(resource = obs.resource, metric = %obs.metric, "error message resolve failed: {}", e);
            }
            state.status = ErrorStatus::Resolved;
            self.active.remove(&key);
            info!(resource = obs.resource, metric = %obs.metric, value = obs.value, "back within standard");
        }

        state.clean = state.clean.saturating_add(1);
        state.violating = 0;

        let mut alert = None;
        if state.alert_sent && state.clean >= self.violation_count {
            let message = all_clear_message(&self.mail, self.recipients(db));
            if let Err(e) = self.mailer.send(&message) {
                warn!("all-clear mail not sent: {}", e);
            }
            state.alert_sent = false;
            state.clean = 0;
            alert = Some(Alert::AllClear);
        }

        self.states.insert(key, state);
        alert
    }

    fn send_exceeded(&mut self, db: &mut dyn StatementExecutor, kind: Alert) {
        let violations: Vec<ViolationLine> = self.active.values().cloned().collect();
        let message = exceeded_message(&self.mail, self.recipients(db), &violations);
        match self.mailer.send(&message) {
            Ok(()) => info!(?kind, violations = violations.len(), "exceeded mail sent"),
            Err(e) => warn!(?kind, "exceeded mail not sent: {}", e),
        }
    }

    /// Configured recipients plus observers, first occurrence wins.
    fn recipients(&self, db: &mut dyn StatementExecutor) -> Vec<String> {
        let mut recipients = self.mail.recipients.clone();
        match db.execute(SELECT_OBSERVERS_QUERY, &[]) {
            Ok(result) => {
                for row in 0..result.len() {
                    if let Some(email) = result.get(row, "email").and_then(Param::as_str) {
                        recipients.push(email.to_string());
                    }
                }
            }
            Err(e) => warn!("observer query failed: {}", e),
        }
        let mut seen = std::collections::HashSet::new();
        recipients.retain(|r| seen.insert(r.clone()));
        recipients
    }
}

/// Monitor shared by the workers of one category.
pub type SharedMonitor = Arc<Mutex<Monitor>>;

/// One [`Monitor`] per monitored category.
#[derive(Debug, Default)]
pub struct MonitorSet {
    monitors: [Option<SharedMonitor>; 5],
}

impl MonitorSet {
    /// Monitors for every category `settings` marks as monitored.
    pub fn new(settings: &MonitorSettings, mail: &MailSettings, mailer: &Arc<dyn MailSender>) -> Self {
        Self {
            monitors: std::array::from_fn(|i| {
                let category = Category::ALL[i];
                settings.is_monitored(category).then(|| {
                    Arc::new(Mutex::new(Monitor::new(settings, mail.clone(), Arc::clone(mailer))))
                })
            }),
        }
    }

    /// Monitor of `category`, `None` if it is not monitored.
    pub fn get(&self, category: Category) -> Option<SharedMonitor> {
        // Tags start at 1 and are contiguous.
        self.monitors[category.tag() as usize - 1].clone()
    }
}

fn query_bounds(
    db: &mut dyn StatementExecutor,
    resource: &str,
    metric: MetricType,
) -> StoreResult<Option<(f64, f64)>> {
    let result = db.execute(
        SELECT_THRESHOLD_DATA,
        &[Param::from(resource), Param::from(metric.port_type())],
    )?;
    let min = result.get(0, "min").and_then(Param::as_f64);
    let max = result.get(0, "max").and_then(Param::as_f64);
    Ok(min.zip(max))
}
