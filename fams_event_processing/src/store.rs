//! Statement executor collaborator and the in-memory reference engine.
//!
//! Workers never see SQL. They execute named statements with positional
//! parameters through a [`StatementExecutor`], one per thread, opened by a
//! shared [`ConnectionFactory`]. The relational schema lives behind that
//! seam.
//!
//! [`MemoryDatabase`] implements the statement catalogue over plain maps so
//! the daemon runs and is tested without an external engine. Every write can
//! also be appended to a JSON-lines journal.

use crate::config::StoreSettings;
use crate::error::{StoreError, StoreResult};
use chrono::{DateTime, Utc};
use fams_common::metric::MetricType;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Statement names understood by every executor.
pub mod statements {
    /// Upsert one cistern row: `[time, code, inflow, outflow, upper_ill, lower_ill, salinity, ph]`.
    pub const UPSERT_SENSOR_CISTERN_DATA: &str = "UPSERT_SENSOR_CISTERN_DATA";
    /// Upsert one nitrification row: `[time, resource, water_temp]`.
    pub const UPSERT_SENSOR_NITRIFICATION_TANK_DATA: &str = "UPSERT_SENSOR_NITRIFICATION_TANK_DATA";
    /// Upsert one outdoor row: `[time, resource, room_temp, humidity, atmospheric_pressure]`.
    pub const UPSERT_SENSOR_OUTSIDE_DATA: &str = "UPSERT_SENSOR_OUTSIDE_DATA";
    /// Upsert one water-replacement row: `[time, resource, water_level, water_temp]`.
    pub const UPSERT_SENSOR_REPLACE_TANK_DATA: &str = "UPSERT_SENSOR_REPLACE_TANK_DATA";
    /// Bounds of a metric: `[resource, port_type]` -> rows `(min, max)`.
    pub const SELECT_THRESHOLD_DATA: &str = "SELECT_THRESHOLD_DATA";
    /// Open an error message: `[message, happened_at, resource_id, resource_kind, port_type]`.
    pub const INSERT_ERROR_MESSAGE_DATA: &str = "INSERT_ERROR_MESSAGE_DATA";
    /// Close open error messages: `[resource_id, port_type, resolved_at]`.
    pub const UPDATE_STATUS_RESOLVED_ERROR_MESSAGE_DATA: &str =
        "UPDATE_STATUS_RESOLVED_ERROR_MESSAGE_DATA";
    /// Observer addresses -> rows `(email)`.
    pub const SELECT_OBSERVERS_QUERY: &str = "SELECT_OBSERVERS_QUERY";
    /// Prefix of the per-port upserts `UPSERT_SENSOR_PORT_TYPE_<n>`: `[time, code, value]`.
    pub const UPSERT_SENSOR_PORT_TYPE_PREFIX: &str = "UPSERT_SENSOR_PORT_TYPE_";
}

use statements::*;

/// Positional statement parameter / result cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Param {
    /// SQL NULL.
    Null,
    /// Integer.
    Int(i64),
    /// Floating point.
    Float(f64),
    /// Text.
    Text(String),
}

impl Param {
    /// Text content, if this is a text cell.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric content widened to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Integer content.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for Param {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<i32> for Param {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

/// Rows returned by a statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    /// Column names.
    pub columns: Vec<String>,
    /// Row cells, in column order.
    pub rows: Vec<Vec<Param>>,
    /// Rows written by a modifying statement.
    pub affected: usize,
}

impl ResultSet {
    /// Result of a write touching `affected` rows.
    pub fn affected(affected: usize) -> Self {
        Self {
            affected,
            ..Default::default()
        }
    }

    /// Result of a query.
    pub fn rows(columns: &[&str], rows: Vec<Vec<Param>>) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
            affected: 0,
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if no rows were returned.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell at `row` in the column called `column`.
    pub fn get(&self, row: usize, column: &str) -> Option<&Param> {
        let index = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(index)
    }
}

/// One connection executing named statements. Owned by exactly one thread.
pub trait StatementExecutor: Send {
    /// Execute `name` with positional `params`.
    fn execute(&mut self, name: &str, params: &[Param]) -> StoreResult<ResultSet>;
}

/// Opens one executor per worker thread.
pub trait ConnectionFactory: Send + Sync {
    /// Open a new connection.
    fn connect(&self) -> StoreResult<Box<dyn StatementExecutor>>;
}

/// Lifecycle of an error message row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorStatus {
    /// Value is within bounds; no open row.
    #[default]
    Resolved,
    /// Value is out of bounds; a row is open.
    Occurring,
}

/// A persisted error message row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorMessageRecord {
    /// Row id.
    pub id: u64,
    /// Human readable message.
    pub message: String,
    /// Sample timestamp that opened the row.
    pub happened_at: String,
    /// Resource id.
    pub resource_id: String,
    /// Resource kind (category name).
    pub resource_kind: String,
    /// Metric port type.
    pub metric: i32,
    /// Current status.
    pub status: ErrorStatus,
    /// Sample timestamp that closed the row.
    pub resolved_at: Option<String>,
}

/// Column values of one upserted row.
pub type Row = BTreeMap<String, f64>;

#[derive(Serialize)]
struct JournalEntry<'a> {
    at: DateTime<Utc>,
    statement: &'a str,
    params: &'a [Param],
}

/// Target table and value columns of the fixed-shape upserts.
const ROW_UPSERTS: &[(&str, &str, &[&str])] = &[
    (
        UPSERT_SENSOR_CISTERN_DATA,
        "sensor_cistern_data",
        &[
            "inflow_temp",
            "outflow_temp",
            "upper_central_ill",
            "lower_central_ill",
            "salt",
            "ph",
        ],
    ),
    (
        UPSERT_SENSOR_NITRIFICATION_TANK_DATA,
        "sensor_nitrification_tank_data",
        &["water_temp"],
    ),
    (
        UPSERT_SENSOR_OUTSIDE_DATA,
        "sensor_outside_data",
        &["room_temp", "humidity", "atmospheric_pressure"],
    ),
    (
        UPSERT_SENSOR_REPLACE_TANK_DATA,
        "sensor_replace_tank_data",
        &["water_level", "water_temp"],
    ),
];

#[derive(Default)]
struct DatabaseState {
    tables: HashMap<String, BTreeMap<(String, String), Row>>,
    thresholds: HashMap<(String, i32), (f64, f64)>,
    error_messages: Vec<ErrorMessageRecord>,
    observers: Vec<String>,
    executed: HashMap<String, usize>,
    failing: HashSet<String>,
    refuse_connections: bool,
    journal: Option<BufWriter<File>>,
}

/// In-memory statement engine shared by every connection it hands out.
///
/// Cloning yields another handle to the same data.
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<DatabaseState>>,
}

impl std::fmt::Debug for MemoryDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MemoryDatabase")
            .field("tables", &state.tables.len())
            .field("thresholds", &state.thresholds.len())
            .field("error_messages", &state.error_messages.len())
            .field("journal", &state.journal.is_some())
            .finish()
    }
}

impl MemoryDatabase {
    /// Empty database without a journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Database seeded from configuration, journaling if a path is set.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Journal`] if the journal cannot be opened.
    pub fn from_settings(settings: &StoreSettings) -> StoreResult<Self> {
        let db = Self::new();
        for spec in &settings.thresholds {
            db.set_threshold(&spec.resource, spec.metric, spec.min, spec.max);
        }
        for observer in &settings.observers {
            db.add_observer(observer);
        }
        if let Some(path) = &settings.journal_path {
            db.open_journal(path)?;
        }
        info!(
            thresholds = settings.thresholds.len(),
            observers = settings.observers.len(),
            journal = ?settings.journal_path,
            "memory store ready"
        );
        Ok(db)
    }

    /// Append every subsequent write to `path`.
    pub fn open_journal(&self, path: &Path) -> StoreResult<()> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        self.state.lock().journal = Some(BufWriter::new(file));
        Ok(())
    }

    /// Insert or replace the bounds of `metric` on `resource`.
    pub fn set_threshold(&self, resource: &str, metric: MetricType, min: f64, max: f64) {
        self.state
            .lock()
            .thresholds
            .insert((resource.to_string(), metric.port_type()), (min, max));
    }

    /// Remove the bounds of `metric` on `resource`.
    pub fn clear_threshold(&self, resource: &str, metric: MetricType) {
        self.state
            .lock()
            .thresholds
            .remove(&(resource.to_string(), metric.port_type()));
    }

    /// Register an observer address.
    pub fn add_observer(&self, email: &str) {
        self.state.lock().observers.push(email.to_string());
    }

    /// Make every execution of `statement` fail.
    pub fn fail_statement(&self, statement: &str) {
        self.state.lock().failing.insert(statement.to_string());
    }

    /// Undo [`fail_statement`](Self::fail_statement).
    pub fn restore_statement(&self, statement: &str) {
        self.state.lock().failing.remove(statement);
    }

    /// Make [`ConnectionFactory::connect`] fail.
    pub fn refuse_connections(&self, refuse: bool) {
        self.state.lock().refuse_connections = refuse;
    }

    /// Stored row of `table` keyed by `(time, resource)`.
    pub fn row(&self, table: &str, time: &str, resource: &str) -> Option<Row> {
        self.state
            .lock()
            .tables
            .get(table)?
            .get(&(time.to_string(), resource.to_string()))
            .cloned()
    }

    /// Number of rows in `table`.
    pub fn row_count(&self, table: &str) -> usize {
        self.state.lock().tables.get(table).map_or(0, BTreeMap::len)
    }

    /// All error message rows, oldest first.
    pub fn error_messages(&self) -> Vec<ErrorMessageRecord> {
        self.state.lock().error_messages.clone()
    }

    /// How often `statement` was executed, failures included.
    pub fn executed(&self, statement: &str) -> usize {
        self.state
            .lock()
            .executed
            .get(statement)
            .copied()
            .unwrap_or(0)
    }

    /// Flush the journal.
    pub fn flush(&self) -> StoreResult<()> {
        if let Some(journal) = self.state.lock().journal.as_mut() {
            journal.flush()?;
        }
        Ok(())
    }
}

impl ConnectionFactory for MemoryDatabase {
    fn connect(&self) -> StoreResult<Box<dyn StatementExecutor>> {
        if self.state.lock().refuse_connections {
            return Err(StoreError::Connection("connections refused".to_string()));
        }
        Ok(Box::new(MemoryConnection { db: self.clone() }))
    }
}

/// Connection handed out by [`MemoryDatabase`].
#[derive(Debug)]
pub struct MemoryConnection {
    db: MemoryDatabase,
}

impl StatementExecutor for MemoryConnection {
    fn execute(&mut self, name: &str, params: &[Param]) -> StoreResult<ResultSet> {
        let mut state = self.db.state.lock();
        *state.executed.entry(name.to_string()).or_default() += 1;
        if state.failing.contains(name) {
            return Err(StoreError::Execution {
                statement: name.to_string(),
                reason: "injected failure".to_string(),
            });
        }

        let result = state.run(name, params)?;
        if result.affected > 0 {
            state.journal(name, params)?;
        }
        debug!(statement = name, affected = result.affected, rows = result.len(), "executed");
        Ok(result)
    }
}

fn text<'a>(statement: &str, params: &'a [Param], index: usize) -> StoreResult<&'a str> {
    params
        .get(index)
        .and_then(Param::as_str)
        .ok_or_else(|| StoreError::InvalidParams {
            statement: statement.to_string(),
            reason: format!("parameter {index} must be text"),
        })
}

fn number(statement: &str, params: &[Param], index: usize) -> StoreResult<f64> {
    params
        .get(index)
        .and_then(Param::as_f64)
        .ok_or_else(|| StoreError::InvalidParams {
            statement: statement.to_string(),
            reason: format!("parameter {index} must be numeric"),
        })
}

fn integer(statement: &str, params: &[Param], index: usize) -> StoreResult<i64> {
    params
        .get(index)
        .and_then(Param::as_i64)
        .ok_or_else(|| StoreError::InvalidParams {
            statement: statement.to_string(),
            reason: format!("parameter {index} must be an integer"),
        })
}

fn arity(statement: &str, params: &[Param], expected: usize) -> StoreResult<()> {
    if params.len() != expected {
        return Err(StoreError::InvalidParams {
            statement: statement.to_string(),
            reason: format!("expected {expected} parameters, got {}", params.len()),
        });
    }
    Ok(())
}

impl DatabaseState {
    fn run(&mut self, name: &str, params: &[Param]) -> StoreResult<ResultSet> {
        if let Some(port) = name.strip_prefix(UPSERT_SENSOR_PORT_TYPE_PREFIX) {
            let metric = port
                .parse::<i32>()
                .ok()
                .and_then(MetricType::from_port_type)
                .ok_or_else(|| StoreError::UnknownStatement {
                    name: name.to_string(),
                })?;
            let (table, column) = metric.storage();
            return self.upsert(name, table, &[column], params);
        }
        if let Some((_, table, columns)) = ROW_UPSERTS.iter().find(|(n, _, _)| *n == name) {
            return self.upsert(name, table, columns, params);
        }

        match name {
            SELECT_THRESHOLD_DATA => {
                arity(name, params, 2)?;
                let resource = text(name, params, 0)?;
                let port = integer(name, params, 1)? as i32;
                let rows = self
                    .thresholds
                    .get(&(resource.to_string(), port))
                    .map(|(min, max)| vec![vec![Param::Float(*min), Param::Float(*max)]])
                    .unwrap_or_default();
                Ok(ResultSet::rows(&["min", "max"], rows))
            }
            INSERT_ERROR_MESSAGE_DATA => {
                arity(name, params, 5)?;
                let id = self.error_messages.len() as u64 + 1;
                self.error_messages.push(ErrorMessageRecord {
                    id,
                    message: text(name, params, 0)?.to_string(),
                    happened_at: text(name, params, 1)?.to_string(),
                    resource_id: text(name, params, 2)?.to_string(),
                    resource_kind: text(name, params, 3)?.to_string(),
                    metric: integer(name, params, 4)? as i32,
                    status: ErrorStatus::Occurring,
                    resolved_at: None,
                });
                let mut result = ResultSet::rows(&["id"], vec![vec![Param::Int(id as i64)]]);
                result.affected = 1;
                Ok(result)
            }
            UPDATE_STATUS_RESOLVED_ERROR_MESSAGE_DATA => {
                arity(name, params, 3)?;
                let resource = text(name, params, 0)?;
                let port = integer(name, params, 1)? as i32;
                let resolved_at = text(name, params, 2)?;
                let mut affected = 0;
                for record in self.error_messages.iter_mut().filter(|r| {
                    r.status == ErrorStatus::Occurring && r.resource_id == resource && r.metric == port
                }) {
                    record.status = ErrorStatus::Resolved;
                    record.resolved_at = Some(resolved_at.to_string());
                    affected += 1;
                }
                Ok(ResultSet::affected(affected))
            }
            SELECT_OBSERVERS_QUERY => {
                let rows = self
                    .observers
                    .iter()
                    .map(|email| vec![Param::Text(email.clone())])
                    .collect();
                Ok(ResultSet::rows(&["email"], rows))
            }
            _ => Err(StoreError::UnknownStatement {
                name: name.to_string(),
            }),
        }
    }

    /// `[time, resource, values...]` keyed by `(time, resource)`; later writes
    /// overwrite the same columns.
    fn upsert(
        &mut self,
        statement: &str,
        table: &str,
        columns: &[&str],
        params: &[Param],
    ) -> StoreResult<ResultSet> {
        arity(statement, params, 2 + columns.len())?;
        let time = text(statement, params, 0)?;
        let resource = text(statement, params, 1)?;
        if time.is_empty() || resource.is_empty() {
            return Err(StoreError::InvalidParams {
                statement: statement.to_string(),
                reason: "empty key".to_string(),
            });
        }

        let mut values = Vec::with_capacity(columns.len());
        for index in 0..columns.len() {
            values.push(number(statement, params, 2 + index)?);
        }

        let row = self
            .tables
            .entry(table.to_string())
            .or_default()
            .entry((time.to_string(), resource.to_string()))
            .or_default();
        for (column, value) in columns.iter().zip(values) {
            row.insert(column.to_string(), value);
        }
        Ok(ResultSet::affected(1))
    }

    fn journal(&mut self, statement: &str, params: &[Param]) -> StoreResult<()> {
        if let Some(journal) = self.journal.as_mut() {
            let entry = JournalEntry {
                at: Utc::now(),
                statement,
                params,
            };
            serde_json::to_writer(&mut *journal, &entry)?;
            journal.write_all(b"\n")?;
            journal.flush()?;
        }
        Ok(())
    }
}
