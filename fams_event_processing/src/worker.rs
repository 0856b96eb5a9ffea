//! Category workers.
//!
//! Each worker owns one store connection. It decodes frames from its egress
//! queue, upserts every sample and, for monitored categories, feeds the
//! category's shared [`Monitor`](crate::monitor::Monitor).

use crate::context::AppContext;
use crate::monitor::{Alert, Observation, SharedMonitor};
use crate::readings::{Sample, extract};
use crate::startup::StartupReport;
use crate::store::StatementExecutor;
use fams_common::frame::{Category, FrameView, peek_category};
use fams_shared_memory::Received;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const RECEIVE_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Name of worker `index` of `category`.
pub fn worker_thread_name(category: Category, index: usize) -> String {
    format!("worker-{}-{}", category.name(), index)
}

/// Counters reported when a worker stops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Frames received.
    pub frames: u64,
    /// Frames rejected as undecodable or for the wrong category.
    pub rejected: u64,
    /// Samples written.
    pub stored: u64,
    /// Samples whose upsert failed.
    pub store_errors: u64,
    /// Samples skipped for an unknown port type.
    pub unknown_ports: u64,
    /// Exceeded and reminder mails triggered.
    pub alerts: u64,
    /// All-clear mails triggered.
    pub all_clears: u64,
}

/// Frame handling of one worker, independent of the queue loop.
pub struct FrameProcessor {
    category: Category,
    coefficient: f64,
    connection: Box<dyn StatementExecutor>,
    monitor: Option<SharedMonitor>,
    stats: WorkerStats,
}

impl std::fmt::Debug for FrameProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameProcessor")
            .field("category", &self.category)
            .field("monitor", &self.monitor)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl FrameProcessor {
    /// Processor for `category` writing through `connection`.
    ///
    /// `monitor` is `None` for categories without threshold checks.
    pub fn new(
        category: Category,
        coefficient: f64,
        connection: Box<dyn StatementExecutor>,
        monitor: Option<SharedMonitor>,
    ) -> Self {
        Self {
            category,
            coefficient,
            connection,
            monitor,
            stats: WorkerStats::default(),
        }
    }

    /// Processor wired from the application context.
    pub fn from_context(ctx: &AppContext, category: Category, connection: Box<dyn StatementExecutor>) -> Self {
        let coefficient = ctx.config.monitor.conductivity_coefficient;
        Self::new(category, coefficient, connection, ctx.monitors.get(category))
    }

    /// Handle one frame. Never fails; problems are logged and counted.
    pub fn process(&mut self, bytes: &[u8]) {
        self.stats.frames += 1;
        match peek_category(bytes) {
            Ok(category) if category == self.category => {}
            Ok(other) => {
                warn!(expected = %self.category, got = %other, "frame on the wrong queue skipped");
                self.stats.rejected += 1;
                return;
            }
            Err(e) => {
                warn!(category = %self.category, "frame skipped: {}", e);
                self.stats.rejected += 1;
                return;
            }
        }

        let extraction = match FrameView::parse(bytes).and_then(|view| extract(&view, self.coefficient)) {
            Ok(extraction) => extraction,
            Err(e) => {
                warn!(category = %self.category, len = bytes.len(), "malformed frame skipped: {}", e);
                self.stats.rejected += 1;
                return;
            }
        };
        if let Some(counts) = &extraction.uneven {
            warn!(category = %self.category, ?counts, "uneven sections, extra elements ignored");
        }
        for port in &extraction.unknown_ports {
            warn!(port_type = port, "unknown port type, sample skipped");
        }
        self.stats.unknown_ports += extraction.unknown_ports.len() as u64;

        for sample in &extraction.samples {
            if self.store(sample) {
                self.monitor(sample);
            }
        }
        debug!(category = %self.category, samples = extraction.samples.len(), "frame processed");
    }

    fn store(&mut self, sample: &Sample) -> bool {
        match self.connection.execute(sample.statement, &sample.params) {
            Ok(_) => {
                self.stats.stored += 1;
                true
            }
            Err(e) => {
                error!(
                    statement = sample.statement,
                    resource = %sample.resource,
                    time = %sample.time,
                    "upsert failed: {}", e
                );
                self.stats.store_errors += 1;
                false
            }
        }
    }

    fn monitor(&mut self, sample: &Sample) {
        let Some(shared) = &self.monitor else {
            return;
        };
        let mut monitor = shared.lock();
        for (metric, value) in &sample.metrics {
            let observation = Observation {
                category: self.category,
                resource: &sample.resource,
                time: &sample.time,
                metric: *metric,
                value: *value,
            };
            match monitor.observe(self.connection.as_mut(), &observation) {
                Some(Alert::AllClear) => self.stats.all_clears += 1,
                Some(_) => self.stats.alerts += 1,
                None => {}
            }
        }
    }

    /// Category handled.
    pub fn category(&self) -> Category {
        self.category
    }

    /// Counters so far.
    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }
}

/// Thread entry point of one worker.
///
/// Opens the store connection before reporting ready. A connection failure is
/// reported to `report` and ends the thread.
pub fn run_worker(ctx: Arc<AppContext>, category: Category, index: usize, report: StartupReport) -> WorkerStats {
    let name = worker_thread_name(category, index);
    let connection = match ctx.connections.connect() {
        Ok(connection) => connection,
        Err(e) => {
            error!(thread = %name, "store connection failed: {}", e);
            report.failed(&name, e.to_string());
            return WorkerStats::default();
        }
    };
    let mut processor = FrameProcessor::from_context(&ctx, category, connection);
    let queue = ctx.queues.egress(category);
    report.ready(&name);

    loop {
        match queue.receive() {
            Ok(Received::Message(bytes)) => processor.process(&bytes),
            Ok(Received::EndOfStream) => break,
            Err(e) => {
                error!(thread = %name, queue = %queue.name(), "receive failed: {}", e);
                std::thread::sleep(RECEIVE_RETRY_DELAY);
            }
        }
    }

    let stats = processor.stats;
    info!(
        thread = %name,
        frames = stats.frames,
        stored = stats.stored,
        store_errors = stats.store_errors,
        alerts = stats.alerts,
        all_clears = stats.all_clears,
        "worker stopped"
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MailSettings, MonitorSettings};
    use crate::mail::MemoryOutbox;
    use crate::monitor::Monitor;
    use crate::store::statements::{SELECT_THRESHOLD_DATA, UPSERT_SENSOR_OUTSIDE_DATA};
    use crate::store::{ConnectionFactory, MemoryDatabase};
    use fams_common::frame::nitrification::NitrificationBatch;
    use fams_common::frame::outside::OutsideBatch;
    use fams_common::metric::MetricType;

    fn outside_frame(room: &[f64]) -> Vec<u8> {
        let n = room.len();
        OutsideBatch {
            accumulated_time: (0..n).map(|i| format!("2024-05-01 10:00:{i:02}")).collect(),
            room_temp: room.to_vec(),
            humidity: vec![45.0; n],
            atmospheric_pressure: vec![1012.0; n],
        }
        .encode()
        .unwrap()
    }

    fn processor(db: &MemoryDatabase, outbox: &Arc<MemoryOutbox>, k: u32) -> FrameProcessor {
        let settings = MonitorSettings {
            violation_count: k,
            ..MonitorSettings::default()
        };
        let mail = MailSettings {
            recipients: vec!["ops@farm.example".into()],
            ..MailSettings::default()
        };
        let monitor = Monitor::new(&settings, mail, outbox.clone());
        let shared = Arc::new(parking_lot::Mutex::new(monitor));
        FrameProcessor::new(Category::Outside, 0.757, db.connect().unwrap(), Some(shared))
    }

    #[test]
    fn test_outside_frame_stored_and_checked() {
        let db = MemoryDatabase::new();
        db.set_threshold("outside", MetricType::RoomTemp, 10.0, 35.0);
        let outbox = Arc::new(MemoryOutbox::new());
        let mut processor = processor(&db, &outbox, 1);

        processor.process(&outside_frame(&[18.0, 41.0, 19.0]));

        assert_eq!(db.row_count("sensor_outside_data"), 3);
        let row = db.row("sensor_outside_data", "2024-05-01 10:00:01", "outside").unwrap();
        assert_eq!(row["room_temp"], 41.0);
        let errors = db.error_messages();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].happened_at, "2024-05-01 10:00:01");
        assert_eq!(errors[0].resolved_at.as_deref(), Some("2024-05-01 10:00:02"));
        assert_eq!(processor.stats().alerts, 1);
        assert_eq!(processor.stats().all_clears, 1);
        assert_eq!(outbox.sent().len(), 2);
    }

    #[test]
    fn test_wrong_category_skipped() {
        let db = MemoryDatabase::new();
        let outbox = Arc::new(MemoryOutbox::new());
        let mut processor = processor(&db, &outbox, 5);
        let bytes = NitrificationBatch {
            accumulated_time: vec!["2024-05-01 10:00:00".into()],
            water_temp: vec![22.0],
        }
        .encode()
        .unwrap();

        processor.process(&bytes);
        processor.process(&[]);
        processor.process(&[Category::Outside.tag(), 9, 0, 0]);

        assert_eq!(processor.stats().frames, 3);
        assert_eq!(processor.stats().rejected, 3);
        assert_eq!(db.executed(UPSERT_SENSOR_OUTSIDE_DATA), 0);
    }

    #[test]
    fn test_store_failure_continues_with_next_sample() {
        let db = MemoryDatabase::new();
        db.fail_statement(UPSERT_SENSOR_OUTSIDE_DATA);
        let mut processor = FrameProcessor::new(Category::Outside, 0.757, db.connect().unwrap(), None);

        processor.process(&outside_frame(&[20.0, 21.0]));
        assert_eq!(processor.stats().store_errors, 2);
        assert_eq!(db.executed(UPSERT_SENSOR_OUTSIDE_DATA), 2);

        db.restore_statement(UPSERT_SENSOR_OUTSIDE_DATA);
        processor.process(&outside_frame(&[22.0]));
        assert_eq!(processor.stats().stored, 1);
        assert_eq!(db.row_count("sensor_outside_data"), 1);
    }

    #[test]
    fn test_failed_upsert_skips_threshold_check() {
        let db = MemoryDatabase::new();
        db.set_threshold("outside", MetricType::RoomTemp, 10.0, 35.0);
        db.fail_statement(UPSERT_SENSOR_OUTSIDE_DATA);
        let outbox = Arc::new(MemoryOutbox::new());
        let mut processor = processor(&db, &outbox, 1);

        processor.process(&outside_frame(&[41.0]));
        assert!(db.error_messages().is_empty());
        assert_eq!(db.executed(SELECT_THRESHOLD_DATA), 0);
    }

    #[test]
    fn test_worker_thread_name() {
        assert_eq!(worker_thread_name(Category::WaterReplace, 3), "worker-water_replace-3");
    }
}
