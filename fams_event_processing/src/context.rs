//! Application context handed to every thread.

use crate::config::EventProcessingConfig;
use crate::error::EventProcessingError;
use crate::mail::{MailSender, mailer_from_settings};
use crate::monitor::MonitorSet;
use crate::store::{ConnectionFactory, MemoryDatabase};
use fams_common::config::{QueueSettings, QueueSpec};
use fams_common::frame::Category;
use fams_shared_memory::{QueueResult, SharedQueue};
use std::sync::Arc;
use tracing::{info, warn};

/// The ingress queue plus one egress queue per category, all owned by this
/// process.
#[derive(Debug)]
pub struct QueueSet {
    ingress: SharedQueue,
    egress: [SharedQueue; 5],
}

fn create(spec: &QueueSpec) -> QueueResult<SharedQueue> {
    SharedQueue::create(&spec.name, spec.capacity_bytes)
}

impl QueueSet {
    /// Create every queue in `settings`.
    ///
    /// Queues created before a failure are unlinked again when dropped.
    pub fn create_all(settings: &QueueSettings) -> QueueResult<Self> {
        let ingress = create(&settings.ingress)?;
        let egress = [
            create(settings.egress(Category::Sensor))?,
            create(settings.egress(Category::Cistern))?,
            create(settings.egress(Category::Nitrification))?,
            create(settings.egress(Category::Outside))?,
            create(settings.egress(Category::WaterReplace))?,
        ];
        info!(ingress = %settings.ingress.name, "queues created");
        Ok(Self { ingress, egress })
    }

    /// Queue shared with reception processes.
    pub fn ingress(&self) -> &SharedQueue {
        &self.ingress
    }

    /// Egress queue of `category`.
    pub fn egress(&self, category: Category) -> &SharedQueue {
        // Tags start at 1 and are contiguous.
        &self.egress[category.tag() as usize - 1]
    }

    /// Every queue, ingress first.
    pub fn iter(&self) -> impl Iterator<Item = &SharedQueue> {
        std::iter::once(&self.ingress).chain(self.egress.iter())
    }

    /// Signal end-of-stream on every queue. Failures are logged.
    pub fn signal_end_all(&self) {
        for queue in self.iter() {
            if let Err(e) = queue.signal_end() {
                warn!(queue = %queue.name(), "signal_end failed: {}", e);
            }
        }
    }

    /// Unlink every queue. Failures are logged.
    pub fn release_all(&self) {
        for queue in self.iter() {
            if let Err(e) = queue.release() {
                warn!(queue = %queue.name(), "release failed: {}", e);
            }
        }
    }
}

/// Everything a thread entry point needs. No process-wide statics.
pub struct AppContext {
    /// Validated configuration.
    pub config: EventProcessingConfig,
    /// Queues owned by the daemon.
    pub queues: QueueSet,
    /// Opens one store connection per worker.
    pub connections: Arc<dyn ConnectionFactory>,
    /// Alert mail transport.
    pub mailer: Arc<dyn MailSender>,
    /// One threshold monitor per monitored category, shared by its workers.
    pub monitors: MonitorSet,
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("service", &self.config.shared.service_name)
            .field("queues", &self.queues)
            .field("monitors", &self.monitors)
            .finish_non_exhaustive()
    }
}

impl AppContext {
    /// Assemble a context from explicit collaborators.
    pub fn new(
        config: EventProcessingConfig,
        queues: QueueSet,
        connections: Arc<dyn ConnectionFactory>,
        mailer: Arc<dyn MailSender>,
    ) -> Self {
        let monitors = MonitorSet::new(&config.monitor, &config.mail, &mailer);
        Self {
            config,
            queues,
            connections,
            mailer,
            monitors,
        }
    }

    /// Build the production context: queues, memory store and configured mailer.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid, a queue cannot be created, the
    /// journal cannot be opened or the mail transport cannot be set up.
    pub fn from_config(config: EventProcessingConfig) -> Result<Self, EventProcessingError> {
        config.validate()?;
        let connections: Arc<dyn ConnectionFactory> =
            Arc::new(MemoryDatabase::from_settings(&config.store)?);
        let mailer = mailer_from_settings(&config.mail)?;
        let queues = QueueSet::create_all(&config.queues)?;
        Ok(Self::new(config, queues, connections, mailer))
    }
}
