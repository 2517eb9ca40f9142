//! Facade wiring the queue, generator pool and reconciler for the game loop.

use std::sync::Arc;

use tracing::info;

use crate::clock::{Clock, MonotonicClock};
use crate::config::PipelineConfig;
use crate::error::{ConfigError, PipelineError};
use crate::generator::{FoodGenerator, ProductionSnapshot};
use crate::message_queue::{MessageQueue, QueueStats};
use crate::reconciler::{FieldStats, Reconciler};
use crate::types::{ConsumedEvent, FoodItem, Position};

/// Combined counters from every stage.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PipelineMetrics {
    pub production: ProductionSnapshot,
    pub queue: QueueStats,
    pub field: FieldStats,
    pub pending: usize,
    pub live: usize,
}

impl PipelineMetrics {
    /// True when every produced item is queued, live, expired, eaten or
    /// dropped. Only meaningful once the workers have stopped.
    pub fn is_balanced(&self) -> bool {
        let queue_ok = self.queue.sent
            == self.queue.received + self.pending as u64 + self.queue.dropped;
        let field_ok =
            self.field.ingested == self.field.expired + self.field.consumed + self.live as u64;
        let handoff_ok = self.queue.received == self.field.ingested;
        queue_ok && field_ok && handoff_ok && self.production.total == self.queue.sent
    }
}

/// Handoff queue shaped by the capacity and overflow settings.
pub fn handoff_queue(config: &PipelineConfig) -> MessageQueue<FoodItem> {
    match config.queue_capacity {
        Some(capacity) => MessageQueue::bounded(capacity, config.overflow),
        None => MessageQueue::new(),
    }
}

/// Perishable food pipeline as seen by the game loop.
pub struct FoodPipeline {
    queue: Arc<MessageQueue<FoodItem>>,
    generator: FoodGenerator,
    reconciler: Reconciler,
}

impl FoodPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, Arc::new(MonotonicClock))
    }

    pub fn with_clock(config: PipelineConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        config.validate()?;
        let queue = Arc::new(handoff_queue(&config));
        let generator = FoodGenerator::new(&config, Arc::clone(&queue), Arc::clone(&clock));
        let reconciler = Reconciler::new(Arc::clone(&queue), clock, config.expiry());
        info!(
            width = config.bounds.width,
            height = config.bounds.height,
            expiry_ms = config.expiry().as_millis() as u64,
            bounded = config.queue_capacity.is_some(),
            "food pipeline ready"
        );
        Ok(Self {
            queue,
            generator,
            reconciler,
        })
    }

    /// Launch the generator pool; a second call fails.
    pub fn start(&self, worker_count: usize) -> Result<(), PipelineError> {
        self.generator.start(worker_count)
    }

    pub fn reconcile(&self, actor: Position) -> Option<ConsumedEvent> {
        self.reconciler.reconcile(actor)
    }

    pub fn snapshot(&self) -> Vec<FoodItem> {
        self.reconciler.snapshot()
    }

    pub fn with_items<R>(&self, f: impl FnOnce(&[FoodItem]) -> R) -> R {
        self.reconciler.with_items(f)
    }

    pub fn metrics(&self) -> PipelineMetrics {
        PipelineMetrics {
            production: self.generator.metrics(),
            queue: self.queue.stats(),
            field: self.reconciler.stats(),
            pending: self.queue.len(),
            live: self.reconciler.live_count(),
        }
    }

    /// Stop and join the workers, then close the queue; idempotent.
    pub fn shutdown(&self) {
        self.generator.shutdown();
        self.queue.close();
    }
}

impl Drop for FoodPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}
