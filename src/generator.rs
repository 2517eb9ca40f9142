//! Background food workers feeding the handoff queue.

use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::{FieldBounds, PipelineConfig, SpawnOrder};
use crate::error::{ConfigError, PipelineError};
use crate::message_queue::{MessageQueue, SendError};
use crate::types::{FoodItem, Position, WorkerId};

/// Pool-wide stop flag that also interrupts sleeping workers.
#[derive(Default)]
pub struct ShutdownSignal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

impl ShutdownSignal {
    pub fn trigger(&self) {
        let mut guard = self.stopped.lock().expect("shutdown mutex poisoned");
        *guard = true;
        self.wake.notify_all();
    }

    pub fn is_triggered(&self) -> bool {
        *self.stopped.lock().expect("shutdown mutex poisoned")
    }

    /// Sleep for up to `timeout`; returns true if shutdown was triggered.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let guard = self.stopped.lock().expect("shutdown mutex poisoned");
        let (guard, _) = self
            .wake
            .wait_timeout_while(guard, timeout, |stopped| !*stopped)
            .expect("condvar wait failed");
        *guard
    }
}

/// Point-in-time copy of the production counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProductionSnapshot {
    pub total: u64,
    pub per_worker: Vec<u64>,
}

/// Items successfully handed to the queue, per worker.
///
/// Guarded by its own lock; it never shares a critical section with the
/// working set.
#[derive(Default)]
pub struct ProductionMetrics {
    state: Mutex<ProductionSnapshot>,
}

impl ProductionMetrics {
    fn register_workers(&self, count: usize) {
        let mut guard = self.state.lock().expect("metrics mutex poisoned");
        if guard.per_worker.len() < count {
            guard.per_worker.resize(count, 0);
        }
    }

    fn record(&self, worker: WorkerId) {
        let mut guard = self.state.lock().expect("metrics mutex poisoned");
        guard.total += 1;
        if guard.per_worker.len() <= worker {
            guard.per_worker.resize(worker + 1, 0);
        }
        guard.per_worker[worker] += 1;
    }

    pub fn snapshot(&self) -> ProductionSnapshot {
        self.state.lock().expect("metrics mutex poisoned").clone()
    }
}

#[derive(Clone)]
struct WorkerSettings {
    bounds: FieldBounds,
    time_unit: Duration,
    delay_units: RangeInclusive<u32>,
    order: SpawnOrder,
}

struct Worker {
    id: WorkerId,
    settings: WorkerSettings,
    rng: Pcg32,
    queue: Arc<MessageQueue<FoodItem>>,
    clock: Arc<dyn Clock>,
    shutdown: Arc<ShutdownSignal>,
    metrics: Arc<ProductionMetrics>,
    next_id: Arc<AtomicU64>,
}

impl Worker {
    fn run(mut self) {
        debug!(worker = self.id, "food worker started");
        loop {
            if self.settings.order == SpawnOrder::DelayThenProduce && self.pause() {
                break;
            }
            if self.shutdown.is_triggered() || !self.produce() {
                break;
            }
            if self.settings.order == SpawnOrder::ProduceThenDelay && self.pause() {
                break;
            }
        }
        debug!(worker = self.id, "food worker stopped");
    }

    /// Random whole-unit sleep; true when woken by shutdown.
    fn pause(&mut self) -> bool {
        let units = self.rng.random_range(self.settings.delay_units.clone());
        self.shutdown.wait_timeout(self.settings.time_unit * units)
    }

    /// Build and send one item; false once the queue is closed.
    fn produce(&mut self) -> bool {
        let position = Position::new(
            self.rng.random_range(0..self.settings.bounds.width),
            self.rng.random_range(0..self.settings.bounds.height),
        );
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let item = FoodItem::new(id, self.id, position, self.clock.now());
        match self.queue.send(item) {
            Ok(()) => {
                self.metrics.record(self.id);
                debug!(worker = self.id, id, %position, "food created");
                true
            }
            Err(SendError::Full(item)) => {
                warn!(worker = self.id, id = item.id, "queue full, food discarded");
                true
            }
            Err(SendError::Closed(_)) => false,
        }
    }
}

/// Fixed pool of independent food workers.
pub struct FoodGenerator {
    settings: WorkerSettings,
    seed: Option<u64>,
    queue: Arc<MessageQueue<FoodItem>>,
    clock: Arc<dyn Clock>,
    shutdown: Arc<ShutdownSignal>,
    metrics: Arc<ProductionMetrics>,
    next_id: Arc<AtomicU64>,
    started: AtomicBool,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl FoodGenerator {
    /// `config` must already have passed [`PipelineConfig::validate`].
    pub fn new(
        config: &PipelineConfig,
        queue: Arc<MessageQueue<FoodItem>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        debug_assert!(config.validate().is_ok(), "generator built from invalid config");
        Self {
            settings: WorkerSettings {
                bounds: config.bounds,
                time_unit: config.time_unit,
                delay_units: config.spawn_delay_units.clone(),
                order: config.spawn_order,
            },
            seed: config.seed,
            queue,
            clock,
            shutdown: Arc::new(ShutdownSignal::default()),
            metrics: Arc::new(ProductionMetrics::default()),
            next_id: Arc::new(AtomicU64::new(0)),
            started: AtomicBool::new(false),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Launch `worker_count` named worker threads; call once.
    pub fn start(&self, worker_count: usize) -> Result<(), PipelineError> {
        if worker_count == 0 {
            return Err(ConfigError::NoWorkers.into());
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(PipelineError::AlreadyStarted);
        }
        self.metrics.register_workers(worker_count);

        let mut handles = self.handles.lock().expect("worker handles mutex poisoned");
        for id in 0..worker_count {
            let seed = match self.seed {
                Some(base) => base.wrapping_add(id as u64),
                None => rand::random(),
            };
            let worker = Worker {
                id,
                settings: self.settings.clone(),
                rng: Pcg32::seed_from_u64(seed),
                queue: Arc::clone(&self.queue),
                clock: Arc::clone(&self.clock),
                shutdown: Arc::clone(&self.shutdown),
                metrics: Arc::clone(&self.metrics),
                next_id: Arc::clone(&self.next_id),
            };
            let handle = thread::Builder::new()
                .name(format!("food-worker-{id}"))
                .spawn(move || worker.run())
                .map_err(|source| PipelineError::WorkerSpawn { worker: id, source })?;
            handles.push(handle);
        }
        info!(workers = worker_count, order = ?self.settings.order, "food generator started");
        Ok(())
    }

    /// Stop every worker and wait for it to exit; safe to call repeatedly.
    pub fn shutdown(&self) {
        self.shutdown.trigger();
        let handles: Vec<_> = self
            .handles
            .lock()
            .expect("worker handles mutex poisoned")
            .drain(..)
            .collect();
        if handles.is_empty() {
            return;
        }
        let count = handles.len();
        for handle in handles {
            if handle.join().is_err() {
                warn!("food worker panicked before shutdown");
            }
        }
        info!(workers = count, "food generator stopped");
    }

    pub fn metrics(&self) -> ProductionSnapshot {
        self.metrics.snapshot()
    }
}

impl Drop for FoodGenerator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MonotonicClock;
    use crate::message_queue::OverflowPolicy;
    use crate::pipeline::handoff_queue;
    use std::collections::HashSet;
    use std::time::Instant;

    fn fast_config(bounds: FieldBounds, order: SpawnOrder) -> PipelineConfig {
        PipelineConfig {
            bounds,
            time_unit: Duration::from_millis(1),
            spawn_delay_units: 1..=2,
            spawn_order: order,
            ..PipelineConfig::default()
        }
    }

    fn build(config: &PipelineConfig) -> (FoodGenerator, Arc<MessageQueue<FoodItem>>) {
        config.validate().expect("valid config");
        let queue = Arc::new(handoff_queue(config));
        let generator = FoodGenerator::new(config, Arc::clone(&queue), Arc::new(MonotonicClock));
        (generator, queue)
    }

    #[test]
    fn generated_items_stay_in_bounds() {
        let bounds = FieldBounds::new(3, 2);
        let (generator, queue) = build(&fast_config(bounds, SpawnOrder::DelayThenProduce));
        generator.start(4).expect("start");

        let mut ids = HashSet::new();
        for _ in 0..200 {
            let item = queue.receive_blocking().expect("queue closed");
            assert!((0..bounds.width).contains(&item.position.x));
            assert!((0..bounds.height).contains(&item.position.y));
            assert!(item.worker < 4);
            // Serials are unique across the whole pool.
            assert!(ids.insert(item.id));
        }
        generator.shutdown();
    }

    #[test]
    fn produce_then_delay_emits_first_item_immediately() {
        let config = PipelineConfig {
            bounds: FieldBounds::new(10, 10),
            time_unit: Duration::from_secs(10),
            spawn_order: SpawnOrder::ProduceThenDelay,
            ..PipelineConfig::default()
        };
        let (generator, queue) = build(&config);
        generator.start(2).expect("start");

        let deadline = Instant::now() + Duration::from_secs(2);
        while queue.len() < 2 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(queue.len(), 2);

        // Workers are mid-sleep for 50s+; shutdown must interrupt them.
        let started = Instant::now();
        generator.shutdown();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(generator.metrics().total, 2);
    }

    #[test]
    fn delay_then_produce_waits_before_first_item() {
        let config = PipelineConfig {
            time_unit: Duration::from_secs(1),
            ..PipelineConfig::default()
        };
        let (generator, queue) = build(&config);
        generator.start(3).expect("start");
        thread::sleep(Duration::from_millis(100));
        assert_eq!(queue.len(), 0);
        generator.shutdown();
        assert_eq!(generator.metrics().total, 0);
    }

    #[test]
    fn start_is_call_once() {
        let (generator, _queue) = build(&fast_config(
            FieldBounds::new(5, 5),
            SpawnOrder::DelayThenProduce,
        ));
        assert!(matches!(
            generator.start(0),
            Err(PipelineError::Config(ConfigError::NoWorkers))
        ));
        generator.start(1).expect("first start");
        assert!(matches!(generator.start(1), Err(PipelineError::AlreadyStarted)));
        generator.shutdown();
    }

    #[test]
    fn metrics_match_queue_after_shutdown() {
        let (generator, queue) = build(&fast_config(
            FieldBounds::new(8, 8),
            SpawnOrder::ProduceThenDelay,
        ));
        generator.start(3).expect("start");
        thread::sleep(Duration::from_millis(50));
        generator.shutdown();

        let metrics = generator.metrics();
        assert_eq!(metrics.per_worker.len(), 3);
        assert_eq!(metrics.per_worker.iter().sum::<u64>(), metrics.total);
        assert_eq!(metrics.total, queue.stats().sent);
        assert!(metrics.per_worker.iter().all(|&count| count >= 1));
    }

    #[test]
    fn seeded_worker_is_reproducible() {
        let positions = |seed| {
            let config = PipelineConfig {
                seed: Some(seed),
                ..fast_config(FieldBounds::new(50, 50), SpawnOrder::ProduceThenDelay)
            };
            let (generator, queue) = build(&config);
            generator.start(1).expect("start");
            let positions: Vec<Position> = (0..10)
                .map(|_| queue.receive_blocking().expect("queue closed").position)
                .collect();
            generator.shutdown();
            positions
        };
        assert_eq!(positions(42), positions(42));
    }

    #[test]
    fn closed_queue_stops_workers() {
        let (generator, queue) = build(&fast_config(
            FieldBounds::new(4, 4),
            SpawnOrder::ProduceThenDelay,
        ));
        queue.close();
        generator.start(2).expect("start");
        let handles: Vec<_> = generator
            .handles
            .lock()
            .expect("worker handles mutex poisoned")
            .drain(..)
            .collect();
        for handle in handles {
            handle.join().expect("worker panicked");
        }
        assert_eq!(generator.metrics().total, 0);
    }

    #[test]
    fn full_queue_discards_food_and_workers_keep_running() {
        let config = PipelineConfig {
            queue_capacity: Some(1),
            overflow: OverflowPolicy::Reject,
            ..fast_config(FieldBounds::new(6, 6), SpawnOrder::ProduceThenDelay)
        };
        let (generator, queue) = build(&config);
        generator.start(4).expect("start");

        // Nobody drains, so every send after the first hits a full queue.
        let deadline = Instant::now() + Duration::from_secs(2);
        while queue.stats().rejected < 4 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        {
            let handles = generator.handles.lock().expect("worker handles mutex poisoned");
            assert_eq!(handles.len(), 4);
            assert!(handles.iter().all(|handle| !handle.is_finished()));
        }
        generator.shutdown();

        let stats = queue.stats();
        assert!(stats.rejected >= 4);
        assert_eq!(stats.sent, 1);
        assert_eq!(queue.len(), 1);
        // Rejected food never counts as produced.
        assert_eq!(generator.metrics().total, stats.sent);
    }
}
