//! Consumer-side lifecycle of live food: expire, ingest, consume.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::clock::Clock;
use crate::message_queue::MessageQueue;
use crate::types::{ConsumedEvent, FoodId, FoodItem, Position};

/// Lifetime counters for items that passed through the working set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FieldStats {
    pub ingested: u64,
    pub expired: u64,
    pub consumed: u64,
}

/// Everything one reconcile pass did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub expired: Vec<FoodId>,
    pub ingested: Option<FoodId>,
    pub consumed: Option<ConsumedEvent>,
}

struct FieldState {
    items: Vec<FoodItem>,
    stats: FieldStats,
}

impl FieldState {
    fn sweep_expired(&mut self, now: Instant, expiry: Duration) -> Vec<FoodId> {
        let mut expired = Vec::new();
        self.items.retain(|item| {
            let fresh = item.age(now) < expiry;
            if !fresh {
                expired.push(item.id);
            }
            fresh
        });
        self.stats.expired += expired.len() as u64;
        expired
    }

    fn take_at(&mut self, position: Position) -> Option<FoodItem> {
        // First match in ingestion order wins when items share a cell.
        let index = self.items.iter().position(|item| item.position == position)?;
        self.stats.consumed += 1;
        Some(self.items.remove(index))
    }
}

/// Owns the working set of live food and reconciles it once per game cycle.
///
/// Readers such as a renderer go through [`Reconciler::snapshot`] or
/// [`Reconciler::with_items`], which take the same lock as a reconcile pass.
pub struct Reconciler {
    state: Mutex<FieldState>,
    queue: Arc<MessageQueue<FoodItem>>,
    clock: Arc<dyn Clock>,
    expiry: Duration,
}

impl Reconciler {
    pub fn new(queue: Arc<MessageQueue<FoodItem>>, clock: Arc<dyn Clock>, expiry: Duration) -> Self {
        Self {
            state: Mutex::new(FieldState {
                items: Vec::new(),
                stats: FieldStats::default(),
            }),
            queue,
            clock,
            expiry,
        }
    }

    /// Run one cycle and report only whether the actor ate something.
    pub fn reconcile(&self, actor: Position) -> Option<ConsumedEvent> {
        let report = self.run_cycle(actor);
        if !report.expired.is_empty() || report.ingested.is_some() {
            trace!(
                expired = report.expired.len(),
                ingested = ?report.ingested,
                "cycle reconciled"
            );
        }
        report.consumed
    }

    /// Run one cycle: drop expired items, absorb at most one queued item,
    /// then consume the first item under `actor`.
    pub fn run_cycle(&self, actor: Position) -> CycleReport {
        let mut guard = self.state.lock().expect("working set mutex poisoned");
        let now = self.clock.now();

        let mut expired = guard.sweep_expired(now, self.expiry);

        // One item per cycle, however deep the backlog. Food that went
        // stale while queued is dropped instead of placed.
        let ingested = match self.queue.try_receive() {
            Some(item) if item.age(now) >= self.expiry => {
                guard.stats.ingested += 1;
                guard.stats.expired += 1;
                expired.push(item.id);
                None
            }
            Some(item) => {
                let id = item.id;
                debug!(id, position = %item.position, "food placed");
                guard.items.push(item);
                guard.stats.ingested += 1;
                Some(id)
            }
            None => None,
        };
        for id in &expired {
            debug!(id, "food expired and removed");
        }

        let consumed = guard.take_at(actor).map(|item| {
            debug!(id = item.id, worker = item.worker, position = %item.position, "food eaten");
            ConsumedEvent::from(&item)
        });

        CycleReport {
            expired,
            ingested,
            consumed,
        }
    }

    /// Copy of the working set in ingestion order.
    pub fn snapshot(&self) -> Vec<FoodItem> {
        self.with_items(|items| items.iter().map(FoodItem::duplicate).collect())
    }

    /// Borrow the working set under the reconcile lock.
    pub fn with_items<R>(&self, f: impl FnOnce(&[FoodItem]) -> R) -> R {
        let guard = self.state.lock().expect("working set mutex poisoned");
        f(&guard.items)
    }

    pub fn live_count(&self) -> usize {
        self.with_items(<[FoodItem]>::len)
    }

    pub fn stats(&self) -> FieldStats {
        self.state.lock().expect("working set mutex poisoned").stats
    }
}
