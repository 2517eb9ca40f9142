//! Shared identifiers and the food item model used across the pipeline.

use std::fmt;
use std::time::{Duration, Instant};

/// Pool-unique serial assigned to every food item.
pub type FoodId = u64;
/// Index of the generator worker that produced an item.
pub type WorkerId = usize;

/// Integer grid coordinate on the play field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// One perishable piece of food.
///
/// Not `Clone` on purpose: an item moves from its worker through the queue
/// into the working set and is owned by exactly one place at a time.
/// Snapshots copy it through [`FoodItem::duplicate`].
#[derive(Debug, PartialEq, Eq)]
pub struct FoodItem {
    pub id: FoodId,
    pub worker: WorkerId,
    pub position: Position,
    created_at: Instant,
}

impl FoodItem {
    /// Construct an item stamped with `created_at`; the stamp never changes.
    pub fn new(id: FoodId, worker: WorkerId, position: Position, created_at: Instant) -> Self {
        Self {
            id,
            worker,
            position,
            created_at,
        }
    }

    #[allow(dead_code)]
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Age relative to `now`, clamped at zero.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }

    /// Read-only copy for render snapshots.
    pub fn duplicate(&self) -> Self {
        Self::new(self.id, self.worker, self.position, self.created_at)
    }
}

/// Emitted when the actor lands on a live item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConsumedEvent {
    pub id: FoodId,
    pub worker: WorkerId,
    pub position: Position,
}

impl From<&FoodItem> for ConsumedEvent {
    fn from(item: &FoodItem) -> Self {
        Self {
            id: item.id,
            worker: item.worker,
            position: item.position,
        }
    }
}
