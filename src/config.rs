//! Pipeline settings and their up-front validation.

use std::ops::RangeInclusive;
use std::time::Duration;

use crate::error::ConfigError;
use crate::message_queue::OverflowPolicy;

// Game defaults: 32x32 grid, food lives 10s, workers wait 5-10s between spawns.
pub const DEFAULT_GRID_WIDTH: i32 = 32;
pub const DEFAULT_GRID_HEIGHT: i32 = 32;
pub const DEFAULT_EXPIRY_UNITS: u32 = 10;
pub const DEFAULT_MIN_DELAY_UNITS: u32 = 5;
pub const DEFAULT_MAX_DELAY_UNITS: u32 = 10;
pub const DEFAULT_WORKERS: usize = 5;

/// Play-field size in grid cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldBounds {
    pub width: i32,
    pub height: i32,
}

impl FieldBounds {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width <= 0 || self.height <= 0 {
            return Err(ConfigError::InvalidBounds {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }
}

/// Whether a worker waits before its first item or emits it immediately.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SpawnOrder {
    #[default]
    DelayThenProduce,
    ProduceThenDelay,
}

/// Everything the pipeline needs to know before it starts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineConfig {
    pub bounds: FieldBounds,
    /// Wall-clock length of one time unit.
    pub time_unit: Duration,
    pub expiry_units: u32,
    pub spawn_delay_units: RangeInclusive<u32>,
    pub spawn_order: SpawnOrder,
    /// `None` keeps the queue unbounded.
    pub queue_capacity: Option<usize>,
    pub overflow: OverflowPolicy,
    /// Base seed for worker RNGs; `None` seeds from OS entropy.
    pub seed: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            bounds: FieldBounds::new(DEFAULT_GRID_WIDTH, DEFAULT_GRID_HEIGHT),
            time_unit: Duration::from_secs(1),
            expiry_units: DEFAULT_EXPIRY_UNITS,
            spawn_delay_units: DEFAULT_MIN_DELAY_UNITS..=DEFAULT_MAX_DELAY_UNITS,
            spawn_order: SpawnOrder::default(),
            queue_capacity: None,
            overflow: OverflowPolicy::default(),
            seed: None,
        }
    }
}

impl PipelineConfig {
    /// Reject settings that would only fail once workers are running.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bounds.validate()?;
        if self.time_unit.is_zero() {
            return Err(ConfigError::ZeroTimeUnit);
        }
        if self.expiry_units == 0 {
            return Err(ConfigError::ZeroExpiry);
        }
        let (min, max) = (*self.spawn_delay_units.start(), *self.spawn_delay_units.end());
        if min > max || max == 0 {
            return Err(ConfigError::InvalidDelayRange { min, max });
        }
        if self.queue_capacity == Some(0) {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(())
    }

    pub fn expiry(&self) -> Duration {
        self.time_unit * self.expiry_units
    }
}
