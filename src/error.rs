//! Error types for pipeline construction and start-up.

use thiserror::Error;

/// Invalid settings, reported before any worker runs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("field bounds must be positive, got {width}x{height}")]
    InvalidBounds { width: i32, height: i32 },
    #[error("spawn delay range {min}..={max} is empty or zero")]
    InvalidDelayRange { min: u32, max: u32 },
    #[error("expiry must be at least one time unit")]
    ZeroExpiry,
    #[error("time unit must be non-zero")]
    ZeroTimeUnit,
    #[error("queue capacity must be non-zero when bounded")]
    ZeroCapacity,
    #[error("worker count must be at least one")]
    NoWorkers,
}

/// Failures from driving a constructed pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("generator pool already started")]
    AlreadyStarted,
    #[error("failed to spawn generator worker {worker}")]
    WorkerSpawn {
        worker: usize,
        #[source]
        source: std::io::Error,
    },
}
