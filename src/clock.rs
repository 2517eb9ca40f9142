//! Monotonic time source used for creation stamps and age checks.

use std::time::Instant;

/// Source of "now" for the pipeline.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall-independent clock backed by [`Instant::now`].
#[derive(Clone, Copy, Debug, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Test-only clock that moves only when told to.
#[cfg(test)]
pub struct ManualClock {
    origin: Instant,
    offset: std::sync::Mutex<std::time::Duration>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: std::sync::Mutex::new(std::time::Duration::ZERO),
        }
    }

    /// Jump to `offset` past the origin.
    pub fn set(&self, offset: std::time::Duration) {
        let mut guard = self.offset.lock().expect("manual clock mutex poisoned");
        *guard = offset;
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let guard = self.offset.lock().expect("manual clock mutex poisoned");
        self.origin + *guard
    }
}
