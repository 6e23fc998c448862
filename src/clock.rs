//! Monotonic time sources
//!
//! Dwell timing must not follow wall-clock adjustments, so every timestamp in
//! the pipeline is a `Duration` since a session origin. `ManualClock` lets
//! tests and replays drive simulated time.

use std::cell::Cell;
use std::time::{Duration, Instant};

/// Source of monotonic timestamps
pub trait Clock {
    /// Time elapsed since this clock's origin
    fn now(&self) -> Duration;
}

/// Wall-independent clock backed by `Instant`
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Simulated clock advanced explicitly by the caller
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(t: Duration) -> Self {
        Self { now: Cell::new(t) }
    }

    pub fn set(&self, t: Duration) {
        self.now.set(t);
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}
