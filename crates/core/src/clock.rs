//! Monotonic time sources for the scheduler.
//!
//! The scheduler only ever asks "how long since this clock started?". An OS
//! monotonic clock answers that directly; a hardware interval timer answers
//! it by counting its own ticks. Both plug in through [`Clock`].

use std::time::{Duration, Instant};

/// A monotonic time source.
///
/// `now()` must never go backwards. Its epoch is arbitrary but fixed for
/// the lifetime of the clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> Duration;
}

/// [`Clock`] backed by [`std::time::Instant`].
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }
}
