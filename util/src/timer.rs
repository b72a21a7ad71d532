use std::time::{Duration, Instant};

/// Utility for keeping track of the time it took to perform some operation.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Create a new `Timer`.
    pub fn now() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Reset internal timer to now.
    pub fn reset(&mut self) {
        self.start = Instant::now();
    }

    /// Time elapsed since the timer was last reset.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
