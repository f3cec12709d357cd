//! Adaptive pacing between polls.

use std::time::Duration;

/// Delay used while results keep arriving.
pub const MIN_DELAY: Duration = Duration::from_millis(500);

/// Amount added after each empty poll.
pub const DELAY_STEP: Duration = Duration::from_millis(500);

/// Upper bound reached after consecutive empty polls.
pub const MAX_DELAY: Duration = Duration::from_millis(2000);

/// Inter-poll delay that shortens under traffic and backs off while idle.
///
/// Only successful polls feed this controller. Errors are fatal to the run and
/// never reach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdaptiveDelay {
    current: Duration,
}

impl Default for AdaptiveDelay {
    fn default() -> Self {
        Self::new()
    }
}

impl AdaptiveDelay {
    #[must_use]
    pub fn new() -> Self {
        Self { current: MIN_DELAY }
    }

    /// Delay to sleep before the next poll.
    #[must_use]
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Update the delay from the number of hits the last poll returned.
    pub fn record(&mut self, hits: usize) -> Duration {
        self.current = if hits > 0 {
            MIN_DELAY
        } else {
            (self.current + DELAY_STEP).min(MAX_DELAY)
        };
        self.current
    }
}
