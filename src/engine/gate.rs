//! Fixed pacing delay in front of destination calls.

use std::time::Duration;

/// Suspends each caller for a fixed delay. Not a token bucket: combined
/// with the pool's concurrency bound it caps aggregate call rate at
/// roughly `concurrency / delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateGate {
    delay: Duration,
}

impl RateGate {
    pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);

    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// A gate that never waits.
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub async fn wait(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

impl Default for RateGate {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DELAY)
    }
}
