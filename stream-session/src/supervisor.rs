//! Per-session lifetime ceiling.
//!
//! Each session carries one `Deadline`, armed when the session starts and
//! re-armed whenever the restart path brings up a new process under the same
//! id. Re-arming replaces the instant the session loop sleeps until, so a
//! stale timer can never kill a newer process instance.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// Arm a fresh deadline `limit` from now.
    pub fn arm(limit: Duration) -> Self {
        Self {
            at: Instant::now() + limit,
        }
    }

    /// Replace the deadline with a fresh full limit.
    pub fn rearm(&mut self, limit: Duration) {
        self.at = Instant::now() + limit;
    }

    /// Resolves when the deadline passes. Cancel-safe: used as one branch of
    /// the session loop's `select!`.
    pub async fn fired(&self) {
        tokio::time::sleep_until(self.at).await;
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_fires_after_limit() {
        let deadline = Deadline::arm(Duration::from_secs(10));

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(deadline.remaining() > Duration::ZERO);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(deadline.remaining(), Duration::ZERO);
        deadline.fired().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_extends_the_deadline() {
        let mut deadline = Deadline::arm(Duration::from_secs(10));

        tokio::time::advance(Duration::from_secs(8)).await;
        deadline.rearm(Duration::from_secs(10));

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(deadline.remaining() > Duration::ZERO);

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(deadline.remaining(), Duration::ZERO);
    }
}
