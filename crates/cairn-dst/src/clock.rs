//! Deterministic clock for simulation
//!
//! Time only moves when a test advances it. Sleepers park on a [`Notify`]
//! and re-check their deadline on every advance.

use async_trait::async_trait;
use cairn_core::TimeProvider;
use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// 2024-01-01T00:00:00Z
const DEFAULT_START_MS: u64 = 1_704_067_200_000;

/// Manually advanced clock
#[derive(Debug, Clone)]
pub struct SimClock {
    current_time_ms: Arc<AtomicU64>,
    notify: Arc<Notify>,
}

impl SimClock {
    pub fn new(start_time: DateTime<Utc>) -> Self {
        Self::from_millis(start_time.timestamp_millis().max(0) as u64)
    }

    pub fn from_millis(ms: u64) -> Self {
        Self {
            current_time_ms: Arc::new(AtomicU64::new(ms)),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(self.now_ms() as i64).unwrap_or_default()
    }

    pub fn now_ms(&self) -> u64 {
        self.current_time_ms.load(Ordering::SeqCst)
    }

    pub fn advance(&self, duration: Duration) {
        debug_assert!(duration >= Duration::zero(), "cannot go back in time");
        self.advance_ms(duration.num_milliseconds().max(0) as u64);
    }

    /// Move time forward and wake every sleeper
    pub fn advance_ms(&self, ms: u64) {
        self.current_time_ms.fetch_add(ms, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Wait until the clock has been advanced by at least `ms`
    pub async fn sleep_ms(&self, ms: u64) {
        let target_ms = self.now_ms().saturating_add(ms);
        loop {
            // Register before checking, or an advance between the two is lost
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.now_ms() >= target_ms {
                return;
            }
            notified.await;
        }
    }

    pub fn is_past_ms(&self, deadline_ms: u64) -> bool {
        self.now_ms() >= deadline_ms
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::from_millis(DEFAULT_START_MS)
    }
}

#[async_trait]
impl TimeProvider for SimClock {
    fn now_ms(&self) -> u64 {
        SimClock::now_ms(self)
    }

    async fn sleep_ms(&self, ms: u64) {
        SimClock::sleep_ms(self, ms).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_basic() {
        let clock = SimClock::default();
        let initial = clock.now();

        clock.advance(Duration::seconds(10));
        assert_eq!(clock.now() - initial, Duration::seconds(10));
        assert_eq!(initial.to_rfc3339(), "2024-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_clock_advance_ms() {
        let clock = SimClock::from_millis(0);
        clock.advance_ms(1000);
        clock.advance_ms(500);
        assert_eq!(clock.now_ms(), 1500);
        assert!(clock.is_past_ms(1500));
        assert!(!clock.is_past_ms(1501));
    }

    #[tokio::test]
    async fn test_sleep_waits_for_advance() {
        let clock = SimClock::from_millis(0);
        let sleeper = clock.clone();
        let handle = tokio::spawn(async move { sleeper.sleep_ms(1000).await });

        tokio::task::yield_now().await;
        clock.advance_ms(999);
        tokio::task::yield_now().await;
        assert!(!handle.is_finished());

        clock.advance_ms(1);
        handle.await.unwrap();
        assert_eq!(clock.now_ms(), 1000);
    }

    #[tokio::test]
    async fn test_zero_sleep_returns_immediately() {
        let clock = SimClock::from_millis(5);
        clock.sleep_ms(0).await;
        assert_eq!(clock.now_ms(), 5);
    }
}
