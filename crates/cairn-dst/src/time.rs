//! Auto-advancing simulated time
//!
//! [`SimTime`] advances its [`SimClock`] by the requested amount on every
//! sleep and yields, so code that sleeps between retries runs instantly.
//! Use the bare [`SimClock`] instead when a test wants to hold time still
//! and step it by hand.

use crate::clock::SimClock;
use async_trait::async_trait;
use cairn_core::TimeProvider;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct SimTime {
    clock: Arc<SimClock>,
}

impl SimTime {
    pub fn new(clock: Arc<SimClock>) -> Self {
        Self { clock }
    }

    pub fn clock(&self) -> &SimClock {
        &self.clock
    }
}

#[async_trait]
impl TimeProvider for SimTime {
    fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    async fn sleep_ms(&self, ms: u64) {
        self.clock.advance_ms(ms);
        // Let other tasks observe the new time
        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sim_time_advances_clock() {
        let clock = Arc::new(SimClock::from_millis(1000));
        let time = SimTime::new(clock.clone());

        time.sleep_ms(500).await;
        assert_eq!(time.now_ms(), 1500);
        assert_eq!(clock.now_ms(), 1500);
    }

    #[tokio::test]
    async fn test_sim_time_wakes_clock_sleepers() {
        let clock = Arc::new(SimClock::from_millis(0));
        let time = SimTime::new(clock.clone());

        let sleeper = clock.clone();
        let handle = tokio::spawn(async move { sleeper.sleep_ms(100).await });
        tokio::task::yield_now().await;

        time.sleep_ms(100).await;
        handle.await.unwrap();
    }
}
