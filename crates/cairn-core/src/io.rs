//! I/O Abstraction Layer for Deterministic Simulation Testing
//!
//! All non-deterministic operations go through these traits:
//!
//! - **Time**: wall clock vs simulated time
//! - **Random**: OS-backed identifiers vs seeded RNG
//!
//! The same control-plane code runs in production and in simulation; only the
//! providers differ. The credential poller is the main consumer: it sleeps a
//! fixed interval between polls, which tests replace with a manually advanced
//! clock.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

// ============================================================================
// Time Provider
// ============================================================================

/// Time provider abstraction
///
/// All code that needs current time or sleep MUST use this trait.
///
/// # Implementations
///
/// - `WallClockTime`: Production - uses system clock
/// - `SimClock` / `SimTime` (in cairn-dst): deterministic, manually advanced
#[async_trait]
pub trait TimeProvider: Send + Sync + std::fmt::Debug {
    /// Get current time in milliseconds since epoch
    fn now_ms(&self) -> u64;

    /// Sleep for the specified duration
    async fn sleep_ms(&self, ms: u64);
}

/// Production time provider using wall clock
#[derive(Debug, Clone, Default)]
pub struct WallClockTime;

impl WallClockTime {
    /// Create a new wall clock time provider
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TimeProvider for WallClockTime {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    async fn sleep_ms(&self, ms: u64) {
        tokio::time::sleep(tokio::time::Duration::from_millis(ms)).await;
    }
}

// ============================================================================
// RNG Provider
// ============================================================================

/// Random source abstraction
///
/// Cluster identity creation draws its 128-bit unique ID from here, so
/// simulation can reproduce a run from its seed.
pub trait RngProvider: Send + Sync + std::fmt::Debug {
    /// Generate a random u64
    fn next_u64(&self) -> u64;

    /// Generate a random 128-bit identifier in RFC 4122 v4 text form
    fn gen_uuid(&self) -> String {
        let high = self.next_u64();
        let low = self.next_u64();
        // Stamp version 4 and variant 1 so the result parses as a v4 UUID
        let high = (high & 0xffff_ffff_ffff_0fff) | 0x0000_0000_0000_4000;
        let low = (low & 0x3fff_ffff_ffff_ffff) | 0x8000_0000_0000_0000;
        uuid::Uuid::from_u64_pair(high, low).hyphenated().to_string()
    }
}

/// Production RNG provider
///
/// Identifiers come from the OS-seeded generator behind `uuid::Uuid::new_v4`,
/// which is what global uniqueness of the cluster ID relies on. `next_u64`
/// is a xorshift stream for non-security uses.
#[derive(Debug)]
pub struct StdRngProvider {
    state: AtomicU64,
}

impl Default for StdRngProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl StdRngProvider {
    /// Create a new RNG provider seeded from system time
    pub fn new() -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);

        Self {
            state: AtomicU64::new(seed | 1),
        }
    }
}

impl RngProvider for StdRngProvider {
    fn next_u64(&self) -> u64 {
        // xorshift64*
        let mut state = self.state.load(Ordering::Relaxed);
        loop {
            let mut x = state;
            x ^= x >> 12;
            x ^= x << 25;
            x ^= x >> 27;

            match self
                .state
                .compare_exchange_weak(state, x, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return x.wrapping_mul(0x2545F4914F6CDD1D),
                Err(s) => state = s,
            }
        }
    }

    fn gen_uuid(&self) -> String {
        uuid::Uuid::new_v4().hyphenated().to_string()
    }
}

// ============================================================================
// I/O Context
// ============================================================================

/// Bundle of all I/O providers
///
/// Pass this through the control plane instead of individual providers.
#[derive(Clone)]
pub struct IoContext {
    /// Time provider
    pub time: Arc<dyn TimeProvider>,
    /// RNG provider
    pub rng: Arc<dyn RngProvider>,
}

impl std::fmt::Debug for IoContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoContext")
            .field("time", &self.time)
            .field("rng", &self.rng)
            .finish()
    }
}

impl Default for IoContext {
    fn default() -> Self {
        Self::production()
    }
}

impl IoContext {
    /// Create production I/O context with real wall clock and RNG
    pub fn production() -> Self {
        Self {
            time: Arc::new(WallClockTime::new()),
            rng: Arc::new(StdRngProvider::new()),
        }
    }

    /// Create I/O context with custom providers
    pub fn new(time: Arc<dyn TimeProvider>, rng: Arc<dyn RngProvider>) -> Self {
        Self { time, rng }
    }

    /// Get current time in milliseconds
    pub fn now_ms(&self) -> u64 {
        self.time.now_ms()
    }

    /// Sleep for specified duration
    pub async fn sleep_ms(&self, ms: u64) {
        self.time.sleep_ms(ms).await;
    }

    /// Generate a UUID
    pub fn gen_uuid(&self) -> String {
        self.rng.gen_uuid()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct CountingRng(AtomicU64);

    impl RngProvider for CountingRng {
        fn next_u64(&self) -> u64 {
            self.0.fetch_add(1, Ordering::SeqCst)
        }
    }

    #[test]
    fn test_wall_clock_time_now_ms() {
        let clock = WallClockTime::new();
        let now = clock.now_ms();

        // After 2020
        assert!(now > 1577836800000);
        assert!(clock.now_ms() >= now);
    }

    #[tokio::test]
    async fn test_wall_clock_time_sleep() {
        let clock = WallClockTime::new();
        let start = clock.now_ms();

        clock.sleep_ms(10).await;

        let elapsed = clock.now_ms() - start;
        assert!(elapsed >= 9, "elapsed: {}", elapsed);
    }

    #[test]
    fn test_default_gen_uuid_is_v4() {
        let rng = CountingRng(AtomicU64::new(7));
        let id = rng.gen_uuid();
        let parsed = uuid::Uuid::parse_str(&id).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
        assert_eq!(id.len(), 36);
    }

    #[test]
    fn test_std_rng_uuids_are_unique() {
        let rng = StdRngProvider::new();
        let a = rng.gen_uuid();
        let b = rng.gen_uuid();
        assert_ne!(a, b);
    }

    #[test]
    fn test_io_context_production() {
        let ctx = IoContext::production();
        assert!(ctx.now_ms() > 1577836800000);
        assert_eq!(ctx.gen_uuid().len(), 36);
    }
}
