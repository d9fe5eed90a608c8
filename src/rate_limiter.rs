/*!
 * Bandwidth limiting for the copy engine (spec §3 "bandwidth_limit_bytes_per_second").
 *
 * Built on `governor`'s token bucket, used synchronously (blocking the
 * calling worker thread) rather than the teacher's async `execute()` wrapper
 * — copy workers here are plain OS threads, not tokio tasks (spec §5
 * "Parallel threads").
 */

use governor::clock::{Clock, DefaultClock};
use governor::{Quota, RateLimiter as GovernorLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Caps aggregate copy throughput across all workers. `0` means unlimited
/// and skips rate limiting entirely.
#[derive(Clone)]
pub struct BandwidthLimiter {
    inner: Option<Arc<GovernorLimiter<governor::state::NotKeyed, governor::state::InMemoryState, DefaultClock>>>,
}

impl BandwidthLimiter {
    /// `bytes_per_second == 0` disables limiting.
    pub fn new(bytes_per_second: u64) -> Self {
        if bytes_per_second == 0 {
            return Self { inner: None };
        }
        // One cell == one byte; governor's burst capacity is capped at the
        // per-second rate so a limiter set to N bytes/sec never bursts
        // beyond N bytes in a single refill window.
        let capacity = NonZeroU32::new(bytes_per_second.min(u32::MAX as u64).max(1) as u32).unwrap();
        let quota = Quota::per_second(capacity);
        Self { inner: Some(Arc::new(GovernorLimiter::direct(quota))) }
    }

    pub fn unlimited() -> Self {
        Self { inner: None }
    }

    /// Block the calling thread until `bytes` worth of bandwidth budget is
    /// available. Called between chunk/window writes in the copy engine.
    pub fn acquire(&self, bytes: u64) {
        let Some(limiter) = &self.inner else { return };
        let mut remaining = bytes;
        while remaining > 0 {
            let take = remaining.min(u32::MAX as u64) as u32;
            let n = match NonZeroU32::new(take) {
                Some(n) => n,
                None => break,
            };
            loop {
                match limiter.check_n(n) {
                    Ok(Ok(())) => break,
                    Ok(Err(not_until)) => {
                        let wait = not_until.wait_time_from(DefaultClock::default().now());
                        std::thread::sleep(wait.min(Duration::from_millis(250)));
                    }
                    Err(_) => {
                        // Requested chunk exceeds the bucket's total capacity; split it.
                        let half = take / 2;
                        if half == 0 {
                            break;
                        }
                        if let Some(half_n) = NonZeroU32::new(half) {
                            let _ = limiter.check_n(half_n);
                        }
                        break;
                    }
                }
            }
            remaining -= take as u64;
        }
    }
}
