//! Rate Limiter (Token Bucket Algorithm)
//!
//! Caps the rate of `/predict` calls before any subprocess is spawned.
//! Lock-free: bucket state lives in a single `AtomicU64`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Fixed-point scale: one token = 1000 milli-tokens
const MILLI: u64 = 1000;

/// Largest burst the packed milli-token field can hold
pub const MAX_BURST: u32 = (u32::MAX as u64 / MILLI) as u32;

pub struct RateLimiter {
    // Upper 32 bits: milli-tokens available
    // Lower 32 bits: last refill, ms since `epoch`
    packed: AtomicU64,
    epoch: Instant,
    max_tokens: u32,
    refill_per_sec: u32,
}

impl RateLimiter {
    /// Allow `refill_per_sec` requests/sec with bursts of `max_tokens`
    ///
    /// `RateLimiter::new(200, 100)` admits 200 at once, then 100 per second.
    /// `max_tokens` above [`MAX_BURST`] is capped.
    pub fn new(max_tokens: u32, refill_per_sec: u32) -> Self {
        let max_tokens = max_tokens.min(MAX_BURST);
        Self {
            packed: AtomicU64::new(pack(max_tokens as u64 * MILLI, 0)),
            epoch: Instant::now(),
            max_tokens,
            refill_per_sec,
        }
    }

    /// Take one token; false when the bucket is empty
    pub fn check(&self) -> bool {
        let now_ms = self.elapsed_ms();
        loop {
            let current = self.packed.load(Ordering::Acquire);
            let available = self.refilled(current, now_ms);

            let (next, allowed) = if available >= MILLI {
                (pack(available - MILLI, now_ms), true)
            } else {
                (pack(available, now_ms), false)
            };

            match self.packed.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return allowed,
                Err(_) => continue,
            }
        }
    }

    /// Time until the next token is due
    pub fn retry_after(&self) -> Duration {
        if self.refill_per_sec == 0 {
            return Duration::from_secs(1);
        }
        let available = self.refilled(self.packed.load(Ordering::Acquire), self.elapsed_ms());
        let missing = MILLI.saturating_sub(available);
        // milli-tokens / (milli-tokens per ms) rounded up
        let ms = missing.div_ceil(self.refill_per_sec as u64);
        Duration::from_millis(ms.max(1))
    }

    /// Whole tokens currently available
    pub fn remaining(&self) -> u32 {
        let available = self.refilled(self.packed.load(Ordering::Acquire), self.elapsed_ms());
        (available / MILLI) as u32
    }

    fn elapsed_ms(&self) -> u32 {
        // Wraps after ~49 days; refilled() uses wrapping_sub
        self.epoch.elapsed().as_millis() as u32
    }

    fn refilled(&self, packed: u64, now_ms: u32) -> u64 {
        let (milli_tokens, last_ms) = unpack(packed);
        let delta_ms = now_ms.wrapping_sub(last_ms) as u64;
        // refill_per_sec tokens/sec == refill_per_sec milli-tokens/ms
        let added = delta_ms.saturating_mul(self.refill_per_sec as u64);
        milli_tokens
            .saturating_add(added)
            .min(self.max_tokens as u64 * MILLI)
    }
}

fn pack(milli_tokens: u64, ms: u32) -> u64 {
    (milli_tokens.min(u32::MAX as u64) << 32) | ms as u64
}

fn unpack(packed: u64) -> (u64, u32) {
    (packed >> 32, (packed & 0xFFFF_FFFF) as u32)
}
