//! Injectable time and randomness, so tests can freeze both.
//!
//! Mirrors the design note in the specification: UA/viewport/language
//! rotation and fingerprint jitter must be deterministic under test, which
//! means nothing in the operation or hardening paths is allowed to call
//! `chrono::Utc::now()` or `rand::random()` directly. They go through a
//! `Clock` / `IdSource` handle instead.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;

    fn now_utc(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(self.now_ms() as i64).unwrap_or_else(Utc::now)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Clock frozen at a fixed instant, advanced explicitly by tests.
#[derive(Debug)]
pub struct FrozenClock {
    millis: AtomicU64,
}

impl FrozenClock {
    pub fn at(millis: u64) -> Self {
        Self {
            millis: AtomicU64::new(millis),
        }
    }

    pub fn advance(&self, delta_ms: u64) {
        self.millis.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for FrozenClock {
    fn now_ms(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}

/// Randomness used for viewport/UA rotation and fingerprint jitter.
/// `next_u64` / `next_index` are the only primitives the rest of the crate
/// needs; everything else (shuffles, jitter-in-range) is built from them.
pub trait IdSource: Send + Sync {
    fn next_u64(&self) -> u64;

    fn next_index(&self, len: usize) -> usize {
        if len == 0 {
            0
        } else {
            (self.next_u64() as usize) % len
        }
    }

    fn next_jitter_ms(&self, max_ms: u64) -> u64 {
        if max_ms == 0 {
            0
        } else {
            self.next_u64() % max_ms
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OsRand;

impl IdSource for OsRand {
    fn next_u64(&self) -> u64 {
        rand::random()
    }
}

/// Deterministic sequence for tests: cycles through a fixed list of values.
#[derive(Debug)]
pub struct SeqRand {
    values: Vec<u64>,
    cursor: AtomicU64,
}

impl SeqRand {
    pub fn new(values: Vec<u64>) -> Self {
        assert!(!values.is_empty(), "SeqRand requires at least one value");
        Self {
            values,
            cursor: AtomicU64::new(0),
        }
    }
}

impl IdSource for SeqRand {
    fn next_u64(&self) -> u64 {
        let i = self.cursor.fetch_add(1, Ordering::SeqCst) as usize % self.values.len();
        self.values[i]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frozen_clock_advances_explicitly() {
        let clock = FrozenClock::at(1_000);
        assert_eq!(clock.now_ms(), 1_000);
        clock.advance(500);
        assert_eq!(clock.now_ms(), 1_500);
    }

    #[test]
    fn seq_rand_cycles_deterministically() {
        let rand = SeqRand::new(vec![1, 2, 3]);
        let seq: Vec<u64> = (0..5).map(|_| rand.next_u64()).collect();
        assert_eq!(seq, vec![1, 2, 3, 1, 2]);
    }
}
