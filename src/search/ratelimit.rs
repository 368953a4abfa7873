//! Per-(client IP, engine) token-bucket rate limiting (spec.md §4.5).

use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use std::net::IpAddr;
use std::num::NonZeroU32;

use crate::model::SearchEngine;

pub type Key = (IpAddr, SearchEngine);

pub struct SearchRateLimiter {
    limiter: RateLimiter<Key, DefaultKeyedStateStore<Key>, DefaultClock>,
}

impl SearchRateLimiter {
    pub fn new(max_requests: u32, window: std::time::Duration) -> Self {
        let quota = Quota::with_period(window)
            .expect("non-zero window")
            .allow_burst(NonZeroU32::new(max_requests.max(1)).expect("non-zero burst"));
        Self {
            limiter: RateLimiter::keyed(quota),
        }
    }

    pub fn check(&self, ip: IpAddr, engine: SearchEngine) -> bool {
        self.limiter.check_key(&(ip, engine)).is_ok()
    }
}

impl Default for SearchRateLimiter {
    fn default() -> Self {
        Self::new(60, std::time::Duration::from_secs(60))
    }
}
