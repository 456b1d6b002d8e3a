//! Per-IP rate limiter with strike-based back-off and allow-list.
//!
//! Hot-path state (token buckets, strike counters) lives behind a
//! `std::sync::Mutex` rather than `tokio::sync::Mutex`: lookups never
//! await, so there is nothing to gain from an async-aware lock and a
//! sync lock keeps the common case (allow) allocation-free.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Outcome of a rate-limit decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    RateLimited,
    BackedOff,
}

struct Bucket {
    tokens: f64,
    capacity: f64,
    last_refill: Instant,
}

impl Bucket {
    fn new(capacity: u32, now: Instant) -> Self {
        Self { tokens: capacity as f64, capacity: capacity as f64, last_refill: now }
    }

    /// Refill at 1 token/second/capacity-unit (one full bucket per second)
    /// then try to spend `cost` tokens.
    fn try_take(&mut self, cost: f64, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.capacity).min(self.capacity);
        self.last_refill = now;

        if self.tokens >= cost {
            self.tokens -= cost;
            true
        } else {
            false
        }
    }
}

struct Strikes {
    count: u32,
    expires_at: Instant,
}

const STRIKE_WINDOW: Duration = Duration::from_secs(30 * 60);

/// Per-IP token-bucket limiter plus strike-based back-off and a static +
/// remotely-refreshed allowlist.
pub struct RateLimiter {
    rps: u32,
    backoff_limit: u32,
    default_response_size: u32,
    buckets: Mutex<HashMap<IpAddr, Bucket>>,
    strikes: Mutex<HashMap<IpAddr, Strikes>>,
    allowlist: Mutex<Vec<IpAddr>>,
    pub allowed_total: AtomicU64,
    pub rate_limited_total: AtomicU64,
    pub backed_off_total: AtomicU64,
    pub allowlisted_total: AtomicU64,
}

impl RateLimiter {
    pub fn new(rps: u32, backoff_limit: u32, default_response_size: u32, static_allowlist: Vec<IpAddr>) -> Self {
        let mut allowlist = static_allowlist;
        allowlist.sort();
        allowlist.dedup();
        Self {
            rps,
            backoff_limit,
            default_response_size,
            buckets: Mutex::new(HashMap::new()),
            strikes: Mutex::new(HashMap::new()),
            allowlist: Mutex::new(allowlist),
            allowed_total: AtomicU64::new(0),
            rate_limited_total: AtomicU64::new(0),
            backed_off_total: AtomicU64::new(0),
            allowlisted_total: AtomicU64::new(0),
        }
    }

    /// Atomically swap in a freshly fetched remote allowlist. Callers pass
    /// the already-sorted, deduplicated vector; a reload failure should
    /// simply not call this, leaving the previous list in place.
    pub fn set_allowlist(&self, mut ips: Vec<IpAddr>) {
        ips.sort();
        ips.dedup();
        *self.allowlist.lock().unwrap() = ips;
    }

    fn is_allowlisted(&self, ip: &IpAddr) -> bool {
        self.allowlist.lock().unwrap().binary_search(ip).is_ok()
    }

    /// True once a prior call already pushed `ip` over `backoff_limit`.
    /// Only gates queries that arrive *after* the strike that crossed the
    /// threshold; the crossing query itself is decided in `check` once its
    /// own strike is recorded.
    fn is_backed_off(&self, ip: &IpAddr, now: Instant) -> bool {
        let mut strikes = self.strikes.lock().unwrap();
        match strikes.get(ip) {
            Some(s) if s.expires_at > now => s.count > self.backoff_limit,
            Some(_) => {
                strikes.remove(ip);
                false
            }
            None => false,
        }
    }

    /// Record a strike for `ip` and return the new strike count.
    fn add_strike(&self, ip: IpAddr, now: Instant) -> u32 {
        let mut strikes = self.strikes.lock().unwrap();
        let entry = strikes
            .entry(ip)
            .and_modify(|s| s.count += 1)
            .or_insert(Strikes { count: 1, expires_at: now + STRIKE_WINDOW });
        entry.count
    }

    /// Decide whether a UDP query from `ip` may proceed. Non-UDP callers
    /// should not call this at all; such queries bypass the limiter.
    pub fn check(&self, ip: IpAddr, now: Instant) -> Decision {
        if self.is_allowlisted(&ip) {
            self.allowlisted_total.fetch_add(1, Ordering::Relaxed);
            return Decision::Allow;
        }

        if self.is_backed_off(&ip, now) {
            self.backed_off_total.fetch_add(1, Ordering::Relaxed);
            return Decision::BackedOff;
        }

        let took = {
            let mut buckets = self.buckets.lock().unwrap();
            let bucket = buckets.entry(ip).or_insert_with(|| Bucket::new(self.rps, now));
            bucket.try_take(1.0, now)
        };

        if took {
            self.allowed_total.fetch_add(1, Ordering::Relaxed);
            Decision::Allow
        } else {
            let strikes = self.add_strike(ip, now);
            if strikes > self.backoff_limit {
                self.backed_off_total.fetch_add(1, Ordering::Relaxed);
                Decision::BackedOff
            } else {
                self.rate_limited_total.fetch_add(1, Ordering::Relaxed);
                Decision::RateLimited
            }
        }
    }

    /// Charge extra tokens for a large response: for every
    /// `defaultResponseSize` bytes beyond the first, spend one additional
    /// token. Called only after `check` returned `Allow`.
    pub fn charge_response_size(&self, ip: IpAddr, response_len: usize, now: Instant) {
        if self.default_response_size == 0 {
            return;
        }
        let extra_units = (response_len as u64 / self.default_response_size as u64) as f64;
        if extra_units <= 0.0 {
            return;
        }
        let mut buckets = self.buckets.lock().unwrap();
        let bucket = buckets.entry(ip).or_insert_with(|| Bucket::new(self.rps, now));
        // Best-effort: spend down to zero rather than going negative, a
        // response is never retroactively rejected for its own size.
        bucket.tokens = (bucket.tokens - extra_units).max(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steady_state_admits_rps_then_throttles() {
        let limiter = RateLimiter::new(2, 10, 1000, vec![]);
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        let now = Instant::now();

        assert_eq!(limiter.check(ip, now), Decision::Allow);
        assert_eq!(limiter.check(ip, now), Decision::Allow);
        assert_eq!(limiter.check(ip, now), Decision::RateLimited);
    }

    #[test]
    fn repeated_bursts_escalate_from_rate_limited_to_backed_off() {
        // rps=1, backoff=2: first query allowed, next two rate-limited,
        // the fourth backed-off once the strike counter (3) exceeds 2.
        let limiter = RateLimiter::new(1, 2, 1000, vec![]);
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        let now = Instant::now();

        assert_eq!(limiter.check(ip, now), Decision::Allow);
        assert_eq!(limiter.check(ip, now), Decision::RateLimited);
        assert_eq!(limiter.check(ip, now), Decision::RateLimited);
        assert_eq!(limiter.check(ip, now), Decision::BackedOff);
    }

    #[test]
    fn allowlisted_ip_always_allowed() {
        let ip: IpAddr = "203.0.113.9".parse().unwrap();
        let limiter = RateLimiter::new(0, 0, 1000, vec![ip]);
        let now = Instant::now();
        assert_eq!(limiter.check(ip, now), Decision::Allow);
        assert_eq!(limiter.check(ip, now), Decision::Allow);
    }

    #[test]
    fn strike_window_expiry_re_enables_ip() {
        let limiter = RateLimiter::new(1, 1, 1000, vec![]);
        let ip: IpAddr = "198.51.100.1".parse().unwrap();
        let now = Instant::now();
        limiter.check(ip, now);
        limiter.check(ip, now);
        limiter.check(ip, now); // strikes = 2, exceeds backoff_limit(1) -> backed off next
        assert_eq!(limiter.check(ip, now), Decision::BackedOff);

        let later = now + STRIKE_WINDOW + Duration::from_secs(1);
        assert_ne!(limiter.check(ip, later), Decision::BackedOff);
    }

    #[test]
    fn failed_allowlist_reload_keeps_previous_list() {
        let ip: IpAddr = "203.0.113.9".parse().unwrap();
        let limiter = RateLimiter::new(0, 0, 1000, vec![ip]);
        // Simulate a reload attempt that the caller decided not to apply
        // because the fetch failed: the allowlist is simply never touched.
        assert_eq!(limiter.check(ip, Instant::now()), Decision::Allow);
    }
}
