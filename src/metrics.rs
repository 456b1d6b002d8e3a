//! Internal counters observed by pipeline stages.
//!
//! No exposition format is implemented here (no Prometheus registry, no
//! `/metrics` endpoint); this is the in-process aggregate the admin
//! surface or logging could read from, not a scrape target.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Fixed upstream-latency bucket boundaries, in milliseconds. The last
/// bucket catches everything at or above its boundary.
const LATENCY_BUCKETS_MS: [u64; 6] = [1, 5, 20, 50, 200, 1000];

struct LatencyHistogram {
    buckets: [AtomicU64; LATENCY_BUCKETS_MS.len() + 1],
    sum_ms: AtomicU64,
    count: AtomicU64,
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self {
            buckets: Default::default(),
            sum_ms: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }
}

impl LatencyHistogram {
    fn observe(&self, elapsed: Duration) {
        let ms = elapsed.as_millis() as u64;
        let bucket = LATENCY_BUCKETS_MS.iter().position(|&b| ms < b).unwrap_or(LATENCY_BUCKETS_MS.len());
        self.buckets[bucket].fetch_add(1, Ordering::Relaxed);
        self.sum_ms.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    fn mean_ms(&self) -> f64 {
        let count = self.count.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        self.sum_ms.load(Ordering::Relaxed) as f64 / count as f64
    }
}

/// Counters a single query's pass through the pipeline touches.
#[derive(Default)]
pub struct Metrics {
    pub queries_total: AtomicU64,
    pub blocked_total: AtomicU64,
    pub safe_search_rewritten_total: AtomicU64,
    pub cache_hits_total: AtomicU64,
    pub cache_misses_total: AtomicU64,
    pub rate_limited_total: AtomicU64,
    pub backed_off_total: AtomicU64,
    pub refused_any_total: AtomicU64,
    pub upstream_errors_total: AtomicU64,
    pub alternate_dispatched_total: AtomicU64,
    upstream_latency: LatencyHistogram,
    rcode_noerror: AtomicU64,
    rcode_nxdomain: AtomicU64,
    rcode_servfail: AtomicU64,
    rcode_other: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_upstream_latency(&self, elapsed: Duration) {
        self.upstream_latency.observe(elapsed);
    }

    pub fn upstream_mean_latency_ms(&self) -> f64 {
        self.upstream_latency.mean_ms()
    }

    pub fn record_rcode(&self, rcode: hickory_server::proto::op::ResponseCode) {
        use hickory_server::proto::op::ResponseCode::*;
        let counter = match rcode {
            NoError => &self.rcode_noerror,
            NXDomain => &self.rcode_nxdomain,
            ServFail => &self.rcode_servfail,
            _ => &self.rcode_other,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            queries_total: self.queries_total.load(Ordering::Relaxed),
            blocked_total: self.blocked_total.load(Ordering::Relaxed),
            cache_hits_total: self.cache_hits_total.load(Ordering::Relaxed),
            cache_misses_total: self.cache_misses_total.load(Ordering::Relaxed),
            rate_limited_total: self.rate_limited_total.load(Ordering::Relaxed),
            refused_any_total: self.refused_any_total.load(Ordering::Relaxed),
            upstream_errors_total: self.upstream_errors_total.load(Ordering::Relaxed),
            upstream_mean_latency_ms: self.upstream_mean_latency_ms(),
            rcode_noerror: self.rcode_noerror.load(Ordering::Relaxed),
            rcode_nxdomain: self.rcode_nxdomain.load(Ordering::Relaxed),
            rcode_servfail: self.rcode_servfail.load(Ordering::Relaxed),
            rcode_other: self.rcode_other.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of the counters, cheap to log or serve from the
/// admin surface without holding any lock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot {
    pub queries_total: u64,
    pub blocked_total: u64,
    pub cache_hits_total: u64,
    pub cache_misses_total: u64,
    pub rate_limited_total: u64,
    pub refused_any_total: u64,
    pub upstream_errors_total: u64,
    pub upstream_mean_latency_ms: f64,
    pub rcode_noerror: u64,
    pub rcode_nxdomain: u64,
    pub rcode_servfail: u64,
    pub rcode_other: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_server::proto::op::ResponseCode;

    #[test]
    fn latency_buckets_and_mean_track_observations() {
        let metrics = Metrics::new();
        metrics.record_upstream_latency(Duration::from_millis(2));
        metrics.record_upstream_latency(Duration::from_millis(30));
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.upstream_mean_latency_ms, 16.0);
    }

    #[test]
    fn rcode_counters_split_by_response_code() {
        let metrics = Metrics::new();
        metrics.record_rcode(ResponseCode::NoError);
        metrics.record_rcode(ResponseCode::NXDomain);
        metrics.record_rcode(ResponseCode::NXDomain);
        metrics.record_rcode(ResponseCode::Refused);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.rcode_noerror, 1);
        assert_eq!(snapshot.rcode_nxdomain, 2);
        assert_eq!(snapshot.rcode_other, 1);
        assert_eq!(snapshot.rcode_servfail, 0);
    }
}
