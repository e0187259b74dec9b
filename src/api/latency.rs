//! In-memory histogram of scrape durations.
//! Every HTTP-triggered scrape records its wall-clock time, success or not.

use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

/// Upper bound of the histogram: ten minutes, in milliseconds.
const MAX_TRACKED_MS: u64 = 600_000;

/// Shared scrape duration stats. Scrape route records, stats route reads.
/// Values stored in milliseconds.
pub struct ScrapeLatency {
    inner: Mutex<hdrhistogram::Histogram<u64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LatencySummary {
    pub samples: u64,
    pub p50_ms: Option<u64>,
    pub p95_ms: Option<u64>,
    pub p99_ms: Option<u64>,
    pub max_ms: Option<u64>,
}

impl ScrapeLatency {
    /// Tracks 1ms to 10min, 3 significant figures.
    pub fn new() -> Self {
        let histogram = hdrhistogram::Histogram::new_with_bounds(1, MAX_TRACKED_MS, 3)
            .expect("valid histogram bounds");
        Self {
            inner: Mutex::new(histogram),
        }
    }

    pub fn record(&self, d: Duration) {
        let ms = (d.as_millis().min(u128::from(MAX_TRACKED_MS)) as u64).max(1);
        if let Ok(mut h) = self.inner.lock() {
            let _ = h.record(ms);
        }
    }

    pub fn summary(&self) -> LatencySummary {
        let Ok(h) = self.inner.lock() else {
            return LatencySummary::empty();
        };
        if h.len() == 0 {
            return LatencySummary::empty();
        }
        LatencySummary {
            samples: h.len(),
            p50_ms: Some(h.value_at_quantile(0.5)),
            p95_ms: Some(h.value_at_quantile(0.95)),
            p99_ms: Some(h.value_at_quantile(0.99)),
            max_ms: Some(h.max()),
        }
    }
}

impl LatencySummary {
    fn empty() -> Self {
        Self {
            samples: 0,
            p50_ms: None,
            p95_ms: None,
            p99_ms: None,
            max_ms: None,
        }
    }
}

impl Default for ScrapeLatency {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_histogram_has_no_percentiles() {
        let stats = ScrapeLatency::new();
        let s = stats.summary();
        assert_eq!(s.samples, 0);
        assert_eq!(s.p50_ms, None);
    }

    #[test]
    fn records_durations_in_ms() {
        let stats = ScrapeLatency::new();
        for ms in [1_000, 2_000, 3_000, 40_000] {
            stats.record(Duration::from_millis(ms));
        }
        let s = stats.summary();
        assert_eq!(s.samples, 4);
        let p50 = s.p50_ms.unwrap();
        assert!((1_990..=2_010).contains(&p50), "p50={p50}");
        assert!(s.max_ms.unwrap() >= 39_900);
    }

    #[test]
    fn clamps_out_of_range_values() {
        let stats = ScrapeLatency::new();
        stats.record(Duration::from_micros(10));
        stats.record(Duration::from_secs(3_600));
        assert_eq!(stats.summary().samples, 2);
    }
}
