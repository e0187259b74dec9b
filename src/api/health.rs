//! Shared health state for the /health endpoint.
//! Updated by the scrape route, read by the API.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Scrape counters. All relaxed: they are reporting-only.
#[derive(Default)]
pub struct HealthState {
    scrapes_started: AtomicU64,
    scrapes_succeeded: AtomicU64,
    scrapes_failed: AtomicU64,
    /// Scrapes currently running.
    in_flight: AtomicU64,
    /// Unix millis of the last successful scrape (0 = none).
    last_success_at_ms: AtomicU64,
}

#[derive(Debug, Serialize)]
pub struct HealthSnapshot {
    pub status: &'static str,
    pub scrapes_started: u64,
    pub scrapes_succeeded: u64,
    pub scrapes_failed: u64,
    pub in_flight: u64,
    pub last_success_at_ms: Option<u64>,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a scrape as started; the returned ticket settles it exactly once.
    pub fn begin_scrape(&self) -> ScrapeTicket<'_> {
        self.scrapes_started.fetch_add(1, Ordering::Relaxed);
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        ScrapeTicket {
            health: self,
            settled: false,
        }
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let last = self.last_success_at_ms.load(Ordering::Relaxed);
        HealthSnapshot {
            status: "ok",
            scrapes_started: self.scrapes_started.load(Ordering::Relaxed),
            scrapes_succeeded: self.scrapes_succeeded.load(Ordering::Relaxed),
            scrapes_failed: self.scrapes_failed.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Relaxed),
            last_success_at_ms: (last > 0).then_some(last),
        }
    }
}

/// An in-flight scrape. Dropping it unsettled counts as a failure.
pub struct ScrapeTicket<'a> {
    health: &'a HealthState,
    settled: bool,
}

impl ScrapeTicket<'_> {
    pub fn succeeded(mut self, at_ms: u64) {
        self.health.scrapes_succeeded.fetch_add(1, Ordering::Relaxed);
        self.health.last_success_at_ms.store(at_ms, Ordering::Relaxed);
        self.finish();
    }

    pub fn failed(mut self) {
        self.health.scrapes_failed.fetch_add(1, Ordering::Relaxed);
        self.finish();
    }

    fn finish(&mut self) {
        self.settled = true;
        self.health.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}

impl Drop for ScrapeTicket<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.health.scrapes_failed.fetch_add(1, Ordering::Relaxed);
            self.finish();
        }
    }
}
