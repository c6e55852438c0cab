//! Shared performance counters
//!
//! One `PerformanceCounters` is created at startup and handed (via `Arc`)
//! to the responder and to the reporter. Every field only ever grows.
//! Writers use `fetch_add` and a compare-and-swap loop; the reporter only
//! loads. Relaxed ordering throughout: a snapshot may be slightly
//! inconsistent across fields, never torn within one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Request/byte/latency counters shared between all worker contexts.
#[derive(Debug)]
pub struct PerformanceCounters {
    /// Completed benchmark requests
    request_count: AtomicU64,

    /// Sum of all recorded request latencies
    total_latency_nanos: AtomicU64,

    /// Running maximum of a single request latency
    max_latency_nanos: AtomicU64,

    /// Request bytes consumed (head through terminator)
    bytes_received: AtomicU64,

    /// Response bytes successfully written
    bytes_sent: AtomicU64,

    /// Connections accepted by the serving runtime
    connections: AtomicU64,

    /// Responses that could not be written
    write_errors: AtomicU64,

    /// Process start, for rate computation
    started: Instant,
}

/// Plain values loaded from `PerformanceCounters` at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub request_count: u64,
    pub total_latency_nanos: u64,
    pub max_latency_nanos: u64,
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub connections: u64,
    pub write_errors: u64,
    pub elapsed: Duration,
}

impl PerformanceCounters {
    /// Create counters initialized to zero, with the clock starting now.
    pub fn new() -> Self {
        Self {
            request_count: AtomicU64::new(0),
            total_latency_nanos: AtomicU64::new(0),
            max_latency_nanos: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            connections: AtomicU64::new(0),
            write_errors: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    /// Record one completed request.
    #[inline]
    pub fn record_request(&self, latency: Duration, received: usize, sent: usize) {
        let nanos = duration_nanos(latency);
        self.request_count.fetch_add(1, Ordering::Relaxed);
        self.total_latency_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.bytes_received.fetch_add(received as u64, Ordering::Relaxed);
        self.bytes_sent.fetch_add(sent as u64, Ordering::Relaxed);
        self.record_max_latency(nanos);
    }

    /// Raise `max_latency_nanos` to `nanos` if it is larger.
    ///
    /// Lock-free: reload and retry until either our value is stored or the
    /// stored value is already at least as large.
    #[inline]
    pub fn record_max_latency(&self, nanos: u64) {
        let mut current = self.max_latency_nanos.load(Ordering::Relaxed);
        while nanos > current {
            match self.max_latency_nanos.compare_exchange_weak(
                current,
                nanos,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
    }

    #[inline]
    pub fn record_connection(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_write_error(&self) {
        self.write_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn max_latency_nanos(&self) -> u64 {
        self.max_latency_nanos.load(Ordering::Relaxed)
    }

    /// Load every field. No synchronization beyond per-field atomicity.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            request_count: self.request_count.load(Ordering::Relaxed),
            total_latency_nanos: self.total_latency_nanos.load(Ordering::Relaxed),
            max_latency_nanos: self.max_latency_nanos.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            connections: self.connections.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
            elapsed: self.started.elapsed(),
        }
    }
}

impl Default for PerformanceCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Saturating conversion; a u64 of nanoseconds covers ~584 years.
#[inline]
fn duration_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}
