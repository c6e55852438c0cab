//! Derived metrics for the periodic report
//!
//! Pure math over a `Snapshot`; the timer that drives it lives in the
//! runtime crate (a thread ticker, or `tokio::time::interval`).

use crate::counters::{PerformanceCounters, Snapshot};
use std::fmt;
use std::time::Duration;

const MB: f64 = 1024.0 * 1024.0;

/// One report line worth of numbers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Report {
    pub elapsed: Duration,
    pub requests: u64,
    pub connections: u64,
    pub write_errors: u64,
    pub bytes_received: u64,
    pub bytes_sent: u64,
    /// requests / elapsed seconds
    pub request_rate: f64,
    /// bytes_received / elapsed seconds
    pub recv_throughput: f64,
    /// bytes_sent / elapsed seconds
    pub send_throughput: f64,
    pub avg_latency_nanos: u64,
    pub max_latency_nanos: u64,
}

impl Report {
    pub fn from_snapshot(s: &Snapshot) -> Self {
        let secs = s.elapsed.as_secs_f64();
        let per_sec = |v: u64| if secs > 0.0 { v as f64 / secs } else { 0.0 };

        let avg_latency_nanos = if s.request_count > 0 {
            s.total_latency_nanos / s.request_count
        } else {
            0
        };

        Self {
            elapsed: s.elapsed,
            requests: s.request_count,
            connections: s.connections,
            write_errors: s.write_errors,
            bytes_received: s.bytes_received,
            bytes_sent: s.bytes_sent,
            request_rate: per_sec(s.request_count),
            recv_throughput: per_sec(s.bytes_received),
            send_throughput: per_sec(s.bytes_sent),
            avg_latency_nanos,
            max_latency_nanos: s.max_latency_nanos,
        }
    }

    /// Snapshot `counters` now and derive.
    pub fn capture(counters: &PerformanceCounters) -> Self {
        Self::from_snapshot(&counters.snapshot())
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:.1}s] req={} rps={:.0} in={:.2}MB ({:.2}MB/s) out={:.2}MB ({:.2}MB/s) \
             avg={}ns max={}ns conns={} werr={}",
            self.elapsed.as_secs_f64(),
            self.requests,
            self.request_rate,
            self.bytes_received as f64 / MB,
            self.recv_throughput / MB,
            self.bytes_sent as f64 / MB,
            self.send_throughput / MB,
            self.avg_latency_nanos,
            self.max_latency_nanos,
            self.connections,
            self.write_errors,
        )
    }
}
