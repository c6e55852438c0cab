//! Periodic reporter thread.
//!
//! Logs a `Report` every `interval` and one last time when shutdown is
//! requested. Sleeps in short steps so shutdown is noticed promptly.

use httpbench_core::error::{BenchError, Result};
use httpbench_core::{PerformanceCounters, Report, Shutdown};

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const STEP: Duration = Duration::from_millis(100);

/// Start the reporter. `None` interval disables it.
pub fn spawn_reporter(
    counters: Arc<PerformanceCounters>,
    interval: Option<Duration>,
    shutdown: Shutdown,
) -> Result<Option<thread::JoinHandle<()>>> {
    let Some(interval) = interval else {
        log::debug!("reporter: disabled");
        return Ok(None);
    };

    let name = "reporter".to_string();
    thread::Builder::new()
        .name(name.clone())
        .spawn(move || report_loop(&counters, interval, &shutdown))
        .map(Some)
        .map_err(|source| BenchError::Spawn { name, source })
}

fn report_loop(counters: &PerformanceCounters, interval: Duration, shutdown: &Shutdown) {
    let mut next = Instant::now() + interval;
    while shutdown.is_running() {
        let now = Instant::now();
        if now >= next {
            log::info!("{}", Report::capture(counters));
            next += interval;
            continue;
        }
        thread::sleep(STEP.min(next - now));
    }
    log::info!("final: {}", Report::capture(counters));
}
