//! # Benchmark responder
//!
//! Given whatever a connection has buffered, decide whether a full HTTP
//! request head has arrived. If so, write one of the two precomputed
//! responses, update the shared counters and tell the runtime what to do
//! with the socket.
//!
//! ```ignore
//! let responder = Responder::new(ResponderMode::Persistent, counters);
//! conn.fill_from_socket()?;
//! match responder.serve_buffered(&mut conn) {
//!     Action::Ignore => {}            // wait for more bytes
//!     Action::KeepOpen => {}          // next request may follow
//!     Action::Close => conn.close(),
//! }
//! ```
//!
//! The benchmark variants disagree on keep-alive, so each behavior is a
//! named `ResponderMode` rather than a single hard-wired policy.

use crate::connection::Connection;
use crate::counters::PerformanceCounters;
use crate::error::BenchError;
use crate::request;
use crate::response::PrecomputedResponse;
use crate::shutdown::Shutdown;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

/// What the runtime should do with the connection after `handle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// No complete request yet; keep reading.
    Ignore,
    /// Close the connection.
    Close,
    /// Response sent; keep the connection for the next request.
    KeepOpen,
}

/// Keep-alive policy of a benchmark variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponderMode {
    /// Always the `close` response, always close.
    SingleShot,
    /// Echo `keep-alive` in the response header when asked, but close anyway.
    #[default]
    EchoKeepAlive,
    /// Honor keep-alive: the socket stays open for the next request.
    Persistent,
}

impl ResponderMode {
    pub const ALL: [ResponderMode; 3] = [
        ResponderMode::SingleShot,
        ResponderMode::EchoKeepAlive,
        ResponderMode::Persistent,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResponderMode::SingleShot => "single-shot",
            ResponderMode::EchoKeepAlive => "echo-keep-alive",
            ResponderMode::Persistent => "persistent",
        }
    }
}

impl fmt::Display for ResponderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponderMode {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| BenchError::InvalidConfig(format!("unknown responder mode '{}'", s)))
    }
}

/// Shared, immutable request handler. Clone the `Arc`, not the responder.
#[derive(Debug)]
pub struct Responder {
    mode: ResponderMode,
    responses: PrecomputedResponse,
    counters: Arc<PerformanceCounters>,
    /// Set only when remote `/shutdown` is allowed to stop the process.
    shutdown: Option<Shutdown>,
}

impl Responder {
    pub fn new(mode: ResponderMode, counters: Arc<PerformanceCounters>) -> Self {
        Self {
            mode,
            responses: PrecomputedResponse::new(),
            counters,
            shutdown: None,
        }
    }

    /// Let a `/shutdown` request trigger `shutdown`.
    pub fn with_remote_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    #[inline]
    pub fn mode(&self) -> ResponderMode {
        self.mode
    }

    #[inline]
    pub fn counters(&self) -> &Arc<PerformanceCounters> {
        &self.counters
    }

    #[inline]
    pub fn responses(&self) -> &PrecomputedResponse {
        &self.responses
    }

    /// Act on at most one buffered request.
    ///
    /// Inputs without `\r\n\r\n` return `Ignore` and touch no counter.
    /// On completion the request head (`[0, k + 4)`) is consumed; bytes
    /// after it stay buffered.
    pub fn handle<C: Connection + ?Sized>(&self, conn: &mut C) -> Action {
        let start = Instant::now();

        let buf = conn.buffered();
        if buf.is_empty() {
            return Action::Ignore;
        }
        let Some(head) = request::inspect(buf) else {
            return Action::Ignore;
        };
        conn.consume(head.len);

        if head.shutdown {
            let _ = conn.write(self.responses.close());
            if let Some(shutdown) = &self.shutdown {
                log::info!("remote shutdown requested");
                shutdown.trigger();
            }
            return Action::Close;
        }

        let response = match self.mode {
            ResponderMode::SingleShot => self.responses.close(),
            ResponderMode::EchoKeepAlive | ResponderMode::Persistent => {
                if head.keep_alive {
                    self.responses.keep_alive()
                } else {
                    self.responses.close()
                }
            }
        };

        if let Err(e) = conn.write(response) {
            log::trace!("write failed: {}", e);
            self.counters.record_write_error();
            return Action::Close;
        }

        self.counters
            .record_request(start.elapsed(), head.len, response.len());

        match self.mode {
            ResponderMode::Persistent if head.keep_alive => Action::KeepOpen,
            _ => Action::Close,
        }
    }

    /// Handle every complete request currently buffered (pipelining).
    ///
    /// Returns `Ignore` if nothing was complete, `Close` as soon as any
    /// request closes, `KeepOpen` otherwise.
    pub fn serve_buffered<C: Connection + ?Sized>(&self, conn: &mut C) -> Action {
        let mut last = Action::Ignore;
        loop {
            match self.handle(conn) {
                Action::Ignore => return last,
                Action::Close => return Action::Close,
                Action::KeepOpen => last = Action::KeepOpen,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::MemConnection;
    use std::thread;

    fn responder(mode: ResponderMode) -> Responder {
        Responder::new(mode, Arc::new(PerformanceCounters::new()))
    }

    const KEEP_ALIVE_REQ: &[u8] = b"GET / HTTP/1.1\r\nConnection: keep-alive\r\n\r\n";

    #[test]
    fn test_empty_buffer_is_ignored() {
        let r = responder(ResponderMode::Persistent);
        let mut conn = MemConnection::new();
        assert_eq!(r.handle(&mut conn), Action::Ignore);
        assert!(conn.written().is_empty());
    }

    #[test]
    fn test_incomplete_input_mutates_nothing() {
        let inputs: [&[u8]; 5] = [
            b"G",
            b"GET / HTTP/1.1\r\n",
            b"GET / HTTP/1.1\r\nHost: a\r\n\r",
            b"\r\n\n\r\n",
            b"\x00\xff\r\r\n\n",
        ];
        for mode in ResponderMode::ALL {
            let r = responder(mode);
            for input in inputs {
                let mut conn = MemConnection::with_input(input);
                assert_eq!(r.handle(&mut conn), Action::Ignore);
                assert_eq!(conn.buffered(), input);
                assert!(conn.written().is_empty());
            }
            assert_eq!(r.counters().snapshot().request_count, 0);
            assert_eq!(r.counters().snapshot().bytes_received, 0);
            assert_eq!(r.counters().snapshot().write_errors, 0);
        }
    }

    #[test]
    fn test_random_input_without_terminator_is_ignored() {
        use rand::Rng;

        // Mostly CR/LF so near-miss terminators are common.
        const ALPHABET: &[u8] = b"\r\r\r\n\n\nGET /:ka\x00\xff";
        let mut rng = rand::thread_rng();

        for mode in ResponderMode::ALL {
            let r = responder(mode);
            let mut checked = 0;
            while checked < 2_000 {
                let len = rng.gen_range(1..=128);
                let input: Vec<u8> = (0..len)
                    .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())])
                    .collect();
                if request::find_head_end(&input).is_some() {
                    continue;
                }
                checked += 1;

                let mut conn = MemConnection::with_input(&input);
                assert_eq!(r.handle(&mut conn), Action::Ignore, "input {:?}", input);
                assert_eq!(conn.buffered(), &input[..]);
                assert!(conn.written().is_empty());
            }
            let snap = r.counters().snapshot();
            assert_eq!(snap.request_count, 0);
            assert_eq!(snap.bytes_received, 0);
            assert_eq!(snap.bytes_sent, 0);
            assert_eq!(snap.write_errors, 0);
            assert_eq!(snap.max_latency_nanos, 0);
        }
    }

    #[test]
    fn test_keep_alive_scenario_per_mode() {
        let r = responder(ResponderMode::Persistent);
        let mut conn = MemConnection::with_input(KEEP_ALIVE_REQ);
        assert_eq!(r.handle(&mut conn), Action::KeepOpen);
        assert_eq!(conn.written(), r.responses().keep_alive());

        let r = responder(ResponderMode::EchoKeepAlive);
        let mut conn = MemConnection::with_input(KEEP_ALIVE_REQ);
        assert_eq!(r.handle(&mut conn), Action::Close);
        assert_eq!(conn.written(), r.responses().keep_alive());

        let r = responder(ResponderMode::SingleShot);
        let mut conn = MemConnection::with_input(KEEP_ALIVE_REQ);
        assert_eq!(r.handle(&mut conn), Action::Close);
        assert_eq!(conn.written(), r.responses().close());
    }

    #[test]
    fn test_split_input_across_calls() {
        for mode in ResponderMode::ALL {
            let r = responder(mode);
            let mut conn = MemConnection::with_input(b"GET / HTTP/1.1\r\n");
            assert_eq!(r.handle(&mut conn), Action::Ignore);

            conn.feed(b"Connection: close\r\n\r\n");
            assert_eq!(r.handle(&mut conn), Action::Close);
            assert_eq!(conn.written(), r.responses().close());
            assert!(conn.buffered().is_empty());
            assert_eq!(r.counters().request_count(), 1);
        }
    }

    #[test]
    fn test_shutdown_path_closes() {
        for mode in ResponderMode::ALL {
            let r = responder(mode);
            let mut conn = MemConnection::with_input(b"GET /shutdown HTTP/1.1\r\n\r\n");
            assert_eq!(r.handle(&mut conn), Action::Close);
            assert_eq!(conn.written(), r.responses().close());
        }
    }

    #[test]
    fn test_shutdown_path_triggers_only_when_allowed() {
        let stop = Shutdown::new();
        let r = responder(ResponderMode::Persistent);
        let mut conn = MemConnection::with_input(b"GET /shutdown HTTP/1.1\r\n\r\n");
        r.handle(&mut conn);
        assert!(stop.is_running());

        let r = responder(ResponderMode::Persistent).with_remote_shutdown(stop.clone());
        let mut conn = MemConnection::with_input(b"GET /shutdown HTTP/1.1\r\n\r\n");
        r.handle(&mut conn);
        assert!(stop.is_triggered());
        assert_eq!(r.counters().request_count(), 0);
    }

    #[test]
    fn test_trailing_bytes_do_not_affect_decision() {
        let r = responder(ResponderMode::Persistent);
        let mut conn = MemConnection::with_input(b"GET / HTTP/1.1\r\n\r\nConnection: keep-alive\r\n\r\n");
        assert_eq!(r.handle(&mut conn), Action::Close);
        assert_eq!(conn.written(), r.responses().close());
        assert_eq!(conn.buffered(), b"Connection: keep-alive\r\n\r\n");
        assert_eq!(r.counters().snapshot().bytes_received, 18);
    }

    #[test]
    fn test_counters_updated_on_success() {
        let r = responder(ResponderMode::EchoKeepAlive);
        let mut conn = MemConnection::with_input(KEEP_ALIVE_REQ);
        r.handle(&mut conn);

        let s = r.counters().snapshot();
        assert_eq!(s.request_count, 1);
        assert_eq!(s.bytes_received, KEEP_ALIVE_REQ.len() as u64);
        assert_eq!(s.bytes_sent, r.responses().keep_alive().len() as u64);
        assert!(s.max_latency_nanos <= s.total_latency_nanos);
    }

    #[test]
    fn test_write_failure_closes_without_counting() {
        let r = responder(ResponderMode::Persistent);
        let mut conn = MemConnection::with_input(KEEP_ALIVE_REQ).failing_writes();
        assert_eq!(r.handle(&mut conn), Action::Close);

        let s = r.counters().snapshot();
        assert_eq!(s.request_count, 0);
        assert_eq!(s.bytes_sent, 0);
        assert_eq!(s.write_errors, 1);
    }

    #[test]
    fn test_serve_buffered_pipelines() {
        let r = responder(ResponderMode::Persistent);
        let mut input = KEEP_ALIVE_REQ.repeat(3);
        input.extend_from_slice(b"GET / HTTP/1.1\r\n");
        let mut conn = MemConnection::with_input(&input);

        assert_eq!(r.serve_buffered(&mut conn), Action::KeepOpen);
        assert_eq!(r.counters().request_count(), 3);
        assert_eq!(conn.buffered(), b"GET / HTTP/1.1\r\n");

        conn.feed(b"\r\n");
        assert_eq!(r.serve_buffered(&mut conn), Action::Close);
        assert_eq!(r.counters().request_count(), 4);
    }

    #[test]
    fn test_serve_buffered_nothing_complete() {
        let r = responder(ResponderMode::Persistent);
        let mut conn = MemConnection::with_input(b"GET /");
        assert_eq!(r.serve_buffered(&mut conn), Action::Ignore);
    }

    #[test]
    fn test_concurrent_handles_count_exactly() {
        let r = Arc::new(responder(ResponderMode::Persistent));
        let threads = 8u64;
        let per_thread = 2_000u64;

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let r = Arc::clone(&r);
                thread::spawn(move || {
                    for _ in 0..per_thread {
                        let mut conn = MemConnection::with_input(KEEP_ALIVE_REQ);
                        assert_eq!(r.handle(&mut conn), Action::KeepOpen);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let s = r.counters().snapshot();
        assert_eq!(s.request_count, threads * per_thread);
        assert_eq!(s.bytes_received, threads * per_thread * KEEP_ALIVE_REQ.len() as u64);
    }

    #[test]
    fn test_mode_parse_and_display() {
        for mode in ResponderMode::ALL {
            assert_eq!(mode.to_string().parse::<ResponderMode>().unwrap(), mode);
        }
        assert_eq!("Persistent".parse::<ResponderMode>().unwrap(), ResponderMode::Persistent);
        assert!("forever".parse::<ResponderMode>().is_err());
    }
}
