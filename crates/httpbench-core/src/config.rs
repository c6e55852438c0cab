//! Server configuration

use crate::env::{env_get_bool, env_get_opt, ENV_ALLOW_SHUTDOWN, ENV_PORT, ENV_WORKERS};
use crate::error::{BenchError, Result};
use crate::responder::ResponderMode;
use std::time::Duration;

/// Upper bound on reactor threads / pool workers.
pub const MAX_WORKERS: usize = 256;

/// Settings shared by every benchmark runtime.
///
/// Not every runtime uses every field: timeouts apply to the blocking
/// runtimes, `max_conns` to the reactor.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,

    /// Listening port (0 = ephemeral, tests only)
    pub port: u16,

    /// Reactor threads or pool workers
    pub workers: usize,

    /// Keep-alive policy
    pub mode: ResponderMode,

    /// Reporter period; `None` disables periodic reports
    pub report_interval: Option<Duration>,

    /// Per-read timeout for blocking runtimes
    pub read_timeout: Option<Duration>,

    /// Per-write timeout for blocking runtimes
    pub write_timeout: Option<Duration>,

    /// How long a kept-open connection may sit idle between requests
    pub idle_timeout: Option<Duration>,

    /// Connection slots per reactor worker
    pub max_conns: usize,

    /// Receive buffer cap; a full buffer without a complete head is dropped
    pub recv_buffer: usize,

    /// `/shutdown` stops the process
    pub allow_remote_shutdown: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            workers: 1,
            mode: ResponderMode::default(),
            report_interval: Some(Duration::from_secs(5)),
            read_timeout: Some(Duration::from_secs(10)),
            write_timeout: Some(Duration::from_secs(10)),
            idle_timeout: Some(Duration::from_secs(60)),
            max_conns: 4096,
            recv_buffer: 4096,
            allow_remote_shutdown: false,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.workers = n;
        self
    }

    /// One worker per available CPU.
    pub fn multicore(self) -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        self.workers(cpus.min(MAX_WORKERS))
    }

    pub fn mode(mut self, mode: ResponderMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn report_interval(mut self, d: Option<Duration>) -> Self {
        self.report_interval = d;
        self
    }

    pub fn read_timeout(mut self, d: Option<Duration>) -> Self {
        self.read_timeout = d;
        self
    }

    pub fn write_timeout(mut self, d: Option<Duration>) -> Self {
        self.write_timeout = d;
        self
    }

    pub fn idle_timeout(mut self, d: Option<Duration>) -> Self {
        self.idle_timeout = d;
        self
    }

    pub fn max_conns(mut self, n: usize) -> Self {
        self.max_conns = n;
        self
    }

    pub fn recv_buffer(mut self, n: usize) -> Self {
        self.recv_buffer = n;
        self
    }

    pub fn allow_remote_shutdown(mut self, allow: bool) -> Self {
        self.allow_remote_shutdown = allow;
        self
    }

    /// Apply `HTTPBENCH_PORT`, `HTTPBENCH_WORKERS` and
    /// `HTTPBENCH_ALLOW_SHUTDOWN` if set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(port) = env_get_opt::<u16>(ENV_PORT) {
            self.port = port;
        }
        if let Some(n) = env_get_opt::<usize>(ENV_WORKERS) {
            if n >= 1 {
                self.workers = n;
            }
        }
        self.allow_remote_shutdown = env_get_bool(ENV_ALLOW_SHUTDOWN, self.allow_remote_shutdown);
        self
    }

    /// `host:port` for binding.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(invalid("workers must be at least 1"));
        }
        if self.workers > MAX_WORKERS {
            return Err(invalid("workers exceeds maximum"));
        }
        if self.max_conns == 0 {
            return Err(invalid("max_conns must be at least 1"));
        }
        // Smallest possible head: "GET / HTTP/1.0\r\n\r\n".
        if self.recv_buffer < 18 {
            return Err(invalid("recv_buffer too small for a request head"));
        }
        if self.host.is_empty() {
            return Err(invalid("host must not be empty"));
        }
        if self.report_interval == Some(Duration::ZERO) {
            return Err(invalid("report_interval must be positive"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> BenchError {
    BenchError::InvalidConfig(msg.to_string())
}
