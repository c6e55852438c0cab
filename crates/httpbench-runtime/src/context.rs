//! Everything a runtime needs, built once at startup.

use httpbench_core::{
    PerformanceCounters, Responder, Result, ServerConfig, Shutdown,
};

use std::sync::Arc;

/// Validated config plus the shared responder, counters and stop flag.
#[derive(Debug, Clone)]
pub struct BenchContext {
    pub config: ServerConfig,
    pub counters: Arc<PerformanceCounters>,
    pub responder: Arc<Responder>,
    pub shutdown: Shutdown,
}

impl BenchContext {
    /// Validate `config` and build the responder around fresh counters.
    pub fn new(config: ServerConfig, shutdown: Shutdown) -> Result<Self> {
        config.validate()?;

        let counters = Arc::new(PerformanceCounters::new());
        let mut responder = Responder::new(config.mode, Arc::clone(&counters));
        if config.allow_remote_shutdown {
            responder = responder.with_remote_shutdown(shutdown.clone());
        }

        Ok(Self {
            config,
            counters,
            responder: Arc::new(responder),
            shutdown,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpbench_core::{Action, MemConnection, ResponderMode};

    #[test]
    fn test_rejects_invalid_config() {
        let cfg = ServerConfig::new().workers(0);
        assert!(BenchContext::new(cfg, Shutdown::new()).is_err());
    }

    #[test]
    fn test_responder_shares_counters() {
        let cfg = ServerConfig::new().mode(ResponderMode::SingleShot);
        let ctx = BenchContext::new(cfg, Shutdown::new()).unwrap();
        let mut conn = MemConnection::with_input(b"GET / HTTP/1.1\r\n\r\n");
        assert_eq!(ctx.responder.handle(&mut conn), Action::Close);
        assert_eq!(ctx.counters.request_count(), 1);
    }

    #[test]
    fn test_remote_shutdown_wiring() {
        let stop = Shutdown::new();
        let cfg = ServerConfig::new().allow_remote_shutdown(true);
        let ctx = BenchContext::new(cfg, stop.clone()).unwrap();
        let mut conn = MemConnection::with_input(b"GET /shutdown HTTP/1.1\r\n\r\n");
        ctx.responder.handle(&mut conn);
        assert!(stop.is_triggered());
    }
}
