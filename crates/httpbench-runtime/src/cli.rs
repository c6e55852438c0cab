//! Command-line arguments shared by every benchmark binary.
//!
//! Each binary flattens `ServeArgs` into its own parser and supplies its
//! own defaults (port, mode). Precedence: binary defaults, then
//! `HTTPBENCH_*` environment, then flags.

use clap::{ArgAction, Args};
use httpbench_core::{ResponderMode, ServerConfig};
use std::time::Duration;

#[derive(Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// Bind address
    #[arg(long)]
    pub host: Option<String>,

    /// Listening port [env: HTTPBENCH_PORT]
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Reactor threads or pool size [env: HTTPBENCH_WORKERS]
    #[arg(short = 't', long)]
    pub workers: Option<usize>,

    /// One worker per CPU (overrides --workers)
    #[arg(long)]
    pub multicore: bool,

    /// single-shot, echo-keep-alive or persistent
    #[arg(long)]
    pub mode: Option<ResponderMode>,

    /// Seconds between stats reports, 0 disables
    #[arg(long, value_name = "SECS")]
    pub report_interval_secs: Option<u64>,

    /// Seconds to wait for the rest of a request, 0 disables
    #[arg(long, value_name = "SECS")]
    pub read_timeout_secs: Option<u64>,

    /// Seconds to wait on a blocked write, 0 disables
    #[arg(long, value_name = "SECS")]
    pub write_timeout_secs: Option<u64>,

    /// Seconds a kept-open connection may sit idle, 0 disables
    #[arg(long, value_name = "SECS")]
    pub idle_timeout_secs: Option<u64>,

    /// Connection slots per reactor worker
    #[arg(long)]
    pub max_conns: Option<usize>,

    /// Let `GET /shutdown` stop the server [env: HTTPBENCH_ALLOW_SHUTDOWN]
    #[arg(long)]
    pub allow_remote_shutdown: bool,

    /// Debug logging (HTTPBENCH_LOG takes precedence)
    #[arg(short, long, action = ArgAction::SetTrue)]
    pub verbose: bool,
}

impl ServeArgs {
    /// Layer env overrides and then these flags over `defaults`.
    pub fn into_config(self, defaults: ServerConfig) -> ServerConfig {
        let mut cfg = defaults.with_env_overrides();

        if let Some(host) = self.host {
            cfg = cfg.host(host);
        }
        if let Some(port) = self.port {
            cfg = cfg.port(port);
        }
        if let Some(n) = self.workers {
            cfg = cfg.workers(n);
        }
        if self.multicore {
            cfg = cfg.multicore();
        }
        if let Some(mode) = self.mode {
            cfg = cfg.mode(mode);
        }
        if let Some(secs) = self.report_interval_secs {
            cfg = cfg.report_interval(secs_or_none(secs));
        }
        if let Some(secs) = self.read_timeout_secs {
            cfg = cfg.read_timeout(secs_or_none(secs));
        }
        if let Some(secs) = self.write_timeout_secs {
            cfg = cfg.write_timeout(secs_or_none(secs));
        }
        if let Some(secs) = self.idle_timeout_secs {
            cfg = cfg.idle_timeout(secs_or_none(secs));
        }
        if let Some(n) = self.max_conns {
            cfg = cfg.max_conns(n);
        }
        if self.allow_remote_shutdown {
            cfg = cfg.allow_remote_shutdown(true);
        }
        cfg
    }
}

fn secs_or_none(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        serve: ServeArgs,
    }

    fn parse(args: &[&str]) -> ServeArgs {
        TestCli::parse_from(std::iter::once("test").chain(args.iter().copied())).serve
    }

    #[test]
    fn test_defaults_pass_through() {
        let defaults = ServerConfig::new().port(8082).mode(ResponderMode::SingleShot);
        let cfg = parse(&[]).into_config(defaults);
        assert_eq!(cfg.mode, ResponderMode::SingleShot);
        assert_eq!(cfg.workers, 1);
        assert_eq!(cfg.report_interval, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_flags_override() {
        let cfg = parse(&[
            "--host",
            "127.0.0.1",
            "-p",
            "9000",
            "-t",
            "3",
            "--mode",
            "persistent",
            "--report-interval-secs",
            "0",
            "--idle-timeout-secs",
            "30",
            "--allow-remote-shutdown",
        ])
        .into_config(ServerConfig::new());

        assert_eq!(cfg.addr(), "127.0.0.1:9000");
        assert_eq!(cfg.workers, 3);
        assert_eq!(cfg.mode, ResponderMode::Persistent);
        assert_eq!(cfg.report_interval, None);
        assert_eq!(cfg.idle_timeout, Some(Duration::from_secs(30)));
        assert!(cfg.allow_remote_shutdown);
    }

    #[test]
    fn test_bad_mode_rejected() {
        let res = TestCli::try_parse_from(["test", "--mode", "bogus"]);
        assert!(res.is_err());
    }
}
