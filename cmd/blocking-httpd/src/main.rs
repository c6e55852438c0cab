//! Standard-stack benchmark server
//!
//! Blocking std sockets, one OS thread per accepted connection. Default
//! mode is `echo-keep-alive`: the response echoes the client's
//! `Connection: keep-alive` but the socket is closed anyway.
//!
//! Usage:
//!     ./target/release/blocking-httpd [--port 8081]

use clap::Parser;
use httpbench_core::{ResponderMode, Result, ServerConfig};
use httpbench_runtime::{
    logging, serve_blocking, shutdown_on_signals, spawn_reporter, BenchContext, Dispatch,
    ServeArgs,
};

#[derive(Parser, Debug)]
#[command(name = "blocking-httpd", version, about = "thread-per-connection HTTP/1.1 benchmark server")]
struct Cli {
    #[command(flatten)]
    serve: ServeArgs,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.serve.verbose);

    if let Err(e) = run(cli) {
        log::error!("blocking-httpd: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let defaults = ServerConfig::new().port(8081).mode(ResponderMode::EchoKeepAlive);
    let config = cli.serve.into_config(defaults);

    let shutdown = shutdown_on_signals()?;
    let ctx = BenchContext::new(config, shutdown.clone())?;
    let reporter = spawn_reporter(ctx.counters.clone(), ctx.config.report_interval, shutdown.clone())?;

    let result = serve_blocking(ctx, Dispatch::ThreadPerConnection);

    shutdown.trigger();
    if let Some(handle) = reporter {
        let _ = handle.join();
    }
    log::info!("blocking-httpd: stopped");
    result
}
