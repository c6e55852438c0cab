//! Pooled keep-alive benchmark server
//!
//! A fixed pool of worker threads fed through a bounded lock-free queue.
//! Default mode is `persistent`: keep-alive requests keep the socket open,
//! bounded by the read, write and idle timeouts.
//!
//! Usage:
//!     ./target/release/fast-httpd [--port 8083] [-t 8] [--queue-depth 1024]

use clap::Parser;
use httpbench_core::{ResponderMode, Result, ServerConfig};
use httpbench_runtime::{
    logging, serve_blocking, shutdown_on_signals, spawn_reporter, BenchContext, Dispatch,
    ServeArgs,
};

#[derive(Parser, Debug)]
#[command(name = "fast-httpd", version, about = "worker-pool HTTP/1.1 benchmark server")]
struct Cli {
    #[command(flatten)]
    serve: ServeArgs,

    /// Accepted connections waiting for a free worker
    #[arg(long, default_value_t = 1024)]
    queue_depth: usize,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.serve.verbose);

    if let Err(e) = run(cli) {
        log::error!("fast-httpd: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let defaults = ServerConfig::new()
        .port(8083)
        .mode(ResponderMode::Persistent)
        .multicore();
    let config = cli.serve.into_config(defaults);

    let shutdown = shutdown_on_signals()?;
    let ctx = BenchContext::new(config, shutdown.clone())?;
    let reporter = spawn_reporter(ctx.counters.clone(), ctx.config.report_interval, shutdown.clone())?;

    let result = serve_blocking(ctx, Dispatch::Pool { queue_depth: cli.queue_depth });

    shutdown.trigger();
    if let Some(handle) = reporter {
        let _ = handle.join();
    }
    log::info!("fast-httpd: stopped");
    result
}
