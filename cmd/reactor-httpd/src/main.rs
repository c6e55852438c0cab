//! Event-loop benchmark server
//!
//! One epoll loop per worker. With `--multicore` (or `-t N`) every worker
//! gets its own `SO_REUSEPORT` listener and the kernel spreads accepts.
//! Default mode is `single-shot`: every response closes the connection.
//!
//! Usage:
//!     ./target/release/reactor-httpd [--port 8082] [--multicore]
//!
//! Benchmark:
//!     wrk -t4 -c100 -d10s http://127.0.0.1:8082/

use clap::Parser;
use httpbench_core::{ResponderMode, Result, ServerConfig};
use httpbench_runtime::{logging, shutdown_on_signals, spawn_reporter, BenchContext, ServeArgs};

#[derive(Parser, Debug)]
#[command(name = "reactor-httpd", version, about = "epoll HTTP/1.1 benchmark server")]
struct Cli {
    #[command(flatten)]
    serve: ServeArgs,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.serve.verbose);

    if let Err(e) = run(cli) {
        log::error!("reactor-httpd: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let defaults = ServerConfig::new().port(8082).mode(ResponderMode::SingleShot);
    let config = cli.serve.into_config(defaults);

    let shutdown = shutdown_on_signals()?;
    let ctx = BenchContext::new(config, shutdown.clone())?;
    let reporter = spawn_reporter(ctx.counters.clone(), ctx.config.report_interval, shutdown.clone())?;

    let result = serve(ctx);

    // Reporter exits on the flag; make sure it is set on error paths too.
    shutdown.trigger();
    if let Some(handle) = reporter {
        let _ = handle.join();
    }
    log::info!("reactor-httpd: stopped");
    result
}

#[cfg(target_os = "linux")]
fn serve(ctx: BenchContext) -> Result<()> {
    httpbench_runtime::serve_reactor(ctx)
}

#[cfg(not(target_os = "linux"))]
fn serve(_ctx: BenchContext) -> Result<()> {
    Err(httpbench_core::BenchError::InvalidConfig(
        "the epoll reactor requires Linux".into(),
    ))
}
