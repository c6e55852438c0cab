//! Tokio benchmark server, comparison baseline
//!
//! One task per connection on the multi-threaded runtime. Requests go
//! through the same `Responder` as the sync servers; the socket is
//! awaited for readiness and then handed to it as a `Connection`.
//!
//! Usage:
//!     ./target/release/tokio-httpd [--port 8084] [-t 4]
//!
//! Benchmark:
//!     wrk -t4 -c100 -d10s http://127.0.0.1:8084/

use clap::Parser;
use httpbench_core::connection::Connection;
use httpbench_core::{Action, BenchError, Report, ResponderMode, Result, ServerConfig};
use httpbench_runtime::{logging, net, shutdown_on_signals, BenchContext, ServeArgs};

use std::io;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};

/// How often the accept loop checks the stop flag.
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[command(name = "tokio-httpd", version, about = "Tokio HTTP/1.1 benchmark server")]
struct Cli {
    #[command(flatten)]
    serve: ServeArgs,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.serve.verbose);

    if let Err(e) = run(cli) {
        log::error!("tokio-httpd: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let defaults = ServerConfig::new()
        .port(8084)
        .mode(ResponderMode::EchoKeepAlive)
        .multicore();
    let config = cli.serve.into_config(defaults);

    let shutdown = shutdown_on_signals()?;
    let ctx = BenchContext::new(config, shutdown)?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(ctx.config.workers)
        .enable_all()
        .build()?;

    let result = rt.block_on(async {
        let listener = bind(&ctx)?;
        if let Some(every) = ctx.config.report_interval {
            tokio::spawn(report_task(ctx.clone(), every));
        }
        accept_loop(listener, ctx.clone()).await;
        Ok::<(), BenchError>(())
    });

    log::info!("final: {}", Report::capture(&ctx.counters));
    log::info!("tokio-httpd: stopped");
    result
}

/// Std listener (for `SO_REUSEADDR` and the backlog) handed to tokio.
fn bind(ctx: &BenchContext) -> Result<TcpListener> {
    let std_listener = net::bind_listener(&ctx.config.addr(), false)?;
    std_listener.set_nonblocking(true)?;
    let listener = TcpListener::from_std(std_listener)?;
    log::info!(
        "tokio-httpd: listening on http://{} workers={} mode={}",
        listener.local_addr()?,
        ctx.config.workers,
        ctx.responder.mode(),
    );
    Ok(listener)
}

async fn report_task(ctx: BenchContext, every: Duration) {
    let mut interval = tokio::time::interval(every);
    // First tick completes immediately.
    interval.tick().await;
    while ctx.shutdown.is_running() {
        interval.tick().await;
        log::info!("{}", Report::capture(&ctx.counters));
    }
}

async fn accept_loop(listener: TcpListener, ctx: BenchContext) {
    let mut poll = tokio::time::interval(SHUTDOWN_POLL);
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    ctx.counters.record_connection();
                    tokio::spawn(handle_client(stream, ctx.clone()));
                }
                Err(e) => log::warn!("tokio-httpd: accept error: {}", e),
            },
            _ = poll.tick() => {
                if ctx.shutdown.is_triggered() {
                    return;
                }
            }
        }
    }
}

async fn handle_client(stream: TcpStream, ctx: BenchContext) {
    let _ = stream.set_nodelay(true);
    let mut conn = TokioConn::new(stream, ctx.config.recv_buffer);

    while ctx.shutdown.is_running() {
        // Idle between requests, read timeout inside one.
        let limit = if conn.buf.is_empty() {
            ctx.config.idle_timeout
        } else {
            ctx.config.read_timeout
        };
        let read = match limit {
            Some(d) => match tokio::time::timeout(d, conn.fill()).await {
                Ok(r) => r,
                Err(_) => return,
            },
            None => conn.fill().await,
        };
        match read {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }

        if conn.stream.writable().await.is_err() {
            return;
        }
        match ctx.responder.serve_buffered(&mut conn) {
            Action::Close => return,
            Action::KeepOpen => {}
            Action::Ignore if conn.is_full() => return,
            Action::Ignore => {}
        }
    }
}

/// Tokio socket plus a capped receive buffer.
///
/// Writes are a single `try_write`; callers await `writable()` first.
struct TokioConn {
    stream: TcpStream,
    buf: Vec<u8>,
    cap: usize,
}

impl TokioConn {
    fn new(stream: TcpStream, cap: usize) -> Self {
        Self {
            stream,
            buf: Vec::with_capacity(cap),
            cap,
        }
    }

    /// One read into the free tail. `Ok(0)` on EOF or a full buffer.
    async fn fill(&mut self) -> io::Result<usize> {
        let old = self.buf.len();
        if old >= self.cap {
            return Ok(0);
        }
        self.buf.resize(self.cap, 0);
        let res = self.stream.read(&mut self.buf[old..]).await;
        let n = match &res {
            Ok(n) => *n,
            Err(_) => 0,
        };
        self.buf.truncate(old + n);
        res
    }

    fn is_full(&self) -> bool {
        self.buf.len() >= self.cap
    }
}

impl Connection for TokioConn {
    fn buffered(&self) -> &[u8] {
        &self.buf
    }

    fn consume(&mut self, n: usize) {
        let n = n.min(self.buf.len());
        self.buf.drain(..n);
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        match self.stream.try_write(buf)? {
            n if n == buf.len() => Ok(()),
            _ => Err(io::Error::new(io::ErrorKind::WriteZero, "short write")),
        }
    }
}
