//! Blocking runtime on the standard-library stack.
//!
//! A single acceptor hands each accepted `TcpStream` either to a fresh
//! thread (`Dispatch::ThreadPerConnection`) or to a `FixedPool`
//! (`Dispatch::Pool`). Each connection is then served with plain blocking
//! reads and writes, bounded by socket timeouts.

use crate::context::BenchContext;
use crate::net;
use crate::pool::FixedPool;
use crate::stream::StreamConn;

use httpbench_core::error::Result;
use httpbench_core::{Action, Responder, ServerConfig, Shutdown};

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Acceptor nap when no connection is pending.
const ACCEPT_IDLE: Duration = Duration::from_millis(5);

/// Socket read timeout. A blocked reader wakes this often to check the
/// stop flag and its own deadline.
const READ_SLICE: Duration = Duration::from_millis(100);

/// How accepted connections reach a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// One OS thread per connection.
    ThreadPerConnection,
    /// Fixed pool of `workers` threads fed by a bounded queue of this depth.
    Pool { queue_depth: usize },
}

pub struct BlockingServer {
    ctx: BenchContext,
    listener: TcpListener,
    dispatch: Dispatch,
    local_addr: SocketAddr,
}

impl BlockingServer {
    pub fn bind(ctx: BenchContext, dispatch: Dispatch) -> Result<Self> {
        let listener = net::bind_listener(&ctx.config.addr(), false)?;
        // Non-blocking accept so the acceptor can notice shutdown.
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            ctx,
            listener,
            dispatch,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept until shutdown. Blocks the calling thread.
    pub fn run(self) -> Result<()> {
        log::info!(
            "blocking: listening on http://{} dispatch={:?} mode={}",
            self.local_addr,
            self.dispatch,
            self.ctx.responder.mode(),
        );

        match self.dispatch {
            Dispatch::ThreadPerConnection => {
                let ctx = self.ctx.clone();
                accept_loop(&self.listener, &self.ctx, move |stream| {
                    spawn_connection(stream, &ctx);
                });
                Ok(())
            }
            Dispatch::Pool { queue_depth } => {
                let responder = Arc::clone(&self.ctx.responder);
                let config = self.ctx.config.clone();
                let shutdown = self.ctx.shutdown.clone();
                let pool = FixedPool::new(self.ctx.config.workers, queue_depth, move |stream| {
                    serve_stream(stream, &responder, &config, &shutdown);
                })?;

                let counters = Arc::clone(&self.ctx.counters);
                accept_loop(&self.listener, &self.ctx, |stream| {
                    if pool.submit(stream).is_err() {
                        // Rejected stream is dropped (closed) here.
                        counters.record_write_error();
                        log::debug!("blocking: pool queue full, connection dropped");
                    }
                });
                pool.shutdown()
            }
        }
    }
}

/// Bind and run in one call.
pub fn serve_blocking(ctx: BenchContext, dispatch: Dispatch) -> Result<()> {
    BlockingServer::bind(ctx, dispatch)?.run()
}

fn accept_loop<F>(listener: &TcpListener, ctx: &BenchContext, mut dispatch: F)
where
    F: FnMut(TcpStream),
{
    while ctx.shutdown.is_running() {
        match listener.accept() {
            Ok((stream, _)) => {
                ctx.counters.record_connection();
                // Read timeouts are sliced by `serve_stream`.
                let setup = stream
                    .set_nonblocking(false)
                    .and_then(|_| net::tune_stream(&stream, None, ctx.config.write_timeout));
                match setup {
                    Ok(()) => dispatch(stream),
                    Err(e) => log::debug!("blocking: socket setup failed: {}", e),
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(ACCEPT_IDLE),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                log::warn!("blocking: accept error: {}", e);
                thread::sleep(ACCEPT_IDLE);
            }
        }
    }
}

fn spawn_connection(stream: TcpStream, ctx: &BenchContext) {
    let responder = Arc::clone(&ctx.responder);
    let config = ctx.config.clone();
    let shutdown = ctx.shutdown.clone();
    let spawned = thread::Builder::new()
        .name("conn".into())
        .spawn(move || serve_stream(stream, &responder, &config, &shutdown));
    if let Err(e) = spawned {
        log::warn!("blocking: failed to spawn connection thread: {}", e);
    }
}

/// Serve one connection until the responder closes it, the peer hangs up,
/// a timeout fires, or shutdown is requested.
///
/// The first request and any partially buffered one are bounded by the
/// read timeout; the gap between kept-open requests by the idle timeout.
/// Reads wake every `READ_SLICE`, so shutdown is seen within one slice
/// even with both timeouts disabled.
pub fn serve_stream(
    stream: TcpStream,
    responder: &Responder,
    config: &ServerConfig,
    shutdown: &Shutdown,
) {
    if let Err(e) = stream.set_read_timeout(Some(READ_SLICE)) {
        log::debug!("blocking: socket setup failed: {}", e);
        return;
    }
    let mut conn = StreamConn::new(stream, config.recv_buffer);
    let mut deadline = deadline_after(config.read_timeout);

    while shutdown.is_running() {
        match conn.fill() {
            Ok(0) => return,
            Ok(_) => {}
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    log::trace!("blocking: connection timed out");
                    return;
                }
                continue;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                log::trace!("blocking: read ended: {}", e);
                return;
            }
        }

        match responder.serve_buffered(&mut conn) {
            Action::Close => return,
            Action::KeepOpen => {
                let limit = if conn.is_empty() {
                    config.idle_timeout
                } else {
                    config.read_timeout
                };
                deadline = deadline_after(limit);
            }
            // Head does not fit the buffer.
            Action::Ignore if conn.is_full() => return,
            Action::Ignore => {}
        }
    }
}

fn deadline_after(limit: Option<Duration>) -> Option<Instant> {
    limit.map(|d| Instant::now() + d)
}
