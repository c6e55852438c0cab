//! # Reactor: epoll event loop
//!
//! Each worker thread owns:
//! - its own listener (`SO_REUSEPORT` when there is more than one worker),
//! - its own epoll instance,
//! - its own `ConnSlab` of non-blocking connections.
//!
//! No cross-worker synchronization except the shared counters and the
//! shutdown flag. Worker 0 runs on the calling thread.
//!
//! Level-triggered: one `read` per readiness event; leftover bytes fire
//! the next `wait`.

use crate::context::BenchContext;
use crate::net;
use crate::stream::StreamConn;

use httpbench_core::error::{BenchError, Result};
use httpbench_core::{Action, Responder};

use nix::errno::Errno;
use nix::sys::epoll::{Epoll, EpollCreateFlags, EpollEvent, EpollFlags};

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;

/// epoll token reserved for the listener.
const LISTENER_TOKEN: u64 = u64::MAX;

/// Events drained per `wait`.
const MAX_EVENTS: usize = 1024;

/// Bounded wait so the loop notices shutdown.
const POLL_TIMEOUT_MS: u16 = 100;

struct ConnSlab {
    slots: Vec<Option<StreamConn<TcpStream>>>,
    free: Vec<usize>,
}

impl ConnSlab {
    fn new(max: usize) -> Self {
        Self {
            slots: (0..max).map(|_| None).collect(),
            free: (0..max).rev().collect(),
        }
    }

    fn alloc(&mut self, conn: StreamConn<TcpStream>) -> Option<usize> {
        let idx = self.free.pop()?;
        self.slots[idx] = Some(conn);
        Some(idx)
    }

    fn get_mut(&mut self, idx: usize) -> Option<&mut StreamConn<TcpStream>> {
        self.slots.get_mut(idx)?.as_mut()
    }

    fn take(&mut self, idx: usize) -> Option<StreamConn<TcpStream>> {
        let conn = self.slots.get_mut(idx)?.take()?;
        self.free.push(idx);
        Some(conn)
    }

    fn active(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}

/// Listeners bound, loops not yet started.
pub struct ReactorServer {
    ctx: BenchContext,
    listeners: Vec<TcpListener>,
    local_addr: SocketAddr,
}

impl ReactorServer {
    /// Bind one listener per worker.
    ///
    /// With port 0 the first bind picks the port and the rest reuse it.
    pub fn bind(ctx: BenchContext) -> Result<Self> {
        let workers = ctx.config.workers;
        let reuse_port = workers > 1;

        let first = net::bind_listener(&ctx.config.addr(), reuse_port)?;
        let local_addr = first.local_addr()?;
        let shared_addr = format!("{}:{}", ctx.config.host, local_addr.port());

        let mut listeners = Vec::with_capacity(workers);
        listeners.push(first);
        for _ in 1..workers {
            listeners.push(net::bind_listener(&shared_addr, true)?);
        }
        for l in &listeners {
            l.set_nonblocking(true)?;
        }

        Ok(Self {
            ctx,
            listeners,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Run every worker until shutdown. Blocks the calling thread.
    pub fn run(self) -> Result<()> {
        let num_workers = self.listeners.len();
        log::info!(
            "reactor: listening on http://{} workers={} mode={} max_conns={}/worker",
            self.local_addr,
            num_workers,
            self.ctx.responder.mode(),
            self.ctx.config.max_conns,
        );

        let mut listeners = self.listeners.into_iter();
        let Some(main_listener) = listeners.next() else {
            return Ok(());
        };

        let mut handles = Vec::with_capacity(num_workers - 1);
        for (i, listener) in listeners.enumerate() {
            let wid = i + 1;
            let ctx = self.ctx.clone();
            let name = format!("reactor-w{}", wid);
            let handle = thread::Builder::new()
                .name(name.clone())
                .spawn(move || worker_loop(wid, listener, &ctx))
                .map_err(|source| BenchError::Spawn { name: name.clone(), source })?;
            handles.push((name, handle));
        }

        let mut result = worker_loop(0, main_listener, &self.ctx);

        for (name, handle) in handles {
            let joined = handle
                .join()
                .map_err(|_| BenchError::WorkerPanicked(name))
                .and_then(|r| r);
            if result.is_ok() {
                result = joined;
            }
        }
        result
    }
}

/// Bind and run in one call.
pub fn serve_reactor(ctx: BenchContext) -> Result<()> {
    ReactorServer::bind(ctx)?.run()
}

fn worker_loop(wid: usize, listener: TcpListener, ctx: &BenchContext) -> Result<()> {
    let epoll = Epoll::new(EpollCreateFlags::EPOLL_CLOEXEC).map_err(poller_error)?;
    epoll
        .add(&listener, EpollEvent::new(EpollFlags::EPOLLIN, LISTENER_TOKEN))
        .map_err(poller_error)?;

    let mut conns = ConnSlab::new(ctx.config.max_conns);
    let mut events = vec![EpollEvent::empty(); MAX_EVENTS];

    log::debug!("reactor-w{}: event loop started (fd {})", wid, net::fd_of(&listener));

    while ctx.shutdown.is_running() {
        let n = match epoll.wait(&mut events, POLL_TIMEOUT_MS) {
            Ok(n) => n,
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(poller_error(e)),
        };

        for ev in &events[..n] {
            let token = ev.data();
            if token == LISTENER_TOKEN {
                accept_all(&listener, &epoll, &mut conns, ctx);
                continue;
            }

            let idx = token as usize;
            let close = if ev.events().contains(EpollFlags::EPOLLERR) {
                true
            } else {
                match conns.get_mut(idx) {
                    Some(conn) => on_readable(conn, &ctx.responder),
                    None => false,
                }
            };
            if close {
                close_conn(&epoll, &mut conns, idx);
            }
        }
    }

    log::debug!("reactor-w{}: stopping with {} open connections", wid, conns.active());
    Ok(())
}

fn accept_all(listener: &TcpListener, epoll: &Epoll, conns: &mut ConnSlab, ctx: &BenchContext) {
    loop {
        let stream = match listener.accept() {
            Ok((stream, _)) => stream,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                log::warn!("reactor: accept error: {}", e);
                return;
            }
        };
        ctx.counters.record_connection();

        if let Err(e) = stream
            .set_nonblocking(true)
            .and_then(|_| stream.set_nodelay(true))
        {
            log::debug!("reactor: socket setup failed: {}", e);
            continue;
        }

        let Some(idx) = conns.alloc(StreamConn::new(stream, ctx.config.recv_buffer)) else {
            // Slab full: dropping the stream closes it.
            log::warn!("reactor: connection limit {} reached", ctx.config.max_conns);
            continue;
        };

        let registered = conns.get_mut(idx).map(|conn| {
            epoll.add(
                conn.get_ref(),
                EpollEvent::new(EpollFlags::EPOLLIN | EpollFlags::EPOLLRDHUP, idx as u64),
            )
        });
        if let Some(Err(e)) = registered {
            log::warn!("reactor: epoll add failed: {}", e);
            conns.take(idx);
        }
    }
}

/// Read what is available and let the responder act. `true` = close.
fn on_readable(conn: &mut StreamConn<TcpStream>, responder: &Responder) -> bool {
    match conn.fill() {
        Ok(0) => return true,
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => return false,
        Err(e) if e.kind() == io::ErrorKind::Interrupted => return false,
        Err(_) => return true,
    }

    match responder.serve_buffered(conn) {
        Action::Close => true,
        Action::KeepOpen => false,
        // Buffer full and still no complete head: drop it.
        Action::Ignore => conn.is_full(),
    }
}

fn close_conn(epoll: &Epoll, conns: &mut ConnSlab, idx: usize) {
    if let Some(conn) = conns.take(idx) {
        let _ = epoll.delete(conn.get_ref());
    }
}

fn poller_error(e: Errno) -> BenchError {
    BenchError::Poller(io::Error::from(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpbench_core::{ResponderMode, ServerConfig, Shutdown};
    use std::io::{Read, Write};
    use std::time::Duration;

    fn config(mode: ResponderMode) -> ServerConfig {
        ServerConfig::new()
            .host("127.0.0.1")
            .port(0)
            .mode(mode)
            .report_interval(None)
    }

    fn start(mode: ResponderMode) -> (SocketAddr, BenchContext, thread::JoinHandle<Result<()>>) {
        start_with(config(mode))
    }

    fn start_with(cfg: ServerConfig) -> (SocketAddr, BenchContext, thread::JoinHandle<Result<()>>) {
        let ctx = BenchContext::new(cfg, Shutdown::new()).unwrap();
        let server = ReactorServer::bind(ctx.clone()).unwrap();
        let addr = server.local_addr();
        let handle = thread::spawn(move || server.run());
        (addr, ctx, handle)
    }

    fn client(addr: SocketAddr) -> TcpStream {
        let s = TcpStream::connect(addr).unwrap();
        s.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        s
    }

    #[test]
    fn test_conn_slab() {
        let slab = ConnSlab::new(2);
        assert_eq!(slab.active(), 0);
        assert_eq!(slab.free, vec![1, 0]);
    }

    #[test]
    fn test_single_shot_round_trip() {
        let (addr, ctx, handle) = start(ResponderMode::SingleShot);

        let mut c = client(addr);
        c.write_all(b"GET / HTTP/1.1\r\nConnection: keep-alive\r\n\r\n").unwrap();
        let mut resp = Vec::new();
        c.read_to_end(&mut resp).unwrap();
        assert_eq!(resp, ctx.responder.responses().close());

        ctx.shutdown.trigger();
        handle.join().unwrap().unwrap();
        assert_eq!(ctx.counters.request_count(), 1);
        assert_eq!(ctx.counters.snapshot().connections, 1);
    }

    #[test]
    fn test_persistent_serves_two_requests_on_one_socket() {
        let (addr, ctx, handle) = start(ResponderMode::Persistent);
        let ka = ctx.responder.responses().keep_alive().to_vec();

        let mut c = client(addr);
        for _ in 0..2 {
            c.write_all(b"GET / HTTP/1.1\r\nConnection: keep-alive\r\n\r\n").unwrap();
            let mut resp = vec![0u8; ka.len()];
            c.read_exact(&mut resp).unwrap();
            assert_eq!(resp, ka);
        }

        ctx.shutdown.trigger();
        handle.join().unwrap().unwrap();
        assert_eq!(ctx.counters.request_count(), 2);
    }

    #[test]
    fn test_split_request() {
        let (addr, ctx, handle) = start(ResponderMode::EchoKeepAlive);

        let mut c = client(addr);
        c.write_all(b"GET / HTTP/1.1\r\n").unwrap();
        thread::sleep(Duration::from_millis(50));
        c.write_all(b"Connection: close\r\n\r\n").unwrap();
        let mut resp = Vec::new();
        c.read_to_end(&mut resp).unwrap();
        assert_eq!(resp, ctx.responder.responses().close());

        ctx.shutdown.trigger();
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn test_full_buffer_without_terminator_closes() {
        let (addr, ctx, handle) = start_with(config(ResponderMode::Persistent).recv_buffer(32));

        let mut c = client(addr);
        c.write_all(&[b'a'; 64]).unwrap();
        let mut buf = [0u8; 256];
        match c.read(&mut buf) {
            Ok(0) => {}
            Err(e) if e.kind() == io::ErrorKind::ConnectionReset => {}
            other => panic!("expected a closed connection, got {:?}", other),
        }

        ctx.shutdown.trigger();
        handle.join().unwrap().unwrap();
        assert_eq!(ctx.counters.request_count(), 0);
    }

    #[test]
    fn test_multicore_reuse_port_workers() {
        let (addr, ctx, handle) = start_with(config(ResponderMode::SingleShot).workers(4));

        // The kernel spreads these across the four listeners.
        for _ in 0..16 {
            let mut c = client(addr);
            c.write_all(b"GET / HTTP/1.1\r\n\r\n").unwrap();
            let mut resp = Vec::new();
            c.read_to_end(&mut resp).unwrap();
            assert_eq!(resp, ctx.responder.responses().close());
        }

        ctx.shutdown.trigger();
        handle.join().unwrap().unwrap();
        assert_eq!(ctx.counters.request_count(), 16);
        assert_eq!(ctx.counters.snapshot().connections, 16);
    }
}
