//! Connection capability seen by the responder
//!
//! The serving runtime owns the socket and the receive buffer. It appends
//! whatever bytes are available and then asks the responder to act on
//! them. The responder never reads the socket itself.
//!
//! # Implementors
//!
//! - `MemConnection`: in-memory buffers, used by tests and benches.
//! - The runtimes wrap `std::net::TcpStream` / `tokio::net::TcpStream`
//!   with a `Vec<u8>` receive buffer.

use std::io;

/// Incremental read / single-shot write byte channel.
pub trait Connection {
    /// Bytes received so far and not yet consumed.
    fn buffered(&self) -> &[u8];

    /// Drop the first `n` buffered bytes (one complete request).
    fn consume(&mut self, n: usize);

    /// Write `buf` in one go.
    ///
    /// A short write is an error: the responder never retries or keeps
    /// partial output around.
    fn write(&mut self, buf: &[u8]) -> io::Result<()>;
}

/// Write `buf` with one `write` call on any `io::Write`, treating a short
/// write as failure.
pub fn write_once<W: io::Write + ?Sized>(w: &mut W, buf: &[u8]) -> io::Result<()> {
    let n = w.write(buf)?;
    if n == buf.len() {
        Ok(())
    } else {
        Err(io::Error::new(
            io::ErrorKind::WriteZero,
            format!("short write: {} of {} bytes", n, buf.len()),
        ))
    }
}

/// In-memory connection: input is fed by the caller, output is collected.
#[derive(Debug, Default)]
pub struct MemConnection {
    inbound: Vec<u8>,
    outbound: Vec<u8>,
    fail_writes: bool,
}

impl MemConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connection that already holds `bytes`.
    pub fn with_input(bytes: &[u8]) -> Self {
        let mut conn = Self::new();
        conn.feed(bytes);
        conn
    }

    /// Every subsequent `write` fails with `BrokenPipe`.
    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Append newly "received" bytes.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.inbound.extend_from_slice(bytes);
    }

    /// Everything written so far.
    pub fn written(&self) -> &[u8] {
        &self.outbound
    }

    /// Take and clear the written bytes.
    pub fn take_written(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.outbound)
    }
}

impl Connection for MemConnection {
    fn buffered(&self) -> &[u8] {
        &self.inbound
    }

    fn consume(&mut self, n: usize) {
        let n = n.min(self.inbound.len());
        self.inbound.drain(..n);
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        if self.fail_writes {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        }
        self.outbound.extend_from_slice(buf);
        Ok(())
    }
}
