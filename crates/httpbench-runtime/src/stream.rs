//! Socket-backed `Connection`
//!
//! Wraps any `Read + Write` stream (blocking or non-blocking `TcpStream`)
//! with a capped receive buffer.

use httpbench_core::connection::{write_once, Connection};

use std::io::{self, Read, Write};

pub struct StreamConn<S> {
    stream: S,
    buf: Vec<u8>,
    cap: usize,
}

impl<S: Read + Write> StreamConn<S> {
    pub fn new(stream: S, cap: usize) -> Self {
        Self {
            stream,
            buf: Vec::with_capacity(cap),
            cap,
        }
    }

    /// One `read` into the free tail of the buffer.
    ///
    /// `Ok(0)` means EOF, or that the buffer is already full (check
    /// `is_full`). `WouldBlock` passes through for non-blocking sockets.
    pub fn fill(&mut self) -> io::Result<usize> {
        let old = self.buf.len();
        if old >= self.cap {
            return Ok(0);
        }
        self.buf.resize(self.cap, 0);
        match self.stream.read(&mut self.buf[old..]) {
            Ok(n) => {
                self.buf.truncate(old + n);
                Ok(n)
            }
            Err(e) => {
                self.buf.truncate(old);
                Err(e)
            }
        }
    }

    /// Buffer at capacity: no room left for the rest of a head.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.buf.len() >= self.cap
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }
}

impl<S: Read + Write> Connection for StreamConn<S> {
    #[inline]
    fn buffered(&self) -> &[u8] {
        &self.buf
    }

    #[inline]
    fn consume(&mut self, n: usize) {
        let n = n.min(self.buf.len());
        self.buf.drain(..n);
    }

    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        write_once(&mut self.stream, buf)
    }
}
