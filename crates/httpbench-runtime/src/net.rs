//! Listener socket setup
//!
//! `std::net::TcpListener::bind` cannot set `SO_REUSEPORT` before bind,
//! which the multi-worker reactor needs (one listener per worker, kernel
//! load-balances accepts). So the socket is built by hand and handed to
//! std once it is listening.

use httpbench_core::error::{BenchError, Result};

use std::io;
use std::net::{SocketAddr, SocketAddrV4, TcpListener, TcpStream, ToSocketAddrs};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::time::Duration;

/// listen(2) backlog
pub const BACKLOG: i32 = 4096;

cfg_if::cfg_if! {
    if #[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))] {
        const SOCK_FLAGS: libc::c_int = libc::SOCK_STREAM | libc::SOCK_CLOEXEC;
    } else {
        const SOCK_FLAGS: libc::c_int = libc::SOCK_STREAM;
    }
}

/// Bind and listen on an IPv4 `addr` ("host:port").
///
/// `reuse_port` sets `SO_REUSEPORT` so several workers can bind the same
/// port.
pub fn bind_listener(addr: &str, reuse_port: bool) -> Result<TcpListener> {
    let v4 = resolve_v4(addr).map_err(|e| bind_error(addr, e))?;
    bind_v4(v4, reuse_port).map_err(|e| bind_error(addr, e))
}

fn bind_v4(addr: SocketAddrV4, reuse_port: bool) -> io::Result<TcpListener> {
    let fd = unsafe { libc::socket(libc::AF_INET, SOCK_FLAGS, 0) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    // Owned right away: every early return below closes it.
    let sock = unsafe { OwnedFd::from_raw_fd(fd) };

    set_flag(fd, libc::SOL_SOCKET, libc::SO_REUSEADDR)?;
    if reuse_port {
        set_flag(fd, libc::SOL_SOCKET, libc::SO_REUSEPORT)?;
    }

    let mut sa: libc::sockaddr_in = unsafe { std::mem::zeroed() };
    sa.sin_family = libc::AF_INET as libc::sa_family_t;
    sa.sin_port = addr.port().to_be();
    sa.sin_addr.s_addr = u32::from(*addr.ip()).to_be();

    let ret = unsafe {
        libc::bind(
            fd,
            &sa as *const libc::sockaddr_in as *const libc::sockaddr,
            std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
        )
    };
    if ret != 0 {
        return Err(io::Error::last_os_error());
    }

    if unsafe { libc::listen(fd, BACKLOG) } != 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(TcpListener::from(sock))
}

fn set_flag(fd: RawFd, level: libc::c_int, name: libc::c_int) -> io::Result<()> {
    let opt: libc::c_int = 1;
    let ret = unsafe {
        libc::setsockopt(
            fd,
            level,
            name,
            &opt as *const libc::c_int as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if ret != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn resolve_v4(addr: &str) -> io::Result<SocketAddrV4> {
    addr.to_socket_addrs()?
        .find_map(|a| match a {
            SocketAddr::V4(v4) => Some(v4),
            SocketAddr::V6(_) => None,
        })
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no IPv4 address"))
}

fn bind_error(addr: &str, source: io::Error) -> BenchError {
    BenchError::Bind {
        addr: addr.to_string(),
        source,
    }
}

/// Per-connection socket options applied right after accept.
pub fn tune_stream(
    stream: &TcpStream,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
) -> io::Result<()> {
    stream.set_nodelay(true)?;
    stream.set_read_timeout(read_timeout)?;
    stream.set_write_timeout(write_timeout)?;
    Ok(())
}

/// Raw fd, for log lines.
pub fn fd_of<T: AsRawFd>(sock: &T) -> RawFd {
    sock.as_raw_fd()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn test_bind_ephemeral_and_connect() {
        let listener = bind_listener("127.0.0.1:0", false).unwrap();
        let addr = listener.local_addr().unwrap();
        assert_ne!(addr.port(), 0);

        let mut client = TcpStream::connect(addr).unwrap();
        let (mut server, _) = listener.accept().unwrap();
        tune_stream(&server, Some(Duration::from_secs(1)), None).unwrap();

        client.write_all(b"ping").unwrap();
        let mut buf = [0u8; 4];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");
    }

    #[test]
    fn test_reuse_port_allows_second_bind() {
        let first = bind_listener("127.0.0.1:0", true).unwrap();
        let port = first.local_addr().unwrap().port();
        let second = bind_listener(&format!("127.0.0.1:{}", port), true).unwrap();
        assert_eq!(second.local_addr().unwrap().port(), port);
    }

    #[test]
    fn test_bind_bad_address() {
        let err = bind_listener("not-an-address", false).unwrap_err();
        assert!(matches!(err, BenchError::Bind { .. }));
    }
}
