//! Minimal HTTP/1.x request inspection
//!
//! Nothing here builds a structured request. We only need to know:
//! where the head ends (`\r\n\r\n`), whether `Connection: keep-alive` was
//! sent, and whether the target is `/shutdown`.

/// Header terminator.
pub const HEAD_END: &[u8] = b"\r\n\r\n";

/// Target that asks the server to respond-and-close (and optionally stop).
pub const SHUTDOWN_PATH: &[u8] = b"/shutdown";

/// What the responder needs to know about one complete request head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHead {
    /// Bytes from the start of the buffer through the terminator (`k + 4`).
    pub len: usize,
    /// `Connection: keep-alive` was present.
    pub keep_alive: bool,
    /// Request target is exactly `/shutdown`.
    pub shutdown: bool,
}

/// Position `k` of the first `\r\n\r\n`, or `None` if the head is incomplete.
///
/// Single forward pass over the buffer.
#[inline]
pub fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(HEAD_END.len()).position(|w| w == HEAD_END)
}

/// Inspect `buf` for a complete request head.
///
/// Only bytes `[0, k + 4)` are looked at; anything after the terminator
/// (a pipelined request, a body) has no effect on the result.
pub fn inspect(buf: &[u8]) -> Option<RequestHead> {
    let k = find_head_end(buf)?;
    let head = &buf[..k];

    let mut lines = head.split(|&b| b == b'\n').map(trim_cr);
    let request_line = lines.next().unwrap_or(&[]);
    let shutdown = request_target(request_line) == Some(SHUTDOWN_PATH);
    let keep_alive = lines.any(is_keep_alive_header);

    Some(RequestHead {
        len: k + HEAD_END.len(),
        keep_alive,
        shutdown,
    })
}

/// Second space-separated token of "METHOD /target HTTP/1.1".
fn request_target(line: &[u8]) -> Option<&[u8]> {
    line.split(|&b| b == b' ')
        .filter(|t| !t.is_empty())
        .nth(1)
}

fn is_keep_alive_header(line: &[u8]) -> bool {
    let Some(colon) = line.iter().position(|&b| b == b':') else {
        return false;
    };
    let (name, value) = (&line[..colon], &line[colon + 1..]);
    name.trim_ascii().eq_ignore_ascii_case(b"connection")
        && value.trim_ascii().eq_ignore_ascii_case(b"keep-alive")
}

#[inline]
fn trim_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_head_end() {
        assert_eq!(find_head_end(b""), None);
        assert_eq!(find_head_end(b"\r\n\r"), None);
        assert_eq!(find_head_end(b"\r\n\r\n"), Some(0));
        assert_eq!(find_head_end(b"GET / HTTP/1.1\r\n\r\n"), Some(14));
        assert_eq!(find_head_end(b"GET / HTTP/1.1\r\n\r\nGET / HTTP/1.1\r\n\r\n"), Some(14));
    }

    #[test]
    fn test_incomplete() {
        assert!(inspect(b"GET / HTTP/1.1\r\n").is_none());
        assert!(inspect(b"GET / HTTP/1.1\r\nHost: x\r\n\n").is_none());
    }

    #[test]
    fn test_keep_alive_detection() {
        let h = inspect(b"GET / HTTP/1.1\r\nConnection: keep-alive\r\n\r\n").unwrap();
        assert!(h.keep_alive);
        assert!(!h.shutdown);
        assert_eq!(h.len, 42);

        let h = inspect(b"GET / HTTP/1.1\r\nconnection:Keep-Alive \r\n\r\n").unwrap();
        assert!(h.keep_alive);

        let h = inspect(b"GET / HTTP/1.1\r\nConnection: close\r\n\r\n").unwrap();
        assert!(!h.keep_alive);

        let h = inspect(b"GET / HTTP/1.1\r\nX-Connection: keep-alive\r\n\r\n").unwrap();
        assert!(!h.keep_alive);
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let h = inspect(b"GET / HTTP/1.1\r\n\r\nConnection: keep-alive\r\n\r\n").unwrap();
        assert!(!h.keep_alive);
        assert_eq!(h.len, 18);
    }

    #[test]
    fn test_shutdown_target() {
        let h = inspect(b"GET /shutdown HTTP/1.1\r\n\r\n").unwrap();
        assert!(h.shutdown);

        let h = inspect(b"GET /shutdown/now HTTP/1.1\r\n\r\n").unwrap();
        assert!(!h.shutdown);

        let h = inspect(b"GET / HTTP/1.1\r\nReferer: /shutdown\r\n\r\n").unwrap();
        assert!(!h.shutdown);
    }
}
