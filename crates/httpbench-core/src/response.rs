//! Precomputed HTTP responses
//!
//! Both buffers are rendered once at startup and only read afterwards.
//! They differ only in the `Connection` header value.

/// Body returned for every benchmark request.
pub const BODY: &[u8] = b"helloworld";

/// The two canned responses handed out by the responder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecomputedResponse {
    keep_alive: Box<[u8]>,
    close: Box<[u8]>,
}

impl PrecomputedResponse {
    /// Render the default `helloworld` responses.
    pub fn new() -> Self {
        Self::with_body(BODY)
    }

    /// Render both responses around an arbitrary plain-text body.
    fn with_body(body: &[u8]) -> Self {
        Self {
            keep_alive: render("keep-alive", body),
            close: render("close", body),
        }
    }

    #[inline]
    pub fn keep_alive(&self) -> &[u8] {
        &self.keep_alive
    }

    #[inline]
    pub fn close(&self) -> &[u8] {
        &self.close
    }
}

impl Default for PrecomputedResponse {
    fn default() -> Self {
        Self::new()
    }
}

fn render(connection: &str, body: &[u8]) -> Box<[u8]> {
    let mut resp = format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: text/plain\r\n\
         Connection: {}\r\n\
         Content-Length: {}\r\n\
         \r\n",
        connection,
        body.len()
    )
    .into_bytes();
    resp.extend_from_slice(body);
    resp.into_boxed_slice()
}
