//! Response builder with an explicit state machine mirroring how a
//! connection is actually allowed to write to the wire: headers are started
//! once, appended to while unsent, flushed, and only then can body bytes
//! follow.

use crate::error::HttpError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    HeadersStarted,
    HeadersSent,
    Ended,
}

pub struct HttpResponse {
    state: State,
    output: Vec<u8>,
    highwater_mark: usize,
    content_length_set: bool,
    keep_alive_forced_off: bool,
}

fn status_text(code: u16) -> &'static str {
    match code {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        414 => "URI Too Long",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        504 => "Gateway Timeout",
        _ => "Unknown",
    }
}

impl HttpResponse {
    pub fn new() -> Self {
        HttpResponse {
            state: State::Idle,
            output: Vec::new(),
            highwater_mark: 16 * 1024,
            content_length_set: false,
            keep_alive_forced_off: false,
        }
    }

    /// Overrides the connection's default keep-alive decision for this
    /// response. Passing `false` forces the connection closed after this
    /// response is flushed, regardless of the request's `Connection`
    /// header or the connection's request count; passing `true` never
    /// overrides a close decision made elsewhere, it only opts back in to
    /// the default.
    pub fn set_keep_alive(&mut self, keep_alive: bool) {
        self.keep_alive_forced_off = !keep_alive;
    }

    /// Whether this response has forced the connection to close,
    /// independent of the request's own `Connection` header or the
    /// connection's request cap.
    pub fn keep_alive_forced_off(&self) -> bool {
        self.keep_alive_forced_off
    }

    /// Writes the status line. Must be the first call on a fresh response.
    pub fn start_response(&mut self, code: u16) -> Result<(), HttpError> {
        if self.state != State::Idle {
            return Err(HttpError::ResponseProtocol("start_response called more than once"));
        }
        self.output
            .extend_from_slice(format!("HTTP/1.1 {code} {}\r\n", status_text(code)).as_bytes());
        self.state = State::HeadersStarted;
        Ok(())
    }

    /// Appends a header. Only legal after `start_response` and before the
    /// headers are flushed to the wire.
    pub fn add_header(&mut self, name: &str, value: &str) -> Result<(), HttpError> {
        match self.state {
            State::Idle => return Err(HttpError::ResponseProtocol("add_header before start_response")),
            State::HeadersSent | State::Ended => {
                return Err(HttpError::ResponseProtocol("add_header after headers were sent"))
            }
            State::HeadersStarted => {}
        }
        if name.eq_ignore_ascii_case("content-length") {
            self.content_length_set = true;
        }
        self.output.extend_from_slice(name.as_bytes());
        self.output.extend_from_slice(b": ");
        self.output.extend_from_slice(value.as_bytes());
        self.output.extend_from_slice(b"\r\n");
        Ok(())
    }

    /// Writes the blank line terminating the header block. Idempotent: a
    /// second call is a no-op so callers don't need to track whether they
    /// already flushed.
    fn ensure_headers_sent(&mut self) {
        if self.state == State::HeadersStarted {
            self.output.extend_from_slice(b"\r\n");
            self.state = State::HeadersSent;
        }
    }

    /// Finishes the response with a body. Sets `Content-Length` if the
    /// caller hasn't already.
    pub fn end(&mut self, body: &[u8]) -> Result<(), HttpError> {
        match self.state {
            State::Idle => return Err(HttpError::ResponseProtocol("end before start_response")),
            State::Ended => return Err(HttpError::ResponseProtocol("response already ended")),
            State::HeadersStarted if !self.content_length_set => {
                self.add_header("Content-Length", &body.len().to_string())?;
            }
            _ => {}
        }
        self.ensure_headers_sent();
        self.output.extend_from_slice(body);
        self.state = State::Ended;
        Ok(())
    }

    pub fn is_ended(&self) -> bool {
        self.state == State::Ended
    }

    /// Bytes ready to be written to the socket. The caller is expected to
    /// drain these (see [`Self::consume`]) as they're written.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    pub fn consume(&mut self, n: usize) {
        self.output.drain(..n.min(self.output.len()));
    }

    /// Whether enough has accumulated (or the response has fully ended)
    /// that the connection should flush now rather than waiting for more.
    pub fn must_be_flushed(&self) -> bool {
        self.state == State::Ended || self.output.len() > self.highwater_mark
    }

    pub fn set_highwater_mark(&mut self, mark: usize) {
        self.highwater_mark = mark;
    }
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds a minimal error response body + headers for a given status code,
/// used by the connection layer when request handling fails before a
/// response was otherwise started.
pub fn error_response(code: u16, keep_alive: bool) -> HttpResponse {
    let mut res = HttpResponse::new();
    let body = format!("{code} {}", status_text(code));
    res.start_response(code).expect("fresh response");
    res.add_header("Content-Type", "text/plain; charset=utf-8").expect("headers open");
    res.add_header("Connection", if keep_alive { "keep-alive" } else { "close" })
        .expect("headers open");
    res.end(body.as_bytes()).expect("fresh response can always end");
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_simple_response() {
        let mut res = HttpResponse::new();
        res.start_response(200).unwrap();
        res.add_header("Content-Type", "text/plain").unwrap();
        res.end(b"hi").unwrap();
        let out = String::from_utf8(res.output().to_vec()).unwrap();
        assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(out.contains("Content-Type: text/plain\r\n"));
        assert!(out.contains("Content-Length: 2\r\n"));
        assert!(out.ends_with("\r\n\r\nhi"));
    }

    #[test]
    fn rejects_add_header_before_start() {
        let mut res = HttpResponse::new();
        assert!(res.add_header("X", "y").is_err());
    }

    #[test]
    fn rejects_double_end() {
        let mut res = HttpResponse::new();
        res.start_response(204).unwrap();
        res.end(b"").unwrap();
        assert!(res.end(b"").is_err());
    }

    #[test]
    fn must_be_flushed_once_ended() {
        let mut res = HttpResponse::new();
        res.start_response(200).unwrap();
        assert!(!res.must_be_flushed());
        res.end(b"x").unwrap();
        assert!(res.must_be_flushed());
    }

    #[test]
    fn set_keep_alive_false_forces_close() {
        let mut res = HttpResponse::new();
        assert!(!res.keep_alive_forced_off());
        res.set_keep_alive(false);
        assert!(res.keep_alive_forced_off());
        res.set_keep_alive(true);
        assert!(!res.keep_alive_forced_off());
    }

    #[test]
    fn error_response_sets_connection_header() {
        let res = error_response(404, false);
        let out = String::from_utf8(res.output().to_vec()).unwrap();
        assert!(out.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(out.contains("Connection: close\r\n"));
    }
}
