//! Incremental assembly of an [`HttpParser`]'s token stream into a request
//! view over a single growable buffer.
//!
//! `HttpRequest` owns the bytes it has received; every accessor slices into
//! that buffer rather than copying, mirroring the parser's own zero-copy
//! contract.

use std::ops::Range;

use crate::error::ParseError;
use crate::http::parser::{HttpParser, Limits, MessageType, ParserState, Token};

pub use crate::http::parser::Method;

pub struct HttpRequest {
    buffer: Vec<u8>,
    parser: HttpParser,
    limits: Limits,
    method: Method,
    url: Range<usize>,
    version: Range<usize>,
    headers: Vec<(Range<usize>, Range<usize>)>,
    body_start: usize,
    body: Range<usize>,
    complete: bool,
}

impl HttpRequest {
    pub fn new() -> Self {
        Self::with_limits(Limits::default())
    }

    /// Builds a request view whose parser enforces `limits` — in
    /// particular the configured `max_header_bytes`, which otherwise
    /// silently falls back to the parser's built-in default regardless of
    /// what the server was configured with.
    pub fn with_limits(limits: Limits) -> Self {
        HttpRequest {
            buffer: Vec::new(),
            parser: HttpParser::with_limits(MessageType::Request, limits),
            limits,
            method: Method::Unknown,
            url: 0..0,
            version: 0..0,
            headers: Vec::new(),
            body_start: 0,
            body: 0..0,
            complete: false,
        }
    }

    /// Appends newly-read bytes and drives the parser as far as it will go.
    /// Returns `Ok(true)` once the request (headers and, if present, full
    /// body) is complete.
    pub fn feed(&mut self, data: &[u8]) -> Result<bool, ParseError> {
        self.buffer.extend_from_slice(data);
        loop {
            match self.parser.parse(&self.buffer)? {
                false => return Ok(self.complete),
                true => {
                    if self.parser.state == ParserState::Finished {
                        self.complete = true;
                        return Ok(true);
                    }
                    self.record_token();
                }
            }
        }
    }

    fn record_token(&mut self) {
        let range = self.parser.token_start..self.parser.token_start + self.parser.token_length;
        match self.parser.token {
            Token::Method => self.method = self.parser.method,
            Token::Url => self.url = range,
            Token::Version => self.version = range,
            Token::HeaderName => self.headers.push((range, 0..0)),
            Token::HeaderValue => {
                if let Some(last) = self.headers.last_mut() {
                    last.1 = range;
                }
            }
            Token::HeadersEnd => self.body_start = self.parser.consumed(),
            Token::Body => {
                if self.body == (0..0) {
                    self.body = range;
                } else {
                    self.body.end = range.end;
                }
            }
            Token::StatusCode | Token::StatusString => unreachable!("request parser never emits response tokens"),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn url(&self) -> &str {
        std::str::from_utf8(&self.buffer[self.url.clone()]).unwrap_or("")
    }

    pub fn version(&self) -> &str {
        std::str::from_utf8(&self.buffer[self.version.clone()]).unwrap_or("")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find_map(|(n, v)| {
            let n = std::str::from_utf8(&self.buffer[n.clone()]).ok()?;
            if n.eq_ignore_ascii_case(name) {
                std::str::from_utf8(&self.buffer[v.clone()]).ok()
            } else {
                None
            }
        })
    }

    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().filter_map(move |(n, v)| {
            let n = std::str::from_utf8(&self.buffer[n.clone()]).ok()?;
            let v = std::str::from_utf8(&self.buffer[v.clone()]).ok()?;
            Some((n, v))
        })
    }

    pub fn content_length(&self) -> Option<u64> {
        self.parser.content_length
    }

    pub fn body(&self) -> &[u8] {
        &self.buffer[self.body.clone()]
    }

    /// Resets the request view for the next message on the same
    /// connection, preserving any already-buffered bytes of a pipelined
    /// follow-up request.
    pub fn reset_for_next(&mut self) {
        let consumed = self.parser.consumed().max(self.body_start);
        self.buffer.drain(..consumed.min(self.buffer.len()));
        self.parser = HttpParser::with_limits(MessageType::Request, self.limits);
        self.method = Method::Unknown;
        self.url = 0..0;
        self.version = 0..0;
        self.headers.clear();
        self.body_start = 0;
        self.body = 0..0;
        self.complete = false;
    }

    /// `true` if bytes for a subsequent pipelined request are already
    /// sitting in the buffer after this one was parsed.
    pub fn has_trailing_data(&self) -> bool {
        self.complete && self.parser.consumed() < self.buffer.len()
    }
}

impl Default for HttpRequest {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_request_in_one_feed() {
        let mut req = HttpRequest::new();
        let done = req.feed(b"GET /a?x=1 HTTP/1.1\r\nHost: h\r\nX-Test: yes\r\n\r\n").unwrap();
        assert!(done);
        assert_eq!(req.method(), Method::Get);
        assert_eq!(req.url(), "/a?x=1");
        assert_eq!(req.header("host"), Some("h"));
        assert_eq!(req.header("x-test"), Some("yes"));
        assert_eq!(req.body(), b"");
    }

    #[test]
    fn parses_request_fed_in_fragments() {
        let mut req = HttpRequest::new();
        assert!(!req.feed(b"GET /x HTTP/1.1\r\nHost: ").unwrap());
        assert!(!req.feed(b"h\r\n").unwrap());
        assert!(req.feed(b"\r\n").unwrap());
        assert_eq!(req.url(), "/x");
        assert_eq!(req.header("host"), Some("h"));
    }

    #[test]
    fn parses_body_with_content_length() {
        let mut req = HttpRequest::new();
        let done = req
            .feed(b"POST /upload HTTP/1.1\r\nContent-Length: 4\r\n\r\nbody")
            .unwrap();
        assert!(done);
        assert_eq!(req.body(), b"body");
    }

    #[test]
    fn pipelined_request_leaves_trailing_bytes() {
        let mut req = HttpRequest::new();
        let done = req
            .feed(b"GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\n\r\n")
            .unwrap();
        assert!(done);
        assert!(req.has_trailing_data());
        req.reset_for_next();
        let done2 = req.feed(b"").unwrap();
        assert!(done2);
        assert_eq!(req.url(), "/b");
    }

    #[test]
    fn rejects_malformed_request_line() {
        let mut req = HttpRequest::new();
        let err = req.feed(b"GET  HTTP/1.1\r\n\r\n");
        assert!(err.is_err());
    }
}
