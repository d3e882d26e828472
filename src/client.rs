//! Minimal blocking HTTP/1.1 client: synchronous DNS resolution, a single
//! blocking connect, and a fully-buffered response read (no streaming of
//! the response body). Good enough for health checks and simple upstream
//! calls; not a replacement for a real async client.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use crate::error::{HttpError, UrlError};
use crate::http::parser::{HttpParser, MessageType, ParserState, Token};
use crate::url;

const MULTIPART_BOUNDARY: &str = "----SCFormBoundary7MA4YWxkTrZu0gW";
const USER_AGENT: &str = "cinder-http-client";

pub struct HttpResponse {
    pub status_code: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

pub struct HttpClient {
    pub keep_alive: bool,
    pub timeout: Duration,
    conn: Option<(String, u16, TcpStream)>,
}

impl HttpClient {
    pub fn new() -> Self {
        HttpClient {
            keep_alive: false,
            timeout: Duration::from_secs(10),
            conn: None,
        }
    }

    pub fn with_keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    fn connect(&mut self, hostname: &str, port: u16) -> Result<&mut TcpStream, HttpError> {
        let reuse = matches!(&self.conn, Some((h, p, _)) if h == hostname && *p == port);
        if !reuse {
            // Synchronous DNS resolution, matching a simple blocking client's
            // contract: no async resolver, one connect attempt.
            let stream = TcpStream::connect((hostname, port)).map_err(HttpError::Io)?;
            stream.set_read_timeout(Some(self.timeout)).ok();
            stream.set_write_timeout(Some(self.timeout)).ok();
            self.conn = Some((hostname.to_string(), port, stream));
        }
        Ok(&mut self.conn.as_mut().expect("just set").2)
    }

    pub fn get(&mut self, url_str: &str) -> Result<HttpResponse, HttpError> {
        let parsed = url::parse(url_str)?;
        if !parsed.scheme.eq_ignore_ascii_case("http") {
            return Err(HttpError::Url(UrlError::InvalidScheme));
        }
        let hostname = strip_ipv6_brackets(parsed.hostname);
        let port = parsed.port;
        let path = parsed.path.to_string();
        let connection_header = if self.keep_alive { "keep-alive" } else { "close" };
        let request = format!(
            "GET {path} HTTP/1.1\r\nUser-Agent: {USER_AGENT}\r\nHost: {}\r\nConnection: {connection_header}\r\n\r\n",
            parsed.host
        );

        let stream = self.connect(&hostname, port)?;
        stream.write_all(request.as_bytes())?;
        let response = read_response(stream)?;

        if !self.keep_alive {
            self.conn = None;
        }
        Ok(response)
    }

    /// Sends a `multipart/form-data` POST with plain text fields and
    /// in-memory file parts.
    pub fn post_multipart(
        &mut self,
        url_str: &str,
        fields: &[(&str, &str)],
        files: &[(&str, &str, &[u8])],
    ) -> Result<HttpResponse, HttpError> {
        let parsed = url::parse(url_str)?;
        if !parsed.scheme.eq_ignore_ascii_case("http") {
            return Err(HttpError::Url(UrlError::InvalidScheme));
        }
        let hostname = strip_ipv6_brackets(parsed.hostname);
        let port = parsed.port;
        let path = parsed.path.to_string();
        let host = parsed.host.to_string();

        let body = build_multipart_body(fields, files);
        let connection_header = if self.keep_alive { "keep-alive" } else { "close" };
        let mut request = format!(
            "POST {path} HTTP/1.1\r\nUser-Agent: {USER_AGENT}\r\nHost: {host}\r\n\
             Content-Type: multipart/form-data; boundary={MULTIPART_BOUNDARY}\r\n\
             Content-Length: {}\r\nConnection: {connection_header}\r\n\r\n",
            body.len()
        )
        .into_bytes();
        request.extend_from_slice(&body);

        let stream = self.connect(&hostname, port)?;
        stream.write_all(&request)?;
        let response = read_response(stream)?;

        if !self.keep_alive {
            self.conn = None;
        }
        Ok(response)
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

fn strip_ipv6_brackets(hostname: &str) -> String {
    hostname.trim_start_matches('[').trim_end_matches(']').to_string()
}

fn build_multipart_body(fields: &[(&str, &str)], files: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes());
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    for (name, filename, content) in files {
        body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n").as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}--\r\n").as_bytes());
    body
}

/// Reads and fully buffers a response: headers via the incremental parser,
/// then exactly `Content-Length` bytes of body (0 if absent). The whole
/// body is read into memory before returning; this client never streams.
fn read_response(stream: &mut TcpStream) -> Result<HttpResponse, HttpError> {
    let mut parser = HttpParser::new(MessageType::Response);
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let mut status_code = 0u16;
    let mut headers = Vec::new();
    let mut pending_header_name: Option<String> = None;
    let mut body_start = 0usize;

    loop {
        loop {
            match parser.parse(&buf)? {
                false => break,
                true => {
                    if parser.state == ParserState::Finished {
                        let content_length = parser.content_length.unwrap_or(0) as usize;
                        let body = buf[body_start..(body_start + content_length).min(buf.len())].to_vec();
                        return Ok(HttpResponse {
                            status_code,
                            headers,
                            body,
                        });
                    }
                    let slice = &buf[parser.token_start..parser.token_start + parser.token_length];
                    match parser.token {
                        Token::StatusCode => status_code = parser.status_code as u16,
                        Token::HeaderName => {
                            pending_header_name = Some(String::from_utf8_lossy(slice).into_owned())
                        }
                        Token::HeaderValue => {
                            if let Some(name) = pending_header_name.take() {
                                headers.push((name, String::from_utf8_lossy(slice).into_owned()));
                            }
                        }
                        Token::HeadersEnd => body_start = parser.consumed(),
                        _ => {}
                    }
                }
            }
        }

        let n = stream.read(&mut chunk).map_err(HttpError::Io)?;
        if n == 0 {
            return Err(HttpError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed before response completed",
            )));
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}
