//! Streaming, allocation-free HTTP/1.1 message parser.
//!
//! The parser never owns or copies its input: [`HttpParser::parse`] is
//! handed the full span of bytes received for the current message so far
//! (headers buffer, request body buffer, ...) and reports tokens as
//! `(start, length)` offsets into that same span. Callers re-invoke `parse`
//! as more bytes arrive; the parser resumes scanning from where it left
//! off, so the exact chunking of reads never changes the token sequence
//! produced.

use crate::error::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Request,
    Response,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    /// Waiting for enough bytes to complete the next token.
    Parsing,
    /// A token was just produced; inspect `token`/`token_start`/`token_length`.
    Result,
    /// The message (headers, or headers+body) is fully parsed.
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Method,
    Url,
    Version,
    StatusCode,
    StatusString,
    HeaderName,
    HeaderValue,
    HeadersEnd,
    Body,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Unknown,
}

impl Method {
    fn from_bytes(b: &[u8]) -> Method {
        match b {
            b"GET" => Method::Get,
            b"POST" => Method::Post,
            b"PUT" => Method::Put,
            b"DELETE" => Method::Delete,
            b"HEAD" => Method::Head,
            _ => Method::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubPhase {
    ReqMethod,
    ReqUrl,
    ReqVersion,
    ResVersion,
    ResStatusCode,
    ResStatusString,
    HeaderNameOrEnd,
    HeaderValue,
    Body,
    Done,
}

/// Parser limits; exceeding any of these turns a would-be `Parsing` wait
/// into a hard error rather than growing the caller's buffer forever.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_header_bytes: usize,
    pub max_headers: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_header_bytes: 8 * 1024,
            max_headers: 100,
        }
    }
}

pub struct HttpParser {
    pub state: ParserState,
    pub token: Token,
    pub token_start: usize,
    pub token_length: usize,
    pub method: Method,
    pub status_code: u32,
    pub content_length: Option<u64>,

    message_type: MessageType,
    sub_phase: SubPhase,
    cursor: usize,
    headers_seen: usize,
    body_target: Option<u64>,
    body_consumed: u64,
    last_header_was_content_length: bool,
    limits: Limits,
}

fn find(buf: &[u8], from: usize, needle: u8) -> Option<usize> {
    buf[from..].iter().position(|&b| b == needle).map(|p| p + from)
}

fn find_crlf(buf: &[u8], from: usize) -> Option<usize> {
    let mut i = from;
    while i + 1 < buf.len() {
        if buf[i] == b'\r' && buf[i + 1] == b'\n' {
            return Some(i);
        }
        i += 1;
    }
    None
}

impl HttpParser {
    pub fn new(message_type: MessageType) -> Self {
        Self::with_limits(message_type, Limits::default())
    }

    pub fn with_limits(message_type: MessageType, limits: Limits) -> Self {
        let sub_phase = match message_type {
            MessageType::Request => SubPhase::ReqMethod,
            MessageType::Response => SubPhase::ResVersion,
        };
        HttpParser {
            state: ParserState::Parsing,
            token: Token::Method,
            token_start: 0,
            token_length: 0,
            method: Method::Unknown,
            status_code: 0,
            content_length: None,
            message_type,
            sub_phase,
            cursor: 0,
            headers_seen: 0,
            body_target: None,
            body_consumed: 0,
            last_header_was_content_length: false,
            limits,
        }
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    /// How many bytes of the buffer passed to `parse` have been consumed so
    /// far. Bytes at and after this offset belong to whatever comes next
    /// (the body, or — once `Finished` — a pipelined following message).
    pub fn consumed(&self) -> usize {
        self.cursor
    }

    /// Advances the parser against `buf`, the full span of bytes received
    /// for this message so far. Returns `Ok(true)` if a new token (or the
    /// `Finished` state) was produced — inspect `state`/`token` — or
    /// `Ok(false)` if `buf` doesn't yet contain enough bytes and the caller
    /// should wait for more data before calling again.
    pub fn parse(&mut self, buf: &[u8]) -> Result<bool, ParseError> {
        if self.state == ParserState::Finished {
            return Ok(false);
        }
        if self.cursor > self.limits.max_header_bytes && self.sub_phase != SubPhase::Body {
            return Err(ParseError::HeaderTooLarge);
        }

        match self.sub_phase {
            SubPhase::ReqMethod => self.parse_space_delimited(buf, Token::Method),
            SubPhase::ReqUrl => self.parse_space_delimited(buf, Token::Url),
            SubPhase::ReqVersion => self.parse_line_delimited(buf, Token::Version),
            SubPhase::ResVersion => self.parse_space_delimited(buf, Token::Version),
            SubPhase::ResStatusCode => self.parse_space_delimited(buf, Token::StatusCode),
            SubPhase::ResStatusString => self.parse_line_delimited(buf, Token::StatusString),
            SubPhase::HeaderNameOrEnd => self.parse_header_name_or_end(buf),
            SubPhase::HeaderValue => self.parse_header_value(buf),
            SubPhase::Body => self.parse_body(buf),
            SubPhase::Done => {
                self.state = ParserState::Finished;
                Ok(true)
            }
        }
    }

    fn emit(&mut self, token: Token, start: usize, length: usize) {
        self.token = token;
        self.token_start = start;
        self.token_length = length;
        self.state = ParserState::Result;
    }

    fn parse_space_delimited(&mut self, buf: &[u8], token: Token) -> Result<bool, ParseError> {
        let Some(space) = find(buf, self.cursor, b' ') else {
            return Ok(false);
        };
        let start = self.cursor;
        let length = space - start;
        if length == 0 {
            return Err(ParseError::MalformedStartLine);
        }

        if token == Token::Method {
            self.method = Method::from_bytes(&buf[start..start + length]);
        }
        if token == Token::StatusCode {
            let text = std::str::from_utf8(&buf[start..start + length]).map_err(|_| ParseError::InvalidUtf8)?;
            self.status_code = text.parse().map_err(|_| ParseError::InvalidStatusCode)?;
        }

        self.cursor = space + 1;
        self.sub_phase = match (self.message_type, token) {
            (MessageType::Request, Token::Method) => SubPhase::ReqUrl,
            (MessageType::Request, Token::Url) => SubPhase::ReqVersion,
            (MessageType::Response, Token::Version) => SubPhase::ResStatusCode,
            (MessageType::Response, Token::StatusCode) => SubPhase::ResStatusString,
            _ => unreachable!("space-delimited token in unexpected phase"),
        };
        self.emit(token, start, length);
        Ok(true)
    }

    fn parse_line_delimited(&mut self, buf: &[u8], token: Token) -> Result<bool, ParseError> {
        let Some(crlf) = find_crlf(buf, self.cursor) else {
            return Ok(false);
        };
        let start = self.cursor;
        let length = crlf - start;

        if token == Token::Version && !matches!(&buf[start..start + length], b"HTTP/1.0" | b"HTTP/1.1") {
            return Err(ParseError::InvalidVersion);
        }

        self.cursor = crlf + 2;
        self.sub_phase = match (self.message_type, token) {
            (MessageType::Request, Token::Version) => SubPhase::HeaderNameOrEnd,
            (MessageType::Response, Token::StatusString) => SubPhase::HeaderNameOrEnd,
            _ => unreachable!("line-delimited token in unexpected phase"),
        };
        self.emit(token, start, length);
        Ok(true)
    }

    fn parse_header_name_or_end(&mut self, buf: &[u8]) -> Result<bool, ParseError> {
        // Blank line (bare CRLF) terminates the header block.
        if buf.len() >= self.cursor + 2 && &buf[self.cursor..self.cursor + 2] == b"\r\n" {
            self.cursor += 2;
            self.sub_phase = match self.content_length {
                Some(0) | None => SubPhase::Done,
                Some(_) => SubPhase::Body,
            };
            if self.sub_phase == SubPhase::Body {
                self.body_target = self.content_length;
            }
            self.emit(Token::HeadersEnd, self.cursor - 2, 0);
            return Ok(true);
        }

        if self.headers_seen >= self.limits.max_headers {
            return Err(ParseError::TooManyHeaders);
        }

        let Some(colon) = find(buf, self.cursor, b':') else {
            return Ok(false);
        };
        let start = self.cursor;
        let mut length = colon - start;
        if length == 0 {
            return Err(ParseError::MalformedHeader);
        }
        // Trim trailing OWS before the colon, if any (not strictly legal HTTP
        // but tolerated defensively).
        while length > 0 && buf[start + length - 1] == b' ' {
            length -= 1;
        }

        self.last_header_was_content_length =
            buf[start..start + length].eq_ignore_ascii_case(b"content-length");

        self.cursor = colon + 1;
        self.headers_seen += 1;
        self.sub_phase = SubPhase::HeaderValue;
        self.emit(Token::HeaderName, start, length);
        Ok(true)
    }

    fn parse_header_value(&mut self, buf: &[u8]) -> Result<bool, ParseError> {
        let Some(crlf) = find_crlf(buf, self.cursor) else {
            return Ok(false);
        };
        let mut start = self.cursor;
        while start < crlf && buf[start] == b' ' {
            start += 1;
        }
        let mut end = crlf;
        while end > start && buf[end - 1] == b' ' {
            end -= 1;
        }
        let length = end - start;

        if self.last_header_was_content_length {
            let text = std::str::from_utf8(&buf[start..end]).map_err(|_| ParseError::InvalidUtf8)?;
            let value: u64 = text.trim().parse().map_err(|_| ParseError::InvalidContentLength)?;
            self.content_length = Some(value);
        }

        self.cursor = crlf + 2;
        self.sub_phase = SubPhase::HeaderNameOrEnd;
        self.emit(Token::HeaderValue, start, length);
        Ok(true)
    }

    fn parse_body(&mut self, buf: &[u8]) -> Result<bool, ParseError> {
        let target = self.body_target.unwrap_or(0);
        let remaining = target - self.body_consumed;
        if remaining == 0 {
            self.sub_phase = SubPhase::Done;
            self.emit(Token::Body, self.cursor, 0);
            return Ok(true);
        }
        let available = (buf.len() - self.cursor) as u64;
        if available == 0 {
            return Ok(false);
        }
        let take = available.min(remaining) as usize;
        let start = self.cursor;
        self.cursor += take;
        self.body_consumed += take as u64;
        if self.body_consumed == target {
            self.sub_phase = SubPhase::Done;
        }
        self.emit(Token::Body, start, take);
        Ok(true)
    }
}
