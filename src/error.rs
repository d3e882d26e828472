//! Error types shared across the crate.
//!
//! Each subsystem gets its own small enum rather than one catch-all error:
//! the URL parser, the HTTP parser, and the connection/server layer fail in
//! different, non-overlapping ways and callers generally only care about one
//! of them at a time.

use std::io;

/// Failures from [`crate::url::parse`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlError {
    #[error("invalid or unsupported scheme")]
    InvalidScheme,
    #[error("missing \"://\" after scheme")]
    InvalidStructure,
    #[error("invalid or empty host")]
    InvalidHost,
    #[error("port out of range 0..=65535")]
    InvalidPort,
    #[error("path contains illegal characters")]
    InvalidPath,
}

/// Failures from the streaming HTTP message parser ([`crate::http::parser`]).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("malformed request or status line")]
    MalformedStartLine,
    #[error("unrecognized or missing HTTP version")]
    InvalidVersion,
    #[error("status code is not a 3-digit number")]
    InvalidStatusCode,
    #[error("header line is malformed")]
    MalformedHeader,
    #[error("Content-Length header is not a valid non-negative integer")]
    InvalidContentLength,
    #[error("cumulative header bytes exceeded the configured limit")]
    HeaderTooLarge,
    #[error("too many headers for the configured limit")]
    TooManyHeaders,
    #[error("header bytes are not valid UTF-8")]
    InvalidUtf8,
}

/// Connection, server and client-level failures: everything downstream of a
/// successful parse.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Url(#[from] UrlError),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("response builder used out of order: {0}")]
    ResponseProtocol(&'static str),

    #[error("operation was cancelled")]
    Cancelled,

    #[error("connection arena is full")]
    ArenaFull,
}

pub type Result<T> = std::result::Result<T, HttpError>;
