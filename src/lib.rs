//! `cinder_http`: a small, single-threaded, readiness-driven HTTP/1.1 stack.
//!
//! Everything runs on one `mio` event loop and one thread: connections are
//! tracked in a flat arena, buffers come from a fixed-capacity pool, and
//! nothing here ever blocks except the standalone [`client`], which is
//! deliberately simple and synchronous.

pub mod buffer_pool;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod file_server;
pub mod http;
pub mod server;
pub mod stream;
pub mod url;

pub use buffer_pool::{BufferHandle, BufferPool};
pub use config::ServerConfig;
pub use error::{HttpError, ParseError, Result, UrlError};
pub use server::HttpServer;
