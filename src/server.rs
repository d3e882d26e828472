//! Single-threaded, `mio`-driven HTTP/1.1 server: one readiness-based event
//! loop, a flat connection arena keyed by `mio::Token`, and admission
//! control that pauses accepting new sockets once the arena is full rather
//! than letting it grow unbounded.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::time::Duration;

use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token};
use tracing::{debug, info, warn};

use crate::buffer_pool::BufferPool;
use crate::config::{RouteConfig, ServerConfig};
use crate::connection::{Connection, ReadPhase, WritePhase};
use crate::file_server::{mime_type_for, format_http_date, FileServeError, FileServer};
use crate::http::{error_response, HttpRequest, HttpResponse, Method, ParserLimits};

const LISTENER_TOKEN: Token = Token(usize::MAX);
const SERVER_NAME: &str = "SC";

pub struct HttpServer {
    listener: TcpListener,
    poll: Poll,
    config: ServerConfig,
    connections: HashMap<Token, Connection>,
    pool: BufferPool,
    next_token: usize,
    accept_paused: bool,
}

impl HttpServer {
    pub fn bind(config: ServerConfig) -> io::Result<Self> {
        let addr = format!("{}:{}", config.bind_address, config.port).parse().map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("invalid bind address: {e}"))
        })?;
        let mut listener = TcpListener::bind(addr)?;
        let poll = Poll::new()?;
        poll.registry().register(&mut listener, LISTENER_TOKEN, Interest::READABLE)?;

        let pool = BufferPool::new(config.max_connections * 2, config.read_buffer_size);
        info!(address = %addr, "listening");

        Ok(HttpServer {
            listener,
            poll,
            config,
            connections: HashMap::new(),
            pool,
            next_token: 0,
            accept_paused: false,
        })
    }

    pub fn local_addr(&self) -> io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    fn next_token(&mut self) -> Token {
        let token = Token(self.next_token);
        self.next_token = self.next_token.wrapping_add(1);
        token
    }

    /// Runs the event loop forever. Returns only on a fatal I/O error.
    pub fn run(&mut self) -> io::Result<()> {
        let mut events = Events::with_capacity(1024);
        loop {
            self.poll.poll(&mut events, Some(Duration::from_secs(1)))?;
            for event in events.iter() {
                if event.token() == LISTENER_TOKEN {
                    self.accept_loop()?;
                    continue;
                }
                self.handle_connection_event(event.token())?;
            }
            self.sweep_idle_connections();
        }
    }

    fn accept_loop(&mut self) -> io::Result<()> {
        loop {
            if self.connections.len() >= self.config.max_connections {
                if !self.accept_paused {
                    warn!(count = self.connections.len(), "connection arena full, pausing accept");
                    self.poll.registry().deregister(&mut self.listener)?;
                    self.accept_paused = true;
                }
                return Ok(());
            }
            match self.listener.accept() {
                Ok((mut stream, addr)) => {
                    let token = self.next_token();
                    self.poll
                        .registry()
                        .register(&mut stream, token, Interest::READABLE)?;
                    debug!(%addr, ?token, "accepted connection");
                    let parser_limits = ParserLimits {
                        max_header_bytes: self.config.max_header_bytes,
                        ..ParserLimits::default()
                    };
                    self.connections.insert(
                        token,
                        Connection::new(stream, token, self.config.max_requests_per_connection, parser_limits),
                    );
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }

    fn resume_accept_if_paused(&mut self) -> io::Result<()> {
        if self.accept_paused && self.connections.len() < self.config.max_connections {
            self.poll
                .registry()
                .register(&mut self.listener, LISTENER_TOKEN, Interest::READABLE)?;
            self.accept_paused = false;
        }
        Ok(())
    }

    fn handle_connection_event(&mut self, token: Token) -> io::Result<()> {
        loop {
            let Some(conn) = self.connections.get_mut(&token) else {
                return Ok(());
            };

            if !conn.has_response() {
                match conn.read_request(&mut self.pool) {
                    Ok(ReadPhase::Pending) => return Ok(()),
                    Ok(ReadPhase::ConnectionClosed) => {
                        self.close_connection(token)?;
                        return Ok(());
                    }
                    Ok(ReadPhase::Complete) => {
                        let response = dispatch(&self.config, conn.request());
                        conn.set_response(response);
                    }
                    Err(_) => {
                        conn.set_response(error_response(400, false));
                    }
                }
            }

            let conn = self.connections.get_mut(&token).expect("just looked up");
            match conn.flush_response()? {
                WritePhase::Pending => return Ok(()),
                WritePhase::Flushed => {
                    let has_pipelined = conn.complete_cycle();
                    if conn.should_close() {
                        self.close_connection(token)?;
                        return Ok(());
                    }
                    if has_pipelined {
                        continue;
                    }
                    return Ok(());
                }
            }
        }
    }

    fn close_connection(&mut self, token: Token) -> io::Result<()> {
        if let Some(mut conn) = self.connections.remove(&token) {
            let _ = self.poll.registry().deregister(&mut conn.stream);
            let _ = conn.stream.shutdown(std::net::Shutdown::Both);
        }
        self.resume_accept_if_paused()
    }

    fn sweep_idle_connections(&mut self) {
        let timeout = Duration::from_secs(self.config.connection_timeout_secs);
        let stale: Vec<Token> = self
            .connections
            .iter()
            .filter(|(_, c)| c.is_idle_timed_out(timeout))
            .map(|(t, _)| *t)
            .collect();
        for token in stale {
            debug!(?token, "closing idle connection");
            let _ = self.close_connection(token);
        }
    }
}

/// Routes a completed request to a response, stateless aside from config,
/// so it's trivially testable without a real socket.
pub fn dispatch(config: &ServerConfig, request: &HttpRequest) -> HttpResponse {
    if request.method() != Method::Get {
        return error_response(405, true);
    }

    let full_path = request.url();
    let pathname = full_path.split('?').next().unwrap_or("/");

    let Some(route) = config.find_route(pathname) else {
        return error_response(404, true);
    };

    let relative = pathname.strip_prefix(route.path.as_str()).unwrap_or(pathname);
    let relative = if relative.is_empty() { "/" } else { relative };

    serve_static(route, relative, pathname)
}

fn serve_static(route: &RouteConfig, relative_path: &str, request_path: &str) -> HttpResponse {
    let file_server = FileServer::new(route);
    match file_server.resolve(relative_path) {
        Ok(resolved) if resolved.is_directory => match file_server.generate_autoindex(&resolved.path, request_path) {
            Ok(html) => {
                let mut res = HttpResponse::new();
                res.start_response(200).expect("fresh response");
                res.add_header("Content-Type", "text/html; charset=utf-8").expect("headers open");
                res.add_header("Date", &format_http_date(std::time::SystemTime::now())).expect("headers open");
                res.add_header("Server", SERVER_NAME).expect("headers open");
                res.add_header("Connection", "Closed").expect("headers open");
                res.end(html.as_bytes()).expect("fresh response can always end");
                res
            }
            Err(_) => error_response(500, true),
        },
        Ok(resolved) => match fs::read(&resolved.path) {
            Ok(body) => {
                let mut res = HttpResponse::new();
                res.start_response(200).expect("fresh response");
                res.add_header("Content-Type", mime_type_for(&resolved.path)).expect("headers open");
                res.add_header("Date", &format_http_date(std::time::SystemTime::now())).expect("headers open");
                if let Ok(metadata) = fs::metadata(&resolved.path) {
                    if let Ok(modified) = metadata.modified() {
                        res.add_header("Last-Modified", &format_http_date(modified)).expect("headers open");
                    }
                }
                res.add_header("Server", SERVER_NAME).expect("headers open");
                res.add_header("Connection", "Closed").expect("headers open");
                res.end(&body).expect("fresh response can always end");
                res
            }
            Err(_) => error_response(404, true),
        },
        Err(FileServeError::Traversal) | Err(FileServeError::Forbidden) => error_response(403, true),
        Err(FileServeError::NotFound) => error_response(404, true),
    }
}
