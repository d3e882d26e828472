//! Per-socket HTTP/1.1 connection state: reads bytes into a request,
//! dispatches it once complete, and drains a response back onto the wire,
//! tracking keep-alive and idle-timeout bookkeeping along the way.

use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use mio::net::TcpStream;
use mio::Token;

use crate::buffer_pool::BufferPool;
use crate::error::ParseError;
use crate::http::{HttpRequest, HttpResponse, ParserLimits};

#[derive(Debug, PartialEq, Eq)]
pub enum ReadPhase {
    /// More bytes are needed before the request is complete.
    Pending,
    /// A full request has been parsed and is ready for dispatch.
    Complete,
    /// The peer closed the connection (clean EOF, or a fatal error).
    ConnectionClosed,
}

#[derive(Debug, PartialEq, Eq)]
pub enum WritePhase {
    /// The socket would block; some response bytes are still queued.
    Pending,
    /// Every queued byte has been written to the socket.
    Flushed,
}

pub struct Connection {
    pub stream: TcpStream,
    pub token: Token,
    request: HttpRequest,
    response: Option<HttpResponse>,
    requests_served: u32,
    max_requests_per_connection: u32,
    last_activity: Instant,
    closing: bool,
}

impl Connection {
    pub fn new(
        stream: TcpStream,
        token: Token,
        max_requests_per_connection: u32,
        parser_limits: ParserLimits,
    ) -> Self {
        Connection {
            stream,
            token,
            request: HttpRequest::with_limits(parser_limits),
            response: None,
            requests_served: 0,
            max_requests_per_connection,
            last_activity: Instant::now(),
            closing: false,
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn is_idle_timed_out(&self, timeout: Duration) -> bool {
        self.last_activity.elapsed() > timeout
    }

    /// Whether this connection should be closed once the in-flight
    /// request/response cycle finishes, either because the client asked
    /// for it or the connection hit its request cap.
    pub fn should_close(&self) -> bool {
        self.closing || self.requests_served >= self.max_requests_per_connection
    }

    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    pub fn has_response(&self) -> bool {
        self.response.is_some()
    }

    pub fn set_response(&mut self, response: HttpResponse) {
        self.response = Some(response);
    }

    /// Reads available bytes from the socket into the request parser,
    /// looping until the kernel buffer is drained, the request completes,
    /// or an error/EOF occurs.
    pub fn read_request(&mut self, pool: &mut BufferPool) -> Result<ReadPhase, ParseError> {
        loop {
            let Some(handle) = pool.acquire() else {
                return Ok(ReadPhase::Pending);
            };
            let read_result = self.stream.read(pool.get_mut(handle));
            let outcome = match read_result {
                Ok(0) => {
                    pool.release(handle);
                    return Ok(ReadPhase::ConnectionClosed);
                }
                Ok(n) => {
                    pool.set_len(handle, n);
                    let data = pool.get(handle).to_vec();
                    pool.release(handle);
                    self.touch();
                    self.request.feed(&data)?
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    pool.release(handle);
                    return Ok(ReadPhase::Pending);
                }
                Err(_) => {
                    pool.release(handle);
                    return Ok(ReadPhase::ConnectionClosed);
                }
            };
            if outcome {
                return Ok(ReadPhase::Complete);
            }
        }
    }

    /// Writes as much of the pending response as the socket currently
    /// accepts.
    pub fn flush_response(&mut self) -> io::Result<WritePhase> {
        let Some(response) = self.response.as_mut() else {
            return Ok(WritePhase::Flushed);
        };
        loop {
            let pending = response.output();
            if pending.is_empty() {
                return Ok(WritePhase::Flushed);
            }
            match self.stream.write(pending) {
                Ok(0) => return Ok(WritePhase::Pending),
                Ok(n) => response.consume(n),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(WritePhase::Pending),
                Err(e) => return Err(e),
            }
        }
    }

    /// Call once the response has been fully flushed. Resets the request
    /// for the next message on this connection (handling a pipelined
    /// follow-up request already sitting in the buffer) and returns
    /// whether the connection has a pipelined request ready to dispatch
    /// immediately, without waiting on socket readability.
    ///
    /// Must be called, and `should_close` re-checked, *after* this returns:
    /// this is where `requests_served` advances and where the request's
    /// `Connection` header and the response's own override are folded into
    /// `closing`, so any close decision made before this call is stale.
    pub fn complete_cycle(&mut self) -> bool {
        self.requests_served += 1;

        let request_wants_close = self
            .request
            .header("connection")
            .map(|v| v.eq_ignore_ascii_case("close"))
            .unwrap_or(false);
        let response_forced_close = self
            .response
            .as_ref()
            .map(|r| r.keep_alive_forced_off())
            .unwrap_or(false);
        if request_wants_close || response_forced_close {
            self.closing = true;
        }

        let has_pipelined = self.request.has_trailing_data();
        self.request.reset_for_next();
        self.response = None;
        has_pipelined && !self.should_close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener as StdListener;

    fn connected_pair() -> (TcpStream, std::net::TcpStream) {
        let listener = StdListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = std::net::TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();
        server.set_nonblocking(true).unwrap();
        (TcpStream::from_std(server), client)
    }

    #[test]
    fn reads_request_across_two_writes() {
        let (server_stream, mut client) = connected_pair();
        let mut conn = Connection::new(server_stream, Token(0), 100, ParserLimits::default());
        let mut pool = BufferPool::new(4, 256);

        client.write_all(b"GET /x HTTP/1.1\r\nHost: ").unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(conn.read_request(&mut pool).unwrap(), ReadPhase::Pending);

        client.write_all(b"h\r\n\r\n").unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(conn.read_request(&mut pool).unwrap(), ReadPhase::Complete);
        assert_eq!(conn.request().url(), "/x");
    }

    #[test]
    fn closes_after_max_requests() {
        let (server_stream, _client) = connected_pair();
        let mut conn = Connection::new(server_stream, Token(0), 1, ParserLimits::default());
        assert!(!conn.should_close());
        conn.complete_cycle();
        assert!(conn.should_close());
    }
}
