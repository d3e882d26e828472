//! End-to-end tests that spin up a real `HttpServer` on an ephemeral port
//! and talk to it over a real TCP socket.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::thread;
use std::time::Duration;

use cinder_http::config::RouteConfig;
use cinder_http::{HttpServer, ServerConfig};

fn spawn_server(config: ServerConfig) -> std::net::SocketAddr {
    let mut server = HttpServer::bind(config).expect("bind");
    let addr = server.local_addr().expect("local addr");
    thread::spawn(move || {
        let _ = server.run();
    });
    // Give the event loop thread a moment to reach poll().
    thread::sleep(Duration::from_millis(50));
    addr
}

fn raw_request(addr: std::net::SocketAddr, request: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).expect("connect");
    stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    stream.write_all(request).unwrap();
    stream.shutdown(std::net::Shutdown::Write).ok();
    let mut out = Vec::new();
    stream.read_to_end(&mut out).ok();
    out
}

fn config_with_root(dir: &std::path::Path) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.bind_address = "127.0.0.1".to_string();
    config.port = 0;
    config.routes = vec![RouteConfig {
        path: "/".to_string(),
        root: dir.to_path_buf(),
        index: "index.html".to_string(),
        autoindex: true,
    }];
    config
}

#[test]
fn serves_a_static_file_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("greeting.txt"), b"hello from disk").unwrap();

    let addr = spawn_server(config_with_root(dir.path()));
    let response = raw_request(addr, b"GET /greeting.txt HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n");
    let text = String::from_utf8_lossy(&response);

    assert!(text.starts_with("HTTP/1.1 200 OK"), "{text}");
    assert!(text.contains("Content-Type: text/plain"));
    assert!(text.ends_with("hello from disk"));
}

#[test]
fn rejects_directory_traversal() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("secret.txt"), b"nope").unwrap();

    let addr = spawn_server(config_with_root(dir.path()));
    let response = raw_request(
        addr,
        b"GET /../secret.txt HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n",
    );
    let text = String::from_utf8_lossy(&response);
    assert!(text.starts_with("HTTP/1.1 403"), "{text}");
}

#[test]
fn missing_file_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let addr = spawn_server(config_with_root(dir.path()));
    let response = raw_request(addr, b"GET /does-not-exist HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n");
    let text = String::from_utf8_lossy(&response);
    assert!(text.starts_with("HTTP/1.1 404"), "{text}");
}

#[test]
fn non_get_method_is_405() {
    let dir = tempfile::tempdir().unwrap();
    let addr = spawn_server(config_with_root(dir.path()));
    let response = raw_request(
        addr,
        b"DELETE /x HTTP/1.1\r\nHost: x\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
    );
    let text = String::from_utf8_lossy(&response);
    assert!(text.starts_with("HTTP/1.1 405"), "{text}");
}

#[test]
fn keep_alive_serves_two_requests_on_one_connection() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), b"AAA").unwrap();
    std::fs::write(dir.path().join("b.txt"), b"BBB").unwrap();
    let addr = spawn_server(config_with_root(dir.path()));

    let mut stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    stream.write_all(b"GET /a.txt HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();

    // Read exactly the first response (Content-Length-based framing), then
    // issue a second request on the same socket.
    let mut buf = [0u8; 1024];
    let n = stream.read(&mut buf).unwrap();
    let first = String::from_utf8_lossy(&buf[..n]).into_owned();
    assert!(first.contains("AAA"));

    stream.write_all(b"GET /b.txt HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n").unwrap();
    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).unwrap();
    let second = String::from_utf8_lossy(&rest);
    assert!(second.contains("BBB"), "{second}");
}

#[test]
fn directory_without_index_but_autoindex_lists_entries() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("sub")).unwrap();
    std::fs::write(dir.path().join("sub").join("file.txt"), b"x").unwrap();

    let addr = spawn_server(config_with_root(dir.path()));
    let response = raw_request(addr, b"GET /sub/ HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n");
    let text = String::from_utf8_lossy(&response);
    assert!(text.starts_with("HTTP/1.1 200"), "{text}");
    assert!(text.contains("file.txt"));
}
