//! Connection Handler Module
//!
//! This module handles individual client connections. Each connection gets
//! its own task, reads one request, and hands the stream to a worker.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects (TCP handshake)
//!        │
//!        ▼
//! 2. Task spawned, ConnectionHandler created
//!        │
//!        ▼
//! 3. Read bytes until the request is complete
//!    (bounded by MAX_REQUEST_SIZE)
//!        │
//!        ▼
//! 4. Tokenize + classify
//!        │
//!        ├── rejected ──> error status, close
//!        │
//!        ▼
//! 5. Worker owns the stream: serve, respond, close
//!        │
//!        ▼
//! 6. Task ends
//! ```
//!
//! There is no keep-alive: one request per connection.

use crate::connection::classify::{classify, Route};
use crate::error::FrontError;
use crate::protocol::{Request, MAX_REQUEST_SIZE};
use crate::worker::{Dispatcher, Served};
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tracing::{debug, info, trace, warn};

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Files served successfully
    pub files_served: AtomicU64,
    /// Key-value exchanges completed
    pub kv_exchanges: AtomicU64,
    /// Requests that ended with an error status
    pub errors_reported: AtomicU64,
    /// Total request bytes read
    pub bytes_read: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Records how a request ended.
    pub fn record(&self, result: &Result<Served, FrontError>) {
        let counter = match result {
            Ok(Served::File { .. }) => &self.files_served,
            Ok(Served::Kv(_)) => &self.kv_exchanges,
            Err(_) => &self.errors_reported,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Handles a single client connection.
pub struct ConnectionHandler<S> {
    /// The client stream; moved into the worker once the request is read
    stream: S,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Buffer for the incoming request
    buffer: BytesMut,

    /// Routes requests to workers (shared)
    dispatcher: Dispatcher,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, addr: SocketAddr, dispatcher: Dispatcher, stats: Arc<ConnectionStats>) -> Self {
        stats.connection_opened();

        Self {
            stream,
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            dispatcher,
            stats,
        }
    }

    /// Reads one request, runs its worker, and closes the connection.
    ///
    /// Returns `None` if the client disconnected without sending anything.
    pub async fn run(mut self) -> Option<Result<Served, FrontError>> {
        debug!(client = %self.addr, "Client connected");

        let route = match self.read_request().await {
            Ok(Some(request)) => {
                info!(client = %self.addr, verb = request.verb().as_str(), resource = ?request.target(), "Request");
                classify(request)
            }
            Ok(None) => {
                debug!(client = %self.addr, "Client disconnected before sending a request");
                self.stats.connection_closed();
                return None;
            }
            Err(e) => {
                warn!(client = %self.addr, error = %e, "Unreadable request");
                Route::Reject(e)
            }
        };

        let addr = self.addr;
        let stats = Arc::clone(&self.stats);
        let result = self.dispatcher.dispatch(self.stream, route).await;

        match &result {
            Ok(served) => debug!(client = %addr, ?served, "Request served"),
            Err(e) => debug!(
                client = %addr,
                status = %e.status(),
                class = ?e.class(),
                error = %e,
                "Request failed"
            ),
        }

        stats.record(&result);
        stats.connection_closed();
        Some(result)
    }

    /// Reads until the buffer holds a complete request.
    async fn read_request(&mut self) -> Result<Option<Request>, FrontError> {
        loop {
            if !self.buffer.is_empty() {
                if let Some(request) = Request::parse(&self.buffer)? {
                    return Ok(Some(request));
                }
            }

            // One byte past the limit lets the tokenizer report the overflow.
            let room = MAX_REQUEST_SIZE + 1 - self.buffer.len();
            let mut limited = (&mut self.stream).take(room as u64);
            let n = limited
                .read_buf(&mut self.buffer)
                .await
                .map_err(FrontError::io("read request"))?;

            if n == 0 {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                return Request::parse_at_eof(&self.buffer).map(Some).map_err(Into::into);
            }

            self.stats.bytes_read(n);
            trace!(client = %self.addr, bytes = n, buffered = self.buffer.len(), "Read data");
        }
    }
}

/// Handles a client connection.
///
/// This is a convenience function that creates a ConnectionHandler
/// and runs it to completion.
pub async fn handle_connection<S>(stream: S, addr: SocketAddr, dispatcher: Dispatcher, stats: Arc<ConnectionStats>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let handler = ConnectionHandler::new(stream, addr, dispatcher, stats);
    handler.run().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::FakeBackend;
    use crate::backend::{BackendClient, BackendConfig};
    use crate::connection::listener::accept_loop;
    use crate::worker::FileServer;
    use std::path::Path;
    use tokio::io::AsyncWriteExt;
    use tokio::net::{TcpListener, TcpStream};

    struct TestServer {
        addr: SocketAddr,
        stats: Arc<ConnectionStats>,
        _backend: FakeBackend,
        _dir: tempfile::TempDir,
    }

    async fn create_test_server() -> TestServer {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("www");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(root.join("index.html"), b"hello world").unwrap();

        let backend = FakeBackend::spawn(dir.path());
        let dispatcher = Dispatcher::new(
            FileServer::new(&root),
            BackendClient::new(BackendConfig::new(backend.path())),
        );
        let stats = Arc::new(ConnectionStats::new());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(accept_loop(listener, dispatcher, Arc::clone(&stats)));

        TestServer {
            addr,
            stats,
            _backend: backend,
            _dir: dir,
        }
    }

    async fn send(addr: SocketAddr, request: &[u8]) -> Vec<u8> {
        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(request).await.unwrap();
        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        response
    }

    fn split_response(response: &[u8]) -> (String, Vec<u8>) {
        let end = response
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .expect("response head is terminated")
            + 4;
        (
            String::from_utf8(response[..end].to_vec()).unwrap(),
            response[end..].to_vec(),
        )
    }

    fn put(key: &str, value: &str) -> Vec<u8> {
        format!(
            "PUT /kv/{} HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\n\r\n{}",
            key,
            value.len(),
            value
        )
        .into_bytes()
    }

    fn get(target: &str) -> Vec<u8> {
        format!("GET /{} HTTP/1.1\r\nHost: localhost\r\n\r\n", target).into_bytes()
    }

    #[tokio::test]
    async fn test_get_file() {
        let server = create_test_server().await;

        let response = send(server.addr, &get("index.html")).await;
        let (head, body) = split_response(&response);
        assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(head.contains("Content-Length: 11\r\n"));
        assert_eq!(body, b"hello world");
    }

    #[tokio::test]
    async fn test_head_file_has_no_body() {
        let server = create_test_server().await;

        let response = send(server.addr, b"HEAD /index.html HTTP/1.1\r\n\r\n").await;
        let (head, body) = split_response(&response);
        assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(head.contains("Content-Length: 11\r\n"));
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_missing_file() {
        let server = create_test_server().await;

        let response = send(server.addr, &get("nope.html")).await;
        assert!(response.starts_with(b"HTTP/1.1 404 Not Found\r\n"));

        let response = send(server.addr, b"HEAD /nope.html HTTP/1.1\r\n\r\n").await;
        assert!(response.starts_with(b"HTTP/1.1 404 Not Found\r\n"));
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let server = create_test_server().await;

        let response = send(server.addr, &put("color", "blue")).await;
        assert_eq!(response, b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n");

        let response = send(server.addr, &get("kv/color")).await;
        let (head, body) = split_response(&response);
        assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(head.contains("Content-Length: 4\r\n"));
        assert_eq!(body, b"blue");
    }

    #[tokio::test]
    async fn test_missing_key_then_put() {
        let server = create_test_server().await;

        let response = send(server.addr, &get("kv/shape")).await;
        let (head, body) = split_response(&response);
        assert!(head.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert_eq!(body, b"Key shape does not exist.\n");

        send(server.addr, &put("shape", "circle")).await;

        let response = send(server.addr, &get("kv/shape")).await;
        let (head, body) = split_response(&response);
        assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
        assert_eq!(body, b"circle");
    }

    #[tokio::test]
    async fn test_policy_rejections() {
        let server = create_test_server().await;

        let response = send(
            server.addr,
            b"PUT /index.html HTTP/1.1\r\nContent-Length: 1\r\n\r\nx",
        )
        .await;
        assert!(response.starts_with(b"HTTP/1.1 403 Forbidden\r\n"));

        let response = send(server.addr, b"HEAD /kv/color HTTP/1.1\r\n\r\n").await;
        assert!(response.starts_with(b"HTTP/1.1 400 Bad Request\r\n"));

        let response = send(server.addr, b"DELETE /kv/color HTTP/1.1\r\n\r\n").await;
        assert!(response.starts_with(b"HTTP/1.1 501 Not Implemented\r\n"));

        let response = send(server.addr, b"GET /index.html\r\n\r\n").await;
        assert!(response.starts_with(b"HTTP/1.1 500 Internal Server Error\r\n"));
    }

    #[tokio::test]
    async fn test_put_split_across_writes() {
        let server = create_test_server().await;

        let mut client = TcpStream::connect(server.addr).await.unwrap();
        client
            .write_all(b"PUT /kv/split HTTP/1.1\r\nContent-Length: 10\r\n\r\n01234")
            .await
            .unwrap();
        tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
        client.write_all(b"56789").await.unwrap();

        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        assert!(response.starts_with(b"HTTP/1.1 200 OK\r\n"));

        let response = send(server.addr, &get("kv/split")).await;
        let (_, body) = split_response(&response);
        assert_eq!(body, b"0123456789");
    }

    #[tokio::test]
    async fn test_truncated_put_is_bad_request() {
        let server = create_test_server().await;

        let mut client = TcpStream::connect(server.addr).await.unwrap();
        client
            .write_all(b"PUT /kv/short HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc")
            .await
            .unwrap();
        client.shutdown().await.unwrap();

        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        assert!(response.starts_with(b"HTTP/1.1 400 Bad Request\r\n"));
    }

    #[tokio::test]
    async fn test_concurrent_clients_get_their_own_values() {
        let server = create_test_server().await;

        for i in 0..10 {
            send(server.addr, &put(&format!("k{}", i), &format!("v{}", i))).await;
        }

        let mut tasks = Vec::new();
        for i in 0..10 {
            let addr = server.addr;
            tasks.push(tokio::spawn(async move {
                let response = send(addr, &get(&format!("kv/k{}", i))).await;
                (i, response)
            }));
        }

        for task in tasks {
            let (i, response) = task.await.unwrap();
            let (head, body) = split_response(&response);
            assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
            assert_eq!(body, format!("v{}", i).as_bytes());
        }
    }

    #[tokio::test]
    async fn test_connection_stats() {
        let server = create_test_server().await;

        send(server.addr, &get("index.html")).await;
        send(server.addr, &put("x", "1")).await;
        send(server.addr, &get("missing.txt")).await;

        // Give the tasks time to record their outcome
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        let stats = &server.stats;
        assert_eq!(stats.connections_accepted.load(Ordering::Relaxed), 3);
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
        assert_eq!(stats.files_served.load(Ordering::Relaxed), 1);
        assert_eq!(stats.kv_exchanges.load(Ordering::Relaxed), 1);
        assert_eq!(stats.errors_reported.load(Ordering::Relaxed), 1);
        assert!(stats.bytes_read.load(Ordering::Relaxed) > 0);
    }

    #[tokio::test]
    async fn test_disconnect_without_request() {
        let server = create_test_server().await;

        let client = TcpStream::connect(server.addr).await.unwrap();
        drop(client);
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        assert_eq!(server.stats.connections_accepted.load(Ordering::Relaxed), 1);
        assert_eq!(server.stats.active_connections.load(Ordering::Relaxed), 0);
        assert_eq!(server.stats.errors_reported.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_handler_on_mock_stream() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Dispatcher::new(
            FileServer::new(dir.path()),
            BackendClient::new(BackendConfig::new(Path::new("/nonexistent/kv.sock"))),
        );
        let stream = tokio_test::io::Builder::new()
            .read(b"OPTIONS * HTTP/1.1\r\n\r\n")
            .write(b"HTTP/1.1 501 Not Implemented\r\nContent-Length: 0\r\n\r\n")
            .build();
        let addr: SocketAddr = "127.0.0.1:9".parse().unwrap();

        let result = ConnectionHandler::new(stream, addr, dispatcher, Arc::new(ConnectionStats::new()))
            .run()
            .await
            .unwrap();
        assert!(matches!(result, Err(FrontError::NotImplemented(ref verb)) if verb == "OPTIONS"));
    }
}
