//! Backend Datagram Client
//!
//! The key-value backend listens on a single Unix datagram socket. It has no
//! way to tell which `get`/`set` datagrams belong together except by arrival
//! order, and it answers a `get` by sending to whatever address the key came
//! from. Two exchanges must therefore never overlap.
//!
//! ## Serialization
//!
//! ```text
//!   KV worker A ──┐
//!   KV worker B ──┼──> BackendClient::acquire() ──> Channel (MutexGuard held)
//!   KV worker C ──┘            (one at a time)          │
//!                                                       │ dial()
//!                                                       ▼
//!                                      Exchange (reply socket bound at
//!                                  <backend dir>/tmp.<pid>.<n>, unlinked on drop)
//! ```
//!
//! A [`Channel`] is the only way to reach the backend, and holding one means
//! holding the process-wide guard. The guard is released when the channel is
//! dropped, whichever way the worker exits.
//!
//! Every exchange binds a reply socket under a fresh name. A reply that
//! arrives after its exchange timed out is addressed to a path nobody is
//! bound to any more, so the backend's send fails and the next exchange
//! never sees it.

use crate::backend::reply::BackendReply;
use bytes::Bytes;
use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::net::UnixDatagram;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, trace, warn};

/// Default upper bound for one datagram in either direction (64 KB)
pub const DEFAULT_MAX_DATAGRAM: usize = 64 * 1024;

/// Default time to wait for a `get` reply
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// File name prefix of reply sockets, created next to the backend's socket
const REPLY_SOCKET_PREFIX: &str = "tmp";

/// Errors raised while talking to the backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The reply socket could not be created or bound
    #[error("failed to bind reply socket {}: {source}", .path.display())]
    Bind {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A datagram could not be sent
    #[error("failed to send {what} to backend: {source}")]
    Send {
        what: &'static str,
        #[source]
        source: io::Error,
    },

    /// The kernel accepted only part of a datagram
    #[error("short send of {what}: {sent} of {len} bytes")]
    ShortSend {
        what: &'static str,
        sent: usize,
        len: usize,
    },

    /// A datagram is larger than the configured limit
    #[error("{what} of {len} bytes exceeds the datagram limit ({max})")]
    TooLarge {
        what: &'static str,
        len: usize,
        max: usize,
    },

    /// Receiving the reply failed
    #[error("failed to receive backend reply: {0}")]
    Recv(#[source] io::Error),

    /// The backend replied with zero bytes
    #[error("backend sent an empty reply")]
    EmptyReply,

    /// The reply did not fit in the receive buffer
    #[error("backend reply exceeds {max} bytes")]
    ReplyTooLarge { max: usize },

    /// No reply arrived in time
    #[error("no backend reply within {0:?}")]
    Timeout(Duration),
}

/// The operation tag sent as the first datagram of an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendOp {
    Get,
    Set,
}

impl BackendOp {
    pub fn tag(&self) -> &'static [u8] {
        match self {
            BackendOp::Get => b"get",
            BackendOp::Set => b"set",
        }
    }
}

/// Settings for the backend connection.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Path of the backend's well-known socket
    pub socket_path: PathBuf,
    /// How long to wait for a reply; `None` waits forever
    pub timeout: Option<Duration>,
    /// Largest datagram sent or accepted
    pub max_datagram: usize,
}

impl BackendConfig {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout: Some(DEFAULT_TIMEOUT),
            max_datagram: DEFAULT_MAX_DATAGRAM,
        }
    }
}

/// Derives the reply socket path for one exchange: a sibling of the backend
/// socket, in the same directory so the backend can address it.
///
/// `instance` separates server processes sharing a directory and `exchange`
/// separates exchanges within one process.
pub fn reply_path_for(backend: &Path, instance: u32, exchange: u64) -> PathBuf {
    let name = format!("{}.{}.{}", REPLY_SOCKET_PREFIX, instance, exchange);
    if backend.file_name() == Some(OsStr::new(&name)) {
        backend.with_file_name(format!("{}.reply", name))
    } else {
        backend.with_file_name(name)
    }
}

/// Owner of the single backend channel.
#[derive(Debug)]
pub struct BackendClient {
    config: BackendConfig,
    instance: u32,
    exchanges: AtomicU64,
    channel: Mutex<()>,
}

impl BackendClient {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            config,
            instance: std::process::id(),
            exchanges: AtomicU64::new(0),
            channel: Mutex::new(()),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.config.socket_path
    }

    /// Waits for exclusive use of the backend channel.
    pub async fn acquire(&self) -> Channel<'_> {
        let guard = self.channel.lock().await;
        trace!(backend = %self.config.socket_path.display(), "Backend channel acquired");
        Channel {
            client: self,
            _guard: guard,
        }
    }
}

/// Exclusive access to the backend. Dropping it releases the guard.
pub struct Channel<'a> {
    client: &'a BackendClient,
    _guard: MutexGuard<'a, ()>,
}

impl Channel<'_> {
    /// Binds the reply socket for one exchange.
    pub async fn dial(&self) -> Result<Exchange<'_>, BackendError> {
        let client = self.client;
        let exchange = client.exchanges.fetch_add(1, Ordering::Relaxed);
        let path = reply_path_for(&client.config.socket_path, client.instance, exchange);

        // A previous process may have left the file behind.
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!(path = %path.display(), "Removed stale reply socket"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => return Err(BackendError::Bind { path, source }),
        }

        let socket = UnixDatagram::bind(&path).map_err(|source| BackendError::Bind {
            path: path.clone(),
            source,
        })?;

        trace!(path = %path.display(), exchange, "Reply socket bound");
        Ok(Exchange {
            config: &client.config,
            socket: ReplySocket { socket, path },
        })
    }
}

impl Drop for Channel<'_> {
    fn drop(&mut self) {
        trace!(backend = %self.client.config.socket_path.display(), "Backend channel released");
    }
}

/// A bound reply socket that removes its path when dropped.
struct ReplySocket {
    socket: UnixDatagram,
    path: PathBuf,
}

impl Drop for ReplySocket {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "Failed to remove reply socket");
            }
        }
    }
}

/// One request/reply sequence with the backend.
pub struct Exchange<'c> {
    config: &'c BackendConfig,
    socket: ReplySocket,
}

impl Exchange<'_> {
    /// Path of this exchange's reply socket.
    pub fn reply_path(&self) -> &Path {
        &self.socket.path
    }

    pub async fn send_op(&self, op: BackendOp) -> Result<(), BackendError> {
        self.send("operation", op.tag()).await
    }

    pub async fn send_key(&self, key: &str) -> Result<(), BackendError> {
        self.send("key", key.as_bytes()).await
    }

    pub async fn send_value(&self, value: &[u8]) -> Result<(), BackendError> {
        self.send("value", value).await
    }

    async fn send(&self, what: &'static str, payload: &[u8]) -> Result<(), BackendError> {
        let max = self.config.max_datagram;
        if payload.len() > max {
            return Err(BackendError::TooLarge {
                what,
                len: payload.len(),
                max,
            });
        }

        let sent = self
            .socket
            .socket
            .send_to(payload, &self.config.socket_path)
            .await
            .map_err(|source| BackendError::Send { what, source })?;

        if sent != payload.len() {
            return Err(BackendError::ShortSend {
                what,
                sent,
                len: payload.len(),
            });
        }

        trace!(what, bytes = sent, "Sent datagram");
        Ok(())
    }

    /// Waits for the single reply to a `get` on `key`.
    pub async fn recv_reply(&self, key: &str) -> Result<BackendReply, BackendError> {
        let max = self.config.max_datagram;
        // One spare byte tells a full-size reply apart from a truncated one.
        let mut buf = vec![0u8; max + 1];

        let recv = self.socket.socket.recv(&mut buf);
        let received = match self.config.timeout {
            Some(limit) => tokio::time::timeout(limit, recv)
                .await
                .map_err(|_| BackendError::Timeout(limit))?,
            None => recv.await,
        };
        let n = received.map_err(BackendError::Recv)?;

        if n == 0 {
            return Err(BackendError::EmptyReply);
        }
        if n > max {
            return Err(BackendError::ReplyTooLarge { max });
        }

        buf.truncate(n);
        trace!(bytes = n, "Received reply");
        Ok(BackendReply::decode(key, Bytes::from(buf)))
    }
}
