//! In-process stand-in for the key-value backend, used by tests.
//!
//! It speaks the same datagram protocol: an operation tag, a key, and for
//! `set` a value, each as its own datagram. A `get` is answered at the
//! address the key came from.

use crate::backend::reply::missing_key_message;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::UnixDatagram;
use tokio::task::JoinHandle;

type Store = Arc<Mutex<HashMap<Vec<u8>, Vec<u8>>>>;

/// How the fake answers `get`.
#[derive(Debug, Clone, Copy)]
enum Replies {
    Always,
    Never,
    /// Holds the first reply back, then answers normally
    DelayFirst(Duration),
}

pub(crate) struct FakeBackend {
    path: PathBuf,
    store: Store,
    task: JoinHandle<()>,
}

impl FakeBackend {
    /// Starts a backend that stores and answers requests.
    pub(crate) fn spawn(dir: &Path) -> Self {
        Self::start(dir, Replies::Always)
    }

    /// Starts a backend that consumes requests but never replies.
    pub(crate) fn silent(dir: &Path) -> Self {
        Self::start(dir, Replies::Never)
    }

    /// Starts a backend whose first `get` reply is sent only after `delay`.
    pub(crate) fn delay_first(dir: &Path, delay: Duration) -> Self {
        Self::start(dir, Replies::DelayFirst(delay))
    }

    fn start(dir: &Path, replies: Replies) -> Self {
        let path = dir.join("kvstore.sock");
        let socket = UnixDatagram::bind(&path).unwrap();
        let store = Arc::new(Mutex::new(HashMap::new()));

        let task = tokio::spawn(serve(socket, Arc::clone(&store), replies));
        Self { path, store, task }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.store.lock().unwrap().get(key.as_bytes()).cloned()
    }

    pub(crate) fn insert(&self, key: &str, value: &str) {
        self.store
            .lock()
            .unwrap()
            .insert(key.as_bytes().to_vec(), value.as_bytes().to_vec());
    }
}

/// Reply sockets currently present in `dir`.
pub(crate) fn reply_sockets(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("tmp."))
        })
        .collect()
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(socket: UnixDatagram, store: Store, replies: Replies) {
    let mut buf = vec![0u8; 64 * 1024];
    let mut delay = match replies {
        Replies::DelayFirst(delay) => Some(delay),
        _ => None,
    };

    loop {
        let Ok((n, _)) = socket.recv_from(&mut buf).await else {
            return;
        };
        let op = buf[..n].to_vec();

        let Ok((n, peer)) = socket.recv_from(&mut buf).await else {
            return;
        };
        let key = buf[..n].to_vec();

        match op.as_slice() {
            b"set" => {
                let Ok((n, _)) = socket.recv_from(&mut buf).await else {
                    return;
                };
                store.lock().unwrap().insert(key, buf[..n].to_vec());
            }
            b"get" if !matches!(replies, Replies::Never) => {
                let reply = store.lock().unwrap().get(&key).cloned().unwrap_or_else(|| {
                    missing_key_message(&String::from_utf8_lossy(&key)).into_bytes()
                });
                if let Some(delay) = delay.take() {
                    tokio::time::sleep(delay).await;
                }
                // The requester may be gone by now; like the real backend,
                // a failed send is dropped.
                if let Some(reply_path) = peer.as_pathname() {
                    let _ = socket.send_to(&reply, reply_path).await;
                }
            }
            _ => {}
        }
    }
}
