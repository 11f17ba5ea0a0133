//! Request Workers
//!
//! A worker owns an accepted connection from the moment its request is
//! classified until the connection is closed. It is responsible for its own
//! teardown on every path.
//!
//! - `file`: HEAD/GET on files under the document root
//! - `kv`: GET/PUT proxied to the key-value backend

pub mod file;
pub mod kv;

pub use file::{FileOp, FileServer};
pub use kv::{KvOp, KvOutcome};

use crate::backend::BackendClient;
use crate::connection::classify::Route;
use crate::connection::report::terminate;
use crate::error::FrontError;
use std::sync::Arc;
use tokio::io::AsyncWrite;

/// What a finished worker delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Served {
    File { bytes: u64 },
    Kv(KvOutcome),
}

/// Hands classified requests to the right worker.
///
/// Cloned into every connection task; the backend client inside is shared.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    files: Arc<FileServer>,
    backend: Arc<BackendClient>,
}

impl Dispatcher {
    pub fn new(files: FileServer, backend: BackendClient) -> Self {
        Self {
            files: Arc::new(files),
            backend: Arc::new(backend),
        }
    }

    /// Runs the worker for `route`, which takes ownership of the stream.
    pub async fn dispatch<S>(&self, mut stream: S, route: Route) -> Result<Served, FrontError>
    where
        S: AsyncWrite + Unpin,
    {
        match route {
            Route::File { target, op } => {
                let bytes = self.files.serve(stream, &target, op).await?;
                Ok(Served::File { bytes })
            }
            Route::Kv(op) => kv::serve(&self.backend, stream, op).await.map(Served::Kv),
            Route::Reject(e) => {
                let result: Result<Served, FrontError> = Err(e);
                terminate(&mut stream, &result).await;
                result
            }
        }
    }
}
