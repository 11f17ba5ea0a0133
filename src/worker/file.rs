//! File-Serving Worker
//!
//! Answers HEAD (metadata only) and GET (metadata and content) for files
//! under the document root.
//!
//! ```text
//!  resolve ──> exists? ──no──> 404
//!                 │  └───err──> 500
//!                 ▼
//!             metadata ──err──> 500
//!                 │
//!                 ▼
//!          200 + Content-Length ──(HEAD)──> done
//!                 │
//!                 ▼ (GET)
//!          stream bytes ──err──> 500
//! ```

use crate::connection::report::terminate;
use crate::error::FrontError;
use crate::protocol::{content_type_for, ResponseHead, Status};
use std::path::{Component, Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

/// Size of each chunk streamed to the client
const CHUNK_SIZE: usize = 8 * 1024;

/// What the client asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOp {
    /// HEAD: status and headers only
    Metadata,
    /// GET: headers followed by the file's bytes
    Content,
}

/// Serves files from a document root.
#[derive(Debug, Clone)]
pub struct FileServer {
    root: PathBuf,
}

impl FileServer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Maps a request target onto a path under the root.
    ///
    /// Targets that would climb out of the root are refused.
    pub fn resolve(&self, target: &str) -> Result<PathBuf, FrontError> {
        let relative = Path::new(target);
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => return Err(FrontError::Forbidden(format!("path escapes root: {}", target))),
            }
        }
        Ok(self.root.join(relative))
    }

    /// Serves one request and closes the stream.
    ///
    /// Returns the number of body bytes sent.
    pub async fn serve<S>(&self, mut stream: S, target: &str, op: FileOp) -> Result<u64, FrontError>
    where
        S: AsyncWrite + Unpin,
    {
        let result = self.transfer(&mut stream, target, op).await;
        terminate(&mut stream, &result).await;
        result
    }

    async fn transfer<S>(&self, stream: &mut S, target: &str, op: FileOp) -> Result<u64, FrontError>
    where
        S: AsyncWrite + Unpin,
    {
        let path = self.resolve(target)?;

        // Only a clean "not there" is a 404; a failed lookup (loop, permission) is a 500.
        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(FrontError::io("metadata lookup"))?;
        if !exists {
            return Err(FrontError::NotFound(target.to_string()));
        }

        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(FrontError::io("metadata lookup"))?;
        if !metadata.is_file() {
            return Err(FrontError::NotFound(target.to_string()));
        }
        let size = metadata.len();

        // Open before answering so an unreadable file still gets a clean 500.
        let file = match op {
            FileOp::Content => Some(File::open(&path).await.map_err(FrontError::io("open"))?),
            FileOp::Metadata => None,
        };

        let head = ResponseHead::new(Status::Ok)
            .with_content_type(content_type_for(&path))
            .with_content_length(size);
        stream
            .write_all(&head.serialize())
            .await
            .map_err(FrontError::io("write header"))?;

        let sent = match file {
            Some(file) => stream_file(file, stream).await?,
            None => 0,
        };

        stream.flush().await.map_err(FrontError::io("flush"))?;
        debug!(path = %path.display(), size, sent, "Served file");
        Ok(sent)
    }
}

async fn stream_file<S>(mut file: File, stream: &mut S) -> Result<u64, FrontError>
where
    S: AsyncWrite + Unpin,
{
    let mut chunk = vec![0u8; CHUNK_SIZE];
    let mut sent = 0u64;

    loop {
        let n = file.read(&mut chunk).await.map_err(FrontError::io("read file"))?;
        if n == 0 {
            return Ok(sent);
        }
        stream
            .write_all(&chunk[..n])
            .await
            .map_err(FrontError::io("write body"))?;
        sent += n as u64;
        trace!(bytes = n, total = sent, "Sent chunk");
    }
}
