//! Error Reporter
//!
//! Sends the fixed response for a failure status and closes the connection.
//! Delivery is best-effort: if the client is gone there is nobody left to
//! tell, so write failures are logged and dropped.

use crate::error::FrontError;
use crate::protocol::{ResponseHead, Status};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

/// Writes the fixed response for `status`. Returns whether it was delivered.
pub async fn report<W>(stream: &mut W, status: Status) -> bool
where
    W: AsyncWrite + Unpin,
{
    let head = ResponseHead::new(status).serialize();
    let delivered = async {
        stream.write_all(&head).await?;
        stream.flush().await
    }
    .await;

    match delivered {
        Ok(()) => true,
        Err(e) => {
            warn!(status = %status, error = %e, "Unable to deliver error response");
            false
        }
    }
}

/// Ends a worker: reports the failure, if any, then shuts the stream down.
pub async fn terminate<W, T>(stream: &mut W, result: &Result<T, FrontError>)
where
    W: AsyncWrite + Unpin,
{
    if let Err(e) = result {
        debug!(status = %e.status(), error = %e, "Request failed");
        report(stream, e.status()).await;
    }

    if let Err(e) = stream.shutdown().await {
        debug!(error = %e, "Shutdown failed");
    }
}
