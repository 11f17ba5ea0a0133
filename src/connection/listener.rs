//! Listener
//!
//! The accept loop. It never reads from a client itself: every accepted
//! stream is moved into its own task right away, so a slow client or a
//! stalled backend exchange cannot hold up new connections.

use crate::connection::handler::{handle_connection, ConnectionStats};
use crate::worker::Dispatcher;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, trace};

/// Accepts connections forever, spawning one detached task per client.
pub async fn accept_loop(listener: TcpListener, dispatcher: Dispatcher, stats: Arc<ConnectionStats>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                trace!(client = %addr, "Accepted connection");
                let dispatcher = dispatcher.clone();
                let stats = Arc::clone(&stats);

                // Spawn a task to handle this connection
                tokio::spawn(async move {
                    handle_connection(stream, addr, dispatcher, stats).await;
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
