//! Connection Handling Module
//!
//! This module manages client connections from accept to close.
//! Each connection is handled by its own async task and served by exactly
//! one worker.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Listener                                │
//! │                  (accept_loop)                              │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │
//!                        │ accept() + spawn task
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐      │
//! │  │ Read bytes  │───>│  Tokenize   │───>│  Classify   │      │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘      │
//! └───────────────────────────────────────────────┼─────────────┘
//!                                                 │
//!                    ┌────────────────────────────┼──────────┐
//!                    ▼                            ▼          ▼
//!             File worker                    KV worker   Error Reporter
//! ```
//!
//! ## Modules
//!
//! - `listener`: the accept loop
//! - `handler`: per-connection request reading and statistics
//! - `classify`: request routing policy
//! - `report`: best-effort error responses and connection teardown
//!
//! ## Example
//!
//! ```ignore
//! use kvgate::connection::{accept_loop, ConnectionStats};
//! use kvgate::worker::{Dispatcher, FileServer};
//! use kvgate::backend::{BackendClient, BackendConfig};
//! use std::sync::Arc;
//!
//! let dispatcher = Dispatcher::new(
//!     FileServer::new("."),
//!     BackendClient::new(BackendConfig::new("/tmp/kvstore.sock")),
//! );
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! accept_loop(listener, dispatcher, Arc::new(ConnectionStats::new())).await;
//! ```

pub mod classify;
pub mod handler;
pub mod listener;
pub mod report;

// Re-export commonly used types
pub use classify::{classify, Route};
pub use handler::{handle_connection, ConnectionHandler, ConnectionStats};
pub use listener::accept_loop;
pub use report::{report, terminate};
