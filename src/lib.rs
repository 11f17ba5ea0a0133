//! # kvgate - A File Server and Key-Value Proxy
//!
//! kvgate accepts simple line-oriented requests over TCP. It serves files
//! from a document root, and forwards `/kv/<key>` requests to a separate
//! key-value backend that is only reachable through a local Unix datagram
//! socket.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                               kvgate                                 │
//! │                                                                      │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐               │
//! │  │  Listener   │───>│ Connection  │───>│ Classifier  │               │
//! │  │ (accept)    │    │  Handler    │    │             │               │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘               │
//! │                                               │                      │
//! │                       ┌───────────────────────┼──────────────┐       │
//! │                       ▼                       ▼              ▼       │
//! │               ┌──────────────┐      ┌─────────────────┐  ┌────────┐  │
//! │               │ File worker  │      │   KV worker     │  │ Error  │  │
//! │               │ (HEAD/GET)   │      │   (GET/PUT)     │  │Reporter│  │
//! │               └──────────────┘      └────────┬────────┘  └────────┘  │
//! │                                              │                       │
//! │                                   ┌──────────┴──────────┐            │
//! │                                   │   BackendClient     │            │
//! │                                   │ (one exchange at a  │            │
//! │                                   │  time, Mutex guard) │            │
//! │                                   └──────────┬──────────┘            │
//! └──────────────────────────────────────────────┼───────────────────────┘
//!                                                │ Unix datagrams
//!                                                ▼
//!                                        key-value backend
//! ```
//!
//! ## Requests
//!
//! | Request | Result |
//! |---------|--------|
//! | `GET /path` | file contents |
//! | `HEAD /path` | file status and headers |
//! | `GET /kv/<key>` | stored value, or 404 |
//! | `PUT /kv/<key>` + `Content-Length` | stores the payload |
//! | `PUT /path` | 403 |
//! | `HEAD /kv/<key>` | 400 |
//! | anything else | 501 |
//!
//! ## Module Overview
//!
//! - [`protocol`]: request tokenizer and response heads
//! - [`connection`]: listener, per-connection handler, classifier, error reporter
//! - [`worker`]: file-serving and key-value proxy workers
//! - [`backend`]: the guarded datagram channel to the key-value backend
//! - [`config`]: CLI and TOML configuration
//!
//! ## Design Highlights
//!
//! ### One Exchange at a Time
//!
//! The backend matches request datagrams to replies by order alone. The
//! [`backend::BackendClient`] holds a mutex for the full exchange, so
//! concurrent key-value requests queue instead of interleaving.
//!
//! ### Workers Own Their Connection
//!
//! Once classified, the stream is moved into the worker. The worker answers,
//! reports errors, and closes the stream itself; nothing else touches it.

pub mod backend;
pub mod config;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod worker;

// Re-export commonly used types for convenience
pub use backend::{BackendClient, BackendConfig, BackendError, BackendReply};
pub use config::{Config, ConfigError};
pub use connection::{accept_loop, handle_connection, ConnectionStats};
pub use error::{ErrorClass, FrontError};
pub use protocol::{ParseError, Request, Status, Target};
pub use worker::{Dispatcher, FileServer};

/// Version of kvgate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
