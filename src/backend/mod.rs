//! Key-Value Backend Channel
//!
//! The storage service runs as a separate process and is reachable only
//! through a local Unix datagram socket. This module owns that channel.
//!
//! ## Protocol
//!
//! ```text
//!  front-end (reply socket)                backend (well-known socket)
//!        │ ── "get" ─────────────────────────────> │
//!        │ ── <key> ─────────────────────────────> │
//!        │ <──────────── <value> | "Key <key> does not exist.\n"
//!
//!        │ ── "set" ─────────────────────────────> │
//!        │ ── <key> ─────────────────────────────> │
//!        │ ── <value> ───────────────────────────> │   (no reply)
//! ```
//!
//! - `client`: the guarded channel, reply socket lifecycle, sends and receive
//! - `reply`: decoding of the `get` reply into a tagged value

pub mod client;
pub mod reply;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use client::{
    reply_path_for, BackendClient, BackendConfig, BackendError, BackendOp, Channel, Exchange,
    DEFAULT_MAX_DATAGRAM, DEFAULT_TIMEOUT,
};
pub use reply::{missing_key_message, BackendReply};
