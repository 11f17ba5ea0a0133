//! Backend Reply Decoding
//!
//! The backend answers a `get` with a single datagram: either the stored
//! value, or a fixed error text naming the key. The text is matched here,
//! once, so the rest of the crate only ever sees a tagged [`BackendReply`].

use bytes::Bytes;

/// Formats the text the backend sends when `key` is not stored.
pub fn missing_key_message(key: &str) -> String {
    format!("Key {} does not exist.\n", key)
}

/// A decoded reply to a `get`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendReply {
    /// The stored value
    Found(Bytes),
    /// The key is absent; carries the backend's message verbatim
    Missing(Bytes),
}

impl BackendReply {
    /// Tags a raw reply datagram for `key`.
    ///
    /// Only an exact byte match with the backend's not-found text counts as
    /// missing. Any other datagram, including an error text for some other
    /// key, is treated as a stored value.
    pub fn decode(key: &str, datagram: Bytes) -> Self {
        if datagram == missing_key_message(key).as_bytes() {
            BackendReply::Missing(datagram)
        } else {
            BackendReply::Found(datagram)
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, BackendReply::Found(_))
    }

    /// The raw bytes to forward to the client.
    pub fn body(&self) -> &Bytes {
        match self {
            BackendReply::Found(body) | BackendReply::Missing(body) => body,
        }
    }
}
