//! Response Types
//!
//! Every response this server writes has the same shape:
//!
//! ```text
//! HTTP/1.1 <code> <reason>\r\n
//! Content-Type: <type>\r\n      (optional)
//! Content-Length: <n>\r\n
//! \r\n
//! <body>
//! ```
//!
//! Only the head is built here; bodies are streamed by the workers.

use bytes::{BufMut, BytesMut};
use std::fmt;

/// The CRLF terminator used on the wire
pub const CRLF: &[u8] = b"\r\n";

/// Status codes the server can answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Ok,
    BadRequest,
    Forbidden,
    NotFound,
    InternalError,
    NotImplemented,
}

impl Status {
    pub fn code(&self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::BadRequest => 400,
            Status::Forbidden => 403,
            Status::NotFound => 404,
            Status::InternalError => 500,
            Status::NotImplemented => 501,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::BadRequest => "Bad Request",
            Status::Forbidden => "Forbidden",
            Status::NotFound => "Not Found",
            Status::InternalError => "Internal Server Error",
            Status::NotImplemented => "Not Implemented",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.reason())
    }
}

/// Status line and headers of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: Status,
    pub content_type: Option<&'static str>,
    pub content_length: u64,
}

impl ResponseHead {
    /// Creates a head with no content type and an empty body.
    pub fn new(status: Status) -> Self {
        Self {
            status,
            content_type: None,
            content_length: 0,
        }
    }

    pub fn with_content_type(mut self, content_type: &'static str) -> Self {
        self.content_type = Some(content_type);
        self
    }

    pub fn with_content_length(mut self, length: u64) -> Self {
        self.content_length = length;
        self
    }

    /// Serializes the head, including the blank line that ends it.
    pub fn serialize(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(96);
        buf.put_slice(b"HTTP/1.1 ");
        buf.put_slice(self.status.to_string().as_bytes());
        buf.put_slice(CRLF);
        if let Some(content_type) = self.content_type {
            buf.put_slice(b"Content-Type: ");
            buf.put_slice(content_type.as_bytes());
            buf.put_slice(CRLF);
        }
        buf.put_slice(b"Content-Length: ");
        buf.put_slice(self.content_length.to_string().as_bytes());
        buf.put_slice(CRLF);
        buf.put_slice(CRLF);
        buf
    }
}

/// Content type for a file, chosen by extension.
pub fn content_type_for(path: &std::path::Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("html") | Some("htm") => "text/html",
        Some("txt") => "text/plain",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_serialize_error_head() {
        let head = ResponseHead::new(Status::NotFound);
        assert_eq!(
            &head.serialize()[..],
            b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n"
        );
    }

    #[test]
    fn test_serialize_full_head() {
        let head = ResponseHead::new(Status::Ok)
            .with_content_type("text/html")
            .with_content_length(11);
        assert_eq!(
            &head.serialize()[..],
            b"HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: 11\r\n\r\n"
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(Status::BadRequest.code(), 400);
        assert_eq!(Status::Forbidden.code(), 403);
        assert_eq!(Status::InternalError.code(), 500);
        assert_eq!(Status::NotImplemented.to_string(), "501 Not Implemented");
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for(Path::new("index.html")), "text/html");
        assert_eq!(content_type_for(Path::new("a/b/LOGO.PNG")), "image/png");
        assert_eq!(content_type_for(Path::new("notes.txt")), "text/plain");
        assert_eq!(
            content_type_for(Path::new("archive")),
            "application/octet-stream"
        );
    }
}
