//! Client Protocol Implementation
//!
//! This module implements the small line-oriented protocol clients speak to
//! the front-end: a request line, a few headers, and (for PUT) a payload.
//!
//! ## Modules
//!
//! - `request`: Tokenizer producing a validated `Request`
//! - `response`: Status codes and response heads
//!
//! ## Example
//!
//! ```
//! use kvgate::protocol::{Request, ResponseHead, Status, Target};
//!
//! let request = Request::parse(b"GET /kv/color HTTP/1.1\r\n\r\n").unwrap().unwrap();
//! assert_eq!(request.target(), Some(&Target::Kv("color".to_string())));
//!
//! let head = ResponseHead::new(Status::Ok).with_content_length(4);
//! assert!(head.serialize().starts_with(b"HTTP/1.1 200 OK\r\n"));
//! ```

pub mod request;
pub mod response;

// Re-export commonly used types for convenience
pub use request::{ParseError, ParseResult, Request, Target, Verb, KV_PREFIX, MAX_REQUEST_SIZE};
pub use response::{content_type_for, ResponseHead, Status, CRLF};
