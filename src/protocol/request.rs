//! Request Tokenizer
//!
//! This module turns the raw bytes of a client request into a validated,
//! structured [`Request`]. Nothing is routed or executed here; the
//! classifier decides what happens with the result.
//!
//! ## Wire Format
//!
//! ```text
//! <VERB> <target> <version>\r\n
//! Header: value\r\n
//! ...
//! \r\n
//! <payload>            (PUT only, exactly Content-Length bytes)
//! ```
//!
//! ## How the Tokenizer Works
//!
//! Like a stream parser, it reports one of three outcomes:
//! - `Ok(Some(request))` - the buffer holds a complete request
//! - `Ok(None)` - more bytes are needed
//! - `Err(ParseError)` - the request is malformed and can never become valid
//!
//! When the peer has closed its side, [`Request::parse_at_eof`] treats the
//! end of the buffer as the end of input, so "need more data" becomes an error.

use bytes::Bytes;
use thiserror::Error;

use crate::protocol::response::Status;

/// Maximum number of bytes accepted for one request (line, headers and payload).
pub const MAX_REQUEST_SIZE: usize = 64 * 1024;

/// Prefix that routes a target to the key-value backend.
pub const KV_PREFIX: &str = "kv/";

/// Errors that can occur while tokenizing a request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The target is not followed by a delimiter (or is absent altogether)
    #[error("request target is not delimited")]
    MissingDelimiter,

    /// The request line is not valid UTF-8
    #[error("request line is not valid UTF-8")]
    InvalidUtf8,

    /// The target does not start with `/`
    #[error("invalid request target: {0}")]
    InvalidTarget(String),

    /// A `kv/` target with nothing after the prefix
    #[error("empty key")]
    EmptyKey,

    /// The request ended before the header block was terminated
    #[error("header block is not terminated")]
    UnterminatedHeaders,

    /// A PUT without a Content-Length header
    #[error("missing Content-Length header")]
    MissingContentLength,

    /// The Content-Length value is not a number
    #[error("invalid Content-Length: {0}")]
    InvalidContentLength(String),

    /// Fewer payload bytes than announced
    #[error("payload truncated: expected {expected} bytes, got {got}")]
    TruncatedPayload { expected: usize, got: usize },

    /// The request exceeds the size limit
    #[error("request too large: {size} bytes (max: {max})")]
    TooLarge { size: usize, max: usize },
}

impl ParseError {
    /// The status the client receives for this error.
    ///
    /// An undelimited target is reported as an internal error, everything
    /// else is the client's fault.
    pub fn status(&self) -> Status {
        match self {
            ParseError::MissingDelimiter => Status::InternalError,
            _ => Status::BadRequest,
        }
    }
}

/// Result type for tokenizer operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// The request verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Head,
    Get,
    Put,
    Unsupported,
}

impl Verb {
    /// Recognizes a verb by prefix, the same way for every request.
    fn from_line(line: &[u8]) -> Self {
        if line.starts_with(b"HEAD") {
            Verb::Head
        } else if line.starts_with(b"GET") {
            Verb::Get
        } else if line.starts_with(b"PUT") {
            Verb::Put
        } else {
            Verb::Unsupported
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Head => "HEAD",
            Verb::Get => "GET",
            Verb::Put => "PUT",
            Verb::Unsupported => "UNSUPPORTED",
        }
    }
}

/// What a request addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A path relative to the document root (leading `/` stripped)
    File(String),
    /// A key in the backend store (the part after `/kv/`)
    Kv(String),
}

impl Target {
    fn parse(raw: &str) -> ParseResult<Self> {
        let path = raw
            .strip_prefix('/')
            .ok_or_else(|| ParseError::InvalidTarget(raw.to_string()))?;

        match path.strip_prefix(KV_PREFIX) {
            Some("") => Err(ParseError::EmptyKey),
            Some(key) => Ok(Target::Kv(key.to_string())),
            None => Ok(Target::File(path.to_string())),
        }
    }
}

/// A complete, validated client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Head { target: Target },
    Get { target: Target },
    Put { target: Target, payload: Bytes },
    /// Any other verb; only the first token of the line is kept
    Unsupported { verb: String },
}

impl Request {
    /// Attempts to tokenize a request from the bytes received so far.
    ///
    /// Returns `Ok(None)` if the request is not complete yet.
    pub fn parse(buf: &[u8]) -> ParseResult<Option<Request>> {
        parse_request(buf, false)
    }

    /// Tokenizes the final bytes of a connection whose peer stopped sending.
    pub fn parse_at_eof(buf: &[u8]) -> ParseResult<Request> {
        match parse_request(buf, true)? {
            Some(request) => Ok(request),
            // At EOF the only incomplete shape left is an open header block.
            None => Err(ParseError::UnterminatedHeaders),
        }
    }

    pub fn verb(&self) -> Verb {
        match self {
            Request::Head { .. } => Verb::Head,
            Request::Get { .. } => Verb::Get,
            Request::Put { .. } => Verb::Put,
            Request::Unsupported { .. } => Verb::Unsupported,
        }
    }

    pub fn target(&self) -> Option<&Target> {
        match self {
            Request::Head { target } | Request::Get { target } | Request::Put { target, .. } => {
                Some(target)
            }
            Request::Unsupported { .. } => None,
        }
    }
}

fn parse_request(buf: &[u8], at_eof: bool) -> ParseResult<Option<Request>> {
    if buf.len() > MAX_REQUEST_SIZE {
        return Err(ParseError::TooLarge {
            size: buf.len(),
            max: MAX_REQUEST_SIZE,
        });
    }

    let (line, rest) = match memchr_newline(buf) {
        Some(pos) => (&buf[..pos], &buf[pos + 1..]),
        None if at_eof => (buf, &buf[buf.len()..]),
        None => return Ok(None),
    };
    let line = line.strip_suffix(b"\r").unwrap_or(line);

    let verb = Verb::from_line(line);
    if verb == Verb::Unsupported {
        let token = line.split(|&b| b == b' ').next().unwrap_or_default();
        return Ok(Some(Request::Unsupported {
            verb: String::from_utf8_lossy(token).into_owned(),
        }));
    }

    let line = std::str::from_utf8(line).map_err(|_| ParseError::InvalidUtf8)?;
    let mut tokens = line.splitn(3, ' ');
    let _verb = tokens.next();
    let raw_target = tokens.next().ok_or(ParseError::MissingDelimiter)?;
    if tokens.next().is_none() {
        return Err(ParseError::MissingDelimiter);
    }
    let target = Target::parse(raw_target)?;

    match verb {
        Verb::Head => Ok(Some(Request::Head { target })),
        Verb::Get => Ok(Some(Request::Get { target })),
        _ => Ok(parse_payload(rest, at_eof)?.map(|payload| Request::Put { target, payload })),
    }
}

/// Reads the header block following the request line and extracts the
/// `Content-Length` bytes of payload that follow it.
fn parse_payload(buf: &[u8], at_eof: bool) -> ParseResult<Option<Bytes>> {
    let mut content_length = None;
    let mut offset = 0;

    let body_start = loop {
        let Some(pos) = memchr_newline(&buf[offset..]) else {
            return if at_eof {
                Err(ParseError::UnterminatedHeaders)
            } else {
                Ok(None)
            };
        };
        let line = &buf[offset..offset + pos];
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        offset += pos + 1;

        if line.is_empty() {
            break offset;
        }
        if let Some(value) = header_value(line, "content-length") {
            let value = value.trim();
            let length = value
                .parse::<usize>()
                .map_err(|_| ParseError::InvalidContentLength(value.to_string()))?;
            content_length = Some(length);
        }
    };

    let expected = content_length.ok_or(ParseError::MissingContentLength)?;
    let body = &buf[body_start..];

    if body.len() < expected {
        return if at_eof {
            Err(ParseError::TruncatedPayload {
                expected,
                got: body.len(),
            })
        } else {
            Ok(None)
        };
    }

    Ok(Some(Bytes::copy_from_slice(&body[..expected])))
}

/// Returns the value of a `Name: value` header line if its name matches
/// (ASCII case-insensitive).
fn header_value<'a>(line: &'a [u8], name: &str) -> Option<&'a str> {
    let colon = line.iter().position(|&b| b == b':')?;
    let (key, value) = line.split_at(colon);
    if !key.eq_ignore_ascii_case(name.as_bytes()) {
        return None;
    }
    std::str::from_utf8(&value[1..]).ok()
}

#[inline]
fn memchr_newline(buf: &[u8]) -> Option<usize> {
    buf.iter().position(|&b| b == b'\n')
}
