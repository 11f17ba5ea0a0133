//! Worker Errors
//!
//! Every way a request can fail ends up as a [`FrontError`], which knows the
//! status the client should receive. Errors never travel past the worker
//! that owns the connection.

use crate::backend::BackendError;
use crate::protocol::{ParseError, Status};
use std::io;
use thiserror::Error;

/// Broad class of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Malformed or disallowed request shape
    Client,
    /// The file or key does not exist
    Resource,
    /// Socket, file system or backend failure
    System,
    /// A verb the server does not implement
    Unsupported,
}

/// A failure while serving one request.
#[derive(Debug, Error)]
pub enum FrontError {
    /// The request could not be tokenized
    #[error("malformed request: {0}")]
    Parse(#[from] ParseError),

    /// Well-formed but not a valid combination (e.g. HEAD on a key)
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The request is not allowed on this target
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The resource or key is absent
    #[error("not found: {0}")]
    NotFound(String),

    /// The verb is not implemented
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// I/O on the connection or the file system failed
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: io::Error,
    },

    /// The backend exchange failed
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl FrontError {
    /// Wraps an I/O error with what was being attempted.
    pub fn io(context: &'static str) -> impl FnOnce(io::Error) -> FrontError {
        move |source| FrontError::Io { context, source }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            FrontError::Parse(e) if e.status() == Status::InternalError => ErrorClass::System,
            FrontError::Parse(_) | FrontError::BadRequest(_) | FrontError::Forbidden(_) => {
                ErrorClass::Client
            }
            FrontError::NotFound(_) => ErrorClass::Resource,
            FrontError::NotImplemented(_) => ErrorClass::Unsupported,
            FrontError::Io { .. } | FrontError::Backend(_) => ErrorClass::System,
        }
    }

    /// The status reported to the client.
    pub fn status(&self) -> Status {
        match self {
            FrontError::Parse(e) => e.status(),
            FrontError::BadRequest(_) => Status::BadRequest,
            FrontError::Forbidden(_) => Status::Forbidden,
            FrontError::NotFound(_) => Status::NotFound,
            FrontError::NotImplemented(_) => Status::NotImplemented,
            FrontError::Io { .. } | FrontError::Backend(_) => Status::InternalError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            FrontError::BadRequest("HEAD on key".into()).status(),
            Status::BadRequest
        );
        assert_eq!(FrontError::Forbidden("x".into()).status(), Status::Forbidden);
        assert_eq!(FrontError::NotFound("x".into()).status(), Status::NotFound);
        assert_eq!(
            FrontError::NotImplemented("DELETE".into()).status(),
            Status::NotImplemented
        );
        assert_eq!(
            FrontError::from(BackendError::Timeout(Duration::from_secs(1))).status(),
            Status::InternalError
        );
    }

    #[test]
    fn test_parse_errors_keep_their_status() {
        let undelimited = FrontError::from(ParseError::MissingDelimiter);
        assert_eq!(undelimited.status(), Status::InternalError);
        assert_eq!(undelimited.class(), ErrorClass::System);

        let empty_key = FrontError::from(ParseError::EmptyKey);
        assert_eq!(empty_key.status(), Status::BadRequest);
        assert_eq!(empty_key.class(), ErrorClass::Client);
    }

    #[test]
    fn test_io_helper() {
        let err = FrontError::io("open")(io::Error::new(io::ErrorKind::Other, "boom"));
        assert_eq!(err.to_string(), "open: boom");
        assert_eq!(err.class(), ErrorClass::System);
    }
}
