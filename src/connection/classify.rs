//! Request Classifier
//!
//! Decides which worker serves a request, or rejects it outright.
//!
//! | verb  | `kv/` target | file target |
//! |-------|--------------|-------------|
//! | HEAD  | 400          | file, metadata |
//! | GET   | kv get       | file, content |
//! | PUT   | kv set       | 403 |
//! | other | 501          | 501 |

use crate::error::FrontError;
use crate::protocol::{Request, Target};
use crate::worker::{FileOp, KvOp};

/// Where a request goes.
#[derive(Debug)]
pub enum Route {
    File { target: String, op: FileOp },
    Kv(KvOp),
    /// Answered with an error status without running a worker
    Reject(FrontError),
}

/// Routes a parsed request. Performs no I/O.
pub fn classify(request: Request) -> Route {
    match request {
        Request::Head {
            target: Target::Kv(key),
        } => Route::Reject(FrontError::BadRequest(format!("HEAD on key {}", key))),
        Request::Head {
            target: Target::File(target),
        } => Route::File {
            target,
            op: FileOp::Metadata,
        },
        Request::Get {
            target: Target::Kv(key),
        } => Route::Kv(KvOp::Get { key }),
        Request::Get {
            target: Target::File(target),
        } => Route::File {
            target,
            op: FileOp::Content,
        },
        Request::Put {
            target: Target::Kv(key),
            payload,
        } => Route::Kv(KvOp::Set {
            key,
            value: payload,
        }),
        Request::Put {
            target: Target::File(target),
            ..
        } => Route::Reject(FrontError::Forbidden(format!("PUT on file {}", target))),
        Request::Unsupported { verb } => Route::Reject(FrontError::NotImplemented(verb)),
    }
}
