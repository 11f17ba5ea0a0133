//! KV-Proxy Worker
//!
//! Translates one client request into a datagram exchange with the backend
//! and translates the reply back.
//!
//! ## Exchange States
//!
//! ```text
//! INIT ──> DIAL ──> SEND_OP ──> SEND_KEY ──┬──> SEND_VALUE ──────> RESPOND ──> DONE
//!   (guard acquired)                       │        (set)             ▲
//!                                          └──> AWAIT_REPLY ──────────┘
//!                                                   (get)
//!
//!              any failure ──> TEARDOWN (500, socket unlinked, guard released)
//! ```
//!
//! The whole sequence, including the response to the client and teardown,
//! runs while holding the backend channel guard.

use crate::backend::{BackendClient, BackendOp, BackendReply, Exchange};
use crate::connection::report::terminate;
use crate::error::FrontError;
use crate::protocol::{ResponseHead, Status};
use bytes::Bytes;
use std::fmt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

/// Content type of values relayed from the backend
const VALUE_CONTENT_TYPE: &str = "text/plain";

/// A key-value operation requested by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvOp {
    Get { key: String },
    Set { key: String, value: Bytes },
}

impl KvOp {
    pub fn key(&self) -> &str {
        match self {
            KvOp::Get { key } | KvOp::Set { key, .. } => key,
        }
    }

    fn backend_op(&self) -> BackendOp {
        match self {
            KvOp::Get { .. } => BackendOp::Get,
            KvOp::Set { .. } => BackendOp::Set,
        }
    }
}

/// Steps of one exchange, for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExchangeState {
    Dial,
    SendOp,
    SendKey,
    SendValue,
    AwaitReply,
    Respond,
}

impl fmt::Display for ExchangeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExchangeState::Dial => "DIAL",
            ExchangeState::SendOp => "SEND_OP",
            ExchangeState::SendKey => "SEND_KEY",
            ExchangeState::SendValue => "SEND_VALUE",
            ExchangeState::AwaitReply => "AWAIT_REPLY",
            ExchangeState::Respond => "RESPOND",
        };
        f.write_str(name)
    }
}

/// What the client was told.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvOutcome {
    Stored,
    Found { len: usize },
    Missing,
}

/// Runs one key-value request to completion and closes the stream.
pub async fn serve<S>(backend: &BackendClient, mut stream: S, op: KvOp) -> Result<KvOutcome, FrontError>
where
    S: AsyncWrite + Unpin,
{
    let channel = backend.acquire().await;

    let result = match channel.dial().await {
        Ok(exchange) => run_exchange(&exchange, &mut stream, &op).await,
        Err(e) => {
            trace!(state = %ExchangeState::Dial, key = op.key(), "Exchange failed");
            Err(e.into())
        }
    };

    // Teardown: the reply socket is already gone; answer and close while
    // still holding the channel.
    terminate(&mut stream, &result).await;
    drop(channel);

    match &result {
        Ok(outcome) => debug!(key = op.key(), ?outcome, "Exchange complete"),
        Err(e) => debug!(key = op.key(), error = %e, "Exchange aborted"),
    }
    result
}

async fn run_exchange<S>(exchange: &Exchange<'_>, stream: &mut S, op: &KvOp) -> Result<KvOutcome, FrontError>
where
    S: AsyncWrite + Unpin,
{
    let key = op.key();
    trace!(
        state = %ExchangeState::Dial,
        key,
        reply = %exchange.reply_path().display(),
        "Exchange step"
    );

    step(ExchangeState::SendOp, key);
    exchange.send_op(op.backend_op()).await?;

    step(ExchangeState::SendKey, key);
    exchange.send_key(key).await?;

    match op {
        KvOp::Set { value, .. } => {
            step(ExchangeState::SendValue, key);
            exchange.send_value(value).await?;

            step(ExchangeState::Respond, key);
            let head = ResponseHead::new(Status::Ok).serialize();
            write_response(stream, &head, &[]).await?;
            Ok(KvOutcome::Stored)
        }
        KvOp::Get { .. } => {
            step(ExchangeState::AwaitReply, key);
            let reply = exchange.recv_reply(key).await?;

            step(ExchangeState::Respond, key);
            let status = if reply.is_found() {
                Status::Ok
            } else {
                Status::NotFound
            };
            let body = reply.body();
            let head = ResponseHead::new(status)
                .with_content_type(VALUE_CONTENT_TYPE)
                .with_content_length(body.len() as u64)
                .serialize();
            write_response(stream, &head, body).await?;

            Ok(match reply {
                BackendReply::Found(value) => KvOutcome::Found { len: value.len() },
                BackendReply::Missing(_) => KvOutcome::Missing,
            })
        }
    }
}

fn step(state: ExchangeState, key: &str) {
    trace!(state = %state, key, "Exchange step");
}

async fn write_response<S>(stream: &mut S, head: &[u8], body: &[u8]) -> Result<(), FrontError>
where
    S: AsyncWrite + Unpin,
{
    stream
        .write_all(head)
        .await
        .map_err(FrontError::io("write header"))?;
    if !body.is_empty() {
        stream
            .write_all(body)
            .await
            .map_err(FrontError::io("write body"))?;
    }
    stream.flush().await.map_err(FrontError::io("flush"))
}
