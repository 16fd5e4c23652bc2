//! The dispatcher's protocol-facing error type.
//!
//! These never propagate out of a worker task; the dispatcher catches each
//! one at the point it occurs and converts it into either a silent drop
//! (see [`crate::server::dispatcher`]) or a short wire-level error reply.
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Tracker couldn't understand Client's request.")]
    Malformed,

    #[error("info hash not found in database")]
    UnknownInfoHash,

    #[error("client IP address not allowed")]
    DisallowedRemoteIp,
}
