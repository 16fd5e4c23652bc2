//! Wire codec (BEP-15).
//!
//! Decoding and encoding themselves are delegated entirely to
//! `aquatic_udp_protocol`'s typed request/response enums; this module only
//! pins down the size constants the rest of the crate needs to agree on and
//! the thin `decode`/`encode` entry points the dispatcher calls.
use std::io::Cursor;

use aquatic_udp_protocol::{Request, Response};

/// Maximum size of a single incoming datagram this tracker will read.
pub const MAX_PACKET_SIZE: usize = 2048;

/// Smallest possible request: the 16-byte common prefix (connect, or a
/// malformed frame). Anything shorter is silently dropped by the dispatcher.
pub const MIN_REQUEST_SIZE: usize = 16;

/// An announce request's fixed size (16-byte prefix + 82 bytes of fields).
pub const ANNOUNCE_REQUEST_SIZE: usize = 98;

/// Upper bound on info_hashes accepted in a single scrape request.
pub const MAX_SCRAPE_TORRENTS: u8 = 74;

/// Largest response this tracker ever writes: a 20-byte announce response
/// prefix plus 6 bytes per peer, capped at 200 peers.
pub const MAX_ANNOUNCE_RESPONSE_SIZE: usize = 20 + 6 * 200;

/// Largest error response this tracker ever writes.
pub const MAX_ERROR_RESPONSE_SIZE: usize = 1024;

/// The magic connection ID a well-behaved client sends with a connect
/// request. The dispatcher does not enforce this - any value is accepted
/// and a fresh token is issued regardless, per the protocol's own slack.
pub const PROTOCOL_ID: i64 = 0x0417_2710_1980;

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("malformed request: {0}")]
    Malformed(String),
}

/// Parses a raw datagram into a typed request.
///
/// # Errors
///
/// Returns [`DecodeError`] if the bytes do not form a well-formed request of
/// any recognized shape.
pub fn decode(bytes: &[u8]) -> Result<Request, DecodeError> {
    Request::from_bytes(bytes, MAX_SCRAPE_TORRENTS).map_err(|e| DecodeError::Malformed(e.to_string()))
}

/// Serializes a response into `buf`, returning the number of bytes written.
///
/// # Panics
///
/// Panics if the response cannot be written to an in-memory buffer, which
/// would indicate a logic error (e.g. a response that violates its own
/// size bound) rather than an I/O failure.
pub fn encode(response: &Response, buf: &mut [u8]) -> usize {
    let mut cursor = Cursor::new(buf);
    response.write_bytes(&mut cursor).expect("encoding a response into an in-memory buffer cannot fail");
    #[allow(clippy::cast_possible_truncation)]
    let written = cursor.position() as usize;
    written
}
