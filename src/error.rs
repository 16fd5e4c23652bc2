//! Operator-facing error types.
//!
//! These are the errors that can stop the process before or during startup:
//! bad configuration, a socket that will not bind. They are propagated all
//! the way out to `main`, which prints them and exits with a non-zero status.
//! Protocol-facing errors (malformed requests, bad connection IDs, ...) never
//! reach this type; they are handled entirely inside the dispatcher, see
//! [`crate::server::dispatcher`].

use std::net::SocketAddr;
use std::panic::Location;

use thiserror::Error;
use torrust_tracker_located_error::LocatedError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to load configuration: {source}")]
    Configuration {
        source: LocatedError<'static, dyn std::error::Error + Send + Sync>,
    },

    #[error("failed to bind UDP socket on {addr}: {source}")]
    SocketBind {
        addr: SocketAddr,
        source: LocatedError<'static, dyn std::error::Error + Send + Sync>,
    },

    #[error("invalid bind address {address:?}: {location}")]
    InvalidBindAddress {
        address: String,
        location: &'static Location<'static>,
    },
}
