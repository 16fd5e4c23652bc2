//! **torrust-udp-tracker** is a `BitTorrent` UDP tracker core (BEP-15).
//!
//! Clients announce their participation in a swarm identified by a 20-byte
//! `info_hash` over a small binary UDP protocol; the tracker replies with a
//! slice of known peers and records the announcer's membership. Clients may
//! also `scrape` aggregated statistics for a batch of info_hashes.
//!
//! # Components
//!
//! - [`protocol`]: the wire codec - decodes the four request shapes and
//!   encodes the three response shapes BEP-15 defines.
//! - [`connection`]: the connection-ID authority - a short-lived,
//!   unforgeable token binding a request to the (ip, port) that completed
//!   the connect handshake.
//! - [`registry`]: the peer registry - per-swarm peer sets, aggregate
//!   counters, and the expiry sweep, behind the [`registry::Repository`]
//!   trait.
//! - [`admission`]: the admission filter - IANA-source and
//!   client-supplied-IP policy.
//! - [`server`]: the request dispatcher and the worker pool that drives it
//!   against a shared UDP socket.
//! - [`config`]: layered configuration (defaults, then an optional TOML
//!   file, then environment variables).
//! - [`clock`]: a swappable time source so tests can freeze and advance
//!   time instead of racing the wall clock.
//! - [`logging`]: the `tracing` subscriber setup.
//! - [`error`]: operator-facing errors surfaced from the binary entry point.
#![forbid(unsafe_code)]

pub mod admission;
pub mod app;
pub mod clock;
pub mod config;
pub mod connection;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod registry;
pub mod server;
