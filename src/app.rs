//! Composition root (C10): wires configuration, logging, the domain
//! [`Tracker`](crate::server::Tracker), and the worker pool together into a
//! runnable process.
//!
//! One function loads configuration, one builds the domain tracker from it,
//! and one spawns the worker pool bound to that tracker. `main` sequences
//! the three and waits for a shutdown signal it does not itself decide to
//! raise.
use std::sync::Arc;

use crate::admission::AdmissionPolicy;
use crate::config::Configuration;
use crate::connection::{ConnectionIdAuthority, DEFAULT_CONNECTION_TTL};
use crate::error::Error;
use crate::registry::memory::InMemoryRepository;
use crate::registry::Repository;
use crate::server::launcher::Launcher;
use crate::server::Tracker;

/// Loads the layered configuration (defaults -> optional TOML file ->
/// environment). `config_toml_path` is the `-c`/`--config` CLI argument, if
/// one was given.
///
/// # Errors
///
/// Returns [`Error::Configuration`] if the merged document fails to
/// deserialize, and any validation error the configuration itself raises.
pub fn configure(config_toml_path: Option<&str>) -> Result<Configuration, Error> {
    Configuration::load(config_toml_path)
}

/// Builds the domain [`Tracker`] (registry + admission policy + connection
/// authority) described by a loaded [`Configuration`].
///
/// The registry backend is always the in-memory implementation this crate
/// ships; `database.driver` is accepted and otherwise ignored, matching
/// §6's "opaque to the core" contract for unrecognized drivers.
#[must_use]
pub fn tracker(config: &Configuration) -> Arc<Tracker> {
    let registry: Arc<dyn Repository> = Arc::new(InMemoryRepository::new(config.tracker.is_dynamic));

    let admission = AdmissionPolicy::new(config.tracker.allow_remotes, config.tracker.allow_iana_ips);

    let connections = ConnectionIdAuthority::new(DEFAULT_CONNECTION_TTL);

    Arc::new(Tracker::new(connections, registry, admission, config.tracker.announce_interval))
}

/// Binds the UDP socket and spawns the receiver and maintenance workers
/// described by `config` against `tracker`.
///
/// # Errors
///
/// Returns [`Error::SocketBind`] if the socket cannot be bound, and
/// [`Error::InvalidBindAddress`] if `tracker.bind` does not parse.
pub async fn start(config: &Configuration, tracker: Arc<Tracker>) -> Result<Launcher, Error> {
    let bind_to = config.tracker.bind_address()?;
    let worker_count = config.tracker.receiver_worker_count();
    let cleanup_interval = std::time::Duration::from_secs(u64::from(config.tracker.cleanup_interval));

    Launcher::start(tracker, bind_to, worker_count, cleanup_interval).await
}
