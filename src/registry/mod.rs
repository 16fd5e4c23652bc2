//! The peer registry (C3): the tracker's in-memory view of every swarm.
//!
//! Storage is behind the [`Repository`] trait so that the dispatcher never
//! depends on the concrete shape of the map; [`memory::InMemoryRepository`]
//! is the only implementation this crate ships, sharded by `info_hash` via
//! `dashmap` so that mutating one swarm never blocks another.
pub mod memory;
pub mod metrics;
pub mod peer;
pub mod swarm;

use std::net::IpAddr;
use std::time::Duration;

use aquatic_udp_protocol::AnnounceEvent;

use self::metrics::RegistryMetrics;
use self::peer::{PeerId, PeerRecord};

pub type InfoHash = [u8; 20];

/// Clamp applied to every `sample_peers` request, independent of what the
/// client asked for.
pub const MAX_PEERS_PER_SAMPLE: usize = 30;

pub trait Repository: Send + Sync {
    /// Returns whether `info_hash` may be announced/scraped against. Under
    /// dynamic registration this also registers the swarm as a side effect.
    fn is_allowed(&self, info_hash: InfoHash) -> bool;

    /// Up to `want` active peers for `info_hash`, excluding `exclude`.
    fn sample_peers(&self, info_hash: InfoHash, want: i32, exclude: PeerId) -> Vec<PeerRecord>;

    /// `(seeders, leechers, completed)` for `info_hash`. Never registers an
    /// unknown swarm.
    fn swarm_stats(&self, info_hash: InfoHash) -> (u32, u32, u32);

    /// Folds one announce event into the named swarm.
    #[allow(clippy::too_many_arguments)]
    fn apply_announce(
        &self,
        info_hash: InfoHash,
        peer_id: PeerId,
        ip: IpAddr,
        port: u16,
        downloaded: u64,
        left: u64,
        uploaded: u64,
        event: AnnounceEvent,
        now: Duration,
    );

    /// Removes peers stale for longer than `expiry_threshold`. Returns the
    /// total number of peers removed across every swarm.
    fn sweep(&self, now: Duration, expiry_threshold: Duration) -> usize;

    /// Aggregate figures across every swarm, for the maintenance worker.
    fn metrics(&self) -> RegistryMetrics;
}

/// Resolves a client's requested peer count against the server's cap,
/// applying the "non-positive means default" tie-break from BEP-15.
#[must_use]
pub fn resolve_want(num_want: i32) -> usize {
    if num_want < 1 {
        MAX_PEERS_PER_SAMPLE
    } else {
        (num_want as usize).min(MAX_PEERS_PER_SAMPLE)
    }
}
