//! A sharded, in-memory [`Repository`](super::Repository).
//!
//! Each `info_hash` lives in its own `dashmap` shard; mutating one swarm
//! never blocks a read or mutation of another, satisfying the concurrency
//! model's "sharded map keyed by `info_hash`" recommendation without a
//! single global mutex.
use std::net::IpAddr;
use std::time::Duration;

use aquatic_udp_protocol::AnnounceEvent;
use dashmap::DashMap;

use super::metrics::RegistryMetrics;
use super::peer::{PeerId, PeerRecord};
use super::swarm::SwarmEntry;
use super::{InfoHash, Repository};

pub struct InMemoryRepository {
    swarms: DashMap<InfoHash, SwarmEntry>,
    is_dynamic: bool,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new(is_dynamic: bool) -> Self {
        Self {
            swarms: DashMap::new(),
            is_dynamic,
        }
    }
}

impl Repository for InMemoryRepository {
    fn is_allowed(&self, info_hash: InfoHash) -> bool {
        if self.is_dynamic {
            self.swarms.entry(info_hash).or_default();
            return true;
        }

        self.swarms.contains_key(&info_hash)
    }

    fn sample_peers(&self, info_hash: InfoHash, want: i32, exclude: PeerId) -> Vec<PeerRecord> {
        let want = super::resolve_want(want);

        self.swarms.get(&info_hash).map_or_else(Vec::new, |swarm| swarm.sample(want, &exclude))
    }

    fn swarm_stats(&self, info_hash: InfoHash) -> (u32, u32, u32) {
        self.swarms
            .get(&info_hash)
            .map_or((0, 0, 0), |swarm| (swarm.seeders(), swarm.leechers(), swarm.completed()))
    }

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
    ) {
        self.swarms
            .entry(info_hash)
            .or_default()
            .apply_announce(peer_id, ip, port, downloaded, left, uploaded, event, now);
    }

    fn sweep(&self, now: Duration, expiry_threshold: Duration) -> usize {
        let mut removed = 0;
        for mut swarm in self.swarms.iter_mut() {
            removed += swarm.sweep(now, expiry_threshold);
        }
        removed
    }

    fn metrics(&self) -> RegistryMetrics {
        let mut metrics = RegistryMetrics {
            torrents: self.swarms.len() as u64,
            ..RegistryMetrics::default()
        };

        for swarm in &self.swarms {
            metrics.seeders += u64::from(swarm.seeders());
            metrics.leechers += u64::from(swarm.leechers());
            metrics.completed += u64::from(swarm.completed());
        }

        metrics
    }
}
