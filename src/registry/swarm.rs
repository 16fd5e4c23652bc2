//! Per-`info_hash` swarm state: the set of active peers plus the live
//! counters the wire protocol reports back to clients.
use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;

use aquatic_udp_protocol::AnnounceEvent;

use super::peer::{PeerId, PeerRecord, PeerState};

#[derive(Debug, Default)]
pub struct SwarmEntry {
    peers: HashMap<PeerId, PeerRecord>,
    seeders: u32,
    leechers: u32,
    completed: u32,
}

impl SwarmEntry {
    #[must_use]
    pub fn seeders(&self) -> u32 {
        self.seeders
    }

    #[must_use]
    pub fn leechers(&self) -> u32 {
        self.leechers
    }

    #[must_use]
    pub fn completed(&self) -> u32 {
        self.completed
    }

    #[must_use]
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    fn bump(&mut self, state: PeerState, by: i32) {
        match state {
            PeerState::Seeding => self.seeders = (i64::from(self.seeders) + i64::from(by)).max(0) as u32,
            PeerState::Leeching => self.leechers = (i64::from(self.leechers) + i64::from(by)).max(0) as u32,
        }
    }

    /// Returns up to `want` peers, never including `exclude`.
    #[must_use]
    pub fn sample(&self, want: usize, exclude: &PeerId) -> Vec<PeerRecord> {
        self.peers
            .values()
            .filter(|p| &p.peer_id != exclude)
            .take(want)
            .copied()
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn apply_announce(
        &mut self,
        peer_id: PeerId,
        ip: IpAddr,
        port: u16,
        downloaded: u64,
        left: u64,
        uploaded: u64,
        event: AnnounceEvent,
        now: Duration,
    ) {
        if event == AnnounceEvent::Stopped {
            if let Some(removed) = self.peers.remove(&peer_id) {
                self.bump(removed.state, -1);
            }
            return;
        }

        let new_state = PeerState::from_left(left);
        let previous = self.peers.get(&peer_id).copied();

        if event == AnnounceEvent::Completed && previous.map(|p| p.state) != Some(PeerState::Seeding) {
            self.completed += 1;
        }

        match previous {
            Some(old) if old.state != new_state => {
                self.bump(old.state, -1);
                self.bump(new_state, 1);
            }
            None => self.bump(new_state, 1),
            Some(_) => {}
        }

        self.peers.insert(
            peer_id,
            PeerRecord {
                peer_id,
                ip,
                port,
                downloaded,
                uploaded,
                left,
                state: new_state,
                last_seen: now,
            },
        );
    }

    /// Removes peers stale for longer than `expiry_threshold`. Returns the
    /// number of peers removed.
    pub fn sweep(&mut self, now: Duration, expiry_threshold: Duration) -> usize {
        let stale: Vec<PeerId> = self
            .peers
            .values()
            .filter(|p| p.is_stale(now, expiry_threshold))
            .map(|p| p.peer_id)
            .collect();

        for peer_id in &stale {
            if let Some(removed) = self.peers.remove(peer_id) {
                self.bump(removed.state, -1);
            }
        }

        stale.len()
    }
}
