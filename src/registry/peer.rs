//! A single peer's reported state within one swarm.
use std::net::IpAddr;
use std::time::Duration;

pub type PeerId = [u8; 20];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Seeding,
    Leeching,
}

impl PeerState {
    /// A peer with nothing left to download is a seeder; BEP-15 derives
    /// this straight from the `left` field rather than trusting the event.
    #[must_use]
    pub fn from_left(left: u64) -> Self {
        if left == 0 {
            Self::Seeding
        } else {
            Self::Leeching
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PeerRecord {
    pub peer_id: PeerId,
    pub ip: IpAddr,
    pub port: u16,
    pub downloaded: u64,
    pub uploaded: u64,
    pub left: u64,
    pub state: PeerState,
    pub last_seen: Duration,
}

impl PeerRecord {
    #[must_use]
    pub fn is_stale(&self, now: Duration, expiry_threshold: Duration) -> bool {
        self.last_seen + expiry_threshold < now
    }
}
