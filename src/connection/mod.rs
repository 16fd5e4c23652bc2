//! Connection-ID issuance and verification (BEP-15 §"Connect").
//!
//! A connection ID is never stored. It is derived from the requesting
//! socket address and the current time slot, hashed together with a
//! process-random secret, so that verifying one only requires recomputing
//! it and comparing - no server-side table of outstanding connections.
//!
//! A connection ID is valid for the current time slot and the one before
//! it, giving clients up to `2 * connection_ttl` (and at least
//! `connection_ttl`) to use it after a `connect`.
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;
use std::time::Duration;

use aquatic_udp_protocol::ConnectionId;
use rand::Rng;

use crate::clock::{CurrentClock, Time};

/// Number of past time slots (in addition to the current one) a connection
/// ID remains valid for. BEP-15 only requires the current slot to stay
/// valid; keeping one extra absorbs clients that connect right at a slot
/// boundary.
const VALID_PAST_SLOTS: u64 = 1;

/// The default `connection_ttl`: not a recognized configuration key (see
/// §6), since BEP-15 clients never need to tune it themselves.
pub const DEFAULT_CONNECTION_TTL: Duration = Duration::from_secs(120);

pub struct ConnectionIdAuthority {
    secret: u64,
    slot_duration: Duration,
}

impl ConnectionIdAuthority {
    /// Builds a new authority with a fresh process-random secret. `ttl` is
    /// the duration of one time slot (the tracker's `connection_ttl`).
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            secret: rand::thread_rng().gen(),
            slot_duration: ttl,
        }
    }

    #[cfg(test)]
    fn with_secret(ttl: Duration, secret: u64) -> Self {
        Self {
            secret,
            slot_duration: ttl,
        }
    }

    fn current_slot(&self) -> u64 {
        let secs = CurrentClock::now().as_secs();
        let slot_secs = self.slot_duration.as_secs().max(1);
        secs / slot_secs
    }

    fn hash_for(&self, remote_address: &SocketAddr, slot: u64) -> u64 {
        let mut hasher = DefaultHasher::new();
        remote_address.hash(&mut hasher);
        slot.hash(&mut hasher);
        self.secret.hash(&mut hasher);
        hasher.finish()
    }

    /// Issues a connection ID for the current time slot.
    #[must_use]
    pub fn issue(&self, remote_address: &SocketAddr) -> ConnectionId {
        ConnectionId(self.hash_for(remote_address, self.current_slot()) as i64)
    }

    /// Verifies that `connection_id` was issued to `remote_address` within
    /// the current slot or the `VALID_PAST_SLOTS` immediately before it.
    #[must_use]
    pub fn verify(&self, remote_address: &SocketAddr, connection_id: ConnectionId) -> bool {
        let current = self.current_slot();
        let presented: i64 = connection_id.0;

        (0..=VALID_PAST_SLOTS).any(|offset| {
            let Some(slot) = current.checked_sub(offset) else {
                return false;
            };
            self.hash_for(remote_address, slot) as i64 == presented
        })
    }
}
