//! The domain tracker (C2 + C3 + C6 composed) and the worker pool that
//! drives it (C4 + C5).
pub mod dispatcher;
pub mod error;
pub mod launcher;

use std::sync::Arc;
use std::time::Duration;

use crate::admission::AdmissionPolicy;
use crate::connection::ConnectionIdAuthority;
use crate::registry::Repository;

/// Everything a received datagram needs to be turned into a reply: the
/// connection-ID authority, the peer registry, the admission policy, and
/// the handful of configured durations the dispatcher consults.
pub struct Tracker {
    pub(crate) connections: ConnectionIdAuthority,
    pub(crate) registry: Arc<dyn Repository>,
    pub(crate) admission: AdmissionPolicy,
    pub(crate) announce_interval: u32,
    pub(crate) expiry_threshold: Duration,
}

impl Tracker {
    #[must_use]
    pub fn new(
        connections: ConnectionIdAuthority,
        registry: Arc<dyn Repository>,
        admission: AdmissionPolicy,
        announce_interval: u32,
    ) -> Self {
        Self {
            connections,
            registry,
            admission,
            announce_interval,
            expiry_threshold: Duration::from_secs(u64::from(announce_interval) * 2),
        }
    }
}
