//! The request dispatcher (C4): decodes a datagram, routes it to the right
//! handler, and decides whether the outcome is a silent drop or a reply.
//!
//! Nothing here suspends; every registry and connection-authority call is
//! synchronous, so a single datagram's worth of work never yields control
//! back to the runtime mid-dispatch.
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use aquatic_udp_protocol::{
    AnnounceEvent, AnnounceInterval, AnnounceRequest, AnnounceResponse, ConnectRequest, ConnectResponse, ErrorResponse,
    NumberOfDownloads, NumberOfPeers, Port, Request, Response, ResponsePeer, ScrapeRequest, ScrapeResponse,
    TorrentScrapeStatistics, TransactionId,
};

use super::error::DispatchError;
use super::Tracker;
use crate::clock::{CurrentClock, Time};
use crate::protocol::{self, ANNOUNCE_REQUEST_SIZE, MIN_REQUEST_SIZE};

/// The `action` BEP-15 connect requests carry.
const ACTION_CONNECT: i32 = 0;
/// The `action` BEP-15 announce requests carry.
const ACTION_ANNOUNCE: i32 = 1;

/// Dispatches one datagram. Returns the number of bytes written into `out`,
/// or `None` if the datagram should be silently dropped.
pub fn dispatch(tracker: &Tracker, datagram: &[u8], source: SocketAddr, out: &mut [u8]) -> Option<usize> {
    if datagram.len() < MIN_REQUEST_SIZE {
        return None;
    }

    if !tracker.admission.accepts_source(source.ip()) {
        return None;
    }

    let action = i32::from_be_bytes(datagram[8..12].try_into().expect("slice is exactly 4 bytes"));

    // A known action carrying a length that cannot possibly decode to its
    // own shape is a malformed frame, not a different kind of request - it
    // is silently dropped, not answered, so probing the service with
    // mis-sized datagrams never yields a distinguishable reply (see §7).
    if action == ACTION_ANNOUNCE && datagram.len() != ANNOUNCE_REQUEST_SIZE {
        return None;
    }

    let request = match protocol::decode(datagram) {
        Ok(request) => request,
        Err(_) => {
            if action == ACTION_CONNECT || action == ACTION_ANNOUNCE {
                return None;
            }
            return Some(write_error(out, TransactionId(0), DispatchError::Malformed));
        }
    };

    match request {
        Request::Connect(connect) => Some(handle_connect(tracker, &connect, source, out)),
        Request::Announce(announce) => handle_announce(tracker, &announce, source, out),
        Request::Scrape(scrape) => handle_scrape(tracker, &scrape, source, out),
    }
}

fn handle_connect(tracker: &Tracker, request: &ConnectRequest, source: SocketAddr, out: &mut [u8]) -> usize {
    let connection_id = tracker.connections.issue(&source);

    let response = Response::from(ConnectResponse {
        transaction_id: request.transaction_id,
        connection_id,
    });

    protocol::encode(&response, out)
}

fn handle_announce(tracker: &Tracker, request: &AnnounceRequest, source: SocketAddr, out: &mut [u8]) -> Option<usize> {
    if !tracker.connections.verify(&source, request.connection_id) {
        return None;
    }

    let claimed_ip = request.ip_address.map(IpAddr::V4);

    if !tracker.admission.accepts_claimed_ip(claimed_ip) {
        return Some(write_error(out, request.transaction_id, DispatchError::DisallowedRemoteIp));
    }

    let info_hash = request.info_hash.0;

    if !tracker.registry.is_allowed(info_hash) {
        return Some(write_error(out, request.transaction_id, DispatchError::UnknownInfoHash));
    }

    let effective_ip = claimed_ip.unwrap_or_else(|| source.ip());
    let peer_id = request.peer_id.0;
    let event = request.event;

    let downloaded = u64::try_from(request.bytes_downloaded.0).unwrap_or(0);
    let left = u64::try_from(request.bytes_left.0).unwrap_or(0);
    let uploaded = u64::try_from(request.bytes_uploaded.0).unwrap_or(0);

    // The announce is applied before the peer list and aggregate counts are
    // read, so the response's seeders/leechers include the announcer's own,
    // just-reported state (S2/S3). The announcer is still excluded from the
    // sampled peer list itself via `exclude=peer_id`, so it never sees its
    // own entry - that is the only part of the exchange "respond first,
    // then mutate" (§4.4) protects.
    tracker.registry.apply_announce(
        info_hash,
        peer_id,
        effective_ip,
        request.port.0,
        downloaded,
        left,
        uploaded,
        event,
        CurrentClock::now(),
    );

    let peers = if event == AnnounceEvent::Stopped {
        Vec::new()
    } else {
        tracker.registry.sample_peers(info_hash, request.peers_wanted.0, peer_id)
    };

    let (seeders, leechers, _completed) = tracker.registry.swarm_stats(info_hash);

    let response = Response::from(AnnounceResponse {
        transaction_id: request.transaction_id,
        announce_interval: AnnounceInterval(i32::try_from(tracker.announce_interval).unwrap_or(i32::MAX)),
        leechers: NumberOfPeers(i32::try_from(leechers).unwrap_or(i32::MAX)),
        seeders: NumberOfPeers(i32::try_from(seeders).unwrap_or(i32::MAX)),
        peers: peers
            .iter()
            .filter_map(|peer| match peer.ip {
                IpAddr::V4(ip) => Some(ResponsePeer::<Ipv4Addr> {
                    ip_address: ip,
                    port: Port(peer.port),
                }),
                IpAddr::V6(_) => None,
            })
            .collect(),
    });

    let written = protocol::encode(&response, out);

    Some(written)
}

fn handle_scrape(tracker: &Tracker, request: &ScrapeRequest, source: SocketAddr, out: &mut [u8]) -> Option<usize> {
    if !tracker.connections.verify(&source, request.connection_id) {
        return None;
    }

    let torrent_stats = request
        .info_hashes
        .iter()
        .map(|info_hash| {
            let (seeders, leechers, completed) = tracker.registry.swarm_stats(info_hash.0);
            TorrentScrapeStatistics {
                seeders: NumberOfPeers(i32::try_from(seeders).unwrap_or(i32::MAX)),
                completed: NumberOfDownloads(i32::try_from(completed).unwrap_or(i32::MAX)),
                leechers: NumberOfPeers(i32::try_from(leechers).unwrap_or(i32::MAX)),
            }
        })
        .collect();

    let response = Response::from(ScrapeResponse {
        transaction_id: request.transaction_id,
        torrent_stats,
    });

    Some(protocol::encode(&response, out))
}

fn write_error(out: &mut [u8], transaction_id: TransactionId, error: DispatchError) -> usize {
    let mut message = error.to_string();
    if message.len() > 1000 {
        message.truncate(1000);
    }

    let response = Response::from(ErrorResponse {
        transaction_id,
        message: message.into(),
    });

    protocol::encode(&response, out)
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::sync::Arc;
    use std::time::Duration;

    use aquatic_udp_protocol::{
        AnnounceEvent, AnnounceRequest, InfoHash as AquaticInfoHash, NumberOfBytes, NumberOfPeers, PeerId as AquaticPeerId,
        PeerKey, Port, Request, Response, ScrapeRequest, TransactionId,
    };

    use super::dispatch;
    use crate::admission::AdmissionPolicy;
    use crate::clock::{Stopped, Time};
    use crate::connection::ConnectionIdAuthority;
    use crate::protocol::MAX_PACKET_SIZE;
    use crate::registry::memory::InMemoryRepository;
    use crate::server::Tracker;

    fn tracker() -> Tracker {
        Tracker::new(
            ConnectionIdAuthority::new(Duration::from_secs(120)),
            Arc::new(InMemoryRepository::new(true)),
            AdmissionPolicy::new(true, false),
            1800,
        )
    }

    fn addr(a: u8, b: u8, c: u8, d: u8, port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(a, b, c, d)), port)
    }

    fn issue_connection_id(tracker: &Tracker, source: SocketAddr) -> aquatic_udp_protocol::ConnectionId {
        tracker.connections.issue(&source)
    }

    #[test]
    fn s1_connect_issues_a_verifiable_token() {
        Stopped::set(Duration::from_secs(1_000_000));
        let tracker = tracker();
        let source = addr(192, 0, 2, 7, 40000);

        let mut request_buf = [0u8; 16];
        request_buf[0..8].copy_from_slice(&crate::protocol::PROTOCOL_ID.to_be_bytes());
        request_buf[8..12].copy_from_slice(&0i32.to_be_bytes());
        request_buf[12..16].copy_from_slice(&0xDEAD_BEEFu32.to_be_bytes());

        let mut out = [0u8; MAX_PACKET_SIZE];
        let n = dispatch(&tracker, &request_buf, source, &mut out).expect("connect replies");

        assert_eq!(n, 16);
        assert_eq!(&out[0..4], &0i32.to_be_bytes());
        assert_eq!(&out[4..8], &0xDEAD_BEEFu32.to_be_bytes());

        let token = i64::from_be_bytes(out[8..16].try_into().unwrap());
        assert!(tracker.connections.verify(&source, aquatic_udp_protocol::ConnectionId(token)));
    }

    #[allow(clippy::too_many_arguments)]
    fn announce_bytes(
        connection_id: aquatic_udp_protocol::ConnectionId,
        info_hash: [u8; 20],
        peer_id: [u8; 20],
        left: i64,
        event: AnnounceEvent,
        port: u16,
        num_want: i32,
    ) -> Vec<u8> {
        let request = AnnounceRequest {
            connection_id,
            transaction_id: TransactionId(1),
            info_hash: AquaticInfoHash(info_hash),
            peer_id: AquaticPeerId(peer_id),
            bytes_downloaded: NumberOfBytes(0),
            bytes_uploaded: NumberOfBytes(0),
            bytes_left: NumberOfBytes(left),
            event,
            ip_address: None,
            key: PeerKey(0),
            peers_wanted: NumberOfPeers(num_want),
            port: Port(port),
        };

        let mut buf = vec![0u8; MAX_PACKET_SIZE];
        let written = crate::protocol::encode(&Response::from(Request::Announce(request)), &mut buf);
        buf.truncate(written);
        buf
    }

    #[test]
    fn s2_fresh_announce_from_a_single_peer_gets_no_peers_back() {
        Stopped::set(Duration::from_secs(1_000_000));
        let tracker = tracker();
        let peer1 = addr(192, 0, 2, 7, 40000);
        let connection_id = issue_connection_id(&tracker, peer1);

        let datagram = announce_bytes(connection_id, [1; 20], [0xAA; 20], 100, AnnounceEvent::Started, 6881, 50);

        let mut out = [0u8; MAX_PACKET_SIZE];
        let n = dispatch(&tracker, &datagram, peer1, &mut out).expect("announce replies");

        assert_eq!(n, 20, "no peers should be returned to the sole announcer");

        let leechers = i32::from_be_bytes(out[12..16].try_into().unwrap());
        let seeders = i32::from_be_bytes(out[16..20].try_into().unwrap());
        assert_eq!(
            (seeders, leechers),
            (0, 1),
            "the announcer is counted in the aggregate even though it is excluded from its own peer list"
        );

        let (seeders, leechers, _) = tracker.registry.swarm_stats([1; 20]);
        assert_eq!((seeders, leechers), (0, 1));
    }

    #[test]
    fn s3_second_peer_joining_sees_the_first_peer() {
        Stopped::set(Duration::from_secs(1_000_000));
        let tracker = tracker();
        let peer1 = addr(192, 0, 2, 7, 40000);
        let peer2 = addr(198, 51, 100, 9, 6882);

        let c1 = issue_connection_id(&tracker, peer1);
        let d1 = announce_bytes(c1, [1; 20], [0xAA; 20], 100, AnnounceEvent::Started, 6881, 50);
        let mut scratch = [0u8; MAX_PACKET_SIZE];
        dispatch(&tracker, &d1, peer1, &mut scratch);

        let c2 = issue_connection_id(&tracker, peer2);
        let d2 = announce_bytes(c2, [1; 20], [0xBB; 20], 0, AnnounceEvent::Completed, 6882, 50);

        let mut out = [0u8; MAX_PACKET_SIZE];
        let n = dispatch(&tracker, &d2, peer2, &mut out).expect("announce replies");

        assert_eq!(n, 26, "one compact peer entry: 20 + 6");

        let leechers = i32::from_be_bytes(out[12..16].try_into().unwrap());
        let seeders = i32::from_be_bytes(out[16..20].try_into().unwrap());
        assert_eq!(
            (seeders, leechers),
            (1, 1),
            "the second peer's own announce should already be reflected in the aggregate"
        );

        let (seeders, leechers, completed) = tracker.registry.swarm_stats([1; 20]);
        assert_eq!((seeders, leechers, completed), (1, 1, 1));
    }

    #[test]
    fn s4_scrape_reports_zero_stats_for_an_unknown_hash() {
        Stopped::set(Duration::from_secs(1_000_000));
        let tracker = tracker();
        let peer1 = addr(192, 0, 2, 7, 40000);
        let connection_id = issue_connection_id(&tracker, peer1);

        let d1 = announce_bytes(connection_id, [1; 20], [0xAA; 20], 0, AnnounceEvent::Completed, 6881, 50);
        let mut scratch = [0u8; MAX_PACKET_SIZE];
        dispatch(&tracker, &d1, peer1, &mut scratch);

        let scrape = ScrapeRequest {
            connection_id,
            transaction_id: TransactionId(2),
            info_hashes: vec![AquaticInfoHash([1; 20]), AquaticInfoHash([2; 20])],
        };
        let mut buf = vec![0u8; MAX_PACKET_SIZE];
        let written = crate::protocol::encode(&Response::from(Request::Scrape(scrape)), &mut buf);

        let mut out = [0u8; MAX_PACKET_SIZE];
        let n = dispatch(&tracker, &buf[..written], peer1, &mut out).expect("scrape replies");

        assert_eq!(n, 8 + 24);
    }

    #[test]
    fn s5_stop_removes_the_peer_but_keeps_the_swarm() {
        Stopped::set(Duration::from_secs(1_000_000));
        let tracker = tracker();
        let peer1 = addr(192, 0, 2, 7, 40000);
        let connection_id = issue_connection_id(&tracker, peer1);

        let started = announce_bytes(connection_id, [1; 20], [0xAA; 20], 0, AnnounceEvent::Completed, 6881, 50);
        let mut scratch = [0u8; MAX_PACKET_SIZE];
        dispatch(&tracker, &started, peer1, &mut scratch);

        let stopped = announce_bytes(connection_id, [1; 20], [0xAA; 20], 0, AnnounceEvent::Stopped, 6881, 50);
        let mut out = [0u8; MAX_PACKET_SIZE];
        let n = dispatch(&tracker, &stopped, peer1, &mut out).expect("announce replies");

        assert_eq!(n, 20);
        let (seeders, leechers, completed) = tracker.registry.swarm_stats([1; 20]);
        assert_eq!((seeders, leechers, completed), (0, 0, 1));
    }

    #[test]
    fn s6_expiry_sweep_removes_stale_peers_but_keeps_completed_count() {
        Stopped::set(Duration::from_secs(0));
        let tracker = tracker();
        let peer1 = addr(192, 0, 2, 7, 40000);
        let connection_id = issue_connection_id(&tracker, peer1);

        let datagram = announce_bytes(connection_id, [1; 20], [0xAA; 20], 0, AnnounceEvent::Completed, 6881, 50);
        let mut scratch = [0u8; MAX_PACKET_SIZE];
        dispatch(&tracker, &datagram, peer1, &mut scratch);

        Stopped::advance(Duration::from_secs(u64::from(tracker.announce_interval) * 2 + 1));
        tracker.registry.sweep(Stopped::now(), tracker.expiry_threshold);

        let (seeders, leechers, completed) = tracker.registry.swarm_stats([1; 20]);
        assert_eq!((seeders, leechers, completed), (0, 0, 1));
    }

    #[test]
    fn a_runt_datagram_is_silently_dropped() {
        let tracker = tracker();
        let mut out = [0u8; MAX_PACKET_SIZE];
        assert!(dispatch(&tracker, &[0u8; 8], addr(192, 0, 2, 7, 1), &mut out).is_none());
    }

    #[test]
    fn a_source_in_a_reserved_range_is_dropped_even_with_a_well_formed_connect() {
        let tracker = tracker();
        let mut request_buf = [0u8; 16];
        request_buf[0..8].copy_from_slice(&crate::protocol::PROTOCOL_ID.to_be_bytes());

        let mut out = [0u8; MAX_PACKET_SIZE];
        assert!(dispatch(&tracker, &request_buf, addr(127, 0, 0, 1, 1), &mut out).is_none());
    }

    #[test]
    fn an_announce_with_an_unverifiable_connection_id_is_dropped() {
        let tracker = tracker();
        let bogus = aquatic_udp_protocol::ConnectionId(0);
        let datagram = announce_bytes(bogus, [1; 20], [0xAA; 20], 0, AnnounceEvent::Started, 6881, 50);

        let mut out = [0u8; MAX_PACKET_SIZE];
        assert!(dispatch(&tracker, &datagram, addr(192, 0, 2, 7, 1), &mut out).is_none());
    }

    #[test]
    fn a_runt_announce_is_silently_dropped_not_answered_with_an_error() {
        Stopped::set(Duration::from_secs(1_000_000));
        let tracker = tracker();
        let peer1 = addr(192, 0, 2, 7, 40000);
        let connection_id = issue_connection_id(&tracker, peer1);

        let full = announce_bytes(connection_id, [1; 20], [0xAA; 20], 100, AnnounceEvent::Started, 6881, 50);
        assert_eq!(full.len(), 98);

        let mut out = [0u8; MAX_PACKET_SIZE];
        assert!(
            dispatch(&tracker, &full[..97], peer1, &mut out).is_none(),
            "a 97-byte announce must be silently dropped, not answered with a protocol error"
        );

        let n = dispatch(&tracker, &full, peer1, &mut out).expect("a 98-byte announce is processed");
        assert_eq!(n, 20);
    }
}
