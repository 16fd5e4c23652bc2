//! Binds the UDP socket and drives the worker pool (C5).
//!
//! Unlike a per-datagram task-spawn model, this launcher starts a fixed
//! number of long-lived receiver tasks up front, each looping `recv_from`
//! on a socket shared via `Arc`. A datagram is dispatched synchronously on
//! whichever task happened to receive it - there is no per-request task
//! spawn, and so no per-request allocation of a tokio task. A separate
//! maintenance task sweeps expired peers and logs aggregate registry
//! metrics on its own interval.
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};

use super::dispatcher;
use super::Tracker;
use crate::clock::{CurrentClock, Time};
use crate::error::Error;
use crate::protocol::MAX_PACKET_SIZE;

const UDP_TRACKER_LOG_TARGET: &str = "UDP TRACKER";
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(1);

/// A running tracker: the receiver workers and maintenance task, plus the
/// means to stop them.
pub struct Launcher {
    shutdown_tx: watch::Sender<bool>,
    workers: Vec<tokio::task::JoinHandle<()>>,
    maintenance: tokio::task::JoinHandle<()>,
    local_addr: SocketAddr,
}

impl Launcher {
    /// Binds `bind_to` and starts `worker_count` receiver tasks plus one
    /// maintenance task that sweeps the registry every `cleanup_interval`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SocketBind`] if the socket cannot be bound.
    pub async fn start(
        tracker: Arc<Tracker>,
        bind_to: SocketAddr,
        worker_count: usize,
        cleanup_interval: Duration,
    ) -> Result<Self, Error> {
        let socket = UdpSocket::bind(bind_to).await.map_err(|e| Error::SocketBind {
            addr: bind_to,
            source: torrust_tracker_located_error::Located(e).into(),
        })?;

        let local_addr = socket.local_addr().unwrap_or(bind_to);
        let socket = Arc::new(socket);

        tracing::info!(target: UDP_TRACKER_LOG_TARGET, %local_addr, worker_count, "starting");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let workers = (0..worker_count)
            .map(|id| {
                tokio::task::spawn(run_receiver(id, socket.clone(), tracker.clone(), shutdown_rx.clone()))
            })
            .collect();

        let maintenance = tokio::task::spawn(run_maintenance(tracker, cleanup_interval, shutdown_rx));

        Ok(Self {
            shutdown_tx,
            workers,
            maintenance,
            local_addr,
        })
    }

    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Signals every worker to stop, then waits up to one second for them to
    /// exit before abandoning the slow ones.
    pub async fn shutdown(self) {
        tracing::info!(target: UDP_TRACKER_LOG_TARGET, local_addr = %self.local_addr, "stopping");

        let _ = self.shutdown_tx.send(true);

        let all = join_workers(self.workers, self.maintenance);

        if tokio::time::timeout(SHUTDOWN_GRACE_PERIOD, all).await.is_err() {
            tracing::warn!(
                target: UDP_TRACKER_LOG_TARGET,
                local_addr = %self.local_addr,
                "grace period elapsed before every worker stopped"
            );
        }
    }
}

async fn join_workers(workers: Vec<tokio::task::JoinHandle<()>>, maintenance: tokio::task::JoinHandle<()>) {
    for worker in workers {
        let _ = worker.await;
    }
    let _ = maintenance.await;
}

async fn run_receiver(id: usize, socket: Arc<UdpSocket>, tracker: Arc<Tracker>, mut shutdown_rx: watch::Receiver<bool>) {
    let mut buf = [0u8; MAX_PACKET_SIZE];
    let mut out = [0u8; MAX_PACKET_SIZE];

    loop {
        tokio::select! {
            biased;

            _ = shutdown_rx.changed() => {
                tracing::debug!(target: UDP_TRACKER_LOG_TARGET, worker = id, "stopping");
                return;
            }

            received = socket.recv_from(&mut buf) => {
                let (len, source) = match received {
                    Ok(pair) => pair,
                    Err(e) => {
                        tracing::warn!(target: UDP_TRACKER_LOG_TARGET, worker = id, err = %e, "recv_from failed");
                        continue;
                    }
                };

                if let Some(written) = dispatcher::dispatch(&tracker, &buf[..len], source, &mut out) {
                    if let Err(e) = socket.send_to(&out[..written], source).await {
                        tracing::debug!(target: UDP_TRACKER_LOG_TARGET, worker = id, %source, err = %e, "send_to failed");
                    }
                }
            }
        }
    }
}

async fn run_maintenance(tracker: Arc<Tracker>, cleanup_interval: Duration, mut shutdown_rx: watch::Receiver<bool>) {
    let mut ticker = interval(cleanup_interval.max(Duration::from_secs(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = shutdown_rx.changed() => {
                tracing::debug!(target: UDP_TRACKER_LOG_TARGET, "maintenance stopping");
                return;
            }

            _ = ticker.tick() => {
                let removed = tracker.registry.sweep(CurrentClock::now(), tracker.expiry_threshold);
                let metrics = tracker.registry.metrics();

                tracing::info!(
                    target: UDP_TRACKER_LOG_TARGET,
                    torrents = metrics.torrents,
                    seeders = metrics.seeders,
                    leechers = metrics.leechers,
                    completed = metrics.completed,
                    expired_peers_removed = removed,
                    "maintenance sweep"
                );
            }
        }
    }
}
