//! Liveness Monitor
//!
//! The failure detector behind each node's view of its peers. Every poll
//! interval it walks a snapshot of the registry and re-probes only the
//! entries whose last positive evidence has gone stale; fresh peers cost
//! nothing. A successful probe forces the peer online, a failed one flips it
//! offline. The monitor never deletes anything: removal is reserved for an
//! explicit `leave` or local disconnect.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::TcpStream;
use tokio::sync::Notify;
use tracing::debug;

use crate::error::Error;
use crate::framing::send_message;

use super::protocol::NodeMessage;
use super::registry::PeerRegistry;
use super::types::{EventSender, PeerRecord, PeerStatus};

/// How often the monitor wakes up.
pub const PROBE_INTERVAL: Duration = Duration::from_secs(10);
/// Age of `last_seen` past which a peer is suspect and gets probed.
pub const STALE_AFTER: Duration = Duration::from_secs(15);
/// Connect deadline for one probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct LivenessMonitor {
    username: String,
    peers: Arc<PeerRegistry>,
    events: EventSender,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
}

impl LivenessMonitor {
    pub(crate) fn new(
        username: String,
        peers: Arc<PeerRegistry>,
        events: EventSender,
        running: Arc<AtomicBool>,
        shutdown: Arc<Notify>,
    ) -> Self {
        Self {
            username,
            peers,
            events,
            running,
            shutdown,
        }
    }

    pub async fn run(self) {
        let mut interval = tokio::time::interval(PROBE_INTERVAL);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if !self.running.load(Ordering::SeqCst) {
                        break;
                    }
                    self.sweep_once().await;
                }
                _ = self.shutdown.notified() => break,
            }
        }

        debug!("liveness monitor for {} stopped", self.username);
    }

    /// One pass over the registry snapshot: probe every stale entry and flip
    /// statuses accordingly. Probes run against the released snapshot, so a
    /// hung peer delays only this sweep, never message handling.
    pub async fn sweep_once(&self) {
        let peers = self.peers.snapshot();
        let now = Instant::now();

        for (username, record) in peers {
            if now.saturating_duration_since(record.last_seen) <= STALE_AFTER {
                continue;
            }

            match self.probe(&record).await {
                Ok(()) => {
                    if let Some(previous) = self.peers.touch(&username) {
                        if previous != PeerStatus::Online {
                            self.events.status_changed(&username, PeerStatus::Online);
                        }
                    }
                }
                Err(e) => {
                    debug!("probe of {} ({}:{}) failed: {}", username, record.address, record.port, e);
                    // Offline, not gone: the entry stays until an explicit leave.
                    if let Some(previous) = self.peers.mark_offline(&username) {
                        if previous != PeerStatus::Offline {
                            self.events
                                .display(format!("{} appears to be offline.", username));
                            self.events.status_changed(&username, PeerStatus::Offline);
                        }
                    }
                }
            }
        }
    }

    /// Opens a fresh connection to the peer and delivers one heartbeat.
    async fn probe(&self, record: &PeerRecord) -> Result<(), Error> {
        let connect = TcpStream::connect((record.address.as_str(), record.port));
        let mut stream = tokio::time::timeout(PROBE_TIMEOUT, connect)
            .await
            .map_err(|_| Error::timed_out())??;

        send_message(
            &mut stream,
            &NodeMessage::Heartbeat {
                username: self.username.clone(),
            },
        )
        .await
    }
}
