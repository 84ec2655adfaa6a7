use std::fmt;
use std::time::Instant;

use tokio::sync::mpsc;

use super::protocol::NodeMessage;

/// Reachability of a remote peer as observed locally.
///
/// Transitions: `Online -> Offline` only on a failed liveness probe or a
/// failed send; `Offline -> Online` on a successful probe or any inbound
/// heartbeat/join. Removal is a separate, terminal step taken only on an
/// explicit `leave` or local disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerStatus {
    Online,
    Offline,
}

impl fmt::Display for PeerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerStatus::Online => write!(f, "online"),
            PeerStatus::Offline => write!(f, "offline"),
        }
    }
}

/// Everything the node knows about one remote peer.
#[derive(Debug, Clone)]
pub struct PeerRecord {
    /// Host or IP as observed on the joining connection or reported in gossip.
    pub address: String,
    /// The peer's listening port, not the ephemeral port of any connection.
    pub port: u16,
    /// Most recent positive evidence: join, heartbeat, gossip entry, or a
    /// successful probe.
    pub last_seen: Instant,
    pub status: PeerStatus,
}

impl PeerRecord {
    /// A freshly observed online peer.
    pub fn online(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
            last_seen: Instant::now(),
            status: PeerStatus::Online,
        }
    }
}

/// Outbound notifications for the display / status / file-transfer
/// collaborators. The engine publishes these on an unbounded channel and
/// never blocks on a slow consumer.
#[derive(Debug, Clone)]
pub enum NodeEvent {
    /// Human-readable text for the display collaborator.
    Display(String),

    /// A peer flipped between online and offline, or came online for the
    /// first time.
    PeerStatusChanged {
        username: String,
        status: PeerStatus,
    },

    /// A completed inbound `file_chunk` message, forwarded verbatim for the
    /// file-transfer collaborator.
    FileChunk(NodeMessage),
}

/// Sending half of the event channel.
///
/// Dropping the receiver must not take the node down, so sends ignore a
/// closed channel.
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<NodeEvent>,
}

impl EventSender {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<NodeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn display(&self, text: impl Into<String>) {
        let _ = self.tx.send(NodeEvent::Display(text.into()));
    }

    pub fn status_changed(&self, username: impl Into<String>, status: PeerStatus) {
        let _ = self.tx.send(NodeEvent::PeerStatusChanged {
            username: username.into(),
            status,
        });
    }

    pub fn file_chunk(&self, msg: NodeMessage) {
        let _ = self.tx.send(NodeEvent::FileChunk(msg));
    }
}
