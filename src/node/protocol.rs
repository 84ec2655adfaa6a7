//! Node Wire Protocol
//!
//! The messages peers exchange over the framing transport. Every frame is one
//! of these variants, discriminated by a `"type"` tag on the wire; a frame
//! whose tag is unknown or whose fields do not match fails to decode and the
//! connection is dropped before any handler runs.

use serde::{Deserialize, Serialize};

/// One peer as reported in a `peer_list` gossip snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerSummary {
    pub username: String,
    pub address: String,
    pub port: u16,
}

/// The peer-to-peer wire protocol.
///
/// - `Join`/`Welcome`: the identity exchange of the join handshake. The
///   joiner's reachable address is taken from the connection's source IP;
///   the payload only supplies its listening port.
/// - `Chat`: broadcast text, no reply.
/// - `Heartbeat`: liveness evidence, no reply. Never creates registry entries.
/// - `Leave`: explicit departure; the only message that deletes an entry.
/// - `RequestPeers`/`PeerList`: one-shot gossip of the current peer snapshot.
/// - `FileChunk`: opaque payload for the file-transfer collaborator; the
///   engine forwards it without interpreting the chunk itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeMessage {
    Join {
        username: String,
        port: u16,
    },

    Welcome {
        username: String,
        port: u16,
    },

    Chat {
        username: String,
        content: String,
    },

    Heartbeat {
        username: String,
    },

    Leave {
        username: String,
    },

    RequestPeers,

    PeerList {
        peers: Vec<PeerSummary>,
    },

    FileChunk {
        transfer_id: String,
        filename: String,
        #[serde(default)]
        data: String,
        #[serde(default)]
        is_last: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sender: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        username: Option<String>,
    },
}
