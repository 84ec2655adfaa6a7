//! Rendezvous Wire Protocol
//!
//! Request and reply records for the presence service, tag-discriminated the
//! same way as the node protocol.

use serde::{Deserialize, Serialize};

use crate::node::protocol::PeerSummary;

/// What a client may ask the presence service.
///
/// `Register` keeps serde defaults on its fields so a request with a missing
/// username or port still decodes; the server answers those with an explicit
/// `{success: false, reason}` instead of dropping the connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RendezvousRequest {
    Register {
        #[serde(default)]
        username: String,
        #[serde(default)]
        port: u16,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        address: Option<String>,
    },

    Query,

    Heartbeat {
        username: String,
    },

    Unregister {
        username: String,
    },
}

/// What the presence service sends back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RendezvousResponse {
    RegisterResponse {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    OnlineUsers {
        users: Vec<PeerSummary>,
    },
}
