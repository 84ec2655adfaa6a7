//! Peer Registry
//!
//! The mutable heart of the node: a concurrent map from username to
//! [`PeerRecord`]. Handlers and the liveness monitor mutate it through the
//! narrow operations below; anything that fans out over the network first
//! takes a [`snapshot`](PeerRegistry::snapshot) and iterates the released
//! copy, so a slow or unreachable peer can never stall message handling.

use std::collections::HashMap;
use std::time::Instant;

use dashmap::DashMap;

use super::types::{PeerRecord, PeerStatus};

pub struct PeerRegistry {
    local_username: String,
    peers: DashMap<String, PeerRecord>,
}

impl PeerRegistry {
    pub fn new(local_username: impl Into<String>) -> Self {
        Self {
            local_username: local_username.into(),
            peers: DashMap::new(),
        }
    }

    pub fn get(&self, username: &str) -> Option<PeerRecord> {
        self.peers.get(username).map(|entry| entry.value().clone())
    }

    /// Inserts or replaces a peer record.
    ///
    /// The local username is silently ignored: the registry never contains an
    /// entry for the node itself, and this is the single mutation point where
    /// that invariant is enforced.
    pub fn upsert(&self, username: &str, record: PeerRecord) {
        if username == self.local_username {
            return;
        }
        self.peers.insert(username.to_string(), record);
    }

    /// Removes a peer outright. Only `leave` handling and local disconnect
    /// call this; staleness never does.
    pub fn remove(&self, username: &str) -> Option<PeerRecord> {
        self.peers.remove(username).map(|(_, record)| record)
    }

    /// Defensive copy of the whole map. Taken and released before any socket
    /// I/O that iterates peers.
    pub fn snapshot(&self) -> HashMap<String, PeerRecord> {
        self.peers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Records fresh positive evidence for a known peer: advances `last_seen`
    /// and forces the status online. Returns the prior status, or `None` if
    /// the peer is unknown (heartbeats never create entries).
    pub fn touch(&self, username: &str) -> Option<PeerStatus> {
        self.peers.get_mut(username).map(|mut entry| {
            let previous = entry.status;
            entry.last_seen = Instant::now();
            entry.status = PeerStatus::Online;
            previous
        })
    }

    /// Flips a known peer to offline, keeping the entry. Returns the prior
    /// status, or `None` if the peer is unknown.
    pub fn mark_offline(&self, username: &str) -> Option<PeerStatus> {
        self.peers.get_mut(username).map(|mut entry| {
            let previous = entry.status;
            entry.status = PeerStatus::Offline;
            previous
        })
    }

    /// Currently online peers, as a released copy.
    pub fn online_peers(&self) -> HashMap<String, PeerRecord> {
        self.peers
            .iter()
            .filter(|entry| entry.value().status == PeerStatus::Online)
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
