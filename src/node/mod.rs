//! Membership & Messaging Engine
//!
//! The per-node service: it listens for peers, performs the join handshake,
//! broadcasts chat text, and tracks which peers are still reachable.
//!
//! ## Core Mechanisms
//! - **Join Handshake**: a strict two-round-trip exchange over one connection
//!   (`join` -> `welcome`, then `request_peers` -> `peer_list`) that seeds both
//!   sides' registries.
//! - **Gossip Snapshot**: the peer list handed to a joiner is a point-in-time
//!   copy, not a consistent view; nodes converge through later heartbeats.
//! - **Failure Detection**: a fixed-threshold liveness monitor re-probes stale
//!   peers and flips them between online and offline; staleness alone never
//!   deletes an entry.
//! - **Ephemeral Connections**: every outbound exchange opens a fresh
//!   connection, sends, and closes. There is no pooling or multiplexing.

pub mod liveness;
pub mod protocol;
pub mod registry;
pub mod service;
pub mod types;
