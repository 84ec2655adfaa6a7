//! Decentralized Chat Mesh Library
//!
//! This library crate defines the core modules of a brokerless peer-to-peer
//! chat system: independent nodes discover each other and exchange short text
//! messages directly, with no central message broker.
//!
//! ## Architecture Modules
//! The system is composed of four loosely coupled subsystems:
//!
//! - **`framing`**: The byte-level transport. Length-prefixed JSON frames
//!   over TCP; the substrate every other module speaks over.
//! - **`node`**: The per-node membership and messaging engine. Handles the
//!   join handshake, the peer registry, chat broadcast, and heartbeat-based
//!   liveness detection (a fixed-threshold failure detector).
//! - **`rendezvous`**: The optional presence service and its client, letting
//!   nodes find each other by username instead of by IP and port.
//! - **`error`**: The crate-wide error taxonomy (transport, protocol,
//!   resource).
//!
//! Membership is intentionally eventually consistent: peer lists are gossip
//! snapshots, and nodes converge through periodic heartbeats and re-probing
//! rather than any coordinated view.

pub mod error;
pub mod framing;
pub mod node;
pub mod rendezvous;
