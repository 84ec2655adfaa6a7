//! Rendezvous (Presence) Service & Client
//!
//! Lets nodes find each other by username instead of by IP and port. The
//! service is a separate long-running process tracking who is online; the
//! client is the thin helper a node uses to register itself, heartbeat, and
//! discover peers.
//!
//! ## Core Mechanisms
//! - **Ephemeral Requests**: every connection carries exactly one request and
//!   at most one reply, over the same framing transport the nodes use.
//! - **Staleness Sweep**: unlike the per-node registry, rendezvous entries ARE
//!   garbage-collected purely by age; the service has no probing capability
//!   of its own, so a silent client simply ages out.
//! - **Self-Reported Addresses**: a registering client derives its own
//!   reachable address from the local endpoint of the registration
//!   connection; the server falls back to the observed source IP when no
//!   address is reported.

pub mod client;
pub mod protocol;
pub mod server;
pub mod types;

#[cfg(test)]
mod tests;
