//! Message Framing Transport
//!
//! The byte-level substrate every other subsystem speaks over. Each frame is a
//! 4-byte big-endian length prefix followed by that many bytes of UTF-8 JSON
//! encoding one protocol message.
//!
//! ## Core Mechanisms
//! - **Framing**: length prefix + payload written as a single buffer, so prefix
//!   and body can never be observed interleaved on a shared stream.
//! - **Bounded Reads**: a declared length above 100 MiB is a protocol violation
//!   and the body is never read (guards against memory exhaustion from a
//!   malicious or corrupt length field).
//! - **Typed Decode**: payloads deserialize into closed tagged unions, so an
//!   unknown or structurally invalid message is rejected here, before dispatch.

pub mod codec;

pub use codec::{recv_message, send_message, MAX_FRAME_BYTES, RECV_TIMEOUT};

#[cfg(test)]
mod tests;
