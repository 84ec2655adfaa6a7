use std::time::Instant;

/// One registered user as the presence service tracks it.
///
/// No status field: a rendezvous entry is either fresh enough to hand out or
/// old enough to be swept away entirely.
#[derive(Debug, Clone)]
pub struct RendezvousRecord {
    /// Reported by the client, or the connection's observed source IP when
    /// the client reported none.
    pub address: String,
    /// The user's chat listening port.
    pub port: u16,
    pub last_seen: Instant,
}

impl RendezvousRecord {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
            last_seen: Instant::now(),
        }
    }
}
