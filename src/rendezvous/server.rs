use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::framing::{recv_message, send_message};
use crate::node::protocol::PeerSummary;

use super::protocol::{RendezvousRequest, RendezvousResponse};
use super::types::RendezvousRecord;

/// Port the presence service listens on unless told otherwise.
pub const DEFAULT_PORT: u16 = 7000;
/// How often the staleness sweep runs.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(30);
/// Age past which an entry is silently deleted.
pub const STALE_AFTER: Duration = Duration::from_secs(60);

/// The presence service: a username -> address book for nodes that have no
/// prior knowledge of each other.
pub struct RendezvousServer {
    pub local_addr: SocketAddr,
    pub(crate) users: DashMap<String, RendezvousRecord>,
    running: AtomicBool,
    shutdown: Notify,
    listener: Mutex<Option<TcpListener>>,
}

impl RendezvousServer {
    /// Binds the listening socket. A bind failure is fatal: the service has
    /// nothing to offer without its well-known port.
    pub async fn new(addr: SocketAddr) -> Result<Arc<Self>, Error> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Bind { addr, source: e })?;
        let local_addr = listener.local_addr().map_err(Error::Transport)?;

        Ok(Arc::new(Self {
            local_addr,
            users: DashMap::new(),
            running: AtomicBool::new(true),
            shutdown: Notify::new(),
            listener: Mutex::new(Some(listener)),
        }))
    }

    /// Spawns the accept loop and the staleness sweep.
    pub fn start(self: &Arc<Self>) {
        let listener = self
            .listener
            .lock()
            .expect("listener lock poisoned")
            .take()
            .expect("start called twice");

        info!("rendezvous server running on {}", self.local_addr);

        let server = self.clone();
        tokio::spawn(async move {
            server.accept_loop(listener).await;
        });

        let server = self.clone();
        tokio::spawn(async move {
            server.sweep_loop().await;
        });
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.notify_waiters();
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        loop {
            tokio::select! {
                result = listener.accept() => match result {
                    Ok((stream, source)) => {
                        let server = self.clone();
                        tokio::spawn(async move {
                            server.handle_client(stream, source).await;
                        });
                    }
                    Err(e) => {
                        if self.running.load(Ordering::SeqCst) {
                            warn!("error accepting connection: {}", e);
                        }
                    }
                },
                _ = self.shutdown.notified() => break,
            }
        }
        debug!("rendezvous accept loop stopped");
    }

    /// Serves exactly one request, then the connection closes.
    async fn handle_client(self: Arc<Self>, mut stream: TcpStream, source: SocketAddr) {
        let request = match recv_message::<_, RendezvousRequest>(&mut stream).await {
            Ok(Some(request)) => request,
            Ok(None) => return,
            Err(e) => {
                debug!("dropping connection from {}: {}", source, e);
                return;
            }
        };

        match request {
            RendezvousRequest::Register {
                username,
                port,
                address,
            } => {
                // An empty username or a zero port counts as missing.
                if username.is_empty() || port == 0 {
                    let reply = RendezvousResponse::RegisterResponse {
                        success: false,
                        reason: Some("missing required fields".to_string()),
                    };
                    if let Err(e) = send_message(&mut stream, &reply).await {
                        debug!("could not send register rejection to {}: {}", source, e);
                    }
                    return;
                }

                let address = address.unwrap_or_else(|| source.ip().to_string());
                info!("registered user: {} at {}:{}", username, address, port);
                self.users
                    .insert(username, RendezvousRecord::new(address, port));

                let reply = RendezvousResponse::RegisterResponse {
                    success: true,
                    reason: None,
                };
                if let Err(e) = send_message(&mut stream, &reply).await {
                    debug!("could not send register reply to {}: {}", source, e);
                }
            }

            RendezvousRequest::Query => {
                let users: Vec<PeerSummary> = self
                    .users
                    .iter()
                    .map(|entry| PeerSummary {
                        username: entry.key().clone(),
                        address: entry.value().address.clone(),
                        port: entry.value().port,
                    })
                    .collect();

                let reply = RendezvousResponse::OnlineUsers { users };
                if let Err(e) = send_message(&mut stream, &reply).await {
                    debug!("could not send user list to {}: {}", source, e);
                }
            }

            RendezvousRequest::Heartbeat { username } => {
                // Touch only what already exists; a heartbeat never
                // resurrects a swept entry.
                if let Some(mut entry) = self.users.get_mut(&username) {
                    entry.last_seen = Instant::now();
                }
            }

            RendezvousRequest::Unregister { username } => {
                if self.users.remove(&username).is_some() {
                    info!("unregistered user: {}", username);
                }
            }
        }
    }

    async fn sweep_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        // The immediate first tick would sweep an empty map; skip it.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if !self.running.load(Ordering::SeqCst) {
                        break;
                    }
                    self.sweep_once();
                }
                _ = self.shutdown.notified() => break,
            }
        }
    }

    /// Deletes every entry older than [`STALE_AFTER`]. Silent by design: no
    /// one is notified of a swept user.
    pub(crate) fn sweep_once(&self) {
        let now = Instant::now();
        self.users.retain(|username, record| {
            let fresh = now.saturating_duration_since(record.last_seen) <= STALE_AFTER;
            if !fresh {
                info!("removed stale user: {}", username);
            }
            fresh
        });
    }
}
