use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::framing::{recv_message, send_message};
use crate::node::protocol::PeerSummary;

use super::protocol::{RendezvousRequest, RendezvousResponse};

/// How often a registered client refreshes its presence entry.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(20);
/// Connect deadline when first reaching the presence service.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Thin helper a node uses to register with, heartbeat, and query the
/// presence service. Every exchange is its own short-lived connection.
pub struct RendezvousClient {
    username: String,
    /// The node's chat listening port, advertised to other users.
    chat_port: u16,
    server_host: String,
    server_port: u16,
    running: Arc<AtomicBool>,
    registered: AtomicBool,
}

impl RendezvousClient {
    pub fn new(
        username: impl Into<String>,
        chat_port: u16,
        server_host: impl Into<String>,
        server_port: u16,
    ) -> Arc<Self> {
        Arc::new(Self {
            username: username.into(),
            chat_port,
            server_host: server_host.into(),
            server_port,
            running: Arc::new(AtomicBool::new(false)),
            registered: AtomicBool::new(false),
        })
    }

    /// Registers this user with the presence service and, on success, starts
    /// the background heartbeat loop.
    ///
    /// The reachable address is derived from the local endpoint of the
    /// registration connection itself, falling back to loopback when the OS
    /// reports the unspecified address. All failures come back as `false`.
    pub async fn register(self: &Arc<Self>) -> bool {
        let connect = TcpStream::connect((self.server_host.as_str(), self.server_port));
        let mut stream = match tokio::time::timeout(CONNECT_TIMEOUT, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                warn!(
                    "presence server not reachable at {}:{}: {}",
                    self.server_host, self.server_port, e
                );
                return false;
            }
            Err(_) => {
                warn!(
                    "timed out connecting to presence server at {}:{}",
                    self.server_host, self.server_port
                );
                return false;
            }
        };

        let address = match stream.local_addr() {
            Ok(addr) if !addr.ip().is_unspecified() => addr.ip().to_string(),
            _ => "127.0.0.1".to_string(),
        };

        let request = RendezvousRequest::Register {
            username: self.username.clone(),
            port: self.chat_port,
            address: Some(address),
        };
        if let Err(e) = send_message(&mut stream, &request).await {
            warn!("error registering with presence server: {}", e);
            return false;
        }

        match recv_message::<_, RendezvousResponse>(&mut stream).await {
            Ok(Some(RendezvousResponse::RegisterResponse { success: true, .. })) => {
                self.registered.store(true, Ordering::SeqCst);
                self.running.store(true, Ordering::SeqCst);

                let client = self.clone();
                tokio::spawn(async move {
                    client.heartbeat_loop().await;
                });

                info!("registered with presence server as {}", self.username);
                true
            }
            Ok(Some(RendezvousResponse::RegisterResponse { reason, .. })) => {
                warn!(
                    "registration failed: {}",
                    reason.unwrap_or_else(|| "unknown error".to_string())
                );
                false
            }
            Ok(other) => {
                warn!("unexpected registration reply: {:?}", other);
                false
            }
            Err(e) => {
                warn!("no registration reply: {}", e);
                false
            }
        }
    }

    /// Everyone the presence service currently knows, minus this user.
    /// Any failure is logged and yields an empty list.
    pub async fn get_online_users(&self) -> Vec<PeerSummary> {
        match self.query().await {
            Ok(users) => users
                .into_iter()
                .filter(|user| user.username != self.username)
                .collect(),
            Err(e) => {
                warn!("error querying online users: {}", e);
                Vec::new()
            }
        }
    }

    async fn query(&self) -> Result<Vec<PeerSummary>, Error> {
        let mut stream =
            TcpStream::connect((self.server_host.as_str(), self.server_port)).await?;
        send_message(&mut stream, &RendezvousRequest::Query).await?;

        match recv_message::<_, RendezvousResponse>(&mut stream).await? {
            Some(RendezvousResponse::OnlineUsers { users }) => Ok(users),
            other => Err(Error::Protocol(format!(
                "unexpected reply to query: {:?}",
                other
            ))),
        }
    }

    /// Stops the heartbeat loop and tells the service we are gone,
    /// best-effort.
    pub async fn unregister(&self) {
        self.running.store(false, Ordering::SeqCst);

        if !self.registered.swap(false, Ordering::SeqCst) {
            return;
        }

        let result = async {
            let mut stream =
                TcpStream::connect((self.server_host.as_str(), self.server_port)).await?;
            send_message(
                &mut stream,
                &RendezvousRequest::Unregister {
                    username: self.username.clone(),
                },
            )
            .await
        }
        .await;

        match result {
            Ok(()) => info!("unregistered from presence server"),
            Err(e) => warn!("error unregistering from presence server: {}", e),
        }
    }

    /// Best-effort presence refresh every [`HEARTBEAT_INTERVAL`]. Errors are
    /// logged and swallowed; the loop never retries more aggressively.
    async fn heartbeat_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(HEARTBEAT_INTERVAL);

        while self.running.load(Ordering::SeqCst) {
            interval.tick().await;
            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            let result = async {
                let mut stream =
                    TcpStream::connect((self.server_host.as_str(), self.server_port)).await?;
                send_message(
                    &mut stream,
                    &RendezvousRequest::Heartbeat {
                        username: self.username.clone(),
                    },
                )
                .await
            }
            .await;

            if let Err(e) = result {
                debug!("error sending presence heartbeat: {}", e);
            }
        }
    }
}
