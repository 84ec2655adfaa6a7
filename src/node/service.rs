use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use rand::Rng;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Notify};
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::framing::{recv_message, send_message};

use super::liveness::LivenessMonitor;
use super::protocol::{NodeMessage, PeerSummary};
use super::registry::PeerRegistry;
use super::types::{EventSender, NodeEvent, PeerRecord, PeerStatus};

/// The per-node membership and messaging service.
///
/// Owns the listening socket, the peer registry, and the background loops
/// (accept loop, liveness monitor). Collaborators observe it through the
/// event channel returned by [`ChatNode::new`] and talk back through
/// [`broadcast`](ChatNode::broadcast) and
/// [`send_to_peer`](ChatNode::send_to_peer).
pub struct ChatNode {
    pub username: String,
    /// The bound listening address; its port is what peers are told to dial.
    pub local_addr: SocketAddr,
    pub(crate) peers: Arc<PeerRegistry>,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    events: EventSender,
    listener: Mutex<Option<TcpListener>>,
}

impl ChatNode {
    /// Binds the listening socket and builds the node.
    ///
    /// With no explicit port, a random high port is chosen. A bind failure is
    /// the one unrecoverable error in the system: it propagates to the caller
    /// and the process is expected to exit, since the node has no identity
    /// without a listening port.
    ///
    /// Returns the node together with the receiving half of the event
    /// channel; messages, status changes, and file chunks arrive there.
    pub async fn new(
        username: impl Into<String>,
        bind_host: IpAddr,
        port: Option<u16>,
    ) -> Result<(Arc<Self>, mpsc::UnboundedReceiver<NodeEvent>), Error> {
        let username = username.into();
        let port = port.unwrap_or_else(|| rand::thread_rng().gen_range(49152..=65535));
        let addr = SocketAddr::new(bind_host, port);

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Bind { addr, source: e })?;
        let local_addr = listener.local_addr().map_err(Error::Transport)?;

        let (events, event_rx) = EventSender::channel();

        let node = Arc::new(Self {
            peers: Arc::new(PeerRegistry::new(username.clone())),
            username,
            local_addr,
            running: Arc::new(AtomicBool::new(true)),
            shutdown: Arc::new(Notify::new()),
            events,
            listener: Mutex::new(Some(listener)),
        });

        Ok((node, event_rx))
    }

    /// Spawns the accept loop and the liveness monitor.
    pub fn start(self: &Arc<Self>) {
        let listener = self
            .listener
            .lock()
            .expect("listener lock poisoned")
            .take()
            .expect("start called twice");

        info!("node {} listening on {}", self.username, self.local_addr);
        self.events.display(format!(
            "P2P chat started on port {}. Your username: {}",
            self.local_addr.port(),
            self.username
        ));

        let node = self.clone();
        tokio::spawn(async move {
            node.accept_loop(listener).await;
        });

        let monitor = LivenessMonitor::new(
            self.username.clone(),
            self.peers.clone(),
            self.events.clone(),
            self.running.clone(),
            self.shutdown.clone(),
        );
        tokio::spawn(async move {
            monitor.run().await;
        });
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        loop {
            tokio::select! {
                result = listener.accept() => match result {
                    Ok((stream, source)) => {
                        let node = self.clone();
                        tokio::spawn(async move {
                            node.handle_connection(stream, source).await;
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
        // Dropping the listener here closes the listening socket.
        debug!("accept loop for {} stopped", self.username);
    }

    /// Reads framed messages off one inbound connection until the peer
    /// closes, an error occurs, or the node shuts down.
    async fn handle_connection(self: Arc<Self>, mut stream: TcpStream, source: SocketAddr) {
        while self.running.load(Ordering::SeqCst) {
            match recv_message::<_, NodeMessage>(&mut stream).await {
                Ok(Some(msg)) => {
                    if let Err(e) = self.dispatch(&mut stream, source, msg).await {
                        warn!("error replying to {}: {}", source, e);
                        break;
                    }
                }
                Ok(None) => break,
                Err(Error::Protocol(reason)) => {
                    warn!("dropping connection from {}: {}", source, reason);
                    break;
                }
                Err(e) => {
                    debug!("connection from {} ended: {}", source, e);
                    break;
                }
            }
        }
    }

    /// Handles one decoded message. Only reply sends can fail; everything
    /// else is local state plus events.
    async fn dispatch(
        &self,
        conn: &mut TcpStream,
        source: SocketAddr,
        msg: NodeMessage,
    ) -> Result<(), Error> {
        match msg {
            NodeMessage::Join { username, port } => {
                // The joiner's reachable address is the connection's source
                // IP; the payload only carries its listening port.
                self.peers
                    .upsert(&username, PeerRecord::online(source.ip().to_string(), port));

                send_message(
                    conn,
                    &NodeMessage::Welcome {
                        username: self.username.clone(),
                        port: self.local_addr.port(),
                    },
                )
                .await?;

                info!("{} joined from {}", username, source);
                self.events.display(format!("{} joined the network.", username));
                self.events.status_changed(&username, PeerStatus::Online);
            }

            NodeMessage::Chat { username, content } => {
                self.events.display(format!("{}: {}", username, content));
            }

            NodeMessage::Heartbeat { username } => match self.peers.touch(&username) {
                Some(previous) => {
                    if previous != PeerStatus::Online {
                        self.events.status_changed(&username, PeerStatus::Online);
                    }
                }
                // Heartbeats never create entries.
                None => debug!("heartbeat from unknown peer {}", username),
            },

            NodeMessage::Leave { username } => {
                if self.peers.remove(&username).is_some() {
                    self.events.display(format!("{} left the network.", username));
                }
            }

            NodeMessage::RequestPeers => {
                let peers = self.peer_summaries();
                send_message(conn, &NodeMessage::PeerList { peers }).await?;
            }

            NodeMessage::FileChunk {
                transfer_id,
                filename,
                data,
                is_last,
                sender,
                username,
            } => {
                // The chunk is opaque to the engine; only the sender field is
                // backfilled before handing it to the file-transfer
                // collaborator.
                let sender = match sender.as_deref() {
                    None | Some("You") => {
                        Some(username.clone().unwrap_or_else(|| "Unknown".to_string()))
                    }
                    _ => sender,
                };
                self.events.file_chunk(NodeMessage::FileChunk {
                    transfer_id,
                    filename,
                    data,
                    is_last,
                    sender,
                    username,
                });
            }

            other => {
                warn!("unexpected message from {}: {:?}", source, other);
            }
        }

        Ok(())
    }

    /// Sends a chat message to every known peer over fresh one-shot
    /// connections, iterating a released snapshot of the registry.
    ///
    /// A failed send marks that peer offline (the entry is retained); the
    /// liveness monitor or a later heartbeat can bring it back.
    pub async fn broadcast(&self, text: &str) {
        let msg = NodeMessage::Chat {
            username: self.username.clone(),
            content: text.to_string(),
        };

        let peers = self.peers.snapshot();
        for (peer_username, record) in peers {
            if let Err(e) = self.send_to_peer(&record.address, record.port, &msg).await {
                self.events
                    .display(format!("Error sending message to {}: {}", peer_username, e));
                if self.peers.mark_offline(&peer_username) == Some(PeerStatus::Online) {
                    self.events
                        .status_changed(&peer_username, PeerStatus::Offline);
                }
            }
        }
    }

    /// Joins an existing network through one known peer.
    ///
    /// A strict two-round-trip handshake over a single connection: `join` ->
    /// `welcome` seeds the acceptor into the registry, then `request_peers`
    /// -> `peer_list` merges the acceptor's current gossip snapshot. A
    /// missing or wrong welcome fails the join; a failed peer list does not,
    /// since the identity exchange already succeeded.
    pub async fn join_network(&self, host: &str, port: u16) -> bool {
        let mut stream = match TcpStream::connect((host, port)).await {
            Ok(stream) => stream,
            Err(e) => {
                self.events.display(format!("Error joining network: {}", e));
                return false;
            }
        };

        let join = NodeMessage::Join {
            username: self.username.clone(),
            port: self.local_addr.port(),
        };
        if let Err(e) = send_message(&mut stream, &join).await {
            self.events.display(format!("Error joining network: {}", e));
            return false;
        }

        let (acceptor, acceptor_port) = match recv_message::<_, NodeMessage>(&mut stream).await {
            Ok(Some(NodeMessage::Welcome { username, port })) => (username, port),
            Ok(other) => {
                self.events.display(format!(
                    "Unexpected or missing response when joining: {:?}",
                    other
                ));
                return false;
            }
            Err(e) => {
                self.events.display(format!("Error joining network: {}", e));
                return false;
            }
        };

        self.peers
            .upsert(&acceptor, PeerRecord::online(host, acceptor_port));
        self.events.display(format!(
            "Successfully joined the network through {}.",
            acceptor
        ));

        // Gossip snapshot over the same still-open connection, best-effort.
        let gossip = match send_message(&mut stream, &NodeMessage::RequestPeers).await {
            Ok(()) => recv_message::<_, NodeMessage>(&mut stream).await,
            Err(e) => Err(e),
        };
        match gossip {
            Ok(Some(NodeMessage::PeerList { peers })) => {
                let count = peers.len();
                for peer in peers {
                    // The registry ignores the local username, so a snapshot
                    // that echoes us back merges cleanly.
                    self.peers
                        .upsert(&peer.username, PeerRecord::online(peer.address, peer.port));
                }
                self.events.display(format!(
                    "Received list of existing peers: {} peers found.",
                    count
                ));
            }
            other => debug!("no usable peer list from {}: {:?}", acceptor, other),
        }

        self.events.status_changed(&acceptor, PeerStatus::Online);
        true
    }

    /// Leaves the network: stops the background loops, tells every peer
    /// best-effort, and lets the listening socket close.
    pub async fn disconnect(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.shutdown.notify_waiters();

        let msg = NodeMessage::Leave {
            username: self.username.clone(),
        };
        let peers = self.peers.snapshot();
        for (peer_username, record) in peers {
            if let Err(e) = self.send_to_peer(&record.address, record.port, &msg).await {
                debug!("could not notify {} of departure: {}", peer_username, e);
            }
        }

        info!("node {} disconnected", self.username);
    }

    /// One-shot delivery of a raw protocol message to an arbitrary peer
    /// address: connect, send one frame, close.
    ///
    /// This is the primitive the file-transfer collaborator drives.
    pub async fn send_to_peer(
        &self,
        address: &str,
        port: u16,
        msg: &NodeMessage,
    ) -> Result<(), Error> {
        let mut stream = TcpStream::connect((address, port)).await?;
        send_message(&mut stream, msg).await
    }

    /// Direct access to the peer registry.
    pub fn registry(&self) -> &PeerRegistry {
        &self.peers
    }

    /// Peers currently believed online, as a released copy.
    pub fn get_online_peers(&self) -> std::collections::HashMap<String, PeerRecord> {
        self.peers.online_peers()
    }

    fn peer_summaries(&self) -> Vec<PeerSummary> {
        self.peers
            .snapshot()
            .into_iter()
            .map(|(username, record)| PeerSummary {
                username,
                address: record.address,
                port: record.port,
            })
            .collect()
    }
}
