use std::net::IpAddr;
use std::sync::Arc;

use chat_mesh::node::service::ChatNode;
use chat_mesh::node::types::NodeEvent;
use chat_mesh::rendezvous::client::RendezvousClient;
use chat_mesh::rendezvous::server::DEFAULT_PORT;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut username: Option<String> = None;
    let mut bind_host: IpAddr = "0.0.0.0".parse()?;
    let mut port: Option<u16> = None;
    let mut join_addr: Option<(String, u16)> = None;
    let mut rendezvous_addr: Option<(String, u16)> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--username" => {
                username = Some(args[i + 1].clone());
                i += 2;
            }
            "--bind" => {
                bind_host = args[i + 1].parse()?;
                i += 2;
            }
            "--port" => {
                port = Some(args[i + 1].parse()?);
                i += 2;
            }
            "--join" => {
                join_addr = Some(parse_host_port(&args[i + 1], None)?);
                i += 2;
            }
            "--rendezvous" => {
                rendezvous_addr = Some(parse_host_port(&args[i + 1], Some(DEFAULT_PORT))?);
                i += 2;
            }
            _ => {
                i += 1;
            }
        }
    }

    let username = match username {
        Some(username) => username,
        None => {
            eprintln!(
                "Usage: {} --username <name> [--bind <ip>] [--port <port>] \
                 [--join <host:port>] [--rendezvous <host[:port]>]",
                args[0]
            );
            std::process::exit(1);
        }
    };

    // Bind failure is fatal: the node has no identity without a listening
    // port.
    let (node, mut events) = ChatNode::new(username.clone(), bind_host, port).await?;
    node.start();

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                NodeEvent::Display(text) => println!("{}", text),
                NodeEvent::PeerStatusChanged { username, status } => {
                    println!("* {} is now {}", username, status)
                }
                NodeEvent::FileChunk(msg) => {
                    // No file-transfer collaborator is wired into this
                    // binary; chunks are only acknowledged in the log.
                    tracing::debug!("file chunk received: {:?}", msg)
                }
            }
        }
    });

    let mut rendezvous: Option<Arc<RendezvousClient>> = None;
    if let Some((host, rdv_port)) = rendezvous_addr {
        let client =
            RendezvousClient::new(username.clone(), node.local_addr.port(), host, rdv_port);
        if client.register().await {
            for user in client.get_online_users().await {
                node.join_network(&user.address, user.port).await;
            }
            rendezvous = Some(client);
        } else {
            println!("Could not register with the rendezvous server; continuing without it.");
        }
    }

    if let Some((host, peer_port)) = join_addr {
        if !node.join_network(&host, peer_port).await {
            println!("Could not join the network through {}:{}.", host, peer_port);
        }
    }

    println!("Type a message and press enter to broadcast. /peers lists peers, /quit exits.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match line {
                        "/quit" => break,
                        "/peers" => {
                            let online = node.get_online_peers();
                            if online.is_empty() {
                                println!("No peers online.");
                            } else {
                                for (peer, record) in online {
                                    println!("  {} at {}:{}", peer, record.address, record.port);
                                }
                            }
                        }
                        text => node.broadcast(text).await,
                    }
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    if let Some(client) = rendezvous {
        client.unregister().await;
    }
    node.disconnect().await;

    Ok(())
}

fn parse_host_port(value: &str, default_port: Option<u16>) -> anyhow::Result<(String, u16)> {
    match value.rsplit_once(':') {
        Some((host, port)) => Ok((host.to_string(), port.parse()?)),
        None => match default_port {
            Some(port) => Ok((value.to_string(), port)),
            None => anyhow::bail!("expected host:port, got '{}'", value),
        },
    }
}
