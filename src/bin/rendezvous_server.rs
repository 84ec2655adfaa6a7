use std::net::SocketAddr;

use chat_mesh::rendezvous::server::{RendezvousServer, DEFAULT_PORT};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut bind_addr: SocketAddr = SocketAddr::new("0.0.0.0".parse()?, DEFAULT_PORT);
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" => {
                bind_addr = args[i + 1].parse()?;
                i += 2;
            }
            _ => {
                i += 1;
            }
        }
    }

    let server = RendezvousServer::new(bind_addr).await?;
    server.start();

    println!("Rendezvous server running on {}. Press Ctrl+C to stop.", server.local_addr);
    tokio::signal::ctrl_c().await?;

    println!("Stopping rendezvous server...");
    server.stop();

    Ok(())
}
