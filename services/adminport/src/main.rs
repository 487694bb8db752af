//! Replication manager admin port binary.

use cascade_adminport::{AdminPort, PeerForwarder, ReplicationManager};

use clap::Parser;
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cascade-adminport", about = "Cascade replication manager admin port")]
struct Args {
    /// Listen address for the admin HTTP surface
    #[arg(long, default_value = "127.0.0.1:9998")]
    listen: SocketAddr,

    /// Advertised host:port of this node; defaults to the listen address
    #[arg(long)]
    node_addr: Option<String>,

    /// Peer node host:port, repeatable; admin commands are forwarded here
    #[arg(long = "peer")]
    peers: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let node_addr = args.node_addr.unwrap_or_else(|| args.listen.to_string());

    let manager = ReplicationManager::new();
    info!(cluster_uuid = %manager.cluster_uuid(), node_addr = %node_addr, "Starting admin port");

    let forwarder = PeerForwarder::new(&node_addr);
    forwarder.set_peers(args.peers);

    let admin = AdminPort::new(manager, forwarder);
    let (_addr, server) = admin.spawn(args.listen)?;
    server.await?;
    Ok(())
}
