use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::process;
use std::sync::{mpsc, Arc};

use tracing_subscriber::EnvFilter;

use verdant_world::{ChainStore, FileChainStore, InMemoryChainStore};
use verdant_world_net::{UdpGossipConfig, UdpGossipNetwork};
use verdant_world_node::{peer_socket, NodeFileConfig, WorldNode};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    if let Err(err) = run() {
        eprintln!("verdant-node: {err}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| "verdant-node.toml".to_string());
    let file = NodeFileConfig::load(Path::new(&config_path))?;
    let data_dir = file.data_dir.clone();
    let config = file.into_node_config()?;

    let peers = config
        .bootstrap_peers
        .iter()
        .map(peer_socket)
        .collect::<Result<Vec<_>, _>>()?;
    let bind_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), config.listen_port);
    let network = Arc::new(UdpGossipNetwork::bind(&UdpGossipConfig { bind_addr, peers })?);

    let store: Arc<dyn ChainStore> = match data_dir {
        Some(dir) => Arc::new(FileChainStore::open(dir)?),
        None => Arc::new(InMemoryChainStore::new()),
    };

    let mut node = WorldNode::new(config, network, store)?;
    node.start()?;

    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })?;
    let _ = stop_rx.recv();

    node.stop()?;
    Ok(())
}
