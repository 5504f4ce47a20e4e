//! Node configuration: validated builder plus the TOML file form consumed by
//! the binary.

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use verdant_world::{CheckpointPolicy, Keyring};
use verdant_world_net::MultiAddr;

use crate::error::NodeError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    pub node_id: String,
    pub topic: String,
    pub listen_port: u16,
    pub bootstrap_peers: Vec<MultiAddr>,
    pub private_key_hex: Option<String>,
    pub checkpoint: CheckpointPolicy,
    pub poll_interval: Duration,
}

impl NodeConfig {
    pub fn new(node_id: impl Into<String>, topic: impl Into<String>) -> Result<Self, NodeError> {
        let node_id = node_id.into();
        let topic = topic.into();
        if node_id.trim().is_empty() {
            return Err(NodeError::InvalidConfig {
                reason: "node_id cannot be empty".to_string(),
            });
        }
        if topic.trim().is_empty() {
            return Err(NodeError::InvalidConfig {
                reason: "topic cannot be empty".to_string(),
            });
        }
        Ok(Self {
            node_id,
            topic,
            listen_port: 0,
            bootstrap_peers: Vec::new(),
            private_key_hex: None,
            checkpoint: CheckpointPolicy::default(),
            poll_interval: Duration::from_millis(20),
        })
    }

    pub fn with_listen_port(mut self, port: u16) -> Self {
        self.listen_port = port;
        self
    }

    pub fn with_bootstrap_peers(mut self, peers: Vec<String>) -> Result<Self, NodeError> {
        let mut parsed = Vec::with_capacity(peers.len());
        for raw in peers {
            let addr = MultiAddr::from_str(&raw).map_err(|err| NodeError::InvalidConfig {
                reason: format!("bootstrap peer {}: {}", raw, err),
            })?;
            parsed.push(addr);
        }
        self.bootstrap_peers = parsed;
        Ok(self)
    }

    /// Absent key material leaves the node able to verify but not author.
    pub fn with_private_key_hex(mut self, seed_hex: impl Into<String>) -> Result<Self, NodeError> {
        let seed_hex = seed_hex.into();
        Keyring::from_seed_hex(&seed_hex).map_err(|err| NodeError::InvalidConfig {
            reason: format!("private key material: {}", err),
        })?;
        self.private_key_hex = Some(seed_hex);
        Ok(self)
    }

    pub fn with_checkpoint_threshold(mut self, commit_threshold: u64) -> Result<Self, NodeError> {
        if commit_threshold == 0 {
            return Err(NodeError::InvalidConfig {
                reason: "checkpoint threshold must be positive".to_string(),
            });
        }
        self.checkpoint = CheckpointPolicy { commit_threshold };
        Ok(self)
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Result<Self, NodeError> {
        if interval.is_zero() {
            return Err(NodeError::InvalidConfig {
                reason: "poll_interval must be positive".to_string(),
            });
        }
        self.poll_interval = interval;
        Ok(self)
    }

    pub fn keyring(&self) -> Result<Option<Keyring>, NodeError> {
        match &self.private_key_hex {
            None => Ok(None),
            Some(seed_hex) => Keyring::from_seed_hex(seed_hex)
                .map(Some)
                .map_err(|err| NodeError::InvalidConfig {
                    reason: format!("private key material: {}", err),
                }),
        }
    }
}

/// Resolves a bootstrap multi address to the socket the UDP transport dials.
pub fn peer_socket(addr: &MultiAddr) -> Result<SocketAddr, NodeError> {
    let target = format!("{}:{}", addr.host, addr.port);
    target
        .to_socket_addrs()
        .map_err(|err| NodeError::InvalidConfig {
            reason: format!("cannot resolve {}: {}", target, err),
        })?
        .next()
        .ok_or_else(|| NodeError::InvalidConfig {
            reason: format!("no socket address for {}", target),
        })
}

/// On-disk form loaded by the `verdant-node` binary.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeFileConfig {
    pub node_id: String,
    pub topic: String,
    #[serde(default)]
    pub listen_port: u16,
    #[serde(default)]
    pub bootstrap_peers: Vec<String>,
    #[serde(default)]
    pub private_key_hex: Option<String>,
    #[serde(default)]
    pub checkpoint_threshold: Option<u64>,
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl NodeFileConfig {
    pub fn load(path: &std::path::Path) -> Result<Self, NodeError> {
        let raw = std::fs::read_to_string(path).map_err(|err| NodeError::InvalidConfig {
            reason: format!("read {} failed: {}", path.display(), err),
        })?;
        toml::from_str(&raw).map_err(|err| NodeError::InvalidConfig {
            reason: format!("parse {} failed: {}", path.display(), err),
        })
    }

    pub fn into_node_config(self) -> Result<NodeConfig, NodeError> {
        let mut config = NodeConfig::new(self.node_id, self.topic)?
            .with_listen_port(self.listen_port)
            .with_bootstrap_peers(self.bootstrap_peers)?;
        if let Some(seed_hex) = self.private_key_hex {
            config = config.with_private_key_hex(seed_hex)?;
        }
        if let Some(threshold) = self.checkpoint_threshold {
            config = config.with_checkpoint_threshold(threshold)?;
        }
        if let Some(millis) = self.poll_interval_ms {
            config = config.with_poll_interval(Duration::from_millis(millis))?;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEER: &str = "ip4/127.0.0.1/udp/7402/gossip/verdant/QmWPDDVPfBSrkrHjxt2wQ9JNsH4RNCQ2NkpFi9GHxTQvz9";

    #[test]
    fn empty_node_id_is_rejected() {
        let err = NodeConfig::new("  ", "t").expect_err("must fail");
        assert!(matches!(err, NodeError::InvalidConfig { .. }));
    }

    #[test]
    fn bootstrap_peers_are_parsed() {
        let config = NodeConfig::new("n1", "t")
            .expect("config")
            .with_bootstrap_peers(vec![PEER.to_string()])
            .expect("peers");
        assert_eq!(config.bootstrap_peers.len(), 1);
        assert_eq!(config.bootstrap_peers[0].port, 7402);
    }

    #[test]
    fn malformed_bootstrap_peer_is_rejected() {
        let err = NodeConfig::new("n1", "t")
            .expect("config")
            .with_bootstrap_peers(vec!["nonsense".to_string()])
            .expect_err("must fail");
        assert!(matches!(err, NodeError::InvalidConfig { .. }));
    }

    #[test]
    fn bad_key_material_is_rejected() {
        let err = NodeConfig::new("n1", "t")
            .expect("config")
            .with_private_key_hex("zz")
            .expect_err("must fail");
        assert!(matches!(err, NodeError::InvalidConfig { .. }));
    }

    #[test]
    fn peer_socket_resolves_ipv4() {
        let addr = MultiAddr::from_str(PEER).expect("addr");
        let socket = peer_socket(&addr).expect("socket");
        assert_eq!(socket.port(), 7402);
    }

    #[test]
    fn file_config_maps_to_node_config() {
        let file: NodeFileConfig = toml::from_str(
            r#"
            node_id = "n1"
            topic = "verdant-main"
            listen_port = 7401
            checkpoint_threshold = 4
            poll_interval_ms = 10
            "#,
        )
        .expect("toml");
        let config = file.into_node_config().expect("node config");
        assert_eq!(config.listen_port, 7401);
        assert_eq!(config.checkpoint.commit_threshold, 4);
        assert_eq!(config.poll_interval, Duration::from_millis(10));
        assert!(config.private_key_hex.is_none());
    }
}
