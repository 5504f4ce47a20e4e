//! Peer addressing: base58 peer ids and the 7-field multi address form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::NetError;

const SEPARATOR: char = '/';
const FIELD_COUNT: usize = 7;

/// Base58 peer identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(raw: impl Into<String>) -> Result<Self, NetError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(NetError::AddressFormat {
                reason: "peer id cannot be empty".to_string(),
            });
        }
        bs58::decode(&raw)
            .into_vec()
            .map_err(|_| NetError::AddressFormat {
                reason: format!("peer id is not valid base58: {}", raw),
            })?;
        Ok(PeerId(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reachable peer address:
/// `family/host/transport/port/application/protocol/peerId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MultiAddr {
    pub family: String,
    pub host: String,
    pub transport: String,
    pub port: u16,
    pub application: String,
    pub protocol: String,
    pub peer_id: PeerId,
}

impl FromStr for MultiAddr {
    type Err = NetError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let components: Vec<&str> = raw.split(SEPARATOR).collect();
        if components.len() != FIELD_COUNT {
            return Err(NetError::AddressFormat {
                reason: format!(
                    "expected {} slash-separated fields, got {}",
                    FIELD_COUNT,
                    components.len()
                ),
            });
        }
        for (index, component) in components.iter().enumerate().take(FIELD_COUNT - 1) {
            if component.is_empty() {
                return Err(NetError::AddressFormat {
                    reason: format!("field {} is empty", index),
                });
            }
        }
        let port = components[3].parse::<u16>().map_err(|_| NetError::AddressFormat {
            reason: format!("port is not a non-negative integer: {}", components[3]),
        })?;
        Ok(MultiAddr {
            family: components[0].to_string(),
            host: components[1].to_string(),
            transport: components[2].to_string(),
            port,
            application: components[4].to_string(),
            protocol: components[5].to_string(),
            peer_id: PeerId::new(components[6])?,
        })
    }
}

impl fmt::Display for MultiAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}{sep}{}{sep}{}{sep}{}{sep}{}",
            self.family,
            self.host,
            self.transport,
            self.port,
            self.application,
            self.protocol,
            self.peer_id,
            sep = SEPARATOR
        )
    }
}
