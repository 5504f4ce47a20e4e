//! Wire message envelope exchanged between peers.
//!
//! Every message is a tagged union; the `type` discriminator is a stable
//! string so independently built nodes agree on decoding. Record payloads are
//! carried as serialized bytes and decoded by the core crate's registry.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const WIRE_TAG_CANDIDATE: &str = "record.candidate";
pub const WIRE_TAG_REGION_REF: &str = "stem.region_ref";
pub const WIRE_TAG_PEER_INFO: &str = "peer.address";

const KNOWN_TAGS: [&str; 3] = [WIRE_TAG_CANDIDATE, WIRE_TAG_REGION_REF, WIRE_TAG_PEER_INFO];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    Decode { reason: String },
    UnknownMessageType { tag: String },
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::Decode { reason } => write!(f, "wire decode failed: {}", reason),
            WireError::UnknownMessageType { tag } => {
                write!(f, "unknown wire message type: {}", tag)
            }
        }
    }
}

impl std::error::Error for WireError {}

/// A signed record candidate announced to the network.
///
/// The record itself travels as serialized bytes; `record_hash` duplicates
/// the record's content hash so receivers can deduplicate without decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateAnnounce {
    pub record_json: Vec<u8>,
    pub record_hash: String,
}

/// Notification that a region checkpoint reached the stem chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionRefAnnounce {
    pub rx: u32,
    pub ry: u32,
    pub height: u64,
    pub record_hash: String,
}

/// Maps a transport peer id to its reachable address and ledger account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerAddressInfo {
    pub peer_id: String,
    pub multiaddr: String,
    pub account: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WireMessage {
    #[serde(rename = "record.candidate")]
    Candidate(CandidateAnnounce),
    #[serde(rename = "stem.region_ref")]
    RegionRef(RegionRefAnnounce),
    #[serde(rename = "peer.address")]
    PeerInfo(PeerAddressInfo),
}

impl WireMessage {
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        serde_json::to_vec(self).map_err(|err| WireError::Decode {
            reason: format!("serialize wire message failed: {}", err),
        })
    }

    /// Decodes a wire message, distinguishing an unrecognized discriminator
    /// from malformed bytes so the listener can keep the connection alive in
    /// both cases.
    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        let value: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|err| WireError::Decode {
                reason: format!("wire message is not valid json: {}", err),
            })?;
        let tag = value
            .get("type")
            .and_then(|tag| tag.as_str())
            .ok_or_else(|| WireError::Decode {
                reason: "wire message is missing the type discriminator".to_string(),
            })?;
        if !KNOWN_TAGS.contains(&tag) {
            return Err(WireError::UnknownMessageType {
                tag: tag.to_string(),
            });
        }
        serde_json::from_value(value).map_err(|err| WireError::Decode {
            reason: format!("wire message body is malformed: {}", err),
        })
    }
}
