use std::fmt;

use verdant_world::RejectReason;
use verdant_world_net::NetError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    InvalidConfig { reason: String },
    AlreadyRunning { node_id: String },
    NotRunning { node_id: String },
    ReadOnly { node_id: String },
    ActionRejected { reason: RejectReason },
    Chain { reason: String },
    Sync { reason: String },
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeError::InvalidConfig { reason } => write!(f, "invalid node config: {}", reason),
            NodeError::AlreadyRunning { node_id } => {
                write!(f, "node already running: {}", node_id)
            }
            NodeError::NotRunning { node_id } => write!(f, "node not running: {}", node_id),
            NodeError::ReadOnly { node_id } => {
                write!(
                    f,
                    "node {} has no key material and cannot author records",
                    node_id
                )
            }
            NodeError::ActionRejected { reason } => write!(f, "action rejected: {}", reason),
            NodeError::Chain { reason } => write!(f, "chain error: {}", reason),
            NodeError::Sync { reason } => write!(f, "sync error: {}", reason),
        }
    }
}

impl std::error::Error for NodeError {}

impl From<NetError> for NodeError {
    fn from(error: NetError) -> Self {
        NodeError::Sync {
            reason: error.to_string(),
        }
    }
}
