use std::fmt;

use verdant_world_proto::wire::WireError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetError {
    AddressFormat { reason: String },
    Decode { reason: String },
    UnknownMessageType { tag: String },
    InvalidConfig { reason: String },
    AlreadyStarted { topic: String },
    NotRunning { topic: String },
    ThreadSpawnFailed { reason: String },
    ThreadJoinFailed { topic: String },
    Transport { reason: String },
}

impl fmt::Display for NetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetError::AddressFormat { reason } => write!(f, "malformed address: {}", reason),
            NetError::Decode { reason } => write!(f, "message decode failed: {}", reason),
            NetError::UnknownMessageType { tag } => {
                write!(f, "unknown wire message type: {}", tag)
            }
            NetError::InvalidConfig { reason } => write!(f, "invalid sync config: {}", reason),
            NetError::AlreadyStarted { topic } => {
                write!(f, "sync service already started for topic: {}", topic)
            }
            NetError::NotRunning { topic } => {
                write!(f, "sync service not running for topic: {}", topic)
            }
            NetError::ThreadSpawnFailed { reason } => {
                write!(f, "failed to spawn sync thread: {}", reason)
            }
            NetError::ThreadJoinFailed { topic } => {
                write!(f, "failed to join sync thread for topic: {}", topic)
            }
            NetError::Transport { reason } => write!(f, "transport error: {}", reason),
        }
    }
}

impl std::error::Error for NetError {}

impl From<WireError> for NetError {
    fn from(error: WireError) -> Self {
        match error {
            WireError::Decode { reason } => NetError::Decode { reason },
            WireError::UnknownMessageType { tag } => NetError::UnknownMessageType { tag },
        }
    }
}
