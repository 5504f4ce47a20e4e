use std::fmt;
use std::io;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    KeyMismatch { expected: String, actual: String },
    InvalidKey { reason: String },
    DuplicateContentTag { tag: String },
    UnknownContentTag { tag: String },
    Storage { reason: String },
    Io(String),
    Serde(String),
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainError::KeyMismatch { expected, actual } => {
                write!(
                    f,
                    "signing key does not belong to record author: author={}, key address={}",
                    expected, actual
                )
            }
            ChainError::InvalidKey { reason } => write!(f, "invalid key material: {}", reason),
            ChainError::DuplicateContentTag { tag } => {
                write!(f, "content tag registered twice: {}", tag)
            }
            ChainError::UnknownContentTag { tag } => {
                write!(f, "content tag is not registered: {}", tag)
            }
            ChainError::Storage { reason } => write!(f, "chain storage failure: {}", reason),
            ChainError::Io(reason) => write!(f, "io error: {}", reason),
            ChainError::Serde(reason) => write!(f, "serialization error: {}", reason),
        }
    }
}

impl std::error::Error for ChainError {}

impl From<serde_cbor::Error> for ChainError {
    fn from(error: serde_cbor::Error) -> Self {
        ChainError::Serde(error.to_string())
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(error: serde_json::Error) -> Self {
        ChainError::Serde(error.to_string())
    }
}

impl From<io::Error> for ChainError {
    fn from(error: io::Error) -> Self {
        ChainError::Io(error.to_string())
    }
}
