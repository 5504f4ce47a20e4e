//! Chain identity: the stem chain and the regional chains it checkpoints.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct RegionIndex(pub u32);

/// A spatial shard of the world plane with its own chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Region {
    pub rx: RegionIndex,
    pub ry: RegionIndex,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "region({},{})", self.rx.0, self.ry.0)
    }
}

/// Identifies which chain a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "locator")]
pub enum Locator {
    #[serde(rename = "Stem")]
    Stem,
    #[serde(rename = "Region")]
    Region { region: Region },
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Stem => f.write_str("stem"),
            Locator::Region { region } => region.fmt(f),
        }
    }
}

/// Checkpoint from the stem chain to a region chain's head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionBlockReference {
    pub height: u64,
    pub hash: String,
    pub region: Region,
}
