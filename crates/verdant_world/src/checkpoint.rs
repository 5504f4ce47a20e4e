//! Stem checkpoint cadence.
//!
//! Watches region commits and decides when a region's progress should be
//! committed onto the stem chain as a `RegionBlockReference`. The cadence is
//! policy, supplied by configuration.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::chain::ChainHead;
use crate::location::{Locator, Region, RegionBlockReference};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointPolicy {
    /// A region is checkpointed every this many committed records.
    pub commit_threshold: u64,
}

impl Default for CheckpointPolicy {
    fn default() -> Self {
        Self {
            commit_threshold: 8,
        }
    }
}

/// Builds a stem reference to a region chain's head. Returns `None` for the
/// stem head itself, which is never checkpointed.
pub fn build_reference(head: &ChainHead) -> Option<RegionBlockReference> {
    match head.locator {
        Locator::Stem => None,
        Locator::Region { region } => Some(RegionBlockReference {
            height: head.height,
            hash: head.hash.clone(),
            region,
        }),
    }
}

#[derive(Debug)]
pub struct CheckpointTracker {
    policy: CheckpointPolicy,
    last_built: Mutex<HashMap<Region, u64>>,
}

impl CheckpointTracker {
    pub fn new(policy: CheckpointPolicy) -> Self {
        Self {
            policy,
            last_built: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> CheckpointPolicy {
        self.policy
    }

    /// Feeds one committed region head; returns a reference when the region
    /// advanced `commit_threshold` records past the last built checkpoint.
    pub fn observe_commit(&self, head: &ChainHead) -> Option<RegionBlockReference> {
        let Locator::Region { region } = head.locator else {
            return None;
        };
        let mut last_built = self.last_built.lock().expect("lock checkpoint state");
        let last = last_built.get(&region).copied().unwrap_or(0);
        if head.height < last + self.policy.commit_threshold {
            return None;
        }
        last_built.insert(region, head.height);
        build_reference(head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::RegionIndex;
    use crate::record::Timestamp;

    fn region_head(height: u64) -> ChainHead {
        ChainHead {
            locator: Locator::Region {
                region: Region {
                    rx: RegionIndex(1),
                    ry: RegionIndex(1),
                },
            },
            height,
            hash: format!("hash-{height}"),
            timestamp: Timestamp(height as i64),
        }
    }

    #[test]
    fn checkpoints_fire_at_the_configured_cadence() {
        let tracker = CheckpointTracker::new(CheckpointPolicy {
            commit_threshold: 3,
        });

        assert!(tracker.observe_commit(&region_head(1)).is_none());
        assert!(tracker.observe_commit(&region_head(2)).is_none());
        let reference = tracker.observe_commit(&region_head(3)).expect("checkpoint");
        assert_eq!(reference.height, 3);
        assert_eq!(reference.hash, "hash-3");

        assert!(tracker.observe_commit(&region_head(4)).is_none());
        assert!(tracker.observe_commit(&region_head(5)).is_none());
        assert!(tracker.observe_commit(&region_head(6)).is_some());
    }

    #[test]
    fn stem_heads_are_never_checkpointed() {
        let tracker = CheckpointTracker::new(CheckpointPolicy::default());
        let head = ChainHead {
            locator: Locator::Stem,
            height: 100,
            hash: "h".to_string(),
            timestamp: Timestamp(1),
        };
        assert!(tracker.observe_commit(&head).is_none());
        assert!(build_reference(&head).is_none());
    }
}
