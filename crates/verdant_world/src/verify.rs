//! Candidate verification and commit.
//!
//! The decision function is deterministic over chain state plus candidate
//! content; the only side effect is the single append-and-publish step on
//! acceptance. Verification for one locator is serialized behind a
//! per-locator lock, different locators verify in parallel.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::action::RecordContent;
use crate::bus::EventBus;
use crate::chain::{ChainHead, ChainStore};
use crate::crypto::{verify_digest, Address};
use crate::error::ChainError;
use crate::location::{Locator, Region};
use crate::record::{ActionCandidate, ActionRecord, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    HashMismatch {
        expected: String,
        actual: String,
    },
    InvalidSignature,
    DuplicateAction {
        author: Address,
        timestamp: Timestamp,
    },
    OutOfOrder {
        timestamp: Timestamp,
        head_timestamp: Timestamp,
    },
    StaleReference {
        region: Region,
        height: u64,
        last_height: u64,
    },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::HashMismatch { expected, actual } => {
                write!(f, "hash mismatch: claimed={}, computed={}", expected, actual)
            }
            RejectReason::InvalidSignature => f.write_str("signature does not verify"),
            RejectReason::DuplicateAction { author, timestamp } => {
                write!(f, "duplicate action: author={}, timestamp={}", author, timestamp)
            }
            RejectReason::OutOfOrder {
                timestamp,
                head_timestamp,
            } => write!(
                f,
                "timestamp {} precedes chain head timestamp {}",
                timestamp, head_timestamp
            ),
            RejectReason::StaleReference {
                region,
                height,
                last_height,
            } => write!(
                f,
                "stale reference for {}: height={}, last committed={}",
                region, height, last_height
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    Rejected { reason: RejectReason },
    Halted { locator: Locator },
    Storage { reason: String },
    Internal { reason: String },
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifyError::Rejected { reason } => write!(f, "candidate rejected: {}", reason),
            VerifyError::Halted { locator } => {
                write!(f, "commits halted on {} after storage failure", locator)
            }
            VerifyError::Storage { reason } => write!(f, "chain storage failure: {}", reason),
            VerifyError::Internal { reason } => write!(f, "verification failed: {}", reason),
        }
    }
}

impl std::error::Error for VerifyError {}

impl VerifyError {
    fn rejected(reason: RejectReason) -> Self {
        VerifyError::Rejected { reason }
    }

    pub fn reject_reason(&self) -> Option<&RejectReason> {
        match self {
            VerifyError::Rejected { reason } => Some(reason),
            _ => None,
        }
    }
}

/// A record that passed verification and was appended to its chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitEvent {
    pub head: ChainHead,
    pub record: ActionRecord,
}

/// Verifies candidates against chain state and promotes them to committed.
pub struct ChainManager {
    store: Arc<dyn ChainStore>,
    bus: EventBus<CommitEvent>,
    locks: Mutex<HashMap<Locator, Arc<Mutex<()>>>>,
    halted: Mutex<HashSet<Locator>>,
}

impl ChainManager {
    pub fn new(store: Arc<dyn ChainStore>) -> Self {
        Self {
            store,
            bus: EventBus::new(),
            locks: Mutex::new(HashMap::new()),
            halted: Mutex::new(HashSet::new()),
        }
    }

    pub fn bus(&self) -> &EventBus<CommitEvent> {
        &self.bus
    }

    pub fn store(&self) -> &Arc<dyn ChainStore> {
        &self.store
    }

    pub fn head(&self, locator: Locator) -> Result<ChainHead, ChainError> {
        self.store.head(locator)
    }

    pub fn is_halted(&self, locator: Locator) -> bool {
        self.halted.lock().expect("lock halted set").contains(&locator)
    }

    /// Runs the verification pipeline and, on acceptance, appends the record,
    /// advances the head and publishes the commit.
    pub fn verify_and_commit(&self, candidate: ActionCandidate) -> Result<CommitEvent, VerifyError> {
        let record = candidate.record;

        // Hash and signature checks need no chain state and run outside the
        // locator lock.
        let computed = record.recompute_hash().map_err(|err| VerifyError::Internal {
            reason: err.to_string(),
        })?;
        if computed != record.hash {
            return Err(VerifyError::rejected(RejectReason::HashMismatch {
                expected: record.hash.clone(),
                actual: computed,
            }));
        }
        let signature_ok = verify_digest(&record.author, &record.hash, &record.signature)
            .unwrap_or(false);
        if !signature_ok {
            return Err(VerifyError::rejected(RejectReason::InvalidSignature));
        }

        let locator = record.content.locator();
        if self.is_halted(locator) {
            return Err(VerifyError::Halted { locator });
        }

        let lock = self.locator_lock(locator);
        let _guard = lock.lock().expect("lock locator");

        self.decide(&record, locator)?;

        let head = match self.store.append(record.clone()) {
            Ok(head) => head,
            Err(err) => {
                self.halted.lock().expect("lock halted set").insert(locator);
                tracing::error!(%locator, error = %err, "append failed, halting locator");
                return Err(VerifyError::Storage {
                    reason: err.to_string(),
                });
            }
        };

        tracing::debug!(%locator, height = head.height, hash = %head.hash, "record committed");
        let event = CommitEvent { head, record };
        self.bus.publish(&event);
        Ok(event)
    }

    /// Chain-state checks, in order, failing fast with the specific reason.
    fn decide(&self, record: &ActionRecord, locator: Locator) -> Result<(), VerifyError> {
        let head = self.store.head(locator).map_err(storage_error)?;

        let duplicate = self
            .store
            .contains(locator, &record.author, record.timestamp)
            .map_err(storage_error)?;
        if duplicate {
            return Err(VerifyError::rejected(RejectReason::DuplicateAction {
                author: record.author.clone(),
                timestamp: record.timestamp,
            }));
        }

        if record.timestamp < head.timestamp {
            return Err(VerifyError::rejected(RejectReason::OutOfOrder {
                timestamp: record.timestamp,
                head_timestamp: head.timestamp,
            }));
        }

        if let RecordContent::RegionRef(reference) = &record.content {
            let last = self
                .store
                .last_region_ref_height(reference.region)
                .map_err(storage_error)?;
            if let Some(last_height) = last {
                if reference.height <= last_height {
                    return Err(VerifyError::rejected(RejectReason::StaleReference {
                        region: reference.region,
                        height: reference.height,
                        last_height,
                    }));
                }
            }
        }

        Ok(())
    }

    fn locator_lock(&self, locator: Locator) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().expect("lock locator map");
        Arc::clone(locks.entry(locator).or_default())
    }
}

fn storage_error(err: ChainError) -> VerifyError {
    VerifyError::Storage {
        reason: err.to_string(),
    }
}
