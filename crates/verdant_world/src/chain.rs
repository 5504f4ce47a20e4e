//! Per-locator append-only storage of committed records.
//!
//! The store owns committed records and head pointers. `append` is only
//! called after verification accepts a candidate; a storage fault surfaces as
//! `ChainError::Storage` and the verification layer halts the affected
//! locator.

use std::collections::{HashMap, HashSet};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::action::RecordContent;
use crate::crypto::Address;
use crate::error::ChainError;
use crate::location::{Locator, Region};
use crate::record::{ActionRecord, Timestamp};

/// Current tip of one chain. Absent chains report the genesis sentinel:
/// height 0, empty hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainHead {
    pub locator: Locator,
    pub height: u64,
    pub hash: String,
    pub timestamp: Timestamp,
}

impl ChainHead {
    pub fn genesis(locator: Locator) -> Self {
        Self {
            locator,
            height: 0,
            hash: String::new(),
            timestamp: Timestamp(i64::MIN),
        }
    }

    pub fn is_genesis(&self) -> bool {
        self.height == 0
    }
}

/// Access contract between the verification engine and whatever backs the
/// ledger. Reads of `head` during an in-flight `append` for the same locator
/// observe either the pre- or post-append state, never a torn value.
pub trait ChainStore: Send + Sync {
    fn append(&self, record: ActionRecord) -> Result<ChainHead, ChainError>;
    fn head(&self, locator: Locator) -> Result<ChainHead, ChainError>;
    fn contains(
        &self,
        locator: Locator,
        author: &Address,
        timestamp: Timestamp,
    ) -> Result<bool, ChainError>;
    /// Height of the last committed stem checkpoint for `region`, if any.
    fn last_region_ref_height(&self, region: Region) -> Result<Option<u64>, ChainError>;
    fn records(&self, locator: Locator) -> Result<Vec<ActionRecord>, ChainError>;
}

#[derive(Debug, Default)]
struct ShardState {
    records: Vec<ActionRecord>,
    head: Option<ChainHead>,
    seen: HashSet<(Address, Timestamp)>,
}

#[derive(Debug, Default)]
struct StoreState {
    shards: HashMap<Locator, ShardState>,
    region_refs: HashMap<Region, u64>,
}

impl StoreState {
    fn apply(&mut self, record: ActionRecord) -> ChainHead {
        let locator = record.content.locator();
        if let RecordContent::RegionRef(reference) = &record.content {
            self.region_refs.insert(reference.region, reference.height);
        }
        let shard = self.shards.entry(locator).or_default();
        let prev_height = shard.head.as_ref().map(|head| head.height).unwrap_or(0);
        let head = ChainHead {
            locator,
            height: prev_height + 1,
            hash: record.hash.clone(),
            timestamp: record.timestamp,
        };
        shard.seen.insert((record.author.clone(), record.timestamp));
        shard.records.push(record);
        shard.head = Some(head.clone());
        head
    }

    fn head(&self, locator: Locator) -> ChainHead {
        self.shards
            .get(&locator)
            .and_then(|shard| shard.head.clone())
            .unwrap_or_else(|| ChainHead::genesis(locator))
    }

    fn contains(&self, locator: Locator, author: &Address, timestamp: Timestamp) -> bool {
        self.shards
            .get(&locator)
            .map(|shard| shard.seen.contains(&(author.clone(), timestamp)))
            .unwrap_or(false)
    }

    fn records(&self, locator: Locator) -> Vec<ActionRecord> {
        self.shards
            .get(&locator)
            .map(|shard| shard.records.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryChainStore {
    state: Mutex<StoreState>,
}

impl InMemoryChainStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChainStore for InMemoryChainStore {
    fn append(&self, record: ActionRecord) -> Result<ChainHead, ChainError> {
        let mut state = self.state.lock().expect("lock chain state");
        Ok(state.apply(record))
    }

    fn head(&self, locator: Locator) -> Result<ChainHead, ChainError> {
        let state = self.state.lock().expect("lock chain state");
        Ok(state.head(locator))
    }

    fn contains(
        &self,
        locator: Locator,
        author: &Address,
        timestamp: Timestamp,
    ) -> Result<bool, ChainError> {
        let state = self.state.lock().expect("lock chain state");
        Ok(state.contains(locator, author, timestamp))
    }

    fn last_region_ref_height(&self, region: Region) -> Result<Option<u64>, ChainError> {
        let state = self.state.lock().expect("lock chain state");
        Ok(state.region_refs.get(&region).copied())
    }

    fn records(&self, locator: Locator) -> Result<Vec<ActionRecord>, ChainError> {
        let state = self.state.lock().expect("lock chain state");
        Ok(state.records(locator))
    }
}

/// Durable store: one JSON-lines file per locator under a root directory,
/// with the same in-memory index kept alongside for reads.
#[derive(Debug)]
pub struct FileChainStore {
    root: PathBuf,
    state: Mutex<StoreState>,
}

impl FileChainStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ChainError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|err| ChainError::Storage {
            reason: format!("create {} failed: {}", root.display(), err),
        })?;
        let mut state = StoreState::default();
        let entries = fs::read_dir(&root).map_err(|err| ChainError::Storage {
            reason: format!("read {} failed: {}", root.display(), err),
        })?;
        for entry in entries {
            let entry = entry.map_err(|err| ChainError::Storage {
                reason: format!("read dir entry failed: {}", err),
            })?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("jsonl") {
                continue;
            }
            for record in read_records(&path)? {
                state.apply(record);
            }
        }
        Ok(Self {
            root,
            state: Mutex::new(state),
        })
    }

    fn shard_path(&self, locator: Locator) -> PathBuf {
        let name = match locator {
            Locator::Stem => "stem.jsonl".to_string(),
            Locator::Region { region } => {
                format!("region_{}_{}.jsonl", region.rx.0, region.ry.0)
            }
        };
        self.root.join(name)
    }
}

fn read_records(path: &Path) -> Result<Vec<ActionRecord>, ChainError> {
    let file = fs::File::open(path).map_err(|err| ChainError::Storage {
        reason: format!("open {} failed: {}", path.display(), err),
    })?;
    let mut records = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|err| ChainError::Storage {
            reason: format!("read {} failed: {}", path.display(), err),
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let record =
            serde_json::from_str::<ActionRecord>(&line).map_err(|err| ChainError::Storage {
                reason: format!("corrupt record in {}: {}", path.display(), err),
            })?;
        records.push(record);
    }
    Ok(records)
}

impl ChainStore for FileChainStore {
    fn append(&self, record: ActionRecord) -> Result<ChainHead, ChainError> {
        let mut state = self.state.lock().expect("lock chain state");
        let path = self.shard_path(record.content.locator());
        let line = serde_json::to_string(&record).map_err(|err| ChainError::Storage {
            reason: format!("serialize record failed: {}", err),
        })?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|err| ChainError::Storage {
                reason: format!("open {} failed: {}", path.display(), err),
            })?;
        writeln!(file, "{}", line).map_err(|err| ChainError::Storage {
            reason: format!("write {} failed: {}", path.display(), err),
        })?;
        Ok(state.apply(record))
    }

    fn head(&self, locator: Locator) -> Result<ChainHead, ChainError> {
        let state = self.state.lock().expect("lock chain state");
        Ok(state.head(locator))
    }

    fn contains(
        &self,
        locator: Locator,
        author: &Address,
        timestamp: Timestamp,
    ) -> Result<bool, ChainError> {
        let state = self.state.lock().expect("lock chain state");
        Ok(state.contains(locator, author, timestamp))
    }

    fn last_region_ref_height(&self, region: Region) -> Result<Option<u64>, ChainError> {
        let state = self.state.lock().expect("lock chain state");
        Ok(state.region_refs.get(&region).copied())
    }

    fn records(&self, locator: Locator) -> Result<Vec<ActionRecord>, ChainError> {
        let state = self.state.lock().expect("lock chain state");
        Ok(state.records(locator))
    }
}
