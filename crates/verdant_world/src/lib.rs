//! Core of the verdant world ledger: record model, region-sharded chains,
//! verification and the commit event bus.

mod action;
mod bus;
mod chain;
mod checkpoint;
mod crypto;
mod error;
mod location;
mod record;
mod registry;
mod verify;
mod world;

pub use action::{
    Action, ActionKind, ChunkGenesisAction, ClaimRealmAction, CreatePlotAction, GrowAction,
    HarvestAction, IntroductionAction, RecordContent, SeedAction,
};
pub use bus::{EventBus, PublishReport, Subscription};
pub use chain::{ChainHead, ChainStore, FileChainStore, InMemoryChainStore};
pub use checkpoint::{build_reference, CheckpointPolicy, CheckpointTracker};
pub use crypto::{sha256_hex, to_canonical_cbor, verify_digest, Address, Keyring, RecordSignature};
pub use error::ChainError;
pub use location::{Locator, Region, RegionBlockReference, RegionIndex};
pub use record::{
    seal_record, ActionCandidate, ActionRecord, Candidate, HashedRecord, RawRecord, SignedRecord,
    Timestamp,
};
pub use registry::{ContentFamily, ContentRegistry};
pub use verify::{ChainManager, CommitEvent, RejectReason, VerifyError};
pub use world::{
    Coordinate, GrowingPlant, Item, PlantGrowth, PlantType, Realm, RealmIndex, Tile, REALM_SIZE,
    REGION_SIZE,
};
