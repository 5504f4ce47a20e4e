//! Wire protocol types and network abstractions for the verdant world ledger.

pub mod net;
pub mod topics;
pub mod wire;

pub use net::{NetworkMessage, NetworkSubscription, PeerNetwork};
pub use wire::{
    CandidateAnnounce, PeerAddressInfo, RegionRefAnnounce, WireError, WireMessage,
    WIRE_TAG_CANDIDATE, WIRE_TAG_PEER_INFO, WIRE_TAG_REGION_REF,
};
