//! Peer synchronization layer for the verdant world ledger.

mod error;
mod memory;
mod multiaddr;
mod peer_book;
mod sync;
mod udp;

pub use error::NetError;
pub use memory::InMemoryNetwork;
pub use multiaddr::{MultiAddr, PeerId};
pub use peer_book::PeerAddressBook;
pub use sync::{publish_record, SyncConfig, SyncService, SyncState};
pub use udp::{UdpGossipConfig, UdpGossipNetwork};
pub use verdant_world_proto::net::{NetworkMessage, NetworkSubscription, PeerNetwork};
