//! Bidirectional directory of transport peers and ledger accounts.

use std::collections::HashMap;

use verdant_world::Address;

use crate::multiaddr::{MultiAddr, PeerId};

#[derive(Debug, Default)]
pub struct PeerAddressBook {
    account_by_peer: HashMap<PeerId, Address>,
    peer_by_account: HashMap<Address, PeerId>,
    route_by_peer: HashMap<PeerId, MultiAddr>,
}

impl PeerAddressBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Links a transport peer to its ledger account; either side may be
    /// looked up from the other.
    pub fn link(&mut self, peer_id: PeerId, account: Address) {
        self.peer_by_account.insert(account.clone(), peer_id.clone());
        self.account_by_peer.insert(peer_id, account);
    }

    pub fn set_route(&mut self, peer_id: PeerId, route: MultiAddr) {
        self.route_by_peer.insert(peer_id, route);
    }

    pub fn account_of(&self, peer_id: &PeerId) -> Option<&Address> {
        self.account_by_peer.get(peer_id)
    }

    pub fn peer_of(&self, account: &Address) -> Option<&PeerId> {
        self.peer_by_account.get(account)
    }

    pub fn route_of(&self, peer_id: &PeerId) -> Option<&MultiAddr> {
        self.route_by_peer.get(peer_id)
    }

    pub fn peers(&self) -> Vec<PeerId> {
        self.account_by_peer.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.account_by_peer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.account_by_peer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use verdant_world::Keyring;

    fn sample_peer() -> PeerId {
        PeerId::new("QmWPDDVPfBSrkrHjxt2wQ9JNsH4RNCQ2NkpFi9GHxTQvz9").expect("peer id")
    }

    #[test]
    fn link_is_bidirectional() {
        let mut book = PeerAddressBook::new();
        let peer = sample_peer();
        let account = Keyring::generate().address().clone();

        book.link(peer.clone(), account.clone());
        assert_eq!(book.account_of(&peer), Some(&account));
        assert_eq!(book.peer_of(&account), Some(&peer));
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn relink_updates_the_account() {
        let mut book = PeerAddressBook::new();
        let peer = sample_peer();
        let first = Keyring::generate().address().clone();
        let second = Keyring::generate().address().clone();

        book.link(peer.clone(), first);
        book.link(peer.clone(), second.clone());
        assert_eq!(book.account_of(&peer), Some(&second));
    }

    #[test]
    fn route_lookup() {
        let mut book = PeerAddressBook::new();
        let peer = sample_peer();
        let route = MultiAddr::from_str(
            "ip4/10.0.0.7/tcp/5558/ws/p2p/QmWPDDVPfBSrkrHjxt2wQ9JNsH4RNCQ2NkpFi9GHxTQvz9",
        )
        .expect("addr");

        book.set_route(peer.clone(), route.clone());
        assert_eq!(book.route_of(&peer), Some(&route));
    }
}
