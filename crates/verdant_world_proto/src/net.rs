//! Abstract peer network capability.
//!
//! The ledger core never touches a concrete networking stack; it only
//! requires topic-based publish plus a drainable subscription. Any transport
//! (UDP gossip, an in-memory fixture, a full p2p stack) can implement this.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

pub trait PeerNetwork<E> {
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), E>;
    fn subscribe(&self, topic: &str) -> Result<NetworkSubscription, E>;

    /// Moves pending transport input into subscriptions. Transports that
    /// deliver eagerly keep the default no-op.
    fn poll(&self) -> Result<(), E> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct NetworkSubscription {
    topic: String,
    inbox: Arc<Mutex<HashMap<String, Vec<Vec<u8>>>>>,
}

impl NetworkSubscription {
    pub fn new(topic: String, inbox: Arc<Mutex<HashMap<String, Vec<Vec<u8>>>>>) -> Self {
        Self { topic, inbox }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn drain(&self) -> Vec<Vec<u8>> {
        let mut inbox = self.inbox.lock().expect("lock inbox");
        inbox.remove(&self.topic).unwrap_or_default()
    }
}
