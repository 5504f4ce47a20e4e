//! In-memory network fabric for tests and single-process deployments.
//!
//! All handles cloned from one fabric share it; a publish is fanned out to
//! every subscription on the topic, including the publisher's own.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use verdant_world_proto::net::{NetworkMessage, NetworkSubscription, PeerNetwork};

use crate::error::NetError;

type Inbox = Arc<Mutex<HashMap<String, Vec<Vec<u8>>>>>;

#[derive(Clone, Default)]
pub struct InMemoryNetwork {
    subscriptions: Arc<Mutex<Vec<(String, Inbox)>>>,
    published: Arc<Mutex<Vec<NetworkMessage>>>,
}

impl InMemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<NetworkMessage> {
        self.published.lock().expect("lock published").clone()
    }
}

impl PeerNetwork<NetError> for InMemoryNetwork {
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), NetError> {
        {
            let mut published = self.published.lock().expect("lock published");
            published.push(NetworkMessage {
                topic: topic.to_string(),
                payload: payload.to_vec(),
            });
        }
        let subscriptions = self.subscriptions.lock().expect("lock subscriptions");
        for (subscribed_topic, inbox) in subscriptions.iter() {
            if subscribed_topic != topic {
                continue;
            }
            let mut inbox = inbox.lock().expect("lock inbox");
            inbox
                .entry(topic.to_string())
                .or_default()
                .push(payload.to_vec());
        }
        Ok(())
    }

    fn subscribe(&self, topic: &str) -> Result<NetworkSubscription, NetError> {
        let inbox: Inbox = Arc::new(Mutex::new(HashMap::new()));
        {
            let mut subscriptions = self.subscriptions.lock().expect("lock subscriptions");
            subscriptions.push((topic.to_string(), Arc::clone(&inbox)));
        }
        Ok(NetworkSubscription::new(topic.to_string(), inbox))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_fans_out_to_all_subscribers() {
        let network = InMemoryNetwork::new();
        let first = network.subscribe("t").expect("subscribe");
        let second = network.subscribe("t").expect("subscribe");

        network.publish("t", b"payload").expect("publish");
        assert_eq!(first.drain(), vec![b"payload".to_vec()]);
        assert_eq!(second.drain(), vec![b"payload".to_vec()]);
        assert!(first.drain().is_empty());
    }

    #[test]
    fn topics_are_isolated() {
        let network = InMemoryNetwork::new();
        let other = network.subscribe("other").expect("subscribe");
        network.publish("t", b"payload").expect("publish");
        assert!(other.drain().is_empty());
    }

    #[test]
    fn cloned_handles_share_the_fabric() {
        let network = InMemoryNetwork::new();
        let remote = network.clone();
        let subscription = remote.subscribe("t").expect("subscribe");

        network.publish("t", b"payload").expect("publish");
        assert_eq!(subscription.drain(), vec![b"payload".to_vec()]);
        assert_eq!(network.published().len(), 1);
    }
}
