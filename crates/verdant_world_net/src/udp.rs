//! UDP gossip transport.
//!
//! Datagrams carry a `NetworkMessage` envelope as JSON. Publishing fans out
//! to the configured peer sockets; `poll` drains the nonblocking socket into
//! topic subscriptions. Malformed datagrams are dropped.

use std::collections::HashMap;
use std::net::{SocketAddr, UdpSocket};
use std::sync::{Arc, Mutex};

use verdant_world_proto::net::{NetworkMessage, NetworkSubscription, PeerNetwork};

use crate::error::NetError;

const MAX_DATAGRAM: usize = 64 * 1024;

type Inbox = Arc<Mutex<HashMap<String, Vec<Vec<u8>>>>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpGossipConfig {
    pub bind_addr: SocketAddr,
    pub peers: Vec<SocketAddr>,
}

pub struct UdpGossipNetwork {
    socket: UdpSocket,
    peers: Vec<SocketAddr>,
    subscriptions: Mutex<Vec<(String, Inbox)>>,
}

impl UdpGossipNetwork {
    pub fn bind(config: &UdpGossipConfig) -> Result<Self, NetError> {
        let socket = UdpSocket::bind(config.bind_addr).map_err(|err| NetError::Transport {
            reason: format!("bind {} failed: {}", config.bind_addr, err),
        })?;
        socket
            .set_nonblocking(true)
            .map_err(|err| NetError::Transport {
                reason: format!("set_nonblocking failed: {}", err),
            })?;
        Ok(Self {
            socket,
            peers: config.peers.clone(),
            subscriptions: Mutex::new(Vec::new()),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NetError> {
        self.socket.local_addr().map_err(|err| NetError::Transport {
            reason: format!("local_addr failed: {}", err),
        })
    }

    fn deliver(&self, message: NetworkMessage) {
        let subscriptions = self.subscriptions.lock().expect("lock subscriptions");
        for (topic, inbox) in subscriptions.iter() {
            if *topic != message.topic {
                continue;
            }
            let mut inbox = inbox.lock().expect("lock inbox");
            inbox
                .entry(message.topic.clone())
                .or_default()
                .push(message.payload.clone());
        }
    }
}

impl PeerNetwork<NetError> for UdpGossipNetwork {
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), NetError> {
        let message = NetworkMessage {
            topic: topic.to_string(),
            payload: payload.to_vec(),
        };
        let bytes = serde_json::to_vec(&message).map_err(|err| NetError::Transport {
            reason: format!("serialize gossip datagram failed: {}", err),
        })?;
        for peer in &self.peers {
            self.socket
                .send_to(&bytes, peer)
                .map_err(|err| NetError::Transport {
                    reason: format!("send_to {} failed: {}", peer, err),
                })?;
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

    fn poll(&self) -> Result<(), NetError> {
        let mut buf = [0u8; MAX_DATAGRAM];
        loop {
            match self.socket.recv_from(&mut buf) {
                Ok((size, from)) => {
                    match serde_json::from_slice::<NetworkMessage>(&buf[..size]) {
                        Ok(message) => self.deliver(message),
                        Err(err) => {
                            tracing::debug!(%from, error = %err, "dropping malformed datagram");
                        }
                    }
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(err) => {
                    return Err(NetError::Transport {
                        reason: format!("recv_from failed: {}", err),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn localhost_pair() -> (UdpGossipNetwork, UdpGossipNetwork) {
        let first = UdpGossipNetwork::bind(&UdpGossipConfig {
            bind_addr: "127.0.0.1:0".parse().expect("addr"),
            peers: Vec::new(),
        })
        .expect("bind first");
        let second = UdpGossipNetwork::bind(&UdpGossipConfig {
            bind_addr: "127.0.0.1:0".parse().expect("addr"),
            peers: vec![first.local_addr().expect("addr")],
        })
        .expect("bind second");
        (first, second)
    }

    #[test]
    fn datagrams_reach_peer_subscriptions() {
        let (receiver, sender) = localhost_pair();
        let subscription = receiver.subscribe("t").expect("subscribe");

        sender.publish("t", b"payload").expect("publish");

        let mut received = Vec::new();
        for _ in 0..50 {
            receiver.poll().expect("poll");
            received = subscription.drain();
            if !received.is_empty() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert_eq!(received, vec![b"payload".to_vec()]);
    }

    #[test]
    fn malformed_datagrams_are_dropped() {
        let (receiver, sender) = localhost_pair();
        let subscription = receiver.subscribe("t").expect("subscribe");

        let peer = receiver.local_addr().expect("addr");
        sender
            .socket
            .send_to(b"not json", peer)
            .expect("send raw bytes");
        sender.publish("t", b"payload").expect("publish");

        let mut received = Vec::new();
        for _ in 0..50 {
            receiver.poll().expect("poll");
            received = subscription.drain();
            if !received.is_empty() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert_eq!(received, vec![b"payload".to_vec()]);
    }
}
