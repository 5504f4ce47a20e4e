//! Peer synchronization service.
//!
//! Moves candidates and stem checkpoint announcements between peers. A
//! listener thread drains the transport and hands decoded candidates to a
//! verifier thread over a channel, so verification never blocks the receive
//! loop. Stopping joins both threads; a candidate that reached the listener
//! either completes verification or is never started, it is not silently
//! dropped mid-flight.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use verdant_world::{
    ActionCandidate, Address, ChainManager, ContentRegistry, Region, RegionBlockReference,
};
use verdant_world_proto::net::PeerNetwork;
use verdant_world_proto::topics;
use verdant_world_proto::wire::{
    CandidateAnnounce, PeerAddressInfo, RegionRefAnnounce, WireMessage,
};

use crate::error::NetError;
use crate::multiaddr::{MultiAddr, PeerId};
use crate::peer_book::PeerAddressBook;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Stopped,
    Starting,
    Listening,
    Stopping,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub topic: String,
    pub poll_interval: Duration,
    pub seen_cache_capacity: usize,
}

impl SyncConfig {
    pub fn new(topic: impl Into<String>) -> Result<Self, NetError> {
        let topic = topic.into();
        if topic.trim().is_empty() {
            return Err(NetError::InvalidConfig {
                reason: "topic cannot be empty".to_string(),
            });
        }
        Ok(Self {
            topic,
            poll_interval: Duration::from_millis(20),
            seen_cache_capacity: 4096,
        })
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Result<Self, NetError> {
        if interval.is_zero() {
            return Err(NetError::InvalidConfig {
                reason: "poll_interval must be positive".to_string(),
            });
        }
        self.poll_interval = interval;
        Ok(self)
    }

    pub fn with_seen_cache_capacity(mut self, capacity: usize) -> Result<Self, NetError> {
        if capacity == 0 {
            return Err(NetError::InvalidConfig {
                reason: "seen_cache_capacity must be positive".to_string(),
            });
        }
        self.seen_cache_capacity = capacity;
        Ok(self)
    }
}

/// Bounded window of record hashes already broadcast, committed or rejected.
#[derive(Debug)]
struct SeenCache {
    capacity: usize,
    set: HashSet<String>,
    order: VecDeque<String>,
}

impl SeenCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            set: HashSet::new(),
            order: VecDeque::new(),
        }
    }

    /// Returns false when the hash was already in the window.
    fn insert(&mut self, hash: &str) -> bool {
        if self.set.contains(hash) {
            return false;
        }
        while self.set.len() >= self.capacity {
            let Some(evicted) = self.order.pop_front() else {
                break;
            };
            self.set.remove(&evicted);
        }
        self.set.insert(hash.to_string());
        self.order.push_back(hash.to_string());
        true
    }
}

enum Received {
    Candidate(ActionCandidate),
    RegionRef,
    PeerInfo,
    Duplicate,
}

struct SyncCore {
    registry: ContentRegistry,
    seen: Mutex<SeenCache>,
    peer_book: Mutex<PeerAddressBook>,
    remote_region_heads: Mutex<HashMap<Region, u64>>,
}

impl SyncCore {
    fn mark_seen(&self, hash: &str) -> bool {
        self.seen.lock().expect("lock seen cache").insert(hash)
    }

    fn on_receive(&self, bytes: &[u8]) -> Result<Received, NetError> {
        match WireMessage::decode(bytes)? {
            WireMessage::Candidate(announce) => {
                if !self.mark_seen(&announce.record_hash) {
                    return Ok(Received::Duplicate);
                }
                let record = self
                    .registry
                    .decode_record(&announce.record_json)
                    .map_err(|err| NetError::Decode {
                        reason: format!("candidate record is malformed: {}", err),
                    })?;
                Ok(Received::Candidate(record.into_candidate()))
            }
            WireMessage::RegionRef(announce) => {
                let region = Region {
                    rx: verdant_world::RegionIndex(announce.rx),
                    ry: verdant_world::RegionIndex(announce.ry),
                };
                let mut heads = self
                    .remote_region_heads
                    .lock()
                    .expect("lock remote region heads");
                let entry = heads.entry(region).or_insert(0);
                if announce.height > *entry {
                    *entry = announce.height;
                }
                Ok(Received::RegionRef)
            }
            WireMessage::PeerInfo(info) => {
                let peer_id = PeerId::new(info.peer_id.as_str())?;
                let route: MultiAddr = info.multiaddr.parse()?;
                let account =
                    Address::from_hex(info.account.as_str()).map_err(|err| NetError::Decode {
                        reason: format!("peer account is malformed: {}", err),
                    })?;
                let mut book = self.peer_book.lock().expect("lock peer book");
                book.link(peer_id.clone(), account);
                book.set_route(peer_id, route);
                Ok(Received::PeerInfo)
            }
        }
    }
}

pub struct SyncService<N> {
    network: Arc<N>,
    config: SyncConfig,
    core: Arc<SyncCore>,
    manager: Arc<ChainManager>,
    state: Arc<Mutex<SyncState>>,
    running: Arc<AtomicBool>,
    stop_tx: Option<mpsc::Sender<()>>,
    listener: Option<JoinHandle<()>>,
    verifier: Option<JoinHandle<()>>,
}

impl<N: PeerNetwork<NetError> + Send + Sync + 'static> SyncService<N> {
    pub fn new(
        network: Arc<N>,
        manager: Arc<ChainManager>,
        config: SyncConfig,
    ) -> Result<Self, NetError> {
        let registry = ContentRegistry::builtin().map_err(|err| NetError::InvalidConfig {
            reason: format!("content registry: {}", err),
        })?;
        Ok(Self {
            network,
            core: Arc::new(SyncCore {
                registry,
                seen: Mutex::new(SeenCache::new(config.seen_cache_capacity)),
                peer_book: Mutex::new(PeerAddressBook::new()),
                remote_region_heads: Mutex::new(HashMap::new()),
            }),
            config,
            manager,
            state: Arc::new(Mutex::new(SyncState::Stopped)),
            running: Arc::new(AtomicBool::new(false)),
            stop_tx: None,
            listener: None,
            verifier: None,
        })
    }

    pub fn state(&self) -> SyncState {
        *self.state.lock().expect("lock sync state")
    }

    pub fn manager(&self) -> &Arc<ChainManager> {
        &self.manager
    }

    /// Last region head height learned from stem checkpoint announcements.
    pub fn remote_region_head(&self, region: Region) -> Option<u64> {
        self.core
            .remote_region_heads
            .lock()
            .expect("lock remote region heads")
            .get(&region)
            .copied()
    }

    pub fn known_peers(&self) -> Vec<PeerId> {
        self.core.peer_book.lock().expect("lock peer book").peers()
    }

    pub fn peer_route(&self, peer_id: &PeerId) -> Option<MultiAddr> {
        self.core
            .peer_book
            .lock()
            .expect("lock peer book")
            .route_of(peer_id)
            .cloned()
    }

    pub fn start(&mut self) -> Result<(), NetError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(NetError::AlreadyStarted {
                topic: self.config.topic.clone(),
            });
        }
        self.set_state(SyncState::Starting);

        let record_subscription = match self
            .network
            .subscribe(&topics::topic_record(&self.config.topic))
        {
            Ok(subscription) => subscription,
            Err(err) => {
                self.running.store(false, Ordering::SeqCst);
                self.set_state(SyncState::Stopped);
                return Err(err);
            }
        };
        let peer_subscription = match self
            .network
            .subscribe(&topics::topic_peer(&self.config.topic))
        {
            Ok(subscription) => subscription,
            Err(err) => {
                self.running.store(false, Ordering::SeqCst);
                self.set_state(SyncState::Stopped);
                return Err(err);
            }
        };

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (candidate_tx, candidate_rx) = mpsc::channel::<ActionCandidate>();

        let manager = Arc::clone(&self.manager);
        let verifier = thread::Builder::new()
            .name(format!("vw-verify-{}", self.config.topic))
            .spawn(move || {
                // Channel closes when the listener exits; everything queued
                // before that still gets verified.
                for candidate in candidate_rx {
                    match manager.verify_and_commit(candidate) {
                        Ok(event) => {
                            tracing::debug!(
                                locator = %event.head.locator,
                                height = event.head.height,
                                "remote candidate committed"
                            );
                        }
                        Err(err) => {
                            tracing::debug!(error = %err, "remote candidate discarded");
                        }
                    }
                }
            })
            .map_err(|err| {
                self.running.store(false, Ordering::SeqCst);
                self.set_state(SyncState::Stopped);
                NetError::ThreadSpawnFailed {
                    reason: err.to_string(),
                }
            })?;

        let network = Arc::clone(&self.network);
        let core = Arc::clone(&self.core);
        let poll_interval = self.config.poll_interval;
        let listener = thread::Builder::new()
            .name(format!("vw-sync-{}", self.config.topic))
            .spawn(move || {
                let subscriptions = [record_subscription, peer_subscription];
                let mut alive = true;
                loop {
                    match stop_rx.recv_timeout(poll_interval) {
                        Ok(()) => break,
                        Err(mpsc::RecvTimeoutError::Timeout) => {
                            alive = drain_transport(
                                network.as_ref(),
                                &core,
                                &subscriptions,
                                &candidate_tx,
                            );
                            if !alive {
                                break;
                            }
                        }
                        Err(mpsc::RecvTimeoutError::Disconnected) => break,
                    }
                }
                // Final drain so receives accepted by the transport before
                // the stop signal are not lost.
                if alive {
                    drain_transport(network.as_ref(), &core, &subscriptions, &candidate_tx);
                }
                drop(candidate_tx);
            })
            .map_err(|err| {
                self.running.store(false, Ordering::SeqCst);
                self.set_state(SyncState::Stopped);
                NetError::ThreadSpawnFailed {
                    reason: err.to_string(),
                }
            })?;

        self.stop_tx = Some(stop_tx);
        self.listener = Some(listener);
        self.verifier = Some(verifier);
        self.set_state(SyncState::Listening);
        Ok(())
    }

    /// Signals the receive loop, joins it, then joins the verifier after it
    /// finished every candidate handed over before shutdown.
    pub fn stop(&mut self) -> Result<(), NetError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(NetError::NotRunning {
                topic: self.config.topic.clone(),
            });
        }
        self.set_state(SyncState::Stopping);
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(listener) = self.listener.take() {
            listener.join().map_err(|_| NetError::ThreadJoinFailed {
                topic: self.config.topic.clone(),
            })?;
        }
        if let Some(verifier) = self.verifier.take() {
            verifier.join().map_err(|_| NetError::ThreadJoinFailed {
                topic: self.config.topic.clone(),
            })?;
        }
        self.running.store(false, Ordering::SeqCst);
        self.set_state(SyncState::Stopped);
        Ok(())
    }

    /// Best-effort fan-out of a locally committed candidate to all peers.
    pub fn broadcast(&self, candidate: &ActionCandidate) -> Result<(), NetError> {
        self.core.mark_seen(&candidate.record.hash);
        publish_record(
            self.network.as_ref(),
            &self.config.topic,
            &self.core.registry,
            &candidate.record,
        )
    }

    pub fn announce_region_ref(
        &self,
        reference: &RegionBlockReference,
        record_hash: &str,
    ) -> Result<(), NetError> {
        let message = WireMessage::RegionRef(RegionRefAnnounce {
            rx: reference.region.rx.0,
            ry: reference.region.ry.0,
            height: reference.height,
            record_hash: record_hash.to_string(),
        });
        self.publish(&topics::topic_record(&self.config.topic), &message)
    }

    pub fn announce_peer(
        &self,
        peer_id: &PeerId,
        route: &MultiAddr,
        account: &Address,
    ) -> Result<(), NetError> {
        let message = WireMessage::PeerInfo(PeerAddressInfo {
            peer_id: peer_id.as_str().to_string(),
            multiaddr: route.to_string(),
            account: account.as_hex().to_string(),
        });
        self.publish(&topics::topic_peer(&self.config.topic), &message)
    }

    fn publish(&self, topic: &str, message: &WireMessage) -> Result<(), NetError> {
        let bytes = message.encode()?;
        self.network.publish(topic, &bytes)
    }

    fn set_state(&self, state: SyncState) {
        *self.state.lock().expect("lock sync state") = state;
    }
}

/// Announces a signed record on `world_topic`'s record topic.
pub fn publish_record<N: PeerNetwork<NetError>>(
    network: &N,
    world_topic: &str,
    registry: &ContentRegistry,
    record: &verdant_world::ActionRecord,
) -> Result<(), NetError> {
    let record_json = registry.encode_record(record).map_err(|err| NetError::Decode {
        reason: format!("serialize candidate failed: {}", err),
    })?;
    let message = WireMessage::Candidate(CandidateAnnounce {
        record_json,
        record_hash: record.hash.clone(),
    });
    let bytes = message.encode()?;
    network.publish(&topics::topic_record(world_topic), &bytes)
}

/// Polls the transport and routes every drained message; returns false once
/// the verifier side of the channel is gone.
fn drain_transport<N: PeerNetwork<NetError>>(
    network: &N,
    core: &SyncCore,
    subscriptions: &[verdant_world_proto::net::NetworkSubscription],
    candidate_tx: &mpsc::Sender<ActionCandidate>,
) -> bool {
    if let Err(err) = network.poll() {
        tracing::warn!(error = %err, "transport poll failed");
    }
    for subscription in subscriptions {
        for bytes in subscription.drain() {
            match core.on_receive(&bytes) {
                Ok(Received::Candidate(candidate)) => {
                    if candidate_tx.send(candidate).is_err() {
                        return false;
                    }
                }
                Ok(Received::RegionRef) | Ok(Received::PeerInfo) | Ok(Received::Duplicate) => {}
                Err(err) => {
                    tracing::debug!(error = %err, "dropping incoming message");
                }
            }
        }
    }
    true
}

impl<N> Drop for SyncService<N> {
    fn drop(&mut self) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(listener) = self.listener.take() {
            let _ = listener.join();
        }
        if let Some(verifier) = self.verifier.take() {
            let _ = verifier.join();
        }
        self.running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use std::time::Instant;
    use verdant_world::{
        seal_record, GrowAction, InMemoryChainStore, Keyring, Locator, RecordContent, Timestamp,
    };
    use verdant_world::{Coordinate, Tile};

    use crate::memory::InMemoryNetwork;

    fn new_service(network: &InMemoryNetwork) -> SyncService<InMemoryNetwork> {
        let manager = Arc::new(ChainManager::new(Arc::new(InMemoryChainStore::new())));
        SyncService::new(
            Arc::new(network.clone()),
            manager,
            SyncConfig::new("w1").expect("config"),
        )
        .expect("service")
    }

    fn grow_candidate(keyring: &Keyring, timestamp: i64) -> ActionCandidate {
        seal_record(
            Timestamp(timestamp),
            keyring,
            RecordContent::Grow(GrowAction {
                plot: Tile::Plot {
                    x: Coordinate(1),
                    y: Coordinate(1),
                    plant: None,
                },
            }),
        )
        .expect("seal")
        .into_candidate()
    }

    fn wait_for_height(
        service: &SyncService<InMemoryNetwork>,
        locator: Locator,
        height: u64,
    ) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            let head = service.manager().head(locator).expect("head");
            if head.height >= height {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn start_twice_reports_already_started() {
        let network = InMemoryNetwork::new();
        let mut service = new_service(&network);
        service.start().expect("start");
        let err = service.start().expect_err("second start must fail");
        assert!(matches!(err, NetError::AlreadyStarted { .. }));
        service.stop().expect("stop");
    }

    #[test]
    fn stop_without_start_reports_not_running() {
        let network = InMemoryNetwork::new();
        let mut service = new_service(&network);
        let err = service.stop().expect_err("must fail");
        assert!(matches!(err, NetError::NotRunning { .. }));
    }

    #[test]
    fn lifecycle_reaches_listening_and_back() {
        let network = InMemoryNetwork::new();
        let mut service = new_service(&network);
        assert_eq!(service.state(), SyncState::Stopped);
        service.start().expect("start");
        assert_eq!(service.state(), SyncState::Listening);
        service.stop().expect("stop");
        assert_eq!(service.state(), SyncState::Stopped);
    }

    #[test]
    fn broadcast_candidate_is_verified_by_a_peer_service() {
        let network = InMemoryNetwork::new();
        let mut receiver = new_service(&network);
        receiver.start().expect("start receiver");

        let sender = new_service(&network);
        let keyring = Keyring::generate();
        let candidate = grow_candidate(&keyring, 10);
        let locator = candidate.record.content.locator();
        sender.broadcast(&candidate).expect("broadcast");

        assert!(wait_for_height(&receiver, locator, 1));
        let head = receiver.manager().head(locator).expect("head");
        assert_eq!(head.hash, candidate.record.hash);
        receiver.stop().expect("stop");
    }

    #[test]
    fn duplicate_candidates_from_many_peers_verify_once() {
        let network = InMemoryNetwork::new();
        let mut receiver = new_service(&network);
        receiver.start().expect("start receiver");

        let sender = new_service(&network);
        let keyring = Keyring::generate();
        let candidate = grow_candidate(&keyring, 10);
        let locator = candidate.record.content.locator();
        for _ in 0..3 {
            sender.broadcast(&candidate).expect("broadcast");
        }

        assert!(wait_for_height(&receiver, locator, 1));
        thread::sleep(Duration::from_millis(50));
        let head = receiver.manager().head(locator).expect("head");
        assert_eq!(head.height, 1);
        receiver.stop().expect("stop");
    }

    #[test]
    fn malformed_bytes_do_not_kill_the_listener() {
        let network = InMemoryNetwork::new();
        let mut receiver = new_service(&network);
        receiver.start().expect("start receiver");

        network
            .publish(&topics::topic_record("w1"), b"garbage")
            .expect("publish garbage");
        network
            .publish(
                &topics::topic_record("w1"),
                br#"{"type":"future.thing","x":1}"#,
            )
            .expect("publish unknown tag");

        let sender = new_service(&network);
        let keyring = Keyring::generate();
        let candidate = grow_candidate(&keyring, 10);
        let locator = candidate.record.content.locator();
        sender.broadcast(&candidate).expect("broadcast");

        assert!(wait_for_height(&receiver, locator, 1));
        receiver.stop().expect("stop");
    }

    #[test]
    fn peer_announcements_populate_the_address_book() {
        let network = InMemoryNetwork::new();
        let mut receiver = new_service(&network);
        receiver.start().expect("start receiver");

        let sender = new_service(&network);
        let keyring = Keyring::generate();
        let peer_id = PeerId::new("QmWPDDVPfBSrkrHjxt2wQ9JNsH4RNCQ2NkpFi9GHxTQvz9").expect("peer");
        let route = MultiAddr::from_str(
            "ip4/10.0.0.7/tcp/5558/ws/p2p/QmWPDDVPfBSrkrHjxt2wQ9JNsH4RNCQ2NkpFi9GHxTQvz9",
        )
        .expect("addr");
        sender
            .announce_peer(&peer_id, &route, keyring.address())
            .expect("announce");

        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline && receiver.known_peers().is_empty() {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(receiver.known_peers(), vec![peer_id.clone()]);
        assert_eq!(receiver.peer_route(&peer_id), Some(route));
        receiver.stop().expect("stop");
    }

    #[test]
    fn region_ref_announcements_track_remote_heads_monotonically() {
        let network = InMemoryNetwork::new();
        let mut receiver = new_service(&network);
        receiver.start().expect("start receiver");

        let sender = new_service(&network);
        let region = Region {
            rx: verdant_world::RegionIndex(1),
            ry: verdant_world::RegionIndex(2),
        };
        let reference = |height| RegionBlockReference {
            height,
            hash: format!("hash-{height}"),
            region,
        };
        sender
            .announce_region_ref(&reference(5), "r5")
            .expect("announce");
        sender
            .announce_region_ref(&reference(3), "r3")
            .expect("announce");

        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline && receiver.remote_region_head(region).is_none() {
            thread::sleep(Duration::from_millis(10));
        }
        thread::sleep(Duration::from_millis(50));
        assert_eq!(receiver.remote_region_head(region), Some(5));
        receiver.stop().expect("stop");
    }

    #[test]
    fn seen_cache_evicts_oldest_entries() {
        let mut cache = SeenCache::new(2);
        assert!(cache.insert("a"));
        assert!(cache.insert("b"));
        assert!(!cache.insert("a"));
        assert!(cache.insert("c"));
        assert!(cache.insert("a"));
    }
}
