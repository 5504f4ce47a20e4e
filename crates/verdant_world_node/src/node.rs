//! Node runtime: wires the chain manager, the sync service and the stem
//! checkpoint cadence together behind one lifecycle.

use std::cmp;
use std::sync::{Arc, Mutex};

use verdant_world::{
    seal_record, Action, ActionRecord, ChainHead, ChainManager, ChainStore, CheckpointTracker,
    CommitEvent, ContentRegistry, EventBus, Keyring, Locator, RecordContent, Subscription,
    Timestamp, VerifyError,
};
use verdant_world_net::{publish_record, NetError, PeerId, SyncConfig, SyncService, SyncState};
use verdant_world_proto::net::PeerNetwork;
use verdant_world_proto::topics;
use verdant_world_proto::wire::{RegionRefAnnounce, WireMessage};

use crate::config::NodeConfig;
use crate::error::NodeError;

pub struct WorldNode<N> {
    config: NodeConfig,
    keyring: Option<Keyring>,
    manager: Arc<ChainManager>,
    sync: SyncService<N>,
    network: Arc<N>,
    registry: Arc<ContentRegistry>,
    checkpoints: Arc<CheckpointTracker>,
    checkpoint_subscription: Option<Subscription>,
    running: bool,
}

impl<N: PeerNetwork<NetError> + Send + Sync + 'static> WorldNode<N> {
    pub fn new(
        config: NodeConfig,
        network: Arc<N>,
        store: Arc<dyn ChainStore>,
    ) -> Result<Self, NodeError> {
        let keyring = config.keyring()?;
        let manager = Arc::new(ChainManager::new(store));
        let sync_config = SyncConfig::new(config.topic.clone())?
            .with_poll_interval(config.poll_interval)?;
        let sync = SyncService::new(Arc::clone(&network), Arc::clone(&manager), sync_config)?;
        let registry = Arc::new(ContentRegistry::builtin().map_err(|err| {
            NodeError::InvalidConfig {
                reason: format!("content registry: {}", err),
            }
        })?);
        let checkpoints = Arc::new(CheckpointTracker::new(config.checkpoint));
        Ok(Self {
            config,
            keyring,
            manager,
            sync,
            network,
            registry,
            checkpoints,
            checkpoint_subscription: None,
            running: false,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Node account, if the node holds key material.
    pub fn address(&self) -> Option<&verdant_world::Address> {
        self.keyring.as_ref().map(|keyring| keyring.address())
    }

    pub fn bus(&self) -> &EventBus<CommitEvent> {
        self.manager.bus()
    }

    pub fn head(&self, locator: Locator) -> Result<ChainHead, NodeError> {
        self.manager.head(locator).map_err(|err| NodeError::Chain {
            reason: err.to_string(),
        })
    }

    pub fn records(&self, locator: Locator) -> Result<Vec<ActionRecord>, NodeError> {
        self.manager
            .store()
            .records(locator)
            .map_err(|err| NodeError::Chain {
                reason: err.to_string(),
            })
    }

    pub fn sync_state(&self) -> SyncState {
        self.sync.state()
    }

    pub fn known_peers(&self) -> Vec<PeerId> {
        self.sync.known_peers()
    }

    pub fn remote_region_head(&self, region: verdant_world::Region) -> Option<u64> {
        self.sync.remote_region_head(region)
    }

    pub fn start(&mut self) -> Result<(), NodeError> {
        if self.running {
            return Err(NodeError::AlreadyRunning {
                node_id: self.config.node_id.clone(),
            });
        }

        let subscription = self.manager.bus().subscribe(self.checkpoint_handler());
        if let Err(err) = self.sync.start() {
            self.manager.bus().unsubscribe(subscription);
            return Err(err.into());
        }
        self.checkpoint_subscription = Some(subscription);
        self.running = true;
        tracing::info!(node_id = %self.config.node_id, topic = %self.config.topic, "node started");
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), NodeError> {
        if !self.running {
            return Err(NodeError::NotRunning {
                node_id: self.config.node_id.clone(),
            });
        }
        self.sync.stop()?;
        if let Some(subscription) = self.checkpoint_subscription.take() {
            self.manager.bus().unsubscribe(subscription);
        }
        self.running = false;
        tracing::info!(node_id = %self.config.node_id, "node stopped");
        Ok(())
    }

    /// Signs and commits a local action, then broadcasts it. The timestamp is
    /// placed just past the target chain's head so back-to-back submissions
    /// in the same millisecond stay distinct.
    pub fn submit_action(&self, action: Action) -> Result<CommitEvent, NodeError> {
        let locator = action.locator();
        let head_millis = self
            .head(locator)?
            .timestamp
            .millis();
        let timestamp = Timestamp(cmp::max(Timestamp::now().millis(), head_millis + 1));
        self.submit_action_at(action, timestamp)
    }

    /// Same as [`submit_action`](Self::submit_action) with a caller-chosen
    /// timestamp; a rejected submission reports the specific reason so the
    /// caller can adjust and retry.
    pub fn submit_action_at(
        &self,
        action: Action,
        timestamp: Timestamp,
    ) -> Result<CommitEvent, NodeError> {
        let keyring = self.keyring.as_ref().ok_or_else(|| NodeError::ReadOnly {
            node_id: self.config.node_id.clone(),
        })?;
        let record = seal_record(timestamp, keyring, RecordContent::from(action)).map_err(
            |err| NodeError::Chain {
                reason: err.to_string(),
            },
        )?;
        let candidate = record.into_candidate();

        let event = self
            .manager
            .verify_and_commit(candidate.clone())
            .map_err(|err| match err {
                VerifyError::Rejected { reason } => NodeError::ActionRejected { reason },
                other => NodeError::Chain {
                    reason: other.to_string(),
                },
            })?;

        if let Err(err) = self.sync.broadcast(&candidate) {
            tracing::warn!(error = %err, "broadcast of committed action failed");
        }
        Ok(event)
    }

    /// Commit-bus hook that turns region progress into stem checkpoints.
    fn checkpoint_handler(&self) -> impl Fn(&CommitEvent) + Send + Sync + 'static {
        let tracker = Arc::clone(&self.checkpoints);
        let keyring = self.keyring.clone();
        let manager = Arc::downgrade(&self.manager);
        let network = Arc::clone(&self.network);
        let registry = Arc::clone(&self.registry);
        let topic = self.config.topic.clone();
        let stem_clock = Arc::new(Mutex::new(()));

        move |event: &CommitEvent| {
            let Some(reference) = tracker.observe_commit(&event.head) else {
                return;
            };
            let Some(keyring) = keyring.as_ref() else {
                tracing::debug!(
                    region = %reference.region,
                    height = reference.height,
                    "checkpoint due but node holds no key material"
                );
                return;
            };
            let Some(manager) = manager.upgrade() else {
                return;
            };

            let _guard = stem_clock.lock().expect("lock stem clock");
            let head_millis = manager
                .head(Locator::Stem)
                .map(|head| head.timestamp.millis())
                .unwrap_or(0);
            let timestamp = Timestamp(cmp::max(Timestamp::now().millis(), head_millis + 1));
            let record = match seal_record(
                timestamp,
                keyring,
                RecordContent::RegionRef(reference.clone()),
            ) {
                Ok(record) => record,
                Err(err) => {
                    tracing::warn!(error = %err, "sealing checkpoint record failed");
                    return;
                }
            };
            let record_hash = record.hash.clone();

            match manager.verify_and_commit(record.clone().into_candidate()) {
                Ok(committed) => {
                    tracing::info!(
                        region = %reference.region,
                        region_height = reference.height,
                        stem_height = committed.head.height,
                        "region checkpoint committed to stem"
                    );
                    if let Err(err) = publish_record(network.as_ref(), &topic, &registry, &record)
                    {
                        tracing::warn!(error = %err, "broadcast of checkpoint record failed");
                    }
                    let announce = WireMessage::RegionRef(RegionRefAnnounce {
                        rx: reference.region.rx.0,
                        ry: reference.region.ry.0,
                        height: reference.height,
                        record_hash,
                    });
                    match announce.encode() {
                        Ok(bytes) => {
                            if let Err(err) =
                                network.publish(&topics::topic_record(&topic), &bytes)
                            {
                                tracing::warn!(error = %err, "checkpoint announcement failed");
                            }
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, "encode checkpoint announcement failed");
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "checkpoint record was not committed");
                }
            }
        }
    }
}
