use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use verdant_world::{
    Action, Address, Coordinate, InMemoryChainStore, Item, Locator, PlantType, RecordContent,
    RegionIndex, SeedAction, Tile, Timestamp,
};
use verdant_world::{RejectReason, Region};
use verdant_world_net::{InMemoryNetwork, SyncState};

use crate::{NodeConfig, NodeError, WorldNode};

fn authoring_config(node_id: &str, seed_byte: u8) -> NodeConfig {
    NodeConfig::new(node_id, "e2e")
        .expect("config")
        .with_private_key_hex(hex::encode([seed_byte; 32]))
        .expect("key")
        .with_poll_interval(Duration::from_millis(5))
        .expect("poll interval")
}

fn observer_config(node_id: &str) -> NodeConfig {
    NodeConfig::new(node_id, "e2e")
        .expect("config")
        .with_poll_interval(Duration::from_millis(5))
        .expect("poll interval")
}

fn new_node(config: NodeConfig, network: &InMemoryNetwork) -> WorldNode<InMemoryNetwork> {
    WorldNode::new(
        config,
        Arc::new(network.clone()),
        Arc::new(InMemoryChainStore::new()),
    )
    .expect("node")
}

fn seed_action(owner: Address, x: u32) -> Action {
    Action::Seed(SeedAction {
        plot: Tile::Plot {
            x: Coordinate(x),
            y: Coordinate(0),
            plant: None,
        },
        seed: Item::Seed {
            owner,
            plant_type: PlantType::Wheat,
        },
    })
}

fn wait_for<F: Fn() -> bool>(what: &str, predicate: F) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if predicate() {
            return;
        }
        thread::sleep(Duration::from_millis(10));
    }
    panic!("timed out waiting for {what}");
}

#[test]
fn lifecycle_misuse_is_reported() {
    let network = InMemoryNetwork::new();
    let mut node = new_node(authoring_config("n1", 1), &network);

    let err = node.stop().expect_err("stop before start");
    assert!(matches!(err, NodeError::NotRunning { .. }));

    node.start().expect("start");
    assert_eq!(node.sync_state(), SyncState::Listening);
    let err = node.start().expect_err("second start");
    assert!(matches!(err, NodeError::AlreadyRunning { .. }));

    node.stop().expect("stop");
    assert_eq!(node.sync_state(), SyncState::Stopped);
}

#[test]
fn node_without_key_material_cannot_author() {
    let network = InMemoryNetwork::new();
    let node = new_node(observer_config("observer"), &network);
    assert!(node.address().is_none());

    let owner = verdant_world::Keyring::generate().address().clone();
    let err = node
        .submit_action(seed_action(owner, 1))
        .expect_err("must fail");
    assert!(matches!(err, NodeError::ReadOnly { .. }));
}

#[test]
fn submitted_action_replicates_to_a_peer_node() {
    let network = InMemoryNetwork::new();
    let mut author = new_node(authoring_config("author", 2), &network);
    let mut observer = new_node(observer_config("observer"), &network);
    author.start().expect("start author");
    observer.start().expect("start observer");

    let owner = author.address().expect("address").clone();
    let event = author
        .submit_action(seed_action(owner, 3))
        .expect("submit");
    let locator = event.record.content.locator();
    assert_eq!(event.head.height, 1);

    wait_for("observer to commit the record", || {
        observer
            .head(locator)
            .map(|head| head.height == 1)
            .unwrap_or(false)
    });
    let observer_head = observer.head(locator).expect("head");
    assert_eq!(observer_head.hash, event.record.hash);
    assert_eq!(observer_head.height, 1);

    author.stop().expect("stop author");
    observer.stop().expect("stop observer");
}

#[test]
fn duplicate_author_timestamp_pair_is_rejected_with_reason() {
    let network = InMemoryNetwork::new();
    let mut node = new_node(authoring_config("n1", 3), &network);
    node.start().expect("start");

    let owner = node.address().expect("address").clone();
    node.submit_action_at(seed_action(owner.clone(), 1), Timestamp(1_000))
        .expect("first submit");
    let err = node
        .submit_action_at(seed_action(owner, 2), Timestamp(1_000))
        .expect_err("replay must fail");
    assert!(matches!(
        err,
        NodeError::ActionRejected {
            reason: RejectReason::DuplicateAction { .. }
        }
    ));

    node.stop().expect("stop");
}

#[test]
fn out_of_order_submission_reports_the_reason() {
    let network = InMemoryNetwork::new();
    let mut node = new_node(authoring_config("n1", 4), &network);
    node.start().expect("start");

    let owner = node.address().expect("address").clone();
    node.submit_action_at(seed_action(owner.clone(), 1), Timestamp(2_000))
        .expect("first submit");
    let err = node
        .submit_action_at(seed_action(owner, 2), Timestamp(1_500))
        .expect_err("must fail");
    assert!(matches!(
        err,
        NodeError::ActionRejected {
            reason: RejectReason::OutOfOrder { .. }
        }
    ));

    node.stop().expect("stop");
}

#[test]
fn region_progress_is_checkpointed_onto_the_stem() {
    let network = InMemoryNetwork::new();
    let config = authoring_config("author", 5)
        .with_checkpoint_threshold(2)
        .expect("threshold");
    let mut author = new_node(config, &network);
    let mut observer = new_node(observer_config("observer"), &network);
    author.start().expect("start author");
    observer.start().expect("start observer");

    let owner = author.address().expect("address").clone();
    author
        .submit_action(seed_action(owner.clone(), 1))
        .expect("submit");
    author
        .submit_action(seed_action(owner.clone(), 2))
        .expect("submit");

    wait_for("stem checkpoint on the author", || {
        author
            .head(Locator::Stem)
            .map(|head| head.height >= 1)
            .unwrap_or(false)
    });
    let stem_records = author.records(Locator::Stem).expect("stem records");
    let reference = stem_records[0]
        .content
        .as_region_ref()
        .expect("region ref content")
        .clone();
    assert_eq!(reference.height, 2);

    // The checkpoint record itself gossips like any other candidate.
    wait_for("stem checkpoint on the observer", || {
        observer
            .head(Locator::Stem)
            .map(|head| head.height >= 1)
            .unwrap_or(false)
    });
    let region = Region {
        rx: RegionIndex(0),
        ry: RegionIndex(0),
    };
    wait_for("checkpoint announcement on the observer", || {
        observer.remote_region_head(region) == Some(2)
    });

    // Two more region commits trigger the next checkpoint, strictly higher.
    author
        .submit_action(seed_action(owner.clone(), 3))
        .expect("submit");
    author
        .submit_action(seed_action(owner, 4))
        .expect("submit");
    wait_for("second stem checkpoint", || {
        author
            .head(Locator::Stem)
            .map(|head| head.height >= 2)
            .unwrap_or(false)
    });
    let stem_records = author.records(Locator::Stem).expect("stem records");
    let second = stem_records[1]
        .content
        .as_region_ref()
        .expect("region ref content");
    assert_eq!(second.height, 4);

    author.stop().expect("stop author");
    observer.stop().expect("stop observer");
}

#[test]
fn commits_are_published_on_the_node_bus_in_order() {
    let network = InMemoryNetwork::new();
    let mut node = new_node(authoring_config("n1", 6), &network);
    node.start().expect("start");

    let heights = Arc::new(std::sync::Mutex::new(Vec::new()));
    let heights_clone = Arc::clone(&heights);
    let subscription = node.bus().subscribe(move |event| {
        if matches!(event.record.content, RecordContent::Seed(_)) {
            heights_clone
                .lock()
                .expect("lock")
                .push(event.head.height);
        }
    });

    let owner = node.address().expect("address").clone();
    node.submit_action(seed_action(owner.clone(), 1))
        .expect("submit");
    node.submit_action(seed_action(owner.clone(), 2))
        .expect("submit");
    node.submit_action(seed_action(owner, 3)).expect("submit");

    assert_eq!(*heights.lock().expect("lock"), vec![1, 2, 3]);
    node.bus().unsubscribe(subscription);
    node.stop().expect("stop");
}

#[test]
fn stopped_node_no_longer_verifies_remote_candidates() {
    let network = InMemoryNetwork::new();
    let mut author = new_node(authoring_config("author", 7), &network);
    let mut observer = new_node(observer_config("observer"), &network);
    author.start().expect("start author");
    observer.start().expect("start observer");
    observer.stop().expect("stop observer");

    let owner = author.address().expect("address").clone();
    let event = author.submit_action(seed_action(owner, 1)).expect("submit");
    let locator = event.record.content.locator();

    thread::sleep(Duration::from_millis(100));
    let head = observer.head(locator).expect("head");
    assert_eq!(head.height, 0);

    author.stop().expect("stop author");
}
