#![forbid(unsafe_code)]

use arbor_core::config::ForestConfig;
use arbor_core::kinship::{Kinship, SiblingSide};
use arbor_storage::{ForestError, ForestStore, NodeRow, SproutRequest};
use std::path::PathBuf;

fn temp_dir(test_name: &str) -> PathBuf {
    let base = std::env::temp_dir();
    let pid = std::process::id();
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let dir = base.join(format!("arbor_storage_{test_name}_{pid}_{nonce}"));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn open_store(test_name: &str, config: ForestConfig) -> ForestStore {
    ForestStore::open(temp_dir(test_name), config).expect("open store")
}

fn plant_root(store: &mut ForestStore, grove: i64) -> NodeRow {
    store
        .sprout(SproutRequest {
            grove: Some(grove),
            base: None,
            kinship: Kinship::LAST_CHILD,
            payload: serde_json::Value::Null,
        })
        .expect("sprout root")
}

fn plant(store: &mut ForestStore, grove: i64, base: i64, kinship: Kinship) -> NodeRow {
    store
        .sprout(SproutRequest {
            grove: Some(grove),
            base: Some(base),
            kinship,
            payload: serde_json::Value::Null,
        })
        .expect("sprout node")
}

#[test]
fn roots_are_spaced_by_the_default_interval() {
    let mut store = open_store("roots_are_spaced", ForestConfig::default());

    let first = plant_root(&mut store, 1);
    assert_eq!(first.depth, 0);
    assert_eq!(first.queue, 0);

    let second = plant_root(&mut store, 1);
    assert_eq!(second.depth, 0);
    assert_eq!(second.queue, 0x8000);
}

#[test]
fn child_without_wedge_appends_past_the_grove_end() {
    let mut store = open_store("child_without_wedge", ForestConfig::default());

    let root = plant_root(&mut store, 1);
    let child = plant(&mut store, 1, root.id, Kinship::LAST_CHILD);
    assert_eq!(child.depth, 1);
    assert_eq!(child.queue, 0x8000);
}

#[test]
fn child_with_wedge_takes_the_median_queue() {
    let mut store = open_store("child_with_wedge", ForestConfig::default());

    let first = plant_root(&mut store, 1);
    let second = plant_root(&mut store, 1);
    assert_eq!(second.queue, 0x8000);

    // the second root is the wedge; the child lands mid-gap
    let child = plant(&mut store, 1, first.id, Kinship::LAST_CHILD);
    assert_eq!(child.depth, 1);
    assert_eq!(child.queue, 0x4000);
}

#[test]
fn nth_child_slot_and_elder_sibling_use_the_gap_before_the_wedge() {
    let mut store = open_store("nth_child_slot", ForestConfig::default());

    let root = plant_root(&mut store, 1);
    let first_child = plant(&mut store, 1, root.id, Kinship::LAST_CHILD);
    let second_child = plant(&mut store, 1, root.id, Kinship::LAST_CHILD);
    assert_eq!(first_child.queue, 0x8000);
    assert_eq!(second_child.queue, 0x10000);

    let head = plant(&mut store, 1, root.id, Kinship::Child(0));
    assert_eq!(head.depth, 1);
    assert_eq!(head.queue, 0x4000);

    let between = plant(
        &mut store,
        1,
        second_child.id,
        Kinship::Sibling(SiblingSide::Elder),
    );
    assert_eq!(between.depth, 1);
    assert_eq!(between.queue, 0xc000);
}

#[test]
fn sprout_requires_a_grove_when_configured() {
    let mut store = open_store("sprout_requires_grove", ForestConfig::default());

    let err = store
        .sprout(SproutRequest {
            grove: None,
            base: None,
            kinship: Kinship::LAST_CHILD,
            payload: serde_json::Value::Null,
        })
        .expect_err("expected missing grove");
    match err {
        ForestError::MissingGrove => {}
        other => panic!("expected MissingGrove, got {other:?}"),
    }
}

#[test]
fn sprout_rejects_an_unknown_base() {
    let mut store = open_store("sprout_unknown_base", ForestConfig::default());
    plant_root(&mut store, 1);

    let err = store
        .sprout(SproutRequest {
            grove: Some(1),
            base: Some(9999),
            kinship: Kinship::LAST_CHILD,
            payload: serde_json::Value::Null,
        })
        .expect_err("expected unknown base");
    match err {
        ForestError::UnknownNode => {}
        other => panic!("expected UnknownNode, got {other:?}"),
    }
}

#[test]
fn sprout_keeps_the_payload() {
    let mut store = open_store("sprout_payload", ForestConfig::default());

    let root = store
        .sprout(SproutRequest {
            grove: Some(1),
            base: None,
            kinship: Kinship::LAST_CHILD,
            payload: serde_json::json!({"name": "trunk", "weight": 3}),
        })
        .expect("sprout root");

    let reloaded = store.node(root.id).expect("fetch").expect("node exists");
    assert_eq!(reloaded.payload["name"], "trunk");
    assert_eq!(reloaded.payload["weight"], 3);
}

#[test]
fn saturated_grove_is_respaced_before_appending() {
    // shrunken queue space makes the ceiling reachable in a few inserts
    let config = ForestConfig {
        queue_interval: 3,
        max_queue: 15,
        ..ForestConfig::default()
    };
    let mut store = open_store("saturated_grove_respaced", config);

    let mut planted = Vec::new();
    for _ in 0..6 {
        planted.push(plant_root(&mut store, 1));
    }
    let queues: Vec<i64> = planted.iter().map(|node| node.queue).collect();
    assert_eq!(queues, vec![0, 3, 6, 9, 12, 15]);

    // the grove ends at the ceiling; the next root triggers a full respace
    let seventh = plant_root(&mut store, 1);
    assert_eq!(seventh.queue, 12);

    let rows = store.grove_nodes(Some(1)).expect("grove nodes");
    let queues: Vec<i64> = rows.iter().map(|node| node.queue).collect();
    assert_eq!(queues, vec![0, 2, 4, 6, 8, 10, 12]);

    // relative order survived the respace
    let ids: Vec<i64> = rows.iter().map(|node| node.id).collect();
    let mut expected: Vec<i64> = planted.iter().map(|node| node.id).collect();
    expected.push(seventh.id);
    assert_eq!(ids, expected);
}

#[test]
fn insertion_fails_only_when_the_queue_space_is_truly_full() {
    let config = ForestConfig {
        queue_interval: 3,
        max_queue: 15,
        ..ForestConfig::default()
    };
    let mut store = open_store("queue_space_full", config);

    // 16 queue values exist in [0, 15]; all 16 inserts must succeed
    let mut ids = Vec::new();
    for _ in 0..16 {
        ids.push(plant_root(&mut store, 1).id);
    }

    let err = store
        .sprout(SproutRequest {
            grove: Some(1),
            base: None,
            kinship: Kinship::LAST_CHILD,
            payload: serde_json::Value::Null,
        })
        .expect_err("expected exhausted queue space");
    match err {
        ForestError::QueueExhausted => {}
        other => panic!("expected QueueExhausted, got {other:?}"),
    }

    let rows = store.grove_nodes(Some(1)).expect("grove nodes");
    assert_eq!(rows.len(), 16);
    for window in rows.windows(2) {
        assert!(window[0].queue < window[1].queue);
    }
    assert!(rows.iter().all(|node| (0..=15).contains(&node.queue)));
    assert!(rows.iter().all(|node| node.depth == 0));

    // insertion order still equals traversal order
    let ordered: Vec<i64> = rows.iter().map(|node| node.id).collect();
    assert_eq!(ordered, ids);
}

#[test]
fn groveless_store_uses_a_single_implicit_grove() {
    let config = ForestConfig {
        grove_field: None,
        ..ForestConfig::default()
    };
    let mut store = open_store("groveless_store", config);

    let root = store
        .sprout(SproutRequest {
            grove: None,
            base: None,
            kinship: Kinship::LAST_CHILD,
            payload: serde_json::Value::Null,
        })
        .expect("sprout root");
    assert_eq!(root.grove, None);
    assert_eq!(root.queue, 0);

    let child = store
        .sprout(SproutRequest {
            grove: None,
            base: Some(root.id),
            kinship: Kinship::LAST_CHILD,
            payload: serde_json::Value::Null,
        })
        .expect("sprout child");
    assert_eq!(child.depth, 1);

    let err = store
        .sprout(SproutRequest {
            grove: Some(1),
            base: None,
            kinship: Kinship::LAST_CHILD,
            payload: serde_json::Value::Null,
        })
        .expect_err("grove value without a grove field");
    match err {
        ForestError::InvalidInput(message) => {
            assert_eq!(message, "grove field is not configured");
        }
        other => panic!("expected InvalidInput, got {other:?}"),
    }
}
