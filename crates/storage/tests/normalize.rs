#![forbid(unsafe_code)]

use arbor_core::config::ForestConfig;
use arbor_core::kinship::Kinship;
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

fn plant(store: &mut ForestStore, grove: i64, base: Option<i64>, kinship: Kinship) -> NodeRow {
    store
        .sprout(SproutRequest {
            grove: Some(grove),
            base,
            kinship,
            payload: serde_json::Value::Null,
        })
        .expect("sprout node")
}

fn queues(store: &ForestStore, grove: i64) -> Vec<(i64, i64)> {
    store
        .grove_nodes(Some(grove))
        .expect("grove nodes")
        .iter()
        .map(|node| (node.id, node.queue))
        .collect()
}

#[test]
fn normalize_between_two_nodes_is_idempotent() {
    let mut store =
        ForestStore::open(temp_dir("normalize_idempotent"), ForestConfig::default())
            .expect("open store");

    let r1 = plant(&mut store, 1, None, Kinship::LAST_CHILD);
    let r2 = plant(&mut store, 1, None, Kinship::LAST_CHILD);
    // median inserts crowd the gap unevenly
    let c1 = plant(&mut store, 1, Some(r1.id), Kinship::LAST_CHILD);
    let c2 = plant(&mut store, 1, Some(r1.id), Kinship::Child(0));
    assert_eq!(c1.queue, 0x4000);
    assert_eq!(c2.queue, 0x2000);

    let order_before: Vec<i64> = queues(&store, 1).iter().map(|(id, _)| *id).collect();

    let first_pass = store
        .normalize(None, Some(r1.id), Some(r2.id))
        .expect("normalize");
    assert!(first_pass > 0);

    // identical bounds produce identical spacing: nothing left to rewrite
    let second_pass = store
        .normalize(None, Some(r1.id), Some(r2.id))
        .expect("normalize again");
    assert_eq!(second_pass, 0);

    // relative order and hierarchy survive
    let order_after: Vec<i64> = queues(&store, 1).iter().map(|(id, _)| *id).collect();
    assert_eq!(order_before, order_after);
    assert_eq!(
        store
            .children(r1.id)
            .expect("children")
            .iter()
            .map(|node| node.id)
            .collect::<Vec<_>>(),
        vec![c2.id, c1.id]
    );
}

#[test]
fn normalize_spreads_a_crowded_range_evenly() {
    let mut store =
        ForestStore::open(temp_dir("normalize_spreads"), ForestConfig::default())
            .expect("open store");

    let r1 = plant(&mut store, 1, None, Kinship::LAST_CHILD);
    let r2 = plant(&mut store, 1, None, Kinship::LAST_CHILD);
    let c1 = plant(&mut store, 1, Some(r1.id), Kinship::LAST_CHILD);
    let c2 = plant(&mut store, 1, Some(r1.id), Kinship::Child(0));

    store
        .normalize(None, Some(r1.id), Some(r2.id))
        .expect("normalize");

    // range [0, 0x8000) with three rows: interval 0x8000 / 3
    let spaced = queues(&store, 1);
    assert_eq!(spaced, vec![
        (r1.id, 0),
        (c2.id, 0x2aaa),
        (c1.id, 0x5554),
        (r2.id, 0x8000),
    ]);
}

#[test]
fn normalize_requires_a_grove_or_a_top_node() {
    let mut store =
        ForestStore::open(temp_dir("normalize_requires_grove"), ForestConfig::default())
            .expect("open store");
    plant(&mut store, 1, None, Kinship::LAST_CHILD);

    let err = store
        .normalize(None, None, None)
        .expect_err("expected missing grove");
    match err {
        ForestError::MissingGrove => {}
        other => panic!("expected MissingGrove, got {other:?}"),
    }

    // a whole-grove pass is fine once the grove is named
    let rewritten = store.normalize(Some(1), None, None).expect("normalize");
    assert_eq!(rewritten, 0);
}

#[test]
fn normalize_depth_repairs_a_depth_fault() {
    let dir = temp_dir("normalize_depth_repairs");
    let (r1, a, b) = {
        let mut store =
            ForestStore::open(&dir, ForestConfig::default()).expect("open store");
        let r1 = plant(&mut store, 1, None, Kinship::LAST_CHILD);
        let a = plant(&mut store, 1, Some(r1.id), Kinship::LAST_CHILD);
        let b = plant(&mut store, 1, Some(a.id), Kinship::LAST_CHILD);
        (r1, a, b)
    };

    // corrupt the deepest node: depth 2 -> 4 skips two levels
    {
        let raw = rusqlite::Connection::open(dir.join("arbor.db")).expect("open raw");
        raw.execute(
            "UPDATE nodes SET depth = 4 WHERE id = ?1",
            rusqlite::params![b.id],
        )
        .expect("corrupt depth");
    }

    let mut store = ForestStore::open(&dir, ForestConfig::default()).expect("reopen store");
    assert_eq!(store.node(b.id).expect("fetch").expect("b").depth, 4);

    let repaired = store.normalize_depth(Some(1)).expect("normalize depth");
    assert_eq!(repaired, 2);

    assert_eq!(store.node(r1.id).expect("fetch").expect("r1").depth, 0);
    assert_eq!(store.node(a.id).expect("fetch").expect("a").depth, 1);
    assert_eq!(store.node(b.id).expect("fetch").expect("b").depth, 2);
    // hierarchy reads correctly again
    assert_eq!(
        store
            .ancestors(b.id)
            .expect("ancestors")
            .iter()
            .map(|node| node.id)
            .collect::<Vec<_>>(),
        vec![r1.id, a.id]
    );
}

#[test]
fn normalize_depth_without_faults_changes_nothing() {
    let mut store =
        ForestStore::open(temp_dir("normalize_depth_clean"), ForestConfig::default())
            .expect("open store");
    let r1 = plant(&mut store, 1, None, Kinship::LAST_CHILD);
    let a = plant(&mut store, 1, Some(r1.id), Kinship::LAST_CHILD);
    plant(&mut store, 1, Some(a.id), Kinship::LAST_CHILD);

    let repaired = store.normalize_depth(Some(1)).expect("normalize depth");
    assert_eq!(repaired, 0);
}
