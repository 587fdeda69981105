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

fn plant(store: &mut ForestStore, grove: i64, base: Option<i64>) -> NodeRow {
    store
        .sprout(SproutRequest {
            grove: Some(grove),
            base,
            kinship: Kinship::LAST_CHILD,
            payload: serde_json::Value::Null,
        })
        .expect("sprout node")
}

fn ids(rows: &[NodeRow]) -> Vec<i64> {
    rows.iter().map(|node| node.id).collect()
}

/// r1 { c1 { x }, c2, c3 }, r2 — all in grove 1.
struct Fixture {
    store: ForestStore,
    r1: NodeRow,
    c1: NodeRow,
    x: NodeRow,
    c2: NodeRow,
    c3: NodeRow,
    r2: NodeRow,
}

fn fixture(test_name: &str) -> Fixture {
    let mut store =
        ForestStore::open(temp_dir(test_name), ForestConfig::default()).expect("open store");
    let r1 = plant(&mut store, 1, None);
    let c1 = plant(&mut store, 1, Some(r1.id));
    let x = plant(&mut store, 1, Some(c1.id));
    let c2 = plant(&mut store, 1, Some(r1.id));
    let c3 = plant(&mut store, 1, Some(r1.id));
    let r2 = plant(&mut store, 1, None);
    Fixture {
        store,
        r1,
        c1,
        x,
        c2,
        c3,
        r2,
    }
}

#[test]
fn permute_reorders_siblings_with_their_subtrees() {
    let mut f = fixture("permute_reorders");
    let r1_queue = f.store.node(f.r1.id).expect("fetch").expect("r1").queue;
    let r2_queue = f.store.node(f.r2.id).expect("fetch").expect("r2").queue;

    let changed = f
        .store
        .permute(&[f.c3.id, f.c1.id, f.c2.id])
        .expect("permute");
    assert_eq!(changed, 4);

    assert_eq!(ids(&f.store.children(f.r1.id).expect("children")), vec![
        f.c3.id,
        f.c1.id,
        f.c2.id
    ]);
    // the subtree travels with its sibling
    assert_eq!(ids(&f.store.children(f.c1.id).expect("children")), vec![
        f.x.id
    ]);
    assert_eq!(
        ids(&f.store.ancestors(f.x.id).expect("ancestors")),
        vec![f.r1.id, f.c1.id]
    );

    // rows outside the sibling range stay untouched
    assert_eq!(
        f.store.node(f.r1.id).expect("fetch").expect("r1").queue,
        r1_queue
    );
    assert_eq!(
        f.store.node(f.r2.id).expect("fetch").expect("r2").queue,
        r2_queue
    );
}

#[test]
fn permute_accepts_a_subset_and_keeps_other_slots() {
    let mut f = fixture("permute_subset");

    // swap c1 and c3, leaving c2's slot alone
    f.store.permute(&[f.c3.id, f.c1.id]).expect("permute");

    assert_eq!(ids(&f.store.children(f.r1.id).expect("children")), vec![
        f.c3.id,
        f.c2.id,
        f.c1.id
    ]);
}

#[test]
fn permute_in_current_order_writes_nothing() {
    let mut f = fixture("permute_no_op");

    let changed = f
        .store
        .permute(&[f.c1.id, f.c2.id, f.c3.id])
        .expect("permute");
    assert_eq!(changed, 0);

    let changed = f.store.permute(&[f.c1.id]).expect("single node");
    assert_eq!(changed, 0);
}

#[test]
fn permute_rejects_non_siblings() {
    let mut f = fixture("permute_non_siblings");

    let err = f
        .store
        .permute(&[f.c1.id, f.x.id])
        .expect_err("expected sibling validation");
    match err {
        ForestError::NotSiblings => {}
        other => panic!("expected NotSiblings, got {other:?}"),
    }

    let err = f.store.permute(&[]).expect_err("expected empty rejection");
    match err {
        ForestError::InvalidInput(message) => assert_eq!(message, "no nodes to permute"),
        other => panic!("expected InvalidInput, got {other:?}"),
    }
}

#[test]
fn move_to_sends_a_node_to_a_rank_or_the_end() {
    let mut f = fixture("move_to_rank");

    f.store.move_to(f.c1.id, -1).expect("move to end");
    assert_eq!(ids(&f.store.children(f.r1.id).expect("children")), vec![
        f.c2.id,
        f.c3.id,
        f.c1.id
    ]);

    f.store.move_to(f.c1.id, 0).expect("move to head");
    assert_eq!(ids(&f.store.children(f.r1.id).expect("children")), vec![
        f.c1.id,
        f.c2.id,
        f.c3.id
    ]);
}

#[test]
fn move_to_rejects_the_current_rank_and_out_of_range() {
    let mut f = fixture("move_to_rejects");

    let err = f.store.move_to(f.c1.id, 0).expect_err("already there");
    match err {
        ForestError::InvalidInput(message) => {
            assert_eq!(message, "node already holds the requested rank");
        }
        other => panic!("expected InvalidInput, got {other:?}"),
    }

    let err = f.store.move_to(f.c1.id, 5).expect_err("out of range");
    match err {
        ForestError::InvalidInput(message) => assert_eq!(message, "rank is out of range"),
        other => panic!("expected InvalidInput, got {other:?}"),
    }

    // roots have no sibling order to move within
    let err = f.store.move_to(f.r1.id, 1).expect_err("root move");
    match err {
        ForestError::NotSiblings => {}
        other => panic!("expected NotSiblings, got {other:?}"),
    }
}

#[test]
fn move_by_clamps_at_the_head_and_saturates_to_the_end() {
    let mut f = fixture("move_by_clamps");

    f.store.move_by(f.c3.id, -2).expect("move by -2");
    assert_eq!(ids(&f.store.children(f.r1.id).expect("children")), vec![
        f.c3.id,
        f.c1.id,
        f.c2.id
    ]);

    f.store.move_by(f.c3.id, 10).expect("saturate to end");
    assert_eq!(ids(&f.store.children(f.r1.id).expect("children")), vec![
        f.c1.id,
        f.c2.id,
        f.c3.id
    ]);

    let err = f.store.move_by(f.c3.id, 0).expect_err("zero offset");
    match err {
        ForestError::InvalidInput(message) => assert_eq!(message, "zero move offset"),
        other => panic!("expected InvalidInput, got {other:?}"),
    }
}
