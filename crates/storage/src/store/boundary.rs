#![forbid(unsafe_code)]

use super::scope::{Scope, order_scope};
use super::{ForestError, NodeRow, select_first, subtree};
use arbor_core::config::ForestConfig;
use arbor_core::kinship::{Kinship, SiblingSide};
use rusqlite::Connection;

/// First node after `base` in queue order at the same or a shallower depth:
/// the exclusive right edge of `base`'s subtree. `None` means the subtree
/// runs to the end of the grove.
pub(crate) fn boundary_node(
    conn: &Connection,
    config: &ForestConfig,
    base: &NodeRow,
) -> Result<Option<NodeRow>, ForestError> {
    let mut scope = Scope::new(config, base.grove);
    // same depth counts as a boundary, hence <=
    scope.push(format!("{} <= ?", config.depth_field), [base.depth]);
    scope.push(format!("{} > ?", config.queue_field), [base.queue]);
    select_first(
        conn,
        config,
        &scope,
        &format!("{} ASC", config.queue_field),
    )
}

pub(crate) fn boundary_queue(
    conn: &Connection,
    config: &ForestConfig,
    base: &NodeRow,
) -> Result<Option<i64>, ForestError> {
    Ok(boundary_node(conn, config, base)?.map(|node| node.queue))
}

/// Immediate predecessor of `base` in queue order within its grove.
pub(crate) fn previous_node(
    conn: &Connection,
    config: &ForestConfig,
    base: &NodeRow,
) -> Result<Option<NodeRow>, ForestError> {
    let mut scope = Scope::new(config, base.grove);
    scope.push(format!("{} < ?", config.queue_field), [base.queue]);
    select_first(conn, config, &scope, &order_scope(config, true, false))
}

pub(crate) fn previous_queue(
    conn: &Connection,
    config: &ForestConfig,
    base: &NodeRow,
) -> Result<i64, ForestError> {
    Ok(previous_node(conn, config, base)?
        .map(|node| node.queue)
        .unwrap_or(0))
}

pub(crate) fn last_node(
    conn: &Connection,
    config: &ForestConfig,
    grove: Option<i64>,
) -> Result<Option<NodeRow>, ForestError> {
    let scope = Scope::new(config, grove);
    select_first(conn, config, &scope, &order_scope(config, true, false))
}

pub(crate) fn last_queue(
    conn: &Connection,
    config: &ForestConfig,
    grove: Option<i64>,
) -> Result<Option<i64>, ForestError> {
    Ok(last_node(conn, config, grove)?.map(|node| node.queue))
}

pub(crate) fn last_queue_or(
    conn: &Connection,
    config: &ForestConfig,
    grove: Option<i64>,
    default: i64,
) -> Result<i64, ForestError> {
    Ok(last_queue(conn, config, grove)?.unwrap_or(default))
}

/// Node currently occupying the slot a new or moved node aims at.
/// `None` means the slot is the end of the grove.
pub(crate) fn wedge_node(
    conn: &Connection,
    config: &ForestConfig,
    base: &NodeRow,
    kinship: Kinship,
) -> Result<Option<NodeRow>, ForestError> {
    match kinship {
        Kinship::Child(nth) => {
            if nth >= 0 {
                if let Some(child) = subtree::nth_child_row(conn, config, base, nth)? {
                    return Ok(Some(child));
                }
            }
            boundary_node(conn, config, base)
        }
        Kinship::Sibling(SiblingSide::Elder) => Ok(Some(base.clone())),
        Kinship::Sibling(SiblingSide::Younger) => boundary_node(conn, config, base),
    }
}
