#![forbid(unsafe_code)]

use super::scope::{Scope, order_scope};
use super::subtree::{children_rows, nth_child_row};
use super::trunk::genitor_row;
use super::{ForestError, ForestStore, NodeRow, resolve_node, select_rows};
use arbor_core::config::ForestConfig;
use arbor_core::model::ROOT_DEPTH;
use rusqlite::Connection;

impl ForestStore {
    /// All children of the node's parent, the node included, in sibling
    /// order. Empty for roots and unknown ids.
    pub fn siblings(&self, id: i64) -> Result<Vec<NodeRow>, ForestError> {
        let Some(base) = resolve_node(&self.conn, &self.config, id)? else {
            return Ok(Vec::new());
        };
        sibling_rows(&self.conn, &self.config, &base)
    }

    pub fn nth_sibling(&self, id: i64, nth: i64) -> Result<Option<NodeRow>, ForestError> {
        let Some(base) = resolve_node(&self.conn, &self.config, id)? else {
            return Ok(None);
        };
        let Some(parent) = genitor_row(&self.conn, &self.config, &base)? else {
            return Ok(None);
        };
        nth_child_row(&self.conn, &self.config, &parent, nth)
    }

    /// Sibling at a signed distance from the node; `None` when the offset
    /// walks off either end.
    pub fn offset_sibling(&self, id: i64, offset: i64) -> Result<Option<NodeRow>, ForestError> {
        let Some(base) = resolve_node(&self.conn, &self.config, id)? else {
            return Ok(None);
        };
        let Some(parent) = genitor_row(&self.conn, &self.config, &base)? else {
            return Ok(None);
        };
        let children = children_rows(&self.conn, &self.config, &parent)?;
        let Some(position) = children.iter().position(|child| child.id == base.id) else {
            return Ok(None);
        };
        let target = position as i64 + offset;
        if target < 0 {
            return Ok(None);
        }
        Ok(children.get(target as usize).cloned())
    }

    pub fn elder_sibling(&self, id: i64) -> Result<Option<NodeRow>, ForestError> {
        self.offset_sibling(id, -1)
    }

    pub fn younger_sibling(&self, id: i64) -> Result<Option<NodeRow>, ForestError> {
        self.offset_sibling(id, 1)
    }
}

/// Single range query: rows at the base's depth, fenced between the nearest
/// shallower nodes on either side. No ancestor lookup involved.
pub(crate) fn sibling_rows(
    conn: &Connection,
    config: &ForestConfig,
    base: &NodeRow,
) -> Result<Vec<NodeRow>, ForestError> {
    if base.depth == ROOT_DEPTH {
        return Ok(Vec::new());
    }

    let queue = &config.queue_field;
    let depth = &config.depth_field;
    let table = &config.table;

    let mut scope = Scope::new(config, base.grove);
    scope.push(format!("{depth} = ?"), [base.depth]);

    let mut head = Scope::new(config, base.grove);
    head.push(format!("{queue} < ?"), [base.queue]);
    head.push(format!("{depth} < ?"), [base.depth]);
    let (head_where, head_params) = head.into_parts();
    scope.push(
        format!(
            "{queue} >= COALESCE((SELECT MAX({queue}) + 1 FROM {table} WHERE {head_where}), 0)"
        ),
        head_params,
    );

    let mut tail = Scope::new(config, base.grove);
    tail.push(format!("{queue} > ?"), [base.queue]);
    tail.push(format!("{depth} < ?"), [base.depth]);
    let (tail_where, tail_params) = tail.into_parts();
    scope.push(
        format!(
            "{queue} <= COALESCE((SELECT MIN({queue}) - 1 FROM {table} WHERE {tail_where}), ?)"
        ),
        tail_params.into_iter().chain([config.max_queue]),
    );

    select_rows(conn, config, &scope, &order_scope(config, false, false), None)
}
