#![forbid(unsafe_code)]

use super::scope::order_scope;
use super::subtree::subtree_scope;
use super::{ForestError, ForestStore, NodeRow, resolve_node, select_rows};
use arbor_core::model::ROOT_DEPTH;

impl ForestStore {
    /// Leaf nodes of the subtree below a node, in queue order.
    pub fn leaves(&self, id: i64) -> Result<Vec<NodeRow>, ForestError> {
        self.feature_rows(id, false)
    }

    /// Nodes of the subtree below a node that have children of their own.
    pub fn internals(&self, id: i64) -> Result<Vec<NodeRow>, ForestError> {
        self.feature_rows(id, true)
    }

    /// One pass over the subtree in descending queue order. The previously
    /// visited row is the node's successor in preorder: a node is a leaf
    /// iff that successor is not deeper than itself.
    fn feature_rows(&self, id: i64, internal: bool) -> Result<Vec<NodeRow>, ForestError> {
        let Some(base) = resolve_node(&self.conn, &self.config, id)? else {
            return Ok(Vec::new());
        };

        let scope = subtree_scope(&self.conn, &self.config, &base, false, false)?;
        let rows = select_rows(
            &self.conn,
            &self.config,
            &scope,
            &order_scope(&self.config, true, false),
            None,
        )?;

        let mut picked = Vec::new();
        let mut compare_depth = ROOT_DEPTH;
        for row in rows {
            let bingo = if internal {
                compare_depth > row.depth
            } else {
                compare_depth <= row.depth
            };
            compare_depth = row.depth;
            if bingo {
                picked.push(row);
            }
        }
        picked.reverse();
        Ok(picked)
    }
}
