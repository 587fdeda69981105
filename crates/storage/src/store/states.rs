#![forbid(unsafe_code)]

use super::boundary::boundary_queue;
use super::siblings::sibling_rows;
use super::subtree::subtree_scope;
use super::trunk::genitor_row;
use super::{ForestError, ForestStore, NodeRow, count_rows, require_node};
use arbor_core::config::ForestConfig;
use arbor_core::model::ROOT_DEPTH;
use rusqlite::Connection;
use std::collections::BTreeSet;

impl ForestStore {
    pub fn is_root(&self, id: i64) -> Result<bool, ForestError> {
        let node = require_node(&self.conn, &self.config, id)?;
        Ok(node.depth == ROOT_DEPTH)
    }

    pub fn has_descendant(&self, id: i64) -> Result<bool, ForestError> {
        let node = require_node(&self.conn, &self.config, id)?;
        let scope = subtree_scope(&self.conn, &self.config, &node, false, true)?;
        Ok(count_rows(&self.conn, &self.config, &scope)? > 0)
    }

    pub fn is_leaf(&self, id: i64) -> Result<bool, ForestError> {
        Ok(!self.has_descendant(id)?)
    }

    /// Internal means neither root nor leaf.
    pub fn is_internal(&self, id: i64) -> Result<bool, ForestError> {
        let node = require_node(&self.conn, &self.config, id)?;
        if node.depth == ROOT_DEPTH {
            return Ok(false);
        }
        let scope = subtree_scope(&self.conn, &self.config, &node, false, true)?;
        Ok(count_rows(&self.conn, &self.config, &scope)? > 0)
    }

    pub fn has_sibling(&self, id: i64) -> Result<bool, ForestError> {
        let node = require_node(&self.conn, &self.config, id)?;
        if node.depth == ROOT_DEPTH {
            return Ok(false);
        }
        let parent = genitor_row(&self.conn, &self.config, &node)?
            .ok_or(ForestError::InvalidInput("ancestor chain is broken"))?;
        let mut scope = subtree_scope(&self.conn, &self.config, &parent, false, true)?;
        scope.push(format!("{} = ?", self.config.depth_field), [node.depth]);
        Ok(count_rows(&self.conn, &self.config, &scope)? > 1)
    }

    pub fn is_only_child(&self, id: i64) -> Result<bool, ForestError> {
        Ok(!self.has_sibling(id)?)
    }

    /// Is `other` inside the subtree of `base`?
    pub fn is_descendant(&self, base: i64, other: i64) -> Result<bool, ForestError> {
        let base = require_node(&self.conn, &self.config, base)?;
        let other = require_node(&self.conn, &self.config, other)?;
        if base.grove != other.grove {
            return Ok(false);
        }
        let tail = boundary_queue(&self.conn, &self.config, &base)?
            .map(|boundary| boundary - 1)
            .unwrap_or(self.config.max_queue);
        Ok(base.queue < other.queue && other.queue <= tail)
    }

    /// Is `other` on the ancestor chain of `base`?
    pub fn is_ancestor(&self, base: i64, other: i64) -> Result<bool, ForestError> {
        let other = require_node(&self.conn, &self.config, other)?;
        let ancestors = self.ancestors(base)?;
        Ok(ancestors.iter().any(|node| node.id == other.id))
    }

    /// Do all given nodes share one parent?
    pub fn are_siblings(&self, ids: &[i64]) -> Result<bool, ForestError> {
        match sibling_roster(&self.conn, &self.config, ids) {
            Ok(_) => Ok(true),
            Err(ForestError::NotSiblings) => Ok(false),
            Err(err) => Err(err),
        }
    }
}

/// Full ordered sibling list covering every given id, or `NotSiblings`.
pub(crate) fn sibling_roster(
    conn: &Connection,
    config: &ForestConfig,
    ids: &[i64],
) -> Result<Vec<NodeRow>, ForestError> {
    let Some(first) = ids.first() else {
        return Err(ForestError::InvalidInput("no nodes given"));
    };
    let mut seen = BTreeSet::new();
    for id in ids {
        if !seen.insert(*id) {
            return Err(ForestError::InvalidInput("duplicate node"));
        }
    }

    let eldest = require_node(conn, config, *first)?;
    let roster = sibling_rows(conn, config, &eldest)?;
    let roster_ids: BTreeSet<i64> = roster.iter().map(|node| node.id).collect();
    for id in ids {
        if !roster_ids.contains(id) {
            return Err(ForestError::NotSiblings);
        }
    }
    Ok(roster)
}
