#![forbid(unsafe_code)]

use super::scope::{Scope, order_scope};
use super::{ForestError, ForestStore, NodeRow, resolve_node, select_rows};
use arbor_core::config::ForestConfig;
use arbor_core::kinship::AncestorScope;
use arbor_core::model::ROOT_DEPTH;
use rusqlite::Connection;

impl ForestStore {
    /// Ancestors of a node, shallowest first. Empty for roots and unknown
    /// ids.
    pub fn trunk(&self, id: i64, scope: AncestorScope) -> Result<Vec<NodeRow>, ForestError> {
        let Some(base) = resolve_node(&self.conn, &self.config, id)? else {
            return Ok(Vec::new());
        };
        trunk_rows(&self.conn, &self.config, &base, scope)
    }

    pub fn ancestors(&self, id: i64) -> Result<Vec<NodeRow>, ForestError> {
        self.trunk(id, AncestorScope::All)
    }

    /// Parent node.
    pub fn genitor(&self, id: i64) -> Result<Option<NodeRow>, ForestError> {
        Ok(self
            .trunk(id, AncestorScope::Within(1))?
            .into_iter()
            .next())
    }

    pub fn grandparent(&self, id: i64) -> Result<Option<NodeRow>, ForestError> {
        let Some(base) = resolve_node(&self.conn, &self.config, id)? else {
            return Ok(None);
        };
        if base.depth < ROOT_DEPTH + 2 {
            return Ok(None);
        }
        // ordered by queue, so the deeper-reaching ancestor comes first
        Ok(trunk_rows(&self.conn, &self.config, &base, AncestorScope::Within(2))?
            .into_iter()
            .next())
    }

    /// Grove root above a node; the node itself when it is a root.
    pub fn root(&self, id: i64) -> Result<Option<NodeRow>, ForestError> {
        let Some(base) = resolve_node(&self.conn, &self.config, id)? else {
            return Ok(None);
        };
        if base.depth == ROOT_DEPTH {
            return Ok(Some(base));
        }
        Ok(
            trunk_rows(&self.conn, &self.config, &base, AncestorScope::RootOnly)?
                .into_iter()
                .next(),
        )
    }
}

/// Ancestor queues are not contiguous, so the chain is the per-depth
/// maximum queue below the base, fetched through an IN-subquery rather
/// than a range scan.
pub(crate) fn trunk_rows(
    conn: &Connection,
    config: &ForestConfig,
    base: &NodeRow,
    ancestor_scope: AncestorScope,
) -> Result<Vec<NodeRow>, ForestError> {
    if base.depth == ROOT_DEPTH {
        return Ok(Vec::new());
    }

    let depth = &config.depth_field;
    let queue = &config.queue_field;

    let mut inner = Scope::new(config, base.grove);
    inner.push(format!("{queue} < ?"), [base.queue]);
    match ancestor_scope {
        AncestorScope::RootOnly => inner.push(format!("{depth} = ?"), [ROOT_DEPTH]),
        AncestorScope::All => inner.push(format!("{depth} < ?"), [base.depth]),
        AncestorScope::Within(range) => {
            inner.push(format!("{depth} < ?"), [base.depth]);
            if range > 0 {
                inner.push(format!("{depth} >= ?"), [base.depth - range]);
            }
        }
    }
    let (inner_where, inner_params) = inner.into_parts();

    let mut scope = Scope::new(config, base.grove);
    scope.push(
        format!(
            "{queue} IN (SELECT MAX({queue}) FROM {table} WHERE {inner_where} GROUP BY {depth})",
            table = config.table,
        ),
        inner_params,
    );

    select_rows(conn, config, &scope, &order_scope(config, false, false), None)
}

pub(crate) fn genitor_row(
    conn: &Connection,
    config: &ForestConfig,
    base: &NodeRow,
) -> Result<Option<NodeRow>, ForestError> {
    Ok(trunk_rows(conn, config, base, AncestorScope::Within(1))?
        .into_iter()
        .next())
}
