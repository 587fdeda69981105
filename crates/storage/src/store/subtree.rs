#![forbid(unsafe_code)]

use super::boundary::boundary_queue;
use super::scope::{Scope, order_scope};
use super::{ForestError, ForestStore, NodeRow, resolve_node, select_rows};
use arbor_core::config::ForestConfig;
use arbor_core::nest::{NestedNodes, nested_nodes};
use rusqlite::Connection;

impl ForestStore {
    /// Subtree of a node, capped to `depth_range` levels below it
    /// (0 = unlimited) and paginated against the configured row limit.
    pub fn subtree(
        &self,
        id: i64,
        depth_range: i64,
        with_top: bool,
    ) -> Result<Vec<NodeRow>, ForestError> {
        let Some(base) = resolve_node(&self.conn, &self.config, id)? else {
            return Ok(Vec::new());
        };
        subtree_rows(&self.conn, &self.config, &base, depth_range, with_top)
    }

    pub fn descendants(&self, id: i64) -> Result<Vec<NodeRow>, ForestError> {
        self.subtree(id, 0, false)
    }

    pub fn children(&self, id: i64) -> Result<Vec<NodeRow>, ForestError> {
        self.subtree(id, 1, false)
    }

    pub fn grandchildren(&self, id: i64) -> Result<Vec<NodeRow>, ForestError> {
        let Some(base) = resolve_node(&self.conn, &self.config, id)? else {
            return Ok(Vec::new());
        };
        let rows = subtree_rows(&self.conn, &self.config, &base, 2, false)?;
        Ok(rows
            .into_iter()
            .filter(|row| row.depth == base.depth + 2)
            .collect())
    }

    /// Nth child in sibling order; a negative index selects the last child.
    pub fn nth_child(&self, id: i64, nth: i64) -> Result<Option<NodeRow>, ForestError> {
        let Some(base) = resolve_node(&self.conn, &self.config, id)? else {
            return Ok(None);
        };
        nth_child_row(&self.conn, &self.config, &base, nth)
    }

    /// `max(depth)` over the subtree minus the node's own depth.
    /// 0 for a leaf, `None` for an unknown node.
    pub fn height(&self, id: i64) -> Result<Option<i64>, ForestError> {
        let Some(base) = resolve_node(&self.conn, &self.config, id)? else {
            return Ok(None);
        };
        let scope = subtree_scope(&self.conn, &self.config, &base, true, true)?;
        let max_depth: Option<i64> = self.conn.query_row(
            &format!(
                "SELECT MAX({depth}) FROM {table} WHERE {conditions}",
                depth = self.config.depth_field,
                table = self.config.table,
                conditions = scope.where_sql(),
            ),
            rusqlite::params_from_iter(scope.params().iter()),
            |row| row.get(0),
        )?;
        Ok(max_depth.map(|depth| depth - base.depth))
    }

    /// Row count of the subtree including its top node.
    pub fn size(&self, id: i64) -> Result<Option<i64>, ForestError> {
        let Some(base) = resolve_node(&self.conn, &self.config, id)? else {
            return Ok(None);
        };
        let scope = subtree_scope(&self.conn, &self.config, &base, true, true)?;
        Ok(Some(super::count_rows(&self.conn, &self.config, &scope)?))
    }

    /// Subtree materialized as reconstructed parent/child links.
    pub fn nested_subtree(&self, id: i64) -> Result<NestedNodes, ForestError> {
        let rows = self.subtree(id, 0, true)?;
        let heads: Vec<_> = rows.iter().map(NodeRow::head).collect();
        Ok(nested_nodes(&heads))
    }
}

/// Queue-range conditions for a subtree when the boundary queue is already
/// known. `None` boundary means the subtree runs to the end of the grove.
pub(crate) fn bounded_subtree_scope(
    config: &ForestConfig,
    base: &NodeRow,
    boundary: Option<i64>,
    with_top: bool,
) -> Scope {
    let comparison = if with_top { ">=" } else { ">" };
    let mut scope = Scope::new(config, base.grove);
    scope.push(
        format!("{} {comparison} ?", config.queue_field),
        [base.queue],
    );
    match boundary {
        Some(boundary) => scope.push(format!("{} < ?", config.queue_field), [boundary]),
        None => scope.push(format!("{} <= ?", config.queue_field), [config.max_queue]),
    }
    scope
}

/// Subtree range conditions. With `single_statement` the boundary is folded
/// in as a correlated subquery; otherwise it is looked up first.
pub(crate) fn subtree_scope(
    conn: &Connection,
    config: &ForestConfig,
    base: &NodeRow,
    with_top: bool,
    single_statement: bool,
) -> Result<Scope, ForestError> {
    if !single_statement {
        let boundary = boundary_queue(conn, config, base)?;
        return Ok(bounded_subtree_scope(config, base, boundary, with_top));
    }

    let comparison = if with_top { ">=" } else { ">" };
    let mut scope = Scope::new(config, base.grove);
    scope.push(
        format!("{} {comparison} ?", config.queue_field),
        [base.queue],
    );

    let (inner_where, inner_params) = Scope::new(config, base.grove).into_parts();
    let queue = &config.queue_field;
    scope.push(
        format!(
            "{queue} <= COALESCE((SELECT MIN({queue}) - 1 FROM {table} \
             WHERE {inner_where} AND {depth} <= ? AND {queue} > ?), ?)",
            table = config.table,
            depth = config.depth_field,
        ),
        inner_params
            .into_iter()
            .chain([base.depth, base.queue, config.max_queue]),
    );
    Ok(scope)
}

pub(crate) fn subtree_rows(
    conn: &Connection,
    config: &ForestConfig,
    base: &NodeRow,
    depth_range: i64,
    with_top: bool,
) -> Result<Vec<NodeRow>, ForestError> {
    let mut scope = subtree_scope(conn, config, base, with_top, true)?;
    let limited = limited_subtree_depth(conn, config, base.depth, depth_range, &scope)?;
    scope.push(format!("{} <= ?", config.depth_field), [limited]);
    select_rows(conn, config, &scope, &order_scope(config, false, false), None)
}

/// Deepest level that keeps the cumulative subtree row count under the
/// configured limit, never above the requested range and never shallower
/// than the base's children.
fn limited_subtree_depth(
    conn: &Connection,
    config: &ForestConfig,
    base_depth: i64,
    depth_range: i64,
    scope: &Scope,
) -> Result<i64, ForestError> {
    let ordered_depth = if depth_range == 0 {
        0
    } else {
        base_depth + depth_range
    };

    let mut stmt = conn.prepare(&format!(
        "SELECT {depth}, COUNT(*) FROM {table} WHERE {conditions} \
         GROUP BY {depth} ORDER BY {depth} ASC",
        depth = config.depth_field,
        table = config.table,
        conditions = scope.where_sql(),
    ))?;
    let mut rows = stmt.query(rusqlite::params_from_iter(scope.params().iter()))?;

    let mut total = 0i64;
    let mut limited_depth = 0i64;
    while let Some(row) = rows.next()? {
        let depth: i64 = row.get(0)?;
        let count: i64 = row.get(1)?;
        total += count;
        if config.subtree_limit < total {
            break;
        }
        limited_depth = depth;
    }

    let limited_depth = limited_depth.max(base_depth + 1);
    if ordered_depth == 0 {
        Ok(limited_depth)
    } else {
        Ok(limited_depth.min(ordered_depth))
    }
}

pub(crate) fn children_rows(
    conn: &Connection,
    config: &ForestConfig,
    base: &NodeRow,
) -> Result<Vec<NodeRow>, ForestError> {
    subtree_rows(conn, config, base, 1, false)
}

pub(crate) fn nth_child_row(
    conn: &Connection,
    config: &ForestConfig,
    base: &NodeRow,
    nth: i64,
) -> Result<Option<NodeRow>, ForestError> {
    let children = children_rows(conn, config, base)?;
    let index = if nth < 0 {
        match children.len() {
            0 => return Ok(None),
            len => len - 1,
        }
    } else {
        nth as usize
    };
    Ok(children.get(index).cloned())
}
