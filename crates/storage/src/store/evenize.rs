#![forbid(unsafe_code)]

use super::boundary::{boundary_queue, last_queue_or};
use super::scope::{Scope, order_scope};
use super::{
    ForestError, ForestStore, NodeRow, require_grove, require_node, select_rows,
};
use arbor_core::config::ForestConfig;
use arbor_core::model::ROOT_DEPTH;
use rusqlite::{Connection, params};

pub(crate) struct Evenized {
    /// Queue slot left open for the caller's new node.
    pub vacant_queue: i64,
    /// Rows whose queue actually changed.
    pub rewritten: usize,
}

/// Respace every row of a half-open queue range `[low, high)` to an even
/// interval, leaving room for `extra` additional nodes. `None` bounds mean
/// grove start/end. Returns `None` when the range cannot hold the target
/// row count even at interval 1.
///
/// The rewrite visits rows in traversal order and reassigns queues one row
/// at a time inside the enclosing transaction; relative order is preserved
/// by construction.
pub(crate) fn evenize(
    conn: &Connection,
    config: &ForestConfig,
    grove: Option<i64>,
    low: Option<i64>,
    high: Option<i64>,
    extra: i64,
    rear_justified: bool,
) -> Result<Option<Evenized>, ForestError> {
    if config.has_grove() && grove.is_none() {
        return Err(ForestError::MissingGrove);
    }

    if let (Some(low), Some(high)) = (low, high) {
        if high <= low + 1 {
            return Ok(None);
        }
    }

    let mut scope = Scope::new(config, grove);
    if let Some(low) = low {
        scope.push(format!("{} >= ?", config.queue_field), [low]);
    }
    if let Some(high) = high {
        scope.push(format!("{} < ?", config.queue_field), [high]);
    }
    let rows = select_rows(conn, config, &scope, &order_scope(config, false, false), None)?;

    let divide = rows.len() as i64 + extra;
    if divide < 1 {
        return Ok(None);
    }

    let low_queue = low.unwrap_or(0);
    let span = match high {
        Some(high) => high - low_queue,
        None => {
            let max_used = last_queue_or(conn, config, grove, 0)?;
            let requested = config.queue_interval * (extra + 1);
            if config.max_queue - max_used < requested {
                config.max_queue - low_queue + 1
            } else {
                max_used - low_queue + requested
            }
        }
    };

    let interval = span / divide;
    if interval < 1 {
        return Ok(None);
    }
    let interval = interval.min(config.queue_interval);

    // Rear justified: the vacated slot stays at `low`, existing rows move
    // past it. Otherwise the first row keeps `low` and the slot opens at
    // the high end of the rewritten run.
    let start = if rear_justified {
        low_queue + interval * (extra - 1)
    } else {
        low_queue - interval
    };

    let mut stmt = conn.prepare(&format!(
        "UPDATE {table} SET {queue} = ?1 WHERE {id} = ?2",
        table = config.table,
        queue = config.queue_field,
        id = config.id_field,
    ))?;
    let mut rewritten = 0usize;
    for (index, row) in rows.iter().enumerate() {
        let new_queue = start + interval * (index as i64 + 1);
        if new_queue != row.queue {
            stmt.execute(params![new_queue, row.id])?;
            rewritten += 1;
        }
    }

    let vacant_queue = low_queue
        + if rear_justified {
            0
        } else {
            interval * rows.len() as i64
        };

    Ok(Some(Evenized {
        vacant_queue,
        rewritten,
    }))
}

impl ForestStore {
    /// Respace queues between two nodes (either bound may be open) without
    /// reserving room for new rows. Returns how many rows changed; calling
    /// it again immediately changes nothing.
    pub fn normalize(
        &mut self,
        grove: Option<i64>,
        top: Option<i64>,
        boundary: Option<i64>,
    ) -> Result<usize, ForestError> {
        let config = &self.config;
        let tx = self.conn.transaction()?;

        let top_node = match top {
            Some(id) => Some(require_node(&tx, config, id)?),
            None => None,
        };
        let boundary_node = match boundary {
            Some(id) => Some(require_node(&tx, config, id)?),
            None => None,
        };

        let grove = match &top_node {
            Some(node) => node.grove,
            None => require_grove(config, grove)?,
        };

        let low = top_node.map(|node| node.queue);
        let high = boundary_node.map(|node| node.queue);

        let rewritten = match evenize(&tx, config, grove, low, high, 0, false)? {
            Some(outcome) => outcome.rewritten,
            None => 0,
        };

        tx.commit()?;
        Ok(rewritten)
    }

    /// Repair pass for depth faults: rows whose depth exceeds their
    /// predecessor's by more than one legal step. Never runs automatically;
    /// restructuring failures that abort mid-way leave this kind of damage.
    pub fn normalize_depth(&mut self, grove: Option<i64>) -> Result<usize, ForestError> {
        let config = &self.config;
        let grove = require_grove(config, grove)?;

        let tx = self.conn.transaction()?;

        let scope = Scope::new(config, grove);
        let rows = select_rows(&tx, config, &scope, &order_scope(config, false, false), None)?;

        // Collect every corrective range from one snapshot before touching
        // any row: (exclusive head queue, exclusive boundary queue).
        let mut corrections: Vec<(i64, Option<i64>)> = Vec::new();
        let mut faults = 0i64;
        let mut previous: Option<&NodeRow> = None;
        for row in &rows {
            let compare_depth = previous.map(|node| node.depth).unwrap_or(ROOT_DEPTH);
            if compare_depth + 1 < row.depth {
                faults += 1;
                if let Some(prev) = previous {
                    let offset = row.depth - prev.depth;
                    for step in 1..offset {
                        let probe = NodeRow {
                            id: prev.id,
                            grove: prev.grove,
                            depth: prev.depth + step,
                            queue: prev.queue,
                            payload: serde_json::Value::Null,
                        };
                        let boundary = boundary_queue(&tx, config, &probe)?;
                        corrections.push((prev.queue, boundary));
                    }
                }
                if faults >= config.subtree_limit {
                    break;
                }
            }
            previous = Some(row);
        }

        let mut changed = 0usize;
        for (head_queue, boundary) in corrections {
            let mut conditions = Scope::bare();
            if let (Some(value), Some(field)) = (grove, &config.grove_field) {
                conditions.push(format!("{field} = ?"), [value]);
            }
            conditions.push(format!("{} > ?", config.queue_field), [head_queue]);
            if let Some(boundary) = boundary {
                conditions.push(format!("{} < ?", config.queue_field), [boundary]);
            }
            changed += tx.execute(
                &format!(
                    "UPDATE {table} SET {depth} = {depth} - 1 WHERE {where_sql}",
                    table = config.table,
                    depth = config.depth_field,
                    where_sql = conditions.where_sql(),
                ),
                rusqlite::params_from_iter(conditions.params().iter()),
            )?;
        }

        tx.commit()?;
        Ok(changed)
    }
}
