#![forbid(unsafe_code)]

use super::boundary::{boundary_queue, last_queue_or, previous_queue, wedge_node};
use super::scope::{Scope, order_scope};
use super::subtree::bounded_subtree_scope;
use super::{ForestError, ForestStore, NodeRow, require_node};
use arbor_core::config::ForestConfig;
use arbor_core::kinship::Kinship;
use rusqlite::Connection;

impl ForestStore {
    /// Move a whole subtree so its top becomes a child or sibling of the
    /// target, per `kinship`. Tries, in order: a plain offset shift into
    /// the free gap before the wedge, a respaced shift when only the row
    /// count fits, and finally scooting the in-between run out of the way.
    /// Returns the number of rows touched; zero means the subtree was
    /// already in place.
    pub fn graft(
        &mut self,
        subject: i64,
        target: i64,
        kinship: Kinship,
    ) -> Result<usize, ForestError> {
        let config = &self.config;
        let tx = self.conn.transaction()?;

        let aim = require_node(&tx, config, subject)?;
        let base = require_node(&tx, config, target)?;

        if aim.grove != base.grove {
            return Err(ForestError::DifferentGroves);
        }

        let wedge = wedge_node(&tx, config, &base, kinship)?;
        let aim_boundary = boundary_queue(&tx, config, &aim)?;

        // A wedge at or before the subject's queue is a depth-only move and
        // legal; anything inside (subject, boundary] would put the subtree
        // under itself.
        if let Some(wedge) = &wedge {
            if wedge.queue > aim.queue {
                match aim_boundary {
                    Some(boundary) if wedge.queue > boundary => {}
                    _ => return Err(ForestError::GraftIntoOwnSubtree),
                }
            }
        }

        let depth_offset = base.depth - aim.depth + kinship.depth_step();

        let moved =
            match fit_to_graft(&tx, config, &aim, wedge.as_ref(), aim_boundary, depth_offset)? {
                Some(moved) => moved,
                None => scoot_over(&tx, config, &aim, wedge.as_ref(), aim_boundary, depth_offset)?,
            };

        tx.commit()?;
        Ok(moved)
    }
}

fn fit_to_graft(
    conn: &Connection,
    config: &ForestConfig,
    aim: &NodeRow,
    wedge: Option<&NodeRow>,
    aim_boundary: Option<i64>,
    depth_offset: i64,
) -> Result<Option<usize>, ForestError> {
    let shift_queue = aim.queue;

    let max_used = if aim_boundary.is_none() || wedge.is_none() {
        last_queue_or(conn, config, aim.grove, 0)?
    } else {
        0
    };

    let shift_span = match aim_boundary {
        Some(boundary) => boundary - shift_queue,
        None => max_used - shift_queue + 1,
    };

    let (wedge_space, previous) = match wedge {
        Some(wedge) => {
            let previous = previous_queue(conn, config, wedge)?;
            (wedge.queue - previous - 1, previous)
        }
        None => (config.max_queue - max_used, 0),
    };

    // the raw queue span fits into the gap: one constant shift
    if shift_span <= wedge_space {
        let queue_offset = match wedge {
            Some(_) => previous - shift_queue + 1,
            None => max_used - shift_queue + 1,
        };
        if queue_offset == 0 && depth_offset == 0 {
            return Ok(Some(0));
        }

        let mut sets = Vec::new();
        let mut set_params = Vec::new();
        if queue_offset != 0 {
            sets.push(format!(
                "{queue} = {queue} + ?",
                queue = config.queue_field
            ));
            set_params.push(queue_offset);
        }
        if depth_offset != 0 {
            sets.push(format!(
                "{depth} = {depth} + ?",
                depth = config.depth_field
            ));
            set_params.push(depth_offset);
        }

        let scope = bounded_subtree_scope(config, aim, aim_boundary, true);
        let changed = conn.execute(
            &format!(
                "UPDATE {table} SET {sets} WHERE {conditions}",
                table = config.table,
                sets = sets.join(", "),
                conditions = scope.where_sql(),
            ),
            rusqlite::params_from_iter(set_params.iter().chain(scope.params().iter())),
        )?;
        return Ok(Some(changed));
    }

    // only the row count fits: respace the subtree into the gap
    let scope = bounded_subtree_scope(config, aim, aim_boundary, true);
    let mut stmt = conn.prepare(&format!(
        "SELECT {id} FROM {table} WHERE {conditions} ORDER BY {order}",
        id = config.id_field,
        table = config.table,
        conditions = scope.where_sql(),
        order = order_scope(config, false, false),
    ))?;
    let ids: Vec<i64> = stmt
        .query_map(rusqlite::params_from_iter(scope.params().iter()), |row| {
            row.get(0)
        })?
        .collect::<Result<_, _>>()?;
    drop(stmt);

    let count = ids.len() as i64;
    if count >= 1 && count <= wedge_space {
        if wedge.is_none() && depth_offset == 0 {
            return Ok(None);
        }

        let interval = (wedge_space / count).min(config.queue_interval);
        let start = match wedge {
            Some(_) => previous,
            None => max_used,
        } + 1
            - interval;

        let sql = if depth_offset != 0 {
            format!(
                "UPDATE {table} SET {queue} = ?1, {depth} = {depth} + ?2 WHERE {id} = ?3",
                table = config.table,
                queue = config.queue_field,
                depth = config.depth_field,
                id = config.id_field,
            )
        } else {
            format!(
                "UPDATE {table} SET {queue} = ?1 WHERE {id} = ?2",
                table = config.table,
                queue = config.queue_field,
                id = config.id_field,
            )
        };
        let mut update = conn.prepare(&sql)?;
        for (index, id) in ids.iter().enumerate() {
            let new_queue = start + interval * (index as i64 + 1);
            if depth_offset != 0 {
                update.execute(rusqlite::params![new_queue, depth_offset, id])?;
            } else {
                update.execute(rusqlite::params![new_queue, id])?;
            }
        }
        return Ok(Some(ids.len()));
    }

    Ok(None)
}

/// Move the run of rows between the subtree and the wedge slot to the
/// other side of where the subtree lands, instead of moving the subtree
/// row by row. One conditional update keyed on which side of the split
/// each row's queue falls.
fn scoot_over(
    conn: &Connection,
    config: &ForestConfig,
    aim: &NodeRow,
    wedge: Option<&NodeRow>,
    aim_boundary: Option<i64>,
    depth_offset: i64,
) -> Result<usize, ForestError> {
    let aim_queue = aim.queue;

    let max_used = if aim_boundary.is_none() || wedge.is_none() {
        last_queue_or(conn, config, aim.grove, 0)?
    } else {
        0
    };

    let aim_tail = aim_boundary.map(|boundary| boundary - 1).unwrap_or(max_used);
    let wedge_tail = wedge.map(|node| node.queue - 1).unwrap_or(max_used);

    // equal queues count as retrogression: a pure depth shift
    let retrogression = wedge_tail <= aim_queue;

    let move_offset = if retrogression {
        wedge_tail - aim_queue + 1
    } else {
        wedge_tail - aim_tail
    };
    let involved_offset =
        (aim_tail - aim_queue + 1) * if retrogression { 1 } else { -1 };

    if retrogression && wedge_tail + 1 == aim_queue && depth_offset == 0 {
        return Ok(0);
    }

    let queue = &config.queue_field;
    let depth = &config.depth_field;

    let mut sets = Vec::new();
    let mut set_params = Vec::new();
    // SQLite evaluates every SET expression against the pre-update row, so
    // the queue and depth cases may share the old queue safely.
    if retrogression {
        sets.push(format!(
            "{queue} = {queue} + CASE WHEN {queue} < ? THEN ? ELSE ? END"
        ));
        set_params.extend([aim_queue, involved_offset, move_offset]);
    } else {
        sets.push(format!(
            "{queue} = {queue} + CASE WHEN {queue} <= ? THEN ? ELSE ? END"
        ));
        set_params.extend([aim_tail, move_offset, involved_offset]);
    }
    if depth_offset != 0 {
        sets.push(format!(
            "{depth} = {depth} + CASE WHEN ? <= {queue} AND {queue} <= ? THEN ? ELSE 0 END"
        ));
        set_params.extend([aim_queue, aim_tail, depth_offset]);
    }

    let (range_low, range_high) = if retrogression {
        (wedge_tail + 1, aim_tail)
    } else {
        (aim_queue, wedge_tail)
    };
    let mut scope = Scope::new(config, aim.grove);
    scope.push(format!("{queue} >= ?"), [range_low]);
    scope.push(format!("{queue} <= ?"), [range_high]);

    let changed = conn.execute(
        &format!(
            "UPDATE {table} SET {sets} WHERE {conditions}",
            table = config.table,
            sets = sets.join(", "),
            conditions = scope.where_sql(),
        ),
        rusqlite::params_from_iter(set_params.iter().chain(scope.params().iter())),
    )?;
    Ok(changed)
}
