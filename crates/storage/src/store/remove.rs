#![forbid(unsafe_code)]

use super::boundary::boundary_queue;
use super::subtree::bounded_subtree_scope;
use super::trunk::genitor_row;
use super::{ForestError, ForestStore, require_node};
use arbor_core::config::DeleteMode;
use arbor_core::model::ROOT_DEPTH;
use rusqlite::params;

impl ForestStore {
    /// Splice out exactly one node: its descendants become children of its
    /// former parent, with depths pulled up by the node's own offset from
    /// that parent. The removed row keeps its depth; it is deleted or
    /// flagged per the configured mode, not renumbered.
    pub fn remove(&mut self, id: i64) -> Result<usize, ForestError> {
        let config = &self.config;
        let tx = self.conn.transaction()?;

        let node = require_node(&tx, config, id)?;

        let offset_depth = if node.depth == ROOT_DEPTH {
            1
        } else {
            let parent = genitor_row(&tx, config, &node)?
                .ok_or(ForestError::InvalidInput("ancestor chain is broken"))?;
            node.depth - parent.depth
        };

        let boundary = boundary_queue(&tx, config, &node)?;
        let scope = bounded_subtree_scope(config, &node, boundary, true);

        let table = &config.table;
        let depth = &config.depth_field;
        let queue = &config.queue_field;
        let depth_set =
            format!("{depth} = CASE WHEN {queue} = ? THEN {depth} ELSE {depth} - ? END");
        let mut set_params = vec![node.queue, offset_depth];

        let changed = match &config.delete_mode {
            DeleteMode::Flag {
                field,
                delete_value,
                ..
            } => {
                let sets = format!(
                    "{depth_set}, {field} = CASE WHEN {queue} = ? THEN ? ELSE {field} END"
                );
                set_params.extend([node.queue, *delete_value]);
                tx.execute(
                    &format!(
                        "UPDATE {table} SET {sets} WHERE {conditions}",
                        conditions = scope.where_sql(),
                    ),
                    rusqlite::params_from_iter(set_params.iter().chain(scope.params().iter())),
                )?
            }
            DeleteMode::GroveSign => {
                let Some(grove_field) = &config.grove_field else {
                    return Err(ForestError::InvalidInput("grove field is not configured"));
                };
                let sets = format!(
                    "{depth_set}, {grove_field} = {grove_field} * CASE WHEN {queue} = ? THEN -1 ELSE 1 END"
                );
                set_params.push(node.queue);
                tx.execute(
                    &format!(
                        "UPDATE {table} SET {sets} WHERE {conditions}",
                        conditions = scope.where_sql(),
                    ),
                    rusqlite::params_from_iter(set_params.iter().chain(scope.params().iter())),
                )?
            }
            DeleteMode::Hard => {
                let changed = tx.execute(
                    &format!(
                        "UPDATE {table} SET {depth_set} WHERE {conditions}",
                        conditions = scope.where_sql(),
                    ),
                    rusqlite::params_from_iter(set_params.iter().chain(scope.params().iter())),
                )?;
                tx.execute(
                    &format!("DELETE FROM {table} WHERE {} = ?1", config.id_field),
                    params![node.id],
                )?;
                changed
            }
        };

        tx.commit()?;
        Ok(changed)
    }

    /// Delete a whole subtree range in one statement; no depth renumbering
    /// is needed since the range disappears together.
    pub fn prune(&mut self, id: i64, with_top: bool) -> Result<usize, ForestError> {
        let config = &self.config;
        let tx = self.conn.transaction()?;

        let node = require_node(&tx, config, id)?;
        let boundary = boundary_queue(&tx, config, &node)?;
        let scope = bounded_subtree_scope(config, &node, boundary, with_top);

        let table = &config.table;
        let changed = match &config.delete_mode {
            DeleteMode::Flag {
                field,
                delete_value,
                ..
            } => tx.execute(
                &format!(
                    "UPDATE {table} SET {field} = ? WHERE {conditions}",
                    conditions = scope.where_sql(),
                ),
                rusqlite::params_from_iter(
                    [*delete_value].iter().chain(scope.params().iter()),
                ),
            )?,
            DeleteMode::GroveSign => {
                let Some(grove_field) = &config.grove_field else {
                    return Err(ForestError::InvalidInput("grove field is not configured"));
                };
                tx.execute(
                    &format!(
                        "UPDATE {table} SET {grove_field} = {grove_field} * -1 WHERE {conditions}",
                        conditions = scope.where_sql(),
                    ),
                    rusqlite::params_from_iter(scope.params().iter()),
                )?
            }
            DeleteMode::Hard => tx.execute(
                &format!(
                    "DELETE FROM {table} WHERE {conditions}",
                    conditions = scope.where_sql(),
                ),
                rusqlite::params_from_iter(scope.params().iter()),
            )?,
        };

        tx.commit()?;
        Ok(changed)
    }

    /// Remove the node and all of its descendants.
    pub fn extinguish(&mut self, id: i64) -> Result<usize, ForestError> {
        self.prune(id, true)
    }

    /// Remove the descendants and keep the node as a leaf.
    pub fn pollard(&mut self, id: i64) -> Result<usize, ForestError> {
        self.prune(id, false)
    }
}
