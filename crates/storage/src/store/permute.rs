#![forbid(unsafe_code)]

use super::boundary::{boundary_queue, last_queue_or};
use super::states::sibling_roster;
use super::{ForestError, ForestStore};
use std::collections::{BTreeMap, BTreeSet};

impl ForestStore {
    /// Reorder sibling nodes into the given sequence. Nodes not listed keep
    /// their slots; listed nodes take over the listed order within the
    /// slots they currently occupy. Each sibling moves with its whole
    /// subtree and trailing gap, so one conditional update over the
    /// affected queue range is enough. Returns the number of rows touched;
    /// zero means the order already matched.
    pub fn permute(&mut self, ids: &[i64]) -> Result<usize, ForestError> {
        if ids.is_empty() {
            return Err(ForestError::InvalidInput("no nodes to permute"));
        }
        if ids.len() == 1 {
            return Ok(0);
        }

        let config = &self.config;
        let tx = self.conn.transaction()?;

        let roster = sibling_roster(&tx, config, ids)?;

        let posted: BTreeSet<i64> = ids.iter().copied().collect();
        let mut replacements = ids.iter().copied();
        let mut new_order = Vec::with_capacity(roster.len());
        for node in &roster {
            if posted.contains(&node.id) {
                match replacements.next() {
                    Some(id) => new_order.push(id),
                    None => {
                        return Err(ForestError::InvalidInput(
                            "posted nodes exceed sibling count",
                        ));
                    }
                }
            } else {
                new_order.push(node.id);
            }
        }

        let Some(first) = roster.first() else {
            return Err(ForestError::NotSiblings);
        };
        let Some(last) = roster.last() else {
            return Err(ForestError::NotSiblings);
        };
        let grove = first.grove;
        let head_queue = first.queue;

        // the last sibling's width runs to the enclosing subtree's edge
        let total_tail = match boundary_queue(&tx, config, last)? {
            Some(boundary) => boundary - 1,
            None => last_queue_or(&tx, config, grove, 0)?,
        };

        // queue width of each sibling in current order: own subtree span
        // plus the trailing gap up to the next sibling
        let mut tails = Vec::with_capacity(roster.len());
        let mut widths: BTreeMap<i64, (i64, i64)> = BTreeMap::new();
        for (index, node) in roster.iter().enumerate() {
            let tail = if index + 1 < roster.len() {
                roster[index + 1].queue - 1
            } else {
                total_tail
            };
            tails.push(tail);
            widths.insert(node.id, (node.queue, tail - node.queue + 1));
        }

        // cumulative start queues for the requested order
        let mut offsets: BTreeMap<i64, i64> = BTreeMap::new();
        let mut reduce = head_queue;
        for id in &new_order {
            let Some(&(queue, width)) = widths.get(id) else {
                return Err(ForestError::NotSiblings);
            };
            offsets.insert(*id, reduce - queue);
            reduce += width;
        }

        if offsets.values().all(|offset| *offset == 0) {
            return Ok(0);
        }

        // one CASE arm per sibling, keyed on the current queue ranges
        let queue = &config.queue_field;
        let mut arms = Vec::with_capacity(roster.len());
        let mut case_params = Vec::new();
        for (index, node) in roster.iter().enumerate() {
            let offset = offsets.get(&node.id).copied().unwrap_or(0);
            if index + 1 < roster.len() {
                arms.push(format!("WHEN {queue} <= ? THEN ?"));
                case_params.extend([tails[index], offset]);
            } else {
                arms.push("ELSE ?".to_string());
                case_params.push(offset);
            }
        }

        let mut scope = super::scope::Scope::new(config, grove);
        scope.push(format!("{queue} >= ?"), [head_queue]);
        scope.push(format!("{queue} <= ?"), [total_tail]);

        let changed = tx.execute(
            &format!(
                "UPDATE {table} SET {queue} = {queue} + CASE {arms} END WHERE {conditions}",
                table = config.table,
                arms = arms.join(" "),
                conditions = scope.where_sql(),
            ),
            rusqlite::params_from_iter(case_params.iter().chain(scope.params().iter())),
        )?;

        tx.commit()?;
        Ok(changed)
    }

    /// Move a node to a rank among its current siblings; a negative rank
    /// means the end.
    pub fn move_to(&mut self, id: i64, rank: i64) -> Result<usize, ForestError> {
        self.move_node(id, rank, false)
    }

    /// Move a node by a signed distance among its current siblings,
    /// clamping at the head and saturating to the end.
    pub fn move_by(&mut self, id: i64, delta: i64) -> Result<usize, ForestError> {
        self.move_node(id, delta, true)
    }

    fn move_node(&mut self, id: i64, amount: i64, relative: bool) -> Result<usize, ForestError> {
        self.node(id)?.ok_or(ForestError::UnknownNode)?;
        let roster = self.siblings(id)?;
        if roster.is_empty() {
            return Err(ForestError::NotSiblings);
        }
        let Some(position) = roster.iter().position(|node| node.id == id) else {
            return Err(ForestError::NotSiblings);
        };

        let mut rank = if relative {
            if amount == 0 {
                return Err(ForestError::InvalidInput("zero move offset"));
            }
            let shifted = (position as i64 + amount).max(0);
            if shifted >= roster.len() as i64 {
                -1
            } else {
                shifted
            }
        } else {
            amount
        };

        if rank < 0 {
            rank = roster.len() as i64 - 1;
        }
        if rank >= roster.len() as i64 {
            return Err(ForestError::InvalidInput("rank is out of range"));
        }
        let rank = rank as usize;
        if roster[rank].id == id {
            return Err(ForestError::InvalidInput(
                "node already holds the requested rank",
            ));
        }

        let mut new_order: Vec<i64> = roster
            .iter()
            .map(|node| node.id)
            .filter(|node_id| *node_id != id)
            .collect();
        new_order.insert(rank, id);
        self.permute(&new_order)
    }
}
