#![forbid(unsafe_code)]

use super::boundary::{last_queue, last_queue_or, previous_queue, wedge_node};
use super::evenize::evenize;
use super::scope::Scope;
use super::{ForestError, ForestStore, NodeRow, require_grove, require_node, select_first};
use arbor_core::config::ForestConfig;
use arbor_core::kinship::Kinship;
use arbor_core::model::ROOT_DEPTH;
use rusqlite::Connection;

/// A node to be planted. Depth and queue are always computed here; the
/// caller only chooses where the node goes and what it carries.
#[derive(Clone, Debug)]
pub struct SproutRequest {
    /// Required when the store has a grove column, absent otherwise.
    pub grove: Option<i64>,
    /// Base node for placement; `None` plants a new grove root.
    pub base: Option<i64>,
    pub kinship: Kinship,
    pub payload: serde_json::Value,
}

struct Placement {
    depth: i64,
    queue: i64,
}

impl ForestStore {
    pub fn sprout(&mut self, request: SproutRequest) -> Result<NodeRow, ForestError> {
        let config = &self.config;
        let grove = require_grove(config, request.grove)?;

        let tx = self.conn.transaction()?;

        let placement = match request.base {
            None => root_placement(&tx, config, grove)?,
            Some(base_id) => internal_placement(&tx, config, grove, base_id, request.kinship)?,
        };

        let id = insert_node(&tx, config, grove, &placement, &request.payload)?;
        let row = require_node(&tx, config, id)?;
        tx.commit()?;
        Ok(row)
    }
}

fn root_placement(
    conn: &Connection,
    config: &ForestConfig,
    grove: Option<i64>,
) -> Result<Placement, ForestError> {
    let queue = match last_queue(conn, config, grove)? {
        None => 0,
        Some(last) if last >= config.max_queue => {
            // grove already ends at the ceiling; respace everything
            match evenize(conn, config, grove, None, None, 1, false)? {
                Some(outcome) => outcome.vacant_queue,
                None => return Err(ForestError::QueueExhausted),
            }
        }
        Some(last) if config.max_queue - last < config.queue_interval => config.max_queue,
        Some(last) => last + config.queue_interval,
    };

    Ok(Placement {
        depth: ROOT_DEPTH,
        queue,
    })
}

fn internal_placement(
    conn: &Connection,
    config: &ForestConfig,
    grove: Option<i64>,
    base_id: i64,
    kinship: Kinship,
) -> Result<Placement, ForestError> {
    // the base must live in the requested grove
    let mut base_scope = Scope::new(config, grove);
    base_scope.push(format!("{} = ?", config.id_field), [base_id]);
    let base =
        select_first(conn, config, &base_scope, "")?.ok_or(ForestError::UnknownNode)?;

    let depth = base.depth + kinship.depth_step();
    let wedge = wedge_node(conn, config, &base, kinship)?;

    match &wedge {
        Some(wedge) => {
            // median of the gap before the wedge, if at least two wide
            let previous = previous_queue(conn, config, wedge)?;
            if wedge.queue - previous > 1 {
                return Ok(Placement {
                    depth,
                    queue: (previous + wedge.queue) / 2,
                });
            }
        }
        None => {
            // no wedge means the slot is the end of the grove
            let last = last_queue_or(conn, config, grove, 0)?;
            if last < config.max_queue {
                let queue = if config.queue_interval <= config.max_queue - last {
                    last + config.queue_interval
                } else {
                    config.max_queue
                };
                return Ok(Placement { depth, queue });
            }
        }
    }

    let wedge_queue = wedge.map(|node| node.queue);
    let queue = evenize_for_append(conn, config, grove, base.queue, wedge_queue)?;
    Ok(Placement { depth, queue })
}

/// Widening fallbacks once no gap is left at the target slot: respace
/// between base and wedge, then everything before the wedge, then
/// everything after it (rear justified, so the vacated slot stays put).
/// Each attempt counts only if it actually rewrote rows.
fn evenize_for_append(
    conn: &Connection,
    config: &ForestConfig,
    grove: Option<i64>,
    base_queue: i64,
    wedge_queue: Option<i64>,
) -> Result<i64, ForestError> {
    if let Some(outcome) = evenize(conn, config, grove, Some(base_queue), wedge_queue, 1, false)? {
        if outcome.rewritten > 0 {
            return Ok(outcome.vacant_queue);
        }
    }

    if let Some(outcome) = evenize(conn, config, grove, None, wedge_queue, 1, false)? {
        if outcome.rewritten > 0 {
            return Ok(outcome.vacant_queue);
        }
    }

    if let Some(outcome) = evenize(conn, config, grove, wedge_queue, None, 1, true)? {
        if outcome.rewritten > 0 {
            return Ok(outcome.vacant_queue);
        }
    }

    Err(ForestError::QueueExhausted)
}

fn insert_node(
    conn: &Connection,
    config: &ForestConfig,
    grove: Option<i64>,
    placement: &Placement,
    payload: &serde_json::Value,
) -> Result<i64, ForestError> {
    let mut columns = Vec::new();
    let mut values: Vec<rusqlite::types::Value> = Vec::new();

    if let (Some(value), Some(field)) = (grove, &config.grove_field) {
        columns.push(field.to_string());
        values.push(value.into());
    }
    columns.push(config.depth_field.to_string());
    values.push(placement.depth.into());
    columns.push(config.queue_field.to_string());
    values.push(placement.queue.into());
    columns.push(config.payload_field.to_string());
    values.push(match payload {
        serde_json::Value::Null => rusqlite::types::Value::Null,
        value => rusqlite::types::Value::Text(value.to_string()),
    });

    let placeholders = (1..=columns.len())
        .map(|index| format!("?{index}"))
        .collect::<Vec<_>>()
        .join(", ");
    conn.execute(
        &format!(
            "INSERT INTO {table}({columns}) VALUES ({placeholders})",
            table = config.table,
            columns = columns.join(", "),
        ),
        rusqlite::params_from_iter(values),
    )?;
    Ok(conn.last_insert_rowid())
}
