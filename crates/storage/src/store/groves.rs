#![forbid(unsafe_code)]

use super::scope::{Scope, order_scope};
use super::{ForestError, ForestStore, NodeRow, select_rows};
use arbor_core::model::ROOT_DEPTH;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroveInfo {
    pub grove: i64,
    pub nodes: i64,
}

impl ForestStore {
    /// Every visible node, optionally restricted to one grove, in traversal
    /// order.
    pub fn grove_nodes(&self, grove: Option<i64>) -> Result<Vec<NodeRow>, ForestError> {
        if grove.is_some() && !self.config.has_grove() {
            return Err(ForestError::InvalidInput("grove field is not configured"));
        }
        let scope = Scope::new(&self.config, grove);
        select_rows(
            &self.conn,
            &self.config,
            &scope,
            &order_scope(&self.config, false, false),
            None,
        )
    }

    /// Root nodes, optionally restricted to one grove.
    pub fn roots(&self, grove: Option<i64>) -> Result<Vec<NodeRow>, ForestError> {
        if grove.is_some() && !self.config.has_grove() {
            return Err(ForestError::InvalidInput("grove field is not configured"));
        }
        let mut scope = Scope::new(&self.config, grove);
        scope.push(format!("{} = ?", self.config.depth_field), [ROOT_DEPTH]);
        select_rows(
            &self.conn,
            &self.config,
            &scope,
            &order_scope(&self.config, false, false),
            None,
        )
    }

    /// Visible groves with their node counts.
    pub fn groves(&self) -> Result<Vec<GroveInfo>, ForestError> {
        let Some(grove_field) = &self.config.grove_field else {
            return Err(ForestError::InvalidInput("grove field is not configured"));
        };

        let scope = Scope::new(&self.config, None);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {grove_field}, COUNT(*) FROM {table} WHERE {conditions} \
             GROUP BY {grove_field} ORDER BY {grove_field} ASC",
            table = self.config.table,
            conditions = scope.where_sql(),
        ))?;
        let mut rows = stmt.query(rusqlite::params_from_iter(scope.params().iter()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(GroveInfo {
                grove: row.get(0)?,
                nodes: row.get(1)?,
            });
        }
        Ok(out)
    }
}
