#![forbid(unsafe_code)]

use arbor_core::config::ForestConfig;

/// Accumulates WHERE clauses and their bound values in matching order.
/// Column and table names come from validated [`ForestConfig`] identifiers;
/// every runtime value stays a bound parameter.
#[derive(Clone, Debug)]
pub(crate) struct Scope {
    clauses: Vec<String>,
    params: Vec<i64>,
}

impl Scope {
    pub fn bare() -> Self {
        Self {
            clauses: Vec::new(),
            params: Vec::new(),
        }
    }

    /// Visibility predicate plus an optional explicit grove filter.
    ///
    /// With grove-sign deletion and no explicit grove, only positive groves
    /// are visible; an explicit (possibly negative) grove overrides that,
    /// which is the recovery path for grove-deleted rows.
    pub fn new(config: &ForestConfig, grove: Option<i64>) -> Self {
        let mut scope = Self::bare();
        if let Some((flag, enable_value, _)) = config.flag() {
            scope.push(format!("{flag} = ?"), [enable_value]);
        }
        if let Some(grove_field) = &config.grove_field {
            match grove {
                Some(value) => scope.push(format!("{grove_field} = ?"), [value]),
                None if config.grove_delete_enabled() => {
                    scope.push(format!("{grove_field} > 0"), []);
                }
                None => {}
            }
        }
        scope
    }

    pub fn push(&mut self, clause: impl Into<String>, params: impl IntoIterator<Item = i64>) {
        self.clauses.push(clause.into());
        self.params.extend(params);
    }

    pub fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            "1 = 1".to_string()
        } else {
            self.clauses.join(" AND ")
        }
    }

    pub fn params(&self) -> &[i64] {
        &self.params
    }

    /// Clause text and parameters for embedding as a subquery body.
    pub fn into_parts(self) -> (String, Vec<i64>) {
        let sql = self.where_sql();
        (sql, self.params)
    }
}

/// Ordering key aligned with the secondary indexes:
/// `(visibility, grove, queue)` or `(visibility, grove, depth, queue)`.
pub(crate) fn order_scope(config: &ForestConfig, descending: bool, depth_index: bool) -> String {
    let direction = if descending { "DESC" } else { "ASC" };
    let mut keys = Vec::new();
    if let Some((flag, _, _)) = config.flag() {
        keys.push(format!("{flag} {direction}"));
    }
    if let Some(grove) = &config.grove_field {
        keys.push(format!("{grove} {direction}"));
    }
    if depth_index {
        keys.push(format!("{} {direction}", config.depth_field));
    }
    keys.push(format!("{} {direction}", config.queue_field));
    keys.join(", ")
}

pub(crate) fn select_list(config: &ForestConfig) -> String {
    match &config.grove_field {
        Some(grove) => format!(
            "{}, {grove}, {}, {}, {}",
            config.id_field, config.depth_field, config.queue_field, config.payload_field
        ),
        None => format!(
            "{}, {}, {}, {}",
            config.id_field, config.depth_field, config.queue_field, config.payload_field
        ),
    }
}
