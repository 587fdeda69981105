#![forbid(unsafe_code)]

mod boundary;
mod error;
mod evenize;
mod features;
mod graft;
mod groves;
mod permute;
mod remove;
mod scope;
mod siblings;
mod sprout;
mod states;
mod subtree;
mod trunk;

pub use error::ForestError;
pub use groves::GroveInfo;
pub use sprout::SproutRequest;

use arbor_core::config::ForestConfig;
use arbor_core::model::Node;
use rusqlite::{Connection, OptionalExtension, params};
use scope::{Scope, select_list};
use std::path::{Path, PathBuf};
use std::time::Duration;

const SCHEMA_VERSION: i64 = 1;

/// One stored tree element. `grove` is `None` when the store is configured
/// without a grove column (single implicit grove).
#[derive(Clone, Debug, PartialEq)]
pub struct NodeRow {
    pub id: i64,
    pub grove: Option<i64>,
    pub depth: i64,
    pub queue: i64,
    pub payload: serde_json::Value,
}

impl NodeRow {
    pub fn head(&self) -> Node {
        Node {
            id: self.id,
            grove: self.grove,
            depth: self.depth,
            queue: self.queue,
        }
    }
}

#[derive(Debug)]
pub struct ForestStore {
    conn: Connection,
    config: ForestConfig,
    storage_dir: PathBuf,
}

impl ForestStore {
    pub fn open(
        storage_dir: impl AsRef<Path>,
        config: ForestConfig,
    ) -> Result<Self, ForestError> {
        config.validate()?;

        let storage_dir = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&storage_dir)?;

        let db_path = storage_dir.join("arbor.db");
        let conn = Connection::open(db_path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        preflight_gate(&conn)?;
        install_schema(&conn, &config)?;

        Ok(Self {
            conn,
            config,
            storage_dir,
        })
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    /// Fetch one visible node by id.
    pub fn node(&self, id: i64) -> Result<Option<NodeRow>, ForestError> {
        resolve_node(&self.conn, &self.config, id)
    }
}

fn preflight_gate(conn: &Connection) -> Result<(), ForestError> {
    let has_meta = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='meta'",
            [],
            |row| row.get::<_, i64>(0),
        )
        .optional()?
        .is_some();
    if !has_meta {
        return Ok(());
    }

    let version = conn
        .query_row(
            "SELECT value FROM meta WHERE key='schema_version'",
            [],
            |row| row.get::<_, String>(0),
        )
        .optional()?;

    match version {
        None => Ok(()),
        Some(value) if value.parse::<i64>() == Ok(SCHEMA_VERSION) => Ok(()),
        Some(_) => Err(ForestError::InvalidInput(
            "RESET_REQUIRED: schema version mismatch",
        )),
    }
}

fn install_schema(conn: &Connection, config: &ForestConfig) -> Result<(), ForestError> {
    let table = &config.table;
    let queue = &config.queue_field;
    let depth = &config.depth_field;

    let mut columns = vec![format!(
        "{} INTEGER PRIMARY KEY AUTOINCREMENT",
        config.id_field
    )];
    if let Some(grove) = &config.grove_field {
        columns.push(format!("{grove} INTEGER NOT NULL"));
    }
    columns.push(format!("{depth} INTEGER NOT NULL"));
    columns.push(format!("{queue} INTEGER NOT NULL"));
    if let Some((flag, enable_value, _)) = config.flag() {
        columns.push(format!("{flag} INTEGER NOT NULL DEFAULT {enable_value}"));
    }
    columns.push(format!("{} TEXT", config.payload_field));

    // Index prefixes mirror the ordering keys of the scope builder.
    let mut prefix = String::new();
    if let Some((flag, _, _)) = config.flag() {
        prefix.push_str(&format!("{flag}, "));
    }
    if let Some(grove) = &config.grove_field {
        prefix.push_str(&format!("{grove}, "));
    }

    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS meta (
           key TEXT PRIMARY KEY,
           value TEXT NOT NULL
         );

         CREATE TABLE IF NOT EXISTS {table} ({columns});

         CREATE INDEX IF NOT EXISTS idx_{table}_queue ON {table}({prefix}{queue});
         CREATE INDEX IF NOT EXISTS idx_{table}_depth ON {table}({prefix}{depth}, {queue});",
        columns = columns.join(", "),
    ))?;

    conn.execute(
        "INSERT OR IGNORE INTO meta(key, value) VALUES ('schema_version', ?1)",
        params![SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

fn read_node_row(row: &rusqlite::Row<'_>, has_grove: bool) -> Result<NodeRow, ForestError> {
    let id: i64 = row.get(0)?;
    let mut index = 1;
    let grove = if has_grove {
        let value: i64 = row.get(index)?;
        index += 1;
        Some(value)
    } else {
        None
    };
    let depth: i64 = row.get(index)?;
    let queue: i64 = row.get(index + 1)?;
    let payload: Option<String> = row.get(index + 2)?;
    let payload = match payload {
        Some(text) => serde_json::from_str(&text)?,
        None => serde_json::Value::Null,
    };
    Ok(NodeRow {
        id,
        grove,
        depth,
        queue,
        payload,
    })
}

pub(crate) fn select_rows(
    conn: &Connection,
    config: &ForestConfig,
    scope: &Scope,
    order: &str,
    limit: Option<i64>,
) -> Result<Vec<NodeRow>, ForestError> {
    let mut sql = format!(
        "SELECT {list} FROM {table} WHERE {conditions}",
        list = select_list(config),
        table = config.table,
        conditions = scope.where_sql(),
    );
    if !order.is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(order);
    }
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }

    let has_grove = config.has_grove();
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(rusqlite::params_from_iter(scope.params().iter()))?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(read_node_row(row, has_grove)?);
    }
    Ok(out)
}

pub(crate) fn select_first(
    conn: &Connection,
    config: &ForestConfig,
    scope: &Scope,
    order: &str,
) -> Result<Option<NodeRow>, ForestError> {
    Ok(select_rows(conn, config, scope, order, Some(1))?.pop())
}

pub(crate) fn count_rows(
    conn: &Connection,
    config: &ForestConfig,
    scope: &Scope,
) -> Result<i64, ForestError> {
    Ok(conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM {table} WHERE {conditions}",
            table = config.table,
            conditions = scope.where_sql(),
        ),
        rusqlite::params_from_iter(scope.params().iter()),
        |row| row.get(0),
    )?)
}

/// Fetch a node by id under the visibility scope, without a grove filter.
pub(crate) fn resolve_node(
    conn: &Connection,
    config: &ForestConfig,
    id: i64,
) -> Result<Option<NodeRow>, ForestError> {
    let mut scope = Scope::new(config, None);
    scope.push(format!("{} = ?", config.id_field), [id]);
    select_first(conn, config, &scope, "")
}

pub(crate) fn require_node(
    conn: &Connection,
    config: &ForestConfig,
    id: i64,
) -> Result<NodeRow, ForestError> {
    resolve_node(conn, config, id)?.ok_or(ForestError::UnknownNode)
}

/// Check a caller-supplied grove against the configuration: required and
/// nonzero when the grove column exists, absent otherwise.
pub(crate) fn require_grove(
    config: &ForestConfig,
    grove: Option<i64>,
) -> Result<Option<i64>, ForestError> {
    if config.has_grove() {
        match grove {
            Some(value) if value != 0 => Ok(Some(value)),
            _ => Err(ForestError::MissingGrove),
        }
    } else if grove.is_some() {
        Err(ForestError::InvalidInput("grove field is not configured"))
    } else {
        Ok(None)
    }
}
