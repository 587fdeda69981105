#![forbid(unsafe_code)]

#[derive(Debug)]
pub enum ForestError {
    Io(std::io::Error),
    Sql(rusqlite::Error),
    Json(serde_json::Error),
    Config(arbor_core::config::ConfigError),
    InvalidInput(&'static str),
    UnknownNode,
    MissingGrove,
    DifferentGroves,
    GraftIntoOwnSubtree,
    NotSiblings,
    QueueExhausted,
}

impl std::fmt::Display for ForestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io: {err}"),
            Self::Sql(err) => write!(f, "sqlite: {err}"),
            Self::Json(err) => write!(f, "payload json: {err}"),
            Self::Config(err) => write!(f, "config: {err}"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::UnknownNode => write!(f, "unknown node"),
            Self::MissingGrove => write!(f, "grove is required"),
            Self::DifferentGroves => write!(f, "nodes belong to different groves"),
            Self::GraftIntoOwnSubtree => write!(f, "graft target lies inside the moved subtree"),
            Self::NotSiblings => write!(f, "nodes are not mutual siblings"),
            Self::QueueExhausted => write!(f, "no queue space left in range"),
        }
    }
}

impl std::error::Error for ForestError {}

impl From<std::io::Error> for ForestError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<rusqlite::Error> for ForestError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql(value)
    }
}

impl From<serde_json::Error> for ForestError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<arbor_core::config::ConfigError> for ForestError {
    fn from(value: arbor_core::config::ConfigError) -> Self {
        Self::Config(value)
    }
}
