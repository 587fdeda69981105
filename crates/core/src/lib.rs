#![forbid(unsafe_code)]

pub mod nest;

pub mod ids {
    /// SQL identifier supplied through configuration (table and column names).
    /// Validated once so every query builder can splice it verbatim.
    #[derive(Clone, Debug, PartialEq, Eq, Hash)]
    pub struct FieldName(String);

    impl FieldName {
        pub fn as_str(&self) -> &str {
            &self.0
        }

        pub fn try_new(value: impl Into<String>) -> Result<Self, FieldNameError> {
            let value = value.into();
            validate_field_name(&value)?;
            Ok(Self(value))
        }
    }

    impl std::fmt::Display for FieldName {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(&self.0)
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum FieldNameError {
        Empty,
        TooLong,
        InvalidFirstChar,
        InvalidChar { ch: char, index: usize },
    }

    fn validate_field_name(value: &str) -> Result<(), FieldNameError> {
        if value.is_empty() {
            return Err(FieldNameError::Empty);
        }
        if value.len() > 64 {
            return Err(FieldNameError::TooLong);
        }
        let mut chars = value.chars();
        let Some(first) = chars.next() else {
            return Err(FieldNameError::Empty);
        };
        if !(first.is_ascii_alphabetic() || first == '_') {
            return Err(FieldNameError::InvalidFirstChar);
        }
        for (index, ch) in value.chars().enumerate() {
            if index == 0 {
                continue;
            }
            if ch.is_ascii_alphanumeric() || ch == '_' {
                continue;
            }
            return Err(FieldNameError::InvalidChar { ch, index });
        }
        Ok(())
    }
}

pub mod model {
    /// Depth of every grove root.
    pub const ROOT_DEPTH: i64 = 0;

    /// Payload-free head of a stored node: everything the ordering scheme
    /// needs to derive hierarchy.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Node {
        pub id: i64,
        pub grove: Option<i64>,
        pub depth: i64,
        pub queue: i64,
    }
}

pub mod kinship {
    /// Placement of a new or moved node relative to a base node.
    ///
    /// `Child(n)` targets the nth child slot of the base; a negative n means
    /// "append as last child". `Sibling` inserts next to the base itself.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum Kinship {
        Child(i64),
        Sibling(SiblingSide),
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum SiblingSide {
        Elder,
        Younger,
    }

    impl Kinship {
        pub const LAST_CHILD: Kinship = Kinship::Child(-1);

        pub fn depth_step(&self) -> i64 {
            match self {
                Kinship::Child(_) => 1,
                Kinship::Sibling(_) => 0,
            }
        }
    }

    /// How far up the ancestor chain a trunk query reaches.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum AncestorScope {
        All,
        Within(i64),
        RootOnly,
    }
}

pub mod config {
    use crate::ids::FieldName;

    pub const QUEUE_DEFAULT_INTERVAL: i64 = 0x8000;
    pub const QUEUE_MAX_VALUE: i64 = 0x7fff_ffff;
    pub const SUBTREE_LIMIT_DEFAULT: i64 = 1000;

    /// Deletion strategy, fixed at store construction.
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum DeleteMode {
        /// Rows are deleted outright.
        Hard,
        /// A flag column toggles between the two configured values.
        Flag {
            field: FieldName,
            enable_value: i64,
            delete_value: i64,
        },
        /// The grove column is negated; visibility requires grove > 0.
        GroveSign,
    }

    #[derive(Clone, Debug)]
    pub struct ForestConfig {
        pub table: FieldName,
        pub id_field: FieldName,
        pub grove_field: Option<FieldName>,
        pub depth_field: FieldName,
        pub queue_field: FieldName,
        pub payload_field: FieldName,
        pub delete_mode: DeleteMode,
        pub queue_interval: i64,
        pub max_queue: i64,
        pub subtree_limit: i64,
    }

    impl Default for ForestConfig {
        fn default() -> Self {
            let field = |name: &str| FieldName::try_new(name).expect("default field name");
            Self {
                table: field("nodes"),
                id_field: field("id"),
                grove_field: Some(field("grove")),
                depth_field: field("depth"),
                queue_field: field("queue"),
                payload_field: field("payload"),
                delete_mode: DeleteMode::Hard,
                queue_interval: QUEUE_DEFAULT_INTERVAL,
                max_queue: QUEUE_MAX_VALUE,
                subtree_limit: SUBTREE_LIMIT_DEFAULT,
            }
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum ConfigError {
        GroveSignWithoutGrove,
        NonPositiveInterval,
        MaxQueueBelowInterval,
        NonPositiveSubtreeLimit,
        DuplicateField(String),
    }

    impl std::fmt::Display for ConfigError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Self::GroveSignWithoutGrove => {
                    write!(f, "grove-sign deletion requires a grove field")
                }
                Self::NonPositiveInterval => write!(f, "queue interval must be at least 1"),
                Self::MaxQueueBelowInterval => {
                    write!(f, "maximum queue must be at least the queue interval")
                }
                Self::NonPositiveSubtreeLimit => {
                    write!(f, "subtree row limit must be at least 1")
                }
                Self::DuplicateField(name) => write!(f, "duplicate field name: {name}"),
            }
        }
    }

    impl std::error::Error for ConfigError {}

    impl ForestConfig {
        pub fn has_grove(&self) -> bool {
            self.grove_field.is_some()
        }

        pub fn grove_delete_enabled(&self) -> bool {
            matches!(self.delete_mode, DeleteMode::GroveSign)
        }

        pub fn flag(&self) -> Option<(&FieldName, i64, i64)> {
            match &self.delete_mode {
                DeleteMode::Flag {
                    field,
                    enable_value,
                    delete_value,
                } => Some((field, *enable_value, *delete_value)),
                _ => None,
            }
        }

        pub fn validate(&self) -> Result<(), ConfigError> {
            if self.grove_delete_enabled() && !self.has_grove() {
                return Err(ConfigError::GroveSignWithoutGrove);
            }
            if self.queue_interval < 1 {
                return Err(ConfigError::NonPositiveInterval);
            }
            if self.max_queue < self.queue_interval {
                return Err(ConfigError::MaxQueueBelowInterval);
            }
            if self.subtree_limit < 1 {
                return Err(ConfigError::NonPositiveSubtreeLimit);
            }

            let mut seen = std::collections::BTreeSet::new();
            let mut fields = vec![
                &self.id_field,
                &self.depth_field,
                &self.queue_field,
                &self.payload_field,
            ];
            if let Some(grove) = &self.grove_field {
                fields.push(grove);
            }
            if let DeleteMode::Flag { field, .. } = &self.delete_mode {
                fields.push(field);
            }
            for field in fields {
                if !seen.insert(field.as_str()) {
                    return Err(ConfigError::DuplicateField(field.as_str().to_string()));
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::config::{ConfigError, DeleteMode, ForestConfig};
    use super::ids::{FieldName, FieldNameError};

    #[test]
    fn field_name_validation() {
        assert_eq!(FieldName::try_new("").unwrap_err(), FieldNameError::Empty);
        assert_eq!(
            FieldName::try_new("9queue").unwrap_err(),
            FieldNameError::InvalidFirstChar
        );
        assert_eq!(
            FieldName::try_new("bad name").unwrap_err(),
            FieldNameError::InvalidChar { ch: ' ', index: 3 }
        );
        assert_eq!(
            FieldName::try_new("a".repeat(65)).unwrap_err(),
            FieldNameError::TooLong
        );
        assert!(FieldName::try_new("ff_queue").is_ok());
        assert!(FieldName::try_new("_hidden").is_ok());
    }

    #[test]
    fn config_defaults_are_valid() {
        let config = ForestConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.queue_interval, 0x8000);
        assert_eq!(config.max_queue, 0x7fff_ffff);
    }

    #[test]
    fn config_rejects_grove_sign_without_grove() {
        let config = ForestConfig {
            grove_field: None,
            delete_mode: DeleteMode::GroveSign,
            ..ForestConfig::default()
        };
        assert_eq!(
            config.validate().unwrap_err(),
            ConfigError::GroveSignWithoutGrove
        );
    }

    #[test]
    fn config_rejects_colliding_fields() {
        let config = ForestConfig {
            delete_mode: DeleteMode::Flag {
                field: FieldName::try_new("queue").expect("field"),
                enable_value: 0,
                delete_value: 1,
            },
            ..ForestConfig::default()
        };
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigError::DuplicateField(_)
        ));
    }
}
