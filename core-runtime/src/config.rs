//! # Core Configuration Module
//!
//! Provides configuration management for the ordering core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! holding everything the service needs at startup: where the database lives,
//! how to log, and how the ordering engine behaves. `build()` validates
//! eagerly so a bad setting fails at startup rather than on the first request.
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/path/to/library.db")
//!     .build()
//!     .expect("Failed to build config");
//! ```
//!
//! ## Environment
//!
//! [`CoreConfig::from_env`] reads:
//!
//! | Variable | Meaning |
//! |---|---|
//! | `ORDERING_DATABASE_PATH` | SQLite file; unset means an in-memory database |
//! | `ORDERING_LOG_LEVEL` | `trace`, `debug`, `info`, `warn` or `error` |
//! | `ORDERING_LOG_FORMAT` | `pretty`, `json` or `compact` |
//! | `ORDERING_COMPACT_ON_REMOVE` | `true` / `false` |
//! | `ORDERING_FOREIGN_IDS` | `drop` or `reject` |

use crate::error::{Error, Result};
use crate::logging::{LogFormat, LogLevel, LoggingConfig};
use core_ordering::{ForeignIdPolicy, OrderingConfig};
use std::path::PathBuf;

pub const ENV_DATABASE_PATH: &str = "ORDERING_DATABASE_PATH";
pub const ENV_LOG_LEVEL: &str = "ORDERING_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "ORDERING_LOG_FORMAT";
pub const ENV_COMPACT_ON_REMOVE: &str = "ORDERING_COMPACT_ON_REMOVE";
pub const ENV_FOREIGN_IDS: &str = "ORDERING_FOREIGN_IDS";

/// Where the ordered collections are stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    /// SQLite database file
    File(PathBuf),
    /// Private in-memory database, gone when the service stops
    InMemory,
}

/// Core configuration for the ordering service.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    /// Storage location
    pub database: DatabaseLocation,

    /// Logging setup applied by `bootstrap`
    pub logging: LoggingConfig,

    /// Ordering engine behaviour
    pub ordering: OrderingConfig,
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Builds a configuration from `ORDERING_*` environment variables.
    ///
    /// Unset variables keep their defaults; a set but unparseable one is an
    /// error.
    pub fn from_env() -> Result<CoreConfig> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<CoreConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = CoreConfig::builder();

        match lookup(ENV_DATABASE_PATH).filter(|value| !value.trim().is_empty()) {
            Some(path) => builder = builder.database_path(path),
            None => builder = builder.in_memory(),
        }

        let mut logging = LoggingConfig::default();
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            logging = logging.with_level(level.parse::<LogLevel>()?);
        }
        if let Some(format) = lookup(ENV_LOG_FORMAT) {
            logging = logging.with_format(format.parse::<LogFormat>()?);
        }
        builder = builder.logging(logging);

        let mut ordering = OrderingConfig::default();
        if let Some(value) = lookup(ENV_COMPACT_ON_REMOVE) {
            ordering = ordering.with_compact_on_remove(parse_bool(ENV_COMPACT_ON_REMOVE, &value)?);
        }
        if let Some(value) = lookup(ENV_FOREIGN_IDS) {
            let policy = value
                .parse::<ForeignIdPolicy>()
                .map_err(|e| Error::Config(format!("{}: {}", ENV_FOREIGN_IDS, e)))?;
            ordering = ordering.with_foreign_id_policy(policy);
        }
        builder = builder.ordering(ordering);

        builder.build()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Database path is not empty
    /// - Ordering settings are in range
    pub fn validate(&self) -> Result<()> {
        if let DatabaseLocation::File(path) = &self.database {
            if path.as_os_str().is_empty() {
                return Err(Error::Config("Database path cannot be empty".to_string()));
            }
        }

        self.ordering
            .validate()
            .map_err(|e| Error::Config(format!("Invalid ordering settings: {}", e)))?;

        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Config(format!(
            "{} must be true or false, got '{}'",
            key, other
        ))),
    }
}

/// Builder for [`CoreConfig`]
#[derive(Debug, Default)]
pub struct CoreConfigBuilder {
    database: Option<DatabaseLocation>,
    logging: Option<LoggingConfig>,
    ordering: Option<OrderingConfig>,
}

impl CoreConfigBuilder {
    /// Sets the database path.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    ///
    /// let builder = CoreConfig::builder()
    ///     .database_path("/path/to/library.db");
    /// ```
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database = Some(DatabaseLocation::File(path.into()));
        self
    }

    /// Uses a private in-memory database (tests, demos).
    pub fn in_memory(mut self) -> Self {
        self.database = Some(DatabaseLocation::InMemory);
        self
    }

    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    pub fn ordering(mut self, ordering: OrderingConfig) -> Self {
        self.ordering = Some(ordering);
        self
    }

    /// Builds the `CoreConfig`, validating all settings.
    ///
    /// # Errors
    ///
    /// Returns an error if no database location was chosen or any setting is
    /// out of range.
    pub fn build(self) -> Result<CoreConfig> {
        let database = self.database.ok_or_else(|| {
            Error::Config(
                "Database location is required. Use .database_path() or .in_memory() to set it."
                    .to_string(),
            )
        })?;

        let config = CoreConfig {
            database,
            logging: self.logging.unwrap_or_default(),
            ordering: self.ordering.unwrap_or_default(),
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_builder_requires_database_location() {
        let result = CoreConfig::builder().build();
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("Database location")));
    }

    #[test]
    fn test_builder_with_defaults() {
        let config = CoreConfig::builder()
            .database_path("/tmp/library.db")
            .build()
            .unwrap();

        assert_eq!(
            config.database,
            DatabaseLocation::File(PathBuf::from("/tmp/library.db"))
        );
        assert_eq!(config.logging, LoggingConfig::default());
        assert_eq!(config.ordering, OrderingConfig::default());
    }

    #[test]
    fn test_builder_rejects_empty_path() {
        let result = CoreConfig::builder().database_path("").build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_builder_rejects_invalid_ordering_settings() {
        let result = CoreConfig::builder()
            .in_memory()
            .ordering(OrderingConfig::default().with_shift_offset(0))
            .build();
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("shift_offset")));
    }

    #[test]
    fn test_from_env_defaults_to_in_memory() {
        let config = CoreConfig::from_lookup(env(&[])).unwrap();
        assert_eq!(config.database, DatabaseLocation::InMemory);
        assert!(config.ordering.compact_on_remove);
        assert_eq!(config.ordering.foreign_id_policy, ForeignIdPolicy::Drop);
    }

    #[test]
    fn test_from_env_reads_every_setting() {
        let config = CoreConfig::from_lookup(env(&[
            (ENV_DATABASE_PATH, "/data/library.db"),
            (ENV_LOG_LEVEL, "debug"),
            (ENV_LOG_FORMAT, "json"),
            (ENV_COMPACT_ON_REMOVE, "off"),
            (ENV_FOREIGN_IDS, "reject"),
        ]))
        .unwrap();

        assert_eq!(
            config.database,
            DatabaseLocation::File(PathBuf::from("/data/library.db"))
        );
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(!config.ordering.compact_on_remove);
        assert_eq!(config.ordering.foreign_id_policy, ForeignIdPolicy::Reject);
    }

    #[test]
    fn test_from_env_rejects_bad_values() {
        assert!(CoreConfig::from_lookup(env(&[(ENV_LOG_LEVEL, "chatty")])).is_err());
        assert!(CoreConfig::from_lookup(env(&[(ENV_COMPACT_ON_REMOVE, "maybe")])).is_err());
        assert!(CoreConfig::from_lookup(env(&[(ENV_FOREIGN_IDS, "ignore")])).is_err());
    }

    #[test]
    fn test_config_is_cloneable() {
        let config = CoreConfig::builder().in_memory().build().unwrap();
        assert_eq!(config.clone(), config);
    }
}
