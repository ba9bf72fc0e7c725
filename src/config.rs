//! Configuration
//!
//! Read from TOML. Every key is optional:
//!
//! ```toml
//! database_url = "sqlite://app.db"
//! max_connections = 5
//! read_only = false
//! default_limit = 100
//! max_bind_params = 999
//! fallback_row_limit = 50000
//!
//! [tables.audit_log]
//! read_only = true
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{RqlError, RqlResult};
use crate::transpiler::DEFAULT_MAX_BIND_PARAMS;

/// Main configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database connection URL
    pub database_url: Option<String>,

    /// Pool size
    pub max_connections: u32,

    /// Reject every write
    pub read_only: bool,

    /// Limit applied to reads that carry none
    pub default_limit: Option<u64>,

    /// Most placeholders one statement may bind
    pub max_bind_params: usize,

    /// Refuse in-memory filtering of tables larger than this
    pub fallback_row_limit: Option<u64>,

    /// Per-table overrides
    pub tables: HashMap<String, TableConfig>,
}

/// Per-table settings
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    pub read_only: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: 5,
            read_only: false,
            default_limit: None,
            max_bind_params: DEFAULT_MAX_BIND_PARAMS,
            fallback_row_limit: None,
            tables: HashMap::new(),
        }
    }
}

impl Config {
    /// Create a new configuration builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(text: &str) -> RqlResult<Self> {
        toml::from_str(text).map_err(|e| RqlError::Config(e.to_string()))
    }

    /// Load from `path`, or from the default location if it exists.
    ///
    /// A missing default file yields the defaults; a missing explicit file
    /// is an error.
    pub fn load(path: Option<&Path>) -> RqlResult<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) if p.exists() => p,
                _ => return Ok(Self::default()),
            },
        };
        tracing::debug!("Loading config from {}", path.display());
        let text = std::fs::read_to_string(&path)?;
        Self::from_toml(&text)
    }

    /// `<config dir>/rqlx/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("rqlx").join("config.toml"))
    }

    /// Whether writes to `table` are refused.
    pub fn is_read_only(&self, table: &str) -> bool {
        self.read_only || self.tables.get(table).is_some_and(|t| t.read_only)
    }
}

/// Builder for Config
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the database URL
    pub fn database(mut self, url: impl Into<String>) -> Self {
        self.config.database_url = Some(url.into());
        self
    }

    /// Set the pool size
    pub fn max_connections(mut self, n: u32) -> Self {
        self.config.max_connections = n;
        self
    }

    /// Refuse all writes
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.config.read_only = read_only;
        self
    }

    /// Refuse writes to one table
    pub fn read_only_table(mut self, table: impl Into<String>) -> Self {
        self.config
            .tables
            .entry(table.into())
            .or_default()
            .read_only = true;
        self
    }

    pub fn default_limit(mut self, limit: u64) -> Self {
        self.config.default_limit = Some(limit);
        self
    }

    pub fn max_bind_params(mut self, n: usize) -> Self {
        self.config.max_bind_params = n;
        self
    }

    pub fn fallback_row_limit(mut self, rows: u64) -> Self {
        self.config.fallback_row_limit = Some(rows);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Config {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.max_bind_params, 999);
    }

    #[test]
    fn test_from_toml() {
        let config = Config::from_toml(
            r#"
            database_url = "sqlite://app.db"
            default_limit = 100
            fallback_row_limit = 10000

            [tables.audit_log]
            read_only = true
            "#,
        )
        .unwrap();
        assert_eq!(config.database_url.as_deref(), Some("sqlite://app.db"));
        assert_eq!(config.default_limit, Some(100));
        assert_eq!(config.fallback_row_limit, Some(10000));
        assert!(config.is_read_only("audit_log"));
        assert!(!config.is_read_only("users"));
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(
            Config::from_toml("max_connections = \"many\""),
            Err(RqlError::Config(_))
        ));
    }

    #[test]
    fn test_builder() {
        let config = Config::builder()
            .database("sqlite::memory:")
            .read_only_table("users")
            .default_limit(50)
            .build();
        assert!(config.is_read_only("users"));
        assert_eq!(config.default_limit, Some(50));

        assert!(Config::builder().read_only(true).build().is_read_only("anything"));
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = Config::load(Some(Path::new("/nonexistent/rqlx.toml"))).unwrap_err();
        assert!(matches!(err, RqlError::Io(_)));
    }
}
