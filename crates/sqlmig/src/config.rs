//! Configuration for migration sources and database pools

use std::path::PathBuf;

use crate::error::ConfigError;

/// Default directory migrations are read from
pub const DEFAULT_MIGRATIONS_DIR: &str = "migrations";

/// Default glob pattern selecting migration files
pub const DEFAULT_PATTERN: &str = "*.sql";

/// Where migrations come from: a root directory and a glob pattern relative to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationConfig {
    /// Directory where migration files are stored
    pub root: PathBuf,
    /// Glob pattern matched against paths relative to `root`
    pub pattern: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_MIGRATIONS_DIR),
            pattern: DEFAULT_PATTERN.to_string(),
        }
    }
}

impl MigrationConfig {
    pub fn new(root: impl Into<PathBuf>, pattern: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            pattern: pattern.into(),
        }
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    /// Reject configurations that can never match anything
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pattern.trim().is_empty() {
            return Err(ConfigError::EmptyPattern);
        }
        if self.root.as_os_str().is_empty() {
            return Err(ConfigError::EmptyRoot);
        }
        Ok(())
    }
}

/// Connection pool settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            acquire_timeout_seconds: 30,
        }
    }
}

impl PoolConfig {
    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn with_acquire_timeout(mut self, seconds: u64) -> Self {
        self.acquire_timeout_seconds = seconds;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_config_defaults() {
        let config = MigrationConfig::default();
        assert_eq!(config.root, PathBuf::from("migrations"));
        assert_eq!(config.pattern, "*.sql");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_migration_config_builder() {
        let config = MigrationConfig::default()
            .with_root("db/migrate")
            .with_pattern("**/*.up.sql");
        assert_eq!(config, MigrationConfig::new("db/migrate", "**/*.up.sql"));
    }

    #[test]
    fn test_migration_config_validation() {
        assert_eq!(
            MigrationConfig::default().with_pattern("  ").validate(),
            Err(ConfigError::EmptyPattern)
        );
        assert_eq!(
            MigrationConfig::default().with_root("").validate(),
            Err(ConfigError::EmptyRoot)
        );
    }

    #[test]
    fn test_pool_config() {
        let config = PoolConfig::default().with_max_connections(1).with_acquire_timeout(5);
        assert_eq!(config.max_connections, 1);
        assert_eq!(config.acquire_timeout_seconds, 5);
    }
}
