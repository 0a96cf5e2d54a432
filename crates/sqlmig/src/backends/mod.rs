//! Database Backend Abstractions
//!
//! The runner talks to the database through [`DatabasePool`] and
//! [`DatabaseTransaction`]; PostgreSQL and SQLite implementations are provided
//! on top of sqlx.

pub mod core;
pub mod postgres;
pub mod sqlite;

use std::sync::Arc;

pub use self::core::*;
pub use postgres::{PostgresDatabase, PostgresTransaction};
pub use sqlite::{SqliteDatabase, SqliteTransaction};

use crate::config::PoolConfig;
use crate::error::{BackendError, BackendResult};

/// Database backend type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseBackendType {
    PostgreSQL,
    SQLite,
}

impl DatabaseBackendType {
    /// Detect the backend from a connection URL scheme
    pub fn from_url(url: &str) -> BackendResult<Self> {
        let scheme = url
            .split_once(':')
            .map(|(scheme, _)| scheme)
            .ok_or_else(|| BackendError::UnsupportedUrl(url.to_string()))?;

        scheme
            .parse()
            .map_err(|_| BackendError::UnsupportedUrl(url.to_string()))
    }
}

impl std::fmt::Display for DatabaseBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseBackendType::PostgreSQL => write!(f, "postgresql"),
            DatabaseBackendType::SQLite => write!(f, "sqlite"),
        }
    }
}

impl std::str::FromStr for DatabaseBackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgresql" | "postgres" => Ok(DatabaseBackendType::PostgreSQL),
            "sqlite" => Ok(DatabaseBackendType::SQLite),
            _ => Err(format!("Unsupported database backend: {}", s)),
        }
    }
}

/// Connect to the database named by `database_url`, choosing the backend from its scheme
pub async fn connect(database_url: &str, config: &PoolConfig) -> BackendResult<Arc<dyn DatabasePool>> {
    let backend = DatabaseBackendType::from_url(database_url)?;
    tracing::debug!(%backend, "connecting to database");

    let pool: Arc<dyn DatabasePool> = match backend {
        DatabaseBackendType::PostgreSQL => {
            Arc::new(PostgresDatabase::connect(database_url, config).await?)
        }
        DatabaseBackendType::SQLite => Arc::new(SqliteDatabase::connect(database_url, config).await?),
    };

    Ok(pool)
}
