//! SQLite Backend Implementation
//!
//! Implements the backend traits on top of a sqlx `SqlitePool`. SQLite accepts
//! the same `$N` placeholders the ledger issues.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Executor, Sqlite, SqlitePool};

use super::core::{DatabasePool, DatabaseTransaction};
use crate::config::PoolConfig;
use crate::error::BackendResult;

/// SQLite database handle
#[derive(Debug, Clone)]
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    /// Wrap an existing sqlx pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a pool for `database_url` (for example `sqlite://app.db?mode=rwc`)
    pub async fn connect(database_url: &str, config: &PoolConfig) -> BackendResult<Self> {
        let pool = Self::pool_options(config).connect(database_url).await?;
        Ok(Self::new(pool))
    }

    /// Open a pool with explicit connect options
    pub async fn connect_with(
        options: SqliteConnectOptions,
        config: &PoolConfig,
    ) -> BackendResult<Self> {
        let pool = Self::pool_options(config).connect_with(options).await?;
        Ok(Self::new(pool))
    }

    fn pool_options(config: &PoolConfig) -> SqlitePoolOptions {
        SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
    }

    /// Get the underlying sqlx pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl From<SqlitePool> for SqliteDatabase {
    fn from(pool: SqlitePool) -> Self {
        Self::new(pool)
    }
}

#[async_trait]
impl DatabasePool for SqliteDatabase {
    async fn begin_transaction(&self) -> BackendResult<Box<dyn DatabaseTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqliteTransaction { tx }))
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

/// SQLite transaction implementation
pub struct SqliteTransaction {
    tx: sqlx::Transaction<'static, Sqlite>,
}

#[async_trait]
impl DatabaseTransaction for SqliteTransaction {
    async fn execute(&mut self, sql: &str, params: &[&str]) -> BackendResult<u64> {
        let mut query = sqlx::query(sql);

        for param in params {
            query = query.bind(*param);
        }

        let result = query.execute(&mut *self.tx).await?;

        Ok(result.rows_affected())
    }

    async fn execute_script(&mut self, sql: &str) -> BackendResult<()> {
        (&mut *self.tx).execute(sql).await?;
        Ok(())
    }

    async fn fetch_count(&mut self, sql: &str, params: &[&str]) -> BackendResult<i64> {
        let mut query = sqlx::query_scalar::<Sqlite, i64>(sql);

        for param in params {
            query = query.bind(*param);
        }

        Ok(query.fetch_one(&mut *self.tx).await?)
    }

    async fn commit(self: Box<Self>) -> BackendResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> BackendResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
