//! PostgreSQL Backend Implementation
//!
//! Implements the backend traits on top of a sqlx `PgPool`.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool, Postgres};

use super::core::{DatabasePool, DatabaseTransaction};
use crate::config::PoolConfig;
use crate::error::BackendResult;

/// PostgreSQL database handle
#[derive(Debug, Clone)]
pub struct PostgresDatabase {
    pool: PgPool,
}

impl PostgresDatabase {
    /// Wrap an existing sqlx pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool for `database_url`
    pub async fn connect(database_url: &str, config: &PoolConfig) -> BackendResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
            .connect(database_url)
            .await?;

        Ok(Self::new(pool))
    }

    /// Get the underlying sqlx pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl From<PgPool> for PostgresDatabase {
    fn from(pool: PgPool) -> Self {
        Self::new(pool)
    }
}

#[async_trait]
impl DatabasePool for PostgresDatabase {
    async fn begin_transaction(&self) -> BackendResult<Box<dyn DatabaseTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresTransaction { tx }))
    }

    fn backend_name(&self) -> &'static str {
        "postgresql"
    }
}

/// PostgreSQL transaction implementation
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl DatabaseTransaction for PostgresTransaction {
    async fn execute(&mut self, sql: &str, params: &[&str]) -> BackendResult<u64> {
        let mut query = sqlx::query(sql);

        for param in params {
            query = query.bind(*param);
        }

        let result = query.execute(&mut *self.tx).await?;

        Ok(result.rows_affected())
    }

    async fn execute_script(&mut self, sql: &str) -> BackendResult<()> {
        // Unprepared: goes over the simple query protocol so multi-statement bodies work
        (&mut *self.tx).execute(sql).await?;
        Ok(())
    }

    async fn fetch_count(&mut self, sql: &str, params: &[&str]) -> BackendResult<i64> {
        let mut query = sqlx::query_scalar::<Postgres, i64>(sql);

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
