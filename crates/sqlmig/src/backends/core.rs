//! Core Database Backend Traits
//!
//! The migration protocol only needs a handle that can open a transaction, and a
//! transaction that can run a parameterized command, a raw script and a single
//! scalar count. These traits describe exactly that so the runner stays
//! independent of the driver in use.

use async_trait::async_trait;

use crate::error::BackendResult;

/// A database handle able to open transactional units of work
#[async_trait]
pub trait DatabasePool: Send + Sync {
    /// Begin a new transaction
    async fn begin_transaction(&self) -> BackendResult<Box<dyn DatabaseTransaction>>;

    /// Backend name used in logs
    fn backend_name(&self) -> &'static str;
}

/// An open transaction
///
/// Dropping a transaction without calling [`commit`](DatabaseTransaction::commit)
/// rolls it back.
#[async_trait]
pub trait DatabaseTransaction: Send {
    /// Execute a command with text parameters bound positionally (`$1`, `$2`, ...)
    /// and return the affected row count
    async fn execute(&mut self, sql: &str, params: &[&str]) -> BackendResult<u64>;

    /// Execute a raw script verbatim; it may contain several statements and takes no parameters
    async fn execute_script(&mut self, sql: &str) -> BackendResult<()>;

    /// Run a query returning a single integer scalar in a single row
    async fn fetch_count(&mut self, sql: &str, params: &[&str]) -> BackendResult<i64>;

    /// Commit the transaction
    async fn commit(self: Box<Self>) -> BackendResult<()>;

    /// Rollback the transaction
    async fn rollback(self: Box<Self>) -> BackendResult<()>;
}
