//! Migration ledger
//!
//! The `db_migrations` table is the only record of which migrations have been
//! applied. The ledger keeps no state of its own: every operation runs inside
//! the transaction it is handed.

use crate::backends::DatabaseTransaction;
use crate::error::{MigrateError, MigrateResult};

/// Name of the tracking table
pub const MIGRATIONS_TABLE: &str = "db_migrations";

/// SQL creating the tracking table when it is missing
pub const CREATE_TABLE_SQL: &str = "create table if not exists db_migrations (name text primary key)";

/// SQL counting the records for one migration name
pub const COUNT_SQL: &str = "select count(*) from db_migrations where name = $1";

/// SQL recording one migration name
pub const INSERT_SQL: &str = "insert into db_migrations values ($1)";

/// Stateless access to the `db_migrations` table
#[derive(Debug, Clone, Copy, Default)]
pub struct Ledger;

impl Ledger {
    /// Create the tracking table if it does not exist; inserts nothing
    pub async fn ensure_schema(&self, tx: &mut dyn DatabaseTransaction) -> MigrateResult<()> {
        tx.execute(CREATE_TABLE_SQL, &[])
            .await
            .map_err(|source| MigrateError::Schema { source })?;
        Ok(())
    }

    /// Whether `name` has exactly one ledger record
    ///
    /// More than one record can only happen if the primary key was dropped or
    /// tampered with; that is reported as [`MigrateError::LedgerInconsistency`]
    /// instead of guessing.
    pub async fn is_applied(&self, tx: &mut dyn DatabaseTransaction, name: &str) -> MigrateResult<bool> {
        let count = tx
            .fetch_count(COUNT_SQL, &[name])
            .await
            .map_err(|source| MigrateError::StatusCheck {
                name: name.to_string(),
                source,
            })?;

        match count {
            0 => Ok(false),
            1 => Ok(true),
            count => Err(MigrateError::LedgerInconsistency {
                name: name.to_string(),
                count,
            }),
        }
    }

    /// Insert the record for `name`; fails if it is already there
    pub async fn record(&self, tx: &mut dyn DatabaseTransaction, name: &str) -> MigrateResult<()> {
        tx.execute(INSERT_SQL, &[name]).await.map_err(|source| {
            if source.is_unique_violation() {
                tracing::warn!(
                    migration = name,
                    "migration was recorded concurrently by another runner"
                );
            }
            MigrateError::Record {
                name: name.to_string(),
                source,
            }
        })?;
        Ok(())
    }
}
