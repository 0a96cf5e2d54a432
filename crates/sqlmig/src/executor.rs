//! Migration executor
//!
//! Applies one migration and its ledger record as a single transaction:
//! check the ledger, record the name, run the body, commit. Any failure rolls
//! the whole unit back so a ledger row exists only for fully executed bodies.
//!
//! Every database call is raced against the run's cancellation token. A
//! cancelled call is abandoned and its transaction dropped, which makes sqlx
//! roll it back.

use std::future::Future;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backends::{DatabasePool, DatabaseTransaction};
use crate::definitions::{Migration, MigrationOutcome};
use crate::error::{MigrateError, MigrateResult, Stage};
use crate::ledger::Ledger;

/// Runs migrations one transaction at a time
#[derive(Debug, Clone)]
pub struct Executor {
    ledger: Ledger,
    token: CancellationToken,
}

impl Executor {
    pub fn new(ledger: Ledger, token: CancellationToken) -> Self {
        Self { ledger, token }
    }

    /// An executor whose calls are never cancelled
    pub fn uncancellable(ledger: Ledger) -> Self {
        Self::new(ledger, CancellationToken::new())
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Fail with [`MigrateError::Cancelled`] if the run has been cancelled
    pub fn check_cancelled(&self, name: Option<&str>, stage: Stage) -> MigrateResult<()> {
        if self.token.is_cancelled() {
            return Err(cancelled(name, stage));
        }
        Ok(())
    }

    /// Create the tracking table in its own committed transaction
    pub async fn ensure_schema(&self, db: &dyn DatabasePool) -> MigrateResult<()> {
        let stage = Stage::EnsureSchema;

        let mut tx = self
            .guard(None, stage, async {
                db.begin_transaction()
                    .await
                    .map_err(|source| MigrateError::Schema { source })
            })
            .await?;

        if let Err(err) = self.guard(None, stage, self.ledger.ensure_schema(&mut *tx)).await {
            release(tx, &err, "db_migrations").await;
            return Err(err);
        }

        self.guard(None, stage, async move {
            tx.commit()
                .await
                .map_err(|source| MigrateError::Schema { source })
        })
        .await?;

        debug!(backend = db.backend_name(), "db_migrations table ready");
        Ok(())
    }

    /// Apply `migration` unless the ledger already has it
    pub async fn apply(&self, db: &dyn DatabasePool, migration: &Migration) -> MigrateResult<MigrationOutcome> {
        let name = migration.name.as_str();
        let start = Instant::now();

        let mut tx = self
            .guard(Some(name), Stage::Begin, async {
                db.begin_transaction().await.map_err(|source| MigrateError::Begin {
                    name: name.to_string(),
                    source,
                })
            })
            .await?;
        debug!(migration = name, "transaction opened");

        let outcome = match self.apply_in(&mut *tx, migration).await {
            Ok(outcome) => outcome,
            Err(err) => {
                release(tx, &err, name).await;
                return Err(err);
            }
        };

        self.guard(Some(name), Stage::Committing, async move {
            tx.commit().await.map_err(|source| MigrateError::Commit {
                name: name.to_string(),
                source,
            })
        })
        .await?;

        match outcome {
            MigrationOutcome::Applied => info!(
                migration = name,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "applied migration"
            ),
            MigrationOutcome::Skipped => debug!(migration = name, "migration already applied, skipped"),
        }

        Ok(outcome)
    }

    /// Check whether `name` is applied, in a transaction that is rolled back afterwards
    pub async fn is_applied(&self, db: &dyn DatabasePool, name: &str) -> MigrateResult<bool> {
        let mut tx = self
            .guard(Some(name), Stage::Begin, async {
                db.begin_transaction().await.map_err(|source| MigrateError::Begin {
                    name: name.to_string(),
                    source,
                })
            })
            .await?;

        let result = self
            .guard(Some(name), Stage::CheckingLedger, self.ledger.is_applied(&mut *tx, name))
            .await;

        match &result {
            Ok(_) => {
                if let Err(e) = tx.rollback().await {
                    warn!(migration = name, error = %e, "failed to roll back read-only transaction");
                }
            }
            Err(err) => release(tx, err, name).await,
        }

        result
    }

    async fn apply_in(
        &self,
        tx: &mut dyn DatabaseTransaction,
        migration: &Migration,
    ) -> MigrateResult<MigrationOutcome> {
        let name = migration.name.as_str();

        let applied = self
            .guard(Some(name), Stage::CheckingLedger, self.ledger.is_applied(tx, name))
            .await?;
        if applied {
            return Ok(MigrationOutcome::Skipped);
        }

        self.guard(Some(name), Stage::Recording, self.ledger.record(tx, name))
            .await?;

        self.guard(Some(name), Stage::Executing, async {
            tx.execute_script(&migration.body)
                .await
                .map_err(|source| MigrateError::Execution {
                    name: name.to_string(),
                    source,
                })
        })
        .await?;

        Ok(MigrationOutcome::Applied)
    }

    /// Run `operation` unless the token fires first
    async fn guard<T, F>(&self, name: Option<&str>, stage: Stage, operation: F) -> MigrateResult<T>
    where
        F: Future<Output = MigrateResult<T>>,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(cancelled(name, stage)),
            result = operation => result,
        }
    }
}

fn cancelled(name: Option<&str>, stage: Stage) -> MigrateError {
    MigrateError::Cancelled {
        name: name.map(str::to_string),
        stage,
    }
}

/// End a failed unit of work. A cancelled one is dropped without waiting on
/// the database; sqlx rolls it back when the connection is next used.
async fn release(tx: Box<dyn DatabaseTransaction>, cause: &MigrateError, target: &str) {
    if cause.is_cancelled() {
        warn!(migration = target, stage = ?cause.stage(), "run cancelled, abandoning transaction");
        drop(tx);
        return;
    }

    debug!(migration = target, error = %cause, "rolling back");
    if let Err(e) = tx.rollback().await {
        warn!(migration = target, error = %e, "rollback failed");
    }
}
