//! Migration runner
//!
//! Discovers migrations, makes sure the ledger table exists, then applies each
//! migration in order in its own transaction. The first failure stops the run;
//! migrations committed before it stay committed.

use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::backends::DatabasePool;
use crate::config::MigrationConfig;
use crate::definitions::{Migration, MigrationReport, MigrationStatus};
use crate::discovery::discover;
use crate::error::{MigrateError, MigrateResult, Stage};
use crate::executor::Executor;
use crate::ledger::Ledger;
use crate::source::{DirSource, MigrationSource};

/// Applies the migrations of one source against a database
#[derive(Debug, Clone)]
pub struct Migrator<S> {
    source: S,
    pattern: String,
    ledger: Ledger,
}

impl<S: MigrationSource> Migrator<S> {
    pub fn new(source: S, pattern: impl Into<String>) -> Self {
        Self {
            source,
            pattern: pattern.into(),
            ledger: Ledger,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Names of the migrations this migrator would run, in run order
    pub fn discover(&self) -> MigrateResult<Vec<String>> {
        discover(&self.source, &self.pattern)
    }

    /// Apply every pending migration
    pub async fn migrate(&self, db: &dyn DatabasePool) -> MigrateResult<MigrationReport> {
        self.migrate_with_cancellation(db, CancellationToken::new())
            .await
    }

    /// Apply every pending migration, stopping early once `token` is cancelled
    ///
    /// A cancelled run returns [`MigrateError::Cancelled`]; the migration in
    /// flight is rolled back and everything committed before it stays.
    pub async fn migrate_with_cancellation(
        &self,
        db: &dyn DatabasePool,
        token: CancellationToken,
    ) -> MigrateResult<MigrationReport> {
        let start = Instant::now();

        // Discovery first: a bad pattern must not touch the database
        let names = self.discover()?;

        let executor = Executor::new(self.ledger, token);
        executor.ensure_schema(db).await?;

        let mut report = MigrationReport::default();
        for name in names {
            executor.check_cancelled(Some(&name), Stage::Read)?;

            let body = self
                .source
                .read(&name)
                .map_err(|source| MigrateError::Read {
                    name: name.clone(),
                    source,
                })?;

            let migration = Migration { name, body };
            let outcome = match executor.apply(db, &migration).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    if err.is_cancelled() {
                        warn!(migration = %migration.name, "migration run cancelled");
                    }
                    return Err(err);
                }
            };
            report.push(migration.name, outcome);
        }

        report.elapsed = start.elapsed();
        info!(
            backend = db.backend_name(),
            applied = report.applied_count(),
            skipped = report.skipped_count(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "migration run complete"
        );

        Ok(report)
    }

    /// Applied state of every discovered migration, without running any of them
    ///
    /// Creates the ledger table if it is missing.
    pub async fn status(&self, db: &dyn DatabasePool) -> MigrateResult<Vec<MigrationStatus>> {
        let names = self.discover()?;

        let executor = Executor::uncancellable(self.ledger);
        executor.ensure_schema(db).await?;

        let mut statuses = Vec::with_capacity(names.len());
        for name in names {
            let applied = executor.is_applied(db, &name).await?;
            statuses.push(MigrationStatus { name, applied });
        }

        Ok(statuses)
    }
}

impl Migrator<DirSource> {
    /// Migrator over a directory, as described by `config`
    pub fn from_config(config: &MigrationConfig) -> Self {
        Self::new(DirSource::new(config.root.clone()), config.pattern.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::SqliteDatabase;
    use crate::config::PoolConfig;
    use crate::source::MemorySource;

    async fn memory_db() -> SqliteDatabase {
        SqliteDatabase::connect("sqlite::memory:", &PoolConfig::default().with_max_connections(1))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_migrate_applies_in_byte_order() {
        let db = memory_db().await;
        // 002 needs the table from 001; insertion order is reversed
        let source = MemorySource::new()
            .with("002_seed.sql", "insert into users values (1);")
            .with("001_users.sql", "create table users (id integer primary key);");

        let report = Migrator::new(source, "*.sql").migrate(&db).await.unwrap();
        assert_eq!(report.applied, vec!["001_users.sql", "002_seed.sql"]);
        assert!(report.skipped.is_empty());
    }

    #[tokio::test]
    async fn test_second_run_is_noop() {
        let db = memory_db().await;
        let migrator = Migrator::new(
            MemorySource::new().with("001_users.sql", "create table users (id integer primary key);"),
            "*.sql",
        );

        migrator.migrate(&db).await.unwrap();
        let report = migrator.migrate(&db).await.unwrap();

        assert!(report.is_noop());
        assert_eq!(report.skipped, vec!["001_users.sql"]);
    }

    #[tokio::test]
    async fn test_status_reports_pending_and_applied() {
        let db = memory_db().await;
        let mut source = MemorySource::new().with("001_a.sql", "create table a (id integer);");
        Migrator::new(source.clone(), "*.sql").migrate(&db).await.unwrap();

        source.insert("002_b.sql", "create table b (id integer);");
        let statuses = Migrator::new(source, "*.sql").status(&db).await.unwrap();

        assert_eq!(
            statuses,
            vec![
                MigrationStatus { name: "001_a.sql".to_string(), applied: true },
                MigrationStatus { name: "002_b.sql".to_string(), applied: false },
            ]
        );
    }

    #[tokio::test]
    async fn test_from_config() {
        let config = MigrationConfig::new("db/migrations", "*.up.sql");
        let migrator = Migrator::from_config(&config);

        assert_eq!(migrator.source().path(), std::path::Path::new("db/migrations"));
        assert_eq!(migrator.pattern(), "*.up.sql");
    }
}
