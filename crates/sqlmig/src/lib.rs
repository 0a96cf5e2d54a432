//! # sqlmig: exactly-once SQL migrations
//!
//! Discovers SQL scripts in a source (a directory, an in-memory set, or files
//! embedded at compile time), orders them by name, and applies each one at most
//! once. Applied names are recorded in a `db_migrations` table in the same
//! transaction as the script itself, so a migration is either fully applied and
//! recorded or not applied at all.
//!
//! ```rust,ignore
//! use sqlmig::{connect, DirSource, Migrator, PoolConfig};
//!
//! let db = connect("postgres://localhost/app", &PoolConfig::default()).await?;
//! let report = Migrator::new(DirSource::new("migrations"), "*.sql")
//!     .migrate(db.as_ref())
//!     .await?;
//! println!("applied {} migrations", report.applied_count());
//! ```

pub mod backends;
pub mod config;
pub mod definitions;
pub mod discovery;
pub mod error;
pub mod executor;
pub mod ledger;
pub mod migrator;
pub mod source;

pub use backends::{
    connect, DatabaseBackendType, DatabasePool, DatabaseTransaction, PostgresDatabase, SqliteDatabase,
};
pub use config::*;
pub use definitions::*;
pub use discovery::discover;
pub use error::*;
pub use executor::Executor;
pub use ledger::{Ledger, MIGRATIONS_TABLE};
pub use migrator::Migrator;
pub use source::*;

pub use tokio_util::sync::CancellationToken;
