//! Error types for the migration system
//!
//! Every failure that can abort a run is a [`MigrateError`] variant carrying the
//! offending identifier (pattern or migration name) and the underlying cause.

use std::fmt;
use thiserror::Error;

/// Result type alias for migration operations
pub type MigrateResult<T> = Result<T, MigrateError>;

/// Result type alias for database backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Where in a run an operation was when it failed or was cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Creating the `db_migrations` table
    EnsureSchema,
    /// Reading a migration body from its source
    Read,
    /// Opening the unit of work for a migration
    Begin,
    /// Counting ledger records for a migration
    CheckingLedger,
    /// Inserting the ledger record
    Recording,
    /// Running the migration body
    Executing,
    /// Finalizing the unit of work
    Committing,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::EnsureSchema => "ensure-schema",
            Stage::Read => "read",
            Stage::Begin => "begin",
            Stage::CheckingLedger => "checking-ledger",
            Stage::Recording => "recording",
            Stage::Executing => "executing",
            Stage::Committing => "committing",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by a database backend
#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    /// Driver-level failure reported as text, for backends not built on sqlx
    #[error("{0}")]
    Driver(String),

    /// A write rejected by a unique or primary key constraint, for backends not built on sqlx
    #[error("{0}")]
    UniqueViolation(String),

    #[error("unsupported database url: {0}")]
    UnsupportedUrl(String),
}

impl BackendError {
    /// True when the database rejected a write because of a unique or primary key constraint.
    ///
    /// This is how a concurrent runner losing the race on `record` shows up.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            BackendError::Sqlx(sqlx::Error::Database(db)) => db.is_unique_violation(),
            BackendError::UniqueViolation(_) => true,
            _ => false,
        }
    }
}

/// Invalid [`MigrationConfig`](crate::config::MigrationConfig)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("migration pattern must not be empty")]
    EmptyPattern,

    #[error("migrations directory must not be empty")]
    EmptyRoot,
}

/// Errors raised while enumerating a migration source
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("invalid pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("cannot scan source: {0}")]
    Io(#[from] std::io::Error),
}

/// Migration run errors
#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("error globbing {pattern:?} in {root}: {source}")]
    Discovery {
        root: String,
        pattern: String,
        #[source]
        source: SourceError,
    },

    #[error("error creating db_migrations table: {source}")]
    Schema {
        #[source]
        source: BackendError,
    },

    #[error("error reading migration {name:?}: {source}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("error opening transaction for migration {name:?}: {source}")]
    Begin {
        name: String,
        #[source]
        source: BackendError,
    },

    #[error("error checking migration status {name:?}: {source}")]
    StatusCheck {
        name: String,
        #[source]
        source: BackendError,
    },

    #[error("ledger inconsistency: {count} records for migration {name:?} in db_migrations")]
    LedgerInconsistency { name: String, count: i64 },

    #[error("error updating migration status {name:?}: {source}")]
    Record {
        name: String,
        #[source]
        source: BackendError,
    },

    #[error("error executing migration {name:?}: {source}")]
    Execution {
        name: String,
        #[source]
        source: BackendError,
    },

    #[error("error committing migration {name:?}: {source}")]
    Commit {
        name: String,
        #[source]
        source: BackendError,
    },

    #[error("migration run cancelled during {stage}{}", cancelled_target(.name))]
    Cancelled { name: Option<String>, stage: Stage },
}

fn cancelled_target(name: &Option<String>) -> String {
    match name {
        Some(name) => format!(" of {:?}", name),
        None => String::new(),
    }
}

impl MigrateError {
    /// Name of the migration the run stopped at, if the failure concerned one
    pub fn name(&self) -> Option<&str> {
        match self {
            MigrateError::Discovery { .. } | MigrateError::Schema { .. } => None,
            MigrateError::Read { name, .. }
            | MigrateError::Begin { name, .. }
            | MigrateError::StatusCheck { name, .. }
            | MigrateError::LedgerInconsistency { name, .. }
            | MigrateError::Record { name, .. }
            | MigrateError::Execution { name, .. }
            | MigrateError::Commit { name, .. } => Some(name),
            MigrateError::Cancelled { name, .. } => name.as_deref(),
        }
    }

    /// Stage of the run the error was raised in
    pub fn stage(&self) -> Option<Stage> {
        match self {
            MigrateError::Discovery { .. } => None,
            MigrateError::Schema { .. } => Some(Stage::EnsureSchema),
            MigrateError::Read { .. } => Some(Stage::Read),
            MigrateError::Begin { .. } => Some(Stage::Begin),
            MigrateError::StatusCheck { .. } | MigrateError::LedgerInconsistency { .. } => {
                Some(Stage::CheckingLedger)
            }
            MigrateError::Record { .. } => Some(Stage::Recording),
            MigrateError::Execution { .. } => Some(Stage::Executing),
            MigrateError::Commit { .. } => Some(Stage::Committing),
            MigrateError::Cancelled { stage, .. } => Some(*stage),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, MigrateError::Cancelled { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_names_and_stages() {
        let err = MigrateError::Execution {
            name: "003_z.sql".to_string(),
            source: BackendError::Driver("syntax error".to_string()),
        };
        assert_eq!(err.name(), Some("003_z.sql"));
        assert_eq!(err.stage(), Some(Stage::Executing));
        assert_eq!(
            err.to_string(),
            "error executing migration \"003_z.sql\": syntax error"
        );

        let err = MigrateError::Schema {
            source: BackendError::Driver("permission denied".to_string()),
        };
        assert_eq!(err.name(), None);
        assert_eq!(err.stage(), Some(Stage::EnsureSchema));
    }

    #[test]
    fn test_unique_violation_is_explicit() {
        assert!(BackendError::UniqueViolation("db_migrations_pkey".to_string()).is_unique_violation());
        // Message text alone never counts
        assert!(!BackendError::Driver("duplicate key value violates unique constraint".to_string())
            .is_unique_violation());
        assert!(!BackendError::UnsupportedUrl("mysql://x".to_string()).is_unique_violation());
    }

    #[test]
    fn test_cancelled_display() {
        let err = MigrateError::Cancelled {
            name: Some("001_init.sql".to_string()),
            stage: Stage::Executing,
        };
        assert!(err.is_cancelled());
        assert_eq!(
            err.to_string(),
            "migration run cancelled during executing of \"001_init.sql\""
        );

        let err = MigrateError::Cancelled {
            name: None,
            stage: Stage::EnsureSchema,
        };
        assert_eq!(err.to_string(), "migration run cancelled during ensure-schema");
    }
}
