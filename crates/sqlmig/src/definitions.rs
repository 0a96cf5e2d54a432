//! Migration Definitions - Core types shared by the runner and its callers

use serde::Serialize;
use std::time::Duration;

/// A discovered migration: its name (path relative to the source root) and raw script body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub name: String,
    pub body: String,
}

impl Migration {
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
        }
    }
}

/// How a single migration ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationOutcome {
    /// Already in the ledger; nothing was executed
    Skipped,
    /// Body executed and ledger record committed
    Applied,
}

/// Result of a successful run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Names applied during this run, in run order
    pub applied: Vec<String>,
    /// Names found in the ledger and skipped, in run order
    pub skipped: Vec<String>,
    /// Wall-clock time of the whole run
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

impl MigrationReport {
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// True when the run changed nothing
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }

    pub(crate) fn push(&mut self, name: String, outcome: MigrationOutcome) {
        match outcome {
            MigrationOutcome::Applied => self.applied.push(name),
            MigrationOutcome::Skipped => self.skipped.push(name),
        }
    }
}

fn serialize_millis<S: serde::Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u128(elapsed.as_millis())
}

/// Applied state of one discovered migration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub name: String,
    pub applied: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_push() {
        let mut report = MigrationReport::default();
        assert!(report.is_noop());

        report.push("001_a.sql".to_string(), MigrationOutcome::Skipped);
        report.push("002_b.sql".to_string(), MigrationOutcome::Applied);

        assert_eq!(report.applied, vec!["002_b.sql"]);
        assert_eq!(report.skipped, vec!["001_a.sql"]);
        assert_eq!(report.applied_count(), 1);
        assert_eq!(report.skipped_count(), 1);
        assert!(!report.is_noop());
    }

    #[test]
    fn test_report_serializes_elapsed_in_millis() {
        let report = MigrationReport {
            applied: vec!["001_a.sql".to_string()],
            skipped: Vec::new(),
            elapsed: Duration::from_millis(1500),
        };

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["elapsed_ms"], 1500);
        assert_eq!(json["applied"][0], "001_a.sql");
    }
}
