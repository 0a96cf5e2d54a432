//! Migration discovery
//!
//! Selects the entries of a source matching a glob pattern and orders them by
//! byte-wise comparison of their names.

use glob::{MatchOptions, Pattern};

use crate::error::{MigrateError, MigrateResult, SourceError};
use crate::source::MigrationSource;

/// `*` and `?` stay within one path segment, like shell globbing
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Produce the run order: names in `source` matching `pattern`, sorted ascending by byte value.
pub fn discover<S>(source: &S, pattern: &str) -> MigrateResult<Vec<String>>
where
    S: MigrationSource + ?Sized,
{
    let discovery_error = |source_error: SourceError| MigrateError::Discovery {
        root: source.root(),
        pattern: pattern.to_string(),
        source: source_error,
    };

    let matcher = Pattern::new(pattern).map_err(|e| discovery_error(e.into()))?;
    let descent = Descent::new(pattern);
    let entries = source
        .entries_within(&|dir| descent.allows(dir))
        .map_err(|e| discovery_error(e.into()))?;

    let mut names: Vec<String> = entries
        .into_iter()
        .filter(|name| matcher.matches_with(name, MATCH_OPTIONS))
        .collect();

    // String ordering is byte-wise, which is what the ledger order relies on
    names.sort_unstable();
    names.dedup();

    tracing::debug!(
        root = %source.root(),
        pattern,
        count = names.len(),
        "discovered migrations"
    );

    Ok(names)
}

/// Which directories can hold a match for a pattern, judged segment by segment
///
/// Segments before the first `**` must match the directory's segments at the
/// same depth. Without `**` the pattern also bounds how deep a match can sit.
struct Descent {
    segments: Vec<Pattern>,
    bounded: bool,
}

impl Descent {
    fn new(pattern: &str) -> Self {
        let mut segments = Vec::new();
        let mut bounded = true;

        for segment in pattern.split('/') {
            if segment == "**" {
                bounded = false;
                break;
            }
            match Pattern::new(segment) {
                Ok(segment) => segments.push(segment),
                // e.g. a `/` inside a character class; fall back to a full walk from here
                Err(_) => {
                    bounded = false;
                    break;
                }
            }
        }

        Self { segments, bounded }
    }

    fn allows(&self, dir: &str) -> bool {
        let parts: Vec<&str> = dir.split('/').collect();
        if self.bounded && parts.len() >= self.segments.len() {
            return false;
        }
        parts
            .iter()
            .zip(&self.segments)
            .all(|(part, segment)| segment.matches_with(part, MATCH_OPTIONS))
    }
}
