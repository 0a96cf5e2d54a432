use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};

/// Create `<dir>/<YYYYMMDDHHMMSS>_<slug>.sql` holding only a comment header
pub fn create(dir: &Path, name: &str) -> anyhow::Result<PathBuf> {
    create_at(dir, name, Utc::now())
}

fn create_at(dir: &Path, name: &str, now: DateTime<Utc>) -> anyhow::Result<PathBuf> {
    let slug = slugify(name);
    if slug.is_empty() {
        bail!("migration name {:?} has no usable characters", name);
    }

    fs::create_dir_all(dir)
        .with_context(|| format!("error creating migrations directory {}", dir.display()))?;

    let path = dir.join(format!("{}_{}.sql", now.format("%Y%m%d%H%M%S"), slug));

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .with_context(|| format!("error creating migration {}", path.display()))?;

    let header = format!(
        "-- Migration: {}\n-- Created: {}\n--\n-- Runs once, inside a transaction, in file name order.\n\n",
        name,
        now.format("%Y-%m-%d %H:%M:%S UTC")
    );
    file.write_all(header.as_bytes())
        .with_context(|| format!("error writing migration {}", path.display()))?;

    tracing::debug!(path = %path.display(), "created migration");
    Ok(path)
}

/// Lower-case ASCII alphanumerics, everything else collapsed into single underscores
fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    slug.trim_end_matches('_').to_string()
}
