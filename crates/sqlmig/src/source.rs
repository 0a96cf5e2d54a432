//! Migration sources
//!
//! A source is a filesystem-like tree of named entries. Names are paths relative
//! to the source root, always joined with `/`, and double as the identifiers
//! recorded in the ledger.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Something migration bodies can be listed and read from
pub trait MigrationSource: Send + Sync {
    /// Human-readable description of the root, used in errors and logs
    fn root(&self) -> String;

    /// Every entry in the source, in whatever order the source enumerates them
    fn entries(&self) -> io::Result<Vec<String>>;

    /// Entries outside the directories `descend` rejects
    ///
    /// `descend` receives a directory's `/`-joined name. Sources without a
    /// real directory tree may ignore it and return every entry.
    fn entries_within(&self, descend: &dyn Fn(&str) -> bool) -> io::Result<Vec<String>> {
        let _ = descend;
        self.entries()
    }

    /// Read the body of the entry called `name`
    fn read(&self, name: &str) -> io::Result<String>;
}

impl<S: MigrationSource + ?Sized> MigrationSource for &S {
    fn root(&self) -> String {
        (**self).root()
    }

    fn entries(&self) -> io::Result<Vec<String>> {
        (**self).entries()
    }

    fn entries_within(&self, descend: &dyn Fn(&str) -> bool) -> io::Result<Vec<String>> {
        (**self).entries_within(descend)
    }

    fn read(&self, name: &str) -> io::Result<String> {
        (**self).read(name)
    }
}

/// Migrations stored as files under a directory
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Symlinked directories are followed; `ancestors` holds the canonical
    /// paths of the directories above `dir` so a link cycle ends the descent.
    fn walk(
        &self,
        dir: &Path,
        prefix: &str,
        descend: &dyn Fn(&str) -> bool,
        ancestors: &mut HashSet<PathBuf>,
        out: &mut Vec<String>,
    ) -> io::Result<()> {
        let canonical = fs::canonicalize(dir)?;
        if !ancestors.insert(canonical.clone()) {
            tracing::warn!(path = %dir.display(), "skipping symlinked directory that loops back on itself");
            return Ok(());
        }

        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                // Non UTF-8 names can't be recorded in a text column
                tracing::warn!(path = %entry.path().display(), "skipping non UTF-8 migration path");
                continue;
            };
            let name = if prefix.is_empty() {
                file_name.to_string()
            } else {
                format!("{}/{}", prefix, file_name)
            };

            let path = entry.path();
            let metadata = match fs::metadata(&path) {
                Ok(metadata) => metadata,
                Err(e) if entry.file_type()?.is_symlink() => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping dangling symlink");
                    continue;
                }
                Err(e) => return Err(e),
            };

            if metadata.is_dir() {
                if descend(&name) {
                    self.walk(&path, &name, descend, ancestors, out)?;
                }
            } else if metadata.is_file() {
                out.push(name);
            }
        }

        ancestors.remove(&canonical);
        Ok(())
    }
}

impl MigrationSource for DirSource {
    fn root(&self) -> String {
        self.root.display().to_string()
    }

    fn entries(&self) -> io::Result<Vec<String>> {
        self.entries_within(&|_| true)
    }

    fn entries_within(&self, descend: &dyn Fn(&str) -> bool) -> io::Result<Vec<String>> {
        let mut entries = Vec::new();
        self.walk(&self.root, "", descend, &mut HashSet::new(), &mut entries)?;
        Ok(entries)
    }

    fn read(&self, name: &str) -> io::Result<String> {
        let path = name
            .split('/')
            .fold(self.root.clone(), |path, segment| path.join(segment));
        fs::read_to_string(path)
    }
}

/// Migrations held in memory, enumerated in insertion order
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: Vec<(String, String)>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) an entry
    pub fn with(mut self, name: impl Into<String>, body: impl Into<String>) -> Self {
        self.insert(name, body);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, body: impl Into<String>) {
        let name = name.into();
        let body = body.into();
        match self.files.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, existing)) => *existing = body,
            None => self.files.push((name, body)),
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl MigrationSource for MemorySource {
    fn root(&self) -> String {
        "<memory>".to_string()
    }

    fn entries(&self) -> io::Result<Vec<String>> {
        Ok(self.files.iter().map(|(name, _)| name.clone()).collect())
    }

    fn read(&self, name: &str) -> io::Result<String> {
        self.files
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, body)| body.clone())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("{} not found", name)))
    }
}

/// Migrations compiled into the binary with `rust-embed`
///
/// ```rust,ignore
/// #[derive(rust_embed::RustEmbed)]
/// #[folder = "migrations/"]
/// struct Migrations;
///
/// let migrator = Migrator::new(EmbeddedSource::<Migrations>::new(), "*.sql");
/// ```
#[cfg(feature = "embed")]
pub struct EmbeddedSource<E> {
    _assets: std::marker::PhantomData<fn() -> E>,
}

#[cfg(feature = "embed")]
impl<E: rust_embed::RustEmbed> EmbeddedSource<E> {
    pub fn new() -> Self {
        Self {
            _assets: std::marker::PhantomData,
        }
    }
}

#[cfg(feature = "embed")]
impl<E: rust_embed::RustEmbed> Default for EmbeddedSource<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "embed")]
impl<E: rust_embed::RustEmbed> MigrationSource for EmbeddedSource<E> {
    fn root(&self) -> String {
        format!("<embedded {}>", std::any::type_name::<E>())
    }

    fn entries(&self) -> io::Result<Vec<String>> {
        Ok(E::iter().map(|name| name.into_owned()).collect())
    }

    fn read(&self, name: &str) -> io::Result<String> {
        let file = E::get(name)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("{} not found", name)))?;
        String::from_utf8(file.data.into_owned())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}
