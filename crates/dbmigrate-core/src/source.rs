//! Migration sources.
//!
//! A source lists every migration it knows about, in ascending version
//! order. Listing may happen more than once per session.

use crate::cleanup::Closer;
use crate::error::{MigrateError, Result};
use crate::migration::{sort_and_validate, Migration};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Ordered, re-readable collection of migrations.
#[async_trait]
pub trait MigrationSource: Closer {
    /// All migrations, sorted by version with no duplicates.
    async fn migrations(&mut self) -> Result<Vec<Migration>>;
}

/// Migrations compiled into the binary.
///
/// ```rust
/// use dbmigrate_core::{EmbeddedSource, Migration};
///
/// let source = EmbeddedSource::new([
///     Migration::new(20250319124829, "create_table", "CREATE TABLE t (id INT);")
///         .with_down("DROP TABLE t;"),
/// ]);
/// ```
#[derive(Debug, Clone)]
pub struct EmbeddedSource {
    migrations: Vec<Migration>,
    closed: bool,
}

impl EmbeddedSource {
    /// Create a source over `migrations`, in any order.
    #[must_use]
    pub fn new(migrations: impl IntoIterator<Item = Migration>) -> Self {
        Self {
            migrations: migrations.into_iter().collect(),
            closed: false,
        }
    }

    /// Create a source from `(file name, body)` pairs named like the files
    /// of a [`DirectorySource`], typically bodies pulled in with
    /// `include_str!`. Names without a `.sql` extension are ignored.
    ///
    /// ```rust
    /// use dbmigrate_core::EmbeddedSource;
    ///
    /// let source = EmbeddedSource::from_files([
    ///     ("1_create_table.up.sql", "CREATE TABLE t (id INT);"),
    ///     ("1_create_table.down.sql", "DROP TABLE t;"),
    /// ])
    /// .unwrap();
    /// ```
    pub fn from_files<'a>(files: impl IntoIterator<Item = (&'a str, &'a str)>) -> Result<Self> {
        let mut set = FileSet::default();
        for (file_name, body) in files {
            if file_name.ends_with(".sql") {
                set.insert(file_name, body.to_string(), "embedded files")?;
            }
        }
        Ok(Self::new(set.into_migrations()?))
    }
}

#[async_trait]
impl Closer for EmbeddedSource {
    fn kind(&self) -> &'static str {
        "embedded source"
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

#[async_trait]
impl MigrationSource for EmbeddedSource {
    async fn migrations(&mut self) -> Result<Vec<Migration>> {
        if self.closed {
            return Err(MigrateError::Closed(self.kind()));
        }
        let mut migrations = self.migrations.clone();
        sort_and_validate(&mut migrations)?;
        Ok(migrations)
    }
}

/// Migrations read from `{version}_{title}.up.sql` and
/// `{version}_{title}.down.sql` files in a directory.
///
/// The directory is re-read on every listing. Files without a `.sql`
/// extension are ignored.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    path: PathBuf,
    closed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Up,
    Down,
}

impl DirectorySource {
    /// Open a directory source, failing if `path` is not a directory.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = tokio::fs::metadata(&path).await.map_err(|e| {
            MigrateError::source_error(format!("cannot open {}: {e}", path.display()))
        })?;
        if !metadata.is_dir() {
            return Err(MigrateError::source_error(format!(
                "{} is not a directory",
                path.display()
            )));
        }
        Ok(Self {
            path,
            closed: false,
        })
    }

    /// Directory being read.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<Vec<Migration>> {
        let mut entries = tokio::fs::read_dir(&self.path).await.map_err(|e| {
            MigrateError::source_error(format!("cannot read {}: {e}", self.path.display()))
        })?;

        let origin = self.path.display().to_string();
        let mut set = FileSet::default();

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| MigrateError::source_error(e.to_string()))?
        {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if !file_name.ends_with(".sql") {
                continue;
            }
            let body = tokio::fs::read_to_string(entry.path()).await.map_err(|e| {
                MigrateError::source_error(format!("cannot read {file_name}: {e}"))
            })?;
            set.insert(&file_name, body, &origin)?;
        }

        let migrations = set.into_migrations()?;
        debug!(path = %self.path.display(), count = migrations.len(), "Read migrations");
        Ok(migrations)
    }
}

/// Up and down bodies keyed by version, collected from migration files.
#[derive(Debug, Default)]
struct FileSet {
    ups: BTreeMap<i64, (String, String)>,
    downs: BTreeMap<i64, (String, String)>,
}

impl FileSet {
    fn insert(&mut self, file_name: &str, body: String, origin: &str) -> Result<()> {
        let (version, title, direction) = parse_file_name(file_name)?;
        let target = match direction {
            Direction::Up => &mut self.ups,
            Direction::Down => &mut self.downs,
        };
        if target.insert(version, (title, body)).is_some() {
            return Err(MigrateError::source_error(format!(
                "duplicate migration version {version} in {origin}"
            )));
        }
        Ok(())
    }

    fn into_migrations(mut self) -> Result<Vec<Migration>> {
        if let Some(version) = self.downs.keys().find(|v| !self.ups.contains_key(v)) {
            return Err(MigrateError::source_error(format!(
                "down migration {version} has no matching up migration"
            )));
        }

        let mut migrations: Vec<Migration> = self
            .ups
            .into_iter()
            .map(|(version, (title, up_sql))| {
                let migration = Migration::new(version, title, up_sql);
                match self.downs.remove(&version) {
                    Some((_, down_sql)) => migration.with_down(down_sql),
                    None => migration,
                }
            })
            .collect();
        sort_and_validate(&mut migrations)?;
        Ok(migrations)
    }
}

fn parse_file_name(file_name: &str) -> Result<(i64, String, Direction)> {
    let malformed = || {
        MigrateError::source_error(format!(
            "malformed migration file name {file_name:?}, expected {{version}}_{{title}}.up.sql or .down.sql"
        ))
    };

    let (stem, direction) = if let Some(stem) = file_name.strip_suffix(".up.sql") {
        (stem, Direction::Up)
    } else if let Some(stem) = file_name.strip_suffix(".down.sql") {
        (stem, Direction::Down)
    } else {
        return Err(malformed());
    };

    let (version, title) = stem.split_once('_').ok_or_else(malformed)?;
    if version.is_empty() || !version.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    let version = version.parse::<i64>().map_err(|_| malformed())?;
    Ok((version, title.to_string(), direction))
}

#[async_trait]
impl Closer for DirectorySource {
    fn kind(&self) -> &'static str {
        "directory source"
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

#[async_trait]
impl MigrationSource for DirectorySource {
    async fn migrations(&mut self) -> Result<Vec<Migration>> {
        if self.closed {
            return Err(MigrateError::Closed(self.kind()));
        }
        self.read().await
    }
}
