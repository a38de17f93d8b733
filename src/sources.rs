//! Date-based input file resolution with ordered fallback.

use crate::config::{DimSelection, Store};

use chrono::{Duration, NaiveDate};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

const DATE_PLACEHOLDER: &str = "YYYYMMDD";
const STORE_PLACEHOLDER: &str = "{store}";

/// One candidate location for an input file.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DataSource {
    pub name: String,
    /// May contain `{store}`.
    pub directory: String,
    /// Must contain `YYYYMMDD`.
    pub filename: String,
    /// Days added to the target date to get the file date; `-1` picks the
    /// previous day's cycle.
    #[serde(default)]
    pub day_offset: i64,
    /// Files live below a `YYYY` directory.
    #[serde(default)]
    pub year_subdirectory: bool,
    /// File variable name to field variable name.
    #[serde(default)]
    pub rename: BTreeMap<String, String>,
    #[serde(default)]
    pub dimensions: BTreeMap<String, DimSelection>,
}

impl DataSource {
    pub fn file_date(&self, date: NaiveDate) -> NaiveDate {
        date + Duration::days(self.day_offset)
    }

    pub fn file_name(&self, date: NaiveDate) -> String {
        let stamp = self.file_date(date).format("%Y%m%d").to_string();
        self.filename.replace(DATE_PLACEHOLDER, &stamp)
    }

    pub fn base_directory(&self, store: Store) -> PathBuf {
        PathBuf::from(
            self.directory
                .replace(STORE_PLACEHOLDER, &store.to_string()),
        )
    }

    /// Where the file is expected without searching.
    pub fn direct_path(&self, date: NaiveDate, store: Store) -> PathBuf {
        let mut path = self.base_directory(store);
        if self.year_subdirectory {
            path.push(self.file_date(date).format("%Y").to_string());
        }
        path.push(self.file_name(date));
        path
    }

    /// Variable name in the file for a field variable.
    pub fn file_variable<'a>(&'a self, field_variable: &'a str) -> &'a str {
        self.rename
            .iter()
            .find(|(_, to)| to.as_str() == field_variable)
            .map_or(field_variable, |(from, _)| from.as_str())
    }

    fn resolve(&self, date: NaiveDate, store: Store, tried: &mut Vec<PathBuf>) -> Option<PathBuf> {
        let direct = self.direct_path(date, store);
        if direct.is_file() {
            return Some(direct);
        }
        tried.push(direct);

        let base = self.base_directory(store);
        let file_name = self.file_name(date);
        let found = search_file_recursively(&base, &file_name);
        if found.is_none() {
            tried.push(base.join("**").join(&file_name));
        }
        found
    }
}

/// Search for a file by name anywhere below a directory.
fn search_file_recursively(base_dir: &Path, file_name: &str) -> Option<PathBuf> {
    if !base_dir.is_dir() {
        return None;
    }

    WalkDir::new(base_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .find(|entry| {
            entry.file_type().is_file() && entry.file_name().to_string_lossy() == file_name
        })
        .map(|entry| entry.into_path())
}

/// A source together with the file it resolved to.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSource {
    pub source: DataSource,
    pub path: PathBuf,
    /// Evaluation date the source was resolved for.
    pub date: NaiveDate,
    pub file_date: NaiveDate,
}

#[derive(Debug, PartialEq)]
pub struct NotFound {
    pub date: NaiveDate,
    pub tried: Vec<PathBuf>,
}

impl fmt::Display for NotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no input file found for {}; tried:", self.date)?;
        for path in &self.tried {
            write!(f, " {}", path.display())?;
        }
        Ok(())
    }
}

impl std::error::Error for NotFound {}

/// Tries each source in order and returns the first existing file.
pub fn resolve_first(
    sources: &[DataSource],
    date: NaiveDate,
    store: Store,
) -> Result<ResolvedSource, NotFound> {
    let mut tried = Vec::new();
    for source in sources {
        match source.resolve(date, store, &mut tried) {
            Some(path) => {
                info!(source = %source.name, path = %path.display(), "using input file");
                return Ok(ResolvedSource {
                    source: source.clone(),
                    path,
                    date,
                    file_date: source.file_date(date),
                });
            }
            None => debug!(source = %source.name, "no file, trying next source"),
        }
    }
    Err(NotFound { date, tried })
}
