use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use camino::{Utf8Path, Utf8PathBuf};
use chrono::NaiveDate;
use serde_json::{Value, json};
use tempfile::Builder;

use crate::domain::{Action, RawFileName, Source};
use crate::error::StatsError;

/// Flat-file store of raw fetch results, laid out as
/// `<root>/runs/YYYY-MM-DD/<raw file name>`.
#[derive(Debug, Clone)]
pub struct RawStore {
    root: Utf8PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFile {
    pub name: RawFileName,
    pub path: Utf8PathBuf,
}

impl RawStore {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn runs_dir(&self) -> Utf8PathBuf {
        self.root.join("runs")
    }

    pub fn day_dir(&self, date: NaiveDate) -> Utf8PathBuf {
        self.runs_dir().join(date.format("%Y-%m-%d").to_string())
    }

    pub fn raw_path(&self, name: &RawFileName) -> Utf8PathBuf {
        self.day_dir(name.date()).join(name.file_name())
    }

    /// Failure records, kept apart from the runs so reports never read them.
    pub fn failed_dir(&self) -> Utf8PathBuf {
        self.root.join("failed")
    }

    pub fn failure_path(&self, name: &RawFileName) -> Utf8PathBuf {
        self.failed_dir()
            .join(name.date().format("%Y-%m-%d").to_string())
            .join(name.file_name())
    }

    /// Records why a fetch failed, for later inspection.
    pub fn write_failure(
        &self,
        name: &RawFileName,
        error: &StatsError,
    ) -> Result<Utf8PathBuf, StatsError> {
        let path = self.failure_path(name);
        let status = match error {
            StatsError::FetchStatus { status, .. } => Some(*status),
            _ => None,
        };
        let record = json!({
            "timestamp": name.timestamp.format("%Y-%m-%dT%H:%M:%S").to_string(),
            "project": name.project,
            "package": name.package,
            "source": name.source,
            "action": name.action,
            "status": status,
            "message": error.to_string(),
        });
        let write_err = |message: String| StatsError::Write {
            path: path.to_string(),
            message,
        };
        let content = serde_json::to_vec_pretty(&record).map_err(|err| write_err(err.to_string()))?;
        write_bytes_atomic(&path, &content).map_err(|err| write_err(err.to_string()))?;
        Ok(path)
    }

    /// Persists one payload. Earlier files of the same day for the same
    /// project, package, source and action are replaced.
    pub fn write_raw(
        &self,
        payload: &Value,
        name: &RawFileName,
    ) -> Result<Utf8PathBuf, StatsError> {
        let path = self.raw_path(name);
        let write_err = |err: String| StatsError::Write {
            path: path.to_string(),
            message: err,
        };

        let day_dir = self.day_dir(name.date());
        fs::create_dir_all(day_dir.as_std_path()).map_err(|err| write_err(err.to_string()))?;

        let content = serde_json::to_vec_pretty(payload).map_err(|err| write_err(err.to_string()))?;
        write_bytes_atomic(&path, &content).map_err(|err| write_err(err.to_string()))?;

        let same_day =
            list_raw_files(day_dir.as_std_path()).map_err(|err| write_err(err.to_string()))?;
        for existing in same_day {
            if existing.name.same_series(name) && existing.path != path {
                tracing::debug!(path = %existing.path, "replacing earlier raw file of the day");
                fs::remove_file(existing.path.as_std_path())
                    .map_err(|err| write_err(err.to_string()))?;
            }
        }
        Ok(path)
    }

    /// Every raw file for a source and action anywhere under the root except
    /// the failure records, oldest first.
    pub fn discover(&self, source: Source, action: Action) -> Result<Vec<RawFile>, StatsError> {
        if !self.root.as_std_path().exists() {
            return Ok(Vec::new());
        }
        let failed_dir = self.failed_dir();
        let mut files = Vec::new();
        for path in walk_dir(self.root.as_std_path())? {
            if !path.is_file() || path.starts_with(failed_dir.as_std_path()) {
                continue;
            }
            let Some(raw) = raw_file(path) else {
                continue;
            };
            if raw.name.source == source && raw.name.action == action {
                files.push(raw);
            }
        }
        files.sort_by(|a, b| {
            a.name
                .timestamp
                .cmp(&b.name.timestamp)
                .then_with(|| a.path.cmp(&b.path))
        });
        Ok(files)
    }
}

/// Writes through a temporary file in the target directory and renames it
/// into place.
pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> io::Result<()> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or(Utf8Path::new("."));
    fs::create_dir_all(parent.as_std_path())?;
    let mut temp = Builder::new()
        .prefix(".reach-stats")
        .tempfile_in(parent.as_std_path())?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path.as_std_path()).map_err(|err| err.error)?;
    Ok(())
}

fn raw_file(path: PathBuf) -> Option<RawFile> {
    let file_name = path.file_name()?.to_str()?;
    let name: RawFileName = file_name.parse().ok()?;
    let path = Utf8PathBuf::from_path_buf(path).ok()?;
    Some(RawFile { name, path })
}

fn list_raw_files(dir: &Path) -> io::Result<Vec<RawFile>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            files.extend(raw_file(path));
        }
    }
    Ok(files)
}

fn walk_dir(root: &Path) -> Result<Vec<PathBuf>, StatsError> {
    let mut items = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(path) = stack.pop() {
        let entries = fs::read_dir(&path)
            .map_err(|err| StatsError::Filesystem(format!("{}: {err}", path.display())))?;
        for entry in entries {
            let entry = entry.map_err(|err| StatsError::Filesystem(err.to_string()))?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path.clone());
            }
            items.push(path);
        }
    }
    Ok(items)
}
