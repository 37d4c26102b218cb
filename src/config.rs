use std::fs;

use camino::Utf8Path;
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};

use crate::domain::{Action, Repository, Source};
use crate::error::StatsError;
use crate::store::write_bytes_atomic;

pub const DEFAULT_ORGANIZATION: &str = "RECETOX";

/// One line of the repository list TSV.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RepositoryEntry {
    pub repository: String,
    pub project: String,
    pub package: String,
    pub source: String,
    pub action: String,
}

/// A repository list line with its source and action resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedPackage {
    pub repository: Option<Repository>,
    pub repository_raw: String,
    pub project: String,
    pub package: String,
    pub source: Source,
    pub action: Action,
}

impl RepositoryEntry {
    pub fn resolve(&self) -> Result<TrackedPackage, StatsError> {
        let source: Source = self.source.parse()?;
        let action: Action = self.action.parse()?;
        if !source.accepts(action) {
            return Err(StatsError::InvalidAction {
                origin: source,
                action: self.action.clone(),
            });
        }
        Ok(TrackedPackage {
            repository: self.repository.parse().ok(),
            repository_raw: self.repository.clone(),
            project: self.project.trim().to_string(),
            package: self.package.trim().to_string(),
            source,
            action,
        })
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load(path: &Utf8Path) -> Result<Vec<RepositoryEntry>, StatsError> {
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|_| StatsError::ConfigRead(path.as_std_path().to_path_buf()))?;
        Self::parse(&content)
    }

    /// Like [`ConfigLoader::load`], but a missing file is an empty list.
    pub fn load_or_default(path: &Utf8Path) -> Result<Vec<RepositoryEntry>, StatsError> {
        if !path.as_std_path().exists() {
            return Ok(Vec::new());
        }
        Self::load(path)
    }

    pub fn parse(content: &str) -> Result<Vec<RepositoryEntry>, StatsError> {
        let mut reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        reader
            .deserialize::<RepositoryEntry>()
            .map(|row| row.map_err(|err| StatsError::ConfigParse(err.to_string())))
            .collect()
    }

    pub fn write(path: &Utf8Path, entries: &[RepositoryEntry]) -> Result<(), StatsError> {
        let mut writer = WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(Vec::new());
        if entries.is_empty() {
            writer
                .write_record(["repository", "project", "package", "source", "action"])
                .map_err(|err| StatsError::Filesystem(err.to_string()))?;
        }
        for entry in entries {
            writer
                .serialize(entry)
                .map_err(|err| StatsError::Filesystem(err.to_string()))?;
        }
        let content = writer
            .into_inner()
            .map_err(|err| StatsError::Filesystem(err.to_string()))?;
        write_bytes_atomic(path, &content)
            .map_err(|err| StatsError::Filesystem(format!("{path}: {err}")))
    }
}

/// Which sources `add-repo` should register.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceSelection {
    pub pypi: bool,
    pub bioconda: bool,
    pub cran: bool,
    pub github: bool,
}

impl SourceSelection {
    pub fn is_empty(&self) -> bool {
        !(self.pypi || self.bioconda || self.cran || self.github)
    }
}

pub fn default_repository(project: &str) -> String {
    format!("{DEFAULT_ORGANIZATION}/{project}")
}

/// Repository list lines for a newly tracked project.
pub fn new_entries(
    repository: &str,
    project: &str,
    selection: SourceSelection,
) -> Result<Vec<RepositoryEntry>, StatsError> {
    if selection.is_empty() {
        return Err(StatsError::NoSourceSelected);
    }
    let entry = |package: String, source: Source, action: Action| RepositoryEntry {
        repository: repository.to_string(),
        project: project.to_string(),
        package,
        source: source.to_string(),
        action: action.to_string(),
    };

    let mut entries = Vec::new();
    if selection.pypi {
        entries.push(entry(project.to_string(), Source::Pypi, Action::Downloads));
    }
    if selection.bioconda {
        // R packages are published to Bioconda with an `r-` prefix
        let package = if selection.pypi {
            project.to_lowercase()
        } else {
            format!("r-{}", project.to_lowercase())
        };
        entries.push(entry(package, Source::Bioconda, Action::Downloads));
    }
    if selection.cran {
        entries.push(entry(project.to_string(), Source::Cran, Action::Downloads));
    }
    if selection.github {
        entries.push(entry(project.to_string(), Source::Github, Action::Views));
        entries.push(entry(project.to_string(), Source::Github, Action::Clones));
    }
    Ok(entries)
}

/// API credentials, read once from the environment. A missing value only
/// fails the fetches that need it.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub github_token: Option<String>,
    pub pepy_api_key: Option<String>,
}

impl Credentials {
    pub fn from_env() -> Self {
        Self {
            github_token: env_value(&["GITHUB_TOKEN", "github_token"]),
            pepy_api_key: env_value(&["PEPY_X_API_KEY", "pepy_x_api_key"]),
        }
    }
}

fn env_value(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}
