use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::StatsError;

const FILE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";
const SEPARATOR: &str = "__";

static UNSAFE_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\-]").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Pypi,
    Github,
    Cran,
    Bioconda,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Pypi => "pypi",
            Source::Github => "github",
            Source::Cran => "cran",
            Source::Bioconda => "bioconda",
        }
    }

    pub fn accepts(&self, action: Action) -> bool {
        match self {
            Source::Github => matches!(action, Action::Clones | Action::Views),
            Source::Pypi | Source::Cran | Source::Bioconda => action == Action::Downloads,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = StatsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pypi" => Ok(Source::Pypi),
            "github" => Ok(Source::Github),
            "cran" => Ok(Source::Cran),
            "bioconda" => Ok(Source::Bioconda),
            _ => Err(StatsError::InvalidSource(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Downloads,
    Clones,
    Views,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Downloads => "downloads",
            Action::Clones => "clones",
            Action::Views => "views",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = StatsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "downloads" => Ok(Action::Downloads),
            "clones" => Ok(Action::Clones),
            "views" => Ok(Action::Views),
            other => Err(StatsError::ConfigParse(format!("unknown action: {other}"))),
        }
    }
}

/// A GitHub `OWNER/REPO` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Repository {
    owner: String,
    name: String,
}

impl Repository {
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for Repository {
    type Err = StatsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let (owner, name) = trimmed
            .split_once('/')
            .ok_or_else(|| StatsError::InvalidRepository(value.to_string()))?;
        let valid = |part: &str| !part.is_empty() && !part.contains('/') && !part.contains(' ');
        if !valid(owner) || !valid(name) {
            return Err(StatsError::InvalidRepository(value.to_string()));
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}

/// Replaces everything but word characters and `-` with `_`.
pub fn sanitize_component(component: &str) -> String {
    UNSAFE_CHARS.replace_all(component, "_").into_owned()
}

/// Name of a persisted fetch result:
/// `YYYY-MM-DD_HH-MM-SS__PROJECT__PACKAGE__SOURCE__ACTION.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFileName {
    pub timestamp: NaiveDateTime,
    pub project: String,
    pub package: String,
    pub source: Source,
    pub action: Action,
}

impl RawFileName {
    pub fn new(
        timestamp: NaiveDateTime,
        project: &str,
        package: &str,
        source: Source,
        action: Action,
    ) -> Self {
        Self {
            timestamp,
            project: sanitize_component(project),
            package: sanitize_component(package),
            source,
            action,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    /// Same project, package, source and action, ignoring the timestamp.
    pub fn same_series(&self, other: &RawFileName) -> bool {
        self.project == other.project
            && self.package == other.package
            && self.source == other.source
            && self.action == other.action
    }

    pub fn file_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for RawFileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{SEPARATOR}{}{SEPARATOR}{}{SEPARATOR}{}{SEPARATOR}{}.json",
            self.timestamp.format(FILE_TIMESTAMP_FORMAT),
            self.project,
            self.package,
            self.source,
            self.action
        )
    }
}

impl FromStr for RawFileName {
    type Err = StatsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || StatsError::InvalidRawFileName(value.to_string());
        let stem = value.strip_suffix(".json").ok_or_else(invalid)?;
        let parts = stem.split(SEPARATOR).collect::<Vec<_>>();
        let [timestamp, project, package, source, action] = parts.as_slice() else {
            return Err(invalid());
        };
        if project.is_empty() || package.is_empty() {
            return Err(invalid());
        }
        let timestamp = NaiveDateTime::parse_from_str(timestamp, FILE_TIMESTAMP_FORMAT)
            .or_else(|_| {
                NaiveDate::parse_from_str(timestamp, "%Y-%m-%d")
                    .map(|date| date.and_time(chrono::NaiveTime::MIN))
            })
            .map_err(|_| invalid())?;
        Ok(Self {
            timestamp,
            project: project.to_string(),
            package: package.to_string(),
            source: source.parse().map_err(|_| invalid())?,
            action: action.parse().map_err(|_| invalid())?,
        })
    }
}
