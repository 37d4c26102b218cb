use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::domain::Source;

#[derive(Debug, Error, Diagnostic)]
pub enum StatsError {
    #[error("invalid source: {0}")]
    InvalidSource(String),

    #[error("invalid action for {origin}: {action}")]
    InvalidAction { origin: Source, action: String },

    #[error("invalid repository (expected OWNER/REPO): {0}")]
    InvalidRepository(String),

    #[error("invalid period key: {0}")]
    InvalidPeriod(String),

    #[error("not a raw stats file name: {0}")]
    InvalidRawFileName(String),

    #[error("missing credential: {0}")]
    #[diagnostic(help("export the variable before running collect-stats"))]
    MissingCredential(&'static str),

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("{origin} tool failed: {message}")]
    ToolFailed { origin: Source, message: String },

    #[error("{origin} request failed: {message}")]
    FetchHttp { origin: Source, message: String },

    #[error("{origin} returned status {status}: {message}")]
    FetchStatus {
        origin: Source,
        status: u16,
        message: String,
    },

    #[error("failed to write raw stats {path}: {message}")]
    Write { path: String, message: String },

    #[error("failed to parse raw stats {path}: {message}")]
    Parse { path: String, message: String },

    #[error("existing report {path} is unreadable: {message}")]
    #[diagnostic(help("fix or move the file away; it is never overwritten while unreadable"))]
    Merge { path: String, message: String },

    #[error("failed to read repository list at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse repository list: {0}")]
    ConfigParse(String),

    #[error("at least one source must be selected (--pypi, --bioconda, --cran or --github)")]
    NoSourceSelected,

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl StatsError {
    /// Errors raised while talking to an upstream source.
    pub fn is_fetch(&self) -> bool {
        matches!(
            self,
            StatsError::FetchHttp { .. }
                | StatsError::FetchStatus { .. }
                | StatsError::MissingCredential(_)
                | StatsError::MissingTool(_)
                | StatsError::ToolFailed { .. }
                | StatsError::InvalidRepository(_)
                | StatsError::InvalidAction { .. }
        )
    }
}
