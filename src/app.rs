use camino::{Utf8Path, Utf8PathBuf};
use chrono::NaiveDateTime;
use serde::Serialize;

use crate::config::{self, ConfigLoader, RepositoryEntry, SourceSelection, TrackedPackage};
use crate::domain::{RawFileName, Source};
use crate::error::StatsError;
use crate::fetcher::{FetchRequest, FetchWindow, SourceFetcher};
use crate::report::{self, ReportKind, ReportSummary};
use crate::store::RawStore;

#[derive(Debug, Clone, Serialize)]
pub struct CollectResult {
    pub run_date: String,
    pub items: Vec<CollectItem>,
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectItem {
    pub source: String,
    pub project: String,
    pub package: String,
    pub action: String,
    pub path: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateResult {
    pub year: i32,
    pub output_dir: String,
    pub reports: Vec<ReportSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddRepoResult {
    pub repository_list: String,
    pub added: Vec<RepositoryEntry>,
    pub total: usize,
}

/// Runs collection against one fetcher per source.
pub struct App<P, G, C, B> {
    store: RawStore,
    pypi: P,
    github: G,
    cran: C,
    conda: B,
}

impl<P, G, C, B> App<P, G, C, B>
where
    P: SourceFetcher,
    G: SourceFetcher,
    C: SourceFetcher,
    B: SourceFetcher,
{
    pub fn new(store: RawStore, pypi: P, github: G, cran: C, conda: B) -> Self {
        Self {
            store,
            pypi,
            github,
            cran,
            conda,
        }
    }

    pub fn store(&self) -> &RawStore {
        &self.store
    }

    fn fetcher(&self, source: Source) -> &dyn SourceFetcher {
        match source {
            Source::Pypi => &self.pypi,
            Source::Github => &self.github,
            Source::Cran => &self.cran,
            Source::Bioconda => &self.conda,
        }
    }

    /// Fetches and persists every entry of the repository list. A failing
    /// entry is logged and reported; the remaining entries still run.
    pub fn collect(&self, entries: &[RepositoryEntry], now: NaiveDateTime) -> CollectResult {
        let window = FetchWindow::trailing_year(now.date());
        let mut items = Vec::with_capacity(entries.len());

        for entry in entries {
            let outcome = entry.resolve().and_then(|tracked| {
                self.collect_one(&tracked, window, now)
                    .inspect_err(|err| self.record_failure(&tracked, now, err))
            });
            let (path, error) = match outcome {
                Ok(path) => {
                    tracing::info!(
                        source = %entry.source,
                        package = %entry.package,
                        action = %entry.action,
                        path = %path,
                        "stats collected"
                    );
                    (Some(path.to_string()), None)
                }
                Err(err) => {
                    tracing::error!(
                        source = %entry.source,
                        package = %entry.package,
                        action = %entry.action,
                        error = %err,
                        "collection failed"
                    );
                    (None, Some(err.to_string()))
                }
            };
            items.push(CollectItem {
                source: entry.source.to_lowercase(),
                project: entry.project.clone(),
                package: entry.package.clone(),
                action: entry.action.clone(),
                path,
                error,
            });
        }

        let failed = items.iter().filter(|item| item.error.is_some()).count();
        CollectResult {
            run_date: now.date().format("%Y-%m-%d").to_string(),
            succeeded: items.len() - failed,
            failed,
            items,
        }
    }

    fn record_failure(&self, tracked: &TrackedPackage, now: NaiveDateTime, error: &StatsError) {
        let name = RawFileName::new(
            now,
            &tracked.project,
            &tracked.package,
            tracked.source,
            tracked.action,
        );
        match self.store.write_failure(&name, error) {
            Ok(path) => tracing::debug!(path = %path, "failure recorded"),
            Err(err) => tracing::warn!(error = %err, "could not record failure"),
        }
    }

    pub fn collect_one(
        &self,
        tracked: &TrackedPackage,
        window: FetchWindow,
        now: NaiveDateTime,
    ) -> Result<Utf8PathBuf, StatsError> {
        if tracked.source == Source::Github && tracked.repository.is_none() {
            return Err(StatsError::InvalidRepository(tracked.repository_raw.clone()));
        }
        let request = FetchRequest {
            project: tracked.project.clone(),
            package: tracked.package.clone(),
            action: tracked.action,
            repository: tracked.repository.clone(),
            window,
        };
        let payload = self.fetcher(tracked.source).fetch(&request)?;
        let name = RawFileName::new(
            now,
            &tracked.project,
            &tracked.package,
            tracked.source,
            tracked.action,
        );
        self.store.write_raw(&payload, &name)
    }
}

/// Writes all five reports for `year` into `<output_dir>/<year>/`.
pub fn generate_reports(
    store: &RawStore,
    output_dir: &Utf8Path,
    year: i32,
) -> Result<GenerateResult, StatsError> {
    let year_dir = output_dir.join(year.to_string());
    let mut reports = Vec::with_capacity(ReportKind::ALL.len());
    for kind in ReportKind::ALL {
        let path = year_dir.join(kind.file_name());
        reports.push(report::create_report(kind, store, &path, year)?);
    }
    Ok(GenerateResult {
        year,
        output_dir: year_dir.to_string(),
        reports,
    })
}

/// Appends the entries of a newly tracked project to the repository list.
pub fn add_repository(
    repository_list: &Utf8Path,
    repository: &str,
    project: &str,
    selection: SourceSelection,
) -> Result<AddRepoResult, StatsError> {
    let added = config::new_entries(repository, project, selection)?;
    let mut entries = ConfigLoader::load_or_default(repository_list)?;
    entries.extend(added.iter().cloned());
    ConfigLoader::write(repository_list, &entries)?;
    tracing::info!(
        project,
        added = added.len(),
        path = %repository_list,
        "repository list updated"
    );
    Ok(AddRepoResult {
        repository_list: repository_list.to_string(),
        total: entries.len(),
        added,
    })
}
