//! Period aggregation of raw stats into yearly TSV reports.
//!
//! Every report kind runs through the same driver; kinds only differ in
//! which raw files they read, how observations are extracted, how dates map
//! to periods and when a period counts as complete.

pub mod extract;

use std::collections::{BTreeMap, BTreeSet};
use std::fs;

use camino::Utf8Path;
use chrono::{Datelike, Days, NaiveDate};
use serde::Serialize;
use serde_json::Value;

use crate::domain::{Action, RawFileName, Source};
use crate::error::StatsError;
use crate::period::{PeriodKey, PeriodKind};
use crate::store::{RawFile, RawStore};
use crate::tsv::{self, PeriodTotal, ReportRows, RowKey};

pub use extract::Observation;

/// Days of traffic a GitHub response reports before its fetch day.
pub const GITHUB_WINDOW_DAYS: u64 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Bioconda,
    Pypi,
    Cran,
    GithubClones,
    GithubViews,
}

impl ReportKind {
    pub const ALL: [ReportKind; 5] = [
        ReportKind::Bioconda,
        ReportKind::Pypi,
        ReportKind::Cran,
        ReportKind::GithubClones,
        ReportKind::GithubViews,
    ];

    pub fn source(&self) -> Source {
        match self {
            ReportKind::Bioconda => Source::Bioconda,
            ReportKind::Pypi => Source::Pypi,
            ReportKind::Cran => Source::Cran,
            ReportKind::GithubClones | ReportKind::GithubViews => Source::Github,
        }
    }

    pub fn action(&self) -> Action {
        match self {
            ReportKind::GithubClones => Action::Clones,
            ReportKind::GithubViews => Action::Views,
            ReportKind::Bioconda | ReportKind::Pypi | ReportKind::Cran => Action::Downloads,
        }
    }

    pub fn period_kind(&self) -> PeriodKind {
        match self {
            ReportKind::GithubClones | ReportKind::GithubViews => PeriodKind::Week,
            ReportKind::Bioconda | ReportKind::Pypi | ReportKind::Cran => PeriodKind::Month,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ReportKind::Bioconda => "Bioconda downloads",
            ReportKind::Pypi => "PyPI downloads",
            ReportKind::Cran => "CRAN downloads",
            ReportKind::GithubClones => "GitHub clones",
            ReportKind::GithubViews => "GitHub views",
        }
    }

    /// Report file name inside `<output>/<year>/`.
    pub fn file_name(&self) -> String {
        format!("{}_{}.tsv", self.source(), self.action())
    }

    /// Whether a raw file can hold data for `year`, including the
    /// neighbouring months that decide completeness of January and December.
    pub fn includes_file(&self, name: &RawFileName, year: i32) -> bool {
        match self.period_kind() {
            PeriodKind::Month => (year - 1..=year + 1).contains(&name.date().year()),
            PeriodKind::Week => CoverageWindow::of_fetch(name.date()).overlaps_iso_year(year),
        }
    }

    pub fn extract(&self, payload: &Value) -> Result<Vec<Observation>, String> {
        match self {
            ReportKind::Bioconda => extract::bioconda(payload),
            ReportKind::Pypi => extract::pypi(payload),
            ReportKind::Cran => extract::cran(payload),
            ReportKind::GithubClones | ReportKind::GithubViews => {
                extract::github(payload, self.action())
            }
        }
    }

    fn is_complete(
        &self,
        period: PeriodKey,
        entity: &EntityData,
        present: &BTreeSet<PeriodKey>,
    ) -> bool {
        match self {
            ReportKind::Bioconda => true,
            ReportKind::Pypi | ReportKind::Cran => {
                present.contains(&period)
                    && present.contains(&period.previous())
                    && present.contains(&period.next())
            }
            ReportKind::GithubClones | ReportKind::GithubViews => {
                entity.windows.iter().any(|window| window.covers(&period))
            }
        }
    }
}

/// Inclusive range of days a GitHub traffic response reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoverageWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl CoverageWindow {
    pub fn of_fetch(date: NaiveDate) -> Self {
        Self {
            start: date - Days::new(GITHUB_WINDOW_DAYS),
            end: date,
        }
    }

    pub fn covers(&self, period: &PeriodKey) -> bool {
        period.first_day() >= self.start && period.last_day() <= self.end
    }

    pub fn overlaps_iso_year(&self, year: i32) -> bool {
        self.start.iso_week().year() <= year && self.end.iso_week().year() >= year
    }

    /// Weeks lying entirely inside the window.
    pub fn full_weeks(&self) -> Vec<PeriodKey> {
        let mut weeks = Vec::new();
        let mut week = PeriodKey::week_of(self.start);
        while week.first_day() <= self.end {
            if self.covers(&week) {
                weeks.push(week);
            }
            week = week.next();
        }
        weeks
    }
}

#[derive(Debug, Default)]
struct EntityData {
    observations: BTreeMap<NaiveDate, u64>,
    windows: Vec<CoverageWindow>,
}

/// Aggregates extracted observations into the rows of `year`.
///
/// Files are applied oldest first and a later file replaces the count of a
/// day an earlier file already reported, so overlapping re-fetches are
/// counted once. Distinct days are summed per period.
pub fn aggregate(
    kind: ReportKind,
    inputs: &[(RawFileName, Vec<Observation>)],
    year: i32,
) -> ReportRows {
    let mut ordered = inputs.iter().collect::<Vec<_>>();
    ordered.sort_by_key(|(name, _)| name.timestamp);

    let mut entities = BTreeMap::<(String, String), EntityData>::new();
    for (name, observations) in ordered {
        let entity = entities
            .entry((name.project.clone(), name.package.clone()))
            .or_default();
        entity.windows.push(CoverageWindow::of_fetch(name.date()));
        for observation in observations {
            entity.observations.insert(observation.date, observation.count);
        }
    }

    let period_kind = kind.period_kind();
    let mut rows = ReportRows::new();
    for ((project, package), entity) in entities {
        let mut totals = BTreeMap::<PeriodKey, u64>::new();
        for (date, count) in &entity.observations {
            *totals.entry(period_kind.key_for(*date)).or_default() += count;
        }
        if period_kind == PeriodKind::Week {
            // days without traffic are left out of the response
            for window in &entity.windows {
                for week in window.full_weeks() {
                    totals.entry(week).or_default();
                }
            }
        }

        let present = totals.keys().copied().collect::<BTreeSet<_>>();
        for (period, count) in totals {
            if period.year() != year {
                continue;
            }
            let complete = kind.is_complete(period, &entity, &present);
            rows.insert(
                RowKey {
                    period,
                    project: project.clone(),
                    package: package.clone(),
                },
                PeriodTotal { count, complete },
            );
        }
    }
    rows
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub kind: ReportKind,
    pub year: i32,
    pub output_path: String,
    pub files_used: usize,
    pub files_skipped: usize,
    pub rows_computed: usize,
    pub rows_replaced: usize,
    pub rows_preserved: usize,
    pub rows_written: usize,
    pub incomplete_rows: usize,
}

pub fn load_observations(kind: ReportKind, file: &RawFile) -> Result<Vec<Observation>, StatsError> {
    let parse_err = |message: String| StatsError::Parse {
        path: file.path.to_string(),
        message,
    };
    let content =
        fs::read_to_string(file.path.as_std_path()).map_err(|err| parse_err(err.to_string()))?;
    let payload: Value = serde_json::from_str(&content).map_err(|err| parse_err(err.to_string()))?;
    kind.extract(&payload).map_err(parse_err)
}

/// Builds the `year` report of one kind from the raw store and merges it
/// into the file at `output_path`.
pub fn create_report(
    kind: ReportKind,
    store: &RawStore,
    output_path: &Utf8Path,
    year: i32,
) -> Result<ReportSummary, StatsError> {
    let existing = tsv::read_report(output_path, kind.period_kind(), year)?;

    let files = store.discover(kind.source(), kind.action())?;
    let mut inputs = Vec::new();
    let mut files_skipped = 0;
    for file in files.iter().filter(|file| kind.includes_file(&file.name, year)) {
        match load_observations(kind, file) {
            Ok(observations) => inputs.push((file.name.clone(), observations)),
            Err(err) => {
                tracing::warn!(error = %err, "skipping raw file");
                files_skipped += 1;
            }
        }
    }
    if inputs.is_empty() {
        tracing::info!(report = kind.title(), year, "no raw files found");
    }

    let computed = aggregate(kind, &inputs, year);
    let rows_computed = computed.len();
    let outcome = tsv::merge_rows(existing, computed);
    tsv::write_report(output_path, kind.period_kind(), &outcome.rows)?;

    let summary = ReportSummary {
        kind,
        year,
        output_path: output_path.to_string(),
        files_used: inputs.len(),
        files_skipped,
        rows_computed,
        rows_replaced: outcome.replaced,
        rows_preserved: outcome.preserved,
        rows_written: outcome.rows.len(),
        incomplete_rows: outcome.rows.values().filter(|total| !total.complete).count(),
    };
    tracing::info!(
        report = kind.title(),
        path = %output_path,
        rows = summary.rows_written,
        incomplete = summary.incomplete_rows,
        "report written"
    );
    Ok(summary)
}
