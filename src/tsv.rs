//! Reading, merging and writing TSV reports.

use std::collections::BTreeMap;
use std::fs;

use camino::Utf8Path;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};

use crate::error::StatsError;
use crate::period::{PeriodKey, PeriodKind};
use crate::store::write_bytes_atomic;

const ENTITY_COLUMNS: [&str; 4] = ["project", "package", "count", "complete"];

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowKey {
    pub period: PeriodKey,
    pub project: String,
    pub package: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PeriodTotal {
    pub count: u64,
    pub complete: bool,
}

/// Report content, ordered the way it is written.
pub type ReportRows = BTreeMap<RowKey, PeriodTotal>;

#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    pub rows: ReportRows,
    /// Existing rows overwritten by a recomputed value.
    pub replaced: usize,
    /// Existing rows not touched by this run.
    pub preserved: usize,
}

pub fn header(kind: PeriodKind) -> Vec<&'static str> {
    let mut columns = vec![kind.label()];
    columns.extend(ENTITY_COLUMNS);
    columns
}

/// Loads an existing report of `year`. A missing or empty file has no rows;
/// anything that does not match the report layout, or a period of another
/// year, is a merge error.
pub fn read_report(
    path: &Utf8Path,
    kind: PeriodKind,
    year: i32,
) -> Result<ReportRows, StatsError> {
    let merge_err = |message: String| StatsError::Merge {
        path: path.to_string(),
        message,
    };
    if !path.as_std_path().exists() {
        return Ok(ReportRows::new());
    }
    let content =
        fs::read_to_string(path.as_std_path()).map_err(|err| merge_err(err.to_string()))?;
    if content.trim().is_empty() {
        return Ok(ReportRows::new());
    }

    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_reader(content.as_bytes());
    let headers = reader
        .headers()
        .map_err(|err| merge_err(err.to_string()))?
        .clone();
    let expected = header(kind);
    if headers.iter().ne(expected.iter().copied()) {
        return Err(merge_err(format!(
            "unexpected header {:?}, expected {:?}",
            headers.iter().collect::<Vec<_>>(),
            expected
        )));
    }

    let mut rows = ReportRows::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|err| merge_err(err.to_string()))?;
        let (key, total) = parse_row(&record, kind, year)
            .map_err(|message| merge_err(format!("line {}: {message}", index + 2)))?;
        if rows.insert(key, total).is_some() {
            return Err(merge_err(format!("line {}: duplicate row", index + 2)));
        }
    }
    Ok(rows)
}

fn parse_row(
    record: &StringRecord,
    kind: PeriodKind,
    year: i32,
) -> Result<(RowKey, PeriodTotal), String> {
    let [period, project, package, count, complete] = [0, 1, 2, 3, 4]
        .map(|index| record.get(index).map(str::trim).unwrap_or_default());
    if record.len() != 5 {
        return Err(format!("expected 5 fields, found {}", record.len()));
    }
    let period = PeriodKey::parse(kind, period).map_err(|err| err.to_string())?;
    if period.year() != year {
        return Err(format!("period {period} does not belong to {year}"));
    }
    if project.is_empty() || package.is_empty() {
        return Err("empty project or package".to_string());
    }
    let count = count
        .parse::<u64>()
        .map_err(|_| format!("invalid count {count:?}"))?;
    let complete = match complete {
        "true" => true,
        "false" => false,
        other => return Err(format!("invalid completeness flag {other:?}")),
    };
    Ok((
        RowKey {
            period,
            project: project.to_string(),
            package: package.to_string(),
        },
        PeriodTotal { count, complete },
    ))
}

/// Recomputed rows replace existing ones, count and completeness alike.
/// Existing rows not recomputed are kept.
pub fn merge_rows(existing: ReportRows, computed: ReportRows) -> MergeOutcome {
    let mut rows = existing;
    let preserved = rows.keys().filter(|key| !computed.contains_key(*key)).count();
    let mut replaced = 0;
    for (key, total) in computed {
        if rows.insert(key, total).is_some() {
            replaced += 1;
        }
    }
    MergeOutcome {
        rows,
        replaced,
        preserved,
    }
}

pub fn render_report(kind: PeriodKind, rows: &ReportRows) -> Result<Vec<u8>, StatsError> {
    let mut writer = WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(Vec::new());
    writer
        .write_record(header(kind))
        .map_err(|err| StatsError::Filesystem(err.to_string()))?;
    for (key, total) in rows {
        writer
            .write_record([
                key.period.to_string(),
                key.project.clone(),
                key.package.clone(),
                total.count.to_string(),
                total.complete.to_string(),
            ])
            .map_err(|err| StatsError::Filesystem(err.to_string()))?;
    }
    writer
        .into_inner()
        .map_err(|err| StatsError::Filesystem(err.to_string()))
}

pub fn write_report(
    path: &Utf8Path,
    kind: PeriodKind,
    rows: &ReportRows,
) -> Result<(), StatsError> {
    let content = render_report(kind, rows)?;
    write_bytes_atomic(path, &content)
        .map_err(|err| StatsError::Filesystem(format!("{path}: {err}")))
}
