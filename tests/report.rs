use std::fs;

use assert_matches::assert_matches;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{Value, json};
use tempfile::TempDir;

use reach_stats::app::generate_reports;
use reach_stats::domain::{Action, RawFileName, Source};
use reach_stats::error::StatsError;
use reach_stats::report::{ReportKind, create_report};
use reach_stats::store::RawStore;

struct Workspace {
    _dir: TempDir,
    store: RawStore,
    reports: Utf8PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        Self {
            store: RawStore::new(root.join("tmp")),
            reports: root.join("reports"),
            _dir: dir,
        }
    }

    fn raw(
        &self,
        timestamp: NaiveDateTime,
        project: &str,
        package: &str,
        kind: ReportKind,
        payload: Value,
    ) {
        let name = RawFileName::new(timestamp, project, package, kind.source(), kind.action());
        self.store.write_raw(&payload, &name).unwrap();
    }

    /// Writes a report as an earlier run would have left it.
    fn existing(&self, kind: ReportKind, year: i32, content: &str) -> Utf8PathBuf {
        let path = self.report_path(kind, year);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    fn report_path(&self, kind: ReportKind, year: i32) -> Utf8PathBuf {
        self.reports.join(year.to_string()).join(kind.file_name())
    }

    fn run(&self, kind: ReportKind, year: i32) -> String {
        let path = self.report_path(kind, year);
        create_report(kind, &self.store, &path, year).unwrap();
        read(&path)
    }
}

fn read(path: &Utf8Path) -> String {
    fs::read_to_string(path).unwrap()
}

fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(6, 0, 0)
        .unwrap()
}

fn cran_days(days: &[(&str, u64)]) -> Value {
    let downloads = days
        .iter()
        .map(|(day, count)| json!({"day": day, "downloads": count}))
        .collect::<Vec<_>>();
    json!([{"package": "rcx", "downloads": downloads}])
}

fn github_days(action: &str, days: &[(&str, u64)]) -> Value {
    let entries = days
        .iter()
        .map(|(day, uniques)| {
            json!({
                "timestamp": format!("{day}T00:00:00Z"),
                "count": uniques * 3,
                "uniques": uniques
            })
        })
        .collect::<Vec<_>>();
    let mut payload = serde_json::Map::new();
    payload.insert("count".to_string(), json!(0));
    payload.insert("uniques".to_string(), json!(0));
    payload.insert(action.to_string(), Value::Array(entries));
    Value::Object(payload)
}

fn data_lines(content: &str) -> Vec<&str> {
    content.lines().skip(1).collect()
}

#[test]
fn pypi_months_need_both_neighbours() {
    let ws = Workspace::new();
    ws.raw(
        at(2025, 4, 2),
        "umsa",
        "umsa",
        ReportKind::Pypi,
        json!({
            "id": "umsa",
            "downloads": {
                "2025-01-15": {"1.0": 100},
                "2025-02-10": {"1.0": 90, "1.1": 60},
                "2025-03-05": {"1.1": 120}
            }
        }),
    );

    let content = ws.run(ReportKind::Pypi, 2025);
    assert_eq!(
        content,
        "month\tproject\tpackage\tcount\tcomplete\n\
         2025-01\tumsa\tumsa\t100\tfalse\n\
         2025-02\tumsa\tumsa\t150\ttrue\n\
         2025-03\tumsa\tumsa\t120\tfalse\n"
    );
}

#[test]
fn bioconda_months_are_always_complete() {
    let ws = Workspace::new();
    ws.raw(
        at(2025, 7, 1),
        "rcx",
        "r-rcx",
        ReportKind::Bioconda,
        json!({"('r-rcx', '2025-06')": 500}),
    );

    let content = ws.run(ReportKind::Bioconda, 2025);
    assert_eq!(data_lines(&content), vec!["2025-06\trcx\tr-rcx\t500\ttrue"]);
}

#[test]
fn cran_zero_days_count_as_present() {
    let ws = Workspace::new();
    ws.raw(
        at(2025, 7, 1),
        "rcx",
        "rcx",
        ReportKind::Cran,
        cran_days(&[
            ("2025-04-30", 0),
            ("2025-05-01", 3),
            ("2025-05-20", 4),
            ("2025-06-11", 0),
        ]),
    );

    let content = ws.run(ReportKind::Cran, 2025);
    assert_eq!(
        data_lines(&content),
        vec![
            "2025-04\trcx\trcx\t0\tfalse",
            "2025-05\trcx\trcx\t7\ttrue",
            "2025-06\trcx\trcx\t0\tfalse",
        ]
    );
}

#[test]
fn counts_are_exact_sums_across_files() {
    let ws = Workspace::new();
    let first = cran_days(&[("2025-02-01", 5), ("2025-02-02", 7)]);
    let second = cran_days(&[("2025-02-27", 11), ("2025-03-01", 2)]);
    ws.raw(at(2025, 3, 1), "rcx", "rcx", ReportKind::Cran, first);
    ws.raw(at(2025, 3, 20), "rcx", "rcx", ReportKind::Cran, second);

    let content = ws.run(ReportKind::Cran, 2025);
    assert!(data_lines(&content).contains(&"2025-02\trcx\trcx\t23\tfalse"));
}

#[test]
fn overlapping_fetches_count_each_day_once() {
    let ws = Workspace::new();
    let first = cran_days(&[("2025-02-10", 5), ("2025-02-11", 1)]);
    ws.raw(at(2025, 3, 1), "rcx", "rcx", ReportKind::Cran, first);
    ws.raw(at(2025, 3, 20), "rcx", "rcx", ReportKind::Cran, cran_days(&[("2025-02-10", 6)]));

    let content = ws.run(ReportKind::Cran, 2025);
    assert_eq!(data_lines(&content), vec!["2025-02\trcx\trcx\t7\tfalse"]);
}

#[test]
fn github_week_split_across_windows_is_incomplete() {
    let ws = Workspace::new();
    // Windows 2025-02-26..2025-03-12 and 2025-03-16..2025-03-30 both cut
    // into 2025-W11 (2025-03-10..2025-03-16).
    ws.raw(
        at(2025, 3, 12),
        "umsa",
        "umsa",
        ReportKind::GithubClones,
        github_days("clones", &[("2025-03-04", 1), ("2025-03-10", 2), ("2025-03-11", 1)]),
    );
    ws.raw(
        at(2025, 3, 30),
        "umsa",
        "umsa",
        ReportKind::GithubClones,
        github_days("clones", &[("2025-03-16", 4), ("2025-03-18", 5)]),
    );

    let content = ws.run(ReportKind::GithubClones, 2025);
    assert_eq!(
        content,
        "week\tproject\tpackage\tcount\tcomplete\n\
         2025-W10\tumsa\tumsa\t1\ttrue\n\
         2025-W11\tumsa\tumsa\t7\tfalse\n\
         2025-W12\tumsa\tumsa\t5\ttrue\n\
         2025-W13\tumsa\tumsa\t0\ttrue\n"
    );
}

#[test]
fn github_views_and_clones_are_separate_reports() {
    let ws = Workspace::new();
    ws.raw(
        at(2025, 3, 12),
        "umsa",
        "umsa",
        ReportKind::GithubViews,
        github_days("views", &[("2025-03-04", 9)]),
    );

    let clones = ws.run(ReportKind::GithubClones, 2025);
    let views = ws.run(ReportKind::GithubViews, 2025);
    assert!(data_lines(&clones).is_empty());
    assert!(data_lines(&views).contains(&"2025-W10\tumsa\tumsa\t9\ttrue"));
}

#[test]
fn rerun_is_byte_identical() {
    let ws = Workspace::new();
    let umsa = json!({"downloads": {"2025-02-10": {"1.0": 3}}});
    let rcx = json!({"downloads": {"2025-03-10": {"1.0": 8}}});
    ws.raw(at(2025, 4, 2), "umsa", "umsa", ReportKind::Pypi, umsa);
    ws.raw(at(2025, 4, 2), "rcx", "rcx", ReportKind::Pypi, rcx);

    let first = ws.run(ReportKind::Pypi, 2025);
    let second = ws.run(ReportKind::Pypi, 2025);
    assert_eq!(first, second);
}

#[test]
fn later_run_upgrades_completeness() {
    let ws = Workspace::new();
    ws.raw(
        at(2025, 3, 1),
        "umsa",
        "umsa",
        ReportKind::Pypi,
        json!({"downloads": {"2025-01-31": {"1.0": 10}, "2025-02-10": {"1.0": 20}}}),
    );
    let first = ws.run(ReportKind::Pypi, 2025);
    assert!(data_lines(&first).contains(&"2025-02\tumsa\tumsa\t20\tfalse"));

    ws.raw(
        at(2025, 4, 1),
        "umsa",
        "umsa",
        ReportKind::Pypi,
        json!({"downloads": {"2025-02-10": {"1.0": 21}, "2025-03-03": {"1.0": 4}}}),
    );
    let second = ws.run(ReportKind::Pypi, 2025);
    let lines = data_lines(&second);
    assert!(lines.contains(&"2025-02\tumsa\tumsa\t21\ttrue"));
    assert_eq!(lines.iter().filter(|line| line.starts_with("2025-02\t")).count(), 1);
}

#[test]
fn merge_keeps_rows_not_recomputed() {
    let ws = Workspace::new();
    let path = ws.existing(
        ReportKind::Pypi,
        2025,
        "month\tproject\tpackage\tcount\tcomplete\n2025-01\tretired\tretired\t42\ttrue\n",
    );
    let payload = json!({"downloads": {"2025-02-10": {"1.0": 3}}});
    ws.raw(at(2025, 4, 2), "umsa", "umsa", ReportKind::Pypi, payload);

    let summary = create_report(ReportKind::Pypi, &ws.store, &path, 2025).unwrap();
    assert_eq!(summary.rows_preserved, 1);
    assert_eq!(
        data_lines(&read(&path)),
        vec!["2025-01\tretired\tretired\t42\ttrue", "2025-02\tumsa\tumsa\t3\tfalse"]
    );
}

#[test]
fn recomputed_rows_refresh_count_and_completeness() {
    let ws = Workspace::new();
    let path = ws.existing(
        ReportKind::Pypi,
        2025,
        "month\tproject\tpackage\tcount\tcomplete\n2025-02\tumsa\tumsa\t40\ttrue\n",
    );
    let payload = json!({"downloads": {"2025-02-10": {"1.0": 55}}});
    ws.raw(at(2025, 3, 20), "umsa", "umsa", ReportKind::Pypi, payload);

    let summary = create_report(ReportKind::Pypi, &ws.store, &path, 2025).unwrap();
    assert_eq!(summary.rows_replaced, 1);
    assert_eq!(summary.rows_preserved, 0);
    assert_eq!(data_lines(&read(&path)), vec!["2025-02\tumsa\tumsa\t55\tfalse"]);
}

#[test]
fn january_completes_with_december_file() {
    let ws = Workspace::new();
    let december = json!({"downloads": {"2024-12-15": {"1.0": 9}}});
    let spring = json!({"downloads": {"2025-01-10": {"1.0": 100}, "2025-02-10": {"1.0": 150}}});
    ws.raw(at(2024, 12, 31), "umsa", "umsa", ReportKind::Pypi, december);
    ws.raw(at(2025, 3, 1), "umsa", "umsa", ReportKind::Pypi, spring);

    let content = ws.run(ReportKind::Pypi, 2025);
    assert_eq!(
        data_lines(&content),
        vec!["2025-01\tumsa\tumsa\t100\ttrue", "2025-02\tumsa\tumsa\t150\tfalse"]
    );
}

#[test]
fn december_completes_with_next_january_file() {
    let ws = Workspace::new();
    let autumn = cran_days(&[("2024-11-20", 2), ("2024-12-03", 6)]);
    ws.raw(at(2024, 12, 10), "rcx", "rcx", ReportKind::Cran, autumn);
    let first = ws.run(ReportKind::Cran, 2024);
    assert!(data_lines(&first).contains(&"2024-12\trcx\trcx\t6\tfalse"));

    ws.raw(at(2025, 1, 20), "rcx", "rcx", ReportKind::Cran, cran_days(&[("2025-01-02", 1)]));
    let second = ws.run(ReportKind::Cran, 2024);
    assert_eq!(
        data_lines(&second),
        vec!["2024-11\trcx\trcx\t2\tfalse", "2024-12\trcx\trcx\t6\ttrue"]
    );
}

#[test]
fn existing_row_of_another_year_is_a_merge_error() {
    let ws = Workspace::new();
    let content = "month\tproject\tpackage\tcount\tcomplete\n2024-11\tumsa\tumsa\t3\ttrue\n";
    let path = ws.existing(ReportKind::Pypi, 2025, content);

    let result = create_report(ReportKind::Pypi, &ws.store, &path, 2025);
    assert_matches!(result, Err(StatsError::Merge { .. }));
    assert_eq!(read(&path), content);
}

#[test]
fn no_raw_files_gives_header_only() {
    let ws = Workspace::new();
    let content = ws.run(ReportKind::Bioconda, 2025);
    assert_eq!(content, "month\tproject\tpackage\tcount\tcomplete\n");
}

#[test]
fn other_years_are_left_out() {
    let ws = Workspace::new();
    ws.raw(
        at(2025, 1, 5),
        "rcx",
        "r-rcx",
        ReportKind::Bioconda,
        json!({"('r-rcx', '2024-12')": 30, "('r-rcx', '2025-01')": 2}),
    );

    let current = ws.run(ReportKind::Bioconda, 2025);
    assert_eq!(data_lines(&current), vec!["2025-01\trcx\tr-rcx\t2\ttrue"]);
    let previous = ws.run(ReportKind::Bioconda, 2024);
    assert_eq!(data_lines(&previous), vec!["2024-12\trcx\tr-rcx\t30\ttrue"]);
}

#[test]
fn malformed_raw_file_is_skipped() {
    let ws = Workspace::new();
    ws.raw(at(2025, 7, 1), "rcx", "r-rcx", ReportKind::Bioconda, json!({"2025-06": 5}));
    let day_dir = ws.store.day_dir(NaiveDate::from_ymd_opt(2025, 7, 2).unwrap());
    fs::create_dir_all(&day_dir).unwrap();
    fs::write(
        day_dir.join("2025-07-02_06-00-00__other__other__bioconda__downloads.json"),
        "{ not json",
    )
    .unwrap();

    let path = ws.report_path(ReportKind::Bioconda, 2025);
    let summary = create_report(ReportKind::Bioconda, &ws.store, &path, 2025).unwrap();
    assert_eq!(summary.files_used, 1);
    assert_eq!(summary.files_skipped, 1);
    assert_eq!(data_lines(&read(&path)), vec!["2025-06\trcx\tr-rcx\t5\ttrue"]);
}

#[test]
fn malformed_existing_report_is_a_merge_error() {
    let ws = Workspace::new();
    let path = ws.existing(ReportKind::Pypi, 2025, "period,total\n2025-01,3\n");

    let result = create_report(ReportKind::Pypi, &ws.store, &path, 2025);
    assert_matches!(result, Err(StatsError::Merge { .. }));
    assert_eq!(read(&path), "period,total\n2025-01,3\n");
}

#[test]
fn generate_reports_writes_all_kinds() {
    let ws = Workspace::new();
    ws.raw(at(2025, 7, 1), "rcx", "r-rcx", ReportKind::Bioconda, json!({"2025-06": 5}));

    let result = generate_reports(&ws.store, &ws.reports, 2025).unwrap();
    assert_eq!(result.reports.len(), 5);
    for name in [
        "bioconda_downloads.tsv",
        "pypi_downloads.tsv",
        "cran_downloads.tsv",
        "github_clones.tsv",
        "github_views.tsv",
    ] {
        assert!(ws.reports.join("2025").join(name).exists(), "{name} missing");
    }
    let bioconda = result
        .reports
        .iter()
        .find(|report| report.kind == ReportKind::Bioconda)
        .unwrap();
    assert_eq!(bioconda.rows_written, 1);
}

#[test]
fn raw_files_from_other_sources_are_ignored() {
    let ws = Workspace::new();
    let name = RawFileName::new(at(2025, 7, 1), "rcx", "rcx", Source::Cran, Action::Downloads);
    ws.store.write_raw(&cran_days(&[("2025-06-01", 3)]), &name).unwrap();

    let content = ws.run(ReportKind::Pypi, 2025);
    assert!(data_lines(&content).is_empty());
}
