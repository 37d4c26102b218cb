use std::io::{self, Write};

use serde::Serialize;

use crate::app::{AddRepoResult, CollectResult, GenerateResult};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Human,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_add_repo(result: &AddRepoResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_collect(result: &CollectResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_generate(result: &GenerateResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub struct HumanOutput;

impl HumanOutput {
    pub fn print_add_repo(result: &AddRepoResult) -> io::Result<()> {
        let mut stdout = io::stdout();
        for entry in &result.added {
            writeln!(
                stdout,
                "added {} {} ({} {})",
                entry.source, entry.package, entry.action, entry.repository
            )?;
        }
        writeln!(
            stdout,
            "{} entries in {}",
            result.total, result.repository_list
        )
    }

    pub fn print_collect(result: &CollectResult) -> io::Result<()> {
        let mut stdout = io::stdout();
        for item in &result.items {
            match (&item.path, &item.error) {
                (Some(path), _) => {
                    writeln!(stdout, "ok     {:<9} {:<24} {}", item.source, item.package, path)?
                }
                (None, Some(error)) => {
                    writeln!(stdout, "failed {:<9} {:<24} {}", item.source, item.package, error)?
                }
                (None, None) => {}
            }
        }
        writeln!(
            stdout,
            "{}: {} collected, {} failed",
            result.run_date, result.succeeded, result.failed
        )
    }

    pub fn print_generate(result: &GenerateResult) -> io::Result<()> {
        let mut stdout = io::stdout();
        for report in &result.reports {
            writeln!(
                stdout,
                "{:<24} {} rows ({} incomplete) from {} files",
                report.output_path, report.rows_written, report.incomplete_rows, report.files_used
            )?;
            if report.files_skipped > 0 {
                writeln!(stdout, "  skipped {} unreadable raw files", report.files_skipped)?;
            }
        }
        Ok(())
    }
}
