use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::domain::Source;
use crate::error::StatsError;
use crate::fetcher::{FetchRequest, SourceFetcher};

static MONTH_COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4}-\d{2})\s+(\d+)(?:\.0+)?\s*$").unwrap());

/// Monthly conda channel downloads. The anaconda package-data set is only
/// published as Parquet, so this shells out to the `condastats` tool.
#[derive(Clone)]
pub struct SystemCondaClient {
    channel: String,
    condastats: Option<PathBuf>,
}

impl SystemCondaClient {
    pub fn new(channel: &str) -> Self {
        Self {
            channel: channel.to_string(),
            condastats: find_in_path("condastats"),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    fn run_overall(&self, program: &Path, args: &[String]) -> Result<String, StatsError> {
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|err| StatsError::ToolFailed {
                origin: Source::Bioconda,
                message: err.to_string(),
            })?;
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("command failed: {}", program.display())
        } else {
            stderr
        };
        Err(StatsError::ToolFailed {
            origin: Source::Bioconda,
            message,
        })
    }
}

impl SourceFetcher for SystemCondaClient {
    fn source(&self) -> Source {
        Source::Bioconda
    }

    fn fetch(&self, request: &FetchRequest) -> Result<Value, StatsError> {
        let program = self
            .condastats
            .as_ref()
            .ok_or_else(|| StatsError::MissingTool("condastats".to_string()))?;
        let args = vec![
            "overall".to_string(),
            request.package.clone(),
            "--data_source".to_string(),
            self.channel.clone(),
            "--start_month".to_string(),
            request.window.start_month(),
            "--end_month".to_string(),
            request.window.end_month(),
            "--monthly".to_string(),
        ];
        let stdout = self.run_overall(program, &args)?;
        Ok(monthly_payload(&request.package, &stdout))
    }
}

/// Turns the series printed by `condastats overall --monthly` into the
/// stored Bioconda payload, keyed `('<package>', 'YYYY-MM')`.
pub fn monthly_payload(package: &str, stdout: &str) -> Value {
    let mut map = Map::new();
    for line in stdout.lines() {
        let Some(caps) = MONTH_COUNT.captures(line) else {
            continue;
        };
        let Ok(count) = caps[2].parse::<u64>() else {
            continue;
        };
        map.insert(format!("('{package}', '{}')", &caps[1]), Value::from(count));
    }
    Value::Object(map)
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let exe = path.join(format!("{name}.exe"));
        if exe.exists() {
            return Some(exe);
        }
        let plain = path.join(name);
        if plain.exists() {
            return Some(plain);
        }
    }
    None
}
