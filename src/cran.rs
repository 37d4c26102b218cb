use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::Value;

use crate::domain::Source;
use crate::error::StatsError;
use crate::fetcher::{self, FetchRequest, FetchWindow, SourceFetcher};

#[derive(Clone)]
pub struct CranHttpClient {
    client: Client,
}

impl CranHttpClient {
    pub fn new() -> Result<Self, StatsError> {
        let client = fetcher::build_client(Source::Cran, Duration::from_secs(60))?;
        Ok(Self { client })
    }

    pub fn daily_url(package: &str, window: &FetchWindow) -> String {
        format!(
            "https://cranlogs.r-pkg.org/downloads/daily/{}:{}/{}",
            window.start.format("%Y-%m-%d"),
            window.end.format("%Y-%m-%d"),
            package
        )
    }
}

impl SourceFetcher for CranHttpClient {
    fn source(&self) -> Source {
        Source::Cran
    }

    fn fetch(&self, request: &FetchRequest) -> Result<Value, StatsError> {
        let url = Self::daily_url(&request.package, &request.window);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| StatsError::FetchHttp {
                origin: Source::Cran,
                message: err.to_string(),
            })?;
        fetcher::read_json(Source::Cran, response)
    }
}
