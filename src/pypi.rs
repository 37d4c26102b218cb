use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::Value;

use crate::domain::Source;
use crate::error::StatsError;
use crate::fetcher::{self, FetchRequest, SourceFetcher};

const PEPY_BASE_URL: &str = "https://api.pepy.tech/api/v2/projects";

/// PyPI download counts through the pepy.tech API.
#[derive(Clone)]
pub struct PypiHttpClient {
    client: Client,
    api_key: Option<String>,
}

impl PypiHttpClient {
    pub fn new(api_key: Option<String>) -> Result<Self, StatsError> {
        let client = fetcher::build_client(Source::Pypi, Duration::from_secs(30))?;
        Ok(Self { client, api_key })
    }

    pub fn project_url(package: &str) -> String {
        format!("{PEPY_BASE_URL}/{package}")
    }
}

impl SourceFetcher for PypiHttpClient {
    fn source(&self) -> Source {
        Source::Pypi
    }

    fn fetch(&self, request: &FetchRequest) -> Result<Value, StatsError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(StatsError::MissingCredential("PEPY_X_API_KEY"))?;
        let response = self
            .client
            .get(Self::project_url(&request.package))
            .header("X-API-Key", fetcher::header_value(Source::Pypi, api_key)?)
            .send()
            .map_err(|err| StatsError::FetchHttp {
                origin: Source::Pypi,
                message: err.to_string(),
            })?;
        fetcher::read_json(Source::Pypi, response)
    }
}
