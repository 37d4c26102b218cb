use std::time::Duration;

use chrono::{Datelike, Days, NaiveDate};
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;
use serde_json::Value;

use crate::domain::{Action, Repository, Source};
use crate::error::StatsError;

/// Inclusive date range a collection run asks the sources for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FetchWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl FetchWindow {
    /// From one year back to the last day of the previous month.
    pub fn trailing_year(today: NaiveDate) -> Self {
        let first_of_month = today - Days::new(u64::from(today.day0()));
        Self {
            start: today - Days::new(365),
            end: first_of_month - Days::new(1),
        }
    }

    pub fn start_month(&self) -> String {
        self.start.format("%Y-%m").to_string()
    }

    pub fn end_month(&self) -> String {
        self.end.format("%Y-%m").to_string()
    }
}

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub project: String,
    pub package: String,
    pub action: Action,
    pub repository: Option<Repository>,
    pub window: FetchWindow,
}

pub trait SourceFetcher: Send + Sync {
    fn source(&self) -> Source;
    fn fetch(&self, request: &FetchRequest) -> Result<Value, StatsError>;
}

pub(crate) fn build_client(origin: Source, timeout: Duration) -> Result<Client, StatsError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&format!("reach-stats/{}", env!("CARGO_PKG_VERSION")))
            .map_err(|err| StatsError::FetchHttp {
                origin,
                message: err.to_string(),
            })?,
    );
    Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .map_err(|err| StatsError::FetchHttp {
            origin,
            message: err.to_string(),
        })
}

pub(crate) fn handle_status(origin: Source, response: Response) -> Result<Response, StatsError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let message = response
        .text()
        .unwrap_or_else(|_| format!("{origin} request failed"));
    Err(StatsError::FetchStatus {
        origin,
        status,
        message,
    })
}

pub(crate) fn read_json(origin: Source, response: Response) -> Result<Value, StatsError> {
    let response = handle_status(origin, response)?;
    response.json().map_err(|err| StatsError::FetchHttp {
        origin,
        message: err.to_string(),
    })
}

pub(crate) fn header_value(origin: Source, value: &str) -> Result<HeaderValue, StatsError> {
    HeaderValue::from_str(value).map_err(|err| StatsError::FetchHttp {
        origin,
        message: err.to_string(),
    })
}
