use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde_json::Value;

use crate::domain::{Action, Repository, Source};
use crate::error::StatsError;
use crate::fetcher::{self, FetchRequest, SourceFetcher};

/// Repository traffic (clones and views) from the GitHub REST API. The API
/// only reports the last 14 days.
#[derive(Clone)]
pub struct GithubHttpClient {
    client: Client,
    token: Option<String>,
    base_url: String,
}

impl GithubHttpClient {
    pub fn new(token: Option<String>) -> Result<Self, StatsError> {
        let client = fetcher::build_client(Source::Github, Duration::from_secs(30))?;
        Ok(Self {
            client,
            token,
            base_url: "https://api.github.com".to_string(),
        })
    }

    pub fn traffic_url(
        &self,
        repository: &Repository,
        action: Action,
    ) -> Result<String, StatsError> {
        let kind = match action {
            Action::Clones => "clones",
            Action::Views => "views",
            Action::Downloads => {
                return Err(StatsError::InvalidAction {
                    origin: Source::Github,
                    action: action.to_string(),
                });
            }
        };
        Ok(format!(
            "{}/repos/{}/{}/traffic/{kind}",
            self.base_url,
            repository.owner(),
            repository.name()
        ))
    }
}

impl SourceFetcher for GithubHttpClient {
    fn source(&self) -> Source {
        Source::Github
    }

    fn fetch(&self, request: &FetchRequest) -> Result<Value, StatsError> {
        let repository = request
            .repository
            .as_ref()
            .ok_or_else(|| StatsError::InvalidRepository(request.project.clone()))?;
        let url = self.traffic_url(repository, request.action)?;
        let token = self
            .token
            .as_deref()
            .ok_or(StatsError::MissingCredential("GITHUB_TOKEN"))?;
        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/vnd.github.v3+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .header(
                AUTHORIZATION,
                fetcher::header_value(Source::Github, &format!("Bearer {token}"))?,
            )
            .send()
            .map_err(|err| StatsError::FetchHttp {
                origin: Source::Github,
                message: err.to_string(),
            })?;
        fetcher::read_json(Source::Github, response)
    }
}
