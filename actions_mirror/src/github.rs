use crate::journal::Journal;
use crate::models::{JobList, Run, RunList};
use crate::{conf, BUILD_SEMVER};
use anyhow::Result;
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, trace};

/// Represents the ways reading from the GitHub Actions API can fail.
///
/// None of these are fatal to the monitor; the tick that hit one is abandoned and retried.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Failed to reach GitHub at all; network error, timeout, TLS.
    #[error("could not connect to GitHub; {0}")]
    Connection(String),

    /// GitHub answered with something other than a 2xx.
    #[error("GitHub API error {status}: {body}")]
    Api { status: u16, body: String },

    /// The response body wasn't in the shape we expected.
    #[error("could not decode GitHub response; {0}")]
    Decode(String),
}

/// The read-only view of the CI system that runs the workflow we're watching.
#[async_trait]
pub trait RunSource: Send + Sync {
    /// Returns the repository's workflow runs, most recent first.
    async fn list_runs(&self) -> Result<RunList, SourceError>;

    /// Returns the full detail record for a single run.
    async fn get_run(&self, run_id: u64) -> Result<Run, SourceError>;

    /// Returns all jobs (and their steps) for a run.
    async fn list_jobs(&self, run_id: u64) -> Result<JobList, SourceError>;
}

/// Talks to the GitHub Actions REST API with a bearer token.
pub struct GithubClient {
    client: Client,
    api_url: String,
    repo: String,
    journal: Journal,
}

impl GithubClient {
    pub fn new(conf: &conf::Github, request_timeout: Duration, journal: Journal) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", conf.token.trim()))?,
        );
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/vnd.github.v3+json"),
        );
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_str(&format!("actions-mirror/{BUILD_SEMVER}"))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            client,
            api_url: conf.api_url.trim_end_matches('/').to_string(),
            repo: conf.repo.trim().to_string(),
            journal,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/repos/{}/actions/{}", self.api_url, self.repo, path)
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, SourceError> {
        trace!(endpoint, "Sending GitHub API request");

        let response = self
            .client
            .get(endpoint)
            .send()
            .await
            .map_err(|e| SourceError::Connection(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Connection(e.to_string()))?;

        read_response(&self.journal, endpoint, status, body)
    }
}

/// Turns a GitHub response into a decoded value. Non-2xx answers become [`SourceError::Api`] and
/// bodies that don't fit `T` become [`SourceError::Decode`]. Only decoded bodies are journaled.
fn read_response<T: DeserializeOwned>(
    journal: &Journal,
    endpoint: &str,
    status: StatusCode,
    body: String,
) -> Result<T, SourceError> {
    if !status.is_success() {
        return Err(SourceError::Api {
            status: status.as_u16(),
            body,
        });
    }

    let decoded =
        serde_json::from_str::<T>(&body).map_err(|e| SourceError::Decode(e.to_string()))?;

    if let Err(err) = journal.record(endpoint, &body) {
        debug!(error = %err, endpoint, "Could not write API response to journal");
    }

    Ok(decoded)
}

#[async_trait]
impl RunSource for GithubClient {
    async fn list_runs(&self) -> Result<RunList, SourceError> {
        self.get(&self.endpoint("runs")).await
    }

    async fn get_run(&self, run_id: u64) -> Result<Run, SourceError> {
        self.get(&self.endpoint(&format!("runs/{run_id}"))).await
    }

    async fn list_jobs(&self, run_id: u64) -> Result<JobList, SourceError> {
        self.get(&self.endpoint(&format!("runs/{run_id}/jobs")))
            .await
    }
}
