//! ParseHub API client
//!
//! Fetches the data of the most recent completed scraper run for a project
//! and parses it into a `Snapshot`.

use super::{FetchError, Snapshot, StatsSource};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

/// Default ParseHub REST API root
const DEFAULT_BASE_URL: &str = "https://www.parsehub.com/api/v2";

/// Client for the ParseHub "last ready run" endpoint
#[derive(Debug, Clone)]
pub struct ParseHubClient {
    /// HTTP client for making requests
    http_client: Client,
    /// Account API key, sent as the `api_key` query parameter
    api_key: String,
    /// Project whose latest run is fetched
    project_token: String,
    /// Base URL for the API (allows override for testing)
    base_url: String,
}

impl ParseHubClient {
    /// Creates a client for the given credentials against the public API
    pub fn new(api_key: impl Into<String>, project_token: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            api_key: api_key.into(),
            project_token: project_token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Replaces the API root, e.g. to point at a local stand-in server
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Replaces the underlying HTTP client
    pub fn with_client(mut self, client: Client) -> Self {
        self.http_client = client;
        self
    }

    /// URL of the latest completed run's data, without the API key
    fn data_url(&self) -> String {
        format!(
            "{}/projects/{}/last_ready_run/data",
            self.base_url, self.project_token
        )
    }

    /// Fetches and parses the latest run's data
    ///
    /// # Returns
    /// * `Ok(Snapshot)` - The parsed statistics document
    /// * `Err(FetchError::HttpError)` - Transport failure or non-success status
    /// * `Err(FetchError::ParseError)` - Body is not a statistics document
    pub async fn fetch_snapshot(&self) -> Result<Snapshot, FetchError> {
        let url = self.data_url();
        debug!(%url, "fetching statistics");

        let body = self
            .http_client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_snapshot(&body)
    }
}

#[async_trait]
impl StatsSource for ParseHubClient {
    async fn fetch(&self) -> Result<Snapshot, FetchError> {
        self.fetch_snapshot().await
    }
}

/// Parses a response body into a `Snapshot`
pub fn parse_snapshot(body: &str) -> Result<Snapshot, FetchError> {
    Ok(serde_json::from_str(body)?)
}
