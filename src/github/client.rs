use super::*;
use anyhow::{Context, Result};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode, Url};
use std::time::Duration;
use tracing::debug;

const GITHUB_JSON: &str = "application/vnd.github+json";

/// Contributors endpoint of the GitHub REST API.
pub struct GitHubClient {
    http: Client,
    api_url: Url,
    token: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl GitHubClient {
    pub fn new(api_url: &str, user_agent: &str, token: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        let api_url =
            Url::parse(api_url).with_context(|| format!("Invalid GitHub API URL {}", api_url))?;
        anyhow::ensure!(
            !api_url.cannot_be_a_base(),
            "GitHub API URL {} cannot carry a path",
            api_url
        );

        Ok(Self {
            http,
            api_url,
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Owner and name are percent-encoded as single path segments.
    fn contributors_url(&self, repo: &RepositoryRef) -> Url {
        let mut url = self.api_url.clone();
        // Only fails for cannot-be-a-base URLs, rejected in `new`
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend([
                "repos",
                repo.owner.as_str(),
                repo.name.as_str(),
                "contributors",
            ]);
        }
        url
    }
}

#[async_trait]
impl ContributorSource for GitHubClient {
    async fn fetch_contributors(
        &self,
        repo: &RepositoryRef,
        page_size: u32,
    ) -> Result<Vec<RawContributor>, FetchError> {
        let url = self.contributors_url(repo);
        debug!("GET {} (per_page={})", url, page_size);

        let mut request = self
            .http
            .get(url.clone())
            .header(ACCEPT, GITHUB_JSON)
            .query(&[("per_page", page_size)]);
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = request.send().await.map_err(|source| FetchError::Request {
            repo: repo.clone(),
            source,
        })?;

        let status = response.status();
        // Empty repositories answer 204 with no body
        if status == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|e| e.message)
                .unwrap_or(body);
            return Err(FetchError::Status {
                repo: repo.clone(),
                status: status.as_u16(),
                message,
            });
        }

        let batch: Vec<RawContributor> =
            response.json().await.map_err(|source| FetchError::Decode {
                repo: repo.clone(),
                source,
            })?;
        debug!("{}: received {} contributors", repo, batch.len());
        Ok(batch)
    }
}
