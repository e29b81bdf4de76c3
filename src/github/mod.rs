use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod client;

pub use client::GitHubClient;

/// A repository on the hosting platform, written `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryRef {
    pub owner: String,
    pub name: String,
}

impl RepositoryRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepositoryRef {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self::new(owner, name))
            }
            _ => anyhow::bail!("Expected a repository as owner/name, got '{}'", s),
        }
    }
}

/// One entry of the contributors endpoint. Other fields GitHub sends are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawContributor {
    pub login: String,
    pub contributions: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request for {repo} failed: {source}")]
    Request {
        repo: RepositoryRef,
        #[source]
        source: reqwest::Error,
    },

    #[error("GitHub answered {status} for {repo}: {message}")]
    Status {
        repo: RepositoryRef,
        status: u16,
        message: String,
    },

    #[error("could not decode contributors of {repo}: {source}")]
    Decode {
        repo: RepositoryRef,
        #[source]
        source: reqwest::Error,
    },

    #[error("fetching {repo} timed out after {after:?}")]
    Timeout {
        repo: RepositoryRef,
        after: std::time::Duration,
    },

    #[error("fetch task for {repo} did not complete: {message}")]
    Join { repo: RepositoryRef, message: String },
}

/// Where raw contributor batches come from.
#[async_trait]
pub trait ContributorSource: Send + Sync {
    async fn fetch_contributors(
        &self,
        repo: &RepositoryRef,
        page_size: u32,
    ) -> Result<Vec<RawContributor>, FetchError>;
}
