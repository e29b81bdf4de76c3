use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::github::RepositoryRef;
use crate::ranking::{RankingPolicy, DEFAULT_PAGE_SIZE};

/// Picked up from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "framework-contributors.toml";
pub const ENV_PREFIX: &str = "CONTRIB";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub github: GitHubConfig,
    pub ranking: RankingPolicy,
    pub server: ServerConfig,
    pub output: OutputConfig,
    pub repositories: Vec<RepositoryRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    pub api_url: String,
    pub user_agent: String,
    pub page_size: u32,
    pub timeout_secs: u64,
    pub max_concurrent_requests: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub default_format: String,
    pub output_file: String,
}

impl GitHubConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        let repositories = [
            ("vercel", "next.js"),
            ("remix-run", "remix"),
            ("withastro", "astro"),
            ("sveltejs", "kit"),
            ("angular", "angular"),
            ("nuxt", "framework"),
            ("gatsbyjs", "gatsby"),
            ("solidjs", "solid-start"),
            ("redwoodjs", "redwood"),
            ("facebook", "react"),
            ("preactjs", "preact"),
            ("sveltejs", "svelte"),
            ("solidjs", "solid"),
            ("QwikDev", "qwik"),
        ]
        .into_iter()
        .map(|(owner, name)| RepositoryRef::new(owner, name))
        .collect();

        Self {
            github: GitHubConfig {
                api_url: "https://api.github.com".to_string(),
                user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"))
                    .to_string(),
                page_size: DEFAULT_PAGE_SIZE,
                timeout_secs: 30,
                max_concurrent_requests: 16,
            },
            ranking: RankingPolicy::default(),
            server: ServerConfig {
                bind: "127.0.0.1:3000".to_string(),
            },
            output: OutputConfig {
                default_format: "html".to_string(),
                output_file: "framework_contributors".to_string(),
            },
            repositories,
        }
    }
}

impl Config {
    /// Layers built-in defaults, then the TOML file, then `CONTRIB__*`
    /// environment variables. An explicit `path` must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = ::config::Config::try_from(&Self::default())
            .context("Failed to serialize default configuration")?;

        let file = match path {
            Some(path) => ::config::File::from(path).required(true),
            None => ::config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let config: Self = ::config::Config::builder()
            .add_source(defaults)
            .add_source(file)
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .context("Failed to load configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        config.validate()?;
        debug!(
            "Configuration loaded: {} repositories, page size {}",
            config.repositories.len(),
            config.github.page_size
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            (1..=100).contains(&self.github.page_size),
            "github.page_size must be between 1 and 100, got {}",
            self.github.page_size
        );
        anyhow::ensure!(
            self.github.max_concurrent_requests > 0,
            "github.max_concurrent_requests must be positive"
        );
        anyhow::ensure!(
            self.github.timeout_secs > 0,
            "github.timeout_secs must be positive"
        );
        anyhow::ensure!(
            self.ranking.max_contributors > 0,
            "ranking.max_contributors must be positive"
        );
        anyhow::ensure!(
            (0.0..1.0).contains(&self.ranking.min_contributor_score),
            "ranking.min_contributor_score must be in [0, 1), got {}",
            self.ranking.min_contributor_score
        );
        Ok(())
    }
}
