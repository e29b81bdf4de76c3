use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod config;
mod github;
mod output;
mod ranking;
mod server;

use crate::config::Config;
use crate::github::{GitHubClient, RepositoryRef};
use crate::output::Reporter;
use crate::ranking::{Collector, ContributorRanker, RankOutcome};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// GitHub API token sent as a bearer token
    #[arg(long, env = "GITHUB_API_TOKEN", hide_env_values = true, global = true)]
    github_token: Option<String>,

    /// Repository to rank as owner/name, replaces the configured list (repeatable)
    #[arg(short, long = "repo", global = true)]
    repos: Vec<RepositoryRef>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the contributors page over HTTP
    Serve {
        /// Address to listen on (defaults to server.bind)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Fetch once and write the page to a file
    Render {
        /// Output format (html, json)
        #[arg(short, long)]
        output: Option<String>,

        /// Output file (extension added when missing)
        #[arg(long)]
        output_file: Option<String>,

        /// Fail when any repository could not be ranked
        #[arg(long)]
        strict: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut config = Config::load(cli.config.as_deref())?;
    if !cli.repos.is_empty() {
        config.repositories = cli.repos.clone();
    }

    let client = GitHubClient::new(
        &config.github.api_url,
        &config.github.user_agent,
        cli.github_token.clone(),
    )?;
    if !client.is_authenticated() {
        warn!("GITHUB_API_TOKEN is not set, requests are sent unauthenticated");
    }

    let ranker = ContributorRanker::new(
        Arc::new(client),
        config.ranking,
        config.github.page_size,
    );
    let collector = Collector::new(
        ranker,
        config.github.max_concurrent_requests,
        config.github.timeout(),
    );

    match cli.command {
        Command::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            let state = Arc::new(server::AppState::new(collector, config.repositories)?);
            server::serve(&bind, state).await
        }
        Command::Render {
            output,
            output_file,
            strict,
        } => {
            let format = output.unwrap_or_else(|| config.output.default_format.clone());
            let output_file = output_file.unwrap_or_else(|| config.output.output_file.clone());
            render(&collector, &config.repositories, &format, &output_file, strict).await
        }
    }
}

async fn render(
    collector: &Collector,
    repositories: &[RepositoryRef],
    format: &str,
    output_file: &str,
    strict: bool,
) -> Result<()> {
    println!("{}", "Framework Top Contributors".bright_cyan().bold());

    let pb = ProgressBar::new(repositories.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {pos}/{len} repositories")?
            .progress_chars("=>-"),
    );
    let page = collector.collect_with_progress(repositories, &pb).await;
    pb.finish_and_clear();

    for entry in &page.repositories {
        let status = match &entry.outcome {
            RankOutcome::Failed { error } => error.red(),
            RankOutcome::Ranked { .. } => {
                format!("{} contributors", entry.contributors().len()).green()
            }
        };
        println!("  {} {}", entry.repo.to_string().bright_white(), status);
    }

    if strict {
        page.ensure_complete()?;
    }

    let reporter = Reporter::new(format, output_file);
    reporter.generate_report(&page)?;

    println!(
        "\n{} {}",
        "Render complete:".bright_green().bold(),
        reporter.output_path()
    );
    Ok(())
}
