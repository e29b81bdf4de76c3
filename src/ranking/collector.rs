use super::*;
use anyhow::Result;
use chrono::{DateTime, Utc};
use indicatif::ProgressBar;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Everything one page render needs, in configuration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContributorsPage {
    pub generated_at: DateTime<Utc>,
    pub repositories: Vec<RepositoryContributors>,
}

impl ContributorsPage {
    pub fn failed_count(&self) -> usize {
        self.repositories.iter().filter(|r| r.is_failed()).count()
    }

    /// Fails on the first repository whose fetch did not succeed.
    pub fn ensure_complete(&self) -> Result<()> {
        for entry in &self.repositories {
            if let RankOutcome::Failed { error } = &entry.outcome {
                anyhow::bail!("Could not rank {}: {}", entry.repo, error);
            }
        }
        Ok(())
    }
}

/// Runs one ranking per repository concurrently and gathers the outcomes.
#[derive(Clone)]
pub struct Collector {
    ranker: ContributorRanker,
    max_concurrent: usize,
    timeout: Duration,
}

impl Collector {
    pub fn new(ranker: ContributorRanker, max_concurrent: usize, timeout: Duration) -> Self {
        Self {
            ranker,
            max_concurrent: max_concurrent.max(1),
            timeout,
        }
    }

    pub async fn collect(&self, repositories: &[RepositoryRef]) -> ContributorsPage {
        self.collect_with_progress(repositories, &ProgressBar::hidden())
            .await
    }

    pub async fn collect_with_progress(
        &self,
        repositories: &[RepositoryRef],
        pb: &ProgressBar,
    ) -> ContributorsPage {
        info!("Ranking contributors of {} repositories", repositories.len());

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut join_set = JoinSet::new();

        for (index, repo) in repositories.iter().enumerate() {
            let ranker = self.ranker.clone();
            let permit = Arc::clone(&semaphore);
            let repo = repo.clone();
            let timeout = self.timeout;

            join_set.spawn(async move {
                // The semaphore is never closed, so acquire cannot fail
                let _permit = permit.acquire_owned().await.ok();
                let result = match tokio::time::timeout(timeout, ranker.rank(&repo)).await {
                    Ok(result) => result,
                    Err(_) => Err(FetchError::Timeout {
                        repo: repo.clone(),
                        after: timeout,
                    }),
                };
                (index, result)
            });
        }

        // One slot per input position; completion order does not matter
        let mut slots: Vec<Option<Result<Vec<ScoredContributor>, FetchError>>> =
            repositories.iter().map(|_| None).collect();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => warn!("Ranking task failed to join: {}", e),
            }
            pb.inc(1);
        }

        let repositories: Vec<RepositoryContributors> = repositories
            .iter()
            .zip(slots)
            .map(|(repo, slot)| {
                let result = slot.unwrap_or_else(|| {
                    Err(FetchError::Join {
                        repo: repo.clone(),
                        message: "task panicked or was cancelled".to_string(),
                    })
                });
                let outcome = match result {
                    Ok(contributors) => RankOutcome::Ranked { contributors },
                    Err(e) => {
                        warn!("{}", e);
                        RankOutcome::Failed {
                            error: e.to_string(),
                        }
                    }
                };
                RepositoryContributors {
                    repo: repo.clone(),
                    outcome,
                }
            })
            .collect();

        let page = ContributorsPage {
            generated_at: Utc::now(),
            repositories,
        };
        info!(
            "Ranked {} repositories, {} failed",
            page.repositories.len() - page.failed_count(),
            page.failed_count()
        );
        page
    }
}
