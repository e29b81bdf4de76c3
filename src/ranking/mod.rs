use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::github::{ContributorSource, FetchError, RawContributor, RepositoryRef};

pub mod collector;

pub use collector::{Collector, ContributorsPage};

pub const MIN_CONTRIBUTIONS: u64 = 50;
pub const MIN_CONTRIBUTOR_SCORE: f64 = 0.05;
pub const MAX_CONTRIBUTORS: usize = 10;
pub const DEFAULT_PAGE_SIZE: u32 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredContributor {
    pub login: String,
    pub contributions: u64,
    /// Share of the fetched batch's contributions, in `0.0..=1.0`.
    pub contributor_score: f64,
}

/// Ranking result for one repository. A failed fetch is kept apart from a
/// repository whose contributors were all filtered out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RankOutcome {
    Ranked { contributors: Vec<ScoredContributor> },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryContributors {
    pub repo: RepositoryRef,
    #[serde(flatten)]
    pub outcome: RankOutcome,
}

impl RepositoryContributors {
    pub fn contributors(&self) -> &[ScoredContributor] {
        match &self.outcome {
            RankOutcome::Ranked { contributors } => contributors,
            RankOutcome::Failed { .. } => &[],
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, RankOutcome::Failed { .. })
    }
}

/// Thresholds applied after scoring. A contributor passes only when strictly
/// above both minimums.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankingPolicy {
    pub min_contributions: u64,
    pub min_contributor_score: f64,
    pub max_contributors: usize,
}

impl Default for RankingPolicy {
    fn default() -> Self {
        Self {
            min_contributions: MIN_CONTRIBUTIONS,
            min_contributor_score: MIN_CONTRIBUTOR_SCORE,
            max_contributors: MAX_CONTRIBUTORS,
        }
    }
}

impl RankingPolicy {
    fn admits(&self, contributor: &ScoredContributor) -> bool {
        contributor.contributions > self.min_contributions
            && contributor.contributor_score > self.min_contributor_score
    }
}

/// Substring heuristic for automated accounts. Human logins that merely
/// contain `-bot` or `bot-` (`talbot-smith`, `my-bottle`) are misclassified too.
pub fn is_bot_login(login: &str) -> bool {
    login.contains("[bot]") || login.contains("-bot") || login.contains("bot-")
}

/// Scores every contributor against the batch total. Returns an empty list
/// when there is nothing to divide by or the total does not fit in a `u64`.
pub fn score_batch(batch: Vec<RawContributor>) -> Vec<ScoredContributor> {
    let total = batch
        .iter()
        .try_fold(0u64, |acc, c| acc.checked_add(c.contributions));
    let total = match total {
        Some(total) if total > 0 => total,
        Some(_) => return Vec::new(),
        None => {
            warn!("Contribution total overflowed, skipping batch");
            return Vec::new();
        }
    };

    batch
        .into_iter()
        .map(|c| ScoredContributor {
            contributor_score: c.contributions as f64 / total as f64,
            login: c.login,
            contributions: c.contributions,
        })
        .collect()
}

/// Scores, drops bots, applies the thresholds and truncates, keeping the
/// order the batch arrived in.
pub fn rank_batch(policy: &RankingPolicy, batch: Vec<RawContributor>) -> Vec<ScoredContributor> {
    score_batch(batch)
        .into_iter()
        .filter(|c| !is_bot_login(&c.login))
        .filter(|c| policy.admits(c))
        .take(policy.max_contributors)
        .collect()
}

#[derive(Clone)]
pub struct ContributorRanker {
    source: Arc<dyn ContributorSource>,
    policy: RankingPolicy,
    page_size: u32,
}

impl ContributorRanker {
    pub fn new(source: Arc<dyn ContributorSource>, policy: RankingPolicy, page_size: u32) -> Self {
        Self {
            source,
            policy,
            page_size,
        }
    }

    pub async fn rank(&self, repo: &RepositoryRef) -> Result<Vec<ScoredContributor>, FetchError> {
        let batch = self
            .source
            .fetch_contributors(repo, self.page_size)
            .await?;
        let fetched = batch.len();
        let ranked = rank_batch(&self.policy, batch);
        debug!(
            "{}: {} of {} fetched contributors ranked",
            repo,
            ranked.len(),
            fetched
        );
        Ok(ranked)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    pub(crate) fn raw(login: &str, contributions: u64) -> RawContributor {
        RawContributor {
            login: login.to_string(),
            contributions,
        }
    }

    /// Serves canned batches keyed by `owner/name` and records requested page sizes.
    #[derive(Default)]
    pub(crate) struct FakeSource {
        pub batches: HashMap<String, Vec<RawContributor>>,
        pub page_sizes: Mutex<Vec<u32>>,
    }

    #[async_trait]
    impl ContributorSource for FakeSource {
        async fn fetch_contributors(
            &self,
            repo: &RepositoryRef,
            page_size: u32,
        ) -> Result<Vec<RawContributor>, FetchError> {
            self.page_sizes.lock().unwrap().push(page_size);
            self.batches
                .get(&repo.to_string())
                .cloned()
                .ok_or_else(|| FetchError::Status {
                    repo: repo.clone(),
                    status: 404,
                    message: "Not Found".to_string(),
                })
        }
    }

    #[test]
    fn scores_sum_to_one_over_unfiltered_batch() {
        let batch = vec![raw("a", 7), raw("b", 13), raw("c", 1), raw("d", 979)];
        let total: f64 = score_batch(batch).iter().map(|c| c.contributor_score).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn worked_example_excludes_low_share() {
        let batch = vec![raw("first", 100), raw("second", 40), raw("third", 860)];

        let scores: Vec<f64> = score_batch(batch.clone())
            .iter()
            .map(|c| c.contributor_score)
            .collect();
        assert!((scores[0] - 0.10).abs() < 1e-9);
        assert!((scores[1] - 0.04).abs() < 1e-9);
        assert!((scores[2] - 0.86).abs() < 1e-9);

        let ranked = rank_batch(&RankingPolicy::default(), batch);
        let logins: Vec<_> = ranked.iter().map(|c| c.login.as_str()).collect();
        assert_eq!(logins, vec!["first", "third"]);
    }

    #[test]
    fn empty_or_zero_batch_ranks_nothing() {
        assert!(rank_batch(&RankingPolicy::default(), Vec::new()).is_empty());
        assert!(score_batch(vec![raw("idle", 0), raw("also-idle", 0)]).is_empty());
    }

    #[test]
    fn overflowing_total_ranks_nothing() {
        let batch = vec![raw("huge", u64::MAX), raw("one-more", 1)];
        assert!(score_batch(batch.clone()).is_empty());
        assert!(rank_batch(&RankingPolicy::default(), batch).is_empty());

        let batch = vec![raw("huge", u64::MAX - 1), raw("one-more", 1)];
        let total: f64 = score_batch(batch).iter().map(|c| c.contributor_score).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn thresholds_are_strict() {
        // 50 fails the count; 51 of 2000 passes the count but not the share.
        let batch = vec![raw("at-count", 50), raw("low-share", 51), raw("big", 1899)];
        let ranked = rank_batch(&RankingPolicy::default(), batch);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].login, "big");

        // 60 of 1200 is exactly 0.05 and must not pass.
        let ranked = rank_batch(
            &RankingPolicy::default(),
            vec![raw("edge", 60), raw("rest", 1140)],
        );
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].login, "rest");
    }

    #[test]
    fn bot_accounts_are_removed() {
        assert!(is_bot_login("dependabot[bot]"));
        assert!(is_bot_login("vercel-release-bot"));
        assert!(is_bot_login("bot-publisher"));
        assert!(!is_bot_login("robotics"));
        assert!(!is_bot_login("Bot-Publisher"));
        assert!(!is_bot_login("abbott"));

        // Matches anywhere in the login, including human name fragments
        for login in ["renovate-bot-app", "talbot-smith", "dependabot-preview", "my-bottle"] {
            assert!(is_bot_login(login), "{login} should count as a bot");
        }

        let batch = vec![
            raw("renovate[bot]", 500),
            raw("human", 300),
            raw("ci-bot", 200),
        ];
        let ranked = rank_batch(&RankingPolicy::default(), batch);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].login, "human");
        assert!((ranked[0].contributor_score - 0.3).abs() < 1e-9);
    }

    #[test]
    fn preserves_api_order() {
        let batch = vec![raw("B", 200), raw("A", 500), raw("C", 300)];
        let ranked = rank_batch(&RankingPolicy::default(), batch);
        let logins: Vec<_> = ranked.iter().map(|c| c.login.as_str()).collect();
        assert_eq!(logins, vec!["B", "A", "C"]);
    }

    #[test]
    fn truncates_to_max_contributors() {
        let batch: Vec<_> = (0..15).map(|i| raw(&format!("dev{i}"), 100)).collect();
        let ranked = rank_batch(&RankingPolicy::default(), batch);
        assert_eq!(ranked.len(), MAX_CONTRIBUTORS);
        assert_eq!(ranked[0].login, "dev0");
        assert_eq!(ranked[9].login, "dev9");

        let policy = RankingPolicy {
            max_contributors: 3,
            min_contributor_score: 0.0,
            ..RankingPolicy::default()
        };
        let batch: Vec<_> = (0..15).map(|i| raw(&format!("dev{i}"), 100)).collect();
        assert_eq!(rank_batch(&policy, batch).len(), 3);
    }

    #[test]
    fn ranked_entries_satisfy_every_predicate() {
        let mut batch = Vec::new();
        for i in 0..30u64 {
            let login = match i % 5 {
                0 => format!("user{i}[bot]"),
                1 => format!("bot-{i}"),
                _ => format!("user{i}"),
            };
            batch.push(raw(&login, (i * 37) % 400));
        }
        let policy = RankingPolicy {
            min_contributor_score: 0.01,
            ..RankingPolicy::default()
        };
        let ranked = rank_batch(&policy, batch);
        assert!(!ranked.is_empty());
        assert!(ranked.len() <= MAX_CONTRIBUTORS);
        for c in &ranked {
            assert!(c.contributions > MIN_CONTRIBUTIONS);
            assert!(c.contributor_score > 0.01);
            assert!(!is_bot_login(&c.login));
        }
    }

    #[tokio::test]
    async fn ranker_fetches_with_configured_page_size() {
        let mut source = FakeSource::default();
        source.batches.insert(
            "sveltejs/kit".to_string(),
            vec![raw("rich-harris", 800), raw("dependabot[bot]", 150), raw("dummdidumm", 50)],
        );
        let source = Arc::new(source);
        let ranker = ContributorRanker::new(source.clone(), RankingPolicy::default(), 30);

        let ranked = ranker
            .rank(&RepositoryRef::new("sveltejs", "kit"))
            .await
            .unwrap();

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].login, "rich-harris");
        assert_eq!(*source.page_sizes.lock().unwrap(), vec![30]);
    }

    #[tokio::test]
    async fn ranker_propagates_fetch_errors() {
        let ranker =
            ContributorRanker::new(Arc::new(FakeSource::default()), RankingPolicy::default(), 30);
        let err = ranker
            .rank(&RepositoryRef::new("missing", "repo"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
    }
}
