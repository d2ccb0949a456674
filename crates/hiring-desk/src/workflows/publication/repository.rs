use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::domain::{JobPosting, JobPostingId, PostingStatus, PublishedPosting, PublishingRun};

/// Storage abstraction for postings. `try_publish` must be a single conditional write
/// at the storage layer, never a read followed by a write.
#[async_trait]
pub trait PostingRepository: Send + Sync {
    async fn fetch(&self, id: &JobPostingId) -> Result<Option<JobPosting>, RepositoryError>;

    /// Sets `status = active`, `is_published = true`, `published_at = now` only if
    /// `is_published` is still false.
    async fn try_publish(
        &self,
        id: &JobPostingId,
        now: DateTime<Utc>,
    ) -> Result<PublishedPosting, TransitionError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of a compare-and-set that did not flip the flag.
#[derive(Debug, thiserror::Error)]
pub enum TransitionError {
    #[error("job posting not found")]
    NotFound,
    #[error("job posting already published")]
    AlreadyPublished {
        status: PostingStatus,
        published_at: Option<DateTime<Utc>>,
    },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Append-only audit log of publishing runs.
#[async_trait]
pub trait RunStore: Send + Sync {
    async fn record(&self, run: PublishingRun) -> Result<(), RunStoreError>;

    /// Runs for one posting, oldest first.
    async fn runs_for(&self, id: &JobPostingId) -> Result<Vec<PublishingRun>, RunStoreError>;

    /// Channels whose most recent outcome for the posting failed.
    async fn retry_targets(&self, id: &JobPostingId) -> Result<Vec<String>, RunStoreError> {
        let runs = self.runs_for(id).await?;
        Ok(latest_failures(&runs))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RunStoreError {
    #[error("publishing run {0} already recorded")]
    Duplicate(Uuid),
    #[error("run store unavailable: {0}")]
    Unavailable(String),
}

/// Folds runs in attempt order and keeps the channels whose last word was a failure.
/// The result is sorted by channel name.
pub fn latest_failures(runs: &[PublishingRun]) -> Vec<String> {
    let mut ordered: Vec<&PublishingRun> = runs.iter().collect();
    ordered.sort_by_key(|run| run.attempted_at);

    let mut latest: BTreeMap<&str, bool> = BTreeMap::new();
    for run in ordered {
        for outcome in &run.outcomes {
            latest.insert(outcome.channel.as_str(), outcome.success);
        }
    }

    latest
        .into_iter()
        .filter(|(_, success)| !success)
        .map(|(channel, _)| channel.to_string())
        .collect()
}
