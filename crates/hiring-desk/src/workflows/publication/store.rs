//! In-memory storage backends. The posting map and the run log each sit behind a
//! single mutex, so the compare-and-set in `try_publish` is atomic with respect to
//! every other caller in the process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::domain::{JobPosting, JobPostingId, PostingStatus, PublishedPosting, PublishingRun};
use super::repository::{
    PostingRepository, RepositoryError, RunStore, RunStoreError, TransitionError,
};

#[derive(Debug, Default, Clone)]
pub struct InMemoryPostingRepository {
    postings: Arc<Mutex<HashMap<JobPostingId, JobPosting>>>,
}

impl InMemoryPostingRepository {
    pub fn with_postings(postings: impl IntoIterator<Item = JobPosting>) -> Self {
        let repository = Self::default();
        for posting in postings {
            repository.upsert(posting);
        }
        repository
    }

    /// Seeds or replaces a posting. Authoring lives outside this workflow; this exists
    /// for fixtures and the demo seed file.
    pub fn upsert(&self, posting: JobPosting) {
        let mut guard = self
            .postings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.insert(posting.id.clone(), posting);
    }

    pub fn len(&self) -> usize {
        self.postings
            .lock()
            .map(|guard| guard.len())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<JobPostingId, JobPosting>>, RepositoryError> {
        self.postings
            .lock()
            .map_err(|_| RepositoryError::Unavailable("posting store mutex poisoned".to_string()))
    }
}

#[async_trait]
impl PostingRepository for InMemoryPostingRepository {
    async fn fetch(&self, id: &JobPostingId) -> Result<Option<JobPosting>, RepositoryError> {
        Ok(self.lock()?.get(id).cloned())
    }

    async fn try_publish(
        &self,
        id: &JobPostingId,
        now: DateTime<Utc>,
    ) -> Result<PublishedPosting, TransitionError> {
        let mut guard = self.lock()?;
        let posting = guard.get_mut(id).ok_or(TransitionError::NotFound)?;

        if posting.is_published {
            return Err(TransitionError::AlreadyPublished {
                status: posting.status,
                published_at: posting.published_at,
            });
        }

        posting.is_published = true;
        posting.status = PostingStatus::Active;
        posting.published_at = Some(now);

        Ok(PublishedPosting {
            posting: posting.clone(),
            published_at: now,
        })
    }
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryRunStore {
    runs: Arc<Mutex<Vec<PublishingRun>>>,
}

impl InMemoryRunStore {
    fn lock(&self) -> Result<MutexGuard<'_, Vec<PublishingRun>>, RunStoreError> {
        self.runs
            .lock()
            .map_err(|_| RunStoreError::Unavailable("run store mutex poisoned".to_string()))
    }
}

#[async_trait]
impl RunStore for InMemoryRunStore {
    async fn record(&self, run: PublishingRun) -> Result<(), RunStoreError> {
        let mut guard = self.lock()?;
        if guard.iter().any(|existing| existing.run_id == run.run_id) {
            return Err(RunStoreError::Duplicate(run.run_id));
        }
        guard.push(run);
        Ok(())
    }

    async fn runs_for(&self, id: &JobPostingId) -> Result<Vec<PublishingRun>, RunStoreError> {
        Ok(self
            .lock()?
            .iter()
            .filter(|run| &run.job_posting_id == id)
            .cloned()
            .collect())
    }
}
