use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::aggregate::{aggregate, ChannelResults};
use super::channels::{ChannelAdapter, ChannelRegistry};
use super::domain::{
    JobPosting, JobPostingId, PostingStatus, PublishingRun, RunSummary, RunTrigger,
};
use super::fanout::FanOutExecutor;
use super::metrics;
use super::repository::{
    PostingRepository, RepositoryError, RunStore, RunStoreError, TransitionError,
};
use super::validation::validate;

/// Orchestrates validation, the compare-and-set publish, channel fan-out, and run
/// bookkeeping for job postings.
pub struct PublicationService<P, S> {
    postings: Arc<P>,
    runs: Arc<S>,
    registry: Arc<ChannelRegistry>,
    executor: FanOutExecutor,
    retries_in_flight: Mutex<HashSet<JobPostingId>>,
}

impl<P, S> PublicationService<P, S>
where
    P: PostingRepository + 'static,
    S: RunStore + 'static,
{
    pub fn new(
        postings: Arc<P>,
        runs: Arc<S>,
        registry: Arc<ChannelRegistry>,
        executor: FanOutExecutor,
    ) -> Self {
        Self {
            postings,
            runs,
            registry,
            executor,
            retries_in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    /// Promote a draft to public and distribute it to every registered channel.
    ///
    /// The internal publication is committed before any channel is contacted and is
    /// never rolled back; channel failures only show up in the returned run.
    pub async fn publish(&self, id: &JobPostingId) -> Result<PublishReport, PublicationError> {
        let now = Utc::now();
        let result = self.publish_at(id, now).await;
        metrics::record_publish_attempt(match &result {
            Ok(_) => "published",
            Err(PublicationError::Persistence(_)) => "failed",
            Err(_) => "rejected",
        });
        result
    }

    async fn publish_at(
        &self,
        id: &JobPostingId,
        now: DateTime<Utc>,
    ) -> Result<PublishReport, PublicationError> {
        let posting = self
            .postings
            .fetch(id)
            .await?
            .ok_or(PublicationError::NotFound)?;

        // Content checks only gate drafts; a public posting reports its stored state.
        if posting.is_published {
            info!(job_id = %id, "publish refused; posting already public");
            return Err(PublicationError::AlreadyPublished {
                status: posting.status,
                published_at: posting.published_at,
            });
        }

        let validation = validate(&posting, now);
        if !validation.is_valid {
            info!(
                job_id = %id,
                missing_fields = ?validation.missing_fields,
                "publish rejected by validation"
            );
            return Err(PublicationError::Validation {
                missing_fields: validation.missing_fields,
            });
        }

        let published = self.postings.try_publish(id, now).await.map_err(|err| {
            if let TransitionError::AlreadyPublished { .. } = &err {
                info!(job_id = %id, "publish lost compare-and-set; posting already public");
            }
            PublicationError::from(err)
        })?;

        info!(
            job_id = %id,
            job_code = %published.posting.code,
            published_at = %published.published_at,
            "job posting published"
        );

        let (run, run_recorded) = self
            .dispatch(
                &published.posting,
                self.registry.adapters(),
                RunTrigger::Initial,
            )
            .await;

        Ok(PublishReport {
            posting: published.posting,
            run,
            run_recorded,
        })
    }

    /// Re-invoke only the channels whose latest outcome failed. Runs only on explicit
    /// request; nothing retries in the background.
    pub async fn retry_failed(
        &self,
        id: &JobPostingId,
    ) -> Result<PublishReport, PublicationError> {
        let _guard = RetryGuard::acquire(&self.retries_in_flight, id)?;

        let posting = self
            .postings
            .fetch(id)
            .await?
            .ok_or(PublicationError::NotFound)?;
        if !posting.is_published {
            return Err(PublicationError::NotPublished);
        }

        let targets = self.runs.retry_targets(id).await?;
        let (adapters, unregistered) = self.registry.select(&targets);
        if !unregistered.is_empty() {
            warn!(
                job_id = %id,
                channels = ?unregistered,
                "failed channels are no longer registered; skipping"
            );
        }
        if adapters.is_empty() {
            metrics::record_publish_attempt("rejected");
            return Err(PublicationError::NothingToRetry);
        }

        let (run, run_recorded) = self.dispatch(&posting, &adapters, RunTrigger::Retry).await;
        metrics::record_publish_attempt("retried");

        Ok(PublishReport {
            posting,
            run,
            run_recorded,
        })
    }

    /// Audit trail of runs for a posting, oldest first.
    pub async fn runs(&self, id: &JobPostingId) -> Result<Vec<PublishingRun>, PublicationError> {
        if self.postings.fetch(id).await?.is_none() {
            return Err(PublicationError::NotFound);
        }
        Ok(self.runs.runs_for(id).await?)
    }

    async fn dispatch(
        &self,
        posting: &JobPosting,
        adapters: &[Arc<dyn ChannelAdapter>],
        trigger: RunTrigger,
    ) -> (PublishingRun, bool) {
        let attempted_at = Utc::now();
        let outcomes = self.executor.run(posting, adapters).await;
        let run = aggregate(posting.id.clone(), trigger, attempted_at, outcomes);
        metrics::record_run(&run);

        info!(
            job_id = %posting.id,
            run_id = %run.run_id,
            trigger = run.trigger.as_str(),
            total = run.summary.total,
            succeeded = run.summary.succeeded,
            failed = run.summary.failed,
            "publishing run complete"
        );

        let recorded = match self.runs.record(run.clone()).await {
            Ok(()) => true,
            Err(err) => {
                error!(
                    job_id = %posting.id,
                    run_id = %run.run_id,
                    error = %err,
                    "failed to record publishing run"
                );
                false
            }
        };

        (run, recorded)
    }
}

/// Marks a posting as having a retry in progress so two retries cannot both
/// re-publish the same failed channel.
struct RetryGuard<'a> {
    in_flight: &'a Mutex<HashSet<JobPostingId>>,
    id: JobPostingId,
}

impl<'a> RetryGuard<'a> {
    fn acquire(
        in_flight: &'a Mutex<HashSet<JobPostingId>>,
        id: &JobPostingId,
    ) -> Result<Self, PublicationError> {
        let mut guard = in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !guard.insert(id.clone()) {
            return Err(PublicationError::RetryInProgress);
        }
        Ok(Self {
            in_flight,
            id: id.clone(),
        })
    }
}

impl Drop for RetryGuard<'_> {
    fn drop(&mut self) {
        let mut guard = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.remove(&self.id);
    }
}

/// Result of a committed publication or retry.
#[derive(Debug, Clone)]
pub struct PublishReport {
    pub posting: JobPosting,
    pub run: PublishingRun,
    pub run_recorded: bool,
}

impl PublishReport {
    pub fn response(&self) -> PublishResponse {
        PublishResponse {
            success: true,
            job_id: self.posting.id.clone(),
            job_code: self.posting.code.clone(),
            job_title: self.posting.title_or_code().to_string(),
            status: self.posting.status,
            published_at: self.posting.published_at,
            run_id: self.run.run_id,
            trigger: self.run.trigger,
            run_recorded: self.run_recorded,
            channel_results: ChannelResults::from_outcomes(&self.run.outcomes),
            summary: self.run.summary,
        }
    }
}

/// Body returned to the caller after a publish or retry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishResponse {
    pub success: bool,
    pub job_id: JobPostingId,
    pub job_code: String,
    pub job_title: String,
    pub status: PostingStatus,
    pub published_at: Option<DateTime<Utc>>,
    pub run_id: Uuid,
    pub trigger: RunTrigger,
    pub run_recorded: bool,
    pub channel_results: ChannelResults,
    pub summary: RunSummary,
}

/// Operation-level errors. Channel failures never appear here.
#[derive(Debug, thiserror::Error)]
pub enum PublicationError {
    #[error("job posting not found")]
    NotFound,
    #[error("job posting is incomplete: {}", missing_fields.join(", "))]
    Validation { missing_fields: Vec<String> },
    #[error("job posting is already published")]
    AlreadyPublished {
        status: PostingStatus,
        published_at: Option<DateTime<Utc>>,
    },
    #[error("job posting has not been published yet")]
    NotPublished,
    #[error("no failed channels left to retry")]
    NothingToRetry,
    #[error("a retry is already running for this job posting")]
    RetryInProgress,
    #[error(transparent)]
    Persistence(#[from] RepositoryError),
    #[error(transparent)]
    RunStore(#[from] RunStoreError),
}

impl From<TransitionError> for PublicationError {
    fn from(value: TransitionError) -> Self {
        match value {
            TransitionError::NotFound => Self::NotFound,
            TransitionError::AlreadyPublished {
                status,
                published_at,
            } => Self::AlreadyPublished {
                status,
                published_at,
            },
            TransitionError::Repository(err) => Self::Persistence(err),
        }
    }
}
