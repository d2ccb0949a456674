use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::Barrier;

use crate::workflows::publication::channels::{ChannelAdapter, ChannelRegistry};
use crate::workflows::publication::domain::{
    ChannelErrorKind, ChannelKind, ChannelOutcome, JobPosting, JobPostingId, PostingStatus,
    PublishedPosting, PublishingRun,
};
use crate::workflows::publication::fanout::FanOutExecutor;
use crate::workflows::publication::repository::{
    PostingRepository, RepositoryError, RunStore, RunStoreError, TransitionError,
};
use crate::workflows::publication::service::PublicationService;
use crate::workflows::publication::store::{InMemoryPostingRepository, InMemoryRunStore};

pub(super) const TEST_TIMEOUT: Duration = Duration::from_millis(100);

pub(super) fn posting_id(raw: &str) -> JobPostingId {
    JobPostingId(raw.to_string())
}

pub(super) fn draft_posting(id: &str) -> JobPosting {
    JobPosting {
        id: posting_id(id),
        code: format!("ENG-{}", id.to_uppercase()),
        title: Some("Payroll Systems Engineer".to_string()),
        description: Some("Own the payroll export pipeline end to end.".to_string()),
        required_skills: vec![
            "Rust".to_string(),
            "PostgreSQL".to_string(),
            "Payroll compliance".to_string(),
        ],
        preferred_skills: vec!["Kafka".to_string()],
        qualifications: vec!["5 years backend experience".to_string()],
        salary_min: Some(95_000),
        salary_max: Some(125_000),
        application_deadline: None,
        is_published: false,
        status: PostingStatus::Draft,
        published_at: None,
    }
}

pub(super) fn published_posting(id: &str, published_at: DateTime<Utc>) -> JobPosting {
    JobPosting {
        is_published: true,
        status: PostingStatus::Active,
        published_at: Some(published_at),
        ..draft_posting(id)
    }
}

#[derive(Debug, Clone)]
pub(super) enum Behavior {
    Succeed,
    Fail(ChannelErrorKind),
    Hang(Duration),
    Panic,
    /// Fails the first call, then succeeds.
    FailOnce,
}

/// Channel double that records every call and can track concurrent calls.
#[derive(Debug)]
pub(super) struct StubChannel {
    name: String,
    kind: ChannelKind,
    behavior: Behavior,
    delay: Duration,
    calls: AtomicUsize,
    tracker: Option<Arc<InFlightTracker>>,
}

impl StubChannel {
    pub(super) fn new(name: &str, kind: ChannelKind, behavior: Behavior) -> Self {
        Self {
            name: name.to_string(),
            kind,
            behavior,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            tracker: None,
        }
    }

    pub(super) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(super) fn with_tracker(mut self, tracker: Arc<InFlightTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChannelAdapter for StubChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ChannelKind {
        self.kind
    }

    async fn publish(&self, posting: &JobPosting) -> ChannelOutcome {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(tracker) = &self.tracker {
            tracker.enter();
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(tracker) = &self.tracker {
            tracker.exit();
        }

        match &self.behavior {
            Behavior::Succeed => ChannelOutcome::delivered(
                &self.name,
                self.kind,
                Some(format!("{}/{}", self.name, posting.id)),
            ),
            Behavior::Fail(kind) => {
                ChannelOutcome::failed(&self.name, self.kind, *kind, "stubbed failure")
            }
            Behavior::Hang(duration) => {
                tokio::time::sleep(*duration).await;
                ChannelOutcome::delivered(&self.name, self.kind, None)
            }
            Behavior::Panic => panic!("stub channel {} exploded", self.name),
            Behavior::FailOnce if call == 0 => ChannelOutcome::failed(
                &self.name,
                self.kind,
                ChannelErrorKind::Unavailable,
                "first call fails",
            ),
            Behavior::FailOnce => ChannelOutcome::delivered(&self.name, self.kind, None),
        }
    }
}

/// Tracks the peak number of simultaneous adapter calls.
#[derive(Debug, Default)]
pub(super) struct InFlightTracker {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlightTracker {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub(super) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

pub(super) fn as_adapters(channels: &[Arc<StubChannel>]) -> Vec<Arc<dyn ChannelAdapter>> {
    channels
        .iter()
        .map(|channel| channel.clone() as Arc<dyn ChannelAdapter>)
        .collect()
}

pub(super) fn registry_of(channels: &[Arc<StubChannel>]) -> ChannelRegistry {
    let mut registry = ChannelRegistry::new();
    for adapter in as_adapters(channels) {
        registry.register(adapter).expect("unique stub channel");
    }
    registry
}

/// The four channel categories, with the job board in slot two hanging past the timeout.
pub(super) fn four_channels_with_hanging_board() -> Vec<Arc<StubChannel>> {
    vec![
        Arc::new(StubChannel::new(
            "careers-cms",
            ChannelKind::ContentSystem,
            Behavior::Succeed,
        )),
        Arc::new(StubChannel::new(
            "indeed",
            ChannelKind::JobBoard,
            Behavior::Hang(Duration::from_secs(5)),
        )),
        Arc::new(StubChannel::new(
            "linkedin",
            ChannelKind::SocialMedia,
            Behavior::Succeed,
        )),
        Arc::new(StubChannel::new(
            "hr-inbox",
            ChannelKind::Notification,
            Behavior::Succeed,
        )),
    ]
}

pub(super) type MemoryService = PublicationService<InMemoryPostingRepository, InMemoryRunStore>;

pub(super) fn build_service(
    postings: Vec<JobPosting>,
    channels: &[Arc<StubChannel>],
) -> (Arc<MemoryService>, InMemoryPostingRepository, InMemoryRunStore) {
    let repository = InMemoryPostingRepository::with_postings(postings);
    let runs = InMemoryRunStore::default();
    let service = PublicationService::new(
        Arc::new(repository.clone()),
        Arc::new(runs.clone()),
        Arc::new(registry_of(channels)),
        FanOutExecutor::new(TEST_TIMEOUT, 4),
    );
    (Arc::new(service), repository, runs)
}

/// Repository whose reads wait until `callers` fetches are in flight, so every
/// caller observes the same snapshot before any of them attempts the transition.
pub(super) struct GatedRepository {
    inner: InMemoryPostingRepository,
    gate: Barrier,
    pub(super) draft_reads: AtomicUsize,
    pub(super) transitions: AtomicUsize,
}

impl GatedRepository {
    pub(super) fn new(inner: InMemoryPostingRepository, callers: usize) -> Self {
        Self {
            inner,
            gate: Barrier::new(callers),
            draft_reads: AtomicUsize::new(0),
            transitions: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PostingRepository for GatedRepository {
    async fn fetch(&self, id: &JobPostingId) -> Result<Option<JobPosting>, RepositoryError> {
        let posting = self.inner.fetch(id).await?;
        if posting.as_ref().is_some_and(|posting| !posting.is_published) {
            self.draft_reads.fetch_add(1, Ordering::SeqCst);
        }
        self.gate.wait().await;
        Ok(posting)
    }

    async fn try_publish(
        &self,
        id: &JobPostingId,
        now: DateTime<Utc>,
    ) -> Result<PublishedPosting, TransitionError> {
        self.transitions.fetch_add(1, Ordering::SeqCst);
        self.inner.try_publish(id, now).await
    }
}

/// Storage that can read but never commit the transition.
pub(super) struct ReadOnlyRepository {
    pub(super) inner: InMemoryPostingRepository,
}

#[async_trait]
impl PostingRepository for ReadOnlyRepository {
    async fn fetch(&self, id: &JobPostingId) -> Result<Option<JobPosting>, RepositoryError> {
        self.inner.fetch(id).await
    }

    async fn try_publish(
        &self,
        _id: &JobPostingId,
        _now: DateTime<Utc>,
    ) -> Result<PublishedPosting, TransitionError> {
        Err(RepositoryError::Unavailable("database offline".to_string()).into())
    }
}

#[derive(Default)]
pub(super) struct UnavailableRunStore {
    pub(super) attempts: Mutex<Vec<PublishingRun>>,
}

#[async_trait]
impl RunStore for UnavailableRunStore {
    async fn record(&self, run: PublishingRun) -> Result<(), RunStoreError> {
        self.attempts.lock().expect("attempts mutex").push(run);
        Err(RunStoreError::Unavailable("audit log offline".to_string()))
    }

    async fn runs_for(&self, _id: &JobPostingId) -> Result<Vec<PublishingRun>, RunStoreError> {
        Err(RunStoreError::Unavailable("audit log offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
