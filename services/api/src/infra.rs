use async_trait::async_trait;
use hiring_desk::error::AppError;
use hiring_desk::workflows::publication::{
    ChannelAdapter, ChannelErrorKind, ChannelKind, ChannelOutcome, JobPosting,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Stand-in channel for demos: answers after a fixed latency and can fail a set
/// number of times before recovering.
#[derive(Debug)]
pub(crate) struct SimulatedChannel {
    name: String,
    kind: ChannelKind,
    latency: Duration,
    failures_remaining: AtomicUsize,
    failure: ChannelErrorKind,
}

impl SimulatedChannel {
    pub(crate) fn new(name: &str, kind: ChannelKind, latency: Duration) -> Self {
        Self {
            name: name.to_string(),
            kind,
            latency,
            failures_remaining: AtomicUsize::new(0),
            failure: ChannelErrorKind::Unavailable,
        }
    }

    /// Fails the next `times` calls with `failure`.
    pub(crate) fn failing(mut self, times: usize, failure: ChannelErrorKind) -> Self {
        self.failures_remaining = AtomicUsize::new(times);
        self.failure = failure;
        self
    }
}

#[async_trait]
impl ChannelAdapter for SimulatedChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ChannelKind {
        self.kind
    }

    async fn publish(&self, posting: &JobPosting) -> ChannelOutcome {
        tokio::time::sleep(self.latency).await;

        let should_fail = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if should_fail {
            return ChannelOutcome::failed(
                &self.name,
                self.kind,
                self.failure,
                format!("{} is not accepting postings right now", self.name),
            );
        }

        info!(channel = %self.name, job_id = %posting.id, "simulated channel accepted posting");
        ChannelOutcome::delivered(
            &self.name,
            self.kind,
            Some(format!("sim://{}/{}", self.name, posting.code.to_lowercase())),
        )
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SeedFile {
    List(Vec<JobPosting>),
    Wrapped { postings: Vec<JobPosting> },
}

/// Reads postings from a JSON file holding either an array or `{ "postings": [...] }`.
pub(crate) fn load_seed(path: &Path) -> Result<Vec<JobPosting>, AppError> {
    let raw = std::fs::read_to_string(path)?;
    parse_seed(&raw).map_err(|err| AppError::Seed(format!("{}: {err}", path.display())))
}

fn parse_seed(raw: &str) -> Result<Vec<JobPosting>, serde_json::Error> {
    let seed: SeedFile = serde_json::from_str(raw)?;
    Ok(match seed {
        SeedFile::List(postings) | SeedFile::Wrapped { postings } => postings,
    })
}
