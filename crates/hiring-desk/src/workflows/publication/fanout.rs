use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use futures::FutureExt;
use tracing::{debug, warn};

use super::channels::ChannelAdapter;
use super::domain::{ChannelErrorKind, ChannelOutcome, JobPosting};
use crate::config::PublishingConfig;

/// Runs every adapter against one posting snapshot and waits for all of them.
///
/// Calls are polled concurrently, at most `max_in_flight` at a time, each under its
/// own timeout. The timer for a call starts when it is admitted, not while it waits
/// for a slot. Outcomes come back in completion order. Dropping the returned future
/// drops every in-flight call.
#[derive(Debug, Clone, Copy)]
pub struct FanOutExecutor {
    channel_timeout: Duration,
    max_in_flight: usize,
}

impl FanOutExecutor {
    pub fn new(channel_timeout: Duration, max_in_flight: usize) -> Self {
        Self {
            channel_timeout,
            max_in_flight: max_in_flight.max(1),
        }
    }

    pub fn from_config(config: &PublishingConfig) -> Self {
        Self::new(config.channel_timeout, config.max_in_flight)
    }

    pub fn channel_timeout(&self) -> Duration {
        self.channel_timeout
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    pub async fn run(
        &self,
        posting: &JobPosting,
        adapters: &[Arc<dyn ChannelAdapter>],
    ) -> Vec<ChannelOutcome> {
        if adapters.is_empty() {
            return Vec::new();
        }

        debug!(
            job_id = %posting.id,
            channels = adapters.len(),
            max_in_flight = self.max_in_flight,
            "dispatching posting to channels"
        );

        // Futures are lazy, so each call's timer still starts at its first poll.
        let calls: Vec<_> = adapters
            .iter()
            .map(|adapter| self.dispatch(Arc::clone(adapter), posting))
            .collect();

        stream::iter(calls)
            .buffer_unordered(self.max_in_flight)
            .collect()
            .await
    }

    async fn dispatch(
        &self,
        adapter: Arc<dyn ChannelAdapter>,
        posting: &JobPosting,
    ) -> ChannelOutcome {
        let started = Instant::now();
        let call = AssertUnwindSafe(adapter.publish(posting)).catch_unwind();

        let mut outcome = match tokio::time::timeout(self.channel_timeout, call).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(payload)) => ChannelOutcome::failed(
                adapter.name(),
                adapter.kind(),
                ChannelErrorKind::Panicked,
                format!("adapter panicked: {}", panic_message(payload.as_ref())),
            ),
            Err(_) => ChannelOutcome::failed(
                adapter.name(),
                adapter.kind(),
                ChannelErrorKind::Timeout,
                format!(
                    "no response within {} ms",
                    self.channel_timeout.as_millis()
                ),
            ),
        };

        // The registry entry is authoritative for attribution and timing.
        outcome.channel = adapter.name().to_string();
        outcome.kind = adapter.kind();
        outcome.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        if outcome.success {
            outcome.error = None;
            outcome.error_kind = None;
        } else {
            if outcome.error.is_none() {
                outcome.error = Some("channel reported failure without detail".to_string());
            }
            warn!(
                channel = %outcome.channel,
                kind = outcome.kind.as_str(),
                error_kind = outcome.error_kind.map(ChannelErrorKind::as_str).unwrap_or("unclassified"),
                duration_ms = outcome.duration_ms,
                error = outcome.error.as_deref().unwrap_or_default(),
                "channel publish failed"
            );
        }

        outcome
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
