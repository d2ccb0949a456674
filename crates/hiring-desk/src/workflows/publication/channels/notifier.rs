use async_trait::async_trait;
use tracing::info;

use super::ChannelAdapter;
use crate::workflows::publication::domain::{ChannelKind, ChannelOutcome, JobPosting};

/// Internal notification channel that announces the publication on the service log.
/// Stands in when no notification endpoint is configured.
#[derive(Debug, Clone)]
pub struct LogNotificationChannel {
    name: String,
}

impl LogNotificationChannel {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl ChannelAdapter for LogNotificationChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Notification
    }

    async fn publish(&self, posting: &JobPosting) -> ChannelOutcome {
        info!(
            channel = %self.name,
            job_id = %posting.id,
            job_code = %posting.code,
            title = posting.title_or_code(),
            "job posting is now public"
        );
        ChannelOutcome::delivered(
            &self.name,
            ChannelKind::Notification,
            Some(format!("{}:{}", self.name, posting.id)),
        )
    }
}
