use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::domain::{
    ChannelKind, ChannelOutcome, JobPostingId, PublishingRun, RunSummary, RunTrigger,
};

impl RunSummary {
    pub fn from_outcomes(outcomes: &[ChannelOutcome]) -> Self {
        let total = outcomes.len();
        let succeeded = outcomes.iter().filter(|outcome| outcome.success).count();
        Self {
            total,
            succeeded,
            failed: total - succeeded,
        }
    }
}

/// Folds one fan-out into the immutable run record. The outcome list is taken as-is:
/// one entry per dispatched adapter.
pub fn aggregate(
    job_posting_id: JobPostingId,
    trigger: RunTrigger,
    attempted_at: DateTime<Utc>,
    outcomes: Vec<ChannelOutcome>,
) -> PublishingRun {
    let summary = RunSummary::from_outcomes(&outcomes);
    PublishingRun {
        run_id: Uuid::new_v4(),
        job_posting_id,
        attempted_at,
        trigger,
        outcomes,
        summary,
    }
}

/// Outcomes grouped by channel category for the caller. Entries within a group are
/// sorted by channel name since completion order carries no meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChannelResults {
    pub content_system: Option<ChannelOutcome>,
    pub job_boards: Vec<ChannelOutcome>,
    pub social_media: Vec<ChannelOutcome>,
    pub notifications: Vec<ChannelOutcome>,
}

impl ChannelResults {
    pub fn from_outcomes(outcomes: &[ChannelOutcome]) -> Self {
        let mut sorted: Vec<&ChannelOutcome> = outcomes.iter().collect();
        sorted.sort_by(|left, right| left.channel.cmp(&right.channel));

        let mut results = Self::default();
        for outcome in sorted {
            let outcome = outcome.clone();
            match outcome.kind {
                ChannelKind::ContentSystem => {
                    if results.content_system.is_none() {
                        results.content_system = Some(outcome);
                    }
                }
                ChannelKind::JobBoard => results.job_boards.push(outcome),
                ChannelKind::SocialMedia => results.social_media.push(outcome),
                ChannelKind::Notification => results.notifications.push(outcome),
            }
        }
        results
    }
}
