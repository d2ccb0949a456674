use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier wrapper for job postings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobPostingId(pub String);

impl std::fmt::Display for JobPostingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostingStatus {
    Draft,
    Active,
    Paused,
    Closed,
    Cancelled,
}

impl PostingStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Active => "Active",
            Self::Paused => "Paused",
            Self::Closed => "Closed",
            Self::Cancelled => "Cancelled",
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Closed => "closed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "draft" => Some(Self::Draft),
            "active" => Some(Self::Active),
            "paused" => Some(Self::Paused),
            "closed" => Some(Self::Closed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// The requisition being promoted to public. Authored elsewhere; read here only at publish time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPosting {
    pub id: JobPostingId,
    pub code: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub required_skills: Vec<String>,
    #[serde(default)]
    pub preferred_skills: Vec<String>,
    #[serde(default)]
    pub qualifications: Vec<String>,
    #[serde(default)]
    pub salary_min: Option<u32>,
    #[serde(default)]
    pub salary_max: Option<u32>,
    #[serde(default)]
    pub application_deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_published: bool,
    pub status: PostingStatus,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

impl JobPosting {
    pub fn title_or_code(&self) -> &str {
        self.title
            .as_deref()
            .filter(|title| !title.trim().is_empty())
            .unwrap_or(&self.code)
    }
}

/// Completeness verdict for one publish attempt. Never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub missing_fields: Vec<String>,
}

/// Posting snapshot returned by a successful compare-and-set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishedPosting {
    pub posting: JobPosting,
    pub published_at: DateTime<Utc>,
}

/// Distribution channel categories, used to group results for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    ContentSystem,
    JobBoard,
    SocialMedia,
    Notification,
}

impl ChannelKind {
    pub fn from_config_key(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "content" | "content_system" | "cms" => Some(Self::ContentSystem),
            "job_board" | "board" => Some(Self::JobBoard),
            "social" | "social_media" => Some(Self::SocialMedia),
            "notification" | "notify" => Some(Self::Notification),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ContentSystem => "content_system",
            Self::JobBoard => "job_board",
            Self::SocialMedia => "social_media",
            Self::Notification => "notification",
        }
    }
}

/// Classification attached to a failed channel outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelErrorKind {
    Timeout,
    Rejected,
    Unavailable,
    Malformed,
    Panicked,
}

impl ChannelErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Rejected => "rejected",
            Self::Unavailable => "unavailable",
            Self::Malformed => "malformed",
            Self::Panicked => "panicked",
        }
    }
}

/// Result of one adapter call. Owned by the run that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelOutcome {
    pub channel: String,
    pub kind: ChannelKind,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub external_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error_kind: Option<ChannelErrorKind>,
    pub duration_ms: u64,
}

impl ChannelOutcome {
    pub fn delivered(
        channel: impl Into<String>,
        kind: ChannelKind,
        external_reference: Option<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            kind,
            success: true,
            external_reference,
            error: None,
            error_kind: None,
            duration_ms: 0,
        }
    }

    pub fn failed(
        channel: impl Into<String>,
        kind: ChannelKind,
        error_kind: ChannelErrorKind,
        error: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            kind,
            success: false,
            external_reference: None,
            error: Some(error.into()),
            error_kind: Some(error_kind),
            duration_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunTrigger {
    Initial,
    Retry,
}

impl RunTrigger {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Retry => "retry",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "initial" => Some(Self::Initial),
            "retry" => Some(Self::Retry),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Immutable record of a single publish or retry attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishingRun {
    pub run_id: Uuid,
    pub job_posting_id: JobPostingId,
    pub attempted_at: DateTime<Utc>,
    pub trigger: RunTrigger,
    pub outcomes: Vec<ChannelOutcome>,
    pub summary: RunSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_labels_parse_back() {
        assert_eq!(RunTrigger::parse(RunTrigger::Retry.as_str()), Some(RunTrigger::Retry));
        assert_eq!(RunTrigger::parse("initial"), Some(RunTrigger::Initial));
        assert_eq!(RunTrigger::parse("scheduled"), None);
        assert_eq!(PostingStatus::parse("active"), Some(PostingStatus::Active));
        assert_eq!(PostingStatus::parse("published"), None);
    }
}
