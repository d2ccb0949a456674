use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ChannelAdapter;
use crate::workflows::publication::domain::{
    ChannelErrorKind, ChannelKind, ChannelOutcome, JobPosting,
};

/// Public view of a posting sent to external channels. Internal flags stay behind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicPostingPayload {
    pub id: String,
    pub code: String,
    pub title: String,
    pub description: String,
    pub required_skills: Vec<String>,
    pub preferred_skills: Vec<String>,
    pub qualifications: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary_min: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary_max: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_deadline: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

impl From<&JobPosting> for PublicPostingPayload {
    fn from(posting: &JobPosting) -> Self {
        Self {
            id: posting.id.0.clone(),
            code: posting.code.clone(),
            title: posting.title_or_code().to_string(),
            description: posting.description.clone().unwrap_or_default(),
            required_skills: posting.required_skills.clone(),
            preferred_skills: posting.preferred_skills.clone(),
            qualifications: posting.qualifications.clone(),
            salary_min: posting.salary_min,
            salary_max: posting.salary_max,
            application_deadline: posting.application_deadline,
            published_at: posting.published_at,
        }
    }
}

/// Acknowledgement body returned by a channel endpoint. Either field may carry the
/// external reference.
#[derive(Debug, Default, Deserialize)]
struct WebhookReceipt {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    url: Option<String>,
}

impl WebhookReceipt {
    fn reference(self) -> Option<String> {
        if let Some(url) = self.url.filter(|url| !url.is_empty()) {
            return Some(url);
        }
        match self.id {
            Some(Value::String(id)) if !id.is_empty() => Some(id),
            Some(Value::Number(id)) => Some(id.to_string()),
            _ => None,
        }
    }
}

/// Channel that POSTs the public posting as JSON to a configured endpoint. Used for
/// the content system, job boards, and social integrations alike.
#[derive(Debug, Clone)]
pub struct WebhookChannel {
    name: String,
    kind: ChannelKind,
    endpoint: String,
    client: reqwest::Client,
}

impl WebhookChannel {
    pub fn new(
        name: impl Into<String>,
        kind: ChannelKind,
        endpoint: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            endpoint: endpoint.into(),
            client,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn failure(&self, error_kind: ChannelErrorKind, error: String) -> ChannelOutcome {
        ChannelOutcome::failed(&self.name, self.kind, error_kind, error)
    }
}

#[async_trait]
impl ChannelAdapter for WebhookChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ChannelKind {
        self.kind
    }

    async fn publish(&self, posting: &JobPosting) -> ChannelOutcome {
        let payload = PublicPostingPayload::from(posting);
        let response = match self.client.post(&self.endpoint).json(&payload).send().await {
            Ok(response) => response,
            Err(err) => {
                let error_kind = if err.is_timeout() {
                    ChannelErrorKind::Timeout
                } else {
                    ChannelErrorKind::Unavailable
                };
                return self.failure(error_kind, format!("request failed: {err}"));
            }
        };

        let status = response.status();
        if status.is_client_error() {
            return self.failure(
                ChannelErrorKind::Rejected,
                format!("endpoint rejected posting with {status}"),
            );
        }
        if !status.is_success() {
            return self.failure(
                ChannelErrorKind::Unavailable,
                format!("endpoint responded with {status}"),
            );
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(err) => {
                return self.failure(
                    ChannelErrorKind::Unavailable,
                    format!("failed reading response body: {err}"),
                )
            }
        };

        if body.iter().all(u8::is_ascii_whitespace) {
            return ChannelOutcome::delivered(&self.name, self.kind, None);
        }

        match serde_json::from_slice::<WebhookReceipt>(&body) {
            Ok(receipt) => ChannelOutcome::delivered(&self.name, self.kind, receipt.reference()),
            Err(err) => self.failure(
                ChannelErrorKind::Malformed,
                format!("unreadable acknowledgement: {err}"),
            ),
        }
    }
}
