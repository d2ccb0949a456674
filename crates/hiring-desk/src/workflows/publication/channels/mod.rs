//! Distribution channels reached through one uniform capability.

mod notifier;
mod registry;
mod webhook;

use std::fmt::Debug;

use async_trait::async_trait;

use super::domain::{ChannelKind, ChannelOutcome, JobPosting};

pub use notifier::LogNotificationChannel;
pub use registry::{ChannelRegistry, RegistryError};
pub use webhook::{PublicPostingPayload, WebhookChannel};

/// One external distribution target.
///
/// Implementations fold every failure (transport errors, non-2xx responses,
/// undecodable bodies) into the returned outcome's `error` field. Calls must be
/// safe to repeat, since a retry invokes the same adapter again.
#[async_trait]
pub trait ChannelAdapter: Debug + Send + Sync {
    fn name(&self) -> &str;
    fn kind(&self) -> ChannelKind;
    async fn publish(&self, posting: &JobPosting) -> ChannelOutcome;
}
