//! Job posting publication: promotes a draft requisition to public exactly once and
//! distributes it to the registered channels.
//!
//! Flow: [`validation::validate`] gates the attempt, [`PostingRepository::try_publish`]
//! flips the posting with a storage-level compare-and-set, [`FanOutExecutor`] calls
//! every [`ChannelAdapter`] concurrently under per-channel timeouts, and
//! [`aggregate()`] folds the outcomes into a [`PublishingRun`] that the [`RunStore`]
//! appends. Channel failures never undo the internal publication.

pub mod aggregate;
pub mod channels;
pub mod domain;
pub mod fanout;
pub mod metrics;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod repository;
pub mod router;
pub mod service;
pub mod store;
pub mod validation;

#[cfg(test)]
mod tests;

pub use aggregate::{aggregate, ChannelResults};
pub use channels::{
    ChannelAdapter, ChannelRegistry, LogNotificationChannel, PublicPostingPayload,
    RegistryError, WebhookChannel,
};
pub use domain::{
    ChannelErrorKind, ChannelKind, ChannelOutcome, JobPosting, JobPostingId, PostingStatus,
    PublishedPosting, PublishingRun, RunSummary, RunTrigger, ValidationResult,
};
pub use fanout::FanOutExecutor;
#[cfg(feature = "postgres")]
pub use postgres::PgPublicationStore;
pub use repository::{
    latest_failures, PostingRepository, RepositoryError, RunStore, RunStoreError,
    TransitionError,
};
pub use router::publication_router;
pub use service::{PublicationError, PublicationService, PublishReport, PublishResponse};
pub use store::{InMemoryPostingRepository, InMemoryRunStore};
pub use validation::validate;
