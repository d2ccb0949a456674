use std::collections::HashSet;
use std::sync::Arc;

use super::{ChannelAdapter, LogNotificationChannel, WebhookChannel};
use crate::config::{ChannelSpec, PublishingConfig};
use crate::workflows::publication::domain::ChannelKind;

/// Ordered set of channel adapters resolved once at startup.
#[derive(Debug, Clone, Default)]
pub struct ChannelRegistry {
    adapters: Vec<Arc<dyn ChannelAdapter>>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("channel '{0}' is registered more than once")]
    DuplicateChannel(String),
    #[error("at most one content system channel may be registered")]
    MultipleContentSystems,
    #[error("channel '{0}' needs an endpoint")]
    MissingEndpoint(String),
    #[error("unable to build channel http client: {0}")]
    Client(#[from] reqwest::Error),
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds webhook and log-notification adapters from configuration, sharing one
    /// HTTP client whose own timeout matches the per-channel budget.
    pub fn from_config(config: &PublishingConfig) -> Result<Self, RegistryError> {
        let client = reqwest::Client::builder()
            .timeout(config.channel_timeout)
            .build()?;
        Self::from_specs(&config.channels, client)
    }

    pub fn from_specs(
        specs: &[ChannelSpec],
        client: reqwest::Client,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for spec in specs {
            let adapter: Arc<dyn ChannelAdapter> = match (&spec.endpoint, spec.kind) {
                (Some(endpoint), kind) => Arc::new(WebhookChannel::new(
                    spec.name.clone(),
                    kind,
                    endpoint.clone(),
                    client.clone(),
                )),
                (None, ChannelKind::Notification) => {
                    Arc::new(LogNotificationChannel::new(spec.name.clone()))
                }
                (None, _) => return Err(RegistryError::MissingEndpoint(spec.name.clone())),
            };
            registry.register(adapter)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, adapter: Arc<dyn ChannelAdapter>) -> Result<(), RegistryError> {
        if self.get(adapter.name()).is_some() {
            return Err(RegistryError::DuplicateChannel(adapter.name().to_string()));
        }
        if adapter.kind() == ChannelKind::ContentSystem
            && self
                .adapters
                .iter()
                .any(|existing| existing.kind() == ChannelKind::ContentSystem)
        {
            return Err(RegistryError::MultipleContentSystems);
        }
        self.adapters.push(adapter);
        Ok(())
    }

    pub fn with(mut self, adapter: Arc<dyn ChannelAdapter>) -> Result<Self, RegistryError> {
        self.register(adapter)?;
        Ok(self)
    }

    pub fn adapters(&self) -> &[Arc<dyn ChannelAdapter>] {
        &self.adapters
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ChannelAdapter>> {
        self.adapters.iter().find(|adapter| adapter.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.adapters.iter().map(|adapter| adapter.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Splits `names` into the registered adapters, in registration order, and the
    /// names that are no longer registered.
    pub fn select(&self, names: &[String]) -> (Vec<Arc<dyn ChannelAdapter>>, Vec<String>) {
        let wanted: HashSet<&str> = names.iter().map(String::as_str).collect();
        let selected = self
            .adapters
            .iter()
            .filter(|adapter| wanted.contains(adapter.name()))
            .cloned()
            .collect();
        let unknown = names
            .iter()
            .filter(|name| self.get(name).is_none())
            .cloned()
            .collect();
        (selected, unknown)
    }
}
