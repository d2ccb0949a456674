use std::collections::HashSet;
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::workflows::publication::ChannelKind;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub publishing: PublishingConfig,
    pub database_url: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_format = LogFormat::parse(
            &env::var("APP_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string()),
        )?;

        let publishing = PublishingConfig::from_env()?;
        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                log_format,
            },
            publishing,
            database_url,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Pretty,
}

impl LogFormat {
    fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            other => Err(ConfigError::InvalidLogFormat(other.to_string())),
        }
    }
}

/// Fan-out limits and the ordered set of distribution channels resolved at startup.
#[derive(Debug, Clone)]
pub struct PublishingConfig {
    pub channel_timeout: Duration,
    pub max_in_flight: usize,
    pub channels: Vec<ChannelSpec>,
}

impl Default for PublishingConfig {
    fn default() -> Self {
        Self {
            channel_timeout: Duration::from_millis(5_000),
            max_in_flight: 4,
            channels: Vec::new(),
        }
    }
}

impl PublishingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let channel_timeout = match env::var("PUBLISH_CHANNEL_TIMEOUT_MS") {
            Ok(raw) => match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => Duration::from_millis(ms),
                _ => return Err(ConfigError::InvalidChannelTimeout(raw)),
            },
            Err(_) => defaults.channel_timeout,
        };

        let max_in_flight = match env::var("PUBLISH_MAX_IN_FLIGHT") {
            Ok(raw) => match raw.trim().parse::<usize>() {
                Ok(limit) if limit > 0 => limit,
                _ => return Err(ConfigError::InvalidMaxInFlight(raw)),
            },
            Err(_) => defaults.max_in_flight,
        };

        let channels = match env::var("PUBLISH_CHANNELS") {
            Ok(raw) => parse_channel_specs(&raw)?,
            Err(_) => defaults.channels,
        };

        Ok(Self {
            channel_timeout,
            max_in_flight,
            channels,
        })
    }
}

/// One configured channel: `kind:name` or `kind:name=endpoint`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSpec {
    pub kind: ChannelKind,
    pub name: String,
    pub endpoint: Option<String>,
}

impl ChannelSpec {
    pub fn parse(entry: &str) -> Result<Self, ConfigError> {
        let entry = entry.trim();
        let invalid = |reason: &str| ConfigError::InvalidChannel {
            entry: entry.to_string(),
            reason: reason.to_string(),
        };

        let (kind, rest) = entry
            .split_once(':')
            .ok_or_else(|| invalid("expected kind:name"))?;
        let kind = ChannelKind::from_config_key(kind.trim())
            .ok_or_else(|| invalid("unknown channel kind"))?;

        let (name, endpoint) = match rest.split_once('=') {
            Some((name, endpoint)) => (name.trim(), Some(endpoint.trim())),
            None => (rest.trim(), None),
        };

        if name.is_empty() {
            return Err(invalid("channel name is empty"));
        }
        if endpoint.is_some_and(str::is_empty) {
            return Err(invalid("endpoint is empty"));
        }
        if endpoint.is_none() && kind != ChannelKind::Notification {
            return Err(invalid("only notification channels may omit an endpoint"));
        }

        Ok(Self {
            kind,
            name: name.to_string(),
            endpoint: endpoint.map(str::to_string),
        })
    }
}

pub fn parse_channel_specs(raw: &str) -> Result<Vec<ChannelSpec>, ConfigError> {
    let specs = raw
        .split(',')
        .filter(|entry| !entry.trim().is_empty())
        .map(ChannelSpec::parse)
        .collect::<Result<Vec<_>, _>>()?;

    let mut seen = HashSet::new();
    for spec in &specs {
        if !seen.insert(spec.name.as_str()) {
            return Err(ConfigError::DuplicateChannel(spec.name.clone()));
        }
    }

    let content_systems = specs
        .iter()
        .filter(|spec| spec.kind == ChannelKind::ContentSystem)
        .count();
    if content_systems > 1 {
        return Err(ConfigError::MultipleContentSystems);
    }

    Ok(specs)
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidLogFormat(String),
    InvalidChannelTimeout(String),
    InvalidMaxInFlight(String),
    InvalidChannel { entry: String, reason: String },
    DuplicateChannel(String),
    MultipleContentSystems,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidLogFormat(value) => {
                write!(f, "APP_LOG_FORMAT '{value}' must be compact or pretty")
            }
            ConfigError::InvalidChannelTimeout(value) => write!(
                f,
                "PUBLISH_CHANNEL_TIMEOUT_MS '{value}' must be a positive number of milliseconds"
            ),
            ConfigError::InvalidMaxInFlight(value) => {
                write!(f, "PUBLISH_MAX_IN_FLIGHT '{value}' must be a positive integer")
            }
            ConfigError::InvalidChannel { entry, reason } => {
                write!(f, "invalid PUBLISH_CHANNELS entry '{entry}': {reason}")
            }
            ConfigError::DuplicateChannel(name) => {
                write!(f, "channel '{name}' is configured more than once")
            }
            ConfigError::MultipleContentSystems => {
                write!(f, "at most one content system channel may be configured")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
