//! Runtime configuration for the replication pipeline.
//!
//! Every value comes from the environment. Parsing goes through
//! [`Settings::from_lookup`] so callers and tests can supply their own source.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::util::is_http_url;

pub const DEFAULT_FEED_BASE_URL: &str = "https://query.ampre.ca/odata";
pub const DEFAULT_DB_PATH: &str = "swipe.db";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Upstream feed connection settings.
#[derive(Clone, PartialEq, Eq)]
pub struct FeedConfig {
    pub base_url: String,
    pub access_token: String,
    pub request_timeout: Duration,
    /// `$top` for media queries.
    pub media_limit: u32,
    /// Optional `ImageSizeDescription` filter for media queries.
    pub media_size_description: Option<String>,
}

impl FeedConfig {
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            request_timeout: Duration::from_secs(30),
            media_limit: 50,
            media_size_description: None,
        }
    }
}

impl fmt::Debug for FeedConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("FeedConfig")
            .field("base_url", &self.base_url)
            .field("access_token", &"[REDACTED]")
            .field("request_timeout", &self.request_timeout)
            .field("media_limit", &self.media_limit)
            .field("media_size_description", &self.media_size_description)
            .finish()
    }
}

/// How far the cursor may move after a page with write failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CursorPolicy {
    /// Advance only past the leading run of settled records and stop the
    /// cycle at the first failed write.
    #[default]
    DurablePrefix,
    /// Advance to the page's last record regardless of write failures.
    LastRecord,
}

impl CursorPolicy {
    pub const fn label(self) -> &'static str {
        match self {
            Self::DurablePrefix => "durable-prefix",
            Self::LastRecord => "last-record",
        }
    }
}

impl FromStr for CursorPolicy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "durable-prefix" => Ok(Self::DurablePrefix),
            "last-record" => Ok(Self::LastRecord),
            other => Err(ConfigError::Invalid(format!(
                "REPLICATION_CURSOR_POLICY must be `durable-prefix` or `last-record`, got `{other}`"
            ))),
        }
    }
}

/// Replication driver and sweeper tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplicationConfig {
    pub page_size: usize,
    pub concurrency_limit: usize,
    pub sweep_batch_size: usize,
    pub cursor_policy: CursorPolicy,
    /// Treat a failed pending-count request as a warning instead of aborting.
    pub count_is_advisory: bool,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            page_size: 1000,
            concurrency_limit: 20,
            sweep_batch_size: 1000,
            cursor_policy: CursorPolicy::DurablePrefix,
            count_is_advisory: false,
        }
    }
}

/// Remote Turso database backing the local replica.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteReplica {
    pub url: String,
    pub auth_token: String,
}

impl fmt::Debug for RemoteReplica {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RemoteReplica")
            .field("url", &self.url)
            .field("auth_token", &"[REDACTED]")
            .finish()
    }
}

/// Where listings are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub remote: Option<RemoteReplica>,
}

impl StoreConfig {
    /// Store settings alone, for callers that never talk to the feed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            path: PathBuf::from(value_or_default(&lookup, "SWIPE_DB_PATH", DEFAULT_DB_PATH)),
            remote: parse_remote_replica(&lookup)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub feed: FeedConfig,
    pub replication: ReplicationConfig,
    pub store: StoreConfig,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = value_or_default(&lookup, "IDX_API_BASE_URL", DEFAULT_FEED_BASE_URL);
        if !is_http_url(&base_url) {
            return Err(ConfigError::Invalid(
                "IDX_API_BASE_URL must start with http:// or https://".to_string(),
            ));
        }
        let access_token = required_trimmed(&lookup, "IDX_ACCESS_TOKEN")?;

        let timeout_secs = parse_bounded(&lookup, "IDX_REQUEST_TIMEOUT_SECS", 30_u64, 1..=300)?;
        let media_limit = parse_bounded(&lookup, "IDX_MEDIA_LIMIT", 50_u32, 1..=500)?;
        let media_size_description = optional_trimmed(&lookup, "IDX_MEDIA_SIZE_DESCRIPTION");

        let feed = FeedConfig {
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
            request_timeout: Duration::from_secs(timeout_secs),
            media_limit,
            media_size_description,
        };

        let replication = ReplicationConfig {
            page_size: parse_bounded(&lookup, "REPLICATION_PAGE_SIZE", 1000_usize, 1..=5_000)?,
            concurrency_limit: parse_bounded(&lookup, "REPLICATION_CONCURRENCY", 20_usize, 1..=256)?,
            sweep_batch_size: parse_bounded(&lookup, "RECONCILE_BATCH_SIZE", 1000_usize, 1..=5_000)?,
            cursor_policy: optional_trimmed(&lookup, "REPLICATION_CURSOR_POLICY")
                .map(|value| value.parse::<CursorPolicy>())
                .transpose()?
                .unwrap_or_default(),
            count_is_advisory: parse_flag(&lookup, "REPLICATION_COUNT_ADVISORY")?,
        };

        let store = StoreConfig::from_lookup(&lookup)?;

        Ok(Self {
            feed,
            replication,
            store,
        })
    }
}

fn parse_remote_replica(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Option<RemoteReplica>, ConfigError> {
    let url = optional_trimmed(&lookup, "TURSO_DATABASE_URL");
    let auth_token = optional_trimmed(&lookup, "TURSO_AUTH_TOKEN");

    match (url, auth_token) {
        (None, None) => Ok(None),
        (Some(url), Some(auth_token)) => Ok(Some(RemoteReplica { url, auth_token })),
        (Some(_), None) => Err(ConfigError::MissingVar("TURSO_AUTH_TOKEN")),
        (None, Some(_)) => Err(ConfigError::MissingVar("TURSO_DATABASE_URL")),
    }
}

fn parse_bounded<T>(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
    range: RangeInclusive<T>,
) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + fmt::Display + Copy,
{
    let invalid = || {
        ConfigError::Invalid(format!(
            "{name} must be an integer in [{}, {}]",
            range.start(),
            range.end()
        ))
    };

    let value = match optional_trimmed(lookup, name) {
        Some(raw) => raw.parse::<T>().map_err(|_| invalid())?,
        None => default,
    };
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(invalid())
    }
}

fn parse_flag(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Result<bool, ConfigError> {
    let Some(value) = optional_trimmed(lookup, name) else {
        return Ok(false);
    };
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid(format!("{name} must be true or false"))),
    }
}

pub fn value_or_default(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: &str,
) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

pub fn required_trimmed(
    lookup: impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    optional_trimmed(lookup, name).ok_or(ConfigError::MissingVar(name))
}

pub fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
