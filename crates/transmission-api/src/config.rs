//! Server configuration read from the environment.

use std::str::FromStr;
use std::time::Duration;

use transmission_match::application::config::MatchConfig;

use crate::error::AppError;

/// Credentials for the Google Custom Search image provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleSearchConfig {
    /// API key.
    pub api_key: String,
    /// Programmable search engine id (`cx`).
    pub engine_id: String,
}

/// Everything the server needs at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Sizing and timing of every session.
    pub match_config: MatchConfig,
    /// Image search credentials.
    pub google: GoogleSearchConfig,
    /// How long an ended session stays queryable.
    pub session_retention: Duration,
    /// How long a session may wait for its teams to fill.
    pub lobby_ttl: Duration,
    /// How often stale sessions are swept.
    pub sweep_interval: Duration,
    /// OTLP collector endpoint; span export is off when unset.
    pub otlp_endpoint: Option<String>,
}

impl ServerConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a required variable is missing or a
    /// value does not parse.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a required variable is missing or a
    /// value does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let defaults = MatchConfig::default();
        let match_config = MatchConfig {
            team_capacity: parsed(&lookup, "TEAM_CAPACITY")?.unwrap_or(defaults.team_capacity),
            team_count: parsed(&lookup, "TEAM_COUNT")?.unwrap_or(defaults.team_count),
            match_duration: parsed(&lookup, "MATCH_DURATION_SECS")?
                .map_or(defaults.match_duration, Duration::from_secs),
            ..defaults
        };

        let google = GoogleSearchConfig {
            api_key: required(&lookup, "GOOGLE_API_KEY")?,
            engine_id: required(&lookup, "GOOGLE_SEARCH_ENGINE_ID")?,
        };

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_owned()),
            port: parsed(&lookup, "PORT")?.unwrap_or(3000),
            match_config,
            google,
            session_retention: Duration::from_secs(
                parsed(&lookup, "SESSION_RETENTION_SECS")?.unwrap_or(600),
            ),
            lobby_ttl: Duration::from_secs(parsed(&lookup, "LOBBY_TTL_SECS")?.unwrap_or(3_600)),
            sweep_interval: Duration::from_secs(
                parsed(&lookup, "SWEEP_INTERVAL_SECS")?.unwrap_or(60),
            ),
            otlp_endpoint: lookup("OTEL_EXPORTER_OTLP_ENDPOINT").filter(|v| !v.is_empty()),
        })
    }
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String, AppError> {
    lookup(key)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::Config(format!("{key} environment variable must be set")))
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.parse()
                .map_err(|e| AppError::Config(format!("{key} is invalid: {e}")))
        })
        .transpose()
}
