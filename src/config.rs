//! Runtime configuration.
//!
//! Built once at startup and passed by reference into every component;
//! nothing in the pipeline reads ambient global state.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::constants::{GEOCODER_BASE, MAX_ALERT_SUMMARIES, NWS_API_BASE, USER_AGENT};
use crate::error::PipelineError;

/// Prefix for environment overrides, e.g. `NWS_DASHBOARD_UNITS=metric`.
pub const ENV_PREFIX: &str = "NWS_DASHBOARD_";

/// Display unit system.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Imperial,
    Metric,
}

impl FromStr for Units {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "imperial" | "us" => Ok(Units::Imperial),
            "metric" | "si" => Ok(Units::Metric),
            other => Err(format!("unknown unit system {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Extra attempts after the first for transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry; doubles per attempt.
    #[serde(default = "default_base_retry_delay_ms")]
    pub base_retry_delay_ms: u64,

    /// Ceiling for the retry delay.
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,

    /// Lifetime of a cached response. Zero disables caching of fresh results.
    #[serde(default = "default_cache_ttl_minutes")]
    pub cache_ttl_minutes: u64,

    /// Directory for the on-disk cache. In-memory when unset.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub units: Units,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Contact address appended to the geocoder User-Agent.
    #[serde(default)]
    pub contact_email: Option<String>,

    #[serde(default)]
    pub preferred_station: Option<String>,

    /// Alert summaries shown (0-3). Zero skips the alerts fetch entirely.
    #[serde(default = "default_alerts_max")]
    pub alerts_max: usize,

    /// Candidate stations probed for a recent observation.
    #[serde(default = "default_station_probe_limit")]
    pub station_probe_limit: usize,

    /// An observation older than this does not count as recent.
    #[serde(default = "default_station_recent_hours")]
    pub station_recent_hours: i64,

    #[serde(default)]
    pub latitude: Option<f64>,

    #[serde(default)]
    pub longitude: Option<f64>,

    /// Label shown for configured coordinates.
    #[serde(default)]
    pub location_name: Option<String>,

    /// Free-text "City, ST" resolved through the geocoder when no
    /// coordinates are configured.
    #[serde(default)]
    pub location: Option<String>,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default = "default_geocoder_base")]
    pub geocoder_base: String,
}

fn default_max_retries() -> u32 {
    2
}
fn default_base_retry_delay_ms() -> u64 {
    250
}
fn default_max_retry_delay_ms() -> u64 {
    2000
}
fn default_cache_ttl_minutes() -> u64 {
    10
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_user_agent() -> String {
    USER_AGENT.to_string()
}
fn default_alerts_max() -> usize {
    2
}
fn default_station_probe_limit() -> usize {
    5
}
fn default_station_recent_hours() -> i64 {
    3
}
fn default_api_base() -> String {
    NWS_API_BASE.to_string()
}
fn default_geocoder_base() -> String {
    GEOCODER_BASE.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_retry_delay_ms: default_base_retry_delay_ms(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
            cache_ttl_minutes: default_cache_ttl_minutes(),
            cache_dir: None,
            timeout_secs: default_timeout_secs(),
            units: Units::default(),
            user_agent: default_user_agent(),
            contact_email: None,
            preferred_station: None,
            alerts_max: default_alerts_max(),
            station_probe_limit: default_station_probe_limit(),
            station_recent_hours: default_station_recent_hours(),
            latitude: None,
            longitude: None,
            location_name: None,
            location: None,
            api_base: default_api_base(),
            geocoder_base: default_geocoder_base(),
        }
    }
}

impl Config {
    /// Defaults overridden by `NWS_DASHBOARD_*` environment variables.
    pub fn from_env() -> Result<Self, PipelineError> {
        Self::from_lookup(|key| std::env::var(format!("{ENV_PREFIX}{key}")).ok())
    }

    /// Builds a config from an arbitrary key lookup (keys without prefix,
    /// upper case). Unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PipelineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get("MAX_RETRIES") {
            config.max_retries = parse_value("MAX_RETRIES", &v)?;
        }
        if let Some(v) = get("BASE_RETRY_DELAY_MS") {
            config.base_retry_delay_ms = parse_value("BASE_RETRY_DELAY_MS", &v)?;
        }
        if let Some(v) = get("MAX_RETRY_DELAY_MS") {
            config.max_retry_delay_ms = parse_value("MAX_RETRY_DELAY_MS", &v)?;
        }
        if let Some(v) = get("CACHE_TTL_MINUTES") {
            config.cache_ttl_minutes = parse_value("CACHE_TTL_MINUTES", &v)?;
        }
        if let Some(v) = get("CACHE_DIR") {
            config.cache_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = get("TIMEOUT_SECS") {
            config.timeout_secs = parse_value("TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("UNITS") {
            config.units = v.parse().map_err(PipelineError::Config)?;
        }
        if let Some(v) = get("USER_AGENT") {
            config.user_agent = v;
        }
        config.contact_email = get("CONTACT_EMAIL");
        config.preferred_station = get("PREFERRED_STATION");
        if let Some(v) = get("ALERTS_MAX") {
            config.alerts_max = parse_value("ALERTS_MAX", &v)?;
        }
        if let Some(v) = get("STATION_PROBE_LIMIT") {
            config.station_probe_limit = parse_value("STATION_PROBE_LIMIT", &v)?;
        }
        if let Some(v) = get("STATION_RECENT_HOURS") {
            config.station_recent_hours = parse_value("STATION_RECENT_HOURS", &v)?;
        }
        if let Some(v) = get("LATITUDE") {
            config.latitude = Some(parse_value("LATITUDE", &v)?);
        }
        if let Some(v) = get("LONGITUDE") {
            config.longitude = Some(parse_value("LONGITUDE", &v)?);
        }
        config.location_name = get("LOCATION_NAME");
        config.location = get("LOCATION");
        if let Some(v) = get("API_BASE") {
            config.api_base = v;
        }
        if let Some(v) = get("GEOCODER_BASE") {
            config.geocoder_base = v;
        }

        Ok(config.normalized())
    }

    /// Clamps out-of-range values instead of rejecting them.
    pub fn normalized(mut self) -> Self {
        self.alerts_max = self.alerts_max.min(MAX_ALERT_SUMMARIES);
        self.station_probe_limit = self.station_probe_limit.max(1);
        self.api_base = self.api_base.trim_end_matches('/').to_string();
        self.geocoder_base = self.geocoder_base.trim_end_matches('/').to_string();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// User-Agent for the geocoder, which asks for a contact address.
    pub fn geocoder_user_agent(&self) -> String {
        match &self.contact_email {
            Some(email) => format!("{} ({email})", self.user_agent),
            None => self.user_agent.clone(),
        }
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, PipelineError>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| PipelineError::Config(format!("{ENV_PREFIX}{key}={value:?}: {e}")))
}
