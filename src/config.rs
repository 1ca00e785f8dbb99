// Forecast configuration: partial settings merged first-write-wins, then resolved into a request

use crate::cache::create_cache_key;
use crate::fetcher::feed_url;
use crate::forecast::UnitSystem;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_FEED_HOST: &str = "open.live.bbc.co.uk";
pub const DEFAULT_FEED_PATH: &str = "/weather/feeds/en/2643743/3dayforecast.rss";
pub const DEFAULT_CACHE_NAMESPACE: &str = "bbc_weather";
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 3600;

pub const ENV_HOST: &str = "BBC_WEATHER_HOST";
pub const ENV_PATH: &str = "BBC_WEATHER_PATH";
pub const ENV_UNITS: &str = "BBC_WEATHER_UNITS";
pub const ENV_CACHE_NAMESPACE: &str = "BBC_WEATHER_CACHE_NAMESPACE";
pub const ENV_CACHE_TTL: &str = "BBC_WEATHER_CACHE_TTL";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
}

// Partially specified forecast settings.
//
// A property counts as unset when it is `None`, an empty string or a zero
// TTL. ForecastConfig::merge only fills unset properties, so whichever
// source sets a property first keeps it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub host: Option<String>,
    pub path: Option<String>,
    pub units: Option<UnitSystem>,
    pub cache_namespace: Option<String>,
    pub cache_ttl_seconds: Option<u64>,
}

fn set_string_if_unset(slot: &mut Option<String>, value: Option<String>) {
    if slot.as_deref().map_or(true, str::is_empty) && value.is_some() {
        *slot = value;
    }
}

fn resolved_string(value: &Option<String>, default: &str) -> String {
    match value.as_deref().map(str::trim) {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => default.to_string(),
    }
}

impl ForecastConfig {
    pub fn merge(&mut self, other: ForecastConfig) -> &mut Self {
        set_string_if_unset(&mut self.host, other.host);
        set_string_if_unset(&mut self.path, other.path);
        set_string_if_unset(&mut self.cache_namespace, other.cache_namespace);

        if self.units.is_none() {
            self.units = other.units;
        }
        if self.cache_ttl_seconds.map_or(true, |ttl| ttl == 0) && other.cache_ttl_seconds.is_some() {
            self.cache_ttl_seconds = other.cache_ttl_seconds;
        }
        self
    }

    // Reads BBC_WEATHER_* variables from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut config = ForecastConfig::default();

        for (name, value) in vars {
            match name.as_str() {
                ENV_HOST => config.host = Some(value),
                ENV_PATH => config.path = Some(value),
                ENV_CACHE_NAMESPACE => config.cache_namespace = Some(value),
                ENV_UNITS => {
                    let units = value
                        .parse::<UnitSystem>()
                        .map_err(|message| ConfigError::InvalidValue {
                            name: ENV_UNITS.to_string(),
                            message,
                        })?;
                    config.units = Some(units);
                }
                ENV_CACHE_TTL => {
                    let ttl = value.trim().parse::<u64>().map_err(|e| ConfigError::InvalidValue {
                        name: ENV_CACHE_TTL.to_string(),
                        message: format!("'{}' is not a number of seconds: {}", value, e),
                    })?;
                    config.cache_ttl_seconds = Some(ttl);
                }
                _ => (),
            }
        }

        Ok(config)
    }

    // Fills every still-unset property with its default.
    pub fn resolve(&self) -> ForecastRequest {
        let mut path = resolved_string(&self.path, DEFAULT_FEED_PATH);
        if !path.starts_with('/') {
            path.insert(0, '/');
        }

        ForecastRequest {
            host: resolved_string(&self.host, DEFAULT_FEED_HOST),
            path,
            units: self.units.unwrap_or_default(),
            cache_namespace: resolved_string(&self.cache_namespace, DEFAULT_CACHE_NAMESPACE),
            cache_ttl: Duration::from_secs(
                self.cache_ttl_seconds
                    .filter(|ttl| *ttl > 0)
                    .unwrap_or(DEFAULT_CACHE_TTL_SECONDS),
            ),
        }
    }
}

// Fully resolved settings for one forecast lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRequest {
    pub host: String,
    pub path: String,
    pub units: UnitSystem,
    pub cache_namespace: String,
    pub cache_ttl: Duration,
}

impl Default for ForecastRequest {
    fn default() -> Self {
        ForecastConfig::default().resolve()
    }
}

impl ForecastRequest {
    pub fn cache_key(&self) -> String {
        create_cache_key(&self.cache_namespace, &self.path)
    }

    pub fn url(&self) -> String {
        feed_url(&self.host, &self.path)
    }
}
