//! Entry configuration
//!
//! Reads the credential data and user options of a config entry into typed
//! settings, applying defaults for missing options.

use std::collections::HashMap;
use std::time::Duration;

use chrono_tz::Tz;
use ha_config_entries::ConfigEntry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::constants::*;
use crate::polling::{PollingPolicy, SilentHours};
use crate::token::Token;

/// Errors raised while reading an entry's configuration
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required value '{key}'")]
    Missing { key: String },

    #[error("invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}

impl ConfigError {
    fn invalid(key: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Distance unit used for odometer and range sensors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceUnit {
    #[default]
    Kilometers,
    Miles,
}

const KM_PER_MILE: f64 = 1.609_344;

impl DistanceUnit {
    /// Unit code used by the vehicle API
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(DistanceUnit::Kilometers),
            3 => Some(DistanceUnit::Miles),
            _ => None,
        }
    }

    /// Accepts the unit symbol (`km`, `mi`) or the API code (1, 3)
    pub fn from_option(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => match s.as_str() {
                "km" => Some(DistanceUnit::Kilometers),
                "mi" => Some(DistanceUnit::Miles),
                _ => None,
            },
            Value::Number(n) => n.as_i64().and_then(Self::from_code),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            DistanceUnit::Kilometers => "km",
            DistanceUnit::Miles => "mi",
        }
    }

    /// Convert `value`, expressed in `from`, into this unit
    pub fn convert(&self, value: f64, from: DistanceUnit) -> f64 {
        match (from, self) {
            (DistanceUnit::Kilometers, DistanceUnit::Miles) => value / KM_PER_MILE,
            (DistanceUnit::Miles, DistanceUnit::Kilometers) => value * KM_PER_MILE,
            _ => value,
        }
    }
}

/// Account credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Typed settings of one config entry
#[derive(Debug, Clone)]
pub struct EntryConfig {
    pub credentials: Credentials,
    /// Token persisted by a previous run, if any
    pub stored_token: Option<Token>,
    pub unit: DistanceUnit,
    pub scan_interval: Duration,
    pub force_scan_interval: Duration,
    pub silent_hours: SilentHours,
    pub time_zone: Tz,
}

impl EntryConfig {
    /// Read the entry's data and options.
    ///
    /// Unreadable stored credentials are dropped with a warning; the next
    /// refresh then performs a full login.
    pub fn from_entry(entry: &ConfigEntry, default_time_zone: Tz) -> Result<Self, ConfigError> {
        let credentials = Credentials {
            username: required_string(&entry.data, CONF_USERNAME)?,
            password: required_string(&entry.data, CONF_PASSWORD)?,
        };

        let stored_token = match entry.data.get(CONF_STORED_CREDENTIALS) {
            None | Some(Value::Null) => None,
            Some(value) => match Token::from_stored(value) {
                Ok(token) => Some(token),
                Err(e) => {
                    warn!(entry_id = %entry.entry_id, "Ignoring unreadable stored credentials: {}", e);
                    None
                }
            },
        };

        let options = &entry.options;
        let unit = match options.get(CONF_UNIT_OF_MEASUREMENT) {
            None => DistanceUnit::default(),
            Some(value) => DistanceUnit::from_option(value).ok_or_else(|| {
                ConfigError::invalid(CONF_UNIT_OF_MEASUREMENT, format!("unknown unit {}", value))
            })?,
        };

        let time_zone = match options.get(CONF_TIME_ZONE).and_then(Value::as_str) {
            None => default_time_zone,
            Some(name) => ha_core::dt::parse_time_zone(name)
                .map_err(|e| ConfigError::invalid(CONF_TIME_ZONE, e.to_string()))?,
        };

        Ok(Self {
            credentials,
            stored_token,
            unit,
            scan_interval: minutes_option(options, CONF_SCAN_INTERVAL, DEFAULT_SCAN_INTERVAL)?,
            force_scan_interval: minutes_option(
                options,
                CONF_FORCE_SCAN_INTERVAL,
                DEFAULT_FORCE_SCAN_INTERVAL,
            )?,
            silent_hours: SilentHours {
                start: hour_option(
                    options,
                    CONF_NO_FORCE_SCAN_HOUR_START,
                    DEFAULT_NO_FORCE_SCAN_HOUR_START,
                )?,
                finish: hour_option(
                    options,
                    CONF_NO_FORCE_SCAN_HOUR_FINISH,
                    DEFAULT_NO_FORCE_SCAN_HOUR_FINISH,
                )?,
            },
            time_zone,
        })
    }

    /// The force-update policy these settings describe
    pub fn polling_policy(&self) -> PollingPolicy {
        PollingPolicy::new(self.silent_hours, self.force_scan_interval)
    }
}

fn required_string(data: &HashMap<String, Value>, key: &str) -> Result<String, ConfigError> {
    match data.get(key).and_then(Value::as_str) {
        Some(s) if !s.is_empty() => Ok(s.to_string()),
        _ => Err(ConfigError::Missing {
            key: key.to_string(),
        }),
    }
}

fn minutes_option(
    options: &HashMap<String, Value>,
    key: &str,
    default: u64,
) -> Result<Duration, ConfigError> {
    let minutes = match options.get(key) {
        None => default,
        Some(value) => value
            .as_u64()
            .ok_or_else(|| ConfigError::invalid(key, "expected a whole number of minutes"))?,
    };
    if minutes == 0 {
        return Err(ConfigError::invalid(key, "must be at least one minute"));
    }
    let seconds = minutes
        .checked_mul(60)
        .ok_or_else(|| ConfigError::invalid(key, "interval too large"))?;
    Ok(Duration::from_secs(seconds))
}

fn hour_option(
    options: &HashMap<String, Value>,
    key: &str,
    default: u32,
) -> Result<u32, ConfigError> {
    let Some(value) = options.get(key) else {
        return Ok(default);
    };
    match value.as_u64() {
        Some(hour) if hour <= 23 => Ok(hour as u32),
        _ => Err(ConfigError::invalid(key, "expected an hour between 0 and 23")),
    }
}
