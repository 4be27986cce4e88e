use crate::catalog::{Branch, default_branches};
use crate::engine::EngineSettings;
use crate::estimation::CrowdScaleKind;
use crate::estimation::wait_time::{QueueScope, WaitTimeParams};
use crate::lifecycle::LifecycleSettings;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use time::macros::format_description;
use time::{Time, UtcOffset};

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
pub const DEFAULT_SERVER_PORT: u16 = 8080;
pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 1;
pub const DEFAULT_ADVISORY_TIMEOUT_MS: u64 = 1500;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub app: AppSection,
    pub logging: LoggingSection,
    #[serde(default)]
    pub engine: Option<EngineSection>,
    #[serde(default)]
    pub server: Option<ServerSection>,
    #[serde(default)]
    pub advisory: Option<AdvisorySection>,
    #[serde(default)]
    pub branches: Vec<Branch>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSection {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSection {
    pub level: String,
}

/// Every key is optional; missing ones take the engine defaults.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct EngineSection {
    pub slot_capacity: Option<u32>,
    pub counters: Option<u32>,
    pub smoothing_factor: Option<f64>,
    pub min_wait_minutes: Option<u32>,
    pub max_wait_minutes: Option<u32>,
    pub confidence_threshold: Option<usize>,
    pub crowd_scale: Option<CrowdScaleKind>,
    pub queue_scope: Option<QueueScope>,
    pub seed: Option<u64>,
    /// Seconds spent in Arrived and in InProgress.
    pub dwell_secs: Option<u64>,
    /// Local closing time, "HH:MM".
    pub business_close: Option<String>,
    pub utc_offset_hours: Option<i8>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSection {
    /// Port to listen on (default: 8080)
    pub port: Option<u16>,
    /// Seconds between lifecycle ticks (default: 1)
    pub tick_interval_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AdvisorySection {
    pub endpoint: Option<String>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

pub fn load_default() -> Result<Config, ConfigError> {
    load_from_path(DEFAULT_CONFIG_PATH)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    Ok(config)
}

impl Config {
    /// Builds engine settings, rejecting values the engine cannot work with.
    pub fn engine_settings(&self) -> Result<EngineSettings, ConfigError> {
        let defaults = EngineSettings::default();
        let Some(section) = &self.engine else {
            return Ok(defaults);
        };

        let slot_capacity = section.slot_capacity.unwrap_or(defaults.slot_capacity);
        if slot_capacity == 0 {
            return Err(invalid("engine.slot_capacity", "must be at least 1"));
        }

        let wait = WaitTimeParams {
            counters: section.counters.unwrap_or(defaults.wait.counters),
            smoothing_factor: section
                .smoothing_factor
                .unwrap_or(defaults.wait.smoothing_factor),
            min_wait_minutes: section
                .min_wait_minutes
                .unwrap_or(defaults.wait.min_wait_minutes),
            max_wait_minutes: section
                .max_wait_minutes
                .unwrap_or(defaults.wait.max_wait_minutes),
            confidence_threshold: section
                .confidence_threshold
                .unwrap_or(defaults.wait.confidence_threshold),
        };
        if wait.counters == 0 {
            return Err(invalid("engine.counters", "must be at least 1"));
        }
        if !wait.smoothing_factor.is_finite() || wait.smoothing_factor <= 0.0 {
            return Err(invalid("engine.smoothing_factor", "must be a positive number"));
        }
        if wait.min_wait_minutes > wait.max_wait_minutes {
            return Err(invalid(
                "engine.min_wait_minutes",
                "must not exceed max_wait_minutes",
            ));
        }

        let dwell = match section.dwell_secs {
            Some(secs) => i64::try_from(secs)
                .map(time::Duration::seconds)
                .map_err(|_| invalid("engine.dwell_secs", "too large"))?,
            None => defaults.lifecycle.dwell,
        };

        let lifecycle = LifecycleSettings {
            dwell,
            business_close: match &section.business_close {
                Some(raw) => parse_clock(raw)?,
                None => defaults.lifecycle.business_close,
            },
            utc_offset: match section.utc_offset_hours {
                Some(hours) => UtcOffset::from_hms(hours, 0, 0)
                    .map_err(|err| invalid("engine.utc_offset_hours", err.to_string()))?,
                None => defaults.lifecycle.utc_offset,
            },
        };

        Ok(EngineSettings {
            slot_capacity,
            crowd_scale: section.crowd_scale.unwrap_or(defaults.crowd_scale),
            queue_scope: section.queue_scope.unwrap_or(defaults.queue_scope),
            seed: section.seed.unwrap_or(defaults.seed),
            wait,
            lifecycle,
        })
    }

    /// Configured branches, or the built-in set when none are listed.
    pub fn branches(&self) -> Vec<Branch> {
        if self.branches.is_empty() {
            default_branches()
        } else {
            self.branches.clone()
        }
    }

    /// Returns the server port (default: 8080)
    pub fn server_port(&self) -> u16 {
        self.server
            .as_ref()
            .and_then(|s| s.port)
            .unwrap_or(DEFAULT_SERVER_PORT)
    }

    /// Returns the tick interval as Duration (default: 1 second)
    pub fn tick_interval(&self) -> Duration {
        let secs = self
            .server
            .as_ref()
            .and_then(|s| s.tick_interval_secs)
            .unwrap_or(DEFAULT_TICK_INTERVAL_SECS);
        Duration::from_secs(secs.max(1))
    }

    pub fn advisory_endpoint(&self) -> Option<&str> {
        let endpoint = self.advisory.as_ref()?.endpoint.as_deref()?.trim();
        if endpoint.is_empty() {
            None
        } else {
            Some(endpoint)
        }
    }

    pub fn advisory_timeout(&self) -> Duration {
        let millis = self
            .advisory
            .as_ref()
            .and_then(|a| a.timeout_ms)
            .unwrap_or(DEFAULT_ADVISORY_TIMEOUT_MS);
        Duration::from_millis(millis)
    }
}

fn parse_clock(raw: &str) -> Result<Time, ConfigError> {
    Time::parse(raw.trim(), format_description!("[hour]:[minute]"))
        .map_err(|err| invalid("engine.business_close", err.to_string()))
}

fn invalid(key: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        reason: reason.into(),
    }
}
