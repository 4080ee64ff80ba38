//! Planner configuration.
//!
//! Values come from defaults, optionally a JSON file, then environment
//! overrides:
//! - `PRACTICE_LEAD_TIME_DAYS` - days before a due date that instances are generated. Defaults to `14`.
//! - `PRACTICE_SKILL_CACHE_TTL_SECS` - skill mapping cache lifetime. Defaults to `300`.
//! - `PRACTICE_DAY_OVERFLOW` - `roll_over`, `clamp` or `reject`. Defaults to `roll_over`.
//! - `PRACTICE_ANNUAL_RULE` - `legacy` or `next_after`. Defaults to `legacy`.
//! - `PRACTICE_HTTP_ADDR` - HTTP listen address. Defaults to `0.0.0.0:3000`.

use crate::calculations::next_occurrence::{AnnualRule, DayOverflow, OccurrencePolicy};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub lead_time_days: i64,
    pub skill_cache_ttl_secs: u64,
    pub occurrence_policy: OccurrencePolicy,
    pub http_addr: String,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            lead_time_days: 14,
            skill_cache_ttl_secs: 300,
            occurrence_policy: OccurrencePolicy::default(),
            http_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

impl PlannerConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let config: PlannerConfig = serde_json::from_reader(file)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides looked up through `lookup` (normally the process environment).
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("PRACTICE_LEAD_TIME_DAYS") {
            self.lead_time_days = parse_var("PRACTICE_LEAD_TIME_DAYS", &value)?;
        }
        if let Some(value) = lookup("PRACTICE_SKILL_CACHE_TTL_SECS") {
            self.skill_cache_ttl_secs = parse_var("PRACTICE_SKILL_CACHE_TTL_SECS", &value)?;
        }
        if let Some(value) = lookup("PRACTICE_DAY_OVERFLOW") {
            self.occurrence_policy.day_overflow = DayOverflow::from_str(&value)
                .map_err(|err| ConfigError::InvalidValue("PRACTICE_DAY_OVERFLOW".into(), err))?;
        }
        if let Some(value) = lookup("PRACTICE_ANNUAL_RULE") {
            self.occurrence_policy.annual_rule = AnnualRule::from_str(&value)
                .map_err(|err| ConfigError::InvalidValue("PRACTICE_ANNUAL_RULE".into(), err))?;
        }
        if let Some(value) = lookup("PRACTICE_HTTP_ADDR") {
            self.http_addr = value;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn skill_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.skill_cache_ttl_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.lead_time_days < 0 {
            return Err(ConfigError::InvalidValue(
                "lead_time_days".into(),
                format!("{} (must be non-negative)", self.lead_time_days),
            ));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|err| ConfigError::InvalidValue(key.to_string(), format!("'{value}': {err}")))
}
