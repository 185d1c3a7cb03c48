//! Processor configuration.
//!
//! Values come from [`ProcessorConfig::default`], a serde document, or
//! `HOMECHORE_*` environment variables (unset variables keep the default).

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::app::retry::RetryPolicy;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("{0}")]
    Invalid(&'static str),
}

/// Tunables of the completion pipeline. Durations are in milliseconds when
/// serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Bounded channel capacity.
    pub capacity: usize,

    /// Wait for free space instead of failing with `ChannelFull`.
    pub blocking_enqueue: bool,

    /// Upper bound of a blocking enqueue.
    #[serde(with = "duration_ms")]
    pub enqueue_timeout: Duration,

    /// Attempts per event, first one included.
    pub max_attempts: u32,

    #[serde(with = "duration_ms")]
    pub base_delay: Duration,

    pub multiplier: f64,

    #[serde(with = "duration_ms")]
    pub max_delay: Duration,

    /// Timeout of a single `apply_reward` call.
    #[serde(with = "duration_ms")]
    pub attempt_timeout: Duration,

    /// Default wait for the consumer to stop on shutdown.
    #[serde(with = "duration_ms")]
    pub drain_timeout: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            blocking_enqueue: false,
            enqueue_timeout: Duration::from_secs(1),
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            multiplier: 2.0,
            max_delay: Duration::from_secs(5),
            attempt_timeout: Duration::from_secs(2),
            drain_timeout: Duration::from_secs(5),
        }
    }
}

impl ProcessorConfig {
    pub const ENV_CAPACITY: &'static str = "HOMECHORE_QUEUE_CAPACITY";
    pub const ENV_BLOCKING: &'static str = "HOMECHORE_BLOCKING_ENQUEUE";
    pub const ENV_ENQUEUE_TIMEOUT: &'static str = "HOMECHORE_ENQUEUE_TIMEOUT_MS";
    pub const ENV_MAX_ATTEMPTS: &'static str = "HOMECHORE_MAX_ATTEMPTS";
    pub const ENV_BASE_DELAY: &'static str = "HOMECHORE_RETRY_BASE_MS";
    pub const ENV_MULTIPLIER: &'static str = "HOMECHORE_RETRY_MULTIPLIER";
    pub const ENV_MAX_DELAY: &'static str = "HOMECHORE_RETRY_MAX_DELAY_MS";
    pub const ENV_ATTEMPT_TIMEOUT: &'static str = "HOMECHORE_ATTEMPT_TIMEOUT_MS";
    pub const ENV_DRAIN_TIMEOUT: &'static str = "HOMECHORE_DRAIN_TIMEOUT_MS";

    /// Read `HOMECHORE_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; missing keys keep the default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = parse(&lookup, Self::ENV_CAPACITY)? {
            config.capacity = v;
        }
        if let Some(v) = parse(&lookup, Self::ENV_BLOCKING)? {
            config.blocking_enqueue = v;
        }
        if let Some(v) = parse(&lookup, Self::ENV_ENQUEUE_TIMEOUT)? {
            config.enqueue_timeout = Duration::from_millis(v);
        }
        if let Some(v) = parse(&lookup, Self::ENV_MAX_ATTEMPTS)? {
            config.max_attempts = v;
        }
        if let Some(v) = parse(&lookup, Self::ENV_BASE_DELAY)? {
            config.base_delay = Duration::from_millis(v);
        }
        if let Some(v) = parse(&lookup, Self::ENV_MULTIPLIER)? {
            config.multiplier = v;
        }
        if let Some(v) = parse(&lookup, Self::ENV_MAX_DELAY)? {
            config.max_delay = Duration::from_millis(v);
        }
        if let Some(v) = parse(&lookup, Self::ENV_ATTEMPT_TIMEOUT)? {
            config.attempt_timeout = Duration::from_millis(v);
        }
        if let Some(v) = parse(&lookup, Self::ENV_DRAIN_TIMEOUT)? {
            config.drain_timeout = Duration::from_millis(v);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::Invalid("capacity must be at least 1"));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("max_attempts must be at least 1"));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ConfigError::Invalid("multiplier must be a finite number >= 1.0"));
        }
        if self.attempt_timeout.is_zero() {
            return Err(ConfigError::Invalid("attempt_timeout must be positive"));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: self.base_delay,
            multiplier: self.multiplier,
            max_delay: self.max_delay,
        }
    }
}

fn parse<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis().try_into().unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = ProcessorConfig::default();
        assert_eq!(config.capacity, 256);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay, Duration::from_millis(200));
        assert_eq!(config.attempt_timeout, Duration::from_secs(2));
        assert!(!config.blocking_enqueue);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_environment_keeps_defaults() {
        let config = ProcessorConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ProcessorConfig::default());
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = ProcessorConfig::from_lookup(lookup(&[
            ("HOMECHORE_QUEUE_CAPACITY", "8"),
            ("HOMECHORE_BLOCKING_ENQUEUE", "true"),
            ("HOMECHORE_MAX_ATTEMPTS", "5"),
            ("HOMECHORE_RETRY_BASE_MS", " 50 "),
            ("HOMECHORE_ATTEMPT_TIMEOUT_MS", "750"),
        ]))
        .unwrap();

        assert_eq!(config.capacity, 8);
        assert!(config.blocking_enqueue);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.base_delay, Duration::from_millis(50));
        assert_eq!(config.attempt_timeout, Duration::from_millis(750));
    }

    #[test]
    fn unparsable_value_names_the_key() {
        let err = ProcessorConfig::from_lookup(lookup(&[("HOMECHORE_MAX_ATTEMPTS", "three")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: "HOMECHORE_MAX_ATTEMPTS",
                value: "three".into()
            }
        );
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err =
            ProcessorConfig::from_lookup(lookup(&[("HOMECHORE_QUEUE_CAPACITY", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn deserializes_partial_document_in_millis() {
        let config: ProcessorConfig =
            serde_json::from_str(r#"{"capacity": 16, "drain_timeout": 250}"#).unwrap();
        assert_eq!(config.capacity, 16);
        assert_eq!(config.drain_timeout, Duration::from_millis(250));
        assert_eq!(config.max_attempts, 3);
    }
}
