//! Trigger configuration handed to a scaler by the orchestrator.
//!
//! Three string namespaces (trigger metadata, authentication parameters,
//! resolved environment) plus the scaler index and the call timeout. The
//! same structure can be loaded from a TOML file:
//!
//! ```toml
//! scaler_index = 0
//! metric_type = "AverageValue"
//! timeout = "3s"
//!
//! [trigger]
//! query = "SELECT count(*) FROM jobs WHERE state = 'pending'"
//! targetQueryValue = "10"
//! passwordFromEnv = "PG_PASSWORD"
//!
//! [auth]
//! host = "db.internal"
//!
//! [env]
//! PG_PASSWORD = "hunter2"
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::metric::MetricTargetType;

/// Timeout applied when the caller does not set one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Immutable configuration for one scaler instance.
#[derive(Clone, Serialize, Deserialize)]
pub struct ScalerConfig {
    /// Trigger metadata, as written on the scaled workload.
    #[serde(default, rename = "trigger")]
    pub trigger_metadata: HashMap<String, String>,
    /// Authentication parameters (secrets).
    #[serde(default, rename = "auth")]
    pub auth_params: HashMap<String, String>,
    /// Environment of the scale target, already resolved by the host.
    #[serde(default, rename = "env")]
    pub resolved_env: HashMap<String, String>,
    /// Position of this trigger among the triggers of the same workload.
    #[serde(default)]
    pub scaler_index: usize,
    /// "AverageValue" (default) or "Value".
    #[serde(default)]
    pub metric_type: Option<String>,
    /// Deadline for construction and for each query.
    #[serde(default = "default_timeout", with = "duration_str")]
    pub timeout: Duration,
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

impl Default for ScalerConfig {
    fn default() -> Self {
        Self {
            trigger_metadata: HashMap::new(),
            auth_params: HashMap::new(),
            resolved_env: HashMap::new(),
            scaler_index: 0,
            metric_type: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

// Auth values and resolved env are secrets; only their keys are printed.
impl std::fmt::Debug for ScalerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut auth_keys: Vec<_> = self.auth_params.keys().collect();
        auth_keys.sort();
        let mut env_keys: Vec<_> = self.resolved_env.keys().collect();
        env_keys.sort();
        f.debug_struct("ScalerConfig")
            .field("trigger_metadata", &self.trigger_metadata)
            .field("auth_params", &auth_keys)
            .field("resolved_env", &env_keys)
            .field("scaler_index", &self.scaler_index)
            .field("metric_type", &self.metric_type)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ScalerConfig {
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// A trigger metadata value, treating empty strings as absent.
    pub fn trigger(&self, key: &str) -> Option<&str> {
        non_empty(self.trigger_metadata.get(key))
    }

    /// An authentication parameter, treating empty strings as absent.
    pub fn auth(&self, key: &str) -> Option<&str> {
        non_empty(self.auth_params.get(key))
    }

    /// A resolved environment value, treating empty strings as absent.
    pub fn env(&self, name: &str) -> Option<&str> {
        non_empty(self.resolved_env.get(name))
    }

    /// Look a field up in the auth parameters first, then in the trigger
    /// metadata.
    pub fn from_auth_or_meta(&self, field: &str) -> Result<&str, ConfigError> {
        self.auth(field)
            .or_else(|| self.trigger(field))
            .ok_or_else(|| ConfigError::MissingField(field.to_string()))
    }

    /// Resolve the metric target type. External metrics cannot be
    /// expressed as a utilization percentage.
    pub fn metric_target_type(&self) -> Result<MetricTargetType, ConfigError> {
        match self.metric_type.as_deref() {
            None | Some("") | Some("AverageValue") => Ok(MetricTargetType::AverageValue),
            Some("Value") => Ok(MetricTargetType::Value),
            Some("Utilization") => Err(ConfigError::UnsupportedMetricType(
                "Utilization".to_string(),
            )),
            Some(other) => Err(ConfigError::UnknownMetricType(other.to_string())),
        }
    }
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.is_empty())
}

/// Parse a duration string like "3s", "500ms", "1m". Bare numbers are seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.trim()
            .parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format!("{}ms", d.as_millis()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_duration(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid duration: {raw:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(trigger: &[(&str, &str)], auth: &[(&str, &str)]) -> ScalerConfig {
        ScalerConfig {
            trigger_metadata: trigger
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            auth_params: auth
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..ScalerConfig::default()
        }
    }

    #[test]
    fn auth_takes_precedence_over_trigger() {
        let config = config_with(&[("host", "meta-host")], &[("host", "auth-host")]);
        assert_eq!(config.from_auth_or_meta("host").unwrap(), "auth-host");
    }

    #[test]
    fn falls_back_to_trigger_metadata() {
        let config = config_with(&[("host", "meta-host")], &[("host", "")]);
        assert_eq!(config.from_auth_or_meta("host").unwrap(), "meta-host");
    }

    #[test]
    fn missing_in_both_is_an_error() {
        let config = config_with(&[("port", "")], &[]);
        let err = config.from_auth_or_meta("port").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(f) if f == "port"));
    }

    #[test]
    fn metric_type_defaults_to_average_value() {
        let config = ScalerConfig::default();
        assert_eq!(
            config.metric_target_type().unwrap(),
            MetricTargetType::AverageValue
        );
    }

    #[test]
    fn metric_type_value_is_accepted() {
        let config = ScalerConfig {
            metric_type: Some("Value".to_string()),
            ..ScalerConfig::default()
        };
        assert_eq!(config.metric_target_type().unwrap(), MetricTargetType::Value);
    }

    #[test]
    fn utilization_is_rejected() {
        let config = ScalerConfig {
            metric_type: Some("Utilization".to_string()),
            ..ScalerConfig::default()
        };
        assert!(matches!(
            config.metric_target_type(),
            Err(ConfigError::UnsupportedMetricType(_))
        ));
    }

    #[test]
    fn unknown_metric_type_is_rejected() {
        let config = ScalerConfig {
            metric_type: Some("Average".to_string()),
            ..ScalerConfig::default()
        };
        assert!(matches!(
            config.metric_target_type(),
            Err(ConfigError::UnknownMetricType(t)) if t == "Average"
        ));
    }

    #[test]
    fn parse_from_toml() {
        let toml_str = r#"
scaler_index = 2
metric_type = "Value"
timeout = "500ms"

[trigger]
query = "select 1"
targetQueryValue = "5"

[auth]
password = "secret"

[env]
PG_CONN = "postgres://localhost/db"
"#;
        let config = ScalerConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.scaler_index, 2);
        assert_eq!(config.timeout, Duration::from_millis(500));
        assert_eq!(config.trigger("query"), Some("select 1"));
        assert_eq!(config.auth("password"), Some("secret"));
        assert_eq!(config.env("PG_CONN"), Some("postgres://localhost/db"));
    }

    #[test]
    fn parse_minimal_toml_uses_defaults() {
        let config = ScalerConfig::from_toml_str("[trigger]\nquery = \"select 1\"\n").unwrap();
        assert_eq!(config.scaler_index, 0);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert!(config.metric_type.is_none());
    }

    #[test]
    fn invalid_timeout_is_rejected() {
        assert!(ScalerConfig::from_toml_str("timeout = \"soon\"\n").is_err());
    }

    #[test]
    fn oversized_minute_timeout_is_rejected() {
        assert_eq!(parse_duration("307445734561825861m"), None);
        assert!(ScalerConfig::from_toml_str("timeout = \"307445734561825861m\"\n").is_err());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scaler.toml");
        std::fs::write(
            &path,
            "scaler_index = 1\ntimeout = \"5s\"\n\n[trigger]\nquery = \"select 1\"\n",
        )
        .unwrap();

        let config = ScalerConfig::from_file(&path).unwrap();
        assert_eq!(config.scaler_index, 1);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.trigger("query"), Some("select 1"));
    }

    #[test]
    fn load_from_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ScalerConfig::from_file(&dir.path().join("absent.toml")).is_err());
    }

    #[test]
    fn debug_hides_secret_values() {
        let mut config = config_with(&[], &[("password", "hunter2")]);
        config
            .resolved_env
            .insert("PG_PASSWORD".to_string(), "hunter3".to_string());
        let printed = format!("{config:?}");
        assert!(printed.contains("password"));
        assert!(!printed.contains("hunter2"));
        assert!(!printed.contains("hunter3"));
    }

    #[test]
    fn parse_duration_values() {
        assert_eq!(parse_duration("3s"), Some(Duration::from_secs(3)));
        assert_eq!(parse_duration("250ms"), Some(Duration::from_millis(250)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("10"), Some(Duration::from_secs(10)));
        assert_eq!(parse_duration("soon"), None);
    }
}
