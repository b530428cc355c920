//! Trigger metadata resolution.
//!
//! Turns the raw `ScalerConfig` maps into a typed `PostgresMetadata`. No
//! I/O happens here. The connection is picked by the first strategy that
//! applies:
//!
//! ```text
//! 1. auth "connection"              → ConnectionSource::Explicit
//! 2. trigger "connectionFromEnv"    → ConnectionSource::FromEnv
//! 3. host/port/userName/dbName/sslmode (+ password | passwordFromEnv)
//!                                   → ConnectionSource::Fields
//! ```

use sqlscale_core::{ConfigError, ScalerConfig, normalize_metric_name};

const DEFAULT_METRIC_NAME: &str = "postgresql";

/// Resolved, validated trigger metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct PostgresMetadata {
    /// Statement returning a single numeric value.
    pub query: String,
    /// Sample value treated as 100% utilization.
    pub target_query_value: f64,
    /// Samples at or below this value leave the workload idle.
    pub activation_target_query_value: f64,
    pub connection: ConnectionSource,
    /// Normalized base metric name, without the scaler index.
    pub metric_name: String,
    pub scaler_index: usize,
}

/// Where the connection descriptor came from.
#[derive(Clone, PartialEq, Eq)]
pub enum ConnectionSource {
    /// Full descriptor from the auth parameters.
    Explicit(String),
    /// Descriptor read from the environment variable `var`.
    FromEnv { var: String, descriptor: String },
    /// Descriptor assembled from discrete fields.
    Fields(ConnectionFields),
}

#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionFields {
    pub host: String,
    pub port: String,
    pub user_name: String,
    pub db_name: String,
    pub sslmode: String,
    pub password: String,
}

impl ConnectionSource {
    /// The descriptor passed to the connector.
    pub fn descriptor(&self) -> String {
        match self {
            ConnectionSource::Explicit(descriptor) => descriptor.clone(),
            ConnectionSource::FromEnv { descriptor, .. } => descriptor.clone(),
            ConnectionSource::Fields(fields) => fields.descriptor(),
        }
    }
}

// Descriptors and passwords never reach logs.
impl std::fmt::Debug for ConnectionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionSource::Explicit(_) => f.write_str("Explicit(<redacted>)"),
            ConnectionSource::FromEnv { var, .. } => f
                .debug_struct("FromEnv")
                .field("var", var)
                .finish_non_exhaustive(),
            ConnectionSource::Fields(fields) => f.debug_tuple("Fields").field(fields).finish(),
        }
    }
}

impl std::fmt::Debug for ConnectionFields {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionFields")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user_name", &self.user_name)
            .field("db_name", &self.db_name)
            .field("sslmode", &self.sslmode)
            .field("password", &if self.password.is_empty() { "" } else { "<redacted>" })
            .finish()
    }
}

impl ConnectionFields {
    /// Render as a libpq key/value descriptor.
    pub fn descriptor(&self) -> String {
        format!(
            "host={} port={} user={} dbname={} sslmode={} password={}",
            quote_value(&self.host),
            quote_value(&self.port),
            quote_value(&self.user_name),
            quote_value(&self.db_name),
            quote_value(&self.sslmode),
            quote_value(&self.password),
        )
    }
}

/// Quote a key/value descriptor value when it is empty or contains
/// whitespace, quotes or backslashes.
fn quote_value(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || c == '\'' || c == '\\');
    if !needs_quotes {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        if c == '\'' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('\'');
    out
}

/// Resolve and validate the trigger configuration.
pub fn parse_postgres_metadata(config: &ScalerConfig) -> Result<PostgresMetadata, ConfigError> {
    let query = config
        .trigger("query")
        .ok_or_else(|| ConfigError::MissingField("query".to_string()))?
        .to_string();

    let target_query_value = match config.trigger_metadata.get("targetQueryValue") {
        Some(raw) => parse_finite("targetQueryValue", raw)?,
        None => return Err(ConfigError::MissingField("targetQueryValue".to_string())),
    };

    let activation_target_query_value = match config.trigger_metadata.get("activationTargetQueryValue")
    {
        Some(raw) => parse_finite("activationTargetQueryValue", raw)?,
        None => 0.0,
    };

    let connection = resolve_connection(config)?;

    let metric_name = match config.trigger_metadata.get("metricName") {
        Some(name) => normalize_metric_name(&format!("{DEFAULT_METRIC_NAME}-{name}")),
        None => normalize_metric_name(DEFAULT_METRIC_NAME),
    };

    Ok(PostgresMetadata {
        query,
        target_query_value,
        activation_target_query_value,
        connection,
        metric_name,
        scaler_index: config.scaler_index,
    })
}

fn resolve_connection(config: &ScalerConfig) -> Result<ConnectionSource, ConfigError> {
    if let Some(descriptor) = config.auth("connection") {
        return Ok(ConnectionSource::Explicit(descriptor.to_string()));
    }

    if let Some(var) = config.trigger("connectionFromEnv") {
        let descriptor = config.env(var).ok_or_else(|| ConfigError::UnresolvedEnv {
            field: "connectionFromEnv".to_string(),
            var: var.to_string(),
        })?;
        return Ok(ConnectionSource::FromEnv {
            var: var.to_string(),
            descriptor: descriptor.to_string(),
        });
    }

    let host = config.from_auth_or_meta("host")?.to_string();
    let port = config.from_auth_or_meta("port")?.to_string();
    let user_name = config.from_auth_or_meta("userName")?.to_string();
    let db_name = config.from_auth_or_meta("dbName")?.to_string();
    let sslmode = config.from_auth_or_meta("sslmode")?.to_string();

    let password = config
        .auth("password")
        .or_else(|| config.trigger("passwordFromEnv").and_then(|var| config.env(var)))
        .unwrap_or_default()
        .to_string();

    Ok(ConnectionSource::Fields(ConnectionFields {
        host,
        port,
        user_name,
        db_name,
        sslmode,
        password,
    }))
}

fn parse_finite(field: &str, raw: &str) -> Result<f64, ConfigError> {
    let value = raw
        .parse::<f64>()
        .map_err(|source| ConfigError::InvalidNumber {
            field: field.to_string(),
            value: raw.to_string(),
            source,
        })?;
    if !value.is_finite() {
        return Err(ConfigError::NonFiniteNumber {
            field: field.to_string(),
            value: raw.to_string(),
        });
    }
    Ok(value)
}
