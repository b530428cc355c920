//! Error taxonomy shared by every scaler.
//!
//! Configuration errors are fatal at construction. Connection errors are
//! fatal at construction and reported (but non-blocking) at close. Query
//! errors are per-call: the scaler stays ready and the orchestrator may
//! poll again.

use std::time::Duration;

use thiserror::Error;

/// Boxed driver error carried as the cause of connection and query failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for scaler operations.
pub type ScalerResult<T> = Result<T, ScalerError>;

/// Errors surfaced to the orchestrator.
#[derive(Debug, Error)]
pub enum ScalerError {
    #[error("error parsing scaler metadata: {0}")]
    Config(#[from] ConfigError),

    #[error("error establishing connection: {0}")]
    Connection(#[from] ConnectionError),

    #[error("error inspecting data source: {0}")]
    Query(#[from] QueryError),

    /// The scaler was already closed. This is a caller bug, not a data error.
    #[error("scaler is closed")]
    Closed,
}

/// Missing or malformed trigger configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no {0} given")]
    MissingField(String),

    #[error("{field} parsing error: {value:?} is not a number: {source}")]
    InvalidNumber {
        field: String,
        value: String,
        #[source]
        source: std::num::ParseFloatError,
    },

    #[error("{field} must be a finite number, got {value:?}")]
    NonFiniteNumber { field: String, value: String },

    #[error("{field} refers to environment variable {var:?}, which is not set")]
    UnresolvedEnv { field: String, var: String },

    #[error(
        "'{0}' metric type is unsupported for external metrics, allowed values are 'Value' or 'AverageValue'"
    )]
    UnsupportedMetricType(String),

    #[error("unknown metric type: {0}")]
    UnknownMetricType(String),
}

/// Failures opening, verifying or releasing the data-source handle.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("failed to open connection: {0}")]
    Open(#[source] BoxError),

    #[error("failed to ping data source: {0}")]
    Ping(#[source] BoxError),

    #[error("failed to close connection: {0}")]
    Close(#[source] BoxError),

    #[error("connection attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection attempt cancelled")]
    Cancelled,
}

/// Failures reading a sample.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("could not execute query: {0}")]
    Execute(#[source] BoxError),

    #[error("could not read query result as a number: {0}")]
    Decode(#[source] BoxError),

    #[error("query returned no rows")]
    NoRows,

    #[error("query timed out after {0:?}")]
    Timeout(Duration),

    #[error("query cancelled")]
    Cancelled,
}

impl ScalerError {
    /// Whether the failure happened after a successful construction and
    /// the same scaler can simply be polled again.
    pub fn is_transient(&self) -> bool {
        matches!(self, ScalerError::Query(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_field_message_names_the_field() {
        let err = ConfigError::MissingField("host".to_string());
        assert_eq!(err.to_string(), "no host given");
    }

    #[test]
    fn invalid_number_keeps_parse_cause() {
        let source = "abc".parse::<f64>().unwrap_err();
        let err = ConfigError::InvalidNumber {
            field: "targetQueryValue".to_string(),
            value: "abc".to_string(),
            source,
        };
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("targetQueryValue"));
    }

    #[test]
    fn scaler_error_wraps_each_class() {
        let config: ScalerError = ConfigError::MissingField("query".into()).into();
        assert!(matches!(config, ScalerError::Config(_)));
        assert!(!config.is_transient());

        let conn: ScalerError = ConnectionError::Cancelled.into();
        assert!(matches!(conn, ScalerError::Connection(_)));
        assert!(!conn.is_transient());

        let query: ScalerError = QueryError::NoRows.into();
        assert!(query.is_transient());
        assert!(query.to_string().contains("no rows"));
    }

    #[test]
    fn driver_cause_is_preserved() {
        let cause: BoxError = "connection refused".into();
        let err = ConnectionError::Ping(cause);
        let source = std::error::Error::source(&err).expect("has source");
        assert_eq!(source.to_string(), "connection refused");
    }
}
