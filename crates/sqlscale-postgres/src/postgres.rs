//! `sqlx` implementation of the connection seam.
//!
//! Each handle is a single-connection `PgPool` opened lazily: `open`
//! performs no I/O, so a bad host only surfaces at the first ping.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::Connection as _;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

use sqlscale_core::{ConnectionError, QueryError};

use crate::connection::{Connection, Connector};
use crate::dsn::parse_descriptor;
use crate::sample::Sample;

/// Pool acquire bound, matching the sqlx default.
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Opens PostgreSQL handles from URL or key/value descriptors.
#[derive(Debug, Clone)]
pub struct PgConnector {
    application_name: Option<String>,
    acquire_timeout: Duration,
}

impl Default for PgConnector {
    fn default() -> Self {
        Self {
            application_name: None,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
        }
    }
}

impl PgConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upper bound on establishing the underlying connection. Refused
    /// connections are retried until it expires.
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Report this name to the server (`pg_stat_activity.application_name`).
    pub fn with_application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    fn connect_options(&self, descriptor: &str) -> Result<PgConnectOptions, ConnectionError> {
        let options =
            parse_descriptor(descriptor).map_err(|e| ConnectionError::Open(Box::new(e)))?;
        Ok(match &self.application_name {
            Some(name) => options.application_name(name),
            None => options,
        })
    }
}

#[async_trait]
impl Connector for PgConnector {
    async fn open(&self, descriptor: &str) -> Result<Box<dyn Connection>, ConnectionError> {
        let options = self.connect_options(descriptor)?;
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .min_connections(0)
            .acquire_timeout(self.acquire_timeout)
            .connect_lazy_with(options);

        Ok(Box::new(PgHandle { pool }))
    }
}

/// An open PostgreSQL handle.
pub struct PgHandle {
    pool: PgPool,
}

impl std::fmt::Debug for PgHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgHandle")
            .field("closed", &self.pool.is_closed())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Connection for PgHandle {
    async fn ping(&self) -> Result<(), ConnectionError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| ConnectionError::Ping(Box::new(e)))?;
        conn.ping()
            .await
            .map_err(|e| ConnectionError::Ping(Box::new(e)))
    }

    async fn query_scalar(&self, query: &str) -> Result<f64, QueryError> {
        let Sample(value) = sqlx::query_scalar::<_, Sample>(query)
            .fetch_one(&self.pool)
            .await
            .map_err(query_error)?;
        Ok(value)
    }

    async fn close(&self) -> Result<(), ConnectionError> {
        self.pool.close().await;
        Ok(())
    }
}

/// Classify a driver error.
fn query_error(e: sqlx::Error) -> QueryError {
    match e {
        sqlx::Error::RowNotFound => QueryError::NoRows,
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::TypeNotFound { .. } => QueryError::Decode(Box::new(e)),
        other => QueryError::Execute(Box::new(other)),
    }
}
