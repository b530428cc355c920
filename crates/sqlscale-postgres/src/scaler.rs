//! PostgreSQL scaler — the lifecycle around one connection handle.
//!
//! ```text
//! construct ─ok─▶ Ready ──close──▶ Closed
//!     │            │  ▲
//!     err          └──┘ is_active / get_metrics (one query each)
//!     ▼
//!  nothing observable, no handle left open
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use sqlscale_core::{
    CallContext, MetricSpec, MetricTarget, MetricTargetType, MetricValue, Scaler, ScalerConfig,
    ScalerError, ScalerResult, metric_name_with_index,
};

use crate::activation::is_active;
use crate::connection::{Connection, Connector, open_verified};
use crate::metadata::{PostgresMetadata, parse_postgres_metadata};
use crate::postgres::PgConnector;
use crate::query::execute;

#[derive(Debug)]
enum State {
    Ready(Box<dyn Connection>),
    Closed,
}

/// Scaler driven by a scalar PostgreSQL query.
#[derive(Debug)]
pub struct PostgresScaler {
    metric_type: MetricTargetType,
    metadata: PostgresMetadata,
    state: State,
}

impl PostgresScaler {
    /// Resolve `config` and connect with the `sqlx` driver, bounded by the
    /// configured timeout.
    pub async fn new(config: &ScalerConfig) -> ScalerResult<Self> {
        Self::with_connector(config, &PgConnector::new(), &CallContext::from_config(config)).await
    }

    /// Resolve `config` and connect through `connector`.
    ///
    /// Either returns a ready scaler or fails as a whole; a handle opened
    /// before a failed ping is closed again.
    pub async fn with_connector(
        config: &ScalerConfig,
        connector: &dyn Connector,
        cx: &CallContext,
    ) -> ScalerResult<Self> {
        let metric_type = config.metric_target_type()?;
        let metadata = parse_postgres_metadata(config)?;

        let connection = open_verified(connector, &metadata.connection.descriptor(), cx)
            .await
            .inspect_err(|e| {
                error!(
                    scaler_index = metadata.scaler_index,
                    error = %e,
                    "error establishing postgresql connection"
                );
            })?;

        info!(
            scaler_index = metadata.scaler_index,
            metric = %metadata.metric_name,
            connection = ?metadata.connection,
            "postgresql scaler ready"
        );

        Ok(Self {
            metric_type,
            metadata,
            state: State::Ready(connection),
        })
    }

    pub fn metadata(&self) -> &PostgresMetadata {
        &self.metadata
    }

    pub fn metric_type(&self) -> MetricTargetType {
        self.metric_type
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed)
    }

    /// Take one sample.
    async fn sample(&self, cx: &CallContext) -> ScalerResult<f64> {
        let conn = match &self.state {
            State::Ready(conn) => conn,
            State::Closed => return Err(ScalerError::Closed),
        };

        execute(conn.as_ref(), &self.metadata.query, cx)
            .await
            .map_err(|e| {
                error!(
                    scaler_index = self.metadata.scaler_index,
                    error = %e,
                    "could not query postgresql"
                );
                ScalerError::Query(e)
            })
    }
}

#[async_trait]
impl Scaler for PostgresScaler {
    async fn is_active(&self, cx: &CallContext) -> ScalerResult<bool> {
        let sample = self.sample(cx).await?;
        Ok(is_active(sample, self.metadata.activation_target_query_value))
    }

    async fn get_metrics(
        &self,
        cx: &CallContext,
        metric_name: &str,
    ) -> ScalerResult<Vec<MetricValue>> {
        let sample = self.sample(cx).await?;
        Ok(vec![MetricValue::milli(metric_name, sample)])
    }

    async fn get_metrics_and_activity(
        &self,
        cx: &CallContext,
        metric_name: &str,
    ) -> ScalerResult<(Vec<MetricValue>, bool)> {
        let sample = self.sample(cx).await?;
        let active = is_active(sample, self.metadata.activation_target_query_value);
        debug!(
            scaler_index = self.metadata.scaler_index,
            metric = metric_name,
            sample,
            active,
            "sampled postgresql"
        );
        Ok((vec![MetricValue::milli(metric_name, sample)], active))
    }

    fn get_metric_spec_for_scaling(&self) -> Vec<MetricSpec> {
        vec![MetricSpec::external(
            metric_name_with_index(self.metadata.scaler_index, &self.metadata.metric_name),
            MetricTarget::milli(self.metric_type, self.metadata.target_query_value),
        )]
    }

    async fn close(&mut self) -> ScalerResult<()> {
        let conn = match std::mem::replace(&mut self.state, State::Closed) {
            State::Ready(conn) => conn,
            State::Closed => {
                warn!(
                    scaler_index = self.metadata.scaler_index,
                    "close called on a closed postgresql scaler"
                );
                return Err(ScalerError::Closed);
            }
        };

        match conn.close().await {
            Ok(()) => {
                info!(
                    scaler_index = self.metadata.scaler_index,
                    "postgresql scaler closed"
                );
                Ok(())
            }
            Err(e) => {
                error!(
                    scaler_index = self.metadata.scaler_index,
                    error = %e,
                    "error closing postgresql connection"
                );
                Err(e.into())
            }
        }
    }
}
