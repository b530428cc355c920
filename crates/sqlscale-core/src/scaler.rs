//! The contract every scaler implements for the orchestrator.
//!
//! The orchestrator constructs a scaler once, polls it repeatedly, and
//! closes it exactly once. Calls on one instance are serialized by the
//! orchestrator; distinct instances may run concurrently.

use async_trait::async_trait;

use crate::context::CallContext;
use crate::error::ScalerResult;
use crate::metric::{MetricSpec, MetricValue};

#[async_trait]
pub trait Scaler: Send + Sync {
    /// Whether the workload should be considered active.
    async fn is_active(&self, cx: &CallContext) -> ScalerResult<bool>;

    /// Current metric values reported under `metric_name`.
    async fn get_metrics(
        &self,
        cx: &CallContext,
        metric_name: &str,
    ) -> ScalerResult<Vec<MetricValue>>;

    /// Metric values and the activity flag, derived from a single sample.
    ///
    /// The default implementation samples twice; scalers backed by a
    /// single reading should override it.
    async fn get_metrics_and_activity(
        &self,
        cx: &CallContext,
        metric_name: &str,
    ) -> ScalerResult<(Vec<MetricValue>, bool)> {
        let metrics = self.get_metrics(cx, metric_name).await?;
        let active = self.is_active(cx).await?;
        Ok((metrics, active))
    }

    /// Metrics this scaler advertises.
    fn get_metric_spec_for_scaling(&self) -> Vec<MetricSpec>;

    /// Release the scaler's resources. Must be called exactly once.
    async fn close(&mut self) -> ScalerResult<()>;
}
