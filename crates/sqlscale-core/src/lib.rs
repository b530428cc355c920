//! sqlscale-core — the scaler contract shared by sqlscale triggers.
//!
//! An external orchestrator polls scalers for an activity flag and a
//! metric value, and aggregates their metric specs into scale decisions.
//! This crate holds what every scaler has in common:
//!
//! - `ScalerConfig`: trigger metadata, auth parameters, resolved env
//! - `CallContext`: caller deadline and cancel flag
//! - `Scaler`: construct → poll → close contract
//! - `MetricSpec` / `MetricValue`: milli-encoded exchange types
//! - `ScalerError`: configuration, connection and query failures
//!
//! # Metric protocol
//!
//! ```text
//! encoded     = round(sample * 1000)
//! metric name = "s{scaler_index}-{normalized name}"
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod metric;
pub mod scaler;

pub use config::ScalerConfig;
pub use context::{CallContext, Interrupted};
pub use error::{BoxError, ConfigError, ConnectionError, QueryError, ScalerError, ScalerResult};
pub use metric::{
    MetricSourceType, MetricSpec, MetricTarget, MetricTargetType, MetricValue, MilliValue,
    metric_name_with_index, normalize_metric_name,
};
pub use scaler::Scaler;
