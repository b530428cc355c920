//! Metric exchange types and the milli-unit encoding.
//!
//! Values cross the wire as integers in thousandths so the orchestrator
//! never sees floating-point drift. `MilliValue::from_f64(5.0)` is `5000`.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// A fixed-point quantity in milli-units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MilliValue(i64);

impl MilliValue {
    /// Encode a float as `round(value * 1000)`.
    ///
    /// Rounds half away from zero. NaN encodes to zero and infinities
    /// saturate at the `i64` bounds.
    pub fn from_f64(value: f64) -> Self {
        Self((value * 1000.0).round() as i64)
    }

    pub const fn from_milli(milli: i64) -> Self {
        Self(milli)
    }

    pub const fn milli(self) -> i64 {
        self.0
    }

    /// Decode back to a float.
    pub fn as_f64(self) -> f64 {
        self.0 as f64 / 1000.0
    }
}

impl std::fmt::Display for MilliValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}m", self.0)
    }
}

/// How the orchestrator interprets the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MetricTargetType {
    /// Target per replica.
    #[default]
    AverageValue,
    /// Target for the metric as a whole.
    Value,
}

/// Where the metric comes from. Scalers only ever advertise external metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MetricSourceType {
    #[default]
    External,
}

/// Target of an advertised metric. Exactly one of `value` /
/// `average_value` is set, according to `target_type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricTarget {
    pub target_type: MetricTargetType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<MilliValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_value: Option<MilliValue>,
}

impl MetricTarget {
    /// Build a milli-encoded target of the given type.
    pub fn milli(target_type: MetricTargetType, target: f64) -> Self {
        let encoded = MilliValue::from_f64(target);
        match target_type {
            MetricTargetType::AverageValue => Self {
                target_type,
                value: None,
                average_value: Some(encoded),
            },
            MetricTargetType::Value => Self {
                target_type,
                value: Some(encoded),
                average_value: None,
            },
        }
    }
}

/// A metric advertised to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSpec {
    pub source_type: MetricSourceType,
    pub metric_name: String,
    pub target: MetricTarget,
}

impl MetricSpec {
    pub fn external(metric_name: String, target: MetricTarget) -> Self {
        Self {
            source_type: MetricSourceType::External,
            metric_name,
            target,
        }
    }
}

/// A single metric reading returned to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricValue {
    pub metric_name: String,
    pub value: MilliValue,
    /// Unix timestamp (seconds) when the sample was taken.
    pub timestamp: u64,
}

impl MetricValue {
    /// Encode a raw sample for `metric_name`, stamped with the current time.
    pub fn milli(metric_name: &str, sample: f64) -> Self {
        Self {
            metric_name: metric_name.to_string(),
            value: MilliValue::from_f64(sample),
            timestamp: epoch_secs(),
        }
    }
}

/// Replace characters the orchestrator rejects in metric names with `-`.
pub fn normalize_metric_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '.' | ':' | '%' | '(' | ')' | '"' | ' ' | '<' | '>' | '$' | '#' | '!' | '*' => {
                '-'
            }
            other => other,
        })
        .collect()
}

/// Prefix a metric name with the scaler index so several triggers of the
/// same kind on one workload advertise distinct names.
pub fn metric_name_with_index(scaler_index: usize, metric_name: &str) -> String {
    format!("s{scaler_index}-{metric_name}")
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
