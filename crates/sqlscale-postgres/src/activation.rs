//! Activation threshold.

/// A workload is active only when the sample is strictly above the
/// activation target. A sample equal to the target is idle.
pub fn is_active(sample: f64, activation_target: f64) -> bool {
    sample > activation_target
}
