// SRF Engine - Probability Evaluator
//
// Maps junctional SR calcium (mM) to the probability that an armed
// instance produces a spontaneous event.

use crate::core::parameters::ProbabilityFunction;

/// Steepness of the controllable variant relative to its range.
pub const RANGE_TO_STEEPNESS: f64 = 0.1;

/// Logistic threshold function `1 / (1 + exp(-(ca - threshold) / k))`.
pub fn logistic_probability(ca_sr: f64, threshold: f64, k: f64) -> f64 {
    1.0 / (1.0 + (-(ca_sr - threshold) / k).exp())
}

impl ProbabilityFunction {
    /// Event probability at `ca_sr`, with the threshold moved by
    /// `threshold_shift` mM (tissue heterogeneity).
    ///
    /// Monotonically non-decreasing in `ca_sr`; constant for `Fixed`.
    pub fn evaluate(&self, ca_sr: f64, threshold_shift: f64) -> f64 {
        match *self {
            ProbabilityFunction::Fixed { probability } => probability,
            ProbabilityFunction::Fitted { threshold, k } => {
                logistic_probability(ca_sr, threshold + threshold_shift, k)
            }
            ProbabilityFunction::Controllable { threshold, range } => {
                logistic_probability(ca_sr, threshold + threshold_shift, RANGE_TO_STEEPNESS * range)
            }
        }
    }
}
