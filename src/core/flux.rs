// SRF Engine - Flux Multipliers
//
// Duration-dependent corrections for the exchanger current and the
// release-rate constant while a surrogate event is active. The closed-form
// surrogate over-drives both relative to the spatial model, more so for
// longer events.

use serde::{Deserialize, Serialize};

use crate::core::parameters::LogisticFit;

/// Proxy signal above which the multipliers depart from identity.
pub const FLUX_ACTIVITY_THRESHOLD: f64 = 0.002;

/// NCX multiplier: 0.65 for short events falling toward 0.25 for long ones.
const NCX_FIT: LogisticFit = LogisticFit::new(0.65, 0.25, 400.0, 100.0);
/// Release-rate multiplier: 0.75 for short events falling toward 0.4.
const RELEASE_FIT: LogisticFit = LogisticFit::new(0.75, 0.4, 400.0, 120.0);

/// Multipliers applied by the host's NCX and RyR-flux computations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FluxMultipliers {
    pub ncx: f64,
    pub release_rate: f64,
}

impl FluxMultipliers {
    pub const IDENTITY: FluxMultipliers = FluxMultipliers {
        ncx: 1.0,
        release_rate: 1.0,
    };

    /// Multipliers for proxy signal `nryro` of an event lasting `duration` ms.
    pub fn compute(nryro: f64, duration: f64) -> Self {
        if nryro <= FLUX_ACTIVITY_THRESHOLD {
            return Self::IDENTITY;
        }
        Self {
            ncx: NCX_FIT.eval(duration),
            release_rate: RELEASE_FIT.eval(duration),
        }
    }
}

impl Default for FluxMultipliers {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_at_activation_boundary() {
        let m = FluxMultipliers::compute(FLUX_ACTIVITY_THRESHOLD, 500.0);
        assert_eq!(m.ncx, 1.0);
        assert_eq!(m.release_rate, 1.0);
    }

    #[test]
    fn above_boundary_depends_on_duration_only() {
        let just_above = FLUX_ACTIVITY_THRESHOLD + 1e-9;
        let a = FluxMultipliers::compute(just_above, 300.0);
        let b = FluxMultipliers::compute(0.5, 300.0);
        assert_eq!(a, b);
        assert!(a.ncx < 1.0 && a.release_rate < 1.0);
    }

    #[test]
    fn multipliers_stay_in_documented_ranges() {
        for i in 0..=150 {
            let duration = 20.0 + i as f64 * 10.0;
            let m = FluxMultipliers::compute(0.1, duration);
            assert!((0.25..=0.65).contains(&m.ncx), "ncx {} at {}", m.ncx, duration);
            assert!(
                (0.4..=0.75).contains(&m.release_rate),
                "release {} at {}",
                m.release_rate,
                duration
            );
        }
    }

    #[test]
    fn longer_events_get_stronger_correction() {
        let short = FluxMultipliers::compute(0.1, 100.0);
        let long = FluxMultipliers::compute(0.1, 1200.0);
        assert!(long.ncx < short.ncx);
        assert!(long.release_rate < short.release_rate);
    }
}
