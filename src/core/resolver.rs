// SRF Engine - Distribution Parameter Resolver
//
// Turns a parameter set and an SR calcium snapshot into the concrete
// shape parameters of the initiation-time and duration distributions.

use serde::{Deserialize, Serialize};

use crate::core::parameters::{
    Bounds, CalciumDependence, DistributionParameters, DURATION_RIGHT_RATIO,
    INITIATION_RIGHT_RATIO, WIDTH_TO_GRADIENT,
};

/// Cumulative frequency at the duration separation point (the median).
pub const DURATION_CF_SEP: f64 = 0.5;

/// Distribution shape for one SR calcium snapshot.
///
/// All `k_*` values are logistic gradient parameters in ms; `*_f1` is the
/// left (below separation) side and `*_f2` the right side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedParameters {
    /// SR calcium the parameters were resolved for (mM, before any offset).
    pub ca_sr: f64,
    pub ti_sep: f64,
    /// Cumulative frequency of the initiation distribution at `ti_sep`.
    pub ti_cf_sep: f64,
    pub k_ti_f1: f64,
    pub k_ti_f2: f64,
    pub median_duration: f64,
    pub k_d_f1: f64,
    pub k_d_f2: f64,
}

/// Duration gradient pair for an explicit width in ms.
pub fn duration_gradients_from_width(width_ms: f64) -> (f64, f64) {
    let left = WIDTH_TO_GRADIENT * width_ms;
    (left, DURATION_RIGHT_RATIO * left)
}

/// Initiation gradient pair for an explicit width in ms.
pub fn initiation_gradients_from_width(width_ms: f64) -> (f64, f64) {
    let left = WIDTH_TO_GRADIENT * width_ms;
    (left, INITIATION_RIGHT_RATIO * left)
}

/// Cumulative frequency at the separation point that keeps the two-sided
/// density continuous there, so the distribution mode sits at the
/// separation point.
pub fn continuous_cf_sep(k_left: f64, k_right: f64) -> f64 {
    k_left / (k_left + k_right)
}

/// Exponential interpolation weight in [0, 1] for position `x` in [0, 1].
pub fn exponential_blend(x: f64, rate: f64) -> f64 {
    let x = x.clamp(0.0, 1.0);
    if rate.abs() < 1e-9 {
        return x;
    }
    (1.0 - (-rate * x).exp()) / (1.0 - (-rate).exp())
}

/// Power-law blend of `value`'s position inside `resolved` onto `target`.
fn power_law_width(value: f64, resolved: Bounds, target: Bounds, exponent: f64) -> f64 {
    let span = resolved.span();
    let position = if span > 0.0 {
        ((value - resolved.min) / span).clamp(0.0, 1.0)
    } else {
        1.0
    };
    target.min + target.span() * position.powf(exponent)
}

impl DistributionParameters {
    /// Resolves the distribution shape at `ca_sr` mM.
    ///
    /// `duration_width_ms` overrides the duration width the model would
    /// otherwise derive from median duration.
    pub fn resolve(&self, ca_sr: f64, duration_width_ms: Option<f64>) -> ResolvedParameters {
        let (ti_sep, k_ti_f1, k_ti_f2, median_duration, derived_duration) = match self.dependence {
            CalciumDependence::Fixed {
                ti_sep,
                ti_width_ms,
                median_duration,
                duration_width_ms,
            } => {
                let (f1, f2) = initiation_gradients_from_width(ti_width_ms);
                (
                    ti_sep,
                    f1,
                    f2,
                    median_duration,
                    duration_gradients_from_width(duration_width_ms),
                )
            }
            CalciumDependence::Fitted {
                offset_mm,
                ti_sep,
                k_ti_f1,
                k_ti_f2,
                median_duration,
                k_d_f1,
                k_d_f2,
            } => {
                let ca = ca_sr + offset_mm;
                let md = median_duration.eval(ca);
                (
                    ti_sep.eval(ca),
                    k_ti_f1.eval(ca),
                    k_ti_f2.eval(ca),
                    md,
                    (k_d_f1.eval(md), k_d_f2.eval(md)),
                )
            }
            CalciumDependence::Interpolated {
                casr_min,
                casr_max,
                blend_rate,
                width_exponent,
                ti_sep,
                ti_width_ms,
                median_duration,
                duration_width_ms,
            } => {
                let position = (ca_sr - casr_min) / (casr_max - casr_min);
                let weight = exponential_blend(position, blend_rate);
                let sep = ti_sep.max - ti_sep.span() * weight;
                let md = median_duration.max - median_duration.span() * weight;
                let ti_width = power_law_width(sep, ti_sep, ti_width_ms, width_exponent);
                let d_width =
                    power_law_width(md, median_duration, duration_width_ms, width_exponent);
                let (f1, f2) = initiation_gradients_from_width(ti_width);
                (sep, f1, f2, md, duration_gradients_from_width(d_width))
            }
        };

        let (k_d_f1, k_d_f2) = match duration_width_ms {
            Some(width) => duration_gradients_from_width(width),
            None => derived_duration,
        };

        tracing::trace!(ca_sr, ti_sep, median_duration, "resolved distribution parameters");

        ResolvedParameters {
            ca_sr,
            ti_sep,
            ti_cf_sep: continuous_cf_sep(k_ti_f1, k_ti_f2),
            k_ti_f1,
            k_ti_f2,
            median_duration,
            k_d_f1,
            k_d_f2,
        }
    }
}
