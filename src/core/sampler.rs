// SRF Engine - Inverse-CDF Sampler
//
// Draws the initiation time, duration, time to peak and amplitudes of one
// spontaneous release event from two-sided logistic distributions.

use serde::{Deserialize, Serialize};

use crate::core::config::VarianceConfig;
use crate::core::draws::EventDraws;
use crate::core::parameters::AmplitudeFit;
use crate::core::resolver::{ResolvedParameters, DURATION_CF_SEP};

/// Uniform draws closer than this to 0 or 1 are pulled in to the boundary.
pub const DRAW_EDGE: f64 = 0.0002;
/// Durations below this (ms) are treated as implausible artifacts.
pub const MIN_PLAUSIBLE_DURATION: f64 = 20.0;
/// Duration ceiling (ms); implausible durations are snapped to it.
pub const MAX_DURATION: f64 = 1500.0;
/// Events at least this long (ms) split into spike plus plateau.
pub const LONG_EVENT_DURATION: f64 = 300.0;
/// Physiological ceiling of the open-RyR proxy.
pub const MAX_PEAK: f64 = 0.9;

const TIME_TO_PEAK_BASE: f64 = 24.0;
const TIME_TO_PEAK_MARGIN: f64 = 52.0;
/// Shortest rise or decay phase (ms) a sampled waveform may have.
const MIN_PHASE: f64 = 2.0;

/// Time to peak (ms) of the spike riding on a plateau.
pub const SPIKE_TIME_TO_PEAK: f64 = 50.0;
/// Decay time (ms) of the spike riding on a plateau.
pub const SPIKE_DECAY_TIME: f64 = 35.0;

/// Inverse of the two-sided logistic CDF.
///
/// Below `cf_sep` the left width `k_left` applies, above it `k_right`.
/// `u` is clamped to `[DRAW_EDGE, 1 - DRAW_EDGE]` first so the logarithm
/// argument stays positive.
pub fn two_sided_inverse(u: f64, sep: f64, cf_sep: f64, k_left: f64, k_right: f64) -> f64 {
    let u = u.clamp(DRAW_EDGE, 1.0 - DRAW_EDGE);
    if u < cf_sep {
        -k_left * (2.0 * cf_sep / u - 1.0).ln() + sep
    } else {
        -k_right * (2.0 * (1.0 - cf_sep) / (u + 1.0 - 2.0 * cf_sep) - 1.0).ln() + sep
    }
}

/// Initiation time (ms after arming), floored at zero.
pub fn sample_initiation(resolved: &ResolvedParameters, u: f64) -> f64 {
    two_sided_inverse(
        u,
        resolved.ti_sep,
        resolved.ti_cf_sep,
        resolved.k_ti_f1,
        resolved.k_ti_f2,
    )
    .max(0.0)
}

/// Event duration (ms) in `[MIN_PLAUSIBLE_DURATION, MAX_DURATION]`.
///
/// Implausibly short results are replaced by the ceiling rather than
/// resampled, so near-zero artifacts never enter the statistics.
pub fn sample_duration(resolved: &ResolvedParameters, u: f64) -> f64 {
    let duration = two_sided_inverse(
        u,
        resolved.median_duration,
        DURATION_CF_SEP,
        resolved.k_d_f1,
        resolved.k_d_f2,
    );
    if !(MIN_PLAUSIBLE_DURATION..=MAX_DURATION).contains(&duration) {
        MAX_DURATION
    } else {
        duration
    }
}

/// Time to peak (ms) for an event of `duration` ms.
///
/// `scale` is the variance knob: 0 always yields the midpoint, 1 uses the
/// raw draw.
pub fn time_to_peak(duration: f64, u: f64, scale: f64) -> f64 {
    let fraction = 0.5 + scale * (u - 0.5);
    (TIME_TO_PEAK_BASE + fraction * (duration - TIME_TO_PEAK_MARGIN))
        .clamp(MIN_PHASE, (duration - MIN_PHASE).max(MIN_PHASE))
}

/// Total peak amplitude for an event of `duration` ms.
pub fn peak_amplitude(fit: &AmplitudeFit, duration: f64, u: f64, scale: f64) -> f64 {
    let median = fit.peak_a * duration.powf(fit.peak_h) + fit.peak_min;
    (median + scale * fit.peak_spread * (u - 0.5)).clamp(fit.peak_min, MAX_PEAK)
}

/// Plateau amplitude of a long event, never above `peak`.
pub fn plateau_amplitude(fit: &AmplitudeFit, duration: f64, peak: f64, u: f64, scale: f64) -> f64 {
    let median = fit.plateau_a * duration.powf(fit.plateau_h) + fit.plateau_min;
    (median + scale * fit.plateau_spread * (u - 0.5)).clamp(0.0, peak)
}

/// Sustained component of a long event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plateau {
    /// Start offset (ms after arming).
    pub ti: f64,
    pub amplitude: f64,
}

/// One sampled release event. Immutable until the event retires.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampledEvent {
    /// Start offset of the spike (ms after arming).
    pub ti: f64,
    /// Duration of the whole event (ms).
    pub duration: f64,
    pub time_to_peak: f64,
    pub decay_time: f64,
    /// Spike amplitude (the whole amplitude for short events).
    pub peak: f64,
    pub plateau: Option<Plateau>,
}

impl SampledEvent {
    /// Initiation offset of the event as a whole.
    pub fn start(&self) -> f64 {
        self.plateau.map_or(self.ti, |p| p.ti)
    }

    /// Spike plus plateau amplitude.
    pub fn total_peak(&self) -> f64 {
        self.peak + self.plateau.map_or(0.0, |p| p.amplitude)
    }

    pub fn is_long(&self) -> bool {
        self.plateau.is_some()
    }
}

/// Samples one event from its resolved distributions and draws.
pub fn sample_event(
    resolved: &ResolvedParameters,
    amplitude: &AmplitudeFit,
    variance: &VarianceConfig,
    draws: &EventDraws,
) -> SampledEvent {
    let ti = sample_initiation(resolved, draws.initiation);
    let duration = sample_duration(resolved, draws.duration);
    let ttp = time_to_peak(duration, draws.time_to_peak, variance.time_to_peak_scale);
    let peak = peak_amplitude(amplitude, duration, draws.peak, variance.peak_scale);

    if duration < LONG_EVENT_DURATION {
        return SampledEvent {
            ti,
            duration,
            time_to_peak: ttp,
            decay_time: duration - ttp,
            peak,
            plateau: None,
        };
    }

    let plateau = plateau_amplitude(
        amplitude,
        duration,
        peak,
        draws.plateau,
        variance.plateau_scale,
    );
    // Spike is placed so it still peaks at the sampled time to peak.
    let spike_offset = (ttp - SPIKE_TIME_TO_PEAK).max(0.0);
    SampledEvent {
        ti: ti + spike_offset,
        duration,
        time_to_peak: SPIKE_TIME_TO_PEAK,
        decay_time: SPIKE_DECAY_TIME,
        peak: peak - plateau,
        plateau: Some(Plateau {
            ti,
            amplitude: plateau,
        }),
    }
}
