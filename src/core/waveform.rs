// SRF Engine - Waveform Synthesizer
//
// Open-RyR proxy of a sampled event as a product of a rising and a falling
// logistic ("sigmoid bump"). Long events add a second bump for the plateau.

use serde::{Deserialize, Serialize};

use crate::core::sampler::SampledEvent;

/// `k = GRADIENT_SLOPE * phase + GRADIENT_INTERCEPT`, fitted to the spatial
/// model's release traces.
pub const GRADIENT_SLOPE: f64 = 0.16980607;
pub const GRADIENT_INTERCEPT: f64 = 0.00254852;

/// Rise and decay phase (ms) of the plateau component.
pub const PLATEAU_PHASE: f64 = 50.0;

/// Logistic gradient for a rise or decay phase of `phase_ms`.
pub fn gradient(phase_ms: f64) -> f64 {
    GRADIENT_SLOPE * phase_ms + GRADIENT_INTERCEPT
}

pub fn sigmoid_rising(t: f64, thalf: f64, k: f64) -> f64 {
    1.0 / (1.0 + (-(t - thalf) / k).exp())
}

pub fn sigmoid_falling(t: f64, thalf: f64, k: f64) -> f64 {
    1.0 / (1.0 + ((t - thalf) / k).exp())
}

/// `amplitude * rising(t; thalf1, k1) * falling(t; thalf2, k2)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SigmoidBump {
    pub amplitude: f64,
    pub thalf1: f64,
    pub thalf2: f64,
    pub k1: f64,
    pub k2: f64,
}

impl SigmoidBump {
    /// Bump starting at `start` that rises for `rise` ms and decays for
    /// `decay` ms. Half-activation times sit at the segment midpoints.
    pub fn from_phases(amplitude: f64, start: f64, rise: f64, decay: f64) -> Self {
        Self {
            amplitude,
            thalf1: start + 0.5 * rise,
            thalf2: start + rise + 0.5 * decay,
            k1: gradient(rise),
            k2: gradient(decay),
        }
    }

    pub fn eval(&self, t: f64) -> f64 {
        self.amplitude
            * sigmoid_rising(t, self.thalf1, self.k1)
            * sigmoid_falling(t, self.thalf2, self.k2)
    }
}

/// Absolute-time waveform of one event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waveform {
    pub spike: SigmoidBump,
    pub plateau: Option<SigmoidBump>,
    /// Time (ms) at which the sampled event window closes.
    pub end: f64,
}

impl Waveform {
    /// Places `event` on the simulation clock, with offsets counted from `t_armed`.
    pub fn from_event(event: &SampledEvent, t_armed: f64) -> Self {
        let spike = SigmoidBump::from_phases(
            event.peak,
            t_armed + event.ti,
            event.time_to_peak,
            event.decay_time,
        );
        // Plateau rises over its first 50 ms and decays over its last 50 ms.
        let plateau = event.plateau.map(|p| {
            let start = t_armed + p.ti;
            SigmoidBump {
                amplitude: p.amplitude,
                thalf1: start + 0.5 * PLATEAU_PHASE,
                thalf2: start + event.duration - 0.5 * PLATEAU_PHASE,
                k1: gradient(PLATEAU_PHASE),
                k2: gradient(PLATEAU_PHASE),
            }
        });
        Self {
            spike,
            plateau,
            end: t_armed + event.start() + event.duration,
        }
    }

    /// Open-RyR proxy at time `t`.
    pub fn eval(&self, t: f64) -> f64 {
        self.spike.eval(t) + self.plateau.map_or(0.0, |p| p.eval(t))
    }
}
