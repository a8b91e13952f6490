// SRF Engine - Uniform Draws
//
// The random-number seam between the host and the sampler. Any uniform
// [0, 1) generator works; every `rand::Rng` already qualifies.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Source of uniform variates in `[0, 1)`.
pub trait UniformSource {
    fn uniform(&mut self) -> f64;
}

impl<R: Rng + ?Sized> UniformSource for R {
    fn uniform(&mut self) -> f64 {
        self.gen::<f64>()
    }
}

/// Uniform draws consumed per armed event: one probability gate plus the
/// five that shape the event.
pub const DRAWS_PER_EVENT: usize = 6;

/// The five uniforms that parameterize one sampled event, taken atomically
/// at arming time in field order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventDraws {
    pub initiation: f64,
    pub duration: f64,
    pub time_to_peak: f64,
    pub peak: f64,
    pub plateau: f64,
}

impl EventDraws {
    pub fn draw<U: UniformSource + ?Sized>(source: &mut U) -> Self {
        Self {
            initiation: source.uniform(),
            duration: source.uniform(),
            time_to_peak: source.uniform(),
            peak: source.uniform(),
            plateau: source.uniform(),
        }
    }

    /// All draws at the median.
    pub fn median() -> Self {
        Self {
            initiation: 0.5,
            duration: 0.5,
            time_to_peak: 0.5,
            peak: 0.5,
            plateau: 0.5,
        }
    }
}

/// Replays a fixed sequence of uniforms, cycling when exhausted.
///
/// Useful for reproducing a recorded run exactly.
#[derive(Debug, Clone)]
pub struct ScriptedDraws {
    values: Vec<f64>,
    cursor: usize,
}

impl ScriptedDraws {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values, cursor: 0 }
    }

    /// Number of values handed out so far.
    pub fn consumed(&self) -> usize {
        self.cursor
    }
}

impl UniformSource for ScriptedDraws {
    fn uniform(&mut self) -> f64 {
        if self.values.is_empty() {
            return 0.5;
        }
        let value = self.values[self.cursor % self.values.len()];
        self.cursor += 1;
        value
    }
}
