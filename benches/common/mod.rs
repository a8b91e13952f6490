// Shared benchmark setup module with factory functions for creating fixtures.
//
// All factories are deterministic: identical inputs produce identical outputs.

#![allow(dead_code)]
use criterion::Criterion;
use rand::rngs::StdRng;
use rand::SeedableRng;
use spontaneous_release::core::resolver::ResolvedParameters;
use spontaneous_release::{DistributionParameters, ParameterSetName, SrfConfig, SrfPopulation};
use std::time::Duration;

/// Shared Criterion configuration for consistent benchmark timing.
///
/// - sample_size(10): reduced from default 100
/// - measurement_time(1s): reduced from default 5s
/// - warm_up_time(500ms): reduced from default 3s
/// - noise_threshold(0.05): 5% regression threshold
pub fn criterion_config() -> Criterion {
    Criterion::default()
        .sample_size(10)
        .measurement_time(Duration::from_secs(1))
        .warm_up_time(Duration::from_millis(500))
        .noise_threshold(0.05)
        .significance_level(0.05)
}

/// Seeded generator so every run samples the same events.
pub fn seeded_rng() -> StdRng {
    StdRng::seed_from_u64(0x5EED)
}

/// Parameter sets covering each dependence kind.
pub fn parameter_sets() -> Vec<(&'static str, DistributionParameters)> {
    let sets = [
        ("direct_default", DistributionParameters::direct_control(ParameterSetName::Default, &[])),
        ("cell3d_control", DistributionParameters::cell_3d(ParameterSetName::Control)),
        ("general_long", DistributionParameters::general(ParameterSetName::Long, &[])),
    ];
    sets.into_iter()
        .map(|(name, params)| (name, params.expect("built-in parameter set")))
        .collect()
}

/// Resolved parameters of the 3D_cell Control set at 1.0 mM.
pub fn control_resolved() -> ResolvedParameters {
    DistributionParameters::cell_3d(ParameterSetName::Control)
        .expect("built-in parameter set")
        .resolve(1.0, None)
}

/// Dynamic 3D_cell Control population of `cells` instances.
pub fn control_population(cells: usize) -> SrfPopulation {
    SrfPopulation::from_config(&SrfConfig::default(), cells).expect("default config is valid")
}

/// SR calcium trace that drifts slowly enough to re-arm retired instances.
pub fn calcium_at(step: usize) -> f64 {
    1.0 + 0.05 * ((step as f64) * 0.01).sin()
}

// ---------------------------------------------------------------------------
// How to Add a New Benchmark
// ---------------------------------------------------------------------------
//
// 1. Pick the group file for the subsystem:
//    - benches/sampling.rs   - resolver, sampler and waveform evaluation
//    - benches/population.rs - per-timestep stepping of whole populations
//
// 2. Add a function taking `&mut Criterion` that builds fixtures from this
//    module and wraps the measured call in `black_box`.
//
// 3. List it in the `criterion_group!` targets with
//    `config = common::criterion_config()`.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_sets_build() {
        assert_eq!(parameter_sets().len(), 3);
    }

    #[test]
    fn control_population_has_requested_size() {
        assert_eq!(control_population(16).len(), 16);
    }

    #[test]
    fn calcium_trace_is_deterministic() {
        assert_eq!(calcium_at(250), calcium_at(250));
        assert!((calcium_at(0) - 1.0).abs() < 1e-12);
    }
}
