// SRF Engine - Offline Diagnostics
//
// Batch routines for inspecting a parameter set outside a simulation:
// inverse-CDF curves, Monte-Carlo histograms of sampled events, and sweeps
// of the resolved parameters across SR calcium. Output is plain
// whitespace-separated text, one row per line.
//
// None of this runs on the per-timestep path.

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use crate::core::config::VarianceConfig;
use crate::core::draws::{EventDraws, UniformSource};
use crate::core::parameters::{AmplitudeFit, DistributionParameters};
use crate::core::resolver::{ResolvedParameters, DURATION_CF_SEP};
use crate::core::sampler::{peak_amplitude, sample_event, two_sided_inverse, DRAW_EDGE};

/// Bin width (ms) of the initiation-time histogram.
pub const INITIATION_BIN_MS: f64 = 10.0;
/// Bin width (ms) of the duration histogram.
pub const DURATION_BIN_MS: f64 = 10.0;
/// Bin width of the peak-amplitude histogram.
pub const PEAK_BIN: f64 = 0.01;

/// Which distribution an inverse-CDF curve describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quantity {
    Initiation,
    Duration,
}

/// One point of an inverse-CDF curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CdfPoint {
    pub cumulative: f64,
    pub value: f64,
}

/// `points` evenly spaced cumulative frequencies between the draw edges
/// (inclusive).
fn cumulative_grid(points: usize) -> impl Iterator<Item = f64> {
    let span = 1.0 - 2.0 * DRAW_EDGE;
    let steps = points.saturating_sub(1).max(1) as f64;
    (0..points).map(move |i| DRAW_EDGE + span * i as f64 / steps)
}

/// Evaluates the inverse CDF of `quantity` on the cumulative grid.
pub fn inverse_cdf_curve(
    resolved: &ResolvedParameters,
    quantity: Quantity,
    points: usize,
) -> Vec<CdfPoint> {
    let (sep, cf_sep, k_left, k_right) = match quantity {
        Quantity::Initiation => (
            resolved.ti_sep,
            resolved.ti_cf_sep,
            resolved.k_ti_f1,
            resolved.k_ti_f2,
        ),
        Quantity::Duration => (
            resolved.median_duration,
            DURATION_CF_SEP,
            resolved.k_d_f1,
            resolved.k_d_f2,
        ),
    };
    cumulative_grid(points)
        .map(|cumulative| CdfPoint {
            cumulative,
            value: two_sided_inverse(cumulative, sep, cf_sep, k_left, k_right),
        })
        .collect()
}

/// Inverse CDF of the total peak amplitude for an event of `duration_ms`.
///
/// The peak is a uniform perturbation around its duration-dependent median,
/// so the curve is linear until it meets the amplitude bounds.
pub fn peak_cdf_curve(
    fit: &AmplitudeFit,
    duration_ms: f64,
    scale: f64,
    points: usize,
) -> Vec<CdfPoint> {
    cumulative_grid(points)
        .map(|cumulative| CdfPoint {
            cumulative,
            value: peak_amplitude(fit, duration_ms, cumulative, scale),
        })
        .collect()
}

/// Fixed-width histogram anchored at zero. Negative values land in bin 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    bin_width: f64,
    counts: Vec<u64>,
    total: u64,
}

impl Histogram {
    pub fn new(bin_width: f64) -> Self {
        Self {
            bin_width,
            counts: Vec::new(),
            total: 0,
        }
    }

    pub fn add(&mut self, value: f64) {
        let bin = (value / self.bin_width).floor().max(0.0) as usize;
        if bin >= self.counts.len() {
            self.counts.resize(bin + 1, 0);
        }
        self.counts[bin] += 1;
        self.total += 1;
    }

    pub fn bin_width(&self) -> f64 {
        self.bin_width
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Center of bin `index`.
    pub fn bin_center(&self, index: usize) -> f64 {
        (index as f64 + 0.5) * self.bin_width
    }

    /// Center of the fullest bin (the lowest one on ties).
    pub fn mode(&self) -> Option<f64> {
        let (index, _) = self
            .counts
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > 0)
            .fold(None, |best: Option<(usize, u64)>, (i, &count)| match best {
                Some((_, best_count)) if best_count >= count => best,
                _ => Some((i, count)),
            })?;
        Some(self.bin_center(index))
    }

    /// Writes `center count frequency` rows for non-empty bins.
    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let total = self.total.max(1) as f64;
        for (index, &count) in self.counts.iter().enumerate() {
            if count == 0 {
                continue;
            }
            writeln!(out, "{} {} {}", self.bin_center(index), count, count as f64 / total)?;
        }
        Ok(())
    }
}

/// Histograms of initiation time, duration and total peak amplitude.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventHistograms {
    pub initiation: Histogram,
    pub duration: Histogram,
    pub peak: Histogram,
}

/// Samples `samples` events at a fixed SR calcium and bins them.
///
/// The probability gate is skipped: every sample is an event.
#[tracing::instrument(skip(params, variance, rng), fields(set = %params.key.set))]
pub fn sample_histograms<U: UniformSource + ?Sized>(
    params: &DistributionParameters,
    ca_sr: f64,
    samples: usize,
    variance: &VarianceConfig,
    duration_width_ms: Option<f64>,
    rng: &mut U,
) -> EventHistograms {
    let resolved = params.resolve(ca_sr, duration_width_ms);
    let mut histograms = EventHistograms {
        initiation: Histogram::new(INITIATION_BIN_MS),
        duration: Histogram::new(DURATION_BIN_MS),
        peak: Histogram::new(PEAK_BIN),
    };
    for _ in 0..samples {
        let draws = EventDraws::draw(&mut *rng);
        let event = sample_event(&resolved, &params.amplitude, variance, &draws);
        histograms.initiation.add(event.start());
        histograms.duration.add(event.duration);
        histograms.peak.add(event.total_peak());
    }
    tracing::debug!(samples, "sampled diagnostic histograms");
    histograms
}

/// Resolved parameters and release probability at one SR calcium.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepRow {
    pub probability: f64,
    pub resolved: ResolvedParameters,
}

/// Resolves `params` at `steps` evenly spaced calcium values from `from_mm`
/// to `to_mm` (inclusive).
pub fn calcium_sweep(
    params: &DistributionParameters,
    from_mm: f64,
    to_mm: f64,
    steps: usize,
    duration_width_ms: Option<f64>,
) -> Vec<SweepRow> {
    let intervals = steps.saturating_sub(1).max(1) as f64;
    (0..steps)
        .map(|i| {
            let ca_sr = from_mm + (to_mm - from_mm) * i as f64 / intervals;
            SweepRow {
                probability: params.probability.evaluate(ca_sr, 0.0),
                resolved: params.resolve(ca_sr, duration_width_ms),
            }
        })
        .collect()
}

pub const SWEEP_HEADER: &str =
    "CaSR probability ti_sep ti_cf_sep k_ti_F1 k_ti_F2 median_duration k_D_F1 k_D_F2";

/// Writes a header comment then one row per sweep point.
pub fn write_sweep<W: Write>(rows: &[SweepRow], out: &mut W) -> io::Result<()> {
    writeln!(out, "# {}", SWEEP_HEADER)?;
    for row in rows {
        let r = &row.resolved;
        writeln!(
            out,
            "{} {} {} {} {} {} {} {} {}",
            r.ca_sr,
            row.probability,
            r.ti_sep,
            r.ti_cf_sep,
            r.k_ti_f1,
            r.k_ti_f2,
            r.median_duration,
            r.k_d_f1,
            r.k_d_f2
        )?;
    }
    Ok(())
}

/// Writes `cumulative value` rows.
pub fn write_curve<W: Write>(curve: &[CdfPoint], out: &mut W) -> io::Result<()> {
    for point in curve {
        writeln!(out, "{} {}", point.cumulative, point.value)?;
    }
    Ok(())
}
