// SRF Engine - Distribution Parameter Store
//
// Immutable coefficient sets for the probability, initiation-time, duration
// and amplitude functions, keyed by (mode, model, parameter set).

use serde::{Deserialize, Serialize};

use crate::core::config::{ParameterSetName, SrfConfig, SrfMode, SrfModel};
use crate::error::SrfError;

/// Number of coefficients a `User_control` set needs in `Direct_Control` mode.
pub const DIRECT_CONTROL_COEFFICIENTS: usize = 7;
/// Number of coefficients a `User_control` set needs for `Dynamic`/`General`.
pub const GENERAL_COEFFICIENTS: usize = 12;

/// Conversion from a distribution width in ms to a logistic gradient parameter.
/// Empirical calibration constant, reproduced exactly.
pub const WIDTH_TO_GRADIENT: f64 = 0.145;
/// Right-hand initiation width relative to the left-hand one.
pub const INITIATION_RIGHT_RATIO: f64 = 1.5;
/// Right-hand duration width factor applied on top of `WIDTH_TO_GRADIENT`.
pub const DURATION_RIGHT_RATIO: f64 = 1.8;

/// CaSR offset (mM) applied to the 3D-cell distribution fits.
///
/// Empirical: the fits were made against calcium-clamp data and sit
/// better on paced data with this shift. It is an approximation, not a law.
pub const CELL3D_CASR_OFFSET_MM: f64 = -0.05;

/// Exponent of the power-law width blend for the General model (`CaSR_width_H`).
pub const GENERAL_WIDTH_EXPONENT: f64 = 2.0;
/// Rate of the exponential interpolation blend for the General model.
pub const GENERAL_BLEND_RATE: f64 = 2.5;

/// Exponential decay plus floor, clamped to a maximum:
/// `min(amplitude * exp(-rate * x) + floor, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExpFit {
    pub amplitude: f64,
    pub rate: f64,
    pub floor: f64,
    pub max: f64,
}

impl ExpFit {
    pub const fn new(amplitude: f64, rate: f64, floor: f64, max: f64) -> Self {
        Self {
            amplitude,
            rate,
            floor,
            max,
        }
    }

    pub fn eval(&self, x: f64) -> f64 {
        (self.amplitude * (-self.rate * x).exp() + self.floor).min(self.max)
    }

    /// The same curve translated so that `shifted(d).eval(x) == eval(x + d)`
    /// below the clamp.
    pub fn shifted(&self, dx: f64) -> Self {
        Self {
            amplitude: self.amplitude * (-self.rate * dx).exp(),
            ..*self
        }
    }
}

/// Single logistic rising from `low` to `high` around `midpoint`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogisticFit {
    pub low: f64,
    pub high: f64,
    pub midpoint: f64,
    pub slope: f64,
}

impl LogisticFit {
    pub const fn new(low: f64, high: f64, midpoint: f64, slope: f64) -> Self {
        Self {
            low,
            high,
            midpoint,
            slope,
        }
    }

    pub fn eval(&self, x: f64) -> f64 {
        self.low + (self.high - self.low) / (1.0 + (-(x - self.midpoint) / self.slope).exp())
    }
}

/// Closed interval `[min, max]` a resolved quantity is interpolated across.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub max: f64,
    pub min: f64,
}

impl Bounds {
    pub const fn new(max: f64, min: f64) -> Self {
        Self { max, min }
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

/// Probability-function coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ProbabilityFunction {
    /// Calcium-independent probability.
    Fixed { probability: f64 },
    /// Fitted threshold and steepness (mM).
    Fitted { threshold: f64, k: f64 },
    /// Threshold with steepness `0.1 * range` (mM).
    Controllable { threshold: f64, range: f64 },
}

/// Calcium dependence of the initiation-time and duration distributions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CalciumDependence {
    /// `Direct_Control`: fixed distributions.
    Fixed {
        ti_sep: f64,
        ti_width_ms: f64,
        median_duration: f64,
        duration_width_ms: f64,
    },
    /// `Dynamic`/`3D_cell`: exponential fits evaluated at `CaSR + offset`.
    Fitted {
        offset_mm: f64,
        ti_sep: ExpFit,
        k_ti_f1: ExpFit,
        k_ti_f2: ExpFit,
        median_duration: ExpFit,
        k_d_f1: LogisticFit,
        k_d_f2: LogisticFit,
    },
    /// `Dynamic`/`General`: interpolation across `[casr_min, casr_max]`.
    Interpolated {
        casr_min: f64,
        casr_max: f64,
        blend_rate: f64,
        width_exponent: f64,
        ti_sep: Bounds,
        ti_width_ms: Bounds,
        median_duration: Bounds,
        duration_width_ms: Bounds,
    },
}

/// Peak and plateau amplitude coefficients.
///
/// Median peak is `peak_a * duration^peak_h + peak_min`; the plateau of a
/// long event follows the same form with its own coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmplitudeFit {
    pub peak_a: f64,
    pub peak_h: f64,
    pub peak_min: f64,
    /// Full width of the uniform perturbation around the median peak.
    pub peak_spread: f64,
    pub plateau_a: f64,
    pub plateau_h: f64,
    pub plateau_min: f64,
    pub plateau_spread: f64,
}

impl Default for AmplitudeFit {
    fn default() -> Self {
        Self {
            peak_a: 2.2,
            peak_h: -0.45,
            peak_min: 0.05,
            peak_spread: 0.1,
            plateau_a: 0.9,
            plateau_h: -0.35,
            plateau_min: 0.0,
            plateau_spread: 0.05,
        }
    }
}

/// Store key of a parameter set. `model` is `None` outside `Dynamic` mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterKey {
    pub mode: SrfMode,
    pub model: Option<SrfModel>,
    pub set: ParameterSetName,
}

/// An immutable, fully populated distribution parameter set.
///
/// Shared read-only (typically behind an `Arc`) by every instance built
/// from the same configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionParameters {
    pub key: ParameterKey,
    pub probability: ProbabilityFunction,
    pub dependence: CalciumDependence,
    pub amplitude: AmplitudeFit,
}

const CELL3D_CONTROL: CalciumDependence = CalciumDependence::Fitted {
    offset_mm: CELL3D_CASR_OFFSET_MM,
    ti_sep: ExpFit::new(1.135e5, 6.44, 150.0, 877.0),
    k_ti_f1: ExpFit::new(2.72e4, 7.17, 10.0, 80.0),
    k_ti_f2: ExpFit::new(2.33e4, 5.545, 30.0, 450.0),
    median_duration: ExpFit::new(3.44e4, 5.87, 120.0, 800.0),
    k_d_f1: LogisticFit::new(10.0, 60.0, 300.0, 80.0),
    k_d_f2: LogisticFit::new(25.0, 200.0, 350.0, 90.0),
};

/// Extra calcium (mM) the sensitised fits behave as if they see.
const SENSITISED_SHIFT_MM: f64 = 0.1;

const DIRECT_DEFAULT: [f64; DIRECT_CONTROL_COEFFICIENTS] =
    [0.5, 400.0, 300.0, 200.0, 100.0, 2.2, -0.45];
const DIRECT_LONG: [f64; DIRECT_CONTROL_COEFFICIENTS] =
    [0.5, 400.0, 300.0, 600.0, 250.0, 2.2, -0.45];

const GENERAL_DEFAULT: [f64; GENERAL_COEFFICIENTS] = [
    0.9, 0.3, 0.6, 1.3, 877.0, 150.0, 550.0, 60.0, 600.0, 120.0, 400.0, 60.0,
];
const GENERAL_LONG: [f64; GENERAL_COEFFICIENTS] = [
    0.9, 0.3, 0.6, 1.3, 877.0, 150.0, 550.0, 60.0, 1200.0, 400.0, 700.0, 150.0,
];

impl DistributionParameters {
    /// Looks up (or, for `User_control`, builds) the set named by `config`.
    ///
    /// # Errors
    ///
    /// - `SrfError::UnknownParameterSet` if the name is not defined for the
    ///   requested mode/model (the error lists the valid names).
    /// - `SrfError::CoefficientCount` if `User_control` receives the wrong
    ///   number of coefficients.
    /// - `SrfError::InvalidCoefficient` if a supplied coefficient is unusable.
    /// - `SrfError::Config` for `Read` mode, which has no parameter set.
    #[tracing::instrument(
        skip(config),
        fields(mode = %config.mode, model = %config.model, set = %config.parameter_set)
    )]
    pub fn from_config(config: &SrfConfig) -> Result<Self, SrfError> {
        match config.mode {
            SrfMode::DirectControl => {
                Self::direct_control(config.parameter_set, &config.user_coefficients)
            }
            SrfMode::Dynamic => match config.model {
                SrfModel::Cell3D => Self::cell_3d(config.parameter_set),
                SrfModel::General => Self::general(config.parameter_set, &config.user_coefficients),
            },
            SrfMode::Read => Err(SrfError::Config(
                "Read mode replays recorded settings and has no parameter set".to_string(),
            )),
        }
    }

    /// `Direct_Control` sets: `Default`, `Long`, `User_control`.
    pub fn direct_control(set: ParameterSetName, user: &[f64]) -> Result<Self, SrfError> {
        let coefficients: &[f64] = match set {
            ParameterSetName::Default => &DIRECT_DEFAULT,
            ParameterSetName::Long => &DIRECT_LONG,
            ParameterSetName::UserControl => {
                check_count(user, DIRECT_CONTROL_COEFFICIENTS)?;
                user
            }
            other => {
                return Err(unknown_set(other, "Direct_Control", "Default, Long, User_control"))
            }
        };
        let c = coefficients;
        check_probability("probability", c[0])?;
        for (name, value) in [
            ("ti_sep", c[1]),
            ("ti_width_ms", c[2]),
            ("median_duration", c[3]),
            ("duration_width_ms", c[4]),
        ] {
            check_positive(name, value)?;
        }
        check_finite("peak_a", c[5])?;
        check_finite("peak_h", c[6])?;

        Ok(Self {
            key: ParameterKey {
                mode: SrfMode::DirectControl,
                model: None,
                set,
            },
            probability: ProbabilityFunction::Fixed { probability: c[0] },
            dependence: CalciumDependence::Fixed {
                ti_sep: c[1],
                ti_width_ms: c[2],
                median_duration: c[3],
                duration_width_ms: c[4],
            },
            amplitude: AmplitudeFit {
                peak_a: c[5],
                peak_h: c[6],
                ..AmplitudeFit::default()
            },
        })
    }

    /// `Dynamic`/`3D_cell` sets: `Control`, `Sensitised`.
    pub fn cell_3d(set: ParameterSetName) -> Result<Self, SrfError> {
        let (probability, dependence) = match set {
            ParameterSetName::Control => (
                ProbabilityFunction::Fitted {
                    threshold: 0.95,
                    k: 0.035,
                },
                CELL3D_CONTROL,
            ),
            ParameterSetName::Sensitised => (
                ProbabilityFunction::Fitted {
                    threshold: 0.85,
                    k: 0.03,
                },
                sensitised(CELL3D_CONTROL),
            ),
            other => return Err(unknown_set(other, "Dynamic/3D_cell", "Control, Sensitised")),
        };
        Ok(Self {
            key: ParameterKey {
                mode: SrfMode::Dynamic,
                model: Some(SrfModel::Cell3D),
                set,
            },
            probability,
            dependence,
            amplitude: AmplitudeFit::default(),
        })
    }

    /// `Dynamic`/`General` sets: `Default`, `Long`, `User_control`.
    pub fn general(set: ParameterSetName, user: &[f64]) -> Result<Self, SrfError> {
        let coefficients: &[f64] = match set {
            ParameterSetName::Default => &GENERAL_DEFAULT,
            ParameterSetName::Long => &GENERAL_LONG,
            ParameterSetName::UserControl => {
                check_count(user, GENERAL_COEFFICIENTS)?;
                user
            }
            other => {
                return Err(unknown_set(other, "Dynamic/General", "Default, Long, User_control"))
            }
        };
        let c = coefficients;
        for (name, value) in [("ca_threshold", c[0]), ("casr_min", c[2]), ("casr_max", c[3])] {
            check_finite(name, value)?;
        }
        check_positive("probability_range", c[1])?;
        if c[3] <= c[2] {
            return Err(SrfError::InvalidCoefficient {
                name: "casr_max",
                value: c[3],
                reason: "must exceed casr_min",
            });
        }
        let ti_sep = bounds("ti_sep", c[4], c[5])?;
        let ti_width_ms = bounds("ti_width_ms", c[6], c[7])?;
        let median_duration = bounds("median_duration", c[8], c[9])?;
        let duration_width_ms = bounds("duration_width_ms", c[10], c[11])?;

        Ok(Self {
            key: ParameterKey {
                mode: SrfMode::Dynamic,
                model: Some(SrfModel::General),
                set,
            },
            probability: ProbabilityFunction::Controllable {
                threshold: c[0],
                range: c[1],
            },
            dependence: CalciumDependence::Interpolated {
                casr_min: c[2],
                casr_max: c[3],
                blend_rate: GENERAL_BLEND_RATE,
                width_exponent: GENERAL_WIDTH_EXPONENT,
                ti_sep,
                ti_width_ms,
                median_duration,
                duration_width_ms,
            },
            amplitude: AmplitudeFit::default(),
        })
    }
}

fn sensitised(base: CalciumDependence) -> CalciumDependence {
    match base {
        CalciumDependence::Fitted {
            offset_mm,
            ti_sep,
            k_ti_f1,
            k_ti_f2,
            median_duration,
            k_d_f1,
            k_d_f2,
        } => CalciumDependence::Fitted {
            offset_mm,
            ti_sep: ti_sep.shifted(SENSITISED_SHIFT_MM),
            k_ti_f1: k_ti_f1.shifted(SENSITISED_SHIFT_MM),
            k_ti_f2: k_ti_f2.shifted(SENSITISED_SHIFT_MM),
            median_duration: median_duration.shifted(SENSITISED_SHIFT_MM),
            k_d_f1,
            k_d_f2,
        },
        other => other,
    }
}

fn unknown_set(set: ParameterSetName, context: &str, valid: &str) -> SrfError {
    SrfError::UnknownParameterSet {
        name: set.name().to_string(),
        context: context.to_string(),
        valid: valid.to_string(),
    }
}

fn check_count(user: &[f64], expected: usize) -> Result<(), SrfError> {
    if user.len() != expected {
        return Err(SrfError::CoefficientCount {
            expected,
            actual: user.len(),
        });
    }
    Ok(())
}

fn check_finite(name: &'static str, value: f64) -> Result<(), SrfError> {
    if !value.is_finite() {
        return Err(SrfError::InvalidCoefficient {
            name,
            value,
            reason: "must be finite",
        });
    }
    Ok(())
}

fn check_positive(name: &'static str, value: f64) -> Result<(), SrfError> {
    check_finite(name, value)?;
    if value <= 0.0 {
        return Err(SrfError::InvalidCoefficient {
            name,
            value,
            reason: "must be > 0",
        });
    }
    Ok(())
}

fn check_probability(name: &'static str, value: f64) -> Result<(), SrfError> {
    check_finite(name, value)?;
    if !(0.0..=1.0).contains(&value) {
        return Err(SrfError::InvalidCoefficient {
            name,
            value,
            reason: "must lie in [0, 1]",
        });
    }
    Ok(())
}

fn bounds(name: &'static str, max: f64, min: f64) -> Result<Bounds, SrfError> {
    check_positive(name, max)?;
    check_positive(name, min)?;
    if max < min {
        return Err(SrfError::InvalidCoefficient {
            name,
            value: max,
            reason: "maximum is below minimum",
        });
    }
    Ok(Bounds::new(max, min))
}
