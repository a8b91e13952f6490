// SRF Engine - Configuration Types
//
// Validated configuration values consumed from the host's argument layer.
// Names use the spellings hosts pass on the command line.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SrfError;

/// How spontaneous events are generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SrfMode {
    /// Fixed, calcium-independent probability and distributions.
    #[serde(rename = "Direct_Control")]
    DirectControl,
    /// Probability and distributions follow junctional SR calcium.
    #[serde(rename = "Dynamic")]
    Dynamic,
    /// Replay of previously recorded event settings.
    #[serde(rename = "Read")]
    Read,
}

impl SrfMode {
    pub const VALID: &'static str = "Direct_Control, Dynamic, Read";

    pub fn name(self) -> &'static str {
        match self {
            SrfMode::DirectControl => "Direct_Control",
            SrfMode::Dynamic => "Dynamic",
            SrfMode::Read => "Read",
        }
    }
}

impl FromStr for SrfMode {
    type Err = SrfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Direct_Control" => Ok(SrfMode::DirectControl),
            "Dynamic" => Ok(SrfMode::Dynamic),
            "Read" => Ok(SrfMode::Read),
            other => Err(SrfError::UnknownMode {
                name: other.to_string(),
                valid: Self::VALID.to_string(),
            }),
        }
    }
}

impl fmt::Display for SrfMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Calcium-dependence family. Only consulted in `Dynamic` mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SrfModel {
    /// Closed-form fits to the spatial 3D cell model.
    #[serde(rename = "3D_cell")]
    Cell3D,
    /// Controllable interpolation between user-facing bounds.
    #[serde(rename = "General")]
    General,
}

impl SrfModel {
    pub const VALID: &'static str = "3D_cell, General";

    pub fn name(self) -> &'static str {
        match self {
            SrfModel::Cell3D => "3D_cell",
            SrfModel::General => "General",
        }
    }
}

impl FromStr for SrfModel {
    type Err = SrfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "3D_cell" => Ok(SrfModel::Cell3D),
            "General" => Ok(SrfModel::General),
            other => Err(SrfError::UnknownModel {
                name: other.to_string(),
                valid: Self::VALID.to_string(),
            }),
        }
    }
}

impl fmt::Display for SrfModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Named entry of the distribution parameter store.
///
/// Which names are valid depends on the mode/model pair; the store reports
/// the valid subset when a name does not apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterSetName {
    Default,
    Long,
    Control,
    Sensitised,
    /// All coefficients supplied explicitly by the caller.
    #[serde(rename = "User_control")]
    UserControl,
}

impl ParameterSetName {
    pub const VALID: &'static str = "Default, Long, Control, Sensitised, User_control";

    pub fn name(self) -> &'static str {
        match self {
            ParameterSetName::Default => "Default",
            ParameterSetName::Long => "Long",
            ParameterSetName::Control => "Control",
            ParameterSetName::Sensitised => "Sensitised",
            ParameterSetName::UserControl => "User_control",
        }
    }
}

impl FromStr for ParameterSetName {
    type Err = SrfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Default" => Ok(ParameterSetName::Default),
            "Long" => Ok(ParameterSetName::Long),
            "Control" => Ok(ParameterSetName::Control),
            "Sensitised" => Ok(ParameterSetName::Sensitised),
            "User_control" => Ok(ParameterSetName::UserControl),
            other => Err(SrfError::UnknownParameterSet {
                name: other.to_string(),
                context: "any mode".to_string(),
                valid: Self::VALID.to_string(),
            }),
        }
    }
}

impl fmt::Display for ParameterSetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tissue-heterogeneity category.
///
/// `Graded` shifts each cell's probability threshold linearly with its
/// index across a population, from `min_shift_mm` at the first cell to
/// `max_shift_mm` at the last.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Heterogeneity {
    Homogeneous,
    Graded { min_shift_mm: f64, max_shift_mm: f64 },
}

impl Heterogeneity {
    /// Threshold shift (mM) for cell `index` of `count`.
    pub fn threshold_shift(&self, index: usize, count: usize) -> f64 {
        match *self {
            Heterogeneity::Homogeneous => 0.0,
            Heterogeneity::Graded {
                min_shift_mm,
                max_shift_mm,
            } => {
                if count <= 1 {
                    return min_shift_mm;
                }
                let position = index.min(count - 1) as f64 / (count - 1) as f64;
                min_shift_mm + (max_shift_mm - min_shift_mm) * position
            }
        }
    }
}

impl Default for Heterogeneity {
    fn default() -> Self {
        Heterogeneity::Homogeneous
    }
}

/// Variance-control knobs for the sampled event shape.
///
/// Each scale lies in [0, 1]: 0 collapses the draw to its median, 1 uses
/// the raw uniform draw.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VarianceConfig {
    /// Time-to-peak distribution scale (default: 1.0).
    pub time_to_peak_scale: f64,
    /// Peak amplitude distribution scale (default: 1.0).
    pub peak_scale: f64,
    /// Plateau amplitude distribution scale (default: 1.0).
    pub plateau_scale: f64,
}

impl Default for VarianceConfig {
    fn default() -> Self {
        Self {
            time_to_peak_scale: 1.0,
            peak_scale: 1.0,
            plateau_scale: 1.0,
        }
    }
}

/// Full configuration of the spontaneous release subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SrfConfig {
    pub mode: SrfMode,
    /// Ignored unless `mode` is `Dynamic`.
    pub model: SrfModel,
    pub parameter_set: ParameterSetName,
    pub heterogeneity: Heterogeneity,
    pub variance: VarianceConfig,
    /// SR calcium drift (mM) required before a failed evaluation is retried
    /// (default: 0.010, i.e. 10 µM).
    pub ca_recalc_threshold_mm: f64,
    /// Explicit duration-distribution width in ms. Overrides the width the
    /// model derives from median duration.
    pub duration_width_ms: Option<f64>,
    /// Coefficients for the `User_control` parameter set.
    pub user_coefficients: Vec<f64>,
    /// Settings file replayed in `Read` mode.
    pub settings_path: Option<PathBuf>,
}

impl Default for SrfConfig {
    fn default() -> Self {
        Self {
            mode: SrfMode::Dynamic,
            model: SrfModel::Cell3D,
            parameter_set: ParameterSetName::Control,
            heterogeneity: Heterogeneity::Homogeneous,
            variance: VarianceConfig::default(),
            ca_recalc_threshold_mm: 0.010,
            duration_width_ms: None,
            user_coefficients: Vec::new(),
            settings_path: None,
        }
    }
}

impl SrfConfig {
    /// Builds a configuration from the string names used on the command line.
    pub fn from_names(mode: &str, model: &str, parameter_set: &str) -> Result<Self, SrfError> {
        Ok(Self {
            mode: mode.parse()?,
            model: model.parse()?,
            parameter_set: parameter_set.parse()?,
            ..Self::default()
        })
    }

    /// Decodes and validates a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self, SrfError> {
        let config: SrfConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, decodes and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SrfError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| SrfError::io(path, e))?;
        Self::from_json_str(&json)
    }

    /// Writes the configuration as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SrfError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| SrfError::io(path, e))
    }

    /// Range checks that do not depend on the parameter store.
    pub fn validate(&self) -> Result<(), SrfError> {
        let scales = [
            ("time_to_peak_scale", self.variance.time_to_peak_scale),
            ("peak_scale", self.variance.peak_scale),
            ("plateau_scale", self.variance.plateau_scale),
        ];
        for (name, value) in scales {
            if !(0.0..=1.0).contains(&value) {
                return Err(SrfError::Config(format!(
                    "{} must lie in [0, 1] (got {})",
                    name, value
                )));
            }
        }
        if !self.ca_recalc_threshold_mm.is_finite() || self.ca_recalc_threshold_mm < 0.0 {
            return Err(SrfError::Config(format!(
                "ca_recalc_threshold_mm must be a non-negative number (got {})",
                self.ca_recalc_threshold_mm
            )));
        }
        if let Some(width) = self.duration_width_ms {
            if !width.is_finite() || width <= 0.0 {
                return Err(SrfError::Config(format!(
                    "duration_width_ms must be > 0 (got {})",
                    width
                )));
            }
        }
        if self.mode == SrfMode::Read && self.settings_path.is_none() {
            return Err(SrfError::Config(
                "Read mode requires settings_path".to_string(),
            ));
        }
        Ok(())
    }
}
