// SRF Engine
//
// Stochastic surrogate for spontaneous SR calcium release in cardiac
// myocyte models. Each cell (or calcium release unit) owns an instance that
// samples release events from SR-calcium dependent distributions and turns
// them into an open-RyR proxy signal the host consumes every timestep.

pub mod core;
pub mod diagnostics;
pub mod error;
pub mod release;

pub use crate::core::config::{
    Heterogeneity, ParameterSetName, SrfConfig, SrfMode, SrfModel, VarianceConfig,
};
pub use crate::core::draws::{EventDraws, ScriptedDraws, UniformSource};
pub use crate::core::flux::FluxMultipliers;
pub use crate::core::parameters::DistributionParameters;
pub use crate::error::SrfError;
pub use crate::release::{ArmState, EventRecord, SrfInstance, SrfPopulation, StepInput};
