// SRF Engine - Core
//
// Leaf value types and pure functions: configuration, parameter store,
// probability gate, distribution resolver, sampler, waveform and flux.

pub mod config;
pub mod draws;
pub mod flux;
pub mod parameters;
pub mod probability;
pub mod resolver;
pub mod sampler;
pub mod waveform;
