//! Configuration types for loading particle scenarios from YAML.
//!
//! This module defines a thin, `serde`-deserializable representation of an
//! SPH scenario. A scenario consists of:
//!
//! - [`ParametersConfig`] – rest density, spacing, kernel support and optional mass
//! - [`ParticleConfig`]   – initial state for each particle
//! - [`ScenarioConfig`]   – top-level wrapper, also lists extra attribute channels
//!
//! # YAML format
//! An example scenario matching these types:
//!
//! ```yaml
//! parameters:
//!   target_density: 1000.0        # rest density (kg/m^3)
//!   target_spacing: 0.1           # nominal particle spacing
//!   relative_kernel_radius: 1.8   # kernel radius / spacing
//!   # mass: 0.05                  # optional, overrides the derived mass
//!
//! searcher: "hash_grid"           # or "octree", "simple_list"
//!
//! particles:
//!   - x: [ 0.0, 0.0, 0.0 ]
//!     v: [ 0.0, 0.0, 0.0 ]
//!   - x: [ 0.1, 0.0, 0.0 ]        # v defaults to zero
//!
//! scalar_data: [ 0.0 ]            # one extra scalar channel per entry (initial value)
//! vector_data: [ [ 0.0, -9.8, 0.0 ] ]
//! ```
//!
//! [`Scenario::build_scenario`](crate::Scenario::build_scenario) maps this
//! configuration into a live [`SphSystemData`](crate::SphSystemData).

use serde::{Deserialize, Serialize};

use crate::simulation::searcher::SearcherKind;

/// SPH parameters of a scenario
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ParametersConfig {
    pub target_density: f64, // rest density
    pub target_spacing: f64, // nominal distance between neighbors
    pub relative_kernel_radius: f64, // kernel radius as a multiple of the spacing
    #[serde(default)]
    pub mass: Option<f64>, // explicit particle mass, rescales target_density
}

/// Initial state of one particle
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ParticleConfig {
    pub x: Vec<f64>, // position, 3 components
    #[serde(default)]
    pub v: Option<Vec<f64>>, // velocity, 3 components, zero if omitted
}

/// Top-level scenario configuration loaded from YAML.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ScenarioConfig {
    pub parameters: ParametersConfig,
    #[serde(default)]
    pub searcher: Option<SearcherKind>, // neighbor searcher, hash grid if omitted
    #[serde(default)]
    pub particles: Vec<ParticleConfig>,
    #[serde(default)]
    pub scalar_data: Vec<f64>, // extra scalar channels, by initial value
    #[serde(default)]
    pub vector_data: Vec<[f64; 3]>, // extra vector channels, by initial value
}
