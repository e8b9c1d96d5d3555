//! Build fully-initialized particle scenarios from configuration
//!
//! Takes a `ScenarioConfig` (YAML-facing) and produces a runtime [`Scenario`]
//! containing:
//! - the SPH system (`SphSystemData`) with parameters, searcher kind and particles
//! - handles of the extra channels the config asked for, in config order
//!
//! Values are checked on the way in; the searcher is *not* built, so the
//! caller decides when to pay for the first neighbor search.

use crate::configuration::config::{ParametersConfig, ScenarioConfig};
use crate::error::{SphError, SphResult};
use crate::simulation::sph::SphSystemData;
use crate::simulation::states::{NVec3, ScalarHandle, VectorHandle};

/// Runtime bundle constructed from a [`ScenarioConfig`]
#[derive(Debug)]
pub struct Scenario {
    pub system: SphSystemData,
    pub scalar_handles: Vec<ScalarHandle>, // one per `scalar_data` entry
    pub vector_handles: Vec<VectorHandle>, // one per `vector_data` entry
}

impl Scenario {
    pub fn build_scenario(cfg: ScenarioConfig) -> SphResult<Self> {
        let mut system = SphSystemData::new();

        // Parameters: spacing and kernel first so the derived mass is final
        // before an explicit mass rescales the density
        apply_parameters(&mut system, &cfg.parameters)?;
        if let Some(kind) = cfg.searcher {
            system.set_searcher_kind(kind);
        }

        // Particles: map `ParticleConfig` -> nalgebra vectors
        let mut positions = Vec::with_capacity(cfg.particles.len());
        let mut velocities = Vec::with_capacity(cfg.particles.len());
        for pc in &cfg.particles {
            positions.push(to_vec3("particle position", &pc.x)?);
            velocities.push(match &pc.v {
                Some(v) => to_vec3("particle velocity", v)?,
                None => NVec3::zeros(),
            });
        }
        system.add_particles(&positions, &velocities)?;

        // Extra channels
        let scalar_handles = cfg.scalar_data.iter().map(|&v| system.add_scalar_data(v)).collect();
        let vector_handles = cfg
            .vector_data
            .iter()
            .map(|&v| system.add_vector_data(NVec3::from(v)))
            .collect();

        tracing::info!(
            particles = system.number_of_particles(),
            searcher = system.searcher_kind().name(),
            kernel_radius = system.kernel_radius(),
            mass = system.mass(),
            "built scenario"
        );

        Ok(Self {
            system,
            scalar_handles,
            vector_handles,
        })
    }
}

fn apply_parameters(system: &mut SphSystemData, p: &ParametersConfig) -> SphResult<()> {
    check_positive("target_density", p.target_density)?;
    check_positive("target_spacing", p.target_spacing)?;
    check_positive("relative_kernel_radius", p.relative_kernel_radius)?;

    system.set_target_spacing(p.target_spacing);
    system.set_relative_kernel_radius(p.relative_kernel_radius);
    system.set_target_density(p.target_density);

    if let Some(mass) = p.mass {
        check_positive("mass", mass)?;
        system.set_mass(mass);
    }
    Ok(())
}

fn check_positive(name: &'static str, value: f64) -> SphResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SphError::InvalidParameter { name, value })
    }
}

fn to_vec3(what: &'static str, v: &[f64]) -> SphResult<NVec3> {
    match v {
        [x, y, z] => Ok(NVec3::new(*x, *y, *z)),
        _ => Err(SphError::SizeMismatch {
            what,
            expected: 3,
            actual: v.len(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::config::ParticleConfig;
    use crate::simulation::searcher::SearcherKind;

    fn config() -> ScenarioConfig {
        ScenarioConfig {
            parameters: ParametersConfig {
                target_density: 1000.0,
                target_spacing: 0.1,
                relative_kernel_radius: 1.8,
                mass: None,
            },
            searcher: Some(SearcherKind::Octree),
            particles: vec![
                ParticleConfig { x: vec![0.0, 0.0, 0.0], v: None },
                ParticleConfig { x: vec![0.1, 0.0, 0.0], v: Some(vec![1.0, 0.0, 0.0]) },
            ],
            scalar_data: vec![4.0],
            vector_data: vec![[0.0, -9.8, 0.0]],
        }
    }

    #[test]
    fn test_build_scenario() {
        let scenario = Scenario::build_scenario(config()).unwrap();
        let sys = &scenario.system;

        assert_eq!(sys.number_of_particles(), 2);
        assert_eq!(sys.searcher_kind(), SearcherKind::Octree);
        assert_eq!(sys.velocities()[1], NVec3::new(1.0, 0.0, 0.0));
        assert_eq!(scenario.scalar_handles[0].index(), 5);
        assert_eq!(sys.scalar_data_at(scenario.scalar_handles[0]).unwrap(), &[4.0, 4.0]);
        assert_eq!(sys.vector_data_at(scenario.vector_handles[0]).unwrap()[1], NVec3::new(0.0, -9.8, 0.0));
    }

    #[test]
    fn test_explicit_mass_overrides_derived() {
        let mut cfg = config();
        cfg.parameters.mass = Some(0.5);
        let scenario = Scenario::build_scenario(cfg).unwrap();
        assert_eq!(scenario.system.mass(), 0.5);
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut cfg = config();
        cfg.parameters.target_spacing = -1.0;
        assert!(matches!(
            Scenario::build_scenario(cfg),
            Err(SphError::InvalidParameter { name: "target_spacing", .. })
        ));

        let mut cfg = config();
        cfg.particles[0].x = vec![0.0, 0.0];
        assert!(matches!(
            Scenario::build_scenario(cfg),
            Err(SphError::SizeMismatch { expected: 3, actual: 2, .. })
        ));
    }
}
