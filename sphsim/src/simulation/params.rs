//! SPH parameters
//!
//! `SphParameters` holds the physical settings of a particle system:
//! - rest density (`target_density`)
//! - nominal particle spacing (`target_spacing`, also exposed as `radius`)
//! - kernel support as a multiple of the spacing (`relative_kernel_radius`)
//! - per-particle mass, derived from the three above
//!
//! The kernel radius is never stored; it is `relative_kernel_radius * target_spacing`
//! on every read. Mass is recomputed by every setter so that a perfectly packed
//! body-centred-cubic arrangement at `target_spacing` reaches `target_density`.

use rayon::prelude::*;

use super::kernel::{SphKernel, StdKernel};
use super::states::NVec3;

/// Rest density of water in kg/m³
pub const WATER_DENSITY: f64 = 1000.0;

pub const DEFAULT_TARGET_SPACING: f64 = 0.1;
pub const DEFAULT_RELATIVE_KERNEL_RADIUS: f64 = 1.8;

#[derive(Debug, Clone, PartialEq)]
pub struct SphParameters {
    target_density: f64, // rest density
    target_spacing: f64, // nominal distance between neighbors
    relative_kernel_radius: f64, // kernel radius / target spacing
    mass: f64, // per-particle mass
}

impl Default for SphParameters {
    fn default() -> Self {
        Self::new(WATER_DENSITY, DEFAULT_TARGET_SPACING, DEFAULT_RELATIVE_KERNEL_RADIUS)
    }
}

impl SphParameters {
    pub fn new(target_density: f64, target_spacing: f64, relative_kernel_radius: f64) -> Self {
        let mut params = Self {
            target_density,
            target_spacing,
            relative_kernel_radius,
            mass: 0.0,
        };
        params.compute_mass();
        params
    }

    /// Restore from stored values without re-deriving mass (snapshots)
    pub(crate) fn from_raw(target_density: f64, target_spacing: f64, relative_kernel_radius: f64, mass: f64) -> Self {
        Self {
            target_density,
            target_spacing,
            relative_kernel_radius,
            mass,
        }
    }

    pub fn target_density(&self) -> f64 {
        self.target_density
    }

    pub fn target_spacing(&self) -> f64 {
        self.target_spacing
    }

    /// Alias of [`SphParameters::target_spacing`]
    pub fn radius(&self) -> f64 {
        self.target_spacing
    }

    pub fn relative_kernel_radius(&self) -> f64 {
        self.relative_kernel_radius
    }

    pub fn kernel_radius(&self) -> f64 {
        self.relative_kernel_radius * self.target_spacing
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn set_target_density(&mut self, target_density: f64) {
        self.target_density = target_density;
        self.compute_mass();
    }

    pub fn set_target_spacing(&mut self, spacing: f64) {
        self.target_spacing = spacing;
        self.compute_mass();
    }

    /// Alias of [`SphParameters::set_target_spacing`]
    pub fn set_radius(&mut self, radius: f64) {
        self.set_target_spacing(radius);
    }

    pub fn set_relative_kernel_radius(&mut self, relative_kernel_radius: f64) {
        self.relative_kernel_radius = relative_kernel_radius;
        self.compute_mass();
    }

    /// Set the particle mass directly. Density is mass concentration, so the
    /// target density is scaled by the same ratio.
    pub fn set_mass(&mut self, mass: f64) {
        if self.mass != 0.0 {
            self.target_density *= mass / self.mass;
        }
        self.mass = mass;
    }

    /// mass = target_density / max number density of the reference lattice.
    /// Geometry that cannot be sampled (non-positive or non-finite spacing or
    /// kernel radius) leaves the mass unchanged.
    fn compute_mass(&mut self) {
        if let Some(max_number_density) = max_number_density(self.target_spacing, self.kernel_radius()) {
            self.mass = self.target_density / max_number_density;
        }
    }
}

/// Largest standard-kernel sum over a BCC lattice of `spacing` filling the
/// cube `[-1.5·h, 1.5·h]³`
pub fn max_number_density(spacing: f64, kernel_radius: f64) -> Option<f64> {
    let valid = |v: f64| v.is_finite() && v > 0.0;
    if !valid(spacing) || !valid(kernel_radius) {
        return None;
    }

    let half_extent = 1.5 * kernel_radius;
    let points = bcc_lattice_points(
        &NVec3::repeat(-half_extent),
        &NVec3::repeat(half_extent),
        spacing,
    );
    let kernel = StdKernel::new(kernel_radius);

    let max = points
        .par_iter()
        .map(|point| {
            points
                .iter()
                .map(|neighbor| kernel.weight((neighbor - point).norm()))
                .sum::<f64>()
        })
        .reduce(|| 0.0, f64::max);

    (max > 0.0).then_some(max)
}

/// Body-centred-cubic lattice inside `[lower, upper]`.
///
/// Layers are `spacing / 2` apart along z; every other layer is shifted by
/// `spacing / 2` in x and y.
pub fn bcc_lattice_points(lower: &NVec3, upper: &NVec3, spacing: f64) -> Vec<NVec3> {
    let size = upper - lower;
    let half_spacing = 0.5 * spacing;
    let mut points = Vec::new();
    let mut has_offset = false;

    let mut k = 0usize;
    while k as f64 * half_spacing <= size.z {
        let z = k as f64 * half_spacing + lower.z;
        let offset = if has_offset { half_spacing } else { 0.0 };

        let mut j = 0usize;
        while j as f64 * spacing + offset <= size.y {
            let y = j as f64 * spacing + offset + lower.y;

            let mut i = 0usize;
            while i as f64 * spacing + offset <= size.x {
                let x = i as f64 * spacing + offset + lower.x;
                points.push(NVec3::new(x, y, z));
                i += 1;
            }
            j += 1;
        }
        has_offset = !has_offset;
        k += 1;
    }

    points
}
