//! SPH system data
//!
//! [`SphSystemData`] composes the particle store, SPH parameters, a neighbor
//! searcher and the last neighbor lists, and provides the kernel sums every
//! SPH solver needs:
//! - per-particle density `ρ_i = m · Σ_j W(|x_i − x_j|)` (self included)
//! - field interpolation at arbitrary points
//! - symmetric gradient and laplacian estimates at particles
//!
//! Nothing here is recomputed implicitly: after moving particles or changing
//! the kernel radius, call [`SphSystemData::build_neighbor_searcher`] and then
//! [`SphSystemData::update_densities`]. Working on stale lists is allowed and
//! only logged.

use rayon::prelude::*;

use crate::error::{HandleKind, SphError, SphResult};

use super::kernel::{SphKernel, SpikyKernel, StdKernel};
use super::neighbors::{BuildStamp, NeighborLists};
use super::params::SphParameters;
use super::searcher::{PointNeighborSearcher, SearcherKind};
use super::states::{NVec3, ParticleSystemData, ScalarHandle, VectorHandle};

/// Built-in density channel
pub const DENSITY: ScalarHandle = ScalarHandle(3);
/// Built-in pressure channel
pub const PRESSURE: ScalarHandle = ScalarHandle(4);

/// Hash grid cell size as a multiple of the query radius
const GRID_SPACING_OVER_RADIUS: f64 = 2.0;

pub struct SphSystemData {
    particles: ParticleSystemData,
    params: SphParameters,
    searcher: Box<dyn PointNeighborSearcher>,
    searcher_grid_spacing: f64, // hash grid cell size the searcher was created with
    neighbor_lists: NeighborLists,
}

impl Default for SphSystemData {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SphSystemData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SphSystemData")
            .field("number_of_particles", &self.number_of_particles())
            .field("params", &self.params)
            .field("searcher", &self.searcher.kind())
            .field("neighbor_lists", &self.neighbor_lists.len())
            .finish()
    }
}

impl SphSystemData {
    /// Empty system with water-like default parameters
    pub fn new() -> Self {
        Self::with_parts(ParticleSystemData::new(), SphParameters::default(), SearcherKind::default())
    }

    /// System with `n` particles at the origin
    pub fn with_particles(n: usize) -> Self {
        Self::with_parts(ParticleSystemData::with_particles(n), SphParameters::default(), SearcherKind::default())
    }

    /// Assemble from a bare particle store. The store gets the density and
    /// pressure channels appended, so it must carry only the built-in
    /// position/velocity/force channels.
    fn with_parts(mut particles: ParticleSystemData, params: SphParameters, kind: SearcherKind) -> Self {
        let density = particles.add_scalar_data(0.0);
        let pressure = particles.add_scalar_data(0.0);
        debug_assert_eq!(density, DENSITY);
        debug_assert_eq!(pressure, PRESSURE);

        let searcher_grid_spacing = GRID_SPACING_OVER_RADIUS * params.kernel_radius();
        Self {
            particles,
            params,
            searcher: kind.create(searcher_grid_spacing),
            searcher_grid_spacing,
            neighbor_lists: NeighborLists::default(),
        }
    }

    /// Assemble from already-validated snapshot parts. The searcher is rebuilt
    /// over `searcher_points`, the positions it indexed when it was saved.
    pub(crate) fn from_snapshot_parts(
        particles: ParticleSystemData,
        params: SphParameters,
        kind: SearcherKind,
        searcher_grid_spacing: f64,
        searcher_points: &[NVec3],
        neighbor_lists: Vec<Vec<usize>>,
        stamp: Option<BuildStamp>,
    ) -> Self {
        let mut searcher = kind.create(searcher_grid_spacing);
        searcher.build(searcher_points);

        Self {
            particles,
            params,
            searcher,
            searcher_grid_spacing,
            neighbor_lists: NeighborLists::restore(neighbor_lists, stamp),
        }
    }

    // particle store ======================================================================

    pub fn particles(&self) -> &ParticleSystemData {
        &self.particles
    }

    /// Raw access to the particle store. Unlike
    /// [`SphSystemData::scalar_data_at_mut`] this does not guard the density
    /// channel; anything written there is overwritten by the next
    /// [`SphSystemData::update_densities`].
    pub fn particles_mut(&mut self) -> &mut ParticleSystemData {
        &mut self.particles
    }

    pub fn number_of_particles(&self) -> usize {
        self.particles.number_of_particles()
    }

    pub fn add_particle(&mut self, position: NVec3) {
        self.particles.add_particle_at(position);
    }

    pub fn add_particle_with_velocity(&mut self, position: NVec3, velocity: NVec3) {
        self.particles.add_particle(position, velocity, NVec3::zeros());
    }

    /// Bulk add; see [`ParticleSystemData::add_particles`]
    pub fn add_particles(&mut self, positions: &[NVec3], velocities: &[NVec3]) -> SphResult<()> {
        self.particles.add_particles(positions, velocities, &[])
    }

    pub fn add_scalar_data(&mut self, initial: f64) -> ScalarHandle {
        self.particles.add_scalar_data(initial)
    }

    pub fn add_vector_data(&mut self, initial: NVec3) -> VectorHandle {
        self.particles.add_vector_data(initial)
    }

    pub fn scalar_data_at(&self, handle: ScalarHandle) -> SphResult<&[f64]> {
        self.particles.scalar_data_at(handle)
    }

    /// Mutable view of a scalar channel. Density is derived by
    /// [`SphSystemData::update_densities`] and cannot be written here.
    pub fn scalar_data_at_mut(&mut self, handle: ScalarHandle) -> SphResult<&mut [f64]> {
        if handle == DENSITY {
            return Err(SphError::ReadOnlyChannel { index: handle.index() });
        }
        self.particles.scalar_data_at_mut(handle)
    }

    pub fn vector_data_at(&self, handle: VectorHandle) -> SphResult<&[NVec3]> {
        self.particles.vector_data_at(handle)
    }

    pub fn vector_data_at_mut(&mut self, handle: VectorHandle) -> SphResult<&mut [NVec3]> {
        self.particles.vector_data_at_mut(handle)
    }

    pub fn positions(&self) -> &[NVec3] {
        self.particles.positions()
    }

    pub fn velocities(&self) -> &[NVec3] {
        self.particles.velocities()
    }

    pub fn densities(&self) -> &[f64] {
        self.particles.scalar_data_at(DENSITY).unwrap_or_default()
    }

    pub fn pressures(&self) -> &[f64] {
        self.particles.scalar_data_at(PRESSURE).unwrap_or_default()
    }

    pub fn pressures_mut(&mut self) -> &mut [f64] {
        self.particles.scalar_data_at_mut(PRESSURE).unwrap_or_default()
    }

    // parameters ==========================================================================

    pub fn parameters(&self) -> &SphParameters {
        &self.params
    }

    pub fn target_density(&self) -> f64 {
        self.params.target_density()
    }

    pub fn target_spacing(&self) -> f64 {
        self.params.target_spacing()
    }

    pub fn radius(&self) -> f64 {
        self.params.radius()
    }

    pub fn relative_kernel_radius(&self) -> f64 {
        self.params.relative_kernel_radius()
    }

    pub fn kernel_radius(&self) -> f64 {
        self.params.kernel_radius()
    }

    pub fn mass(&self) -> f64 {
        self.params.mass()
    }

    pub fn set_target_density(&mut self, target_density: f64) {
        self.params.set_target_density(target_density);
    }

    pub fn set_target_spacing(&mut self, spacing: f64) {
        self.params.set_target_spacing(spacing);
    }

    pub fn set_radius(&mut self, radius: f64) {
        self.params.set_radius(radius);
    }

    pub fn set_relative_kernel_radius(&mut self, relative_kernel_radius: f64) {
        self.params.set_relative_kernel_radius(relative_kernel_radius);
    }

    pub fn set_mass(&mut self, mass: f64) {
        self.params.set_mass(mass);
    }

    // neighbor search =====================================================================

    pub fn searcher_kind(&self) -> SearcherKind {
        self.searcher.kind()
    }

    /// Swap the search structure. The new searcher indexes the same points as
    /// the old one, so queries and the staleness of the lists are unchanged.
    pub fn set_searcher_kind(&mut self, kind: SearcherKind) {
        let mut searcher = kind.create(self.searcher_grid_spacing);
        searcher.build(self.searcher.points());
        self.searcher = searcher;
    }

    /// Hash grid cell size of the current searcher
    pub fn searcher_grid_spacing(&self) -> f64 {
        self.searcher_grid_spacing
    }

    pub fn neighbor_searcher(&self) -> &dyn PointNeighborSearcher {
        self.searcher.as_ref()
    }

    /// Rebuild the searcher from the current positions, then the neighbor lists
    /// with the current kernel radius
    pub fn build_neighbor_searcher(&mut self) {
        let radius = self.kernel_radius();
        let kind = self.searcher.kind();

        self.searcher_grid_spacing = GRID_SPACING_OVER_RADIUS * radius;
        self.searcher = kind.create(self.searcher_grid_spacing);
        self.searcher.build(self.particles.positions());
        tracing::debug!(
            searcher = kind.name(),
            particles = self.number_of_particles(),
            radius,
            "rebuilt neighbor searcher"
        );

        self.build_neighbor_lists(radius);
    }

    /// Replace every particle's neighbor list with a fresh query of the
    /// current searcher
    pub fn build_neighbor_lists(&mut self, radius: f64) {
        self.neighbor_lists = NeighborLists::build(
            self.searcher.as_ref(),
            self.particles.positions(),
            radius,
            self.particles.generation(),
        );
        tracing::debug!(
            pairs = self.neighbor_lists.total_neighbors(),
            radius,
            "rebuilt neighbor lists"
        );
    }

    /// Lists of the last build. After particles are added or removed they
    /// may not match the store in length and may hold indices past its end.
    pub fn neighbor_lists(&self) -> &[Vec<usize>] {
        self.neighbor_lists.lists()
    }

    pub fn neighbor_list_table(&self) -> &NeighborLists {
        &self.neighbor_lists
    }

    /// True when particles moved, were added/removed, or the kernel radius
    /// changed since the last neighbor list build
    pub fn is_neighbor_list_stale(&self) -> bool {
        self.neighbor_lists.is_stale(self.particles.generation(), self.kernel_radius())
    }

    // kernel sums =========================================================================

    /// ρ_i = m · (W(0) + Σ_{j ∈ N(i)} W(|x_i − x_j|)) for every particle
    pub fn update_densities(&mut self) {
        if self.is_neighbor_list_stale() {
            tracing::warn!(
                particles = self.number_of_particles(),
                "updating densities from stale neighbor lists"
            );
        }

        let kernel = StdKernel::new(self.kernel_radius());
        let mass = self.mass();
        let positions = self.particles.positions();
        let lists = &self.neighbor_lists;
        let self_weight = kernel.weight(0.0);

        let densities: Vec<f64> = positions
            .par_iter()
            .enumerate()
            .map(|(i, xi)| {
                let mut sum = self_weight;
                for &j in lists.get(i).unwrap_or_default() {
                    if let Some(xj) = positions.get(j) {
                        sum += kernel.weight((xi - xj).norm());
                    }
                }
                mass * sum
            })
            .collect();

        if let Ok(out) = self.particles.scalar_data_at_mut(DENSITY) {
            out.copy_from_slice(&densities);
        }
    }

    /// Σ_j W(|origin − x_j|) over the searcher's points
    pub fn sum_of_kernel_nearby(&self, origin: &NVec3) -> f64 {
        let kernel = StdKernel::new(self.kernel_radius());
        let mut sum = 0.0;
        self.searcher.for_each_nearby_point(origin, self.kernel_radius(), &mut |_, p| {
            sum += kernel.weight((origin - p).norm());
        });
        sum
    }

    /// Σ_j v_j · W(|origin − x_j|) · m / ρ_j over a fresh radius query.
    ///
    /// `values` holds one entry per particle. Particles without a positive
    /// density (never updated) contribute nothing, so calling this before any
    /// build or density update returns 0.
    pub fn interpolate(&self, origin: &NVec3, values: &[f64]) -> SphResult<f64> {
        self.check_len("values", values.len())?;

        let mut sum = 0.0;
        self.for_each_weighted(origin, &mut |j, w| sum += values[j] * w);
        Ok(sum)
    }

    /// Vector-field variant of [`SphSystemData::interpolate`]
    pub fn interpolate_vector(&self, origin: &NVec3, values: &[NVec3]) -> SphResult<NVec3> {
        self.check_len("values", values.len())?;

        let mut sum = NVec3::zeros();
        self.for_each_weighted(origin, &mut |j, w| sum += values[j] * w);
        Ok(sum)
    }

    /// Symmetric SPH gradient of a scalar field at particle `i`:
    /// ∇v_i = ρ_i Σ_j m (v_i/ρ_i² + v_j/ρ_j²) ∇W_ij, spiky kernel
    pub fn gradient_at(&self, i: usize, values: &[f64]) -> SphResult<NVec3> {
        self.check_particle(i)?;
        self.check_len("values", values.len())?;

        let kernel = SpikyKernel::new(self.kernel_radius());
        let mass = self.mass();
        let positions = self.positions();
        let densities = self.densities();

        let mut sum = NVec3::zeros();
        let di = densities[i];
        if di <= 0.0 {
            return Ok(sum);
        }

        for &j in self.neighbor_lists.get(i).unwrap_or_default() {
            let (Some(xj), Some(&dj)) = (positions.get(j), densities.get(j)) else {
                continue;
            };
            let r = xj - positions[i];
            let dist = r.norm();
            if dist > 0.0 && dj > 0.0 {
                let dir = r / dist;
                sum += di * mass * (values[i] / (di * di) + values[j] / (dj * dj)) * kernel.gradient(dist, &dir);
            }
        }
        Ok(sum)
    }

    /// SPH laplacian of a scalar field at particle `i`:
    /// ∇²v_i = Σ_j m (v_j − v_i)/ρ_j W''_ij, spiky kernel
    pub fn laplacian_at(&self, i: usize, values: &[f64]) -> SphResult<f64> {
        self.check_particle(i)?;
        self.check_len("values", values.len())?;

        let mut sum = 0.0;
        self.for_each_laplacian_term(i, &mut |j, w| sum += (values[j] - values[i]) * w);
        Ok(sum)
    }

    /// Vector-field variant of [`SphSystemData::laplacian_at`]
    pub fn laplacian_at_vector(&self, i: usize, values: &[NVec3]) -> SphResult<NVec3> {
        self.check_particle(i)?;
        self.check_len("values", values.len())?;

        let mut sum = NVec3::zeros();
        self.for_each_laplacian_term(i, &mut |j, w| sum += (values[j] - values[i]) * w);
        Ok(sum)
    }

    // helpers =============================================================================

    /// visitor(j, m/ρ_j · W(|origin − x_j|)) for every searcher hit with ρ_j > 0
    fn for_each_weighted(&self, origin: &NVec3, visitor: &mut dyn FnMut(usize, f64)) {
        let kernel = StdKernel::new(self.kernel_radius());
        let mass = self.mass();
        let densities = self.densities();

        self.searcher.for_each_nearby_point(origin, self.kernel_radius(), &mut |j, p| {
            // The searcher may predate a removal
            let Some(&dj) = densities.get(j) else {
                return;
            };
            if dj > 0.0 {
                visitor(j, mass / dj * kernel.weight((origin - p).norm()));
            }
        });
    }

    /// visitor(j, m/ρ_j · W''(|x_i − x_j|)) over i's neighbor list
    fn for_each_laplacian_term(&self, i: usize, visitor: &mut dyn FnMut(usize, f64)) {
        let kernel = SpikyKernel::new(self.kernel_radius());
        let mass = self.mass();
        let positions = self.positions();
        let densities = self.densities();

        for &j in self.neighbor_lists.get(i).unwrap_or_default() {
            let (Some(xj), Some(&dj)) = (positions.get(j), densities.get(j)) else {
                continue;
            };
            if dj > 0.0 {
                let dist = (positions[i] - xj).norm();
                visitor(j, mass / dj * kernel.second_derivative(dist));
            }
        }
    }

    fn check_particle(&self, i: usize) -> SphResult<()> {
        let len = self.number_of_particles();
        if i >= len {
            return Err(SphError::InvalidHandle { kind: HandleKind::Particle, index: i, len });
        }
        Ok(())
    }

    fn check_len(&self, what: &'static str, actual: usize) -> SphResult<()> {
        let expected = self.number_of_particles();
        if actual != expected {
            return Err(SphError::SizeMismatch { what, expected, actual });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_handles() {
        let mut data = SphSystemData::new();
        let h = data.add_scalar_data(1.0);
        assert_eq!(h.index(), 5);
        assert!(data.densities().is_empty());

        data.add_particle(NVec3::zeros());
        assert_eq!(data.densities(), &[0.0]);
        assert_eq!(data.pressures(), &[0.0]);
    }

    #[test]
    fn test_density_of_isolated_particle_is_self_term() {
        let mut data = SphSystemData::new();
        data.add_particle(NVec3::zeros());
        data.build_neighbor_searcher();
        data.update_densities();

        let expected = data.mass() * StdKernel::new(data.kernel_radius()).weight(0.0);
        assert_eq!(data.densities()[0], expected);
    }

    #[test]
    fn test_interpolate_before_build_is_zero() {
        let mut data = SphSystemData::new();
        data.add_particles(&[NVec3::zeros(), NVec3::new(0.05, 0.0, 0.0)], &[]).unwrap();
        assert_eq!(data.interpolate(&NVec3::zeros(), &[1.0, 1.0]).unwrap(), 0.0);
        assert!(data.interpolate(&NVec3::zeros(), &[1.0]).is_err());
    }

    #[test]
    fn test_gradient_of_constant_field_cancels_on_symmetric_pair() {
        let mut data = SphSystemData::new();
        data.set_target_spacing(1.0);
        data.set_relative_kernel_radius(1.5);
        data.add_particles(
            &[NVec3::new(-1.0, 0.0, 0.0), NVec3::zeros(), NVec3::new(1.0, 0.0, 0.0)],
            &[],
        )
        .unwrap();
        data.build_neighbor_searcher();
        data.update_densities();

        let g = data.gradient_at(1, &[2.0, 2.0, 2.0]).unwrap();
        assert!(g.norm() < 1e-12);
        assert_eq!(data.laplacian_at(1, &[2.0, 2.0, 2.0]).unwrap(), 0.0);
        assert!(data.gradient_at(3, &[2.0, 2.0, 2.0]).is_err());
    }
}
