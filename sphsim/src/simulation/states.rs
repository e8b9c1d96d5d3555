//! Per-particle state storage.
//!
//! [`ParticleSystemData`] is a registry of attribute channels that always
//! stay the same length as the particle count:
//! - each channel is a tagged [`ChannelData`] (scalar or 3-vector series)
//! - channels are addressed by typed handles ([`ScalarHandle`], [`VectorHandle`])
//!   which are plain indices into the registry, assigned in creation order
//! - positions, velocities and forces are ordinary vector channels created
//!   first, so their handles are fixed
//!
//! Every structural mutation bumps a generation counter. Neighbor lists are
//! stamped with the generation they were built against, which is how the SPH
//! layer notices stale lists.

use nalgebra::Vector3;

use crate::error::{HandleKind, SphError, SphResult};

pub type NVec3 = Vector3<f64>;

/// Handle of a scalar (`f64`) attribute channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScalarHandle(pub(crate) usize);

/// Handle of a 3-vector attribute channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VectorHandle(pub(crate) usize);

impl ScalarHandle {
    /// Raw registry slot
    pub fn index(self) -> usize {
        self.0
    }
}

impl VectorHandle {
    /// Raw registry slot
    pub fn index(self) -> usize {
        self.0
    }
}

/// Built-in position channel
pub const POSITION: VectorHandle = VectorHandle(0);
/// Built-in velocity channel
pub const VELOCITY: VectorHandle = VectorHandle(1);
/// Built-in force channel
pub const FORCE: VectorHandle = VectorHandle(2);

/// Backing array of one attribute channel
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelData {
    Scalar(Vec<f64>),
    Vector(Vec<NVec3>),
}

impl ChannelData {
    pub fn len(&self) -> usize {
        match self {
            ChannelData::Scalar(v) => v.len(),
            ChannelData::Vector(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Grow with zeros or truncate
    fn resize(&mut self, n: usize) {
        match self {
            ChannelData::Scalar(v) => v.resize(n, 0.0),
            ChannelData::Vector(v) => v.resize(n, NVec3::zeros()),
        }
    }

    /// Keep entries whose `keep` flag is set, preserving order
    fn compact(&mut self, keep: &[bool]) {
        match self {
            ChannelData::Scalar(v) => retain_flagged(v, keep),
            ChannelData::Vector(v) => retain_flagged(v, keep),
        }
    }
}

fn retain_flagged<T>(v: &mut Vec<T>, keep: &[bool]) {
    let mut flags = keep.iter();
    v.retain(|_| *flags.next().unwrap_or(&true));
}

/// Particle attribute registry (positions, velocities, forces + user channels)
#[derive(Debug, Clone)]
pub struct ParticleSystemData {
    n: usize, // particle count, equal to every channel's length
    channels: Vec<ChannelData>, // indexed by handle
    generation: u64, // bumped by every mutation that can move or reorder particles
}

impl Default for ParticleSystemData {
    fn default() -> Self {
        Self::new()
    }
}

impl ParticleSystemData {
    /// Empty store with the three built-in vector channels
    pub fn new() -> Self {
        Self {
            n: 0,
            channels: vec![
                ChannelData::Vector(Vec::new()), // POSITION
                ChannelData::Vector(Vec::new()), // VELOCITY
                ChannelData::Vector(Vec::new()), // FORCE
            ],
            generation: 0,
        }
    }

    /// Store with `n` particles at the origin
    pub fn with_particles(n: usize) -> Self {
        let mut data = Self::new();
        data.resize(n);
        data
    }

    pub fn number_of_particles(&self) -> usize {
        self.n
    }

    pub fn number_of_channels(&self) -> usize {
        self.channels.len()
    }

    /// Mutation counter, see module docs
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// All channels in handle order
    pub fn channels(&self) -> &[ChannelData] {
        &self.channels
    }

    // channels ===========================================================================

    /// Append a scalar channel filled with `initial`
    pub fn add_scalar_data(&mut self, initial: f64) -> ScalarHandle {
        let handle = ScalarHandle(self.channels.len());
        self.channels.push(ChannelData::Scalar(vec![initial; self.n]));
        handle
    }

    /// Append a vector channel filled with `initial`
    pub fn add_vector_data(&mut self, initial: NVec3) -> VectorHandle {
        let handle = VectorHandle(self.channels.len());
        self.channels.push(ChannelData::Vector(vec![initial; self.n]));
        handle
    }

    pub fn scalar_data_at(&self, handle: ScalarHandle) -> SphResult<&[f64]> {
        match self.channels.get(handle.0) {
            Some(ChannelData::Scalar(v)) => Ok(v),
            _ => Err(self.invalid(HandleKind::Scalar, handle.0)),
        }
    }

    pub fn scalar_data_at_mut(&mut self, handle: ScalarHandle) -> SphResult<&mut [f64]> {
        let len = self.channels.len();
        match self.channels.get_mut(handle.0) {
            Some(ChannelData::Scalar(v)) => Ok(v),
            _ => Err(SphError::InvalidHandle { kind: HandleKind::Scalar, index: handle.0, len }),
        }
    }

    pub fn vector_data_at(&self, handle: VectorHandle) -> SphResult<&[NVec3]> {
        match self.channels.get(handle.0) {
            Some(ChannelData::Vector(v)) => Ok(v),
            _ => Err(self.invalid(HandleKind::Vector, handle.0)),
        }
    }

    /// Mutable view of a vector channel. Borrowing positions this way
    /// counts as moving particles.
    pub fn vector_data_at_mut(&mut self, handle: VectorHandle) -> SphResult<&mut [NVec3]> {
        if handle == POSITION {
            self.generation += 1;
        }
        let len = self.channels.len();
        match self.channels.get_mut(handle.0) {
            Some(ChannelData::Vector(v)) => Ok(v),
            _ => Err(SphError::InvalidHandle { kind: HandleKind::Vector, index: handle.0, len }),
        }
    }

    pub fn positions(&self) -> &[NVec3] {
        self.builtin(POSITION)
    }

    /// Mutable positions; marks neighbor lists stale
    pub fn positions_mut(&mut self) -> &mut [NVec3] {
        self.generation += 1;
        self.builtin_mut(POSITION)
    }

    pub fn velocities(&self) -> &[NVec3] {
        self.builtin(VELOCITY)
    }

    pub fn velocities_mut(&mut self) -> &mut [NVec3] {
        self.builtin_mut(VELOCITY)
    }

    pub fn forces(&self) -> &[NVec3] {
        self.builtin(FORCE)
    }

    pub fn forces_mut(&mut self) -> &mut [NVec3] {
        self.builtin_mut(FORCE)
    }

    // particles ==========================================================================

    /// Append one particle. Every channel grows by one zero entry, except the
    /// built-in position/velocity/force channels which take the given values.
    pub fn add_particle(&mut self, position: NVec3, velocity: NVec3, force: NVec3) {
        let n = self.n;
        self.resize(n + 1);
        self.builtin_mut(POSITION)[n] = position;
        self.builtin_mut(VELOCITY)[n] = velocity;
        self.builtin_mut(FORCE)[n] = force;
    }

    /// Append one particle at rest
    pub fn add_particle_at(&mut self, position: NVec3) {
        self.add_particle(position, NVec3::zeros(), NVec3::zeros());
    }

    /// Append many particles at once.
    ///
    /// `velocities` and `forces` may be empty (zero-filled); otherwise they must
    /// match `positions` in length. Lengths are checked before anything is
    /// touched, so a rejected call leaves the store unchanged.
    pub fn add_particles(&mut self, positions: &[NVec3], velocities: &[NVec3], forces: &[NVec3]) -> SphResult<()> {
        if !velocities.is_empty() && velocities.len() != positions.len() {
            return Err(SphError::SizeMismatch {
                what: "velocities",
                expected: positions.len(),
                actual: velocities.len(),
            });
        }
        if !forces.is_empty() && forces.len() != positions.len() {
            return Err(SphError::SizeMismatch {
                what: "forces",
                expected: positions.len(),
                actual: forces.len(),
            });
        }

        let old_n = self.n;
        self.resize(old_n + positions.len());

        self.builtin_mut(POSITION)[old_n..].copy_from_slice(positions);
        if !velocities.is_empty() {
            self.builtin_mut(VELOCITY)[old_n..].copy_from_slice(velocities);
        }
        if !forces.is_empty() {
            self.builtin_mut(FORCE)[old_n..].copy_from_slice(forces);
        }
        Ok(())
    }

    /// Set the particle count; new entries are zero, surplus entries dropped
    pub fn resize(&mut self, n: usize) {
        for channel in &mut self.channels {
            channel.resize(n);
        }
        self.n = n;
        self.generation += 1;
    }

    /// Remove the given particle indices, keeping the survivors in order.
    /// Duplicate indices are ignored; any out-of-range index rejects the call.
    pub fn remove_particles(&mut self, indices: &[usize]) -> SphResult<()> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.n) {
            return Err(self.invalid(HandleKind::Particle, bad));
        }
        if indices.is_empty() {
            return Ok(());
        }

        let mut keep = vec![true; self.n];
        for &i in indices {
            keep[i] = false;
        }
        let survivors = keep.iter().filter(|&&k| k).count();

        for channel in &mut self.channels {
            channel.compact(&keep);
        }
        self.n = survivors;
        self.generation += 1;
        Ok(())
    }

    /// Rebuild a store from decoded channels; the caller has already checked
    /// that every channel has length `n`.
    pub(crate) fn from_channels(n: usize, channels: Vec<ChannelData>, generation: u64) -> Self {
        Self {
            n,
            channels,
            generation,
        }
    }

    // helpers ============================================================================

    fn invalid(&self, kind: HandleKind, index: usize) -> SphError {
        let len = match kind {
            HandleKind::Particle => self.n,
            _ => self.channels.len(),
        };
        SphError::InvalidHandle { kind, index, len }
    }

    fn builtin(&self, handle: VectorHandle) -> &[NVec3] {
        match &self.channels[handle.0] {
            ChannelData::Vector(v) => v,
            ChannelData::Scalar(_) => unreachable!("built-in channel {} is a vector channel", handle.0),
        }
    }

    fn builtin_mut(&mut self, handle: VectorHandle) -> &mut [NVec3] {
        match &mut self.channels[handle.0] {
            ChannelData::Vector(v) => v,
            ChannelData::Scalar(_) => unreachable!("built-in channel {} is a vector channel", handle.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_channels_track_particle_count() {
        let mut data = ParticleSystemData::new();
        data.add_particle_at(NVec3::new(1.0, 2.0, 3.0));
        data.add_particle(NVec3::zeros(), NVec3::new(0.0, 1.0, 0.0), NVec3::zeros());

        assert_eq!(data.number_of_particles(), 2);
        assert_eq!(data.positions()[0], NVec3::new(1.0, 2.0, 3.0));
        assert_eq!(data.velocities()[1], NVec3::new(0.0, 1.0, 0.0));
        assert_eq!(data.forces().len(), 2);
    }

    #[test]
    fn test_new_channel_is_filled_and_later_particles_are_zero() {
        let mut data = ParticleSystemData::with_particles(3);
        let h = data.add_scalar_data(4.5);
        assert_eq!(data.scalar_data_at(h).unwrap(), &[4.5, 4.5, 4.5]);

        data.add_particle_at(NVec3::zeros());
        assert_eq!(data.scalar_data_at(h).unwrap(), &[4.5, 4.5, 4.5, 0.0]);
    }

    #[test]
    fn test_handle_kind_is_checked() {
        let mut data = ParticleSystemData::new();
        let s = data.add_scalar_data(0.0);
        let as_vector = VectorHandle(s.index());

        assert!(matches!(
            data.vector_data_at(as_vector),
            Err(SphError::InvalidHandle { kind: HandleKind::Vector, .. })
        ));
        assert!(data.scalar_data_at(ScalarHandle(99)).is_err());
    }

    #[test]
    fn test_remove_particles_keeps_order() {
        let mut data = ParticleSystemData::new();
        for i in 0..5 {
            data.add_particle_at(NVec3::new(i as f64, 0.0, 0.0));
        }
        let h = data.add_scalar_data(0.0);
        data.scalar_data_at_mut(h).unwrap().copy_from_slice(&[0.0, 1.0, 2.0, 3.0, 4.0]);

        data.remove_particles(&[1, 3, 3]).unwrap();

        assert_eq!(data.number_of_particles(), 3);
        assert_eq!(data.scalar_data_at(h).unwrap(), &[0.0, 2.0, 4.0]);
        assert_eq!(data.positions()[2].x, 4.0);
        assert!(data.remove_particles(&[3]).is_err());
    }

    #[test]
    fn test_generation_bumps_on_position_access_only() {
        let mut data = ParticleSystemData::with_particles(2);
        let g0 = data.generation();

        data.velocities_mut()[0] = NVec3::new(1.0, 0.0, 0.0);
        assert_eq!(data.generation(), g0);

        data.positions_mut()[0] = NVec3::new(1.0, 0.0, 0.0);
        assert!(data.generation() > g0);
    }
}
