//! Binary snapshots of an [`SphSystemData`]
//!
//! The whole system (parameters, every channel in handle order, the
//! neighbor lists and the searcher) is written as one versioned
//! [`SphSnapshot`] record with bincode's standard configuration. The search
//! structure is stored as the point set it indexes and rebuilt from that on
//! load, so a stale searcher stays stale.
//!
//! Loading checks structure only: anything that would break the store's
//! own invariants (channel layout and lengths, parameters) is reported as
//! [`SphError::CorruptData`]. Neighbor lists and searcher points are whatever
//! the last build left behind and are restored as they are.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{SphError, SphResult};

use super::neighbors::BuildStamp;
use super::params::SphParameters;
use super::searcher::{PointNeighborSearcher, SearcherKind};
use super::sph::SphSystemData;
use super::states::{ChannelData, NVec3, ParticleSystemData};

/// Format version written into every snapshot
pub const SNAPSHOT_VERSION: u32 = 1;

/// Built-in channel layout: position, velocity, force, density, pressure
const BUILTIN_LAYOUT: [ChannelKind; 5] = [
    ChannelKind::Vector,
    ChannelKind::Vector,
    ChannelKind::Vector,
    ChannelKind::Scalar,
    ChannelKind::Scalar,
];

/// Upper bound on bytes a single decode may claim
const DECODE_LIMIT: usize = 1 << 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelKind {
    Scalar,
    Vector,
}

/// One serialized attribute channel
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum ChannelSnapshot {
    Scalar(Vec<f64>),
    Vector(Vec<[f64; 3]>),
}

impl ChannelSnapshot {
    fn kind(&self) -> ChannelKind {
        match self {
            ChannelSnapshot::Scalar(_) => ChannelKind::Scalar,
            ChannelSnapshot::Vector(_) => ChannelKind::Vector,
        }
    }

    fn len(&self) -> usize {
        match self {
            ChannelSnapshot::Scalar(v) => v.len(),
            ChannelSnapshot::Vector(v) => v.len(),
        }
    }
}

impl From<&ChannelData> for ChannelSnapshot {
    fn from(channel: &ChannelData) -> Self {
        match channel {
            ChannelData::Scalar(v) => ChannelSnapshot::Scalar(v.clone()),
            ChannelData::Vector(v) => ChannelSnapshot::Vector(v.iter().map(|p| [p.x, p.y, p.z]).collect()),
        }
    }
}

impl From<ChannelSnapshot> for ChannelData {
    fn from(channel: ChannelSnapshot) -> Self {
        match channel {
            ChannelSnapshot::Scalar(v) => ChannelData::Scalar(v),
            ChannelSnapshot::Vector(v) => ChannelData::Vector(v.into_iter().map(NVec3::from).collect()),
        }
    }
}

/// Neighbor list build stamp as stored on disk
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct StampSnapshot {
    pub generation: u64,
    pub radius: f64,
}

/// On-disk form of an [`SphSystemData`]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SphSnapshot {
    pub version: u32,

    pub target_density: f64,
    pub target_spacing: f64,
    pub relative_kernel_radius: f64,
    pub mass: f64,

    pub number_of_particles: u64,
    pub generation: u64,
    pub channels: Vec<ChannelSnapshot>, // handle order

    pub neighbor_lists: Vec<Vec<u64>>, // empty if never built
    pub neighbor_stamp: Option<StampSnapshot>,

    pub searcher: SearcherKind,
    pub searcher_grid_spacing: f64,
    pub searcher_points: Vec<[f64; 3]>, // positions at the last searcher build
}

impl SphSnapshot {
    /// Capture the current state of `data`
    pub fn capture(data: &SphSystemData) -> Self {
        let params = data.parameters();
        let particles = data.particles();
        let table = data.neighbor_list_table();

        Self {
            version: SNAPSHOT_VERSION,
            target_density: params.target_density(),
            target_spacing: params.target_spacing(),
            relative_kernel_radius: params.relative_kernel_radius(),
            mass: params.mass(),
            number_of_particles: particles.number_of_particles() as u64,
            generation: particles.generation(),
            channels: particles.channels().iter().map(ChannelSnapshot::from).collect(),
            neighbor_lists: table
                .lists()
                .iter()
                .map(|list| list.iter().map(|&j| j as u64).collect())
                .collect(),
            neighbor_stamp: table.stamp().map(|s| StampSnapshot {
                generation: s.generation,
                radius: s.radius,
            }),
            searcher: data.searcher_kind(),
            searcher_grid_spacing: data.searcher_grid_spacing(),
            searcher_points: data
                .neighbor_searcher()
                .points()
                .iter()
                .map(|p| [p.x, p.y, p.z])
                .collect(),
        }
    }

    /// Validate and turn back into a live system
    pub fn restore(self) -> SphResult<SphSystemData> {
        if self.version != SNAPSHOT_VERSION {
            return Err(corrupt(format!(
                "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
                self.version
            )));
        }

        check_positive("target_density", self.target_density)?;
        check_positive("target_spacing", self.target_spacing)?;
        check_positive("relative_kernel_radius", self.relative_kernel_radius)?;
        check_positive("mass", self.mass)?;

        let n = usize::try_from(self.number_of_particles)
            .map_err(|_| corrupt(format!("particle count {} does not fit in memory", self.number_of_particles)))?;

        // Channels
        if self.channels.len() < BUILTIN_LAYOUT.len() {
            return Err(corrupt(format!(
                "expected at least {} channels, found {}",
                BUILTIN_LAYOUT.len(),
                self.channels.len()
            )));
        }
        for (slot, (channel, expected)) in self.channels.iter().zip(BUILTIN_LAYOUT).enumerate() {
            if channel.kind() != expected {
                return Err(corrupt(format!("built-in channel {slot} has the wrong type")));
            }
        }
        for (slot, channel) in self.channels.iter().enumerate() {
            if channel.len() != n {
                return Err(corrupt(format!(
                    "channel {slot} holds {} values for {n} particles",
                    channel.len()
                )));
            }
        }

        // Neighbor lists are kept verbatim: after particles are added or
        // removed they may be shorter or longer than the store and hold indices
        // past its end, which every consumer skips.
        let mut lists = Vec::with_capacity(self.neighbor_lists.len());
        for (i, list) in self.neighbor_lists.into_iter().enumerate() {
            let restored = list
                .into_iter()
                .map(usize::try_from)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| corrupt(format!("neighbor list {i} holds an index past the address space")))?;
            lists.push(restored);
        }
        let searcher_points: Vec<NVec3> = self.searcher_points.into_iter().map(NVec3::from).collect();

        let channels = self.channels.into_iter().map(ChannelData::from).collect();
        let particles = ParticleSystemData::from_channels(n, channels, self.generation);
        let params = SphParameters::from_raw(
            self.target_density,
            self.target_spacing,
            self.relative_kernel_radius,
            self.mass,
        );
        let stamp = self.neighbor_stamp.map(|s| BuildStamp {
            generation: s.generation,
            radius: s.radius,
        });

        Ok(SphSystemData::from_snapshot_parts(
            particles,
            params,
            self.searcher,
            self.searcher_grid_spacing,
            &searcher_points,
            lists,
            stamp,
        ))
    }
}

impl SphSystemData {
    /// Encode the whole system into a self-contained byte buffer
    pub fn serialize(&self) -> SphResult<Vec<u8>> {
        let snapshot = SphSnapshot::capture(self);
        Ok(bincode::serde::encode_to_vec(&snapshot, bincode::config::standard())?)
    }

    /// Decode a buffer produced by [`SphSystemData::serialize`].
    ///
    /// Truncated, padded or inconsistent buffers are rejected; a failed call
    /// leaves nothing behind.
    pub fn deserialize(bytes: &[u8]) -> SphResult<Self> {
        let config = bincode::config::standard().with_limit::<DECODE_LIMIT>();
        let (snapshot, read): (SphSnapshot, usize) = bincode::serde::decode_from_slice(bytes, config)?;
        if read != bytes.len() {
            return Err(corrupt(format!("{} trailing bytes after snapshot", bytes.len() - read)));
        }

        let data = snapshot.restore()?;
        tracing::debug!(
            particles = data.number_of_particles(),
            channels = data.particles().number_of_channels(),
            bytes = bytes.len(),
            "restored snapshot"
        );
        Ok(data)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> SphResult<()> {
        let bytes = self.serialize()?;
        std::fs::write(path.as_ref(), &bytes)?;
        tracing::info!(path = %path.as_ref().display(), bytes = bytes.len(), "wrote snapshot");
        Ok(())
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> SphResult<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::deserialize(&bytes)
    }
}

fn corrupt(message: String) -> SphError {
    SphError::CorruptData(message)
}

fn check_positive(name: &str, value: f64) -> SphResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(corrupt(format!("{name} must be finite and positive, found {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_system() -> SphSystemData {
        let mut data = SphSystemData::new();
        data.add_particles(
            &[NVec3::zeros(), NVec3::new(0.1, 0.0, 0.0), NVec3::new(0.0, 0.1, 0.0)],
            &[],
        )
        .unwrap();
        data.build_neighbor_searcher();
        data.update_densities();
        data
    }

    #[test]
    fn test_restore_keeps_staleness() {
        let mut data = small_system();
        data.particles_mut().positions_mut()[0].x += 0.01;
        assert!(data.is_neighbor_list_stale());

        let restored = SphSystemData::deserialize(&data.serialize().unwrap()).unwrap();
        assert!(restored.is_neighbor_list_stale());
        assert_eq!(restored.neighbor_lists(), data.neighbor_lists());
    }

    #[test]
    fn test_wrong_version_is_rejected() {
        let mut snap = SphSnapshot::capture(&small_system());
        snap.version += 1;
        assert!(matches!(snap.restore(), Err(SphError::CorruptData(_))));
    }

    #[test]
    fn test_lists_from_before_a_removal_are_kept() {
        let mut data = small_system();
        data.particles_mut().remove_particles(&[0, 1]).unwrap();

        let snap = SphSnapshot::capture(&data);
        assert_eq!(snap.neighbor_lists.len(), 3);
        assert_eq!(snap.searcher_points.len(), 3);

        let restored = snap.restore().unwrap();
        assert_eq!(restored.number_of_particles(), 1);
        assert_eq!(restored.neighbor_lists(), data.neighbor_lists());
        assert_eq!(restored.neighbor_searcher().len(), 3);
    }

    #[test]
    fn test_swapped_builtin_channel_is_rejected() {
        let mut snap = SphSnapshot::capture(&small_system());
        snap.channels.swap(2, 3);
        assert!(matches!(snap.restore(), Err(SphError::CorruptData(_))));
    }

    #[test]
    fn test_short_channel_is_rejected() {
        let mut snap = SphSnapshot::capture(&small_system());
        if let ChannelSnapshot::Scalar(v) = &mut snap.channels[3] {
            v.pop();
        }
        assert!(matches!(snap.restore(), Err(SphError::CorruptData(_))));
    }
}
