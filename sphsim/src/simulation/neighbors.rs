//! Per-particle neighbor lists
//!
//! `NeighborLists` holds, for every particle `i`, the indices `j != i` found
//! within the build radius of `x_i`, in the order the searcher visited them.
//! Each build is stamped with the particle-store generation and the radius it
//! used; the lists are stale as soon as either no longer matches.

use rayon::prelude::*;

use super::searcher::PointNeighborSearcher;
use super::states::NVec3;

/// What a set of neighbor lists was built against
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuildStamp {
    pub generation: u64, // particle-store generation at build time
    pub radius: f64, // query radius
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NeighborLists {
    lists: Vec<Vec<usize>>,
    stamp: Option<BuildStamp>,
}

impl NeighborLists {
    /// Query `searcher` around every position and collect the other indices.
    ///
    /// Particles are processed in parallel; each list depends only on its own
    /// query, so the result is independent of the thread count.
    pub fn build(searcher: &dyn PointNeighborSearcher, positions: &[NVec3], radius: f64, generation: u64) -> Self {
        let lists = positions
            .par_iter()
            .enumerate()
            .map(|(i, origin)| {
                let mut neighbors = Vec::new();
                searcher.for_each_nearby_point(origin, radius, &mut |j, _| {
                    if j != i {
                        neighbors.push(j);
                    }
                });
                neighbors
            })
            .collect();

        Self {
            lists,
            stamp: Some(BuildStamp { generation, radius }),
        }
    }

    /// Lists restored from a snapshot, stamped as current
    pub(crate) fn restore(lists: Vec<Vec<usize>>, stamp: Option<BuildStamp>) -> Self {
        Self { lists, stamp }
    }

    pub fn lists(&self) -> &[Vec<usize>] {
        &self.lists
    }

    /// Neighbors of particle `i`, `None` past the end
    pub fn get(&self, i: usize) -> Option<&[usize]> {
        self.lists.get(i).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    pub fn stamp(&self) -> Option<BuildStamp> {
        self.stamp
    }

    /// Never built, or built against another generation or radius
    pub fn is_stale(&self, generation: u64, radius: f64) -> bool {
        match self.stamp {
            Some(s) => s.generation != generation || s.radius != radius,
            None => true,
        }
    }

    /// Sum of all list lengths
    pub fn total_neighbors(&self) -> usize {
        self.lists.iter().map(Vec::len).sum()
    }
}
