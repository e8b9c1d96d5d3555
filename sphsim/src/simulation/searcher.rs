//! Point neighbor searchers
//!
//! A searcher is a spatial index over a snapshot of particle positions that
//! answers "every point within `radius` of `origin`". Implementations:
//! - [`PointHashGridSearcher`]: uniform grid hashed into a fixed number of buckets (default)
//! - [`PointOctreeSearcher`](super::octree::PointOctreeSearcher): cubic octree
//! - [`PointSimpleListSearcher`]: linear scan, the reference the others are tested against
//!
//! Visit order is unspecified but fixed for a given build, so repeated queries
//! (and neighbor lists built from them) are reproducible.

use serde::{Deserialize, Serialize};

use super::octree::PointOctreeSearcher;
use super::states::NVec3;

/// Default bucket count per axis of the hash grid
pub const DEFAULT_HASH_GRID_RESOLUTION: usize = 64;

/// Spatial index over a point set
pub trait PointNeighborSearcher: Send + Sync {
    /// Which implementation this is
    fn kind(&self) -> SearcherKind;

    /// Rebuild the index from `points`, discarding previous state
    fn build(&mut self, points: &[NVec3]);

    /// Call `visitor(index, point)` for every indexed point with
    /// `|point - origin| <= radius`
    fn for_each_nearby_point(&self, origin: &NVec3, radius: f64, visitor: &mut dyn FnMut(usize, &NVec3));

    /// True if any indexed point lies within `radius` of `origin`
    fn has_nearby_point(&self, origin: &NVec3, radius: f64) -> bool {
        let mut found = false;
        self.for_each_nearby_point(origin, radius, &mut |_, _| found = true);
        found
    }

    /// The point set of the last build, in index order
    fn points(&self) -> &[NVec3];

    /// Number of indexed points
    fn len(&self) -> usize {
        self.points().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Searcher implementation selector (scenario config + snapshots)
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearcherKind {
    #[default]
    #[serde(rename = "hash_grid")]
    HashGrid,

    #[serde(rename = "octree")]
    Octree,

    #[serde(rename = "simple_list")]
    SimpleList,
}

impl SearcherKind {
    /// Fresh, empty searcher of this kind. `grid_spacing` is only used by the
    /// hash grid and should be at least twice the query radius.
    pub fn create(self, grid_spacing: f64) -> Box<dyn PointNeighborSearcher> {
        match self {
            SearcherKind::HashGrid => Box::new(PointHashGridSearcher::new(DEFAULT_HASH_GRID_RESOLUTION, grid_spacing)),
            SearcherKind::Octree => Box::new(PointOctreeSearcher::new()),
            SearcherKind::SimpleList => Box::new(PointSimpleListSearcher::new()),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SearcherKind::HashGrid => "hash_grid",
            SearcherKind::Octree => "octree",
            SearcherKind::SimpleList => "simple_list",
        }
    }
}

// =========================================================================================
// Hash grid
// =========================================================================================

/// Uniform grid of cubic cells, wrapped into `resolution³` buckets.
///
/// Cells are addressed by `floor(p / grid_spacing)`; the bucket key wraps each
/// cell coordinate modulo the resolution, so the grid covers unbounded space
/// with a fixed table. Wrapped cells share a bucket, which costs extra
/// distance checks but never drops a point.
#[derive(Debug, Clone)]
pub struct PointHashGridSearcher {
    grid_spacing: f64,
    resolution: usize,
    points: Vec<NVec3>,
    buckets: Vec<Vec<usize>>, // key -> point indices in insertion order
}

impl PointHashGridSearcher {
    pub fn new(resolution: usize, grid_spacing: f64) -> Self {
        Self {
            grid_spacing,
            resolution: resolution.max(1),
            points: Vec::new(),
            buckets: Vec::new(),
        }
    }

    pub fn grid_spacing(&self) -> f64 {
        self.grid_spacing
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    /// Bucket contents, indexed by key
    pub fn buckets(&self) -> &[Vec<usize>] {
        &self.buckets
    }

    /// Integer cell coordinate containing `p`
    pub fn cell_of(&self, p: &NVec3) -> [i64; 3] {
        [
            (p.x / self.grid_spacing).floor() as i64,
            (p.y / self.grid_spacing).floor() as i64,
            (p.z / self.grid_spacing).floor() as i64,
        ]
    }

    /// Bucket key of a cell coordinate
    pub fn hash_key(&self, cell: [i64; 3]) -> usize {
        let r = self.resolution as i64;
        let x = cell[0].rem_euclid(r);
        let y = cell[1].rem_euclid(r);
        let z = cell[2].rem_euclid(r);
        (x + y * r + z * r * r) as usize
    }

    /// Sorted, de-duplicated keys of every bucket that may hold a point
    /// within `radius` of `origin`
    fn nearby_keys(&self, origin: &NVec3, radius: f64) -> Vec<usize> {
        let lo = self.cell_of(&(origin - NVec3::repeat(radius)));
        let hi = self.cell_of(&(origin + NVec3::repeat(radius)));

        // Past `resolution` cells along an axis every wrapped coordinate is covered
        let r = self.resolution as i64;
        let span = |axis: usize| (hi[axis] - lo[axis] + 1).min(r);

        let mut keys = Vec::with_capacity(8);
        for dz in 0..span(2) {
            for dy in 0..span(1) {
                for dx in 0..span(0) {
                    keys.push(self.hash_key([lo[0] + dx, lo[1] + dy, lo[2] + dz]));
                }
            }
        }
        keys.sort_unstable();
        keys.dedup();
        keys
    }
}

impl PointNeighborSearcher for PointHashGridSearcher {
    fn kind(&self) -> SearcherKind {
        SearcherKind::HashGrid
    }

    fn build(&mut self, points: &[NVec3]) {
        let n_buckets = self.resolution * self.resolution * self.resolution;
        if self.buckets.len() == n_buckets {
            for bucket in &mut self.buckets {
                bucket.clear();
            }
        } else {
            self.buckets = vec![Vec::new(); n_buckets];
        }

        self.points = points.to_vec();
        if points.is_empty() || !(self.grid_spacing > 0.0) {
            return;
        }

        for (i, p) in points.iter().enumerate() {
            let key = self.hash_key(self.cell_of(p));
            self.buckets[key].push(i);
        }
    }

    fn for_each_nearby_point(&self, origin: &NVec3, radius: f64, visitor: &mut dyn FnMut(usize, &NVec3)) {
        if self.points.is_empty() || !(self.grid_spacing > 0.0) {
            return;
        }
        let radius2 = radius * radius;

        for key in self.nearby_keys(origin, radius) {
            for &i in &self.buckets[key] {
                let p = &self.points[i];
                if (p - origin).norm_squared() <= radius2 {
                    visitor(i, p);
                }
            }
        }
    }

    fn points(&self) -> &[NVec3] {
        &self.points
    }
}

// =========================================================================================
// Simple list
// =========================================================================================

/// Brute-force searcher: checks every point, visits in index order
#[derive(Debug, Clone, Default)]
pub struct PointSimpleListSearcher {
    points: Vec<NVec3>,
}

impl PointSimpleListSearcher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PointNeighborSearcher for PointSimpleListSearcher {
    fn kind(&self) -> SearcherKind {
        SearcherKind::SimpleList
    }

    fn build(&mut self, points: &[NVec3]) {
        self.points = points.to_vec();
    }

    fn for_each_nearby_point(&self, origin: &NVec3, radius: f64, visitor: &mut dyn FnMut(usize, &NVec3)) {
        let radius2 = radius * radius;
        for (i, p) in self.points.iter().enumerate() {
            if (p - origin).norm_squared() <= radius2 {
                visitor(i, p);
            }
        }
    }

    fn points(&self) -> &[NVec3] {
        &self.points
    }
}
