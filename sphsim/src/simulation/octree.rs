//! # Octree point searcher
//!
//! Range queries over a static point set using a cubic octree.
//!
//! ## Core Concepts
//!
//! - Space is recursively subdivided into 8 regions (octants).
//! - Each region becomes a node of the tree; nodes live in one `Vec` and refer
//!   to children by index.
//! - A leaf holds the indices of the points inside it. A leaf is split once it
//!   would hold a second point, unless the depth cap is reached (coincident
//!   points end up sharing a leaf at the cap).
//! - A query walks the tree from the root and skips every node whose box does
//!   not intersect the query sphere.
//!
//! Children are visited in octant order (bit 0 = x, bit 1 = y, bit 2 = z), so
//! the visit order is fixed for a given build.

use super::searcher::{PointNeighborSearcher, SearcherKind};
use super::states::NVec3;

/// Depth beyond which leaves stop splitting
pub const MAX_OCTREE_DEPTH: usize = 24;

/// A single octree node covering an axis-aligned cube
#[derive(Debug, Clone)]
pub struct OctreeNode {
    pub bbox_min: NVec3,
    pub bbox_max: NVec3,
    pub children: [Option<usize>; 8], // indices into PointOctreeSearcher::nodes
    pub points: Vec<usize>,           // point indices held by this leaf
}

impl OctreeNode {
    fn new(bbox_min: NVec3, bbox_max: NVec3) -> Self {
        Self {
            bbox_min,
            bbox_max,
            children: [None; 8],
            points: Vec::new(),
        }
    }

    fn is_leaf(&self) -> bool {
        self.children.iter().all(|c| c.is_none())
    }
}

/// Octree over a snapshot of points
#[derive(Debug, Clone, Default)]
pub struct PointOctreeSearcher {
    nodes: Vec<OctreeNode>,
    points: Vec<NVec3>,
}

impl PointOctreeSearcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[OctreeNode] {
        &self.nodes
    }

    // helpers ==============================================================================

    /// Insert point `idx` into the subtree rooted at `node_idx`.
    ///
    /// - Empty leaf: store the point here.
    /// - Occupied leaf below the depth cap: subdivide, push the resident points
    ///   down, then descend.
    /// - Occupied leaf at the cap: stack the point in the leaf.
    /// - Internal node: descend into the octant containing the point.
    fn insert_point(&mut self, node_idx: usize, idx: usize, depth: usize) {
        let bbox_min = self.nodes[node_idx].bbox_min;
        let bbox_max = self.nodes[node_idx].bbox_max;
        let pos = self.points[idx];

        if self.nodes[node_idx].is_leaf() {
            if self.nodes[node_idx].points.is_empty() || depth >= MAX_OCTREE_DEPTH {
                self.nodes[node_idx].points.push(idx);
                return;
            }

            // Split: take the residents out so no &mut node is live while recursing
            let residents = std::mem::take(&mut self.nodes[node_idx].points);
            self.subdivide(node_idx, bbox_min, bbox_max);
            for resident in residents {
                self.insert_point(node_idx, resident, depth);
            }
        }

        let child_idx = child_index_for_point(&pos, &bbox_min, &bbox_max);
        if let Some(child_node_idx) = self.nodes[node_idx].children[child_idx] {
            self.insert_point(child_node_idx, idx, depth + 1);
        }
    }

    /// Split a node into 8 child octants covering its bounding box
    fn subdivide(&mut self, node_idx: usize, bbox_min: NVec3, bbox_max: NVec3) {
        for child_idx in 0..8 {
            let (cmin, cmax) = child_bbox(&bbox_min, &bbox_max, child_idx);
            let new_node_idx = self.nodes.len();
            self.nodes.push(OctreeNode::new(cmin, cmax));
            self.nodes[node_idx].children[child_idx] = Some(new_node_idx);
        }
    }

    fn traverse_node(&self, node_idx: usize, origin: &NVec3, radius2: f64, visitor: &mut dyn FnMut(usize, &NVec3)) {
        let node = &self.nodes[node_idx];

        // Prune nodes whose cube misses the query sphere
        if box_distance_squared(origin, &node.bbox_min, &node.bbox_max) > radius2 {
            return;
        }

        for &i in &node.points {
            let p = &self.points[i];
            if (p - origin).norm_squared() <= radius2 {
                visitor(i, p);
            }
        }

        for child_idx in node.children.iter().flatten() {
            self.traverse_node(*child_idx, origin, radius2, visitor);
        }
    }
}

impl PointNeighborSearcher for PointOctreeSearcher {
    fn kind(&self) -> SearcherKind {
        SearcherKind::Octree
    }

    fn build(&mut self, points: &[NVec3]) {
        self.nodes.clear();
        self.points = points.to_vec();
        if points.is_empty() {
            return;
        }

        let (bbox_min, bbox_max) = compute_global_bbox(points);
        self.nodes.push(OctreeNode::new(bbox_min, bbox_max));

        for i in 0..points.len() {
            self.insert_point(0, i, 0);
        }
    }

    fn for_each_nearby_point(&self, origin: &NVec3, radius: f64, visitor: &mut dyn FnMut(usize, &NVec3)) {
        if self.nodes.is_empty() {
            return;
        }
        self.traverse_node(0, origin, radius * radius, visitor);
    }

    fn points(&self) -> &[NVec3] {
        &self.points
    }
}

// helpers ===========================================================================

/// Cubic bounding box enclosing all points.
///
/// The axis-aligned extent is expanded to a cube around its center; a
/// degenerate (single point) extent gets a unit half-size so children have
/// nonzero volume.
fn compute_global_bbox(points: &[NVec3]) -> (NVec3, NVec3) {
    let mut min = NVec3::repeat(f64::INFINITY);
    let mut max = NVec3::repeat(f64::NEG_INFINITY);

    for p in points {
        min = min.inf(p);
        max = max.sup(p);
    }

    let center = (min + max) * 0.5;
    let half = (max - min) * 0.5;
    let mut max_half = half.x.max(half.y).max(half.z);
    if !(max_half > 0.0) {
        max_half = 1.0;
    }
    let half = NVec3::repeat(max_half);

    (center - half, center + half)
}

/// Octant of `p` inside the box: bit 0 = x, bit 1 = y, bit 2 = z,
/// set when the coordinate is at or above the box center
fn child_index_for_point(p: &NVec3, bbox_min: &NVec3, bbox_max: &NVec3) -> usize {
    let center = (bbox_min + bbox_max) * 0.5;
    let mut idx = 0;

    if p.x >= center.x { idx |= 1; } // bit 0
    if p.y >= center.y { idx |= 2; } // bit 1
    if p.z >= center.z { idx |= 4; } // bit 2

    idx
}

/// Bounding box of octant `child_idx`, same bit layout as [`child_index_for_point`]
fn child_bbox(parent_min: &NVec3, parent_max: &NVec3, child_idx: usize) -> (NVec3, NVec3) {
    let center = (parent_min + parent_max) * 0.5;

    let mut min = *parent_min;
    let mut max = *parent_max;

    for axis in 0..3 {
        if child_idx & (1 << axis) == 0 {
            max[axis] = center[axis];
        } else {
            min[axis] = center[axis];
        }
    }

    (min, max)
}

/// Squared distance from `p` to the closest point of the box (0 inside)
fn box_distance_squared(p: &NVec3, bbox_min: &NVec3, bbox_max: &NVec3) -> f64 {
    let mut d2 = 0.0;
    for axis in 0..3 {
        let v = p[axis];
        if v < bbox_min[axis] {
            d2 += (bbox_min[axis] - v).powi(2);
        } else if v > bbox_max[axis] {
            d2 += (v - bbox_max[axis]).powi(2);
        }
    }
    d2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_index_and_bbox_agree() {
        let min = NVec3::new(-1.0, -1.0, -1.0);
        let max = NVec3::new(1.0, 1.0, 1.0);
        let p = NVec3::new(0.5, -0.5, 0.25);

        let idx = child_index_for_point(&p, &min, &max);
        assert_eq!(idx, 0b101);

        let (cmin, cmax) = child_bbox(&min, &max, idx);
        assert!(p.x >= cmin.x && p.x <= cmax.x);
        assert!(p.y >= cmin.y && p.y <= cmax.y);
        assert!(p.z >= cmin.z && p.z <= cmax.z);
    }

    #[test]
    fn test_coincident_points_do_not_recurse_forever() {
        let mut tree = PointOctreeSearcher::new();
        tree.build(&[NVec3::zeros(); 4]);

        let mut found = Vec::new();
        tree.for_each_nearby_point(&NVec3::zeros(), 0.0, &mut |i, _| found.push(i));
        found.sort_unstable();
        assert_eq!(found, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_box_distance() {
        let min = NVec3::zeros();
        let max = NVec3::new(1.0, 1.0, 1.0);
        assert_eq!(box_distance_squared(&NVec3::new(0.5, 0.5, 0.5), &min, &max), 0.0);
        assert_eq!(box_distance_squared(&NVec3::new(3.0, 0.5, 0.5), &min, &max), 4.0);
    }
}
