//! Octree over one face's triangles, for picking.

use glam::Vec3;
use meridian_math::Aabb;

const LEAF_TRIANGLES: usize = 8;
const MAX_DEPTH: u32 = 8;

/// Closest intersection of a segment with a face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentHit {
    /// Fraction along the segment, `0.0..=1.0`.
    pub t: f32,
    pub point: Vec3,
    /// Triangle index within the face (index-buffer offset / 3).
    pub triangle: usize,
    pub normal: Vec3,
}

#[derive(Debug, Clone)]
struct TreeNode {
    bounds: Aabb,
    children: Vec<usize>,
    triangles: Vec<u32>,
}

/// Triangles bucketed by centroid octant; node bounds are the union of the
/// triangles they hold, so nodes may overlap.
#[derive(Debug, Clone, Default)]
pub struct TriangleTree {
    nodes: Vec<TreeNode>,
}

impl TriangleTree {
    pub fn build(positions: &[Vec3], indices: &[u16]) -> Self {
        let triangles: Vec<u32> = indices
            .chunks_exact(3)
            .enumerate()
            .filter(|(_, tri)| tri.iter().all(|i| (*i as usize) < positions.len()))
            .map(|(n, _)| n as u32)
            .collect();
        let mut tree = Self { nodes: Vec::new() };
        if !triangles.is_empty() {
            tree.build_node(positions, indices, triangles, 0);
        }
        tree
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn bounds(&self) -> Aabb {
        self.nodes.first().map_or(Aabb::EMPTY, |n| n.bounds)
    }

    fn build_node(&mut self, positions: &[Vec3], indices: &[u16], triangles: Vec<u32>, depth: u32) -> usize {
        let corners = |t: u32| {
            let base = t as usize * 3;
            [0, 1, 2].map(|k| positions[indices[base + k] as usize])
        };
        let mut bounds = Aabb::EMPTY;
        for t in &triangles {
            for p in corners(*t) {
                bounds.include_point(p);
            }
        }
        let id = self.nodes.len();
        self.nodes.push(TreeNode {
            bounds,
            children: Vec::new(),
            triangles: Vec::new(),
        });

        if triangles.len() <= LEAF_TRIANGLES || depth >= MAX_DEPTH {
            self.nodes[id].triangles = triangles;
            return id;
        }

        let center = bounds.center();
        let mut buckets: [Vec<u32>; 8] = Default::default();
        for t in &triangles {
            let [a, b, c] = corners(*t);
            let centroid = (a + b + c) / 3.0;
            let octant = (centroid.x >= center.x) as usize
                | ((centroid.y >= center.y) as usize) << 1
                | ((centroid.z >= center.z) as usize) << 2;
            buckets[octant].push(*t);
        }
        if buckets.iter().filter(|b| !b.is_empty()).count() <= 1 {
            self.nodes[id].triangles = triangles;
            return id;
        }

        for bucket in buckets.into_iter().filter(|b| !b.is_empty()) {
            let child = self.build_node(positions, indices, bucket, depth + 1);
            self.nodes[id].children.push(child);
        }
        id
    }

    /// Closest hit of segment `start..end` against the face.
    pub fn intersect_segment(
        &self,
        positions: &[Vec3],
        indices: &[u16],
        start: Vec3,
        end: Vec3,
    ) -> Option<SegmentHit> {
        let dir = end - start;
        let mut best: Option<SegmentHit> = None;
        let mut stack = if self.nodes.is_empty() { Vec::new() } else { vec![0] };

        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            let limit = best.map_or(1.0, |h| h.t);
            if !segment_hits_box(start, dir, &node.bounds, limit) {
                continue;
            }
            for t in &node.triangles {
                let base = *t as usize * 3;
                let Some(tri) = indices.get(base..base + 3) else {
                    continue;
                };
                let [a, b, c] = [0, 1, 2].map(|k| positions.get(tri[k] as usize).copied());
                let (Some(a), Some(b), Some(c)) = (a, b, c) else {
                    continue;
                };
                if let Some((t_hit, normal)) = intersect_triangle(start, dir, a, b, c)
                    && t_hit <= limit.min(best.map_or(1.0, |h| h.t))
                {
                    best = Some(SegmentHit {
                        t: t_hit,
                        point: start + dir * t_hit,
                        triangle: *t as usize,
                        normal,
                    });
                }
            }
            stack.extend(node.children.iter().copied());
        }
        best
    }
}

fn segment_hits_box(start: Vec3, dir: Vec3, bounds: &Aabb, limit: f32) -> bool {
    if bounds.is_empty() {
        return false;
    }
    let mut t_min = 0.0f32;
    let mut t_max = limit;
    for axis in 0..3 {
        let (s, d) = (start[axis], dir[axis]);
        let (lo, hi) = (bounds.min[axis], bounds.max[axis]);
        if d.abs() < f32::EPSILON {
            if s < lo || s > hi {
                return false;
            }
            continue;
        }
        let (t1, t2) = ((lo - s) / d, (hi - s) / d);
        t_min = t_min.max(t1.min(t2));
        t_max = t_max.min(t1.max(t2));
        if t_min > t_max {
            return false;
        }
    }
    true
}

/// Möller-Trumbore, double sided. Returns segment parameter and unit normal.
fn intersect_triangle(start: Vec3, dir: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Option<(f32, Vec3)> {
    let e1 = b - a;
    let e2 = c - a;
    let p = dir.cross(e2);
    let det = e1.dot(p);
    if det.abs() < 1e-12 {
        return None;
    }
    let inv = 1.0 / det;
    let s = start - a;
    let u = s.dot(p) * inv;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(e1);
    let v = dir.dot(q) * inv;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = e2.dot(q) * inv;
    if !(0.0..=1.0).contains(&t) {
        return None;
    }
    Some((t, e1.cross(e2).normalize_or_zero()))
}
