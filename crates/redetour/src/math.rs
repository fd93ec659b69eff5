//! Computational-geometry helpers shared by the tile store and the query
//! engine. Everything operates on the xz-plane unless stated otherwise; the
//! y-axis is "up" and is only consulted for height interpolation.

use glam::{IVec3, Vec3A};

/// An axis-aligned 3D bounding box in world units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Aabb3d {
    /// The minimum corner.
    pub min: Vec3A,
    /// The maximum corner.
    pub max: Vec3A,
}

impl Aabb3d {
    /// Creates an AABB from its corners.
    #[inline]
    pub fn new(min: impl Into<Vec3A>, max: impl Into<Vec3A>) -> Self {
        Self {
            min: min.into(),
            max: max.into(),
        }
    }

    /// Returns whether `self` and `other` overlap.
    #[inline]
    pub fn overlaps(&self, other: &Aabb3d) -> bool {
        self.min.cmple(other.max).all() && self.max.cmpge(other.min).all()
    }
}

/// Threshold below which two points count as co-located.
/// Corresponds to <https://github.com/recastnavigation/recastnavigation/blob/bd98d84c274ee06842bf51a4088ca82ac71f8c2d/Detour/Include/DetourCommon.h#L259>
const EQUAL_THRESHOLD: f32 = (1.0 / 16384.0) * (1.0 / 16384.0);

/// Performs a 'sloppy' co-location check of the specified points.
#[inline]
pub(crate) fn v_equal(a: Vec3A, b: Vec3A) -> bool {
    a.distance_squared(b) < EQUAL_THRESHOLD
}

#[inline]
pub(crate) fn sqr(a: f32) -> f32 {
    a * a
}

/// The cross product of two vectors projected onto the xz-plane.
#[inline]
pub(crate) fn cross_xz(a: Vec3A, b: Vec3A) -> f32 {
    a.x * b.z - a.z * b.x
}

/// The signed xz-plane area of the triangle ABC, which doubles as the
/// relationship of line AB to point C (negative = C is to the left).
#[inline]
pub(crate) fn tri_area_xz(a: Vec3A, b: Vec3A, c: Vec3A) -> f32 {
    let abx = b.x - a.x;
    let abz = b.z - a.z;
    let acx = c.x - a.x;
    let acz = c.z - a.z;
    acx * abz - abx * acz
}

/// Squared distance from `pt` to the segment `(p, q)` on the xz-plane and the
/// parameter of the closest point along the segment.
pub(crate) fn distance_pt_seg_sqr_xz(pt: Vec3A, p: Vec3A, q: Vec3A) -> (f32, f32) {
    let pqx = q.x - p.x;
    let pqz = q.z - p.z;
    let dx = pt.x - p.x;
    let dz = pt.z - p.z;
    let d = pqx * pqx + pqz * pqz;
    let mut t = pqx * dx + pqz * dz;
    if d > 0.0 {
        t /= d;
    }
    let t = t.clamp(0.0, 1.0);
    let dx = p.x + t * pqx - pt.x;
    let dz = p.z + t * pqz - pt.z;
    (dx * dx + dz * dz, t)
}

/// Whether `pt` lies inside the polygon when projected onto the xz-plane.
pub(crate) fn point_in_polygon(pt: Vec3A, verts: &[Vec3A]) -> bool {
    let mut inside = false;
    let mut j = verts.len() - 1;
    for i in 0..verts.len() {
        let vi = verts[i];
        let vj = verts[j];
        if ((vi.z > pt.z) != (vj.z > pt.z))
            && (pt.x < (vj.x - vi.x) * (pt.z - vi.z) / (vj.z - vi.z) + vi.x)
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Point-in-polygon test that also reports the squared distance and edge
/// parameter from `pt` to every boundary edge. `edge_dist[j]` and `edge_t[j]`
/// describe the edge from vertex `j` to vertex `j + 1` (wrapping).
pub(crate) fn distance_pt_poly_edges_sqr(
    pt: Vec3A,
    verts: &[Vec3A],
    edge_dist: &mut [f32],
    edge_t: &mut [f32],
) -> bool {
    let mut inside = false;
    let mut j = verts.len() - 1;
    for i in 0..verts.len() {
        let vi = verts[i];
        let vj = verts[j];
        if ((vi.z > pt.z) != (vj.z > pt.z))
            && (pt.x < (vj.x - vi.x) * (pt.z - vi.z) / (vj.z - vi.z) + vi.x)
        {
            inside = !inside;
        }
        let (d, t) = distance_pt_seg_sqr_xz(pt, vj, vi);
        edge_dist[j] = d;
        edge_t[j] = t;
        j = i;
    }
    inside
}

/// Height of the triangle ABC at `p`, interpolated barycentrically.
/// Returns `None` if `p` does not lie over the triangle or the triangle is
/// degenerate on the xz-plane.
pub(crate) fn closest_height_point_triangle(p: Vec3A, a: Vec3A, b: Vec3A, c: Vec3A) -> Option<f32> {
    const EPS: f32 = 1e-4;
    let v0 = c - a;
    let v1 = b - a;
    let v2 = p - a;

    // Compute scaled barycentric coordinates.
    let mut denom = v0.x * v1.z - v0.z * v1.x;
    if denom.abs() < EPS {
        return None;
    }

    let mut u = v1.z * v2.x - v1.x * v2.z;
    let mut v = v0.x * v2.z - v0.z * v2.x;

    if denom < 0.0 {
        denom = -denom;
        u = -u;
        v = -v;
    }

    // If the point lies inside the triangle, return the interpolated y-coord.
    (u >= 0.0 && v >= 0.0 && (u + v) <= denom).then(|| a.y + (v0.y * u + v1.y * v) / denom)
}

/// Result of clipping a 2D segment against a convex polygon.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SegmentPolyIntersection {
    /// Entry parameter along the segment.
    pub(crate) tmin: f32,
    /// Exit parameter along the segment.
    pub(crate) tmax: f32,
    /// Index of the edge the segment enters through, if any.
    pub(crate) seg_min: Option<usize>,
    /// Index of the edge the segment exits through, if any.
    pub(crate) seg_max: Option<usize>,
}

/// Clips the segment `(p0, p1)` against a convex polygon on the xz-plane.
/// Returns `None` when the segment misses the polygon entirely.
pub(crate) fn intersect_segment_poly_xz(
    p0: Vec3A,
    p1: Vec3A,
    verts: &[Vec3A],
) -> Option<SegmentPolyIntersection> {
    const EPS: f32 = 0.000_000_01;
    let mut result = SegmentPolyIntersection {
        tmin: 0.0,
        tmax: 1.0,
        seg_min: None,
        seg_max: None,
    };
    let dir = p1 - p0;

    let mut j = verts.len() - 1;
    for i in 0..verts.len() {
        let edge = verts[i] - verts[j];
        let diff = p0 - verts[j];
        let n = -cross_xz(edge, diff);
        let d = -cross_xz(dir, edge);
        if d.abs() < EPS {
            // The segment is nearly parallel to this edge.
            if n < 0.0 {
                return None;
            }
            j = i;
            continue;
        }
        let t = n / d;
        if d < 0.0 {
            // The segment is entering across this edge.
            if t > result.tmin {
                result.tmin = t;
                result.seg_min = Some(j);
                // The segment enters after leaving the polygon.
                if result.tmin > result.tmax {
                    return None;
                }
            }
        } else {
            // The segment is leaving across this edge.
            if t < result.tmax {
                result.tmax = t;
                result.seg_max = Some(j);
                // The segment leaves before entering the polygon.
                if result.tmax < result.tmin {
                    return None;
                }
            }
        }
        j = i;
    }
    Some(result)
}

/// Intersects the segments `(ap, aq)` and `(bp, bq)` on the xz-plane,
/// returning the parameters along each. `None` when (nearly) parallel.
pub(crate) fn intersect_seg_seg_xz(
    ap: Vec3A,
    aq: Vec3A,
    bp: Vec3A,
    bq: Vec3A,
) -> Option<(f32, f32)> {
    let u = aq - ap;
    let v = bq - bp;
    let w = ap - bp;
    let d = cross_xz(u, v);
    if d.abs() < 1e-6 {
        return None;
    }
    let s = cross_xz(v, w) / d;
    let t = cross_xz(u, w) / d;
    Some((s, t))
}

/// Whether a quantized query box overlaps quantized node bounds.
#[inline]
pub(crate) fn overlap_quant_bounds(amin: IVec3, amax: IVec3, bmin: IVec3, bmax: IVec3) -> bool {
    amin.cmple(bmax).all() && amax.cmpge(bmin).all()
}

/// Returns a uniformly random point in a convex polygon, given two random
/// samples `s, t` in `[0, 1)`. Weighted by triangle area so the distribution
/// stays uniform across the fan.
/// Adapted from the Graphics Gems article, following the Detour version.
pub(crate) fn random_point_in_convex_poly(verts: &[Vec3A], s: f32, t: f32) -> Vec3A {
    debug_assert!(verts.len() >= 3);
    // Calc triangle areas of the fan around vertex 0. The largest polygon
    // sampled is a poly clipped against the 12-gon circle approximation.
    let mut areas = [0.0_f32; 32];
    debug_assert!(verts.len() <= areas.len());
    let mut area_sum = 0.0;
    for i in 2..verts.len() {
        areas[i] = tri_area_xz(verts[0], verts[i - 1], verts[i]);
        area_sum += areas[i].max(0.001);
    }
    // Find sub triangle weighted by area.
    let threshold = s * area_sum;
    let mut acc = 0.0;
    let mut u = 1.0;
    let mut tri = verts.len() - 1;
    for i in 2..verts.len() {
        let dacc = areas[i];
        if threshold >= acc && threshold < (acc + dacc) {
            u = (threshold - acc) / dacc;
            tri = i;
            break;
        }
        acc += dacc;
    }

    let v = t.sqrt();
    let a = 1.0 - v;
    let b = (1.0 - u) * v;
    let c = u * v;
    a * verts[0] + b * verts[tri - 1] + c * verts[tri]
}

/// Side index of the tile border opposite `side`.
#[inline]
pub(crate) fn opposite_tile(side: u8) -> u8 {
    (side + 4) & 0x7
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::vec3a;

    fn unit_square() -> [Vec3A; 4] {
        [
            vec3a(0.0, 0.0, 0.0),
            vec3a(0.0, 0.0, 1.0),
            vec3a(1.0, 0.0, 1.0),
            vec3a(1.0, 0.0, 0.0),
        ]
    }

    #[test]
    fn point_in_polygon_detects_interior_and_exterior() {
        let square = unit_square();
        assert!(point_in_polygon(vec3a(0.5, 0.0, 0.5), &square));
        assert!(!point_in_polygon(vec3a(1.5, 0.0, 0.5), &square));
        assert!(!point_in_polygon(vec3a(-0.1, 0.0, 0.5), &square));
    }

    #[test]
    fn segment_clipping_through_square_finds_entry_and_exit() {
        let square = unit_square();
        let result =
            intersect_segment_poly_xz(vec3a(-1.0, 0.0, 0.5), vec3a(2.0, 0.0, 0.5), &square)
                .unwrap();
        assert_relative_eq!(result.tmin, 1.0 / 3.0, epsilon = 1e-6);
        assert_relative_eq!(result.tmax, 2.0 / 3.0, epsilon = 1e-6);
        assert!(result.seg_min.is_some());
        assert!(result.seg_max.is_some());
    }

    #[test]
    fn segment_clipping_misses_square() {
        let square = unit_square();
        let result =
            intersect_segment_poly_xz(vec3a(-1.0, 0.0, 2.0), vec3a(2.0, 0.0, 2.0), &square);
        assert!(result.is_none());
    }

    #[test]
    fn segment_ending_inside_square_has_no_exit_edge() {
        let square = unit_square();
        let result =
            intersect_segment_poly_xz(vec3a(0.2, 0.0, 0.5), vec3a(0.8, 0.0, 0.5), &square).unwrap();
        assert!(result.seg_max.is_none());
    }

    #[test]
    fn triangle_height_is_interpolated() {
        let a = vec3a(0.0, 0.0, 0.0);
        let b = vec3a(0.0, 1.0, 1.0);
        let c = vec3a(1.0, 2.0, 0.0);
        let h = closest_height_point_triangle(vec3a(0.25, 0.0, 0.25), a, b, c).unwrap();
        assert_relative_eq!(h, 0.75, epsilon = 1e-6);
        assert!(closest_height_point_triangle(vec3a(2.0, 0.0, 2.0), a, b, c).is_none());
    }

    #[test]
    fn distance_to_segment_clamps_to_end_points() {
        let p = vec3a(0.0, 0.0, 0.0);
        let q = vec3a(1.0, 0.0, 0.0);
        let (d, t) = distance_pt_seg_sqr_xz(vec3a(2.0, 0.0, 0.0), p, q);
        assert_relative_eq!(d, 1.0);
        assert_relative_eq!(t, 1.0);
        let (d, t) = distance_pt_seg_sqr_xz(vec3a(0.5, 5.0, 1.0), p, q);
        assert_relative_eq!(d, 1.0);
        assert_relative_eq!(t, 0.5);
    }

    #[test]
    fn random_points_stay_inside_the_polygon() {
        let square = unit_square();
        let mut s = 0.05;
        while s < 1.0 {
            let mut t = 0.05;
            while t < 1.0 {
                let pt = random_point_in_convex_poly(&square, s, t);
                assert!(point_in_polygon(pt, &square), "{pt} not inside for {s},{t}");
                t += 0.1;
            }
            s += 0.1;
        }
    }
}
