//! Any-angle visibility raycasting: walks the segment from polygon to
//! polygon, clipping it against each polygon's boundary to find the exit
//! edge, until the segment ends, leaves the mesh, or hits a wall.

use glam::{Vec3A, vec3a};

use crate::{
    filter::QueryFilter,
    link::LINK_INTERNAL,
    math::intersect_segment_poly_xz,
    poly_ref::PolyRef,
    query::{NavMeshQuery, QueryError},
    tile::{Poly, PolyType, VERTS_PER_POLYGON},
};

bitflags::bitflags! {
    /// Options for [`NavMeshQuery::raycast`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RaycastOptions: u32 {
        /// Accumulate the traversal cost along the ray in
        /// [`RaycastHit::path_cost`].
        const USE_COSTS = 0x01;
    }
}

/// Result of a [`NavMeshQuery::raycast`].
#[derive(Debug, Clone, PartialEq)]
pub struct RaycastHit {
    /// The hit parameter along the segment. [`f32::INFINITY`] means the
    /// segment ended inside the mesh without hitting anything.
    pub t: f32,
    /// The normal of the blocking edge when a wall was hit.
    pub hit_normal: Vec3A,
    /// Index of the edge of the last visited polygon the segment exited
    /// through, if any.
    pub hit_edge_index: Option<usize>,
    /// The polygons actually traversed, in order.
    pub path: Vec<PolyRef>,
    /// The accumulated traversal cost; only filled with
    /// [`RaycastOptions::USE_COSTS`].
    pub path_cost: f32,
}

impl<'m> NavMeshQuery<'m> {
    /// Casts a 'walkability' ray from `start_pos` toward `end_pos` along the
    /// mesh surface.
    ///
    /// Returns the fraction of the segment that was traversable
    /// ([`f32::INFINITY`] when the end was reached), the normal of the
    /// blocking edge on a hit, and the polygons visited on the way.
    ///
    /// `prev_ref` optionally names the polygon the agent came from, giving
    /// cost filters transition context.
    pub fn raycast(
        &self,
        start_ref: PolyRef,
        start_pos: Vec3A,
        end_pos: Vec3A,
        filter: &dyn QueryFilter,
        options: RaycastOptions,
        prev_ref: Option<PolyRef>,
    ) -> Result<RaycastHit, QueryError> {
        let mesh = self.mesh;
        mesh.tile_and_poly_by_ref(start_ref)?;
        if !start_pos.is_finite() || !end_pos.is_finite() {
            return Err(QueryError::InvalidParam("positions must be finite"));
        }
        if let Some(prev) = prev_ref {
            mesh.tile_and_poly_by_ref(prev)?;
        }

        let mut hit = RaycastHit {
            t: 0.0,
            hit_normal: Vec3A::ZERO,
            hit_edge_index: None,
            path: Vec::new(),
            path_cost: 0.0,
        };

        let mut cur_pos = start_pos;
        let dir = end_pos - start_pos;

        let mut cur_ref = start_ref;
        let (mut cur_tile, mut cur_poly) = mesh.tile_and_poly_by_ref_unchecked(cur_ref);
        let mut prev_poly: Option<&Poly> = match prev_ref {
            Some(prev) => Some(mesh.tile_and_poly_by_ref_unchecked(prev).1),
            None => Some(cur_poly),
        };

        let mut verts = [Vec3A::ZERO; VERTS_PER_POLYGON];
        loop {
            // Collect the current polygon's vertices.
            let data = cur_tile.payload();
            let nv = cur_poly.vert_count();
            for (i, vert) in verts[..nv].iter_mut().enumerate() {
                *vert = data.vertices[cur_poly.vertices[i] as usize];
            }

            let Some(intersection) = intersect_segment_poly_xz(start_pos, end_pos, &verts[..nv])
            else {
                // Could not hit the polygon, keep the old t and report a hit.
                return Ok(hit);
            };
            hit.hit_edge_index = intersection.seg_max;

            // Keep track of the furthest t so far.
            if intersection.tmax > hit.t {
                hit.t = intersection.tmax;
            }
            hit.path.push(cur_ref);

            let Some(exit_edge) = intersection.seg_max else {
                // The end of the path is inside the polygon.
                hit.t = f32::INFINITY;
                if options.contains(RaycastOptions::USE_COSTS) {
                    hit.path_cost +=
                        filter.cost(cur_pos, end_pos, prev_poly, cur_poly, Some(cur_poly));
                }
                return Ok(hit);
            };

            // Follow the neighbour polygon across the exit edge.
            let mut next = None;
            for link in cur_tile.links_of(cur_ref.poly_index() as usize) {
                // Find the link which contains this edge.
                if link.edge as usize != exit_edge {
                    continue;
                }
                let (link_tile, link_poly) = mesh.tile_and_poly_by_ref_unchecked(link.target);
                // Skip off-mesh connections.
                if link_poly.poly_type == PolyType::OffMeshConnection {
                    continue;
                }
                // Skip links based on the filter.
                if !filter.pass_filter(link.target, link_tile, link_poly) {
                    continue;
                }
                // If the link is internal, just follow it.
                if link.side == LINK_INTERNAL {
                    next = Some((link.target, link_tile, link_poly));
                    break;
                }
                // If the link spans the whole edge, accept.
                if link.bmin == 0 && link.bmax == 255 {
                    next = Some((link.target, link_tile, link_poly));
                    break;
                }

                // Check that the intersection lies inside the partial link
                // portal.
                let v0 = verts[exit_edge];
                let v1 = verts[(exit_edge + 1) % nv];
                let s = 1.0 / 255.0;
                match link.side {
                    0 | 4 => {
                        let mut lmin = v0.z + (v1.z - v0.z) * (link.bmin as f32 * s);
                        let mut lmax = v0.z + (v1.z - v0.z) * (link.bmax as f32 * s);
                        if lmin > lmax {
                            std::mem::swap(&mut lmin, &mut lmax);
                        }
                        let z = start_pos.z + (end_pos.z - start_pos.z) * intersection.tmax;
                        if z >= lmin && z <= lmax {
                            next = Some((link.target, link_tile, link_poly));
                        }
                    }
                    2 | 6 => {
                        let mut lmin = v0.x + (v1.x - v0.x) * (link.bmin as f32 * s);
                        let mut lmax = v0.x + (v1.x - v0.x) * (link.bmax as f32 * s);
                        if lmin > lmax {
                            std::mem::swap(&mut lmin, &mut lmax);
                        }
                        let x = start_pos.x + (end_pos.x - start_pos.x) * intersection.tmax;
                        if x >= lmin && x <= lmax {
                            next = Some((link.target, link_tile, link_poly));
                        }
                    }
                    _ => {}
                }
                if next.is_some() {
                    break;
                }
            }

            if options.contains(RaycastOptions::USE_COSTS) {
                // Compute the intersection point at the furthest end of the
                // polygon and correct the height, since the raycast moves in
                // 2d.
                let last_pos = cur_pos;
                cur_pos = start_pos + dir * hit.t;
                let e1 = verts[exit_edge];
                let e2 = verts[(exit_edge + 1) % nv];
                let e_dir = e2 - e1;
                let diff = cur_pos - e1;
                let s = if e_dir.x * e_dir.x > e_dir.z * e_dir.z {
                    diff.x / e_dir.x
                } else {
                    diff.z / e_dir.z
                };
                cur_pos.y = e1.y + e_dir.y * s;

                hit.path_cost += filter.cost(
                    last_pos,
                    cur_pos,
                    prev_poly,
                    cur_poly,
                    next.map(|(_, _, poly)| poly),
                );
            }

            let Some((next_ref, next_tile, next_poly)) = next else {
                // No neighbour, we hit a wall. Calculate its normal.
                let a = verts[exit_edge];
                let b = verts[(exit_edge + 1) % nv];
                hit.hit_normal = vec3a(b.z - a.z, 0.0, -(b.x - a.x)).normalize_or_zero();
                return Ok(hit);
            };

            // No hit, advance to the neighbour polygon.
            prev_poly = Some(cur_poly);
            cur_ref = next_ref;
            cur_tile = next_tile;
            cur_poly = next_poly;
        }
    }
}
