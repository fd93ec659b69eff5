//! Random-point sampling over the mesh: reservoir-sample a tile, then a
//! polygon weighted by 2D area, then a uniformly random point inside the
//! chosen (possibly circle-clipped) convex polygon.
//!
//! The random source is a caller-supplied closure returning values in
//! `[0, 1)`, like Detour's injected `frand`, which keeps the engine
//! deterministic under test and free of any RNG dependency.

use glam::Vec3A;

use crate::{
    filter::QueryFilter,
    math::{distance_pt_seg_sqr_xz, random_point_in_convex_poly, sqr, tri_area_xz},
    nav_mesh::poly_height_in_tile,
    node_pool::NodeFlags,
    poly_ref::PolyRef,
    query::{NavMeshQuery, QueryError},
    tile::PolyType,
};

/// Number of segments used to approximate the clip circle.
const CIRCLE_SEGMENTS: usize = 12;

impl<'m> NavMeshQuery<'m> {
    /// Returns a random polygon and a uniformly random point on it.
    ///
    /// Tiles are sampled uniformly (they are assumed to cover roughly the
    /// same area), polygons within the tile by their 2D area.
    pub fn find_random_point(
        &self,
        filter: &dyn QueryFilter,
        frand: &mut dyn FnMut() -> f32,
    ) -> Result<(PolyRef, Vec3A), QueryError> {
        let mesh = self.mesh;

        // Randomly pick one tile using reservoir sampling.
        let mut tile = None;
        let mut tile_sum = 0.0;
        for t in mesh.tiles() {
            let area = 1.0;
            tile_sum += area;
            if frand() * tile_sum <= area {
                tile = Some(t);
            }
        }
        let Some(tile) = tile else {
            return Err(QueryError::NotFound);
        };

        // Randomly pick one polygon weighted by polygon area.
        let data = tile.payload();
        let base = mesh.poly_ref_base(tile);
        let mut chosen = None;
        let mut area_sum = 0.0;
        for (ip, poly) in data.polys.iter().enumerate() {
            // Do not return off-mesh connection polygons.
            if poly.poly_type != PolyType::Ground {
                continue;
            }
            let r = base.with_poly_index(ip as u32);
            if !filter.pass_filter(r, tile, poly) {
                continue;
            }

            // Calc area of the polygon.
            let mut poly_area = 0.0;
            for j in 2..poly.vert_count() {
                poly_area += tri_area_xz(
                    data.vertices[poly.vertices[0] as usize],
                    data.vertices[poly.vertices[j - 1] as usize],
                    data.vertices[poly.vertices[j] as usize],
                );
            }

            area_sum += poly_area;
            if frand() * area_sum <= poly_area {
                chosen = Some((r, poly));
            }
        }
        let Some((poly_ref, poly)) = chosen else {
            return Err(QueryError::NotFound);
        };

        let verts: Vec<Vec3A> = poly
            .vertices
            .iter()
            .map(|&v| data.vertices[v as usize])
            .collect();
        let mut pt = random_point_in_convex_poly(&verts, frand(), frand());
        if let Some(h) = poly_height_in_tile(data, poly_ref.poly_index() as usize, pt) {
            pt.y = h;
        }
        Ok((poly_ref, pt))
    }

    /// Returns a random point on a polygon reachable from `start_ref`
    /// within `radius`, weighted by polygon area.
    ///
    /// The whole area of each reachable polygon is sampled; use
    /// [`Self::find_random_point_within_circle`] to constrain points to the
    /// circle itself.
    pub fn find_random_point_around_circle(
        &mut self,
        start_ref: PolyRef,
        center: Vec3A,
        radius: f32,
        filter: &dyn QueryFilter,
        frand: &mut dyn FnMut() -> f32,
    ) -> Result<(PolyRef, Vec3A), QueryError> {
        self.random_point_in_reach(start_ref, center, radius, filter, frand, false)
    }

    /// Like [`Self::find_random_point_around_circle`], but each polygon's
    /// usable area is clipped to its intersection with the circle, so every
    /// returned point lies inside it.
    pub fn find_random_point_within_circle(
        &mut self,
        start_ref: PolyRef,
        center: Vec3A,
        radius: f32,
        filter: &dyn QueryFilter,
        frand: &mut dyn FnMut() -> f32,
    ) -> Result<(PolyRef, Vec3A), QueryError> {
        self.random_point_in_reach(start_ref, center, radius, filter, frand, true)
    }

    /// Dijkstra expansion bounded by the circle, reservoir-sampling ground
    /// polygons by (possibly clipped) area along the way.
    fn random_point_in_reach(
        &mut self,
        start_ref: PolyRef,
        center: Vec3A,
        radius: f32,
        filter: &dyn QueryFilter,
        frand: &mut dyn FnMut() -> f32,
        clip_to_circle: bool,
    ) -> Result<(PolyRef, Vec3A), QueryError> {
        let mesh = self.mesh;
        let (start_tile, start_poly) = mesh.tile_and_poly_by_ref(start_ref)?;
        if !center.is_finite() || !radius.is_finite() || radius < 0.0 {
            return Err(QueryError::InvalidParam("circle must be finite"));
        }
        if !filter.pass_filter(start_ref, start_tile, start_poly) {
            return Err(QueryError::InvalidParam("start polygon is filtered out"));
        }

        self.sliced = None;
        self.pool.clear();
        self.open.clear();

        let Some(start_index) = self.pool.node(start_ref) else {
            return Err(QueryError::OutOfNodes(self.pool.max_nodes()));
        };
        {
            let start = self.pool.get_mut(start_index);
            start.pos = center;
            start.cost = 0.0;
            start.total = 0.0;
            start.parent = None;
            start.flags = NodeFlags::OPEN;
            start.shortcut.clear();
        }
        self.open.push(start_index, self.pool.nodes());

        let radius_sqr = sqr(radius);
        let mut area_sum = 0.0;
        let mut chosen: Option<(PolyRef, Vec<Vec3A>)> = None;

        while let Some(best_index) = self.open.pop(self.pool.nodes()) {
            {
                let best = self.pool.get_mut(best_index);
                best.flags.remove(NodeFlags::OPEN);
                best.flags.insert(NodeFlags::CLOSED);
            }

            let best_ref = self.pool.get(best_index).poly;
            let (best_tile, best_poly) = mesh.tile_and_poly_by_ref_unchecked(best_ref);

            // Place random locations on ground polygons.
            if best_poly.poly_type == PolyType::Ground {
                let data = best_tile.payload();
                let verts: Vec<Vec3A> = best_poly
                    .vertices
                    .iter()
                    .map(|&v| data.vertices[v as usize])
                    .collect();
                let constrained = if clip_to_circle {
                    polygon_by_circle(&verts, center, radius)
                } else {
                    Some(verts)
                };
                if let Some(constrained) = constrained {
                    // Calc the area of the (clipped) polygon.
                    let mut poly_area = 0.0;
                    for j in 2..constrained.len() {
                        poly_area +=
                            tri_area_xz(constrained[0], constrained[j - 1], constrained[j]);
                    }
                    // Choose random polygon weighted by area, using
                    // reservoir sampling.
                    area_sum += poly_area;
                    if poly_area > 0.0 && frand() * area_sum <= poly_area {
                        chosen = Some((best_ref, constrained));
                    }
                }
            }

            // Expand the search.
            let (best_pos, best_total) = {
                let best = self.pool.get(best_index);
                (best.pos, best.total)
            };
            let parent_ref = self.pool.get(best_index).parent.map(|p| self.pool.get(p).poly);
            let parent_poly = parent_ref.map(|r| mesh.tile_and_poly_by_ref_unchecked(r).1);

            for link in best_tile.links_of(best_ref.poly_index() as usize) {
                let neighbour_ref = link.target;
                if neighbour_ref.is_none() || Some(neighbour_ref) == parent_ref {
                    continue;
                }
                let (neighbour_tile, neighbour_poly) =
                    mesh.tile_and_poly_by_ref_unchecked(neighbour_ref);
                if !filter.pass_filter(neighbour_ref, neighbour_tile, neighbour_poly) {
                    continue;
                }

                // If the circle is not touching the next polygon, skip it.
                let portal = self.portal_points(best_ref, neighbour_ref)?;
                let (dist_sqr, _) = distance_pt_seg_sqr_xz(center, portal.left, portal.right);
                if dist_sqr > radius_sqr {
                    continue;
                }

                let Some(neighbour_index) = self.pool.node(neighbour_ref) else {
                    continue;
                };
                if self.pool.get(neighbour_index).flags.contains(NodeFlags::CLOSED) {
                    continue;
                }

                if self.pool.get(neighbour_index).flags.is_empty() {
                    self.pool.get_mut(neighbour_index).pos =
                        portal.left.lerp(portal.right, 0.5);
                }
                let neighbour_pos = self.pool.get(neighbour_index).pos;

                let cost = filter.cost(
                    best_pos,
                    neighbour_pos,
                    parent_poly,
                    best_poly,
                    Some(neighbour_poly),
                );
                let total = best_total + cost;

                let neighbour = self.pool.get(neighbour_index);
                if neighbour.flags.contains(NodeFlags::OPEN) && total >= neighbour.total {
                    continue;
                }

                let was_open = neighbour.flags.contains(NodeFlags::OPEN);
                {
                    let neighbour = self.pool.get_mut(neighbour_index);
                    neighbour.parent = Some(best_index);
                    neighbour.cost = total;
                    neighbour.total = total;
                }
                if was_open {
                    self.open.modify(neighbour_index, self.pool.nodes());
                } else {
                    self.pool.get_mut(neighbour_index).flags.insert(NodeFlags::OPEN);
                    self.open.push(neighbour_index, self.pool.nodes());
                }
            }
        }

        let Some((poly_ref, verts)) = chosen else {
            return Err(QueryError::NotFound);
        };

        let mut pt = random_point_in_convex_poly(&verts, frand(), frand());
        let (tile, _) = mesh.tile_and_poly_by_ref_unchecked(poly_ref);
        if let Some(h) = poly_height_in_tile(tile.payload(), poly_ref.poly_index() as usize, pt) {
            pt.y = h;
        }
        Ok((poly_ref, pt))
    }
}

/// Clips a convex polygon to a circle on the xz-plane, approximating the
/// circle as a regular 12-gon. Returns `None` when the intersection is
/// empty (or degenerate).
fn polygon_by_circle(verts: &[Vec3A], center: Vec3A, radius: f32) -> Option<Vec<Vec3A>> {
    let radius_sqr = sqr(radius);
    // If the polygon is fully inside the circle, it needs no clipping.
    let outside = verts
        .iter()
        .filter(|v| {
            let dx = v.x - center.x;
            let dz = v.z - center.z;
            dx * dx + dz * dz > radius_sqr
        })
        .count();
    if outside == 0 {
        return Some(verts.to_vec());
    }

    // Clip the polygon against each half-plane of the circle approximation.
    let mut clipped = verts.to_vec();
    for i in 0..CIRCLE_SEGMENTS {
        let a0 = (i as f32 / CIRCLE_SEGMENTS as f32) * std::f32::consts::TAU;
        let a1 = ((i + 1) as f32 / CIRCLE_SEGMENTS as f32) * std::f32::consts::TAU;
        let p0 = center + Vec3A::new(a0.cos(), 0.0, a0.sin()) * radius;
        let p1 = center + Vec3A::new(a1.cos(), 0.0, a1.sin()) * radius;

        // Keep points on the inner side of the edge (p0, p1).
        let mut next = Vec::with_capacity(clipped.len() + 1);
        let inside =
            |v: Vec3A| (p1.x - p0.x) * (v.z - p0.z) - (p1.z - p0.z) * (v.x - p0.x) >= 0.0;
        for j in 0..clipped.len() {
            let cur = clipped[j];
            let prev = clipped[(j + clipped.len() - 1) % clipped.len()];
            let cur_in = inside(cur);
            let prev_in = inside(prev);
            if cur_in != prev_in {
                // The edge crosses the clip line; add the intersection.
                if let Some((s, _)) = crate::math::intersect_seg_seg_xz(prev, cur, p0, p1) {
                    next.push(prev.lerp(cur, s));
                }
            }
            if cur_in {
                next.push(cur);
            }
        }
        clipped = next;
        if clipped.len() < 3 {
            return None;
        }
    }
    Some(clipped)
}
