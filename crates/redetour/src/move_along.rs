//! Constrained surface movement: walk from a start position toward a target
//! across the polygon neighbourhood, sliding along walls, without leaving
//! the mesh. This is the primitive agent steering builds on.

use std::collections::VecDeque;

use glam::Vec3A;

use crate::{
    filter::QueryFilter,
    math::{distance_pt_seg_sqr_xz, point_in_polygon, sqr},
    nav_mesh::poly_height_in_tile,
    node_pool::NodeFlags,
    poly_ref::PolyRef,
    query::{NavMeshQuery, QueryError},
    tile::{EXT_LINK, VERTS_PER_POLYGON},
};

/// Bound on the local breadth-first queue; the neighbourhood visited by one
/// movement step is small by construction.
const MAX_STACK: usize = 48;
/// Neighbour polygons considered per edge.
const MAX_NEIS: usize = 8;

/// Result of [`NavMeshQuery::move_along_surface`].
#[derive(Debug, Clone, PartialEq)]
pub struct MoveAlongSurfaceResult {
    /// Where the walk ended, reprojected onto the last visited polygon's
    /// surface.
    pub result_pos: Vec3A,
    /// The polygons visited during the move, from start to end.
    pub visited: Vec<PolyRef>,
}

impl<'m> NavMeshQuery<'m> {
    /// Moves from `start_pos` toward `end_pos` along the surface, sliding
    /// along walls where the target is not directly reachable.
    ///
    /// The search is a local breadth-first walk over the polygons around the
    /// segment, so it is intended for small increments: much cheaper than a
    /// raycast or path search, but prone to taking the long way around large
    /// obstacles.
    ///
    /// Uses a small scratch pool of its own, so it can be called between
    /// sliced-search updates without disturbing them.
    pub fn move_along_surface(
        &mut self,
        start_ref: PolyRef,
        start_pos: Vec3A,
        end_pos: Vec3A,
        filter: &dyn QueryFilter,
    ) -> Result<MoveAlongSurfaceResult, QueryError> {
        let mesh = self.mesh;
        mesh.tile_and_poly_by_ref(start_ref)?;
        if !start_pos.is_finite() || !end_pos.is_finite() {
            return Err(QueryError::InvalidParam("positions must be finite"));
        }

        self.tiny_pool.clear();
        let mut stack = VecDeque::with_capacity(MAX_STACK);

        let start_index = self
            .tiny_pool
            .node(start_ref)
            .expect("freshly cleared pool has capacity");
        {
            let start = self.tiny_pool.get_mut(start_index);
            start.pos = start_pos;
            start.parent = None;
            start.flags = NodeFlags::CLOSED;
        }
        stack.push_back(start_index);

        let mut best_pos = start_pos;
        let mut best_dist = f32::MAX;
        let mut best_node = start_index;

        // Search constraint: a circle around the segment midpoint covering
        // the whole segment plus a little slack.
        let search_pos = start_pos.lerp(end_pos, 0.5);
        let search_rad_sqr = sqr(start_pos.distance(end_pos) / 2.0 + 0.001);

        let mut verts = [Vec3A::ZERO; VERTS_PER_POLYGON];
        while let Some(cur_index) = stack.pop_front() {
            let cur_ref = self.tiny_pool.get(cur_index).poly;
            let (cur_tile, cur_poly) = mesh.tile_and_poly_by_ref_unchecked(cur_ref);
            let data = cur_tile.payload();

            // Collect vertices.
            let nv = cur_poly.vert_count();
            for (i, vert) in verts[..nv].iter_mut().enumerate() {
                *vert = data.vertices[cur_poly.vertices[i] as usize];
            }

            // If the target is inside the poly, stop the search.
            if point_in_polygon(end_pos, &verts[..nv]) {
                best_node = cur_index;
                best_pos = end_pos;
                break;
            }

            // Find wall edges and the nearest point inside the walls.
            let mut j = nv - 1;
            for i in 0..nv {
                // Find links to neighbours of edge j.
                let mut neis = [PolyRef::NONE; MAX_NEIS];
                let mut nneis = 0;

                if (cur_poly.neighbors[j] & EXT_LINK) != 0 {
                    // Tile border.
                    for link in cur_tile.links_of(cur_ref.poly_index() as usize) {
                        if link.edge as usize == j && !link.target.is_none() {
                            let (nei_tile, nei_poly) =
                                mesh.tile_and_poly_by_ref_unchecked(link.target);
                            if filter.pass_filter(link.target, nei_tile, nei_poly)
                                && nneis < MAX_NEIS
                            {
                                neis[nneis] = link.target;
                                nneis += 1;
                            }
                        }
                    }
                } else if cur_poly.neighbors[j] != 0 {
                    // Internal edge, encode the neighbour directly.
                    let idx = (cur_poly.neighbors[j] - 1) as u32;
                    let r = mesh.poly_ref_base(cur_tile).with_poly_index(idx);
                    if filter.pass_filter(r, cur_tile, &data.polys[idx as usize]) {
                        neis[nneis] = r;
                        nneis += 1;
                    }
                }

                if nneis == 0 {
                    // Wall edge, calc distance.
                    let (dist_sqr, tseg) = distance_pt_seg_sqr_xz(end_pos, verts[j], verts[i]);
                    if dist_sqr < best_dist {
                        // Update nearest distance.
                        best_pos = verts[j].lerp(verts[i], tseg);
                        best_dist = dist_sqr;
                        best_node = cur_index;
                    }
                } else {
                    for &nei in &neis[..nneis] {
                        // Skip if no node can be allocated.
                        let Some(nei_index) = self.tiny_pool.node(nei) else {
                            continue;
                        };
                        // Skip if already visited.
                        if self.tiny_pool.get(nei_index).flags.contains(NodeFlags::CLOSED) {
                            continue;
                        }
                        // Skip the link if it is too far from the search
                        // constraint.
                        let (dist_sqr, _) =
                            distance_pt_seg_sqr_xz(search_pos, verts[j], verts[i]);
                        if dist_sqr > search_rad_sqr {
                            continue;
                        }
                        // Mark the node as visited and push to the queue.
                        if stack.len() < MAX_STACK {
                            let node = self.tiny_pool.get_mut(nei_index);
                            node.parent = Some(cur_index);
                            node.flags.insert(NodeFlags::CLOSED);
                            stack.push_back(nei_index);
                        }
                    }
                }
                j = i;
            }
        }

        // Reverse the visited chain.
        let mut visited = Vec::new();
        let mut cur = Some(best_node);
        while let Some(index) = cur {
            let node = self.tiny_pool.get(index);
            visited.push(node.poly);
            cur = node.parent;
        }
        visited.reverse();

        // Reproject the result height onto the last visited polygon; the
        // walk itself moves in 2d.
        let mut result_pos = best_pos;
        if let Some(&last) = visited.last() {
            let (tile, _) = mesh.tile_and_poly_by_ref_unchecked(last);
            if let Some(h) =
                poly_height_in_tile(tile.payload(), last.poly_index() as usize, result_pos)
            {
                result_pos.y = h;
            }
        }

        Ok(MoveAlongSurfaceResult {
            result_pos,
            visited,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::DefaultQueryFilter;
    use crate::nav_mesh::NavMesh;
    use crate::test_tiles::{row_center, row_tile};
    use glam::vec3a;

    #[test]
    fn reachable_target_is_reached_through_the_corridor() {
        let (mesh, tile_ref) = NavMesh::single_tile(row_tile(3), 0);
        let mut query = NavMeshQuery::new(&mesh);
        let filter = DefaultQueryFilter::default();
        let base = tile_ref.base_poly_ref();

        let result = query
            .move_along_surface(base, row_center(0), row_center(2), &filter)
            .unwrap();
        assert_eq!(result.result_pos, row_center(2));
        assert_eq!(
            result.visited,
            vec![base, base.with_poly_index(1), base.with_poly_index(2)]
        );
    }

    #[test]
    fn movement_slides_along_walls() {
        let (mesh, tile_ref) = NavMesh::single_tile(row_tile(2), 0);
        let mut query = NavMeshQuery::new(&mesh);
        let filter = DefaultQueryFilter::default();
        let base = tile_ref.base_poly_ref();

        // Aim past the north wall; the result must stay on the mesh.
        let result = query
            .move_along_surface(base, row_center(0), vec3a(0.5, 0.0, 5.0), &filter)
            .unwrap();
        assert!((result.result_pos.z - 1.0).abs() < 1e-5);
        assert_eq!(result.visited[0], base);
    }

    #[test]
    fn result_height_is_reprojected_onto_the_last_polygon() {
        // Tilt the second square upward so its surface height differs from
        // the walked 2d height.
        let mut data = row_tile(2);
        for v in data.vertices.iter_mut().filter(|v| v.x > 1.5) {
            v.y = 1.0;
        }
        let (mesh, tile_ref) = NavMesh::single_tile(data, 0);
        let mut query = NavMeshQuery::new(&mesh);
        let filter = DefaultQueryFilter::default();
        let base = tile_ref.base_poly_ref();

        let result = query
            .move_along_surface(base, row_center(0), vec3a(1.5, 0.0, 0.5), &filter)
            .unwrap();
        assert_eq!(result.visited.last(), Some(&base.with_poly_index(1)));
        // Height comes from the sloped polygon surface, not the walked y.
        assert!(result.result_pos.y > 0.4);
    }
}
