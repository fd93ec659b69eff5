//! Uninformed (Dijkstra-style) area expansion: flood the polygon graph
//! outward from a start polygon, bounded by a circle or a convex shape, with
//! no heuristic. Used for area-effect queries and topology-based path
//! re-optimization by consumers.

use glam::Vec3A;

use crate::{
    filter::QueryFilter,
    math::{distance_pt_seg_sqr_xz, intersect_segment_poly_xz, sqr},
    node_pool::NodeFlags,
    poly_ref::PolyRef,
    query::{NavMeshQuery, QueryError},
};

/// One polygon visited by an area expansion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisitedPoly {
    /// The visited polygon.
    pub poly: PolyRef,
    /// The polygon it was reached from; `None` for the start polygon.
    pub parent: Option<PolyRef>,
    /// The accumulated traversal cost from the start.
    pub cost: f32,
}

impl<'m> NavMeshQuery<'m> {
    /// Collects all polygons reachable from `start_ref` whose entry portal
    /// touches the circle around `center`, with parent and accumulated cost
    /// per polygon, in discovery order.
    ///
    /// Clears this engine's search scratch; an in-progress sliced query is
    /// discarded.
    pub fn find_polys_around_circle(
        &mut self,
        start_ref: PolyRef,
        center: Vec3A,
        radius: f32,
        filter: &dyn QueryFilter,
    ) -> Result<Vec<VisitedPoly>, QueryError> {
        if !radius.is_finite() || radius < 0.0 {
            return Err(QueryError::InvalidParam("radius must be non-negative"));
        }
        let radius_sqr = sqr(radius);
        self.expand_search(start_ref, center, filter, |va, vb| {
            // If the circle is not touching the next polygon, skip it.
            let (dist_sqr, _) = distance_pt_seg_sqr_xz(center, va, vb);
            dist_sqr <= radius_sqr
        })
    }

    /// Collects all polygons reachable from `start_ref` whose entry portal
    /// intersects the convex polygon `shape` (xz-plane), with parent and
    /// accumulated cost per polygon, in discovery order.
    ///
    /// Clears this engine's search scratch; an in-progress sliced query is
    /// discarded.
    pub fn find_polys_around_shape(
        &mut self,
        start_ref: PolyRef,
        shape: &[Vec3A],
        filter: &dyn QueryFilter,
    ) -> Result<Vec<VisitedPoly>, QueryError> {
        if shape.len() < 3 {
            return Err(QueryError::InvalidParam(
                "shape must have at least 3 vertices",
            ));
        }
        let center = shape.iter().copied().sum::<Vec3A>() / shape.len() as f32;
        self.expand_search(start_ref, center, filter, |va, vb| {
            // If the shape does not touch the shared edge, skip the
            // connection.
            match intersect_segment_poly_xz(va, vb, shape) {
                Some(hit) => hit.tmin <= 1.0 && hit.tmax >= 0.0,
                None => false,
            }
        })
    }

    /// The shared Dijkstra loop: `portal_passes` decides whether the portal
    /// edge into a neighbor keeps the expansion going.
    fn expand_search(
        &mut self,
        start_ref: PolyRef,
        center: Vec3A,
        filter: &dyn QueryFilter,
        portal_passes: impl Fn(Vec3A, Vec3A) -> bool,
    ) -> Result<Vec<VisitedPoly>, QueryError> {
        let mesh = self.mesh;
        mesh.tile_and_poly_by_ref(start_ref)?;
        if !center.is_finite() {
            return Err(QueryError::InvalidParam("center must be finite"));
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

        let mut out_of_nodes = false;
        while let Some(best_index) = self.open.pop(self.pool.nodes()) {
            {
                let best = self.pool.get_mut(best_index);
                best.flags.remove(NodeFlags::OPEN);
                best.flags.insert(NodeFlags::CLOSED);
            }

            let best_ref = self.pool.get(best_index).poly;
            let (best_tile, best_poly) = mesh.tile_and_poly_by_ref_unchecked(best_ref);
            let (best_pos, best_total) = {
                let best = self.pool.get(best_index);
                (best.pos, best.total)
            };
            let parent_ref = self.pool.get(best_index).parent.map(|p| self.pool.get(p).poly);
            let parent_poly = parent_ref.map(|r| mesh.tile_and_poly_by_ref_unchecked(r).1);

            for link in best_tile.links_of(best_ref.poly_index() as usize) {
                let neighbour_ref = link.target;
                // Skip invalid neighbours and do not follow the parent.
                if neighbour_ref.is_none() || Some(neighbour_ref) == parent_ref {
                    continue;
                }
                let (neighbour_tile, neighbour_poly) =
                    mesh.tile_and_poly_by_ref_unchecked(neighbour_ref);
                // Do not advance if the polygon is excluded by the filter.
                if !filter.pass_filter(neighbour_ref, neighbour_tile, neighbour_poly) {
                    continue;
                }

                // Find the edge and bail out if the bound does not reach it.
                let portal = self.portal_points(best_ref, neighbour_ref)?;
                if !portal_passes(portal.left, portal.right) {
                    continue;
                }

                let Some(neighbour_index) = self.pool.node(neighbour_ref) else {
                    out_of_nodes = true;
                    continue;
                };
                if self.pool.get(neighbour_index).flags.contains(NodeFlags::CLOSED) {
                    continue;
                }

                // If the node is visited the first time, calculate the node
                // position as the portal midpoint.
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
                // The node is already in the open list and the new result is
                // no better, skip.
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

        if out_of_nodes {
            tracing::warn!(
                "area expansion ran out of nodes ({} max); result may be incomplete",
                self.pool.max_nodes()
            );
        }

        // The pool keeps nodes in discovery order; report them all with
        // their final costs.
        Ok(self
            .pool
            .nodes()
            .iter()
            .map(|node| VisitedPoly {
                poly: node.poly,
                parent: node.parent.map(|p| self.pool.get(p).poly),
                cost: node.total,
            })
            .collect())
    }
}
