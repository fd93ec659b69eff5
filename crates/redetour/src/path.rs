//! Polygon-corridor pathfinding: classic A*, the time-sliced resumable
//! variant, and the any-angle extension that shortcuts corners with
//! raycasts.
//!
//! The sliced search is an explicit state machine
//! (`init`/`update`/`finalize`), not a coroutine: one logical search can be
//! suspended and resumed across many short synchronous calls, e.g. one per
//! simulation frame, with the caller bounding work via `max_iterations`.

use glam::Vec3A;

use crate::{
    filter::QueryFilter,
    heuristic::QueryHeuristic,
    math::sqr,
    nav_mesh::RAY_CAST_LIMIT_PROPORTIONS,
    node_pool::{NodeFlags, NodeIndex},
    poly_ref::PolyRef,
    query::{NavMeshQuery, QueryError},
    raycast::RaycastOptions,
};

bitflags::bitflags! {
    /// Options for [`NavMeshQuery::find_path`] and the sliced variant.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FindPathOptions: u32 {
        /// Use raycasts during pathfinding to shortcut corners, so the path
        /// is not constrained to polygon-to-polygon edge midpoints.
        const ANY_ANGLE = 0x02;
    }
}

/// A polygon corridor from a start to an end polygon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindPathResult {
    /// The corridor, from start to end.
    pub path: Vec<PolyRef>,
    /// Whether the search ran out of polygons to visit before reaching the
    /// goal; the corridor then leads to the visited polygon closest to it.
    pub partial: bool,
}

/// State of a sliced path query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlicedPathState {
    /// The search has work left; call
    /// [`NavMeshQuery::update_sliced_find_path`] again.
    InProgress,
    /// The search finished and a corridor can be finalized.
    Success {
        /// Whether the goal was not reached and the corridor is best-effort.
        partial: bool,
    },
    /// The search failed, e.g. because a tile holding the start or end was
    /// removed mid-search.
    Failed,
}

/// The paused state of a sliced path query, persisting across
/// [`NavMeshQuery::update_sliced_find_path`] calls. The start position lives
/// on in the seeded start node.
pub(crate) struct SlicedQuery {
    status: SlicedPathState,
    start_ref: PolyRef,
    end_ref: PolyRef,
    end_pos: Vec3A,
    options: FindPathOptions,
    raycast_limit_sqr: f32,
    last_best: NodeIndex,
    last_best_cost: f32,
    out_of_nodes: bool,
}

impl<'m> NavMeshQuery<'m> {
    /// Finds a polygon corridor from `start_ref` to `end_ref`.
    ///
    /// `g` accumulates `filter.cost` along traversed edge midpoints; `h` is
    /// supplied by `heuristic`. With [`FindPathOptions::ANY_ANGLE`] the
    /// search additionally shortcuts across polygons wherever a raycast from
    /// a node's grandparent reaches the candidate unobstructed;
    /// `raycast_limit` bounds the length of those rays and defaults to 50
    /// times the start tile's walkable radius.
    ///
    /// If the open set empties before the goal is reached, the returned
    /// corridor leads to the visited polygon with the smallest
    /// heuristic-to-goal and is flagged [`FindPathResult::partial`].
    ///
    /// Clears this engine's search scratch; an in-progress sliced query is
    /// discarded.
    pub fn find_path(
        &mut self,
        start_ref: PolyRef,
        end_ref: PolyRef,
        start_pos: Vec3A,
        end_pos: Vec3A,
        filter: &dyn QueryFilter,
        heuristic: &dyn QueryHeuristic,
        options: FindPathOptions,
        raycast_limit: Option<f32>,
    ) -> Result<FindPathResult, QueryError> {
        if options.contains(FindPathOptions::ANY_ANGLE) {
            // The any-angle walk needs the grandparent bookkeeping of the
            // sliced search; run it to completion in one go.
            self.init_sliced_find_path(
                start_ref,
                end_ref,
                start_pos,
                end_pos,
                heuristic,
                options,
                raycast_limit,
            )?;
            loop {
                let (state, _) = self.update_sliced_find_path(usize::MAX, filter, heuristic)?;
                if state != SlicedPathState::InProgress {
                    break;
                }
            }
            return self.finalize_sliced_find_path();
        }

        let mesh = self.mesh;
        mesh.tile_and_poly_by_ref(start_ref)?;
        mesh.tile_and_poly_by_ref(end_ref)?;
        if !start_pos.is_finite() || !end_pos.is_finite() {
            return Err(QueryError::InvalidParam("positions must be finite"));
        }

        if start_ref == end_ref {
            return Ok(FindPathResult {
                path: vec![start_ref],
                partial: false,
            });
        }

        self.sliced = None;
        self.pool.clear();
        self.open.clear();

        let Some(start_index) = self.pool.node(start_ref) else {
            return Err(QueryError::OutOfNodes(self.pool.max_nodes()));
        };
        {
            let start = self.pool.get_mut(start_index);
            start.pos = start_pos;
            start.cost = 0.0;
            start.total = heuristic.get_cost(start_pos, end_pos);
            start.parent = None;
            start.flags = NodeFlags::OPEN;
            start.shortcut.clear();
        }
        self.open.push(start_index, self.pool.nodes());

        let mut last_best = start_index;
        let mut last_best_cost = self.pool.get(start_index).total;
        let mut out_of_nodes = false;

        while let Some(best_index) = self.open.pop(self.pool.nodes()) {
            {
                let best = self.pool.get_mut(best_index);
                best.flags.remove(NodeFlags::OPEN);
                best.flags.insert(NodeFlags::CLOSED);
            }

            // Reached the goal, stop searching.
            let best_ref = self.pool.get(best_index).poly;
            if best_ref == end_ref {
                last_best = best_index;
                break;
            }

            let (best_tile, best_poly) = mesh.tile_and_poly_by_ref_unchecked(best_ref);
            let (best_pos, best_cost) = {
                let best = self.pool.get(best_index);
                (best.pos, best.cost)
            };
            let parent_ref = self.pool.get(best_index).parent.map(|p| self.pool.get(p).poly);
            let parent_poly = parent_ref.map(|r| mesh.tile_and_poly_by_ref_unchecked(r).1);

            for link in best_tile.links_of(best_ref.poly_index() as usize) {
                let neighbour_ref = link.target;
                // Skip invalid references and do not expand back to where we
                // came from.
                if neighbour_ref.is_none() || Some(neighbour_ref) == parent_ref {
                    continue;
                }
                let (neighbour_tile, neighbour_poly) =
                    mesh.tile_and_poly_by_ref_unchecked(neighbour_ref);
                if !filter.pass_filter(neighbour_ref, neighbour_tile, neighbour_poly) {
                    continue;
                }

                let Some(neighbour_index) = self.pool.node(neighbour_ref) else {
                    out_of_nodes = true;
                    continue;
                };

                // If the node is visited the first time, calculate the node
                // position.
                if self.pool.get(neighbour_index).flags.is_empty() {
                    let mid = self.edge_mid_point(best_ref, neighbour_ref)?;
                    self.pool.get_mut(neighbour_index).pos = mid;
                }
                let neighbour_pos = self.pool.get(neighbour_index).pos;

                // Calculate cost and heuristic.
                let (cost, heuristic_cost) = if neighbour_ref == end_ref {
                    // Cost to the end of the path.
                    let cur_cost = filter.cost(
                        best_pos,
                        neighbour_pos,
                        parent_poly,
                        best_poly,
                        Some(neighbour_poly),
                    );
                    let end_cost =
                        filter.cost(neighbour_pos, end_pos, Some(best_poly), neighbour_poly, None);
                    (best_cost + cur_cost + end_cost, 0.0)
                } else {
                    let cur_cost = filter.cost(
                        best_pos,
                        neighbour_pos,
                        parent_poly,
                        best_poly,
                        Some(neighbour_poly),
                    );
                    (
                        best_cost + cur_cost,
                        heuristic.get_cost(neighbour_pos, end_pos),
                    )
                };
                let total = cost + heuristic_cost;

                let neighbour = self.pool.get(neighbour_index);
                // The node is already in the open list and the new result is
                // no better, skip. Likewise for already visited nodes.
                if (neighbour.flags.contains(NodeFlags::OPEN)
                    || neighbour.flags.contains(NodeFlags::CLOSED))
                    && total >= neighbour.total
                {
                    continue;
                }

                let was_open = neighbour.flags.contains(NodeFlags::OPEN);
                {
                    let neighbour = self.pool.get_mut(neighbour_index);
                    neighbour.parent = Some(best_index);
                    neighbour.flags.remove(NodeFlags::CLOSED);
                    neighbour.cost = cost;
                    neighbour.total = total;
                    neighbour.shortcut.clear();
                }
                if was_open {
                    // Already in the open list, update the node location.
                    self.open.modify(neighbour_index, self.pool.nodes());
                } else {
                    // Put the node in the open list.
                    self.pool.get_mut(neighbour_index).flags.insert(NodeFlags::OPEN);
                    self.open.push(neighbour_index, self.pool.nodes());
                }

                // Update the nearest node to the target so far.
                if heuristic_cost < last_best_cost {
                    last_best_cost = heuristic_cost;
                    last_best = neighbour_index;
                }
            }
        }

        if out_of_nodes {
            tracing::warn!(
                "path search ran out of nodes ({} max); result may be partial",
                self.pool.max_nodes()
            );
        }
        let partial = self.pool.get(last_best).poly != end_ref;
        Ok(FindPathResult {
            path: self.path_to_node(last_best),
            partial,
        })
    }

    /// Begins a sliced path query. Seeds the open set exactly like
    /// [`Self::find_path`] and stores the paused search in this engine.
    ///
    /// The filter and heuristic are part of the logical query state but are
    /// passed into every [`Self::update_sliced_find_path`] call instead of
    /// being stored here, so the engine does not have to hold onto caller
    /// borrows; pass the same ones for the whole search.
    pub fn init_sliced_find_path(
        &mut self,
        start_ref: PolyRef,
        end_ref: PolyRef,
        start_pos: Vec3A,
        end_pos: Vec3A,
        heuristic: &dyn QueryHeuristic,
        options: FindPathOptions,
        raycast_limit: Option<f32>,
    ) -> Result<SlicedPathState, QueryError> {
        self.sliced = None;
        let mesh = self.mesh;
        mesh.tile_and_poly_by_ref(start_ref)?;
        mesh.tile_and_poly_by_ref(end_ref)?;
        if !start_pos.is_finite() || !end_pos.is_finite() {
            return Err(QueryError::InvalidParam("positions must be finite"));
        }

        let raycast_limit_sqr = match raycast_limit {
            Some(limit) => sqr(limit),
            None => {
                // Limit raycasting during any-angle pathfinding: trade
                // quality with performance.
                let (tile, _) = mesh.tile_and_poly_by_ref_unchecked(start_ref);
                let radius = tile.payload().header.walkable_radius;
                sqr(radius * RAY_CAST_LIMIT_PROPORTIONS)
            }
        };

        let mut sliced = SlicedQuery {
            status: SlicedPathState::InProgress,
            start_ref,
            end_ref,
            end_pos,
            options,
            raycast_limit_sqr,
            last_best: 0,
            last_best_cost: f32::MAX,
            out_of_nodes: false,
        };

        if start_ref == end_ref {
            sliced.status = SlicedPathState::Success { partial: false };
            let status = sliced.status;
            self.sliced = Some(sliced);
            return Ok(status);
        }

        self.pool.clear();
        self.open.clear();

        let Some(start_index) = self.pool.node(start_ref) else {
            return Err(QueryError::OutOfNodes(self.pool.max_nodes()));
        };
        {
            let start = self.pool.get_mut(start_index);
            start.pos = start_pos;
            start.cost = 0.0;
            start.total = heuristic.get_cost(start_pos, end_pos);
            start.parent = None;
            start.flags = NodeFlags::OPEN;
            start.shortcut.clear();
        }
        self.open.push(start_index, self.pool.nodes());

        sliced.last_best = start_index;
        sliced.last_best_cost = self.pool.get(start_index).total;
        let status = sliced.status;
        self.sliced = Some(sliced);
        Ok(status)
    }

    /// Runs up to `max_iterations` node expansions of the in-progress sliced
    /// query and returns the new state plus the iterations actually
    /// consumed.
    pub fn update_sliced_find_path(
        &mut self,
        max_iterations: usize,
        filter: &dyn QueryFilter,
        heuristic: &dyn QueryHeuristic,
    ) -> Result<(SlicedPathState, usize), QueryError> {
        let mut sliced = self
            .sliced
            .take()
            .ok_or(QueryError::InvalidParam("no sliced query in progress"))?;
        if sliced.status != SlicedPathState::InProgress {
            let status = sliced.status;
            self.sliced = Some(sliced);
            return Ok((status, 0));
        }

        let mesh = self.mesh;
        // Make sure the request is still valid; tiles may have been removed
        // since the last update.
        if !mesh.is_valid_poly_ref(sliced.start_ref) || !mesh.is_valid_poly_ref(sliced.end_ref) {
            sliced.status = SlicedPathState::Failed;
            self.sliced = Some(sliced);
            return Ok((SlicedPathState::Failed, 0));
        }

        let mut iterations = 0;
        while iterations < max_iterations && !self.open.is_empty() {
            iterations += 1;

            // Remove the node from the open list and put it in the closed
            // list.
            let best_index = self
                .open
                .pop(self.pool.nodes())
                .expect("open list is non-empty");
            {
                let best = self.pool.get_mut(best_index);
                best.flags.remove(NodeFlags::OPEN);
                best.flags.insert(NodeFlags::CLOSED);
            }

            // Reached the goal, stop searching.
            let best_ref = self.pool.get(best_index).poly;
            if best_ref == sliced.end_ref {
                sliced.last_best = best_index;
                sliced.status = SlicedPathState::Success { partial: false };
                self.sliced = Some(sliced);
                return Ok((SlicedPathState::Success { partial: false }, iterations));
            }

            // Get the current poly and tile; the API input has been checked
            // already, skip checking internal data.
            let (best_tile, best_poly) = mesh.tile_and_poly_by_ref_unchecked(best_ref);
            let (best_pos, best_cost) = {
                let best = self.pool.get(best_index);
                (best.pos, best.cost)
            };

            let parent_index = self.pool.get(best_index).parent;
            let (parent_ref, parent_pos, parent_cost) = match parent_index {
                Some(p) => {
                    let parent = self.pool.get(p);
                    (Some(parent.poly), parent.pos, parent.cost)
                }
                None => (None, Vec3A::ZERO, 0.0),
            };
            let parent_poly = parent_ref.map(|r| mesh.tile_and_poly_by_ref_unchecked(r).1);
            let grandpa_ref = parent_index
                .and_then(|p| self.pool.get(p).parent)
                .map(|gp| self.pool.get(gp).poly);

            // Decide whether to test raycast to previous nodes.
            let try_los = sliced.options.contains(FindPathOptions::ANY_ANGLE)
                && parent_ref.is_some()
                && parent_pos.distance_squared(best_pos) < sliced.raycast_limit_sqr;

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

                let Some(neighbour_index) = self.pool.node(neighbour_ref) else {
                    sliced.out_of_nodes = true;
                    continue;
                };

                if self.pool.get(neighbour_index).flags.is_empty() {
                    let mid = self.edge_mid_point(best_ref, neighbour_ref)?;
                    self.pool.get_mut(neighbour_index).pos = mid;
                }
                let neighbour_pos = self.pool.get(neighbour_index).pos;

                // Try an any-angle shortcut: if a ray from the parent
                // reaches the neighbour unobstructed, bypass the current
                // node entirely and remember the polygons the ray crossed.
                let mut found_shortcut = false;
                let mut shortcut = Vec::new();
                let mut cost = 0.0;
                if try_los
                    && let Ok(hit) = self.raycast(
                        parent_ref.expect("try_los implies a parent"),
                        parent_pos,
                        neighbour_pos,
                        filter,
                        RaycastOptions::USE_COSTS,
                        grandpa_ref,
                    )
                {
                    found_shortcut = hit.t >= 1.0;
                    if found_shortcut {
                        shortcut = hit.path;
                        cost = parent_cost + hit.path_cost;
                    }
                }
                if !found_shortcut {
                    let cur_cost = filter.cost(
                        best_pos,
                        neighbour_pos,
                        parent_poly,
                        best_poly,
                        Some(neighbour_poly),
                    );
                    cost = best_cost + cur_cost;
                }

                let heuristic_cost = if neighbour_ref == sliced.end_ref {
                    let end_cost = filter.cost(
                        neighbour_pos,
                        sliced.end_pos,
                        Some(best_poly),
                        neighbour_poly,
                        None,
                    );
                    cost += end_cost;
                    0.0
                } else {
                    heuristic.get_cost(neighbour_pos, sliced.end_pos)
                };
                let total = cost + heuristic_cost;

                let neighbour = self.pool.get(neighbour_index);
                if (neighbour.flags.contains(NodeFlags::OPEN)
                    || neighbour.flags.contains(NodeFlags::CLOSED))
                    && total >= neighbour.total
                {
                    continue;
                }

                let was_open = neighbour.flags.contains(NodeFlags::OPEN);
                {
                    let neighbour = self.pool.get_mut(neighbour_index);
                    neighbour.parent = if found_shortcut {
                        parent_index
                    } else {
                        Some(best_index)
                    };
                    neighbour.flags.remove(NodeFlags::CLOSED | NodeFlags::PARENT_DETACHED);
                    neighbour.cost = cost;
                    neighbour.total = total;
                    neighbour.shortcut = shortcut;
                    if found_shortcut {
                        neighbour.flags.insert(NodeFlags::PARENT_DETACHED);
                    }
                }
                if was_open {
                    self.open.modify(neighbour_index, self.pool.nodes());
                } else {
                    self.pool.get_mut(neighbour_index).flags.insert(NodeFlags::OPEN);
                    self.open.push(neighbour_index, self.pool.nodes());
                }

                if heuristic_cost < sliced.last_best_cost {
                    sliced.last_best_cost = heuristic_cost;
                    sliced.last_best = neighbour_index;
                }
            }
        }

        // The open set emptied without reaching the goal: the search is done
        // and the best-effort corridor will be flagged partial.
        if self.open.is_empty() {
            sliced.status = SlicedPathState::Success { partial: true };
        }
        let status = sliced.status;
        self.sliced = Some(sliced);
        Ok((status, iterations))
    }

    /// Reconstructs the corridor of a finished sliced query from the best
    /// node found and resets the sliced state.
    pub fn finalize_sliced_find_path(&mut self) -> Result<FindPathResult, QueryError> {
        let sliced = self
            .sliced
            .take()
            .ok_or(QueryError::InvalidParam("no sliced query in progress"))?;
        if sliced.status == SlicedPathState::Failed {
            return Err(QueryError::NotFound);
        }
        if sliced.out_of_nodes {
            tracing::warn!(
                "sliced path search ran out of nodes ({} max); result may be partial",
                self.pool.max_nodes()
            );
        }

        if sliced.start_ref == sliced.end_ref {
            // Special case: the search starts and ends at the same poly.
            return Ok(FindPathResult {
                path: vec![sliced.start_ref],
                partial: false,
            });
        }

        let partial = self.pool.get(sliced.last_best).poly != sliced.end_ref;
        Ok(FindPathResult {
            path: self.path_to_node(sliced.last_best),
            partial,
        })
    }

    /// Like [`Self::finalize_sliced_find_path`], but keeps as much of an
    /// existing corridor as the new (possibly incomplete) search actually
    /// re-visited: `existing` is walked backward to find the deepest
    /// reference with search-node state, falling back to the best node
    /// found.
    pub fn finalize_sliced_find_path_partial(
        &mut self,
        existing: &[PolyRef],
    ) -> Result<FindPathResult, QueryError> {
        let sliced = self
            .sliced
            .take()
            .ok_or(QueryError::InvalidParam("no sliced query in progress"))?;
        if existing.is_empty() {
            return Err(QueryError::InvalidParam("existing path must be non-empty"));
        }
        if sliced.status == SlicedPathState::Failed {
            return Err(QueryError::NotFound);
        }

        if sliced.start_ref == sliced.end_ref {
            return Ok(FindPathResult {
                path: vec![sliced.start_ref],
                partial: false,
            });
        }

        // Find the furthest existing node that was visited.
        let node = existing
            .iter()
            .rev()
            .find_map(|&r| self.pool.find(r))
            .unwrap_or(sliced.last_best);

        let partial = self.pool.get(node).poly != sliced.end_ref;
        Ok(FindPathResult {
            path: self.path_to_node(node),
            partial,
        })
    }

    /// Walks parent links from `end_index` back to the search start,
    /// splicing raycast-bypassed polygons back in so all traversed tiles
    /// remain enumerable, and returns the corridor in forward order.
    pub(crate) fn path_to_node(&self, end_index: NodeIndex) -> Vec<PolyRef> {
        let mut path = Vec::new();
        let mut cur = Some(end_index);
        while let Some(index) = cur {
            let node = self.pool.get(index);
            path.push(node.poly);
            if let Some(parent) = node.parent {
                if !node.shortcut.is_empty() {
                    // Splice the bypassed polygons back in, skipping the
                    // endpoints which are already on the path.
                    let parent_ref = self.pool.get(parent).poly;
                    for &bypassed in node.shortcut.iter().rev() {
                        if bypassed != node.poly && bypassed != parent_ref {
                            path.push(bypassed);
                        }
                    }
                }
            }
            cur = node.parent;
        }
        path.reverse();
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::DefaultQueryFilter;
    use crate::heuristic::DefaultQueryHeuristic;
    use crate::nav_mesh::{NavMesh, NavMeshParams};
    use crate::test_tiles::{row_center, row_tile};

    fn defaults() -> (DefaultQueryFilter, DefaultQueryHeuristic) {
        (
            DefaultQueryFilter::default(),
            DefaultQueryHeuristic::default(),
        )
    }

    #[test]
    fn trivial_path_is_the_start_polygon() {
        let (mesh, tile_ref) = NavMesh::single_tile(row_tile(1), 0);
        let mut query = NavMeshQuery::new(&mesh);
        let (filter, heuristic) = defaults();
        let r = tile_ref.base_poly_ref();

        let result = query
            .find_path(
                r,
                r,
                row_center(0),
                row_center(0),
                &filter,
                &heuristic,
                FindPathOptions::empty(),
                None,
            )
            .unwrap();
        assert_eq!(result.path, vec![r]);
        assert!(!result.partial);
    }

    #[test]
    fn row_of_squares_is_walked_in_order() {
        let (mesh, tile_ref) = NavMesh::single_tile(row_tile(4), 0);
        let mut query = NavMeshQuery::new(&mesh);
        let (filter, heuristic) = defaults();
        let base = tile_ref.base_poly_ref();

        let result = query
            .find_path(
                base,
                base.with_poly_index(3),
                row_center(0),
                row_center(3),
                &filter,
                &heuristic,
                FindPathOptions::empty(),
                None,
            )
            .unwrap();
        assert!(!result.partial);
        assert_eq!(
            result.path,
            (0..4).map(|i| base.with_poly_index(i)).collect::<Vec<_>>()
        );
    }

    #[test]
    fn unreachable_goal_yields_a_partial_path() {
        // Two separate rows: tiles at y = 0 and y = 5 are never linked.
        let mut far = row_tile(1);
        far.header.y = 5;
        for v in far.vertices.iter_mut() {
            v.z += 5.0;
        }
        let mut mesh = NavMesh::new(NavMeshParams {
            origin: glam::Vec3A::ZERO,
            tile_width: 4.0,
            tile_height: 1.0,
            max_tiles: 4,
        });
        let near_ref = mesh.add_tile(row_tile(4), 0, None);
        let far_ref = mesh.add_tile(far, 0, None);

        let mut query = NavMeshQuery::new(&mesh);
        let (filter, heuristic) = defaults();
        let result = query
            .find_path(
                near_ref.base_poly_ref(),
                far_ref.base_poly_ref(),
                row_center(0),
                glam::vec3a(0.5, 0.0, 5.5),
                &filter,
                &heuristic,
                FindPathOptions::empty(),
                None,
            )
            .unwrap();
        assert!(result.partial);
        assert!(!result.path.is_empty());
        assert_eq!(result.path[0], near_ref.base_poly_ref());
    }

    #[test]
    fn sliced_search_matches_the_synchronous_result() {
        let (mesh, tile_ref) = NavMesh::single_tile(row_tile(4), 0);
        let mut query = NavMeshQuery::new(&mesh);
        let (filter, heuristic) = defaults();
        let base = tile_ref.base_poly_ref();
        let end = base.with_poly_index(3);

        let synchronous = query
            .find_path(
                base,
                end,
                row_center(0),
                row_center(3),
                &filter,
                &heuristic,
                FindPathOptions::empty(),
                None,
            )
            .unwrap();

        query
            .init_sliced_find_path(
                base,
                end,
                row_center(0),
                row_center(3),
                &heuristic,
                FindPathOptions::empty(),
                None,
            )
            .unwrap();
        // Drive the search one expansion at a time.
        let mut total_iterations = 0;
        loop {
            let (state, iterations) = query
                .update_sliced_find_path(1, &filter, &heuristic)
                .unwrap();
            total_iterations += iterations;
            assert!(iterations <= 1);
            if state != SlicedPathState::InProgress {
                assert_eq!(state, SlicedPathState::Success { partial: false });
                break;
            }
        }
        assert!(total_iterations >= synchronous.path.len() - 1);
        let sliced = query.finalize_sliced_find_path().unwrap();
        assert_eq!(sliced.path, synchronous.path);
        assert_eq!(sliced.partial, synchronous.partial);
    }

    #[test]
    fn finalize_partial_keeps_the_revisited_prefix_of_an_old_path() {
        let (mesh, tile_ref) = NavMesh::single_tile(row_tile(4), 0);
        let mut query = NavMeshQuery::new(&mesh);
        let (filter, heuristic) = defaults();
        let base = tile_ref.base_poly_ref();
        let old_path: Vec<_> = (0..3).map(|i| base.with_poly_index(i)).collect();

        query
            .init_sliced_find_path(
                base,
                base.with_poly_index(3),
                row_center(0),
                row_center(3),
                &heuristic,
                FindPathOptions::empty(),
                None,
            )
            .unwrap();
        // Expand only the start node: polygons 0 and 1 have search state.
        query.update_sliced_find_path(1, &filter, &heuristic).unwrap();

        let result = query.finalize_sliced_find_path_partial(&old_path).unwrap();
        assert!(result.partial);
        assert_eq!(result.path, vec![base, base.with_poly_index(1)]);
    }

    #[test]
    fn any_angle_path_still_enumerates_traversed_polygons() {
        let (mesh, tile_ref) = NavMesh::single_tile(row_tile(4), 0);
        let mut query = NavMeshQuery::new(&mesh);
        let (filter, heuristic) = defaults();
        let base = tile_ref.base_poly_ref();

        let result = query
            .find_path(
                base,
                base.with_poly_index(3),
                row_center(0),
                row_center(3),
                &filter,
                &heuristic,
                FindPathOptions::ANY_ANGLE,
                Some(100.0),
            )
            .unwrap();
        assert!(!result.partial);
        // Shortcut or not, every traversed polygon must appear, in order.
        assert_eq!(
            result.path,
            (0..4).map(|i| base.with_poly_index(i)).collect::<Vec<_>>()
        );
    }

    #[test]
    fn stale_references_fail_a_new_sliced_query() {
        let mut mesh = NavMesh::new(NavMeshParams {
            origin: glam::Vec3A::ZERO,
            tile_width: 4.0,
            tile_height: 1.0,
            max_tiles: 4,
        });
        let tile_ref = mesh.add_tile(row_tile(4), 0, None);
        let base = tile_ref.base_poly_ref();
        mesh.remove_tile(tile_ref).unwrap();

        // The stale refs fail validation instead of dereferencing a freed
        // tile.
        let heuristic = DefaultQueryHeuristic::default();
        let mut query = NavMeshQuery::new(&mesh);
        let error = query
            .init_sliced_find_path(
                base,
                base.with_poly_index(3),
                row_center(0),
                row_center(3),
                &heuristic,
                FindPathOptions::empty(),
                None,
            )
            .unwrap_err();
        assert!(matches!(error, QueryError::InvalidParam(_)));
    }
}
