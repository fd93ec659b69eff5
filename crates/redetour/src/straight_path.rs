//! Straight-path construction over a polygon corridor using the "simple
//! stupid funnel" algorithm: keep an apex and a left/right funnel edge,
//! tighten the funnel portal by portal, and emit a vertex whenever a portal
//! would cross the funnel inconsistently.

use glam::Vec3A;

use crate::{
    math::{distance_pt_seg_sqr_xz, intersect_seg_seg_xz, sqr, tri_area_xz, v_equal},
    poly_ref::PolyRef,
    query::{NavMeshQuery, QueryError},
    tile::PolyType,
};

bitflags::bitflags! {
    /// Flags describing a vertex of a straight path.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct StraightPathFlags: u8 {
        /// The vertex is the path start.
        const START = 0x01;
        /// The vertex is the path end.
        const END = 0x02;
        /// The vertex is the start of an off-mesh connection.
        const OFFMESH_CONNECTION = 0x04;
    }
}

bitflags::bitflags! {
    /// Options for [`NavMeshQuery::find_straight_path`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct StraightPathOptions: u32 {
        /// Add a vertex at every polygon edge crossing where the area
        /// changes.
        const AREA_CROSSINGS = 0x01;
        /// Add a vertex at every polygon edge crossing.
        const ALL_CROSSINGS = 0x02;
    }
}

/// One vertex of a straight path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StraightPathItem {
    /// The vertex position.
    pub pos: Vec3A,
    /// What the vertex marks.
    pub flags: StraightPathFlags,
    /// The polygon entered at this vertex, or [`PolyRef::NONE`] at the path
    /// end.
    pub poly: PolyRef,
}

enum Append {
    Continue,
    Done,
}

fn append_vertex(
    points: &mut Vec<StraightPathItem>,
    pos: Vec3A,
    flags: StraightPathFlags,
    poly: PolyRef,
    max_points: usize,
) -> Append {
    if let Some(last) = points.last_mut()
        && v_equal(last.pos, pos)
    {
        // The vertices are equal, update the flags and poly.
        last.flags = flags;
        last.poly = poly;
        return Append::Continue;
    }
    points.push(StraightPathItem { pos, flags, poly });
    // If we reached the end of the path or the buffer, stop.
    if flags == StraightPathFlags::END || points.len() >= max_points {
        return Append::Done;
    }
    Append::Continue
}

impl<'m> NavMeshQuery<'m> {
    /// Turns a polygon corridor into a sequence of straight-line waypoints
    /// from `start_pos` to `end_pos`, both clamped onto the corridor.
    ///
    /// At most `max_points` vertices are produced; a longer path is
    /// truncated. Vertices are flagged as path start, path end or off-mesh
    /// connection entry, and `options` may request extra vertices at area
    /// changes or at every polygon crossing.
    ///
    /// If a corridor polygon can no longer be resolved (stale after a tile
    /// change), the path is truncated at the last resolvable polygon; the
    /// final vertex then lacks [`StraightPathFlags::END`].
    pub fn find_straight_path(
        &self,
        start_pos: Vec3A,
        end_pos: Vec3A,
        path: &[PolyRef],
        max_points: usize,
        options: StraightPathOptions,
    ) -> Result<Vec<StraightPathItem>, QueryError> {
        if path.is_empty() {
            return Err(QueryError::InvalidParam("path must be non-empty"));
        }
        if !start_pos.is_finite() || !end_pos.is_finite() {
            return Err(QueryError::InvalidParam("positions must be finite"));
        }
        if max_points == 0 {
            return Err(QueryError::InvalidParam("max_points must be non-zero"));
        }

        let mut points = Vec::new();

        // Clamp the start and end onto the corridor.
        let closest_start_pos = self.closest_point_on_poly_boundary(path[0], start_pos)?;
        let mut closest_end_pos =
            self.closest_point_on_poly_boundary(path[path.len() - 1], end_pos)?;

        // Add the start point.
        if let Append::Done = append_vertex(
            &mut points,
            closest_start_pos,
            StraightPathFlags::START,
            path[0],
            max_points,
        ) {
            return Ok(points);
        }

        if path.len() > 1 {
            let mut portal_apex = closest_start_pos;
            let mut portal_left = portal_apex;
            let mut portal_right = portal_apex;
            let mut apex_index = 0_usize;
            let mut left_index = 0_usize;
            let mut right_index = 0_usize;

            let mut left_poly_type = PolyType::Ground;
            let mut right_poly_type = PolyType::Ground;
            let mut left_poly_ref = path[0];
            let mut right_poly_ref = path[0];

            let mut i = 0;
            while i < path.len() {
                let (left, right, to_type) = if i + 1 < path.len() {
                    // Next portal.
                    match self.portal_points(path[i], path[i + 1]) {
                        Ok(portal) => (portal.left, portal.right, portal.to_type),
                        Err(_) => {
                            // Failed to get the portal points; in practice
                            // this means path[i+1] went stale. Clamp the end
                            // to path[i] and return the path so far.
                            closest_end_pos =
                                self.closest_point_on_poly_boundary(path[i], end_pos)?;
                            if options.intersects(
                                StraightPathOptions::AREA_CROSSINGS
                                    | StraightPathOptions::ALL_CROSSINGS,
                            ) {
                                let _ = self.append_portals(
                                    apex_index,
                                    i,
                                    closest_end_pos,
                                    path,
                                    &mut points,
                                    max_points,
                                    options,
                                );
                            }
                            append_vertex(
                                &mut points,
                                closest_end_pos,
                                StraightPathFlags::empty(),
                                path[i],
                                max_points,
                            );
                            return Ok(points);
                        }
                    }
                } else {
                    // End of the path.
                    (closest_end_pos, closest_end_pos, PolyType::Ground)
                };

                if i == 0 {
                    // If starting really close to the portal, advance.
                    let (d, _) = distance_pt_seg_sqr_xz(portal_apex, left, right);
                    if d < sqr(0.001) {
                        i += 1;
                        continue;
                    }
                }

                // Right vertex.
                if tri_area_xz(portal_apex, portal_right, right) <= 0.0 {
                    if v_equal(portal_apex, portal_right)
                        || tri_area_xz(portal_apex, portal_left, right) > 0.0
                    {
                        portal_right = right;
                        right_poly_ref = if i + 1 < path.len() {
                            path[i + 1]
                        } else {
                            PolyRef::NONE
                        };
                        right_poly_type = to_type;
                        right_index = i;
                    } else {
                        // The right vertex crossed over the left funnel
                        // edge: collapse to the left vertex and emit it.
                        if options.intersects(
                            StraightPathOptions::AREA_CROSSINGS
                                | StraightPathOptions::ALL_CROSSINGS,
                        ) && let Append::Done = self.append_portals(
                            apex_index,
                            left_index,
                            portal_left,
                            path,
                            &mut points,
                            max_points,
                            options,
                        )? {
                            return Ok(points);
                        }

                        portal_apex = portal_left;
                        apex_index = left_index;

                        let flags = if left_poly_ref.is_none() {
                            StraightPathFlags::END
                        } else if left_poly_type == PolyType::OffMeshConnection {
                            StraightPathFlags::OFFMESH_CONNECTION
                        } else {
                            StraightPathFlags::empty()
                        };
                        if let Append::Done = append_vertex(
                            &mut points,
                            portal_apex,
                            flags,
                            left_poly_ref,
                            max_points,
                        ) {
                            return Ok(points);
                        }

                        portal_left = portal_apex;
                        portal_right = portal_apex;
                        left_index = apex_index;
                        right_index = apex_index;

                        // Restart from the new apex.
                        i = apex_index + 1;
                        continue;
                    }
                }

                // Left vertex.
                if tri_area_xz(portal_apex, portal_left, left) >= 0.0 {
                    if v_equal(portal_apex, portal_left)
                        || tri_area_xz(portal_apex, portal_right, left) < 0.0
                    {
                        portal_left = left;
                        left_poly_ref = if i + 1 < path.len() {
                            path[i + 1]
                        } else {
                            PolyRef::NONE
                        };
                        left_poly_type = to_type;
                        left_index = i;
                    } else {
                        // The left vertex crossed over the right funnel
                        // edge: collapse to the right vertex and emit it.
                        if options.intersects(
                            StraightPathOptions::AREA_CROSSINGS
                                | StraightPathOptions::ALL_CROSSINGS,
                        ) && let Append::Done = self.append_portals(
                            apex_index,
                            right_index,
                            portal_right,
                            path,
                            &mut points,
                            max_points,
                            options,
                        )? {
                            return Ok(points);
                        }

                        portal_apex = portal_right;
                        apex_index = right_index;

                        let flags = if right_poly_ref.is_none() {
                            StraightPathFlags::END
                        } else if right_poly_type == PolyType::OffMeshConnection {
                            StraightPathFlags::OFFMESH_CONNECTION
                        } else {
                            StraightPathFlags::empty()
                        };
                        if let Append::Done = append_vertex(
                            &mut points,
                            portal_apex,
                            flags,
                            right_poly_ref,
                            max_points,
                        ) {
                            return Ok(points);
                        }

                        portal_left = portal_apex;
                        portal_right = portal_apex;
                        left_index = apex_index;
                        right_index = apex_index;

                        i = apex_index + 1;
                        continue;
                    }
                }
                i += 1;
            }

            // Append portals along the final straight path segment.
            if options.intersects(
                StraightPathOptions::AREA_CROSSINGS | StraightPathOptions::ALL_CROSSINGS,
            ) && let Append::Done = self.append_portals(
                apex_index,
                path.len() - 1,
                closest_end_pos,
                path,
                &mut points,
                max_points,
                options,
            )? {
                return Ok(points);
            }
        }

        append_vertex(
            &mut points,
            closest_end_pos,
            StraightPathFlags::END,
            PolyRef::NONE,
            max_points,
        );
        if points.len() >= max_points {
            tracing::warn!("straight path truncated at {max_points} points");
        }
        Ok(points)
    }

    /// Appends a vertex at each portal between `start_index` and `end_index`
    /// that the straight segment toward `end_pos` crosses.
    fn append_portals(
        &self,
        start_index: usize,
        end_index: usize,
        end_pos: Vec3A,
        path: &[PolyRef],
        points: &mut Vec<StraightPathItem>,
        max_points: usize,
        options: StraightPathOptions,
    ) -> Result<Append, QueryError> {
        let start_pos = points.last().expect("start vertex was appended").pos;
        // Append or update the last vertex.
        for i in start_index..end_index {
            // Calculate the portal.
            let from = path[i];
            let to = path[i + 1];
            let Ok(portal) = self.portal_points(from, to) else {
                break;
            };

            if options.contains(StraightPathOptions::AREA_CROSSINGS)
                && !options.contains(StraightPathOptions::ALL_CROSSINGS)
            {
                // Skip the intersection if only area crossings are
                // requested and the area does not change.
                let (_, from_poly) = self.mesh.tile_and_poly_by_ref_unchecked(from);
                let (_, to_poly) = self.mesh.tile_and_poly_by_ref_unchecked(to);
                if from_poly.area == to_poly.area {
                    continue;
                }
            }

            // Append the intersection.
            if let Some((_, t)) =
                intersect_seg_seg_xz(start_pos, end_pos, portal.left, portal.right)
            {
                let pt = portal.left.lerp(portal.right, t);
                if let Append::Done = append_vertex(
                    points,
                    pt,
                    StraightPathFlags::empty(),
                    path[i + 1],
                    max_points,
                ) {
                    return Ok(Append::Done);
                }
            }
        }
        Ok(Append::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nav_mesh::NavMesh;
    use crate::test_tiles::{row_center, row_tile};

    #[test]
    fn straight_corridor_yields_start_and_end_only() {
        let (mesh, tile_ref) = NavMesh::single_tile(row_tile(4), 0);
        let query = NavMeshQuery::new(&mesh);
        let base = tile_ref.base_poly_ref();
        let corridor: Vec<_> = (0..4).map(|i| base.with_poly_index(i)).collect();

        let points = query
            .find_straight_path(
                row_center(0),
                row_center(3),
                &corridor,
                16,
                StraightPathOptions::empty(),
            )
            .unwrap();

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].flags, StraightPathFlags::START);
        assert_eq!(points[0].pos, row_center(0));
        assert_eq!(points[1].flags, StraightPathFlags::END);
        assert_eq!(points[1].pos, row_center(3));
    }

    #[test]
    fn all_crossings_emits_monotone_collinear_points() {
        let n = 4;
        let (mesh, tile_ref) = NavMesh::single_tile(row_tile(n), 0);
        let query = NavMeshQuery::new(&mesh);
        let base = tile_ref.base_poly_ref();
        let corridor: Vec<_> = (0..n as u32).map(|i| base.with_poly_index(i)).collect();

        let points = query
            .find_straight_path(
                row_center(0),
                row_center(n - 1),
                &corridor,
                16,
                StraightPathOptions::ALL_CROSSINGS,
            )
            .unwrap();

        // No more than n + 1 vertices for an n-polygon straight corridor.
        assert!(points.len() <= n + 1, "{} points", points.len());
        for pair in points.windows(2) {
            // Monotonically advancing along +x, collinear in z.
            assert!(pair[1].pos.x > pair[0].pos.x);
            assert_eq!(pair[1].pos.z, 0.5);
        }
        assert_eq!(points.last().unwrap().flags, StraightPathFlags::END);
    }

    #[test]
    fn truncation_respects_max_points() {
        let n = 4;
        let (mesh, tile_ref) = NavMesh::single_tile(row_tile(n), 0);
        let query = NavMeshQuery::new(&mesh);
        let base = tile_ref.base_poly_ref();
        let corridor: Vec<_> = (0..n as u32).map(|i| base.with_poly_index(i)).collect();

        let points = query
            .find_straight_path(
                row_center(0),
                row_center(n - 1),
                &corridor,
                2,
                StraightPathOptions::ALL_CROSSINGS,
            )
            .unwrap();
        assert_eq!(points.len(), 2);
    }
}
