//! The query engine: point/box queries and the shared plumbing (portal
//! lookup, error model, search scratch) used by the pathfinding, raycast and
//! sampling modules.
//!
//! A [`NavMeshQuery`] borrows its [`NavMesh`] immutably for its whole
//! lifetime, so the borrow checker enforces the store's single-writer
//! contract: tiles cannot be added or removed while a query engine is alive.

use glam::Vec3A;
use thiserror::Error;

use crate::{
    filter::QueryFilter,
    nav_mesh::{
        InvalidPolyRef, NavMesh, closest_point_on_poly_in_tile, poly_height_in_tile,
    },
    node_pool::{NodePool, NodeQueue},
    path::SlicedQuery,
    poly_ref::PolyRef,
    tile::{PolyType, VERTS_PER_POLYGON},
};

/// Default capacity of a query's node pool.
const DEFAULT_MAX_NODES: usize = 4096;

/// Capacity of the small scratch pool used by local searches such as
/// [`NavMeshQuery::move_along_surface`], kept separate so they can run
/// between sliced-search updates without disturbing the main scratch.
pub(crate) const TINY_NODE_POOL_SIZE: usize = 64;

/// Why a query operation failed.
///
/// Query failures are expected runtime conditions (stale references after a
/// tile reload, unreachable goals, bounded scratch running out) and are
/// always reported, never panicked on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// An input did not describe a valid query: a null or stale reference,
    /// or a non-finite position.
    #[error("invalid input parameter: {0}")]
    InvalidParam(&'static str),
    /// The requested item does not exist, e.g. no polygon at the queried
    /// location.
    #[error("requested item was not found")]
    NotFound,
    /// The bounded search scratch filled up before the search completed.
    #[error("search scratch exhausted ({0} nodes)")]
    OutOfNodes(usize),
}

impl From<InvalidPolyRef> for QueryError {
    fn from(_: InvalidPolyRef) -> Self {
        QueryError::InvalidParam("invalid or stale polygon reference")
    }
}

/// Result of [`NavMeshQuery::find_nearest_poly`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestPoly {
    /// The nearest polygon.
    pub poly: PolyRef,
    /// The closest point on that polygon.
    pub position: Vec3A,
    /// Whether the query center lies vertically over the polygon.
    pub over_poly: bool,
}

/// The shared edge between two adjacent corridor polygons, oriented left to
/// right along the direction of travel.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PortalPoints {
    pub(crate) left: Vec3A,
    pub(crate) right: Vec3A,
    pub(crate) to_type: PolyType,
}

/// A query engine bound to one [`NavMesh`].
///
/// Owns its own search scratch, so one instance must not be shared across
/// concurrently-running searches; two independent instances over the same
/// (unmutated) mesh may run concurrently.
pub struct NavMeshQuery<'m> {
    pub(crate) mesh: &'m NavMesh,
    pub(crate) pool: NodePool,
    pub(crate) open: NodeQueue,
    pub(crate) tiny_pool: NodePool,
    pub(crate) sliced: Option<SlicedQuery>,
}

impl<'m> NavMeshQuery<'m> {
    /// Creates a query engine with the default scratch capacity.
    pub fn new(mesh: &'m NavMesh) -> Self {
        Self::with_max_nodes(mesh, DEFAULT_MAX_NODES)
    }

    /// Creates a query engine whose searches visit at most `max_nodes`
    /// polygons. Searches that exhaust the scratch report
    /// [`QueryError::OutOfNodes`] or return partial results.
    pub fn with_max_nodes(mesh: &'m NavMesh, max_nodes: usize) -> Self {
        Self {
            mesh,
            pool: NodePool::new(max_nodes),
            open: NodeQueue::new(),
            tiny_pool: NodePool::new(TINY_NODE_POOL_SIZE),
            sliced: None,
        }
    }

    /// The mesh this engine queries.
    #[inline]
    pub fn nav_mesh(&self) -> &'m NavMesh {
        self.mesh
    }

    /// Whether the reference addresses a live polygon that passes the
    /// filter.
    pub fn is_valid_poly_ref(&self, r: PolyRef, filter: &dyn QueryFilter) -> bool {
        match self.mesh.tile_and_poly_by_ref(r) {
            Ok((tile, poly)) => filter.pass_filter(r, tile, poly),
            Err(_) => false,
        }
    }

    /// Finds the polygon nearest to `center` within the search box, and the
    /// closest point on it. Returns `Ok(None)` when no candidate passes the
    /// filter.
    ///
    /// A point vertically above a polygon within its tile's walkable-climb
    /// height is preferred over a straight-line-nearest boundary point
    /// elsewhere, so positions do not snap through thin walls.
    pub fn find_nearest_poly(
        &self,
        center: Vec3A,
        half_extents: Vec3A,
        filter: &dyn QueryFilter,
    ) -> Result<Option<NearestPoly>, QueryError> {
        let polys = self.query_polygons(center, half_extents, filter)?;

        let mut nearest: Option<NearestPoly> = None;
        let mut nearest_distance_sqr = f32::MAX;
        for r in polys {
            let (tile, _) = self.mesh.tile_and_poly_by_ref_unchecked(r);
            let data = tile.payload();
            let (closest, over_poly) =
                closest_point_on_poly_in_tile(data, r.poly_index() as usize, center);

            // If a point is directly over a polygon and closer than climb
            // height, favor that instead of the straight line nearest point.
            let diff = center - closest;
            let d = if over_poly {
                let dy = diff.y.abs() - data.header.walkable_climb;
                if dy > 0.0 { dy * dy } else { 0.0 }
            } else {
                diff.length_squared()
            };
            if d < nearest_distance_sqr {
                nearest_distance_sqr = d;
                nearest = Some(NearestPoly {
                    poly: r,
                    position: closest,
                    over_poly,
                });
            }
        }
        Ok(nearest)
    }

    /// Collects the references of all polygons overlapping the search box
    /// and passing the filter.
    pub fn query_polygons(
        &self,
        center: Vec3A,
        half_extents: Vec3A,
        filter: &dyn QueryFilter,
    ) -> Result<Vec<PolyRef>, QueryError> {
        if !center.is_finite() || !half_extents.is_finite() || half_extents.cmplt(Vec3A::ZERO).any()
        {
            return Err(QueryError::InvalidParam("query box must be finite"));
        }
        let bmin = center - half_extents;
        let bmax = center + half_extents;

        // Find tiles the query touches.
        let (min_x, min_y) = self.mesh.calc_tile_loc(bmin);
        let (max_x, max_y) = self.mesh.calc_tile_loc(bmax);

        let mut out = Vec::new();
        for y in min_y..=max_y {
            for x in min_x..=max_x {
                for tile in self.mesh.tiles_at(x, y) {
                    for r in self.mesh.query_polygons_in_tile(tile, bmin, bmax) {
                        let (tile, poly) = self.mesh.tile_and_poly_by_ref_unchecked(r);
                        if filter.pass_filter(r, tile, poly) {
                            out.push(r);
                        }
                    }
                }
            }
        }
        Ok(out)
    }

    /// The closest point on the polygon to `pos` and whether `pos` lies
    /// vertically over it.
    pub fn closest_point_on_poly(
        &self,
        r: PolyRef,
        pos: Vec3A,
    ) -> Result<(Vec3A, bool), QueryError> {
        if !pos.is_finite() {
            return Err(QueryError::InvalidParam("position must be finite"));
        }
        Ok(self.mesh.closest_point_on_poly(r, pos)?)
    }

    /// The closest point to `pos` on the polygon's boundary. Unlike
    /// [`Self::closest_point_on_poly`], only the xz-plane boundary is
    /// consulted, which is cheaper and is what path clamping wants.
    pub fn closest_point_on_poly_boundary(
        &self,
        r: PolyRef,
        pos: Vec3A,
    ) -> Result<Vec3A, QueryError> {
        let (tile, poly) = self.mesh.tile_and_poly_by_ref(r)?;
        if !pos.is_finite() {
            return Err(QueryError::InvalidParam("position must be finite"));
        }
        let data = tile.payload();

        let mut verts = [Vec3A::ZERO; VERTS_PER_POLYGON];
        let nv = poly.vert_count();
        for (i, vert) in verts[..nv].iter_mut().enumerate() {
            *vert = data.vertices[poly.vertices[i] as usize];
        }

        let mut edge_dist = [0.0_f32; VERTS_PER_POLYGON];
        let mut edge_t = [0.0_f32; VERTS_PER_POLYGON];
        let inside = crate::math::distance_pt_poly_edges_sqr(
            pos,
            &verts[..nv],
            &mut edge_dist[..nv],
            &mut edge_t[..nv],
        );
        if inside {
            // The point is inside the polygon, return the point.
            return Ok(pos);
        }
        // The point is outside the polygon, clamp to the nearest edge.
        let mut best = 0;
        for i in 1..nv {
            if edge_dist[i] < edge_dist[best] {
                best = i;
            }
        }
        let va = verts[best];
        let vb = verts[(best + 1) % nv];
        Ok(va.lerp(vb, edge_t[best]))
    }

    /// The height of the polygon surface at `pos`.
    ///
    /// Queries the detail sub-mesh when present, else the polygon's vertex
    /// fan. Off-mesh connections have no surface and report
    /// [`QueryError::InvalidParam`]; a position not vertically over the
    /// polygon reports [`QueryError::NotFound`].
    pub fn get_poly_height(&self, r: PolyRef, pos: Vec3A) -> Result<f32, QueryError> {
        let (tile, poly) = self.mesh.tile_and_poly_by_ref(r)?;
        if !pos.is_finite() {
            return Err(QueryError::InvalidParam("position must be finite"));
        }
        if poly.poly_type == PolyType::OffMeshConnection {
            return Err(QueryError::InvalidParam(
                "off-mesh connections have no surface height",
            ));
        }
        poly_height_in_tile(tile.payload(), r.poly_index() as usize, pos)
            .ok_or(QueryError::NotFound)
    }

    /// The left/right vertices of the portal crossed when moving from `from`
    /// to `to`, which must be linked.
    pub(crate) fn portal_points(
        &self,
        from: PolyRef,
        to: PolyRef,
    ) -> Result<PortalPoints, QueryError> {
        let (from_tile, from_poly) = self.mesh.tile_and_poly_by_ref(from)?;
        let (to_tile, to_poly) = self.mesh.tile_and_poly_by_ref(to)?;

        let link = from_tile
            .links_of(from.poly_index() as usize)
            .find(|link| link.target == to)
            .ok_or(QueryError::NotFound)?;

        // Handle off-mesh connections: the "portal" collapses onto the
        // connection endpoint.
        if from_poly.poly_type == PolyType::OffMeshConnection {
            let v = from_tile.payload().vertices[from_poly.vertices[link.edge as usize] as usize];
            return Ok(PortalPoints {
                left: v,
                right: v,
                to_type: to_poly.poly_type,
            });
        }
        if to_poly.poly_type == PolyType::OffMeshConnection {
            let back_link = to_tile
                .links_of(to.poly_index() as usize)
                .find(|link| link.target == from)
                .ok_or(QueryError::NotFound)?;
            let v = to_tile.payload().vertices[to_poly.vertices[back_link.edge as usize] as usize];
            return Ok(PortalPoints {
                left: v,
                right: v,
                to_type: to_poly.poly_type,
            });
        }

        // Find the portal vertices.
        let data = from_tile.payload();
        let edge = link.edge as usize;
        let nv = from_poly.vert_count();
        let mut left = data.vertices[from_poly.vertices[edge] as usize];
        let mut right = data.vertices[from_poly.vertices[(edge + 1) % nv] as usize];

        // If the link is at a tile boundary, clamp the vertices to the
        // walkable sub-interval of the edge.
        if link.side != crate::link::LINK_INTERNAL && (link.bmin != 0 || link.bmax != 255) {
            let s = 1.0 / 255.0;
            let tmin = link.bmin as f32 * s;
            let tmax = link.bmax as f32 * s;
            let v0 = data.vertices[from_poly.vertices[edge] as usize];
            let v1 = data.vertices[from_poly.vertices[(edge + 1) % nv] as usize];
            left = v0.lerp(v1, tmin);
            right = v0.lerp(v1, tmax);
        }

        Ok(PortalPoints {
            left,
            right,
            to_type: to_poly.poly_type,
        })
    }

    /// The midpoint of the portal between two linked polygons.
    pub(crate) fn edge_mid_point(&self, from: PolyRef, to: PolyRef) -> Result<Vec3A, QueryError> {
        let portal = self.portal_points(from, to)?;
        Ok((portal.left + portal.right) * 0.5)
    }
}
