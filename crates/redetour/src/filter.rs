//! The pluggable traversal policy: which polygons a search may enter, and
//! what moving across them costs. Implemented by the caller and invoked on
//! every edge a search considers.

use glam::Vec3A;

use crate::{
    nav_mesh::MeshTile,
    poly_ref::PolyRef,
    tile::{MAX_AREAS, Poly, PolyFlags},
};

/// Defines polygon filtering and traversal costs for navigation queries.
pub trait QueryFilter {
    /// Whether a search may enter the polygon at all.
    fn pass_filter(&self, r: PolyRef, tile: &MeshTile, poly: &Poly) -> bool;

    /// The cost of moving from `pa` to `pb`, both on the surface of `cur`.
    /// `prev` and `next` are the polygons entered before and after `cur`
    /// when known, so policies can price transitions.
    fn cost(
        &self,
        pa: Vec3A,
        pb: Vec3A,
        prev: Option<&Poly>,
        cur: &Poly,
        next: Option<&Poly>,
    ) -> f32;
}

/// The standard filter: polygons pass when their flags intersect
/// `include_flags` and avoid `exclude_flags`; cost is travel distance scaled
/// by a per-area multiplier.
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultQueryFilter {
    /// Flags a polygon must share at least one of to be traversable.
    pub include_flags: PolyFlags,
    /// Flags that make a polygon untraversable.
    pub exclude_flags: PolyFlags,
    /// Cost multiplier per area id.
    pub area_cost: [f32; MAX_AREAS],
}

impl Default for DefaultQueryFilter {
    fn default() -> Self {
        Self {
            include_flags: PolyFlags::ALL,
            exclude_flags: PolyFlags::empty(),
            area_cost: [1.0; MAX_AREAS],
        }
    }
}

impl DefaultQueryFilter {
    /// Creates a filter with the given masks and uniform area costs.
    pub fn new(include_flags: PolyFlags, exclude_flags: PolyFlags) -> Self {
        Self {
            include_flags,
            exclude_flags,
            ..Default::default()
        }
    }
}

impl QueryFilter for DefaultQueryFilter {
    fn pass_filter(&self, _r: PolyRef, _tile: &MeshTile, poly: &Poly) -> bool {
        poly.flags.intersects(self.include_flags) && !poly.flags.intersects(self.exclude_flags)
    }

    fn cost(
        &self,
        pa: Vec3A,
        pb: Vec3A,
        _prev: Option<&Poly>,
        cur: &Poly,
        _next: Option<&Poly>,
    ) -> f32 {
        pa.distance(pb) * self.area_cost[cur.area.0 as usize]
    }
}
