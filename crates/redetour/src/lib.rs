#![doc = include_str!("../../../readme.md")]

mod area_search;
mod filter;
mod heuristic;
mod link;
pub(crate) mod math;
mod move_along;
mod nav_mesh;
pub(crate) mod node_pool;
mod path;
mod poly_ref;
mod query;
mod random;
mod raycast;
mod straight_path;
#[cfg(test)]
pub(crate) mod test_tiles;
mod tile;

pub use area_search::VisitedPoly;
pub use filter::{DefaultQueryFilter, QueryFilter};
pub use heuristic::{DefaultQueryHeuristic, QueryHeuristic};
pub use link::{LINK_INTERNAL, LINK_NO_EDGE, Link, LinkIter};
pub use math::Aabb3d;
pub use move_along::MoveAlongSurfaceResult;
pub use nav_mesh::{InvalidPolyRef, MeshTile, NavMesh, NavMeshParams, RemoveTileError};
pub use path::{FindPathOptions, FindPathResult, SlicedPathState};
pub use poly_ref::{PolyRef, TileRef};
pub use query::{NavMeshQuery, NearestPoly, QueryError};
pub use raycast::{RaycastHit, RaycastOptions};
pub use straight_path::{StraightPathFlags, StraightPathItem, StraightPathOptions};
pub use tile::{
    AreaType, BvNode, DETAIL_EDGE_BOUNDARY, EXT_LINK, MAX_AREAS, OffMeshConnection, Poly,
    PolyDetail, PolyFlags, PolyType, TileData, TileHeader, VERTS_PER_POLYGON,
    detail_tri_edge_flags,
};
