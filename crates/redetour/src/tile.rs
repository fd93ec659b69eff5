//! The tile payload: the immutable bundle of vertices, polygons, optional
//! detail sub-meshes, an optional bounding-volume tree and off-mesh
//! connections that a Recast-style generator produces for one tile.
//!
//! The query engine treats installed payloads as read-only; the only
//! mutations the store performs are snapping off-mesh connection endpoints
//! onto the landing polygon and the sanctioned flag/area accessors.

use glam::{U16Vec3, Vec3A};

use crate::math::Aabb3d;

/// The maximum number of vertices per navigation polygon.
pub const VERTS_PER_POLYGON: usize = 6;

/// Neighbor-code flag marking a polygon edge as a tile-border portal.
/// The low nibble of such a code holds the border side (0-7), or `0xf` for an
/// unconnected border edge.
pub const EXT_LINK: u16 = 0x8000;

/// The maximum number of user defined area ids.
pub const MAX_AREAS: usize = 64;

bitflags::bitflags! {
    /// Per-polygon traversal flags.
    ///
    /// The engine treats these as opaque bits matched against a
    /// [`QueryFilter`](crate::QueryFilter)'s include/exclude masks; the named
    /// values below are the conventional vocabulary, not a requirement.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
    #[repr(transparent)]
    pub struct PolyFlags: u16 {
        /// Ability to walk (ground, grass, road).
        const WALK = 0x01;
        /// Ability to swim (water).
        const SWIM = 0x02;
        /// Ability to move through doors.
        const DOOR = 0x04;
        /// Ability to jump.
        const JUMP = 0x08;
        /// Disabled polygon.
        const DISABLED = 0x10;
        /// All abilities.
        const ALL = 0xffff;
    }
}

/// A user defined area id assigned to a polygon. `[Limit: < 64]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct AreaType(pub u8);

impl From<u8> for AreaType {
    #[inline]
    fn from(value: u8) -> Self {
        AreaType(value)
    }
}

/// Distinguishes regular ground polygons from off-mesh connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum PolyType {
    /// A polygon that is part of the walkable surface.
    #[default]
    Ground,
    /// A degenerate 2-vertex polygon standing in for an off-mesh connection.
    OffMeshConnection,
}

/// A polygon within a [`TileData`] payload.
///
/// Corresponds to <https://github.com/recastnavigation/recastnavigation/blob/bd98d84c274ee06842bf51a4088ca82ac71f8c2d/Detour/Include/DetourNavMesh.h#L159>
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Poly {
    /// Indices into [`TileData::vertices`], in winding order.
    /// `[Length: <= VERTS_PER_POLYGON]`
    pub vertices: Vec<u16>,
    /// Packed per-edge neighbor data, one entry per vertex. `0` means a solid
    /// border; a value without [`EXT_LINK`] is a 1-based index of the
    /// neighbor polygon within the same tile; a value with [`EXT_LINK`] set
    /// marks a tile-border portal whose low nibble holds the side.
    pub neighbors: Vec<u16>,
    /// Traversal flags matched against query filters.
    pub flags: PolyFlags,
    /// The user defined area id.
    pub area: AreaType,
    /// Whether this is a ground polygon or an off-mesh connection.
    pub poly_type: PolyType,
}

impl Poly {
    /// The number of vertices (and edges) of this polygon.
    #[inline]
    pub fn vert_count(&self) -> usize {
        self.vertices.len()
    }
}

/// The height detail sub-mesh of a single polygon: extra triangles that track
/// the original surface more accurately than the polygon plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct PolyDetail {
    /// Offset of this polygon's vertices within [`TileData::detail_vertices`].
    pub vert_base: u32,
    /// Offset of this polygon's triangles within [`TileData::detail_triangles`].
    pub tri_base: u32,
    /// Number of detail vertices.
    pub vert_count: u32,
    /// Number of detail triangles.
    pub tri_count: u32,
}

/// Flag in a detail triangle's edge flags marking the edge as lying on the
/// polygon boundary.
pub const DETAIL_EDGE_BOUNDARY: u8 = 0x01;

/// Extracts the flags for one edge of a detail triangle from the triangle's
/// packed flags byte. `edge_index` is the index of the edge's first vertex.
#[inline]
pub fn detail_tri_edge_flags(tri_flags: u8, edge_index: usize) -> u8 {
    (tri_flags >> (edge_index * 2)) & 0x3
}

/// A node of the quantized axis-aligned bounding-volume tree over a tile's
/// polygons. Bounds are quantized relative to the tile bounds by
/// [`TileHeader::bv_quant_factor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct BvNode {
    /// Quantized minimum bound.
    pub bmin: U16Vec3,
    /// Quantized maximum bound.
    pub bmax: U16Vec3,
    /// The node's polygon index if non-negative (leaf), else the negated
    /// escape offset to the subtree sibling.
    pub index: i32,
}

/// A non-planar shortcut edge (ladder, jump, teleporter) linking two possibly
/// distant positions on the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct OffMeshConnection {
    /// The connection's raw start position.
    pub start: Vec3A,
    /// The connection's raw end position.
    pub end: Vec3A,
    /// Endpoints snap onto the mesh only within this radius.
    pub radius: f32,
    /// Index of the connection's 2-vertex polygon within
    /// [`TileData::polys`].
    pub poly: u16,
    /// The tile-border side the end position exits through (0-7), or `0xff`
    /// when the connection lands within the same tile.
    pub side: u8,
    /// Whether the connection can be traversed in both directions.
    pub bidirectional: bool,
}

/// Location and traversal parameters of one tile, produced by the generator.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TileHeader {
    /// The tile's x-coordinate in the tile grid.
    pub x: i32,
    /// The tile's y-coordinate in the tile grid.
    pub y: i32,
    /// The tile's layer within its grid cell. Cells can hold several stacked
    /// tiles (bridges, multi-storey buildings).
    pub layer: i32,
    /// The tile's bounds in world space.
    pub aabb: Aabb3d,
    /// The height of the agents using the tile. `[Units: wu]`
    pub walkable_height: f32,
    /// The radius of the agents using the tile. `[Units: wu]`
    pub walkable_radius: f32,
    /// The maximum climb height of the agents using the tile. `[Units: wu]`
    pub walkable_climb: f32,
    /// The bounding-volume quantization factor. Zero when the payload has no
    /// BV tree.
    pub bv_quant_factor: f32,
}

/// A complete tile payload as produced by the mesh-generation collaborator.
///
/// Immutable once installed into a [`NavMesh`](crate::NavMesh), with one
/// exception: the store patches off-mesh connection endpoint vertices to snap
/// them onto the landing tile's surface.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TileData {
    /// The tile's header.
    pub header: TileHeader,
    /// The tile's vertices.
    pub vertices: Vec<Vec3A>,
    /// The tile's polygons. Off-mesh connection polygons follow the ground
    /// polygons.
    pub polys: Vec<Poly>,
    /// Per-polygon detail sub-meshes. Either empty or one entry per polygon.
    pub detail_meshes: Vec<PolyDetail>,
    /// Detail vertices, indexed via [`PolyDetail::vert_base`]. Only vertices
    /// beyond the polygon's own are stored here.
    pub detail_vertices: Vec<Vec3A>,
    /// Detail triangles as `[a, b, c, edge_flags]`. Vertex values below the
    /// polygon's vertex count index the polygon's vertices; higher values
    /// index [`Self::detail_vertices`] relative to the detail base.
    pub detail_triangles: Vec<[u8; 4]>,
    /// The quantized bounding-volume tree, or empty when the generator
    /// skipped it.
    pub bv_tree: Vec<BvNode>,
    /// The tile's off-mesh connections.
    pub off_mesh_cons: Vec<OffMeshConnection>,
}

impl TileData {
    /// The number of polygons in the tile.
    #[inline]
    pub fn poly_count(&self) -> usize {
        self.polys.len()
    }

    /// Returns the vertex positions of `poly`'s detail triangle `tri`,
    /// resolving the split between polygon vertices and extra detail
    /// vertices.
    pub(crate) fn detail_triangle_verts(&self, poly: &Poly, pd: &PolyDetail, tri: usize) -> [Vec3A; 3] {
        let t = self.detail_triangles[pd.tri_base as usize + tri];
        let mut verts = [Vec3A::ZERO; 3];
        for (k, vert) in verts.iter_mut().enumerate() {
            let index = t[k] as usize;
            *vert = if index < poly.vert_count() {
                self.vertices[poly.vertices[index] as usize]
            } else {
                self.detail_vertices[pd.vert_base as usize + index - poly.vert_count()]
            };
        }
        verts
    }
}
