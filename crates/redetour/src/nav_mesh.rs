//! The tile store: a fixed-capacity array of tile slots, a spatial index
//! from tile-grid coordinates to the tiles occupying each cell, and the
//! link construction that stitches independently loaded tiles into one
//! navigable graph.
//!
//! Corresponds to <https://github.com/recastnavigation/recastnavigation/blob/bd98d84c274ee06842bf51a4088ca82ac71f8c2d/Detour/Source/DetourNavMesh.cpp>

use std::collections::HashMap;

use glam::{IVec3, Vec3A, vec3a};
use thiserror::Error;

use crate::{
    link::{LINK_INTERNAL, LINK_NO_EDGE, LinkArena, LinkIter},
    math::{
        closest_height_point_triangle, distance_pt_seg_sqr_xz, opposite_tile,
        overlap_quant_bounds, point_in_polygon, sqr,
    },
    poly_ref::{POLY_MASK, PolyRef, SALT_MASK, TileRef},
    tile::{
        DETAIL_EDGE_BOUNDARY, EXT_LINK, Poly, PolyFlags, PolyType, TileData,
        detail_tri_edge_flags,
    },
};

/// Limit raycasting during any-angle pathfinding, as a multiple of the agent
/// radius.
pub(crate) const RAY_CAST_LIMIT_PROPORTIONS: f32 = 50.0;

/// Error returned when an operation received a reference that does not
/// address a live polygon (null, out of range salt-wise, or pointing past the
/// addressed tile's polygon count).
///
/// Stale references are a normal, expected outcome after a tile reload and
/// must be handled, not treated as fatal.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("invalid or stale polygon reference")]
pub struct InvalidPolyRef;

/// Error returned by [`NavMesh::remove_tile`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveTileError {
    /// The reference was the null reference.
    #[error("null tile reference")]
    NullRef,
    /// The slot's salt no longer matches the reference; the tile was already
    /// removed or replaced.
    #[error("stale tile reference (salt mismatch)")]
    StaleReference,
}

/// Configuration used to initialize a [`NavMesh`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct NavMeshParams {
    /// The world-space origin of tile (0, 0).
    pub origin: Vec3A,
    /// The width of each tile along the x-axis. `[Units: wu]`
    pub tile_width: f32,
    /// The height of each tile along the z-axis. `[Units: wu]`
    pub tile_height: f32,
    /// The maximum number of tiles the mesh can contain.
    /// `[Limit: 1 <= value <= 2^28]`
    pub max_tiles: usize,
}

/// One of the mesh's fixed tile slots. A slot's index is its identity and is
/// never reassigned; its salt is bumped every time the slot is vacated.
#[derive(Debug)]
pub struct MeshTile {
    index: u32,
    salt: u32,
    flags: u32,
    data: Option<TileData>,
    links: LinkArena,
    /// Index of the first outgoing link of each polygon.
    poly_links: Vec<Option<u32>>,
    /// Next slot in the free list while this slot is vacant.
    next_free: Option<u32>,
}

impl MeshTile {
    /// The slot's stable index.
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The slot's current generation salt.
    #[inline]
    pub fn salt(&self) -> u32 {
        self.salt
    }

    /// The caller-defined flags passed to [`NavMesh::add_tile`].
    #[inline]
    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// The installed payload, or `None` while the slot is vacant.
    #[inline]
    pub fn data(&self) -> Option<&TileData> {
        self.data.as_ref()
    }

    /// The installed payload.
    ///
    /// # Panics
    ///
    /// Panics if the slot is vacant.
    #[inline]
    pub(crate) fn payload(&self) -> &TileData {
        self.data.as_ref().expect("tile slot is occupied")
    }

    /// Iterates over the outgoing links of the polygon at `poly_index`.
    #[inline]
    pub fn links_of(&self, poly_index: usize) -> LinkIter<'_> {
        LinkIter {
            arena: &self.links,
            next: self.poly_links.get(poly_index).copied().flatten(),
        }
    }

    fn push_link(&mut self, poly_index: usize) -> u32 {
        let index = self.links.alloc();
        self.links.get_mut(index).next = self.poly_links[poly_index];
        self.poly_links[poly_index] = Some(index);
        index
    }
}

/// A navigation mesh built from one or more tiles.
///
/// The store assumes a single writer: [`Self::add_tile`] and
/// [`Self::remove_tile`] must not run concurrently with readers. Query
/// engines borrow the mesh immutably, which makes the borrow checker enforce
/// exactly that.
pub struct NavMesh {
    params: NavMeshParams,
    tiles: Vec<MeshTile>,
    free_head: Option<u32>,
    /// Maps tile-grid coordinates to the slots of the (possibly several,
    /// layered) tiles occupying that cell.
    pos_lookup: HashMap<(i32, i32), Vec<u32>>,
    tile_count: usize,
}

impl NavMesh {
    /// Creates an empty mesh with `params.max_tiles` vacant slots.
    ///
    /// # Panics
    ///
    /// Panics if `max_tiles` is zero or does not fit the tile-index bit
    /// width of [`PolyRef`].
    pub fn new(params: NavMeshParams) -> Self {
        assert!(params.max_tiles >= 1, "max_tiles must be at least 1");
        assert!(
            params.max_tiles as u64 <= (1 << crate::poly_ref::TILE_BITS),
            "max_tiles exceeds the tile-index bit width"
        );
        let tiles = (0..params.max_tiles as u32)
            .map(|index| MeshTile {
                index,
                salt: 1,
                flags: 0,
                data: None,
                links: LinkArena::default(),
                poly_links: Vec::new(),
                next_free: (index + 1 < params.max_tiles as u32).then_some(index + 1),
            })
            .collect();
        Self {
            params,
            tiles,
            free_head: Some(0),
            pos_lookup: HashMap::new(),
            tile_count: 0,
        }
    }

    /// Creates a mesh holding exactly the given tile, deriving the grid
    /// parameters from the payload's bounds. Returns the mesh and the tile's
    /// reference.
    pub fn single_tile(data: TileData, flags: u32) -> (Self, TileRef) {
        let aabb = data.header.aabb;
        let mut mesh = Self::new(NavMeshParams {
            origin: aabb.min,
            tile_width: aabb.max.x - aabb.min.x,
            tile_height: aabb.max.z - aabb.min.z,
            max_tiles: 1,
        });
        let tile_ref = mesh.add_tile(data, flags, None);
        (mesh, tile_ref)
    }

    /// The parameters the mesh was initialized with.
    #[inline]
    pub fn params(&self) -> &NavMeshParams {
        &self.params
    }

    /// The maximum number of tiles supported by the mesh.
    #[inline]
    pub fn max_tiles(&self) -> usize {
        self.params.max_tiles
    }

    /// The number of tiles currently installed.
    #[inline]
    pub fn tile_count(&self) -> usize {
        self.tile_count
    }

    /// The tile slot at `index`.
    #[inline]
    pub fn tile(&self, index: usize) -> &MeshTile {
        &self.tiles[index]
    }

    /// Iterates over all occupied tile slots.
    pub fn tiles(&self) -> impl Iterator<Item = &MeshTile> {
        self.tiles.iter().filter(|tile| tile.data.is_some())
    }

    /// The tile-grid cell containing the world position.
    #[inline]
    pub fn calc_tile_loc(&self, pos: Vec3A) -> (i32, i32) {
        (
            ((pos.x - self.params.origin.x) / self.params.tile_width).floor() as i32,
            ((pos.z - self.params.origin.z) / self.params.tile_height).floor() as i32,
        )
    }

    /// The polygon reference of the tile's polygon 0; references to the
    /// tile's other polygons are derived from it via
    /// [`PolyRef::with_poly_index`].
    #[inline]
    pub fn poly_ref_base(&self, tile: &MeshTile) -> PolyRef {
        PolyRef::encode(tile.salt, tile.index, 0)
    }

    /// The reference addressing the given occupied tile slot.
    #[inline]
    pub fn tile_ref(&self, tile: &MeshTile) -> TileRef {
        TileRef::encode(tile.salt, tile.index)
    }

    /// Whether the reference addresses a live polygon.
    #[inline]
    pub fn is_valid_poly_ref(&self, r: PolyRef) -> bool {
        self.tile_and_poly_by_ref(r).is_ok()
    }

    /// Resolves a reference into its tile and polygon, validating the salt
    /// and polygon index.
    pub fn tile_and_poly_by_ref(&self, r: PolyRef) -> Result<(&MeshTile, &Poly), InvalidPolyRef> {
        if r.is_none() {
            return Err(InvalidPolyRef);
        }
        let (salt, it, ip) = r.decode();
        let tile = self.tiles.get(it as usize).ok_or(InvalidPolyRef)?;
        if tile.salt != salt {
            return Err(InvalidPolyRef);
        }
        let data = tile.data.as_ref().ok_or(InvalidPolyRef)?;
        let poly = data.polys.get(ip as usize).ok_or(InvalidPolyRef)?;
        Ok((tile, poly))
    }

    /// Resolves a reference into its tile and polygon without validation.
    ///
    /// Only use this when the reference is known to be valid; it is faster
    /// than [`Self::tile_and_poly_by_ref`] but panics on a stale or
    /// out-of-range reference instead of reporting it.
    #[inline]
    pub fn tile_and_poly_by_ref_unchecked(&self, r: PolyRef) -> (&MeshTile, &Poly) {
        let tile = &self.tiles[r.tile_index() as usize];
        let poly = &tile.payload().polys[r.poly_index() as usize];
        (tile, poly)
    }

    /// The tile occupying `(x, y, layer)`, if any.
    pub fn tile_at(&self, x: i32, y: i32, layer: i32) -> Option<&MeshTile> {
        self.tiles_at(x, y)
            .find(|tile| tile.payload().header.layer == layer)
    }

    /// All tiles stacked in the cell `(x, y)`.
    pub fn tiles_at(&self, x: i32, y: i32) -> impl Iterator<Item = &MeshTile> {
        self.pos_lookup
            .get(&(x, y))
            .into_iter()
            .flatten()
            .map(|&index| &self.tiles[index as usize])
    }

    /// The reference of the tile at `(x, y, layer)`, if any.
    pub fn tile_ref_at(&self, x: i32, y: i32, layer: i32) -> Option<TileRef> {
        self.tile_at(x, y, layer).map(|tile| self.tile_ref(tile))
    }

    /// Resolves a tile reference, validating the salt.
    pub fn tile_by_ref(&self, r: TileRef) -> Option<&MeshTile> {
        if r.is_none() {
            return None;
        }
        let tile = self.tiles.get(r.tile_index() as usize)?;
        (tile.salt == r.salt() && tile.data.is_some()).then_some(tile)
    }

    fn slot_indices_at(&self, x: i32, y: i32) -> Vec<u32> {
        self.pos_lookup.get(&(x, y)).cloned().unwrap_or_default()
    }

    fn neighbor_slot_indices(&self, x: i32, y: i32, side: u8) -> Vec<u32> {
        let (nx, ny) = match side {
            0 => (x + 1, y),
            1 => (x + 1, y + 1),
            2 => (x, y + 1),
            3 => (x - 1, y + 1),
            4 => (x - 1, y),
            5 => (x - 1, y - 1),
            6 => (x, y - 1),
            _ => (x + 1, y - 1),
        };
        self.slot_indices_at(nx, ny)
    }

    /// Adds a tile to the mesh, wiring links to every already-installed
    /// neighbor, and returns the new tile's reference.
    ///
    /// `restore_ref` restores a tile to the exact slot and salt it occupied
    /// before a [`Self::remove_tile`], so references captured before the
    /// removal become valid again.
    ///
    /// # Panics
    ///
    /// These indicate a logic bug in the caller rather than a runtime
    /// condition, and abort loudly:
    ///
    /// - a tile already occupies the payload's `(x, y, layer)` cell,
    /// - the tile pool is exhausted,
    /// - `restore_ref` addresses an out-of-range or occupied slot,
    /// - the payload's polygon count exceeds the polygon-index bit width.
    pub fn add_tile(&mut self, data: TileData, flags: u32, restore_ref: Option<TileRef>) -> TileRef {
        let header = data.header;
        assert!(
            data.polys.len() as u64 <= POLY_MASK + 1,
            "tile polygon count exceeds the polygon-index bit width"
        );
        // Make sure the location is free.
        assert!(
            self.tile_at(header.x, header.y, header.layer).is_none(),
            "tile already exists at ({}, {}, layer {})",
            header.x,
            header.y,
            header.layer
        );

        let index = match restore_ref {
            None => self.alloc_slot(),
            Some(r) => self.restore_slot(r),
        };

        let poly_count = data.polys.len();
        let tile = &mut self.tiles[index as usize];
        tile.data = Some(data);
        tile.flags = flags;
        tile.links.clear();
        tile.poly_links = vec![None; poly_count];

        // Insert tile into the position lookup.
        self.pos_lookup
            .entry((header.x, header.y))
            .or_default()
            .push(index);
        self.tile_count += 1;

        self.connect_int_links(index as usize);
        // Base off-mesh connections to their starting polygons and connect
        // connections inside the tile.
        self.base_off_mesh_links(index as usize);
        self.connect_ext_off_mesh_links(index as usize, index as usize, None);

        // Connect with layers in the current cell.
        for other in self.slot_indices_at(header.x, header.y) {
            if other == index {
                continue;
            }
            self.connect_ext_links(index as usize, other as usize, None);
            self.connect_ext_links(other as usize, index as usize, None);
            self.connect_ext_off_mesh_links(index as usize, other as usize, None);
            self.connect_ext_off_mesh_links(other as usize, index as usize, None);
        }

        // Connect with neighbour tiles.
        for side in 0..8 {
            for other in self.neighbor_slot_indices(header.x, header.y, side) {
                self.connect_ext_links(index as usize, other as usize, Some(side));
                self.connect_ext_links(other as usize, index as usize, Some(opposite_tile(side)));
                self.connect_ext_off_mesh_links(index as usize, other as usize, Some(side));
                self.connect_ext_off_mesh_links(
                    other as usize,
                    index as usize,
                    Some(opposite_tile(side)),
                );
            }
        }

        TileRef::encode(self.tiles[index as usize].salt, index)
    }

    /// Removes the tile addressed by `r`, unlinking it from every neighbor,
    /// bumping the slot's salt and returning the slot to the free list.
    ///
    /// The returned reference carries the slot's *new* salt; either it or the
    /// original `r` can be passed to [`Self::add_tile`] as `restore_ref`.
    ///
    /// # Panics
    ///
    /// Panics if the reference's tile index is out of range, which indicates
    /// a logic bug in the caller. A salt mismatch, in contrast, is reported
    /// as [`RemoveTileError::StaleReference`].
    pub fn remove_tile(&mut self, r: TileRef) -> Result<TileRef, RemoveTileError> {
        if r.is_none() {
            return Err(RemoveTileError::NullRef);
        }
        let index = r.tile_index();
        assert!(
            (index as usize) < self.tiles.len(),
            "tile index {index} out of range"
        );
        if self.tiles[index as usize].salt != r.salt() {
            return Err(RemoveTileError::StaleReference);
        }

        let header = self.tiles[index as usize].payload().header;

        // Remove the tile from the position lookup.
        let slots = self
            .pos_lookup
            .get_mut(&(header.x, header.y))
            .expect("occupied tile is indexed by position");
        slots.retain(|&slot| slot != index);
        if slots.is_empty() {
            self.pos_lookup.remove(&(header.x, header.y));
        }

        // Disconnect from other layers in the current cell.
        for other in self.slot_indices_at(header.x, header.y) {
            if other != index {
                self.unconnect_links(other as usize, index);
            }
        }
        // Disconnect from neighbour tiles.
        for side in 0..8 {
            for other in self.neighbor_slot_indices(header.x, header.y, side) {
                self.unconnect_links(other as usize, index);
            }
        }

        let tile = &mut self.tiles[index as usize];
        tile.data = None;
        tile.flags = 0;
        tile.links.clear();
        tile.poly_links.clear();

        // Update salt, salt should never be zero.
        tile.salt = (tile.salt + 1) & SALT_MASK as u32;
        if tile.salt == 0 {
            tile.salt = 1;
        }

        // Return the slot to the free list.
        tile.next_free = self.free_head;
        self.free_head = Some(index);
        self.tile_count -= 1;
        Ok(TileRef::encode(self.tiles[index as usize].salt, index))
    }

    /// Replaces the tile at the payload's cell, preserving the vacated
    /// slot's reference where possible so downstream references survive.
    pub fn update_tile(&mut self, data: TileData, flags: u32) -> TileRef {
        let header = data.header;
        let restore_ref = self.tile_ref_at(header.x, header.y, header.layer);
        if let Some(old) = restore_ref {
            self.remove_tile(old).expect("reference was just looked up");
        }
        self.add_tile(data, flags, restore_ref)
    }

    fn alloc_slot(&mut self) -> u32 {
        let Some(index) = self.free_head else {
            panic!("tile pool exhausted ({} slots)", self.tiles.len());
        };
        self.free_head = self.tiles[index as usize].next_free;
        self.tiles[index as usize].next_free = None;
        index
    }

    /// Unlinks the slot encoded in `r` from the free list and reinstates the
    /// encoded salt.
    fn restore_slot(&mut self, r: TileRef) -> u32 {
        let index = r.tile_index();
        assert!(
            (index as usize) < self.tiles.len(),
            "restore reference tile index {index} out of range"
        );
        // Find the requested slot in the free list and unlink it.
        let mut prev: Option<u32> = None;
        let mut cur = self.free_head;
        while let Some(slot) = cur {
            if slot == index {
                match prev {
                    None => self.free_head = self.tiles[slot as usize].next_free,
                    Some(p) => {
                        self.tiles[p as usize].next_free = self.tiles[slot as usize].next_free
                    }
                }
                self.tiles[slot as usize].next_free = None;
                self.tiles[slot as usize].salt = r.salt();
                return index;
            }
            prev = cur;
            cur = self.tiles[slot as usize].next_free;
        }
        panic!("restore reference does not address a vacant slot");
    }

    /// Runtime mutation of a polygon's traversal flags, one of the two
    /// sanctioned post-install mutations.
    pub fn set_poly_flags(&mut self, r: PolyRef, flags: PolyFlags) -> Result<(), InvalidPolyRef> {
        self.tile_and_poly_by_ref(r)?;
        let tile = &mut self.tiles[r.tile_index() as usize];
        let data = tile.data.as_mut().expect("reference was just validated");
        data.polys[r.poly_index() as usize].flags = flags;
        Ok(())
    }

    /// The polygon's traversal flags.
    pub fn poly_flags(&self, r: PolyRef) -> Result<PolyFlags, InvalidPolyRef> {
        self.tile_and_poly_by_ref(r).map(|(_, poly)| poly.flags)
    }

    /// Runtime mutation of a polygon's area id.
    pub fn set_poly_area(
        &mut self,
        r: PolyRef,
        area: crate::tile::AreaType,
    ) -> Result<(), InvalidPolyRef> {
        self.tile_and_poly_by_ref(r)?;
        let tile = &mut self.tiles[r.tile_index() as usize];
        let data = tile.data.as_mut().expect("reference was just validated");
        data.polys[r.poly_index() as usize].area = area;
        Ok(())
    }

    /// The polygon's area id.
    pub fn poly_area(&self, r: PolyRef) -> Result<crate::tile::AreaType, InvalidPolyRef> {
        self.tile_and_poly_by_ref(r).map(|(_, poly)| poly.area)
    }

    /// The endpoints of an off-mesh connection, ordered for an agent that
    /// entered the connection from `prev_ref`.
    ///
    /// Off-mesh connections are stored as 2-vertex polygons with a single
    /// edge; at least one vertex lies inside a normal polygon, and the
    /// connection is "entered" from that polygon.
    pub fn off_mesh_connection_poly_end_points(
        &self,
        prev_ref: PolyRef,
        poly_ref: PolyRef,
    ) -> Result<(Vec3A, Vec3A), InvalidPolyRef> {
        let (tile, poly) = self.tile_and_poly_by_ref(poly_ref)?;
        if poly.poly_type != PolyType::OffMeshConnection {
            return Err(InvalidPolyRef);
        }

        // Figure out which way to hand out the vertices.
        let (mut idx0, mut idx1) = (0, 1);
        // Find the link that points to the first vertex.
        for link in tile.links_of(poly_ref.poly_index() as usize) {
            if link.edge == 0 {
                if link.target != prev_ref {
                    (idx0, idx1) = (1, 0);
                }
                break;
            }
        }
        let data = tile.payload();
        Ok((
            data.vertices[poly.vertices[idx0] as usize],
            data.vertices[poly.vertices[idx1] as usize],
        ))
    }

    /// Collects references of the tile's polygons whose bounds overlap the
    /// query box, via the payload's BV tree when present.
    pub fn query_polygons_in_tile(&self, tile: &MeshTile, qmin: Vec3A, qmax: Vec3A) -> Vec<PolyRef> {
        let data = tile.payload();
        let base = self.poly_ref_base(tile);
        let mut out = Vec::new();
        if !data.bv_tree.is_empty() {
            let header = &data.header;
            let tb = header.aabb;
            let qfac = header.bv_quant_factor;
            // Clamp the query box to the world box and quantize it.
            let minx = qmin.x.clamp(tb.min.x, tb.max.x) - tb.min.x;
            let miny = qmin.y.clamp(tb.min.y, tb.max.y) - tb.min.y;
            let minz = qmin.z.clamp(tb.min.z, tb.max.z) - tb.min.z;
            let maxx = qmax.x.clamp(tb.min.x, tb.max.x) - tb.min.x;
            let maxy = qmax.y.clamp(tb.min.y, tb.max.y) - tb.min.y;
            let maxz = qmax.z.clamp(tb.min.z, tb.max.z) - tb.min.z;
            let bmin = IVec3::new(
                (qfac * minx) as i32 & 0x7ffffffe,
                (qfac * miny) as i32 & 0x7ffffffe,
                (qfac * minz) as i32 & 0x7ffffffe,
            );
            let bmax = IVec3::new(
                (qfac * maxx + 1.0) as i32 | 1,
                (qfac * maxy + 1.0) as i32 | 1,
                (qfac * maxz + 1.0) as i32 | 1,
            );

            // Traverse the tree.
            let mut node_index = 0;
            while node_index < data.bv_tree.len() {
                let node = &data.bv_tree[node_index];
                let overlap = overlap_quant_bounds(
                    bmin,
                    bmax,
                    node.bmin.as_ivec3(),
                    node.bmax.as_ivec3(),
                );
                let is_leaf = node.index >= 0;

                if is_leaf && overlap {
                    out.push(base.with_poly_index(node.index as u32));
                }

                if overlap || is_leaf {
                    node_index += 1;
                } else {
                    node_index += (-node.index) as usize;
                }
            }
        } else {
            for (ip, poly) in data.polys.iter().enumerate() {
                // Do not return off-mesh connection polygons.
                if poly.poly_type == PolyType::OffMeshConnection {
                    continue;
                }
                // Calc polygon bounds.
                let mut bmin = data.vertices[poly.vertices[0] as usize];
                let mut bmax = bmin;
                for &v in &poly.vertices[1..] {
                    let v = data.vertices[v as usize];
                    bmin = bmin.min(v);
                    bmax = bmax.max(v);
                }
                if qmin.cmple(bmax).all() && qmax.cmpge(bmin).all() {
                    out.push(base.with_poly_index(ip as u32));
                }
            }
        }
        out
    }

    /// The nearest polygon to `center` within the tile, searching a box of
    /// `half_extents`, and the closest point on it. A point vertically above
    /// a polygon within the tile's walkable-climb height is preferred over a
    /// straight-line-nearest boundary point elsewhere, to avoid snapping
    /// through thin walls.
    pub fn find_nearest_poly_in_tile(
        &self,
        tile: &MeshTile,
        center: Vec3A,
        half_extents: Vec3A,
    ) -> Option<(PolyRef, Vec3A)> {
        let data = tile.payload();
        let polys = self.query_polygons_in_tile(tile, center - half_extents, center + half_extents);

        let mut nearest = None;
        let mut nearest_distance_sqr = f32::MAX;
        for r in polys {
            let (closest, pos_over_poly) =
                closest_point_on_poly_in_tile(data, r.poly_index() as usize, center);
            // If a point is directly over a polygon and closer than climb
            // height, favor that instead of the straight line nearest point.
            let diff = center - closest;
            let d = if pos_over_poly {
                let dy = diff.y.abs() - data.header.walkable_climb;
                if dy > 0.0 { dy * dy } else { 0.0 }
            } else {
                diff.length_squared()
            };
            if d < nearest_distance_sqr {
                nearest_distance_sqr = d;
                nearest = Some((r, closest));
            }
        }
        nearest
    }

    /// The closest point on the polygon to `pos`, and whether `pos` lies
    /// vertically over the polygon.
    pub fn closest_point_on_poly(
        &self,
        r: PolyRef,
        pos: Vec3A,
    ) -> Result<(Vec3A, bool), InvalidPolyRef> {
        let (tile, _) = self.tile_and_poly_by_ref(r)?;
        Ok(closest_point_on_poly_in_tile(
            tile.payload(),
            r.poly_index() as usize,
            pos,
        ))
    }

    /// Builds internal polygon links for a tile.
    fn connect_int_links(&mut self, index: usize) {
        let tile = &mut self.tiles[index];
        let base = PolyRef::encode(tile.salt, tile.index, 0);
        let MeshTile {
            data,
            links,
            poly_links,
            ..
        } = tile;
        let data = data.as_ref().expect("tile slot is occupied");

        for (ip, poly) in data.polys.iter().enumerate() {
            poly_links[ip] = None;
            if poly.poly_type == PolyType::OffMeshConnection {
                continue;
            }
            // Build edge links backwards so that the links will be in the
            // linked list from lowest index to highest.
            for j in (0..poly.vert_count()).rev() {
                let nei = poly.neighbors[j];
                // Skip hard and non-internal edges.
                if nei == 0 || (nei & EXT_LINK) != 0 {
                    continue;
                }
                let link_index = links.alloc();
                let link = links.get_mut(link_index);
                link.target = base.with_poly_index((nei - 1) as u32);
                link.edge = j as u8;
                link.side = LINK_INTERNAL;
                link.bmin = 0;
                link.bmax = 0;
                // Add to the polygon's linked list.
                link.next = poly_links[ip];
                poly_links[ip] = Some(link_index);
            }
        }
    }

    /// Bases off-mesh connection start points onto their ground polygons and
    /// links them both ways.
    fn base_off_mesh_links(&mut self, index: usize) {
        let base = {
            let tile = &self.tiles[index];
            PolyRef::encode(tile.salt, tile.index, 0)
        };
        let con_count = self.tiles[index].payload().off_mesh_cons.len();

        for ci in 0..con_count {
            let (con, walkable_climb) = {
                let data = self.tiles[index].payload();
                (data.off_mesh_cons[ci], data.header.walkable_climb)
            };
            let half_extents = vec3a(con.radius, walkable_climb, con.radius);

            // Find the polygon to connect to.
            let Some((nearest_ref, nearest_pt)) =
                self.find_nearest_poly_in_tile(&self.tiles[index], con.start, half_extents)
            else {
                continue;
            };
            // find_nearest_poly may return too optimistic results; further
            // check to make sure the point is within the connection radius.
            if sqr(nearest_pt.x - con.start.x) + sqr(nearest_pt.z - con.start.z) > sqr(con.radius) {
                continue;
            }

            let tile = &mut self.tiles[index];
            let data = tile.data.as_mut().expect("tile slot is occupied");
            let con_poly_index = con.poly as usize;
            // Make sure the start location is on the mesh.
            let v0 = data.polys[con_poly_index].vertices[0] as usize;
            data.vertices[v0] = nearest_pt;

            // Link the off-mesh connection to its start polygon.
            let link_index = tile.push_link(con_poly_index);
            let link = tile.links.get_mut(link_index);
            link.target = nearest_ref;
            link.edge = 0;
            link.side = LINK_INTERNAL;
            link.bmin = 0;
            link.bmax = 0;

            // The start end-point always connects back to the off-mesh
            // connection.
            let land_poly_index = nearest_ref.poly_index() as usize;
            let link_index = tile.push_link(land_poly_index);
            let link = tile.links.get_mut(link_index);
            link.target = base.with_poly_index(con.poly as u32);
            link.edge = LINK_NO_EDGE;
            link.side = LINK_INTERNAL;
            link.bmin = 0;
            link.bmax = 0;
        }
    }

    /// Connects the off-mesh connections owned by `target` that land inside
    /// `tile`.
    fn connect_ext_off_mesh_links(&mut self, tile_index: usize, target_index: usize, side: Option<u8>) {
        // We are interested in connections which land from the target tile
        // into this tile.
        let opposite_side = match side {
            None => 0xff,
            Some(s) => opposite_tile(s),
        };
        let con_count = self.tiles[target_index].payload().off_mesh_cons.len();

        for ci in 0..con_count {
            let (con, target_base, start_connected, walkable_climb) = {
                let target = &self.tiles[target_index];
                let data = target.payload();
                let con = data.off_mesh_cons[ci];
                (
                    con,
                    PolyRef::encode(target.salt, target.index, 0),
                    target.poly_links[con.poly as usize].is_some(),
                    data.header.walkable_climb,
                )
            };
            if con.side != opposite_side {
                continue;
            }
            // Skip off-mesh connections whose start location could not be
            // connected at all.
            if !start_connected {
                continue;
            }

            let half_extents = vec3a(con.radius, walkable_climb, con.radius);
            // Find the polygon to land on.
            let Some((nearest_ref, nearest_pt)) =
                self.find_nearest_poly_in_tile(&self.tiles[tile_index], con.end, half_extents)
            else {
                continue;
            };
            if sqr(nearest_pt.x - con.end.x) + sqr(nearest_pt.z - con.end.z) > sqr(con.radius) {
                continue;
            }

            // Make sure the landing location is on the current mesh.
            {
                let target = &mut self.tiles[target_index];
                let data = target.data.as_mut().expect("tile slot is occupied");
                let v1 = data.polys[con.poly as usize].vertices[1] as usize;
                data.vertices[v1] = nearest_pt;
            }

            // Link the off-mesh connection to the landing polygon.
            {
                let target = &mut self.tiles[target_index];
                let link_index = target.push_link(con.poly as usize);
                let link = target.links.get_mut(link_index);
                link.target = nearest_ref;
                link.edge = 1;
                link.side = opposite_side;
                link.bmin = 0;
                link.bmax = 0;
            }

            // Link the landing polygon back to the off-mesh connection.
            if con.bidirectional {
                let tile = &mut self.tiles[tile_index];
                let land_poly_index = nearest_ref.poly_index() as usize;
                let link_index = tile.push_link(land_poly_index);
                let link = tile.links.get_mut(link_index);
                link.target = target_base.with_poly_index(con.poly as u32);
                link.edge = LINK_NO_EDGE;
                link.side = side.unwrap_or(LINK_INTERNAL);
                link.bmin = 0;
                link.bmax = 0;
            }
        }
    }

    /// Builds border links from `tile` to `target` for all portal edges on
    /// `side` (or on every side when `None`).
    fn connect_ext_links(&mut self, tile_index: usize, target_index: usize, side: Option<u8>) {
        debug_assert_ne!(tile_index, target_index);
        let (tile, target) = two_tiles_mut(&mut self.tiles, tile_index, target_index);
        let target_base = PolyRef::encode(target.salt, target.index, 0);
        let target_data = target.payload();
        let MeshTile {
            data,
            links,
            poly_links,
            ..
        } = tile;
        let data = data.as_ref().expect("tile slot is occupied");

        // Connect border links.
        for (ip, poly) in data.polys.iter().enumerate() {
            let nv = poly.vert_count();
            for j in 0..nv {
                // Skip non-portal edges.
                if (poly.neighbors[j] & EXT_LINK) == 0 {
                    continue;
                }
                let dir = (poly.neighbors[j] & 0xff) as u8;
                if let Some(s) = side
                    && dir != s
                {
                    continue;
                }

                let va = data.vertices[poly.vertices[j] as usize];
                let vb = data.vertices[poly.vertices[(j + 1) % nv] as usize];
                let connections = find_connecting_polys(
                    va,
                    vb,
                    target_base,
                    target_data,
                    opposite_tile(dir),
                );
                for (nei_ref, span_min, span_max) in connections {
                    let link_index = links.alloc();
                    let link = links.get_mut(link_index);
                    link.target = nei_ref;
                    link.edge = j as u8;
                    link.side = dir;
                    link.next = poly_links[ip];
                    poly_links[ip] = Some(link_index);

                    // Compress portal limits to a byte value.
                    let (lo, hi) = match dir {
                        0 | 4 => (
                            (span_min - va.z) / (vb.z - va.z),
                            (span_max - va.z) / (vb.z - va.z),
                        ),
                        2 | 6 => (
                            (span_min - va.x) / (vb.x - va.x),
                            (span_max - va.x) / (vb.x - va.x),
                        ),
                        _ => (0.0, 1.0),
                    };
                    let (lo, hi) = if lo > hi { (hi, lo) } else { (lo, hi) };
                    link.bmin = (lo.clamp(0.0, 1.0) * 255.0).round() as u8;
                    link.bmax = (hi.clamp(0.0, 1.0) * 255.0).round() as u8;
                }
            }
        }
    }

    /// Removes every link in `tile` that targets the slot `target_index`.
    fn unconnect_links(&mut self, tile_index: usize, target_index: u32) {
        let tile = &mut self.tiles[tile_index];
        if tile.data.is_none() {
            return;
        }
        for ip in 0..tile.poly_links.len() {
            let mut cur = tile.poly_links[ip];
            let mut prev: Option<u32> = None;
            while let Some(link_index) = cur {
                let link = tile.links.get(link_index);
                let next = link.next;
                if link.target.tile_index() == target_index {
                    // Remove the link.
                    match prev {
                        None => tile.poly_links[ip] = next,
                        Some(p) => tile.links.get_mut(p).next = next,
                    }
                    tile.links.free(link_index);
                } else {
                    prev = cur;
                }
                cur = next;
            }
        }
    }
}

/// Mutably borrows two distinct tile slots at once.
fn two_tiles_mut(tiles: &mut [MeshTile], a: usize, b: usize) -> (&mut MeshTile, &MeshTile) {
    assert_ne!(a, b);
    if a < b {
        let (head, tail) = tiles.split_at_mut(b);
        (&mut head[a], &tail[0])
    } else {
        let (head, tail) = tiles.split_at_mut(a);
        (&mut tail[0], &head[b])
    }
}

/// Scans the target tile's boundary edges tagged with `side` for segments
/// that overlap the portal edge `(va, vb)`, returning the connected polygons
/// and the overlapping interval of each.
fn find_connecting_polys(
    va: Vec3A,
    vb: Vec3A,
    target_base: PolyRef,
    target: &TileData,
    side: u8,
) -> Vec<(PolyRef, f32, f32)> {
    let (amin, amax) = calc_slab_end_points(va, vb, side);
    let apos = slab_coord(va, side);

    let mut connections = Vec::new();
    let tag = EXT_LINK | side as u16;

    for (ip, poly) in target.polys.iter().enumerate() {
        let nv = poly.vert_count();
        for j in 0..nv {
            // Skip edges which do not point to the right side.
            if poly.neighbors[j] != tag {
                continue;
            }
            let vc = target.vertices[poly.vertices[j] as usize];
            let vd = target.vertices[poly.vertices[(j + 1) % nv] as usize];
            let bpos = slab_coord(vc, side);
            // Segments are not close enough.
            if (apos - bpos).abs() > 0.01 {
                continue;
            }

            // Check if the segments touch.
            let (bmin, bmax) = calc_slab_end_points(vc, vd, side);
            if !overlap_slabs(amin, amax, bmin, bmax, 0.01, target.header.walkable_climb) {
                continue;
            }

            connections.push((
                target_base.with_poly_index(ip as u32),
                amin.0.max(bmin.0),
                amax.0.min(bmax.0),
            ));
            break;
        }
    }
    connections
}

/// The coordinate of a boundary vertex along the axis perpendicular to
/// `side`.
fn slab_coord(v: Vec3A, side: u8) -> f32 {
    match side {
        0 | 4 => v.x,
        2 | 6 => v.z,
        _ => 0.0,
    }
}

/// Projects a boundary edge into `(coordinate along the border, height)`
/// pairs ordered by the border coordinate.
fn calc_slab_end_points(va: Vec3A, vb: Vec3A, side: u8) -> ((f32, f32), (f32, f32)) {
    match side {
        0 | 4 => {
            if va.z < vb.z {
                ((va.z, va.y), (vb.z, vb.y))
            } else {
                ((vb.z, vb.y), (va.z, va.y))
            }
        }
        _ => {
            if va.x < vb.x {
                ((va.x, va.y), (vb.x, vb.y))
            } else {
                ((vb.x, vb.y), (va.x, va.y))
            }
        }
    }
}

/// 1-D overlap test of two border edges' position-and-height ranges.
/// `px` shrinks the segments a little so that slabs which only touch at end
/// points are not connected; `py` is the walkable-climb tolerance.
fn overlap_slabs(
    amin: (f32, f32),
    amax: (f32, f32),
    bmin: (f32, f32),
    bmax: (f32, f32),
    px: f32,
    py: f32,
) -> bool {
    // Check for horizontal overlap.
    let min_x = (amin.0 + px).max(bmin.0 + px);
    let max_x = (amax.0 - px).min(bmax.0 - px);
    if min_x > max_x {
        return false;
    }

    // Check vertical overlap along the slab.
    let ad = (amax.1 - amin.1) / (amax.0 - amin.0);
    let ak = amin.1 - ad * amin.0;
    let bd = (bmax.1 - bmin.1) / (bmax.0 - bmin.0);
    let bk = bmin.1 - bd * bmin.0;
    let dmin = (bd * min_x + bk) - (ad * min_x + ak);
    let dmax = (bd * max_x + bk) - (ad * max_x + ak);

    // Crossing segments always overlap.
    if dmin * dmax < 0.0 {
        return true;
    }

    // Check for overlap at endpoints.
    let threshold = sqr(py * 2.0);
    dmin * dmin <= threshold || dmax * dmax <= threshold
}

/// The height of the polygon surface at `pos`, interpolated from the detail
/// sub-mesh when present, else from the polygon's vertex fan. `None` when
/// `pos` is not over the polygon or the polygon is an off-mesh connection.
pub(crate) fn poly_height_in_tile(data: &TileData, poly_index: usize, pos: Vec3A) -> Option<f32> {
    let poly = &data.polys[poly_index];
    // Off-mesh connections do not have detail polys and getting height over
    // them does not make sense.
    if poly.poly_type == PolyType::OffMeshConnection {
        return None;
    }

    let mut verts = [Vec3A::ZERO; crate::tile::VERTS_PER_POLYGON];
    let nv = poly.vert_count();
    for (i, vert) in verts[..nv].iter_mut().enumerate() {
        *vert = data.vertices[poly.vertices[i] as usize];
    }
    if !point_in_polygon(pos, &verts[..nv]) {
        return None;
    }

    // Find the height at the location.
    if !data.detail_meshes.is_empty() {
        let pd = &data.detail_meshes[poly_index];
        for tri in 0..pd.tri_count as usize {
            let v = data.detail_triangle_verts(poly, pd, tri);
            if let Some(h) = closest_height_point_triangle(pos, v[0], v[1], v[2]) {
                return Some(h);
            }
        }
    } else {
        for j in 1..nv - 1 {
            if let Some(h) =
                closest_height_point_triangle(pos, verts[0], verts[j], verts[j + 1])
            {
                return Some(h);
            }
        }
    }

    // If all triangle checks failed above (can happen with degenerate
    // triangles or larger floating point values) the point is on an edge, so
    // just select the closest. This should almost never happen, so the extra
    // iteration here is fine.
    Some(closest_point_on_detail_edges(data, poly_index, pos, false).y)
}

/// The closest point to `pos` on the polygon's detail edges (or boundary
/// edges when the payload has no detail mesh). With `only_boundary`, interior
/// detail edges are ignored.
pub(crate) fn closest_point_on_detail_edges(
    data: &TileData,
    poly_index: usize,
    pos: Vec3A,
    only_boundary: bool,
) -> Vec3A {
    let poly = &data.polys[poly_index];
    let mut dmin = f32::MAX;
    let mut tmin = 0.0;
    let mut pmin = Vec3A::ZERO;
    let mut pmax = Vec3A::ZERO;

    if !data.detail_meshes.is_empty() {
        const ANY_BOUNDARY_EDGE: u8 = DETAIL_EDGE_BOUNDARY
            | (DETAIL_EDGE_BOUNDARY << 2)
            | (DETAIL_EDGE_BOUNDARY << 4);
        let pd = &data.detail_meshes[poly_index];
        for tri in 0..pd.tri_count as usize {
            let t = data.detail_triangles[pd.tri_base as usize + tri];
            if only_boundary && (t[3] & ANY_BOUNDARY_EDGE) == 0 {
                continue;
            }
            let v = data.detail_triangle_verts(poly, pd, tri);
            let mut j = 2;
            for k in 0..3 {
                if (detail_tri_edge_flags(t[3], j) & DETAIL_EDGE_BOUNDARY) == 0
                    && (only_boundary || t[j] < t[k])
                {
                    // Only looking at boundary edges and this is internal, or
                    // this is an inner edge that we will see again or have
                    // already seen.
                    j = k;
                    continue;
                }
                let (d, t_seg) = distance_pt_seg_sqr_xz(pos, v[j], v[k]);
                if d < dmin {
                    dmin = d;
                    tmin = t_seg;
                    pmin = v[j];
                    pmax = v[k];
                }
                j = k;
            }
        }
    } else {
        let nv = poly.vert_count();
        for j in 0..nv {
            let k = (j + 1) % nv;
            let v0 = data.vertices[poly.vertices[j] as usize];
            let v1 = data.vertices[poly.vertices[k] as usize];
            let (d, t_seg) = distance_pt_seg_sqr_xz(pos, v0, v1);
            if d < dmin {
                dmin = d;
                tmin = t_seg;
                pmin = v0;
                pmax = v1;
            }
        }
    }

    pmin.lerp(pmax, tmin)
}

/// The closest point on the polygon to `pos` and whether `pos` lies
/// vertically over the polygon.
pub(crate) fn closest_point_on_poly_in_tile(
    data: &TileData,
    poly_index: usize,
    pos: Vec3A,
) -> (Vec3A, bool) {
    if let Some(h) = poly_height_in_tile(data, poly_index, pos) {
        let mut closest = pos;
        closest.y = h;
        return (closest, true);
    }

    let poly = &data.polys[poly_index];
    // Off-mesh connections don't have detail polygons.
    if poly.poly_type == PolyType::OffMeshConnection {
        let v0 = data.vertices[poly.vertices[0] as usize];
        let v1 = data.vertices[poly.vertices[1] as usize];
        let (_, t) = distance_pt_seg_sqr_xz(pos, v0, v1);
        return (v0.lerp(v1, t), false);
    }
    // Outside a poly that is not an off-mesh connection.
    (
        closest_point_on_detail_edges(data, poly_index, pos, true),
        false,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Aabb3d;
    use crate::tile::{AreaType, TileHeader};
    use glam::vec3a;

    /// A 1x1 tile at grid cell (x, y) with a single unit-square polygon.
    fn square_tile(x: i32, y: i32) -> TileData {
        let origin = vec3a(x as f32, 0.0, y as f32);
        TileData {
            header: TileHeader {
                x,
                y,
                layer: 0,
                aabb: Aabb3d::new(origin, origin + vec3a(1.0, 0.5, 1.0)),
                walkable_height: 2.0,
                walkable_radius: 0.2,
                walkable_climb: 0.5,
                bv_quant_factor: 0.0,
            },
            vertices: vec![
                origin,
                origin + vec3a(0.0, 0.0, 1.0),
                origin + vec3a(1.0, 0.0, 1.0),
                origin + vec3a(1.0, 0.0, 0.0),
            ],
            polys: vec![Poly {
                vertices: vec![0, 1, 2, 3],
                // Left edge borders side 4, right edge side 0; top and
                // bottom are portals on sides 2 and 6.
                neighbors: vec![EXT_LINK | 4, EXT_LINK | 2, EXT_LINK | 0, EXT_LINK | 6],
                flags: PolyFlags::WALK,
                area: AreaType(0),
                poly_type: PolyType::Ground,
            }],
            ..Default::default()
        }
    }

    fn params() -> NavMeshParams {
        NavMeshParams {
            origin: Vec3A::ZERO,
            tile_width: 1.0,
            tile_height: 1.0,
            max_tiles: 8,
        }
    }

    #[test]
    fn added_tile_is_resolvable_by_position_and_ref() {
        let mut mesh = NavMesh::new(params());
        let tile_ref = mesh.add_tile(square_tile(0, 0), 0, None);
        assert_eq!(mesh.tile_count(), 1);
        assert!(mesh.tile_at(0, 0, 0).is_some());
        assert_eq!(mesh.tile_ref_at(0, 0, 0), Some(tile_ref));
        assert!(mesh.is_valid_poly_ref(tile_ref.base_poly_ref()));
    }

    #[test]
    fn removing_a_tile_invalidates_its_references() {
        let mut mesh = NavMesh::new(params());
        let tile_ref = mesh.add_tile(square_tile(0, 0), 0, None);
        let poly = tile_ref.base_poly_ref();
        assert!(mesh.is_valid_poly_ref(poly));

        mesh.remove_tile(tile_ref).unwrap();
        assert!(!mesh.is_valid_poly_ref(poly));
        assert_eq!(mesh.tile_count(), 0);
        // A second removal through the stale reference is reported, not
        // fatal.
        assert_eq!(
            mesh.remove_tile(tile_ref),
            Err(RemoveTileError::StaleReference)
        );
    }

    #[test]
    fn restore_ref_reinstates_the_original_reference() {
        let mut mesh = NavMesh::new(params());
        let original = mesh.add_tile(square_tile(0, 0), 0, None);
        mesh.remove_tile(original).unwrap();

        let restored = mesh.add_tile(square_tile(0, 0), 0, Some(original));
        assert_eq!(restored, original);
        assert!(mesh.is_valid_poly_ref(original.base_poly_ref()));
    }

    #[test]
    fn fresh_add_after_removal_gets_a_new_salt() {
        let mut mesh = NavMesh::new(params());
        let original = mesh.add_tile(square_tile(0, 0), 0, None);
        mesh.remove_tile(original).unwrap();

        let replacement = mesh.add_tile(square_tile(0, 0), 0, None);
        assert_ne!(replacement, original);
        assert!(!mesh.is_valid_poly_ref(original.base_poly_ref()));
        assert!(mesh.is_valid_poly_ref(replacement.base_poly_ref()));
    }

    #[test]
    fn adjacent_tiles_are_linked_across_the_border() {
        let mut mesh = NavMesh::new(params());
        let a = mesh.add_tile(square_tile(0, 0), 0, None);
        let b = mesh.add_tile(square_tile(1, 0), 0, None);

        let (tile_a, _) = mesh.tile_and_poly_by_ref(a.base_poly_ref()).unwrap();
        let links: Vec<_> = tile_a.links_of(0).collect();
        assert!(
            links.iter().any(|l| l.target == b.base_poly_ref()),
            "tile a should link to tile b"
        );
        // The shared edge covers the full border.
        let link = links
            .iter()
            .find(|l| l.target == b.base_poly_ref())
            .unwrap();
        assert_eq!((link.bmin, link.bmax), (0, 255));

        let (tile_b, _) = mesh.tile_and_poly_by_ref(b.base_poly_ref()).unwrap();
        assert!(
            tile_b.links_of(0).any(|l| l.target == a.base_poly_ref()),
            "tile b should link back to tile a"
        );
    }

    #[test]
    fn removing_a_tile_unlinks_its_neighbors() {
        let mut mesh = NavMesh::new(params());
        let a = mesh.add_tile(square_tile(0, 0), 0, None);
        let b = mesh.add_tile(square_tile(1, 0), 0, None);

        mesh.remove_tile(b).unwrap();
        let (tile_a, _) = mesh.tile_and_poly_by_ref(a.base_poly_ref()).unwrap();
        assert_eq!(tile_a.links_of(0).count(), 0);
    }

    #[test]
    fn update_tile_preserves_the_reference() {
        let mut mesh = NavMesh::new(params());
        let original = mesh.add_tile(square_tile(0, 0), 0, None);
        let updated = mesh.update_tile(square_tile(0, 0), 0);
        assert_eq!(updated, original);
    }

    #[test]
    fn flag_and_area_accessors_validate_references() {
        let mut mesh = NavMesh::new(params());
        let tile_ref = mesh.add_tile(square_tile(0, 0), 0, None);
        let poly = tile_ref.base_poly_ref();

        mesh.set_poly_flags(poly, PolyFlags::DOOR).unwrap();
        assert_eq!(mesh.poly_flags(poly), Ok(PolyFlags::DOOR));
        mesh.set_poly_area(poly, AreaType(7)).unwrap();
        assert_eq!(mesh.poly_area(poly), Ok(AreaType(7)));

        mesh.remove_tile(tile_ref).unwrap();
        assert_eq!(mesh.set_poly_flags(poly, PolyFlags::WALK), Err(InvalidPolyRef));
        assert_eq!(mesh.poly_area(poly), Err(InvalidPolyRef));
    }

    #[test]
    #[should_panic(expected = "tile already exists")]
    fn adding_a_tile_to_an_occupied_cell_aborts() {
        let mut mesh = NavMesh::new(params());
        mesh.add_tile(square_tile(0, 0), 0, None);
        mesh.add_tile(square_tile(0, 0), 0, None);
    }

    #[test]
    #[should_panic(expected = "tile pool exhausted")]
    fn exhausting_the_tile_pool_aborts() {
        let mut mesh = NavMesh::new(NavMeshParams {
            max_tiles: 1,
            ..params()
        });
        mesh.add_tile(square_tile(0, 0), 0, None);
        mesh.add_tile(square_tile(1, 0), 0, None);
    }

    #[test]
    fn calc_tile_loc_floors_toward_the_origin() {
        let mesh = NavMesh::new(params());
        assert_eq!(mesh.calc_tile_loc(vec3a(0.5, 0.0, 0.5)), (0, 0));
        assert_eq!(mesh.calc_tile_loc(vec3a(-0.5, 0.0, 2.5)), (-1, 2));
    }
}
