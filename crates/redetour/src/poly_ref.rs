//! Generational references into the tile store.
//!
//! A [`PolyRef`] packs `(salt, tile index, polygon index)` into a single
//! 64-bit value. The salt is a generation counter bumped every time a tile
//! slot is vacated, so references captured before a tile reload are provably
//! stale without ever dereferencing freed data.

/// Number of salt bits in a packed reference.
pub(crate) const SALT_BITS: u32 = 16;
/// Number of tile-index bits in a packed reference.
pub(crate) const TILE_BITS: u32 = 28;
/// Number of polygon-index bits in a packed reference.
pub(crate) const POLY_BITS: u32 = 20;

pub(crate) const SALT_MASK: u64 = (1 << SALT_BITS) - 1;
pub(crate) const TILE_MASK: u64 = (1 << TILE_BITS) - 1;
pub(crate) const POLY_MASK: u64 = (1 << POLY_BITS) - 1;

/// A reference to a polygon within a [`NavMesh`](crate::NavMesh).
///
/// The zero value never refers to a polygon and doubles as the null
/// reference. A non-null reference is only usable while the tile slot it
/// addresses still holds the same salt; see
/// [`NavMesh::is_valid_poly_ref`](crate::NavMesh::is_valid_poly_ref).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct PolyRef(u64);

impl PolyRef {
    /// The null reference.
    pub const NONE: Self = Self(0);

    /// Packs a reference from its components.
    ///
    /// Values beyond the component bit widths are masked off.
    #[inline]
    pub fn encode(salt: u32, tile: u32, poly: u32) -> Self {
        Self(
            ((salt as u64 & SALT_MASK) << (POLY_BITS + TILE_BITS))
                | ((tile as u64 & TILE_MASK) << POLY_BITS)
                | (poly as u64 & POLY_MASK),
        )
    }

    /// Unpacks the reference into `(salt, tile index, polygon index)`.
    #[inline]
    pub fn decode(self) -> (u32, u32, u32) {
        (self.salt(), self.tile_index(), self.poly_index())
    }

    /// The generation salt of the addressed tile slot.
    #[inline]
    pub fn salt(self) -> u32 {
        ((self.0 >> (POLY_BITS + TILE_BITS)) & SALT_MASK) as u32
    }

    /// The index of the addressed tile slot.
    #[inline]
    pub fn tile_index(self) -> u32 {
        ((self.0 >> POLY_BITS) & TILE_MASK) as u32
    }

    /// The index of the polygon within its tile.
    #[inline]
    pub fn poly_index(self) -> u32 {
        (self.0 & POLY_MASK) as u32
    }

    /// Returns a reference to polygon `poly` of the same tile.
    ///
    /// Meant to be used on a tile's base reference (polygon index 0).
    #[inline]
    pub fn with_poly_index(self, poly: u32) -> Self {
        Self((self.0 & !POLY_MASK) | (poly as u64 & POLY_MASK))
    }

    /// Whether this is the null reference.
    #[inline]
    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    /// The raw packed value.
    #[inline]
    pub fn bits(self) -> u64 {
        self.0
    }

    /// Reconstructs a reference from a raw packed value.
    #[inline]
    pub fn from_bits(bits: u64) -> Self {
        Self(bits)
    }
}

/// A reference to a tile slot, i.e. a [`PolyRef`] with polygon index zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct TileRef(u64);

impl TileRef {
    /// The null reference.
    pub const NONE: Self = Self(0);

    /// Packs a tile reference from a slot's salt and index.
    #[inline]
    pub fn encode(salt: u32, tile: u32) -> Self {
        Self(PolyRef::encode(salt, tile, 0).0)
    }

    /// The generation salt of the addressed tile slot.
    #[inline]
    pub fn salt(self) -> u32 {
        PolyRef(self.0).salt()
    }

    /// The index of the addressed tile slot.
    #[inline]
    pub fn tile_index(self) -> u32 {
        PolyRef(self.0).tile_index()
    }

    /// Whether this is the null reference.
    #[inline]
    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    /// The tile's base polygon reference (polygon index 0).
    #[inline]
    pub fn base_poly_ref(self) -> PolyRef {
        PolyRef(self.0)
    }
}

impl From<TileRef> for PolyRef {
    #[inline]
    fn from(tile_ref: TileRef) -> Self {
        tile_ref.base_poly_ref()
    }
}
