//! Hand-built tile payloads shared by the unit tests.

use glam::{Vec3A, vec3a};

use crate::{
    math::Aabb3d,
    tile::{AreaType, Poly, PolyFlags, PolyType, TileData, TileHeader},
};

/// A single tile at grid cell (0, 0) holding `n` unit-square ground polygons
/// in a row along +x, each sharing a full edge with its neighbor. Polygon `i`
/// covers `[i, i + 1] x [0, 1]` on the xz-plane at height 0.
pub(crate) fn row_tile(n: usize) -> TileData {
    // Vertex (x, z) lives at index x * 2 + z.
    let vertices = (0..=n)
        .flat_map(|x| [vec3a(x as f32, 0.0, 0.0), vec3a(x as f32, 0.0, 1.0)])
        .collect();
    let polys = (0..n)
        .map(|i| {
            let i = i as u16;
            Poly {
                vertices: vec![2 * i, 2 * i + 1, 2 * i + 3, 2 * i + 2],
                neighbors: vec![
                    // West edge: previous polygon, or a solid border.
                    i,
                    0,
                    // East edge: next polygon (1-based), or a solid border.
                    if (i as usize) < n - 1 { i + 2 } else { 0 },
                    0,
                ],
                flags: PolyFlags::WALK,
                area: AreaType(0),
                poly_type: PolyType::Ground,
            }
        })
        .collect();
    TileData {
        header: TileHeader {
            x: 0,
            y: 0,
            layer: 0,
            aabb: Aabb3d::new(Vec3A::ZERO, vec3a(n as f32, 1.0, 1.0)),
            walkable_height: 2.0,
            walkable_radius: 0.2,
            walkable_climb: 0.5,
            bv_quant_factor: 0.0,
        },
        vertices,
        polys,
        ..Default::default()
    }
}

/// The center of polygon `i` of a [`row_tile`].
pub(crate) fn row_center(i: usize) -> Vec3A {
    vec3a(i as f32 + 0.5, 0.0, 0.5)
}
