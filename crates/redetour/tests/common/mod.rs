//! Hand-built tile payloads for the integration tests, standing in for the
//! external mesh-generation pipeline.

use glam::{Vec3A, vec3a};
use redetour::{
    Aabb3d, AreaType, EXT_LINK, NavMesh, NavMeshParams, OffMeshConnection, Poly, PolyFlags,
    PolyType, TileData, TileHeader,
};

/// An empty mesh over a unit tile grid.
pub fn unit_grid_mesh(tile_size: f32, max_tiles: usize) -> NavMesh {
    NavMesh::new(NavMeshParams {
        origin: Vec3A::ZERO,
        tile_width: tile_size,
        tile_height: tile_size,
        max_tiles,
    })
}

/// A 1x1 tile at grid cell `(x, y)` holding a single unit-square walkable
/// polygon whose edges are tagged as tile-border portals on all four sides.
pub fn square_tile(x: i32, y: i32) -> TileData {
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
            neighbors: vec![EXT_LINK | 4, EXT_LINK | 2, EXT_LINK | 0, EXT_LINK | 6],
            flags: PolyFlags::WALK,
            area: AreaType(0),
            poly_type: PolyType::Ground,
        }],
        ..Default::default()
    }
}

/// A single tile holding `n` unit squares in a row along +x; polygon `i`
/// covers `[i, i + 1] x [0, 1]`.
pub fn row_tile(n: usize) -> TileData {
    let vertices = (0..=n)
        .flat_map(|x| [vec3a(x as f32, 0.0, 0.0), vec3a(x as f32, 0.0, 1.0)])
        .collect();
    let polys = (0..n)
        .map(|i| {
            let i = i as u16;
            Poly {
                vertices: vec![2 * i, 2 * i + 1, 2 * i + 3, 2 * i + 2],
                neighbors: vec![i, 0, if (i as usize) < n - 1 { i + 2 } else { 0 }, 0],
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

/// The center of square `i` of a [`row_tile`].
pub fn row_center(i: usize) -> Vec3A {
    vec3a(i as f32 + 0.5, 0.0, 0.5)
}

/// Where the jump of a [`row_tile_with_jump`] takes off.
pub fn jump_start() -> Vec3A {
    vec3a(0.75, 0.0, 0.5)
}

/// Where the jump of a [`row_tile_with_jump`] over `n` squares lands.
pub fn jump_end(n: usize) -> Vec3A {
    vec3a(n as f32 - 0.75, 0.0, 0.5)
}

/// A [`row_tile`] with an off-mesh connection (area id `jump_area`) from the
/// first to the last square, appended as polygon `n`.
pub fn row_tile_with_jump(n: usize, jump_area: u8, bidirectional: bool) -> TileData {
    let mut data = row_tile(n);
    let start = jump_start();
    let end = jump_end(n);
    let v = data.vertices.len() as u16;
    data.vertices.push(start);
    data.vertices.push(end);
    data.polys.push(Poly {
        vertices: vec![v, v + 1],
        neighbors: vec![0, 0],
        flags: PolyFlags::JUMP,
        area: AreaType(jump_area),
        poly_type: PolyType::OffMeshConnection,
    });
    data.off_mesh_cons.push(OffMeshConnection {
        start,
        end,
        radius: 0.25,
        poly: n as u16,
        side: 0xff,
        bidirectional,
    });
    data
}
