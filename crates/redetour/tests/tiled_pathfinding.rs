//! End-to-end scenarios over hand-built tiles: tile streaming, cross-tile
//! pathfinding, off-mesh connections and straight-path construction working
//! together.

mod common;

use common::{jump_end, jump_start, row_center, row_tile, row_tile_with_jump, square_tile, unit_grid_mesh};
use glam::vec3a;
use redetour::{
    DefaultQueryFilter, DefaultQueryHeuristic, FindPathOptions, NavMesh, NavMeshQuery, PolyFlags,
    PolyRef, RaycastOptions, SlicedPathState, StraightPathFlags, StraightPathOptions,
};

#[test]
fn four_squares_in_a_row_walk_in_order() {
    let (mesh, tile_ref) = NavMesh::single_tile(row_tile(4), 0);
    let mut query = NavMeshQuery::new(&mesh);
    let filter = DefaultQueryFilter::default();
    let heuristic = DefaultQueryHeuristic::default();
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
fn references_die_with_their_tile_and_revive_with_restore() {
    let mut mesh = unit_grid_mesh(4.0, 2);
    let tile_ref = mesh.add_tile(row_tile(4), 0, None);
    let poly0 = tile_ref.base_poly_ref();
    assert!(mesh.is_valid_poly_ref(poly0));

    mesh.remove_tile(tile_ref).unwrap();
    assert!(!mesh.is_valid_poly_ref(poly0));

    // A fresh add at the same cell gets a fresh salt: old refs stay dead.
    let replacement = mesh.add_tile(row_tile(4), 0, None);
    assert!(!mesh.is_valid_poly_ref(poly0));
    assert_ne!(replacement, tile_ref);

    // Reloading with the original reference revives it.
    mesh.remove_tile(replacement).unwrap();
    let restored = mesh.add_tile(row_tile(4), 0, Some(tile_ref));
    assert_eq!(restored, tile_ref);
    assert!(mesh.is_valid_poly_ref(poly0));
}

#[test]
fn paths_cross_tile_borders() {
    let mut mesh = unit_grid_mesh(1.0, 8);
    let a = mesh.add_tile(square_tile(0, 0), 0, None);
    let b = mesh.add_tile(square_tile(1, 0), 0, None);
    let c = mesh.add_tile(square_tile(2, 0), 0, None);

    let mut query = NavMeshQuery::new(&mesh);
    let filter = DefaultQueryFilter::default();
    let heuristic = DefaultQueryHeuristic::default();

    let result = query
        .find_path(
            a.base_poly_ref(),
            c.base_poly_ref(),
            vec3a(0.5, 0.0, 0.5),
            vec3a(2.5, 0.0, 0.5),
            &filter,
            &heuristic,
            FindPathOptions::empty(),
            None,
        )
        .unwrap();
    assert!(!result.partial);
    assert_eq!(
        result.path,
        vec![a.base_poly_ref(), b.base_poly_ref(), c.base_poly_ref()]
    );

    // The same corridor pulls into a straight two-point path.
    let points = query
        .find_straight_path(
            vec3a(0.5, 0.0, 0.5),
            vec3a(2.5, 0.0, 0.5),
            &result.path,
            16,
            StraightPathOptions::empty(),
        )
        .unwrap();
    assert_eq!(points.len(), 2);
    assert_eq!(points[0].flags, StraightPathFlags::START);
    assert_eq!(points[1].flags, StraightPathFlags::END);

    // And a raycast down the corridor reaches the far tile unobstructed.
    let hit = query
        .raycast(
            a.base_poly_ref(),
            vec3a(0.5, 0.0, 0.5),
            vec3a(2.5, 0.0, 0.5),
            &filter,
            RaycastOptions::empty(),
            None,
        )
        .unwrap();
    assert_eq!(hit.t, f32::INFINITY);
    assert_eq!(
        hit.path,
        vec![a.base_poly_ref(), b.base_poly_ref(), c.base_poly_ref()]
    );
}

#[test]
fn removing_a_middle_tile_splits_the_mesh() {
    let mut mesh = unit_grid_mesh(1.0, 8);
    let a = mesh.add_tile(square_tile(0, 0), 0, None);
    let b = mesh.add_tile(square_tile(1, 0), 0, None);
    let c = mesh.add_tile(square_tile(2, 0), 0, None);
    mesh.remove_tile(b).unwrap();

    let mut query = NavMeshQuery::new(&mesh);
    let filter = DefaultQueryFilter::default();
    let heuristic = DefaultQueryHeuristic::default();

    let result = query
        .find_path(
            a.base_poly_ref(),
            c.base_poly_ref(),
            vec3a(0.5, 0.0, 0.5),
            vec3a(2.5, 0.0, 0.5),
            &filter,
            &heuristic,
            FindPathOptions::empty(),
            None,
        )
        .unwrap();
    assert!(result.partial);
    assert_eq!(result.path, vec![a.base_poly_ref()]);
}

#[test]
fn sliced_updates_in_small_bites_match_the_synchronous_path() {
    let mut mesh = unit_grid_mesh(1.0, 16);
    let mut tiles = Vec::new();
    for x in 0..6 {
        tiles.push(mesh.add_tile(square_tile(x, 0), 0, None));
    }
    let start = tiles[0].base_poly_ref();
    let end = tiles[5].base_poly_ref();
    let start_pos = vec3a(0.5, 0.0, 0.5);
    let end_pos = vec3a(5.5, 0.0, 0.5);

    let mut query = NavMeshQuery::new(&mesh);
    let filter = DefaultQueryFilter::default();
    let heuristic = DefaultQueryHeuristic::default();

    let synchronous = query
        .find_path(
            start,
            end,
            start_pos,
            end_pos,
            &filter,
            &heuristic,
            FindPathOptions::empty(),
            None,
        )
        .unwrap();

    query
        .init_sliced_find_path(
            start,
            end,
            start_pos,
            end_pos,
            &heuristic,
            FindPathOptions::empty(),
            None,
        )
        .unwrap();
    loop {
        // Two expansions per simulated frame.
        let (state, iterations) = query.update_sliced_find_path(2, &filter, &heuristic).unwrap();
        assert!(iterations <= 2);
        match state {
            SlicedPathState::InProgress => continue,
            SlicedPathState::Success { partial } => {
                assert!(!partial);
                break;
            }
            SlicedPathState::Failed => panic!("sliced search failed"),
        }
    }
    let sliced = query.finalize_sliced_find_path().unwrap();
    assert_eq!(sliced.path, synchronous.path);
    assert_eq!(sliced.partial, synchronous.partial);
}

#[test]
fn cheap_off_mesh_connection_wins_the_path() {
    // Make traversal through the jump area almost free.
    let (mesh, tile_ref) = NavMesh::single_tile(row_tile_with_jump(6, 5, true), 0);
    let mut filter = DefaultQueryFilter::default();
    filter.area_cost[5] = 0.01;
    let heuristic = DefaultQueryHeuristic::default();
    let mut query = NavMeshQuery::new(&mesh);

    let base = tile_ref.base_poly_ref();
    let goal = base.with_poly_index(5);
    let jump = base.with_poly_index(6);

    let result = query
        .find_path(
            base,
            goal,
            row_center(0),
            row_center(5),
            &filter,
            &heuristic,
            FindPathOptions::empty(),
            None,
        )
        .unwrap();
    assert!(!result.partial);
    assert_eq!(result.path, vec![base, jump, goal]);

    // The straight path flags the connection entry.
    let points = query
        .find_straight_path(
            row_center(0),
            row_center(5),
            &result.path,
            16,
            StraightPathOptions::empty(),
        )
        .unwrap();
    let entry = points
        .iter()
        .find(|p| p.flags.contains(StraightPathFlags::OFFMESH_CONNECTION))
        .expect("the connection entry is flagged");
    assert_eq!(entry.poly, jump);

    // The endpoints are handed out relative to the polygon we entered from.
    let (start, end) = mesh
        .off_mesh_connection_poly_end_points(base, jump)
        .unwrap();
    assert_eq!(start, jump_start());
    assert_eq!(end, jump_end(6));
}

#[test]
fn one_directional_connection_cannot_be_taken_backwards() {
    let (mesh, tile_ref) = NavMesh::single_tile(row_tile_with_jump(6, 5, false), 0);
    let mut filter = DefaultQueryFilter::default();
    filter.area_cost[5] = 0.01;
    let heuristic = DefaultQueryHeuristic::default();
    let mut query = NavMeshQuery::new(&mesh);

    let base = tile_ref.base_poly_ref();
    let goal = base.with_poly_index(5);
    let jump = base.with_poly_index(6);

    // Forward, the jump is available.
    let forward = query
        .find_path(
            base,
            goal,
            row_center(0),
            row_center(5),
            &filter,
            &heuristic,
            FindPathOptions::empty(),
            None,
        )
        .unwrap();
    assert_eq!(forward.path, vec![base, jump, goal]);

    // Backwards, the search has to walk the squares.
    let backward = query
        .find_path(
            goal,
            base,
            row_center(5),
            row_center(0),
            &filter,
            &heuristic,
            FindPathOptions::empty(),
            None,
        )
        .unwrap();
    assert_eq!(backward.path.len(), 6);
    assert!(!backward.path.contains(&jump));
}

#[test]
fn disabled_polygons_reroute_queries() {
    let mut mesh = unit_grid_mesh(4.0, 2);
    let tile_ref = mesh.add_tile(row_tile(4), 0, None);
    let base = tile_ref.base_poly_ref();
    let blocked = base.with_poly_index(1);
    mesh.set_poly_flags(blocked, PolyFlags::WALK | PolyFlags::DISABLED)
        .unwrap();

    let filter = DefaultQueryFilter::new(PolyFlags::WALK, PolyFlags::DISABLED);
    let heuristic = DefaultQueryHeuristic::default();
    let mut query = NavMeshQuery::new(&mesh);

    // The row is interrupted at the disabled square.
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
    assert!(result.partial);
    assert_eq!(result.path, vec![base]);

    assert!(!query.is_valid_poly_ref(blocked, &filter));

    // A raycast stops at the disabled square as well.
    let hit = query
        .raycast(
            base,
            row_center(0),
            row_center(3),
            &filter,
            RaycastOptions::empty(),
            None,
        )
        .unwrap();
    assert!(hit.t < 1.0);
    assert_eq!(hit.path, vec![base]);
}

#[test]
fn area_expansion_and_sampling_respect_reachability() {
    let mut mesh = unit_grid_mesh(1.0, 8);
    let a = mesh.add_tile(square_tile(0, 0), 0, None);
    let b = mesh.add_tile(square_tile(1, 0), 0, None);
    // A detached square far away.
    let far = mesh.add_tile(square_tile(5, 0), 0, None);

    let mut query = NavMeshQuery::new(&mesh);
    let filter = DefaultQueryFilter::default();

    let visited = query
        .find_polys_around_circle(a.base_poly_ref(), vec3a(0.5, 0.0, 0.5), 10.0, &filter)
        .unwrap();
    let refs: Vec<PolyRef> = visited.iter().map(|v| v.poly).collect();
    assert!(refs.contains(&a.base_poly_ref()));
    assert!(refs.contains(&b.base_poly_ref()));
    assert!(!refs.contains(&far.base_poly_ref()));

    let mut frand = {
        let mut state = 42_u32;
        move || {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state >> 8) as f32 / (1 << 24) as f32
        }
    };
    for _ in 0..20 {
        let (poly, pt) = query
            .find_random_point_around_circle(
                a.base_poly_ref(),
                vec3a(0.5, 0.0, 0.5),
                10.0,
                &filter,
                &mut frand,
            )
            .unwrap();
        assert_ne!(poly, far.base_poly_ref());
        assert!(pt.x >= 0.0 && pt.x <= 2.0);
    }
}
