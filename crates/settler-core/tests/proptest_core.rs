//! Property-based tests for positions and packed tiles.
//!
//! Uses proptest to generate geometries, coordinates and sub-field values,
//! then verify the packing laws hold.

use proptest::prelude::*;
use settler_core::pos::{Direction, MapGeometry};
use settler_core::tile::{MapObject, Tile};

// ===========================================================================
// Generators
// ===========================================================================

fn arb_geometry() -> impl Strategy<Value = MapGeometry> {
    (1u32..=10, 1u32..=10).prop_map(|(c, r)| MapGeometry::new(c, r).unwrap())
}

fn arb_geometry_and_coords() -> impl Strategy<Value = (MapGeometry, u32, u32)> {
    arb_geometry().prop_flat_map(|g| {
        let (cols, rows) = (g.cols(), g.rows());
        (Just(g), 0..cols, 0..rows)
    })
}

fn arb_tile() -> impl Strategy<Value = Tile> {
    (any::<u8>(), any::<u8>(), any::<u8>(), any::<u8>(), any::<u16>(), any::<u16>())
        .prop_map(|(f, h, t, o, p, s)| Tile::from_raw(f, h, t, o, p, s))
}

// ===========================================================================
// Positions
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn position_round_trip((g, col, row) in arb_geometry_and_coords()) {
        let pos = g.encode(col, row);
        prop_assert_eq!(g.decode(pos), (col, row));
        prop_assert!(g.contains(pos));
    }

    #[test]
    fn add_is_commutative((g, c1, r1) in arb_geometry_and_coords(), c2 in any::<u32>(), r2 in any::<u32>()) {
        let a = g.encode(c1, r1);
        let b = g.encode(c2, r2);
        prop_assert_eq!(g.add(a, b), g.add(b, a));
    }

    #[test]
    fn add_is_associative(
        (g, c1, r1) in arb_geometry_and_coords(),
        c2 in any::<u32>(), r2 in any::<u32>(),
        c3 in any::<u32>(), r3 in any::<u32>(),
    ) {
        let a = g.encode(c1, r1);
        let b = g.encode(c2, r2);
        let c = g.encode(c3, r3);
        prop_assert_eq!(g.add(g.add(a, b), c), g.add(a, g.add(b, c)));
    }

    #[test]
    fn stepping_around_the_map_returns_home((g, col, row) in arb_geometry_and_coords()) {
        let start = g.encode(col, row);
        let mut pos = start;
        for _ in 0..g.cols() {
            pos = g.move_dir(pos, Direction::Right);
        }
        prop_assert_eq!(pos, start);
        for _ in 0..g.rows() {
            pos = g.move_dir(pos, Direction::Down);
        }
        prop_assert_eq!(pos, start);
    }
}

// ===========================================================================
// Tile packing
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn height_byte_fields_are_isolated(mut tile in arb_tile(), owner in 0u8..4, height in 0u8..32, has_owner in any::<bool>()) {
        let before = tile;
        tile.set_owner(owner);
        prop_assert_eq!(tile.owner(), owner);
        prop_assert_eq!(tile.height(), before.height());
        prop_assert_eq!(tile.has_owner(), before.has_owner());

        tile.set_height(height);
        prop_assert_eq!(tile.height(), height);
        prop_assert_eq!(tile.owner(), owner);

        tile.set_has_owner(has_owner);
        prop_assert_eq!(tile.has_owner(), has_owner);
        prop_assert_eq!(tile.owner(), owner);
        prop_assert_eq!(tile.height(), height);

        prop_assert_eq!(tile.flags_byte(), before.flags_byte());
        prop_assert_eq!(tile.obj_byte(), before.obj_byte());
    }

    #[test]
    fn terrain_nibbles_are_isolated(mut tile in arb_tile(), up in 0u8..16, down in 0u8..16) {
        let before = tile;
        tile.set_terrain_up(up);
        prop_assert_eq!(tile.terrain_up(), up);
        prop_assert_eq!(tile.terrain_down(), before.terrain_down());
        tile.set_terrain_down(down);
        prop_assert_eq!(tile.terrain_down(), down);
        prop_assert_eq!(tile.terrain_up(), up);
        prop_assert_eq!(tile.height_byte(), before.height_byte());
    }

    #[test]
    fn object_byte_fields_are_isolated(mut tile in arb_tile(), object in 0u8..128, water in any::<bool>()) {
        let before = tile;
        tile.set_object(MapObject(object));
        prop_assert_eq!(tile.object(), MapObject(object));
        prop_assert_eq!(tile.water(), before.water());
        tile.set_water(water);
        prop_assert_eq!(tile.water(), water);
        prop_assert_eq!(tile.object(), MapObject(object));
        prop_assert_eq!(tile.raw_payload(), before.raw_payload());
    }

    #[test]
    fn flags_byte_fields_are_isolated(mut tile in arb_tile(), paths in 0u8..64, deep in any::<bool>(), marker in any::<bool>()) {
        tile.set_paths(paths);
        tile.set_deep_water(deep);
        tile.set_has_flag(marker);
        prop_assert_eq!(tile.paths(), paths);
        prop_assert_eq!(tile.deep_water(), deep);
        prop_assert_eq!(tile.has_flag(), marker);
    }

    #[test]
    fn resource_fields_are_isolated(
        mut tile in arb_tile(),
        kind in 0u8..8,
        amount in 0u8..32,
        idle in any::<bool>(),
        player in 0u8..4,
    ) {
        tile.set_object(MapObject::TREE_0);
        tile.set_resource_type(kind);
        tile.set_resource_amount(amount);
        tile.set_idle_serf(idle);
        tile.set_player(player);
        prop_assert_eq!(tile.resource_type(), kind);
        prop_assert_eq!(tile.resource_amount(), amount);
        prop_assert_eq!(tile.idle_serf(), idle);
        prop_assert_eq!(tile.player(), player);
        prop_assert_eq!(tile.fish(), (kind << 5) | amount);
        prop_assert_eq!(tile.object_index(), None);
    }
}
