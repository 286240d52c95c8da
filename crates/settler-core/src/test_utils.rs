//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::building::{Building, BuildingDetail, BuildingType, pack_bld};
use crate::flag::Flag;
use crate::id::{BuildingId, FlagId, InventoryId};
use crate::inventory::Inventory;
use crate::pos::{Direction, MapGeometry};
use crate::table::TableLimits;
use crate::tile::MapObject;
use crate::world::World;

// ===========================================================================
// Worlds
// ===========================================================================

/// Empty 32x32 world with default table limits.
pub fn small_world() -> World {
    world_of_size(5, 5)
}

pub fn world_of_size(col_size: u32, row_size: u32) -> World {
    let geometry = MapGeometry::new(col_size, row_size).expect("valid test geometry");
    World::new(geometry, &TableLimits::default())
}

// ===========================================================================
// Flags and roads
// ===========================================================================

/// Allocate a flag at `(col, row)` and mark the tile.
pub fn place_flag(world: &mut World, col: u32, row: u32) -> FlagId {
    let pos = world.geometry().encode(col, row);
    let id = world.flags.allocate().expect("flag table has room");
    *world.flags.get_mut(id) = Flag::new(pos);
    world.tiles.get_mut(pos).set_indexed_object(MapObject::FLAG, id.0);
    id
}

/// Connect `a` to `b` with a land road leaving `a` in `dir`, updating both
/// ends and optionally assigning a transporter.
pub fn link_flags(world: &mut World, a: FlagId, dir: Direction, b: FlagId, transporter: bool) {
    let back = dir.reverse();
    let length = 2;
    world.flags.get_mut(a).connect(dir, b, length);
    world.flags.get_mut(b).connect(back, a, length);
    world.flags.get_mut(a).set_transporter(dir, transporter);
    world.flags.get_mut(b).set_transporter(back, transporter);

    let pos_a = world.flags.get(a).pos;
    let pos_b = world.flags.get(b).pos;
    let tile_a = world.tiles.get_mut(pos_a);
    tile_a.set_paths(tile_a.paths() | dir.bit());
    let tile_b = world.tiles.get_mut(pos_b);
    tile_b.set_paths(tile_b.paths() | back.bit());
}

/// Build a straight east-west chain of `n` flags starting at `(col, row)`,
/// two tiles apart, all roads served.
pub fn flag_chain(world: &mut World, col: u32, row: u32, n: usize) -> Vec<FlagId> {
    let ids: Vec<FlagId> = (0..n)
        .map(|i| place_flag(world, col + 2 * i as u32, row))
        .collect();
    for pair in ids.windows(2) {
        link_flags(world, pair[0], Direction::Right, pair[1], true);
    }
    ids
}

/// A `width` x `height` grid of flags linked right and down.
pub fn flag_grid(world: &mut World, width: usize, height: usize) -> Vec<FlagId> {
    let mut ids = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            ids.push(place_flag(world, 2 * x as u32, 2 * y as u32));
        }
    }
    for y in 0..height {
        for x in 0..width {
            let here = ids[y * width + x];
            if x + 1 < width {
                link_flags(world, here, Direction::Right, ids[y * width + x + 1], true);
            }
            if y + 1 < height {
                link_flags(world, here, Direction::Down, ids[(y + 1) * width + x], true);
            }
        }
    }
    ids
}

// ===========================================================================
// Buildings and inventories
// ===========================================================================

/// Place a finished building up-left of `flag`, attached to it.
pub fn place_building(world: &mut World, flag: FlagId, kind: BuildingType, player: u8) -> BuildingId {
    let flag_pos = world.flags.get(flag).pos;
    let pos = world.geometry().move_dir(flag_pos, Direction::UpLeft);
    let id = world.buildings.allocate().expect("building table has room");

    let detail = if kind.has_inventory() {
        let inv_id = world.inventories.allocate().expect("inventory table has room");
        *world.inventories.get_mut(inv_id) = Inventory {
            player,
            flag,
            building: id,
            ..Inventory::default()
        };
        BuildingDetail::Inventory(inv_id)
    } else {
        BuildingDetail::Flag(flag)
    };

    *world.buildings.get_mut(id) = Building {
        pos,
        bld: pack_bld(player, kind, true),
        flag,
        detail,
        ..Building::default()
    };
    world.flags.get_mut(flag).attach_building(id);
    let object = if kind == BuildingType::Castle {
        MapObject::CASTLE
    } else {
        MapObject::SMALL_BUILDING
    };
    world.tiles.get_mut(pos).set_indexed_object(object, id.0);
    id
}

/// Inventory owned by a stock or castle building.
pub fn inventory_of(world: &World, building: BuildingId) -> Option<InventoryId> {
    world.buildings.get(building).inventory()
}
