//! Legacy binary and text saves of the same game must load to the same world.
//!
//! A populated world is written as a legacy V0 image, loaded, written as
//! text, and loaded again. Both loads are compared field by field, then the
//! text load is searched to show the flag network survived.

use settler_core::building::{Building, BuildingDetail, BuildingType, pack_bld};
use settler_core::flag::OtherEnd;
use settler_core::id::FlagId;
use settler_core::inventory::OutQueueEntry;
use settler_core::player::PLAYER_ACTIVE_BIT;
use settler_core::pos::Direction;
use settler_core::search::{SearchCounter, SearchOutcome};
use settler_core::serf::{
    Constructing, Digging, FreeWalking, Leaving, LeavingInventory, OnPath, Serf, SerfState, Smelting, Walking,
    code,
};
use settler_core::test_utils::*;
use settler_core::tile::MapObject;
use settler_core::world::World;
use settler_save::test_utils::encode_v0;
use settler_save::{CodecConfig, SaveFormat};

// ===========================================================================
// Fixture
// ===========================================================================

struct Fixture {
    world: World,
    grid: Vec<FlagId>,
    shore: FlagId,
}

fn populated_world() -> Fixture {
    let mut world = small_world();

    world.globals.game_tick = 987_654;
    world.globals.rnd = [0x1234, 0x5678, 0x9abc];
    world.globals.split = 3;
    world.globals.update_map_initial_pos = world.geometry().encode(5, 9);
    world.globals.map_gold_deposit = 70_000;
    world.globals.winning_player = 1;
    world.search_counter = SearchCounter::new(1_234);

    world.players[0].flags = PLAYER_ACTIVE_BIT | 0x01;
    world.players[0].tool_prio = [9, 8, 7, 6, 5, 4, 3, 2, 1];
    world.players[0].serf_count[5] = 14;
    world.players[0].attacking_buildings[40] = 3;
    world.players[0].total_land_area = 100_000;
    world.players[1].flags = PLAYER_ACTIVE_BIT;
    world.players[1].castle_score = -40;
    world.players[1].analysis_coal = 17;

    let grid = flag_grid(&mut world, 3, 3);

    // Water road from the grid corner to a shore flag.
    let shore = place_flag(&mut world, 8, 4);
    let corner = grid[8];
    {
        let flag = world.flags.get_mut(corner);
        flag.path_con |= Direction::Right.bit();
        flag.length[Direction::Right.index()] = 7;
        flag.other_end[Direction::Right.index()] = Some(OtherEnd::Flag(shore));
    }
    {
        let flag = world.flags.get_mut(shore);
        flag.path_con |= Direction::Left.bit();
        flag.length[Direction::Left.index()] = 7;
        flag.other_end[Direction::Left.index()] = Some(OtherEnd::Flag(corner));
        flag.slots[2].kind = 6;
        flag.slots[2].dest = 3;
    }

    let castle = place_building(&mut world, grid[0], BuildingType::Castle, 0);
    let inv = inventory_of(&world, castle).unwrap();
    {
        let inventory = world.inventories.get_mut(inv);
        inventory.resources[0] = 25;
        inventory.resources[25] = 1;
        inventory.serfs[1] = 12;
        inventory.spawn_priority = 4;
        inventory.out_queue[0] = OutQueueEntry {
            resource: Some(3),
            dest: 9,
        };
    }
    place_building(&mut world, grid[4], BuildingType::Lumberjack, 0);

    // Construction site on the shore flag.
    let site = world.buildings.allocate().unwrap();
    let site_pos = world.geometry().move_dir(world.flags.get(shore).pos, Direction::UpLeft);
    *world.buildings.get_mut(site) = Building {
        pos: site_pos,
        bld: pack_bld(1, BuildingType::Sawmill, false),
        flag: shore,
        progress: 12,
        detail: BuildingDetail::Construction {
            level: 0x0203,
            planks_needed: 3,
            stone_needed: 2,
        },
        ..Building::default()
    };
    world.flags.get_mut(shore).attach_building(site);
    world.tiles.get_mut(site_pos).set_indexed_object(MapObject::LARGE_BUILDING, site.0);

    let states = [
        SerfState::IdleInStock { inventory: inv },
        SerfState::Walking(Walking {
            res: 4,
            dest: 300,
            dir: -2,
            wait_counter: 5,
        }),
        SerfState::EnteringBuilding {
            field_b: -1,
            slope_len: 40,
        },
        SerfState::LeavingBuilding(Leaving {
            field_b: 2,
            dest: 1,
            dest2: -3,
            dir: 4,
            next_state: code::FREE_WALKING,
        }),
        SerfState::Digging(Digging {
            h_index: 3,
            target_h: 12,
            dig_pos: 1,
            substate: -1,
        }),
        SerfState::Building(Constructing {
            mode: 1,
            bld_index: site.0,
            material_step: 2,
            counter: 9,
        }),
        SerfState::BuildingCastle { inventory: inv },
        SerfState::ReadyToLeaveInventory(LeavingInventory {
            mode: -1,
            dest: 4,
            inventory: inv,
        }),
        SerfState::Logging(FreeWalking {
            dist1: 3,
            dist2: -4,
            neg_dist1: -3,
            neg_dist2: 4,
            flags: 1,
        }),
        SerfState::Smelting(Smelting {
            mode: 2,
            counter: 11,
            kind: 1,
        }),
        SerfState::WakeAtFlag(OnPath {
            rev_dir: 3,
            flag: grid[1],
            field_e: 0,
        }),
        SerfState::DefendingCastle { next_knight: 2 },
        SerfState::Other(code::KNIGHT_ATTACKING),
    ];
    for (i, state) in states.into_iter().enumerate() {
        let id = world.serfs.allocate().unwrap();
        *world.serfs.get_mut(id) = Serf {
            kind: ((i as u8 % 27) << 2) | (i as u8 & 3),
            animation: i as u8,
            counter: 100 + i as u16,
            pos: world.geometry().encode(i as u32, 20),
            anim: 7,
            state,
        };
    }

    // Terrain, ownership and resources on plain tiles.
    let g = world.geometry().clone();
    for col in 10..20 {
        let tile = world.tiles.get_mut(g.encode(col, 12));
        tile.set_height(col as u8);
        tile.set_terrain_up(3);
        tile.set_terrain_down(5);
        tile.set_has_owner(true);
        tile.set_owner(1);
        tile.set_player(1);
        tile.set_resource_type(2);
        tile.set_resource_amount(col as u8);
    }
    let sea = world.tiles.get_mut(g.encode(20, 20));
    sea.set_deep_water(true);
    sea.set_fish(222);
    sea.set_idle_serf(true);
    sea.set_object(MapObject::WATER_STONE_0);
    sea.set_water(true);

    Fixture { world, grid, shore }
}

fn binary_then_text(world: &World) -> (World, World) {
    let config = CodecConfig::default();
    let image = encode_v0(world);
    let from_binary = settler_save::load(image.as_slice(), SaveFormat::LegacyV0, &config).unwrap();
    let text = settler_save::save_text_string(&from_binary).unwrap();
    let from_text = settler_save::load(text.as_bytes(), SaveFormat::Text, &config).unwrap();
    (from_binary, from_text)
}

// ===========================================================================
// Equivalence
// ===========================================================================

#[test]
fn tiles_are_identical() {
    let fixture = populated_world();
    let (a, b) = binary_then_text(&fixture.world);
    assert_eq!(a.geometry(), b.geometry());
    for ((pos, left), (_, right)) in a.tiles.iter().zip(b.tiles.iter()) {
        assert_eq!(left, right, "tile {:?}", a.geometry().decode(pos));
    }
}

#[test]
fn entity_tables_are_identical() {
    let fixture = populated_world();
    let (a, b) = binary_then_text(&fixture.world);

    assert_eq!(a.flags.max_ever(), b.flags.max_ever());
    assert_eq!(a.flags.allocated_ids(0), b.flags.allocated_ids(0));
    for (id, flag) in a.flags.iter_allocated(1) {
        assert_eq!(flag, b.flags.get(id), "flag {}", id.0);
    }

    assert_eq!(a.buildings, b.buildings);
    assert_eq!(a.inventories, b.inventories);
    assert_eq!(a.serfs, b.serfs);
}

#[test]
fn globals_and_players_are_identical() {
    let fixture = populated_world();
    let (a, b) = binary_then_text(&fixture.world);
    assert_eq!(a.globals, b.globals);
    assert_eq!(a.players, b.players);
    assert_eq!(a.search_counter, b.search_counter);
    assert_eq!(b.search_counter.value(), 1_234);
}

#[test]
fn whole_worlds_compare_equal() {
    let fixture = populated_world();
    let (a, b) = binary_then_text(&fixture.world);
    assert_eq!(a, b);
}

#[test]
fn legacy_load_matches_the_source_world() {
    let fixture = populated_world();
    let (a, _) = binary_then_text(&fixture.world);
    let mut expected = fixture.world.clone();
    expected.globals.pause_after_load();
    expected.globals.map_size = a.globals.map_size;
    assert_eq!(a.flags, expected.flags);
    assert_eq!(a.buildings, expected.buildings);
    assert_eq!(a.serfs, expected.serfs);
    assert_eq!(a.tiles, expected.tiles);
}

// ===========================================================================
// Connectivity
// ===========================================================================

#[test]
fn text_load_keeps_roads_searchable() {
    let fixture = populated_world();
    let (_, mut b) = binary_then_text(&fixture.world);

    let mut land = Vec::new();
    let outcome = b.search_single(
        fixture.grid[0],
        |id, _| {
            land.push(id);
            false
        },
        true,
        false,
    );
    assert_eq!(outcome, SearchOutcome::NotFound);
    assert_eq!(land.len(), fixture.grid.len());
    assert!(!land.contains(&fixture.shore));

    let outcome = b.search_single(fixture.grid[0], |id, _| id == fixture.shore, false, false);
    assert!(outcome.is_found());
}

#[test]
fn building_links_survive() {
    let fixture = populated_world();
    let (_, b) = binary_then_text(&fixture.world);
    let site = b.flags.get(fixture.shore).building().unwrap();
    assert!(matches!(
        b.buildings.get(site).detail,
        BuildingDetail::Construction { level: 0x0203, .. }
    ));
    let castle = b.flags.get(fixture.grid[0]).building().unwrap();
    let inv = b.buildings.get(castle).inventory().unwrap();
    assert_eq!(b.inventories.get(inv).resources[0], 25);
    assert_eq!(b.inventories.get(inv).out_queue[0].resource, Some(3));
    assert_eq!(b.inventories.get(inv).out_queue[1].resource, None);
}
