//! Loaded worlds behave like freshly built ones.
//!
//! Covers snapshots of loaded worlds, searching a network that came from a
//! text file, and a search counter restored right at its wrap point.

use settler_core::id::FlagId;
use settler_core::pos::Direction;
use settler_core::search::{SearchCounter, SearchOutcome};
use settler_core::test_utils::*;
use settler_core::world::World;
use settler_save::test_utils::encode_v0;
use settler_save::{CodecConfig, SaveFormat, snapshot};

fn visits(world: &mut World, source: FlagId) -> (SearchOutcome, Vec<FlagId>) {
    let mut seen = Vec::new();
    let outcome = world.search_single(
        source,
        |id, _| {
            seen.push(id);
            false
        },
        true,
        true,
    );
    (outcome, seen)
}

fn text_round_trip(world: &World) -> World {
    let text = settler_save::save_text_string(world).unwrap();
    settler_save::load(text.as_bytes(), SaveFormat::Text, &CodecConfig::default()).unwrap()
}

// ---------------------------------------------------------------------------
// Test 1: A-B-C from a text file
// ---------------------------------------------------------------------------

#[test]
fn three_flags_from_text_visit_in_order() {
    let text = "\
[globals]
map.col_size=5
map.row_size=5
max_ever_flag_index=4

[flag 1]
pos=4,4
path_con=1
endpoints=1
transporter=1
other_endpoint=2,0,0,0,0,0

[flag 2]
pos=6,4
path_con=9
endpoints=9
transporter=9
other_endpoint=3,0,0,1,0,0

[flag 3]
pos=8,4
path_con=8
endpoints=8
transporter=8
other_endpoint=0,0,0,2,0,0
";
    let mut world = settler_save::load(text.as_bytes(), SaveFormat::Text, &CodecConfig::default()).unwrap();
    assert_eq!(world.geometry().cols(), 32);
    let (a, b, c) = (FlagId(1), FlagId(2), FlagId(3));

    let (outcome, seen) = visits(&mut world, a);
    assert_eq!(outcome, SearchOutcome::NotFound);
    assert_eq!(seen, vec![a, b, c]);
    assert_eq!(world.flags.get(c).search_num, world.search_counter.value());
}

// ---------------------------------------------------------------------------
// Test 2: counter restored at the wrap point
// ---------------------------------------------------------------------------

#[test]
fn counter_at_max_wraps_cleanly_after_load() {
    let mut world = small_world();
    let ids = flag_chain(&mut world, 2, 2, 4);
    world.search_counter = SearchCounter::new(u16::MAX);
    // Stale stamps equal to the first id issued after the wrap.
    for &id in &ids {
        world.flags.get_mut(id).search_num = 1;
    }

    let mut loaded = text_round_trip(&world);
    assert_eq!(loaded.search_counter.value(), u16::MAX);

    let (outcome, seen) = visits(&mut loaded, ids[0]);
    assert_eq!(outcome, SearchOutcome::NotFound);
    assert_eq!(seen, ids);
    assert_ne!(loaded.search_counter.value(), 0);

    let mut fresh = small_world();
    let fresh_ids = flag_chain(&mut fresh, 2, 2, 4);
    let (_, fresh_seen) = visits(&mut fresh, fresh_ids[0]);
    assert_eq!(seen, fresh_seen);
}

// ---------------------------------------------------------------------------
// Test 3: snapshots of loaded worlds
// ---------------------------------------------------------------------------

#[test]
fn snapshot_of_a_legacy_load_round_trips() {
    let mut world = small_world();
    let ids = flag_grid(&mut world, 3, 3);
    place_building(&mut world, ids[4], settler_core::building::BuildingType::Stock, 2);
    world.globals.game_tick = 31_337;

    let loaded = settler_save::load(
        encode_v0(&world).as_slice(),
        SaveFormat::LegacyV0,
        &CodecConfig::default(),
    )
    .unwrap();
    let bytes = snapshot::encode(&loaded).unwrap();
    assert_eq!(snapshot::read_header(&bytes).unwrap().game_tick, 31_337);
    let restored = snapshot::decode(&bytes).unwrap();
    assert_eq!(restored, loaded);
}

#[test]
fn search_results_match_across_snapshot() {
    let mut world = small_world();
    let ids = flag_grid(&mut world, 4, 4);
    world.flags.get_mut(ids[5]).set_transporter(Direction::Right, false);
    world.flags.get_mut(ids[6]).set_transporter(Direction::Left, false);

    let mut restored = snapshot::decode(&snapshot::encode(&world).unwrap()).unwrap();
    let (outcome_a, seen_a) = visits(&mut world, ids[0]);
    let (outcome_b, seen_b) = visits(&mut restored, ids[0]);
    assert_eq!(outcome_a, outcome_b);
    assert_eq!(seen_a, seen_b);
    assert_eq!(world.flags, restored.flags);
}

#[test]
fn failed_loads_leave_no_world_behind() {
    let mut world = small_world();
    flag_chain(&mut world, 0, 0, 3);
    let image = encode_v0(&world);
    let result = settler_save::load(&image[..image.len() / 2], SaveFormat::LegacyV0, &CodecConfig::default());
    assert!(result.is_err());
    // The caller's world is untouched and still searchable.
    let (outcome, seen) = visits(&mut world, FlagId(1));
    assert_eq!(outcome, SearchOutcome::NotFound);
    assert_eq!(seen.len(), 3);
}
