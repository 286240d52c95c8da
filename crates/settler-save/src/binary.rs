//! Reader for the legacy fixed-offset binary save ("V0").
//!
//! The file is a sequence of fixed-size blocks with no magic number:
//!
//! | block        | size                                   |
//! |--------------|----------------------------------------|
//! | globals      | 210 bytes, then 40 unused bytes        |
//! | players      | 4 x 8628 bytes                         |
//! | map          | rows x cols x 8 bytes                  |
//! | serfs        | bitmap + max_ever x 16 bytes           |
//! | flags        | bitmap + max_ever x 70 bytes           |
//! | buildings    | bitmap + max_ever x 18 bytes           |
//! | inventories  | bitmap + max_ever x 120 bytes          |
//!
//! All integers are little-endian. Positions are stored as byte offsets
//! into the legacy map block, and references between records as byte
//! offsets into the referenced record array; both are converted to indices
//! here and never written back.

use crate::config::CodecConfig;
use crate::error::LoadError;
use settler_core::building::{Building, BuildingDetail, DetailKind};
use settler_core::flag::{ENDPOINT_BUILDING_BIT, Flag, OtherEnd, WaitingResource};
use settler_core::id::{BuildingId, FlagId, InventoryId, SerfId};
use settler_core::inventory::{Inventory, OutQueueEntry};
use settler_core::player::PlayerSettings;
use settler_core::pos::{Direction, MapGeometry, MapPos};
use settler_core::search::SearchCounter;
use settler_core::serf::{
    Constructing, Digging, FreeWalking, Leaving, LeavingInventory, Mining, OnPath, ResourceOut, Serf,
    SerfState, Smelting, Walking, code,
};
use settler_core::table::{EntityTable, TableIndex, TableKind, legacy_bitmap_len};
use settler_core::tile::{MapObject, Tile};
use settler_core::world::World;
use std::io::Read;

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

pub const GLOBALS_SIZE: usize = 210;
pub const GLOBALS_PADDING: usize = 40;
pub const PLAYER_BLOCK_SIZE: usize = 8628;
pub const TILE_SIZE: usize = 8;

/// Record size of each entity kind in the legacy layout.
pub fn stride(kind: TableKind) -> usize {
    match kind {
        TableKind::Serf => 16,
        TableKind::Flag => 70,
        TableKind::Building => 18,
        TableKind::Inventory => 120,
    }
}

/// Convert a stored byte offset into a record index.
pub fn offset_to_index(kind: TableKind, offset: u32) -> u16 {
    u16::try_from(offset as usize / stride(kind)).unwrap_or(u16::MAX)
}

// ---------------------------------------------------------------------------
// Byte access
// ---------------------------------------------------------------------------

/// Little-endian field reads from a block whose length was already checked.
struct Bytes<'a>(&'a [u8]);

impl Bytes<'_> {
    fn u8(&self, off: usize) -> u8 {
        self.0[off]
    }

    fn i8(&self, off: usize) -> i8 {
        self.0[off] as i8
    }

    fn u16(&self, off: usize) -> u16 {
        u16::from_le_bytes([self.0[off], self.0[off + 1]])
    }

    fn i16(&self, off: usize) -> i16 {
        self.u16(off) as i16
    }

    fn u32(&self, off: usize) -> u32 {
        u32::from_le_bytes([self.0[off], self.0[off + 1], self.0[off + 2], self.0[off + 3]])
    }

    fn u8_array<const N: usize>(&self, off: usize) -> [u8; N] {
        std::array::from_fn(|j| self.u8(off + j))
    }

    fn u16_array<const N: usize>(&self, off: usize) -> [u16; N] {
        std::array::from_fn(|j| self.u16(off + 2 * j))
    }
}

/// Read exactly `len` bytes, reporting a short read for `stage`.
fn read_block<R: Read>(reader: &mut R, len: usize, stage: &'static str) -> Result<Vec<u8>, LoadError> {
    let mut buf = Vec::new();
    reader.by_ref().take(len as u64).read_to_end(&mut buf)?;
    if buf.len() < len {
        return Err(LoadError::ShortRead {
            stage,
            expected: len,
            got: buf.len(),
        });
    }
    Ok(buf)
}

// ---------------------------------------------------------------------------
// Legacy map layout
// ---------------------------------------------------------------------------

/// Map dimensions as declared by the file, used to decode stored offsets.
#[derive(Debug, Clone, Copy)]
struct LegacyMap {
    cols: u32,
    rows: u32,
    row_shift: u32,
}

impl LegacyMap {
    /// A stored position is the byte offset of the tile's first word.
    fn pos(&self, geometry: &MapGeometry, value: u32) -> MapPos {
        let col = (value >> 2) & (self.cols - 1);
        let row = (value >> (2 + self.row_shift)) & (self.rows - 1);
        geometry.encode(col, row)
    }

    /// Offset of the structural word of tile `(x, y)`; the object word
    /// follows one row of structural words later.
    fn tile_offset(&self, x: u32, y: u32) -> usize {
        4 * (x as usize + ((y as usize) << self.row_shift))
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Decode a complete V0 save.
pub fn load_v0<R: Read>(mut reader: R, config: &CodecConfig) -> Result<World, LoadError> {
    let globals = read_block(&mut reader, GLOBALS_SIZE, "globals")?;
    read_block(&mut reader, GLOBALS_PADDING, "globals padding")?;
    let g = Bytes(&globals);

    let geometry = MapGeometry::from_map_size(g.u16(190) as u32)?;
    let legacy = LegacyMap {
        row_shift: g.u16(42) as u32,
        cols: g.u16(62) as u32,
        rows: g.u16(64) as u32,
    };
    if legacy.cols != geometry.cols()
        || legacy.rows != geometry.rows()
        || legacy.row_shift != geometry.col_size() + 1
    {
        return Err(LoadError::MapDimensionMismatch {
            cols: legacy.cols,
            rows: legacy.rows,
            row_shift: legacy.row_shift,
            expected_cols: geometry.cols(),
            expected_rows: geometry.rows(),
        });
    }

    let mut world = World::new(geometry.clone(), &config.limits);
    decode_globals(&mut world, &g, legacy)?;
    tracing::debug!(
        target: "settler::save",
        cols = legacy.cols,
        rows = legacy.rows,
        "legacy globals loaded"
    );

    for player in world.players.iter_mut() {
        let block = read_block(&mut reader, PLAYER_BLOCK_SIZE, "player settings")?;
        *player = decode_player(&Bytes(&block));
    }

    let map = read_block(&mut reader, world.tiles.len() * TILE_SIZE, "map")?;
    decode_map(&mut world, &Bytes(&map), legacy);
    tracing::debug!(target: "settler::save", tiles = world.tiles.len(), "legacy map loaded");

    load_table(&mut reader, &mut world.serfs, "serfs", 1, |index, rec| {
        Ok(decode_serf(index, rec, legacy, &geometry))
    })?;
    load_table(&mut reader, &mut world.flags, "flags", 1, |_, rec| Ok(decode_flag(rec)))?;
    place_flags(&mut world)?;
    load_table(&mut reader, &mut world.buildings, "buildings", 1, |_, rec| {
        Ok(decode_building(rec, legacy, &geometry))
    })?;
    load_table(&mut reader, &mut world.inventories, "inventories", 0, |_, rec| {
        Ok(decode_inventory(rec))
    })?;

    world.globals.pause_after_load();
    tracing::info!(
        target: "settler::save",
        flags = world.flags.max_ever(),
        buildings = world.buildings.max_ever(),
        serfs = world.serfs.max_ever(),
        inventories = world.inventories.max_ever(),
        "loaded legacy save"
    );
    Ok(world)
}

/// Read one entity block: the allocation bitmap, then `max_ever` records.
///
/// Only live records at or after `first` are decoded; free slots keep the
/// default record.
fn load_table<R, K, T, F>(
    reader: &mut R,
    table: &mut EntityTable<K, T>,
    stage: &'static str,
    first: usize,
    mut decode: F,
) -> Result<(), LoadError>
where
    R: Read,
    K: TableIndex,
    T: Default + Clone,
    F: FnMut(usize, &Bytes) -> Result<T, LoadError>,
{
    let count = table.max_ever();
    let size = stride(table.kind());
    let bitmap = read_block(reader, legacy_bitmap_len(count), stage)?;
    let records = read_block(reader, count * size, stage)?;

    table.load_bitmap_bytes(&bitmap);
    for (index, chunk) in records.chunks_exact(size).enumerate().skip(first) {
        let id = K::from_index(index);
        if table.is_allocated(id) {
            let record = decode(index, &Bytes(chunk))?;
            table.insert(id, record)?;
        }
    }
    tracing::debug!(target: "settler::save", stage, count, "legacy table loaded");
    Ok(())
}

// ---------------------------------------------------------------------------
// Globals and players
// ---------------------------------------------------------------------------

fn decode_globals(world: &mut World, g: &Bytes, legacy: LegacyMap) -> Result<(), LoadError> {
    let geometry = world.geometry().clone();
    let globals = &mut world.globals;
    globals.map_size = g.u16(190);
    globals.split = g.u8(66);
    globals.update_map_initial_pos = legacy.pos(&geometry, g.u32(68));
    globals.cfg_left = g.u8(72);
    globals.cfg_right = g.u8(73);
    globals.game_type = g.u16(74);
    globals.game_tick = g.u32(76);
    globals.game_stats_counter = g.u16(80);
    globals.history_counter = g.u16(82);
    globals.rnd = g.u16_array(84);
    globals.next_index = g.u16(96);
    globals.update_map_last_anim = g.u16(100);
    globals.update_map_counter = g.u16(102);
    globals.player_history_index = g.u16_array(104);
    globals.player_history_counter = g.u16_array(112);
    globals.resource_history_index = g.u16(118);
    globals.map_regions = g.u16(120);
    globals.map_max_serfs_left = g.u16(176);
    globals.max_next_index = g.u16(180);
    globals.map_field_4a = g.u16(182);
    globals.map_gold_deposit = g.u32(184);
    globals.update_map_16_loop = g.u16(188);
    globals.map_field_52 = g.u16(192);
    globals.map_62_5_times_regions = g.u16(198);
    globals.map_gold_morale_factor = g.u16(200);
    globals.winning_player = g.u16(202);
    globals.player_score_leader = g.u8(204);

    world.flags.set_max_ever(g.u16(90) as usize)?;
    world.buildings.set_max_ever(g.u16(92) as usize)?;
    world.serfs.set_max_ever(g.u16(94) as usize)?;
    world.inventories.set_max_ever(g.u16(174) as usize)?;
    world.search_counter = SearchCounter::new(g.u16(98));
    Ok(())
}

fn decode_player(p: &Bytes) -> PlayerSettings {
    PlayerSettings {
        tool_prio: p.u16_array(0),
        resource_count: p.u8_array(18),
        flag_prio: p.u8_array(44),
        serf_count: p.u16_array(70),
        knight_occupation: p.u8_array(124),
        player_num: p.u16(128),
        flags: p.u8(130),
        build: p.u8(131),
        completed_building_count: p.u16_array(132),
        incomplete_building_count: p.u16_array(178),
        inventory_prio: p.u8_array(224),
        attacking_buildings: p.u16_array(250),
        current_sett_5_item: p.u16(378),
        map_cursor_col: p.u16(380),
        map_cursor_row: p.u16(382),
        map_cursor_type: p.u8(384),
        panel_btn_type: p.u8(385),
        building_height_after_level: p.u16(386),
        building: p.u16(388),
        castle_flag: p.u16(390),
        castle_inventory: p.u16(392),
        cont_search_after_non_optimal_find: p.u16(394),
        knights_to_spawn: p.u16(396),
        field_110: p.u16(400),
        total_land_area: p.u32(402),
        total_building_score: p.u32(406),
        total_military_score: p.u32(410),
        last_anim: p.u16(414),
        reproduction_counter: p.u16(416),
        reproduction_reset: p.u16(418),
        serf_to_knight_rate: p.u16(420),
        serf_to_knight_counter: p.u16(422),
        attacking_building_count: p.u16(424),
        attacking_knights: p.u16_array(426),
        total_attacking_knights: p.u16(434),
        building_attacked: p.u16(436),
        knights_attacking: p.u16(438),
        analysis_goldore: p.u16(440),
        analysis_ironore: p.u16(442),
        analysis_coal: p.u16(444),
        analysis_stone: p.u16(446),
        food_stonemine: p.u16(448),
        food_coalmine: p.u16(450),
        food_ironmine: p.u16(452),
        food_goldmine: p.u16(454),
        planks_construction: p.u16(456),
        planks_boatbuilder: p.u16(458),
        planks_toolmaker: p.u16(460),
        steel_toolmaker: p.u16(462),
        steel_weaponsmith: p.u16(464),
        coal_steelsmelter: p.u16(466),
        coal_goldsmelter: p.u16(468),
        coal_weaponsmith: p.u16(470),
        wheat_pigfarm: p.u16(472),
        wheat_mill: p.u16(474),
        current_sett_6_item: p.u16(476),
        castle_score: p.i16(478),
    }
}

// ---------------------------------------------------------------------------
// Map
// ---------------------------------------------------------------------------

fn decode_map(world: &mut World, map: &Bytes, legacy: LegacyMap) {
    let object_row = 4 * legacy.cols as usize;
    for y in 0..legacy.rows {
        for x in 0..legacy.cols {
            let structural = legacy.tile_offset(x, y);
            let object = structural + object_row;
            let tile = Tile::from_raw(
                map.u8(structural),
                map.u8(structural + 1),
                map.u8(structural + 2),
                map.u8(structural + 3),
                map.u16(object),
                map.u16(object + 2),
            );
            let pos = world.geometry().encode(x, y);
            *world.tiles.get_mut(pos) = tile;
        }
    }
}

/// Flag records carry no position; recover it from the tiles holding flags.
fn place_flags(world: &mut World) -> Result<(), LoadError> {
    let max_ever = world.flags.max_ever();
    for (pos, tile) in world.tiles.iter() {
        if tile.object() != MapObject::FLAG {
            continue;
        }
        let index = tile.object_index().unwrap_or_default() as usize;
        if index >= max_ever {
            return Err(LoadError::IndexOutOfRange {
                kind: TableKind::Flag,
                index,
            });
        }
        world.flags.get_mut(FlagId(index as u16)).pos = pos;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

fn decode_flag(rec: &Bytes) -> Flag {
    let endpoint = rec.u8(4);
    let path_con = rec.u8(3);
    let roads = path_con | endpoint;

    let slots = std::array::from_fn(|j| WaitingResource {
        kind: rec.u8(12 + j),
        dest: rec.u16(20 + 2 * j),
    });

    let other_end = std::array::from_fn(|d| {
        let offset = rec.u32(36 + 4 * d);
        if d == Direction::UpLeft.index() && endpoint & ENDPOINT_BUILDING_BIT != 0 {
            let id = BuildingId(offset_to_index(TableKind::Building, offset));
            (!id.is_none()).then_some(OtherEnd::Building(id))
        } else if roads & (1 << d) != 0 {
            let id = FlagId(offset_to_index(TableKind::Flag, offset));
            (!id.is_none()).then_some(OtherEnd::Flag(id))
        } else {
            None
        }
    });

    Flag {
        pos: MapPos::default(),
        search_num: rec.u16(0),
        search_dir: rec.u8(2),
        path_con,
        endpoint,
        transporter: rec.u8(5),
        length: rec.u8_array(6),
        slots,
        other_end,
        other_end_dir: rec.u8_array(60),
        bld_flags: rec.u8(66),
        stock1_prio: rec.u8(67),
        bld2_flags: rec.u8(68),
        stock2_prio: rec.u8(69),
    }
}

fn decode_building(rec: &Bytes, legacy: LegacyMap, geometry: &MapGeometry) -> Building {
    let bld = rec.u8(4);
    let serf = rec.u8(5);
    let detail = match Building::detail_kind_for(bld, serf) {
        DetailKind::Inventory => {
            BuildingDetail::Inventory(InventoryId(offset_to_index(TableKind::Inventory, rec.u32(14))))
        }
        DetailKind::Flag => BuildingDetail::Flag(FlagId(offset_to_index(TableKind::Flag, rec.u32(14)))),
        DetailKind::Construction => BuildingDetail::Construction {
            level: rec.u16(14),
            planks_needed: rec.u8(16),
            stone_needed: rec.u8(17),
        },
    };

    Building {
        pos: legacy.pos(geometry, rec.u32(0)),
        bld,
        serf,
        flag: FlagId(rec.u16(6)),
        stock1: rec.u8(8),
        stock2: rec.u8(9),
        serf_index: SerfId(rec.u16(10)),
        progress: rec.u16(12),
        detail,
    }
}

fn decode_inventory(rec: &Bytes) -> Inventory {
    let out_queue = std::array::from_fn(|j| {
        // Stored as resource type + 1, zero for an empty slot.
        let stored = rec.u8(58 + j);
        OutQueueEntry {
            resource: stored.checked_sub(1),
            dest: rec.u16(60 + 2 * j),
        }
    });

    Inventory {
        player: rec.u8(0),
        res_dir: rec.u8(1),
        flag: FlagId(rec.u16(2)),
        building: BuildingId(rec.u16(4)),
        resources: rec.u16_array(6),
        out_queue,
        spawn_priority: rec.u16(64),
        serfs: rec.u16_array(66),
    }
}

fn decode_serf(index: usize, rec: &Bytes, legacy: LegacyMap, geometry: &MapGeometry) -> Serf {
    let state_code = rec.u8(10);
    let state = decode_serf_state(state_code, rec);
    tracing::trace!(target: "settler::save", index, state = state_code, "legacy serf");

    Serf {
        kind: rec.u8(0),
        animation: rec.u8(1),
        counter: rec.u16(2),
        pos: legacy.pos(geometry, rec.u32(4)),
        anim: rec.u16(8),
        state,
    }
}

/// Decode the state payload in bytes 11-15 of a serf record.
fn decode_serf_state(state_code: u8, rec: &Bytes) -> SerfState {
    let walking = || Walking {
        res: rec.i8(11),
        dest: rec.u16(12),
        dir: rec.i8(14),
        wait_counter: rec.i8(15),
    };
    let leaving = || Leaving {
        field_b: rec.i8(11),
        dest: rec.i8(12),
        dest2: rec.i8(13),
        dir: rec.i8(14),
        next_state: rec.u8(15),
    };
    let resource_out = || ResourceOut {
        res: rec.u8(11),
        res_dest: rec.u16(12),
        next_state: rec.u8(15),
    };
    let free_walking = || FreeWalking {
        dist1: rec.i8(11),
        dist2: rec.i8(12),
        neg_dist1: rec.i8(13),
        neg_dist2: rec.i8(14),
        flags: rec.i8(15),
    };
    // The flag reference overlaps field E; both are read as stored.
    let on_path = || OnPath {
        rev_dir: rec.i8(11),
        flag: FlagId(offset_to_index(TableKind::Flag, rec.u32(12))),
        field_e: rec.u8(14),
    };
    let mode = rec.i8(11);
    let next_knight = rec.u16(14);

    match state_code {
        code::IDLE_IN_STOCK => SerfState::IdleInStock {
            inventory: InventoryId(rec.u16(14)),
        },
        code::WALKING => SerfState::Walking(walking()),
        code::TRANSPORTING => SerfState::Transporting(walking()),
        code::DELIVERING => SerfState::Delivering(walking()),
        code::ENTERING_BUILDING => SerfState::EnteringBuilding {
            field_b: rec.i8(11),
            slope_len: rec.u16(12),
        },
        code::LEAVING_BUILDING => SerfState::LeavingBuilding(leaving()),
        code::READY_TO_LEAVE => SerfState::ReadyToLeave(leaving()),
        code::READY_TO_ENTER => SerfState::ReadyToEnter { field_b: rec.i8(11) },
        code::DIGGING => SerfState::Digging(Digging {
            h_index: rec.i8(11),
            target_h: rec.u8(12),
            dig_pos: rec.i8(13),
            substate: rec.i8(14),
        }),
        code::BUILDING => SerfState::Building(Constructing {
            mode,
            bld_index: rec.u16(12),
            material_step: rec.u8(14),
            counter: rec.u8(15),
        }),
        code::BUILDING_CASTLE => SerfState::BuildingCastle {
            inventory: InventoryId(rec.u16(12)),
        },
        code::MOVE_RESOURCE_OUT => SerfState::MoveResourceOut(resource_out()),
        code::DROP_RESOURCE_OUT => SerfState::DropResourceOut(resource_out()),
        code::READY_TO_LEAVE_INVENTORY => SerfState::ReadyToLeaveInventory(LeavingInventory {
            mode,
            dest: rec.u16(12),
            inventory: InventoryId(rec.u16(14)),
        }),
        code::FREE_WALKING => SerfState::FreeWalking(free_walking()),
        code::LOGGING => SerfState::Logging(free_walking()),
        code::PLANTING => SerfState::Planting(free_walking()),
        code::STONECUTTING => SerfState::Stonecutting(free_walking()),
        code::STONECUTTER_FREE_WALKING => SerfState::StonecutterFreeWalking(free_walking()),
        code::FISHING => SerfState::Fishing(free_walking()),
        code::FARMING => SerfState::Farming(free_walking()),
        code::SAMPLING_GEO_SPOT => SerfState::SamplingGeoSpot(free_walking()),
        code::SAWING => SerfState::Sawing { mode },
        code::LOST => SerfState::Lost { field_b: rec.i8(11) },
        code::MINING => SerfState::Mining(Mining {
            substate: rec.u8(11),
            res: rec.u8(13),
            deposit: rec.u8(14),
        }),
        code::SMELTING => SerfState::Smelting(Smelting {
            mode,
            counter: rec.i8(12),
            kind: rec.u8(13),
        }),
        code::MILLING => SerfState::Milling { mode },
        code::BAKING => SerfState::Baking { mode },
        code::PIGFARMING => SerfState::PigFarming { mode },
        code::BUTCHERING => SerfState::Butchering { mode },
        code::MAKING_WEAPON => SerfState::MakingWeapon { mode },
        code::MAKING_TOOL => SerfState::MakingTool { mode },
        code::BUILDING_BOAT => SerfState::BuildingBoat { mode },
        code::IDLE_ON_PATH => SerfState::IdleOnPath(on_path()),
        code::WAIT_IDLE_ON_PATH => SerfState::WaitIdleOnPath(on_path()),
        code::WAKE_AT_FLAG => SerfState::WakeAtFlag(on_path()),
        code::WAKE_ON_PATH => SerfState::WakeOnPath(on_path()),
        code::DEFENDING_HUT => SerfState::DefendingHut { next_knight },
        code::DEFENDING_TOWER => SerfState::DefendingTower { next_knight },
        code::DEFENDING_FORTRESS => SerfState::DefendingFortress { next_knight },
        code::DEFENDING_CASTLE => SerfState::DefendingCastle { next_knight },
        other => SerfState::without_payload(other).unwrap_or(SerfState::Other(other)),
    }
}
