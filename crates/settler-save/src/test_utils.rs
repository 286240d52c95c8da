//! Shared test helpers for integration tests and fuzzing.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]`. The main helper
//! is [`encode_v0`], which lays a [`World`] out in the legacy binary format so
//! decoder tests can start from a world built with the core test helpers
//! instead of a checked-in fixture.

use crate::binary::{GLOBALS_PADDING, GLOBALS_SIZE, PLAYER_BLOCK_SIZE, TILE_SIZE, stride};
use settler_core::building::{Building, BuildingDetail};
use settler_core::flag::{Flag, OtherEnd};
use settler_core::inventory::Inventory;
use settler_core::player::PlayerSettings;
use settler_core::pos::{MapGeometry, MapPos};
use settler_core::serf::{Serf, SerfState};
use settler_core::table::{EntityTable, TableIndex, TableKind};
use settler_core::world::World;

// ===========================================================================
// Byte writer
// ===========================================================================

struct Block(Vec<u8>);

impl Block {
    fn new(len: usize) -> Self {
        Block(vec![0; len])
    }

    fn u8(&mut self, off: usize, value: u8) {
        self.0[off] = value;
    }

    fn i8(&mut self, off: usize, value: i8) {
        self.0[off] = value as u8;
    }

    fn u16(&mut self, off: usize, value: u16) {
        self.0[off..off + 2].copy_from_slice(&value.to_le_bytes());
    }

    fn u32(&mut self, off: usize, value: u32) {
        self.0[off..off + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn u8s(&mut self, off: usize, values: &[u8]) {
        self.0[off..off + values.len()].copy_from_slice(values);
    }

    fn u16s(&mut self, off: usize, values: &[u16]) {
        for (j, &v) in values.iter().enumerate() {
            self.u16(off + 2 * j, v);
        }
    }
}

// ===========================================================================
// Layout
// ===========================================================================

/// Legacy scalar map size for a geometry.
///
/// # Panics
///
/// Panics if the geometry has no legacy map size.
pub fn legacy_map_size(geometry: &MapGeometry) -> u16 {
    let (col, row) = (geometry.col_size(), geometry.row_size());
    assert!(col >= 5 && (col == row || col == row + 1), "no legacy map size for {col}x{row}");
    let size = if col == row { 2 * (col - 5) + 1 } else { 2 * (col - 5) };
    size as u16
}

struct Layout {
    geometry: MapGeometry,
    row_shift: u32,
}

impl Layout {
    fn pos(&self, pos: MapPos) -> u32 {
        let (col, row) = self.geometry.decode(pos);
        4 * (col + (row << self.row_shift))
    }
}

fn offset(kind: TableKind, index: u16) -> u32 {
    index as u32 * stride(kind) as u32
}

// ===========================================================================
// Encoder
// ===========================================================================

/// Encode `world` as a legacy binary save.
///
/// # Panics
///
/// Panics if the world's geometry has no legacy map size.
pub fn encode_v0(world: &World) -> Vec<u8> {
    let geometry = world.geometry().clone();
    let layout = Layout {
        row_shift: geometry.col_size() + 1,
        geometry,
    };

    let mut out = encode_globals(world, &layout).0;
    out.extend(std::iter::repeat_n(0u8, GLOBALS_PADDING));
    for player in &world.players {
        out.extend(encode_player(player).0);
    }
    out.extend(encode_map(world, &layout).0);
    encode_table(&mut out, &world.serfs, |s| encode_serf(s, &layout));
    encode_table(&mut out, &world.flags, encode_flag);
    encode_table(&mut out, &world.buildings, |b| encode_building(b, &layout));
    encode_table(&mut out, &world.inventories, encode_inventory);
    out
}

fn encode_table<K: TableIndex, T: Default + Clone>(
    out: &mut Vec<u8>,
    table: &EntityTable<K, T>,
    encode: impl Fn(&T) -> Block,
) {
    out.extend(table.bitmap_bytes());
    for index in 0..table.max_ever() {
        out.extend(encode(table.get(K::from_index(index))).0);
    }
}

fn encode_globals(world: &World, layout: &Layout) -> Block {
    let g = &world.globals;
    let geometry = &layout.geometry;
    let mut b = Block::new(GLOBALS_SIZE);
    b.u16(42, layout.row_shift as u16);
    b.u16(62, geometry.cols() as u16);
    b.u16(64, geometry.rows() as u16);
    b.u8(66, g.split);
    b.u32(68, layout.pos(g.update_map_initial_pos));
    b.u8(72, g.cfg_left);
    b.u8(73, g.cfg_right);
    b.u16(74, g.game_type);
    b.u32(76, g.game_tick);
    b.u16(80, g.game_stats_counter);
    b.u16(82, g.history_counter);
    b.u16s(84, &g.rnd);
    b.u16(90, world.flags.max_ever() as u16);
    b.u16(92, world.buildings.max_ever() as u16);
    b.u16(94, world.serfs.max_ever() as u16);
    b.u16(96, g.next_index);
    b.u16(98, world.search_counter.value());
    b.u16(100, g.update_map_last_anim);
    b.u16(102, g.update_map_counter);
    b.u16s(104, &g.player_history_index);
    b.u16s(112, &g.player_history_counter);
    b.u16(118, g.resource_history_index);
    b.u16(120, g.map_regions);
    b.u16(174, world.inventories.max_ever() as u16);
    b.u16(176, g.map_max_serfs_left);
    b.u16(180, g.max_next_index);
    b.u16(182, g.map_field_4a);
    b.u32(184, g.map_gold_deposit);
    b.u16(188, g.update_map_16_loop);
    b.u16(190, legacy_map_size(geometry));
    b.u16(192, g.map_field_52);
    b.u16(198, g.map_62_5_times_regions);
    b.u16(200, g.map_gold_morale_factor);
    b.u16(202, g.winning_player);
    b.u8(204, g.player_score_leader);
    b
}

fn encode_player(p: &PlayerSettings) -> Block {
    let mut b = Block::new(PLAYER_BLOCK_SIZE);
    b.u16s(0, &p.tool_prio);
    b.u8s(18, &p.resource_count);
    b.u8s(44, &p.flag_prio);
    b.u16s(70, &p.serf_count);
    b.u8s(124, &p.knight_occupation);
    b.u16(128, p.player_num);
    b.u8(130, p.flags);
    b.u8(131, p.build);
    b.u16s(132, &p.completed_building_count);
    b.u16s(178, &p.incomplete_building_count);
    b.u8s(224, &p.inventory_prio);
    b.u16s(250, &p.attacking_buildings);
    b.u16(378, p.current_sett_5_item);
    b.u16(380, p.map_cursor_col);
    b.u16(382, p.map_cursor_row);
    b.u8(384, p.map_cursor_type);
    b.u8(385, p.panel_btn_type);
    b.u16(386, p.building_height_after_level);
    b.u16(388, p.building);
    b.u16(390, p.castle_flag);
    b.u16(392, p.castle_inventory);
    b.u16(394, p.cont_search_after_non_optimal_find);
    b.u16(396, p.knights_to_spawn);
    b.u16(400, p.field_110);
    b.u32(402, p.total_land_area);
    b.u32(406, p.total_building_score);
    b.u32(410, p.total_military_score);
    b.u16(414, p.last_anim);
    b.u16(416, p.reproduction_counter);
    b.u16(418, p.reproduction_reset);
    b.u16(420, p.serf_to_knight_rate);
    b.u16(422, p.serf_to_knight_counter);
    b.u16(424, p.attacking_building_count);
    b.u16s(426, &p.attacking_knights);
    b.u16(434, p.total_attacking_knights);
    b.u16(436, p.building_attacked);
    b.u16(438, p.knights_attacking);
    b.u16(440, p.analysis_goldore);
    b.u16(442, p.analysis_ironore);
    b.u16(444, p.analysis_coal);
    b.u16(446, p.analysis_stone);
    b.u16(448, p.food_stonemine);
    b.u16(450, p.food_coalmine);
    b.u16(452, p.food_ironmine);
    b.u16(454, p.food_goldmine);
    b.u16(456, p.planks_construction);
    b.u16(458, p.planks_boatbuilder);
    b.u16(460, p.planks_toolmaker);
    b.u16(462, p.steel_toolmaker);
    b.u16(464, p.steel_weaponsmith);
    b.u16(466, p.coal_steelsmelter);
    b.u16(468, p.coal_goldsmelter);
    b.u16(470, p.coal_weaponsmith);
    b.u16(472, p.wheat_pigfarm);
    b.u16(474, p.wheat_mill);
    b.u16(476, p.current_sett_6_item);
    b.u16(478, p.castle_score as u16);
    b
}

fn encode_map(world: &World, layout: &Layout) -> Block {
    let cols = layout.geometry.cols() as usize;
    let mut b = Block::new(world.tiles.len() * TILE_SIZE);
    for (pos, tile) in world.tiles.iter() {
        let structural = layout.pos(pos) as usize;
        let object = structural + 4 * cols;
        b.u8s(
            structural,
            &[tile.flags_byte(), tile.height_byte(), tile.type_byte(), tile.obj_byte()],
        );
        b.u16(object, tile.raw_payload());
        b.u16(object + 2, tile.serf_index().0);
    }
    b
}

fn encode_flag(flag: &Flag) -> Block {
    let mut b = Block::new(stride(TableKind::Flag));
    b.u16(0, flag.search_num);
    b.u8(2, flag.search_dir);
    b.u8(3, flag.path_con);
    b.u8(4, flag.endpoint);
    b.u8(5, flag.transporter);
    b.u8s(6, &flag.length);
    for (j, slot) in flag.slots.iter().enumerate() {
        b.u8(12 + j, slot.kind);
        b.u16(20 + 2 * j, slot.dest);
    }
    for (d, link) in flag.other_end.iter().enumerate() {
        let value = match link {
            Some(OtherEnd::Flag(id)) => offset(TableKind::Flag, id.0),
            Some(OtherEnd::Building(id)) => offset(TableKind::Building, id.0),
            None => 0,
        };
        b.u32(36 + 4 * d, value);
    }
    b.u8s(60, &flag.other_end_dir);
    b.u8(66, flag.bld_flags);
    b.u8(67, flag.stock1_prio);
    b.u8(68, flag.bld2_flags);
    b.u8(69, flag.stock2_prio);
    b
}

fn encode_building(building: &Building, layout: &Layout) -> Block {
    let mut b = Block::new(stride(TableKind::Building));
    b.u32(0, layout.pos(building.pos));
    b.u8(4, building.bld);
    b.u8(5, building.serf);
    b.u16(6, building.flag.0);
    b.u8(8, building.stock1);
    b.u8(9, building.stock2);
    b.u16(10, building.serf_index.0);
    b.u16(12, building.progress);
    match building.detail {
        BuildingDetail::Inventory(id) => b.u32(14, offset(TableKind::Inventory, id.0)),
        BuildingDetail::Flag(id) => b.u32(14, offset(TableKind::Flag, id.0)),
        BuildingDetail::Construction {
            level,
            planks_needed,
            stone_needed,
        } => {
            b.u16(14, level);
            b.u8(16, planks_needed);
            b.u8(17, stone_needed);
        }
    }
    b
}

fn encode_inventory(inventory: &Inventory) -> Block {
    let mut b = Block::new(stride(TableKind::Inventory));
    b.u8(0, inventory.player);
    b.u8(1, inventory.res_dir);
    b.u16(2, inventory.flag.0);
    b.u16(4, inventory.building.0);
    b.u16s(6, &inventory.resources);
    for (j, entry) in inventory.out_queue.iter().enumerate() {
        b.u8(58 + j, entry.resource.map_or(0, |r| r + 1));
        b.u16(60 + 2 * j, entry.dest);
    }
    b.u16(64, inventory.spawn_priority);
    b.u16s(66, &inventory.serfs);
    b
}

fn encode_serf(serf: &Serf, layout: &Layout) -> Block {
    let mut b = Block::new(stride(TableKind::Serf));
    b.u8(0, serf.kind);
    b.u8(1, serf.animation);
    b.u16(2, serf.counter);
    b.u32(4, layout.pos(serf.pos));
    b.u16(8, serf.anim);
    b.u8(10, serf.state.code());

    match serf.state {
        SerfState::Null | SerfState::Other(_) => {}
        SerfState::IdleInStock { inventory } => b.u16(14, inventory.0),
        SerfState::Walking(w) | SerfState::Transporting(w) | SerfState::Delivering(w) => {
            b.i8(11, w.res);
            b.u16(12, w.dest);
            b.i8(14, w.dir);
            b.i8(15, w.wait_counter);
        }
        SerfState::EnteringBuilding { field_b, slope_len } => {
            b.i8(11, field_b);
            b.u16(12, slope_len);
        }
        SerfState::LeavingBuilding(l) | SerfState::ReadyToLeave(l) => {
            b.i8(11, l.field_b);
            b.i8(12, l.dest);
            b.i8(13, l.dest2);
            b.i8(14, l.dir);
            b.u8(15, l.next_state);
        }
        SerfState::ReadyToEnter { field_b } | SerfState::Lost { field_b } => b.i8(11, field_b),
        SerfState::Digging(d) => {
            b.i8(11, d.h_index);
            b.u8(12, d.target_h);
            b.i8(13, d.dig_pos);
            b.i8(14, d.substate);
        }
        SerfState::Building(c) => {
            b.i8(11, c.mode);
            b.u16(12, c.bld_index);
            b.u8(14, c.material_step);
            b.u8(15, c.counter);
        }
        SerfState::BuildingCastle { inventory } => b.u16(12, inventory.0),
        SerfState::MoveResourceOut(r) | SerfState::DropResourceOut(r) => {
            b.u8(11, r.res);
            b.u16(12, r.res_dest);
            b.u8(15, r.next_state);
        }
        SerfState::ReadyToLeaveInventory(l) => {
            b.i8(11, l.mode);
            b.u16(12, l.dest);
            b.u16(14, l.inventory.0);
        }
        SerfState::FreeWalking(f)
        | SerfState::Logging(f)
        | SerfState::Planting(f)
        | SerfState::Stonecutting(f)
        | SerfState::StonecutterFreeWalking(f)
        | SerfState::Fishing(f)
        | SerfState::Farming(f)
        | SerfState::SamplingGeoSpot(f) => {
            b.i8(11, f.dist1);
            b.i8(12, f.dist2);
            b.i8(13, f.neg_dist1);
            b.i8(14, f.neg_dist2);
            b.i8(15, f.flags);
        }
        SerfState::Sawing { mode }
        | SerfState::Milling { mode }
        | SerfState::Baking { mode }
        | SerfState::PigFarming { mode }
        | SerfState::Butchering { mode }
        | SerfState::MakingWeapon { mode }
        | SerfState::MakingTool { mode }
        | SerfState::BuildingBoat { mode } => b.i8(11, mode),
        SerfState::Mining(m) => {
            b.u8(11, m.substate);
            b.u8(13, m.res);
            b.u8(14, m.deposit);
        }
        SerfState::Smelting(s) => {
            b.i8(11, s.mode);
            b.i8(12, s.counter);
            b.u8(13, s.kind);
        }
        SerfState::IdleOnPath(p)
        | SerfState::WaitIdleOnPath(p)
        | SerfState::WakeAtFlag(p)
        | SerfState::WakeOnPath(p) => {
            b.i8(11, p.rev_dir);
            // Field E shares byte 14 with the flag offset; the offset wins.
            b.u32(12, offset(TableKind::Flag, p.flag.0));
        }
        SerfState::DefendingHut { next_knight }
        | SerfState::DefendingTower { next_knight }
        | SerfState::DefendingFortress { next_knight }
        | SerfState::DefendingCastle { next_knight } => b.u16(14, next_knight),
    }
    b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_map_sizes_invert_geometry() {
        for size in 1..=15u16 {
            let geometry = MapGeometry::from_map_size(size as u32).unwrap();
            assert_eq!(legacy_map_size(&geometry), size);
        }
    }
}
