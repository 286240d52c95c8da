//! Writer for the text save format.

use crate::error::SaveError;
use settler_core::building::{Building, BuildingDetail};
use settler_core::flag::{Flag, OtherEnd};
use settler_core::globals::GameGlobals;
use settler_core::inventory::Inventory;
use settler_core::player::PlayerSettings;
use settler_core::pos::{MapGeometry, MapPos};
use settler_core::serf::{Serf, SerfState};
use settler_core::tile::Tile;
use settler_core::world::World;
use std::fmt::Display;
use std::io::Write;

/// Format version written to `[globals]`; informational only.
pub const TEXT_FORMAT_VERSION: &str = env!("CARGO_PKG_VERSION");

struct TextWriter<'g, W> {
    out: W,
    geometry: &'g MapGeometry,
}

impl<W: Write> TextWriter<'_, W> {
    fn header(&mut self, name: &str, param: Option<&dyn Display>) -> std::io::Result<()> {
        match param {
            Some(param) => writeln!(self.out, "[{name} {param}]"),
            None => writeln!(self.out, "[{name}]"),
        }
    }

    fn value(&mut self, key: &str, value: impl Display) -> std::io::Result<()> {
        writeln!(self.out, "{key}={value}")
    }

    fn array<T: Display>(&mut self, key: &str, values: &[T]) -> std::io::Result<()> {
        write!(self.out, "{key}=")?;
        for (i, v) in values.iter().enumerate() {
            if i > 0 {
                write!(self.out, ",")?;
            }
            write!(self.out, "{v}")?;
        }
        writeln!(self.out)
    }

    fn pos(&mut self, key: &str, pos: MapPos) -> std::io::Result<()> {
        let (col, row) = self.geometry.decode(pos);
        writeln!(self.out, "{key}={col},{row}")
    }

    fn end(&mut self) -> std::io::Result<()> {
        writeln!(self.out)
    }
}

/// Write `world` in the text format.
pub fn write_text<W: Write>(world: &World, out: W) -> Result<(), SaveError> {
    let mut w = TextWriter {
        out,
        geometry: world.geometry(),
    };

    write_globals(&mut w, world)?;
    for (index, player) in world.active_players() {
        w.header("player", Some(&index))?;
        write_player(&mut w, player)?;
        w.end()?;
    }
    for (id, flag) in world.flags.iter_allocated(1) {
        w.header("flag", Some(&id.0))?;
        write_flag(&mut w, flag)?;
        w.end()?;
    }
    for (id, building) in world.buildings.iter_allocated(1) {
        w.header("building", Some(&id.0))?;
        write_building(&mut w, building)?;
        w.end()?;
    }
    for (id, inventory) in world.inventories.iter_allocated(0) {
        w.header("inventory", Some(&id.0))?;
        write_inventory(&mut w, inventory)?;
        w.end()?;
    }
    for (id, serf) in world.serfs.iter_allocated(1) {
        w.header("serf", Some(&id.0))?;
        write_serf(&mut w, serf)?;
        w.end()?;
    }
    for (pos, tile) in world.tiles.iter() {
        let (col, row) = w.geometry.decode(pos);
        writeln!(w.out, "[map {col} {row}]")?;
        write_tile(&mut w, tile)?;
        w.end()?;
    }

    w.out.flush()?;
    tracing::info!(
        target: "settler::save",
        flags = world.flags.max_ever(),
        serfs = world.serfs.max_ever(),
        "wrote text save"
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

fn write_globals<W: Write>(w: &mut TextWriter<'_, W>, world: &World) -> std::io::Result<()> {
    let g: &GameGlobals = &world.globals;
    w.header("globals", None)?;
    w.value("version", TEXT_FORMAT_VERSION)?;
    w.value("map.col_size", w.geometry.col_size())?;
    w.value("map.row_size", w.geometry.row_size())?;
    w.value("split", g.split)?;
    w.pos("update_map_initial_pos", g.update_map_initial_pos)?;
    w.value("cfg.left", g.cfg_left)?;
    w.value("cfg.right", g.cfg_right)?;
    w.value("game_type", g.game_type)?;
    w.value("game_tick", g.game_tick)?;
    w.value("game_stats_counter", g.game_stats_counter)?;
    w.value("history_counter", g.history_counter)?;
    w.array("rnd", &g.rnd)?;
    w.value("max_ever_flag_index", world.flags.max_ever())?;
    w.value("max_ever_building_index", world.buildings.max_ever())?;
    w.value("max_ever_serf_index", world.serfs.max_ever())?;
    w.value("next_index", g.next_index)?;
    w.value("flag_search_counter", world.search_counter.value())?;
    w.value("update_map_last_anim", g.update_map_last_anim)?;
    w.value("update_map_counter", g.update_map_counter)?;
    w.array("player_history_index", &g.player_history_index)?;
    w.array("player_history_counter", &g.player_history_counter)?;
    w.value("resource_history_index", g.resource_history_index)?;
    w.value("map.regions", g.map_regions)?;
    w.value("max_ever_inventory_index", world.inventories.max_ever())?;
    w.value("map.max_serfs_left", g.map_max_serfs_left)?;
    w.value("max_next_index", g.max_next_index)?;
    w.value("map.field_4A", g.map_field_4a)?;
    w.value("map.gold_deposit", g.map_gold_deposit)?;
    w.value("update_map_16_loop", g.update_map_16_loop)?;
    w.value("map.size", g.map_size)?;
    w.value("map.field_52", g.map_field_52)?;
    w.value("map.62_5_times_regions", g.map_62_5_times_regions)?;
    w.value("map.gold_morale_factor", g.map_gold_morale_factor)?;
    w.value("winning_player", g.winning_player)?;
    w.value("player_score_leader", g.player_score_leader)?;
    w.end()
}

fn write_player<W: Write>(w: &mut TextWriter<'_, W>, p: &PlayerSettings) -> std::io::Result<()> {
    w.value("flags", p.flags)?;
    w.value("build", p.build)?;
    w.value("player_num", p.player_num)?;
    w.array("tool_prio", &p.tool_prio)?;
    w.array("resource_count", &p.resource_count)?;
    w.array("flag_prio", &p.flag_prio)?;
    w.array("serf_count", &p.serf_count)?;
    w.array("knight_occupation", &p.knight_occupation)?;
    w.array("completed_building_count", &p.completed_building_count)?;
    w.array("incomplete_building_count", &p.incomplete_building_count)?;
    w.array("inventory_prio", &p.inventory_prio)?;
    w.array("attacking_buildings", &p.attacking_buildings)?;
    w.value("current_sett_5_item", p.current_sett_5_item)?;
    w.value("current_sett_6_item", p.current_sett_6_item)?;
    w.value("map_cursor.col", p.map_cursor_col)?;
    w.value("map_cursor.row", p.map_cursor_row)?;
    w.value("map_cursor.type", p.map_cursor_type)?;
    w.value("panel_btn_type", p.panel_btn_type)?;
    w.value("building_height_after_level", p.building_height_after_level)?;
    w.value("building", p.building)?;
    w.value("castle_flag", p.castle_flag)?;
    w.value("castle_inventory", p.castle_inventory)?;
    w.value("cont_search_after_non_optimal_find", p.cont_search_after_non_optimal_find)?;
    w.value("knights_to_spawn", p.knights_to_spawn)?;
    w.value("field_110", p.field_110)?;
    w.value("total_land_area", p.total_land_area)?;
    w.value("total_building_score", p.total_building_score)?;
    w.value("total_military_score", p.total_military_score)?;
    w.value("last_anim", p.last_anim)?;
    w.value("reproduction_counter", p.reproduction_counter)?;
    w.value("reproduction_reset", p.reproduction_reset)?;
    w.value("serf_to_knight_rate", p.serf_to_knight_rate)?;
    w.value("serf_to_knight_counter", p.serf_to_knight_counter)?;
    w.value("attacking_building_count", p.attacking_building_count)?;
    w.array("attacking_knights", &p.attacking_knights)?;
    w.value("total_attacking_knights", p.total_attacking_knights)?;
    w.value("building_attacked", p.building_attacked)?;
    w.value("knights_attacking", p.knights_attacking)?;
    w.value("analysis.goldore", p.analysis_goldore)?;
    w.value("analysis.ironore", p.analysis_ironore)?;
    w.value("analysis.coal", p.analysis_coal)?;
    w.value("analysis.stone", p.analysis_stone)?;
    w.value("food_stonemine", p.food_stonemine)?;
    w.value("food_coalmine", p.food_coalmine)?;
    w.value("food_ironmine", p.food_ironmine)?;
    w.value("food_goldmine", p.food_goldmine)?;
    w.value("planks_construction", p.planks_construction)?;
    w.value("planks_boatbuilder", p.planks_boatbuilder)?;
    w.value("planks_toolmaker", p.planks_toolmaker)?;
    w.value("steel_toolmaker", p.steel_toolmaker)?;
    w.value("steel_weaponsmith", p.steel_weaponsmith)?;
    w.value("coal_steelsmelter", p.coal_steelsmelter)?;
    w.value("coal_goldsmelter", p.coal_goldsmelter)?;
    w.value("coal_weaponsmith", p.coal_weaponsmith)?;
    w.value("wheat_pigfarm", p.wheat_pigfarm)?;
    w.value("wheat_mill", p.wheat_mill)?;
    w.value("castle_score", p.castle_score)
}

fn write_flag<W: Write>(w: &mut TextWriter<'_, W>, flag: &Flag) -> std::io::Result<()> {
    let kinds: Vec<u8> = flag.slots.iter().map(|s| s.kind).collect();
    let dests: Vec<u16> = flag.slots.iter().map(|s| s.dest).collect();
    let links: Vec<u16> = flag
        .other_end
        .iter()
        .map(|link| match link {
            Some(OtherEnd::Flag(id)) => id.0,
            Some(OtherEnd::Building(id)) => id.0,
            None => 0,
        })
        .collect();

    w.pos("pos", flag.pos)?;
    w.value("search_num", flag.search_num)?;
    w.value("search_dir", flag.search_dir)?;
    w.value("path_con", flag.path_con)?;
    w.value("endpoints", flag.endpoint)?;
    w.value("transporter", flag.transporter)?;
    w.array("length", &flag.length)?;
    w.array("resources.type", &kinds)?;
    w.array("resources.dest", &dests)?;
    w.array("other_endpoint", &links)?;
    w.array("other_end_dir", &flag.other_end_dir)?;
    w.value("bld_flags", flag.bld_flags)?;
    w.value("stock1_prio", flag.stock1_prio)?;
    w.value("bld2_flags", flag.bld2_flags)?;
    w.value("stock2_prio", flag.stock2_prio)
}

fn write_building<W: Write>(w: &mut TextWriter<'_, W>, building: &Building) -> std::io::Result<()> {
    w.pos("pos", building.pos)?;
    w.value("bld", building.bld)?;
    w.value("serf", building.serf)?;
    w.value("flag_index", building.flag.0)?;
    w.value("stock1", building.stock1)?;
    w.value("stock2", building.stock2)?;
    w.value("serf_index", building.serf_index.0)?;
    w.value("progress", building.progress)?;
    match building.detail {
        BuildingDetail::Inventory(id) => w.value("inventory", id.0),
        BuildingDetail::Flag(id) => w.value("flag", id.0),
        BuildingDetail::Construction {
            level,
            planks_needed,
            stone_needed,
        } => {
            w.value("level", level)?;
            w.value("planks_needed", planks_needed)?;
            w.value("stone_needed", stone_needed)
        }
    }
}

fn write_inventory<W: Write>(w: &mut TextWriter<'_, W>, inventory: &Inventory) -> std::io::Result<()> {
    let queue_types: Vec<i32> = inventory
        .out_queue
        .iter()
        .map(|e| e.resource.map_or(-1, i32::from))
        .collect();
    let queue_dests: Vec<u16> = inventory.out_queue.iter().map(|e| e.dest).collect();

    w.value("player", inventory.player)?;
    w.value("res_dir", inventory.res_dir)?;
    w.value("flag", inventory.flag.0)?;
    w.value("building", inventory.building.0)?;
    w.array("queue.type", &queue_types)?;
    w.array("queue.dest", &queue_dests)?;
    w.value("spawn_priority", inventory.spawn_priority)?;
    w.array("resources", &inventory.resources)?;
    w.array("serfs", &inventory.serfs)
}

fn write_serf<W: Write>(w: &mut TextWriter<'_, W>, serf: &Serf) -> std::io::Result<()> {
    w.value("type", serf.kind)?;
    w.value("animation", serf.animation)?;
    w.value("counter", serf.counter)?;
    w.pos("pos", serf.pos)?;
    w.value("anim", serf.anim)?;
    w.value("state", serf.state.code())?;

    match serf.state {
        SerfState::Null | SerfState::Other(_) => Ok(()),
        SerfState::IdleInStock { inventory } => w.value("state.inventory", inventory.0),
        SerfState::Walking(s) | SerfState::Transporting(s) | SerfState::Delivering(s) => {
            w.value("state.res", s.res)?;
            w.value("state.dest", s.dest)?;
            w.value("state.dir", s.dir)?;
            w.value("state.wait_counter", s.wait_counter)
        }
        SerfState::EnteringBuilding { field_b, slope_len } => {
            w.value("state.field_B", field_b)?;
            w.value("state.slope_len", slope_len)
        }
        SerfState::LeavingBuilding(s) | SerfState::ReadyToLeave(s) => {
            w.value("state.field_B", s.field_b)?;
            w.value("state.dest", s.dest)?;
            w.value("state.dest2", s.dest2)?;
            w.value("state.dir", s.dir)?;
            w.value("state.next_state", s.next_state)
        }
        SerfState::ReadyToEnter { field_b } | SerfState::Lost { field_b } => {
            w.value("state.field_B", field_b)
        }
        SerfState::Digging(s) => {
            w.value("state.h_index", s.h_index)?;
            w.value("state.target_h", s.target_h)?;
            w.value("state.dig_pos", s.dig_pos)?;
            w.value("state.substate", s.substate)
        }
        SerfState::Building(s) => {
            w.value("state.mode", s.mode)?;
            w.value("state.bld_index", s.bld_index)?;
            w.value("state.material_step", s.material_step)?;
            w.value("state.counter", s.counter)
        }
        SerfState::BuildingCastle { inventory } => w.value("state.inv_index", inventory.0),
        SerfState::MoveResourceOut(s) | SerfState::DropResourceOut(s) => {
            w.value("state.res", s.res)?;
            w.value("state.res_dest", s.res_dest)?;
            w.value("state.next_state", s.next_state)
        }
        SerfState::ReadyToLeaveInventory(s) => {
            w.value("state.mode", s.mode)?;
            w.value("state.dest", s.dest)?;
            w.value("state.inv_index", s.inventory.0)
        }
        SerfState::FreeWalking(s)
        | SerfState::Logging(s)
        | SerfState::Planting(s)
        | SerfState::Stonecutting(s)
        | SerfState::StonecutterFreeWalking(s)
        | SerfState::Fishing(s)
        | SerfState::Farming(s)
        | SerfState::SamplingGeoSpot(s) => {
            w.value("state.dist1", s.dist1)?;
            w.value("state.dist2", s.dist2)?;
            w.value("state.neg_dist", s.neg_dist1)?;
            w.value("state.neg_dist2", s.neg_dist2)?;
            w.value("state.flags", s.flags)
        }
        SerfState::Sawing { mode }
        | SerfState::Milling { mode }
        | SerfState::Baking { mode }
        | SerfState::PigFarming { mode }
        | SerfState::Butchering { mode }
        | SerfState::MakingWeapon { mode }
        | SerfState::MakingTool { mode }
        | SerfState::BuildingBoat { mode } => w.value("state.mode", mode),
        SerfState::Mining(s) => {
            w.value("state.substate", s.substate)?;
            w.value("state.res", s.res)?;
            w.value("state.deposit", s.deposit)
        }
        SerfState::Smelting(s) => {
            w.value("state.mode", s.mode)?;
            w.value("state.counter", s.counter)?;
            w.value("state.type", s.kind)
        }
        SerfState::IdleOnPath(s)
        | SerfState::WaitIdleOnPath(s)
        | SerfState::WakeAtFlag(s)
        | SerfState::WakeOnPath(s) => {
            w.value("state.rev_dir", s.rev_dir)?;
            w.value("state.flag", s.flag.0)?;
            w.value("state.field_E", s.field_e)
        }
        SerfState::DefendingHut { next_knight }
        | SerfState::DefendingTower { next_knight }
        | SerfState::DefendingFortress { next_knight }
        | SerfState::DefendingCastle { next_knight } => w.value("state.next_knight", next_knight),
    }
}

fn write_tile<W: Write>(w: &mut TextWriter<'_, W>, tile: &Tile) -> std::io::Result<()> {
    w.value("deep_water", u8::from(tile.deep_water()))?;
    w.value("paths", tile.paths())?;
    w.value("has_owner", u8::from(tile.has_owner()))?;
    w.value("owner", tile.owner())?;
    w.value("height", tile.height())?;
    w.value("type.up", tile.terrain_up())?;
    w.value("type.down", tile.terrain_down())?;
    w.value("object", tile.object().0)?;
    w.value("water", u8::from(tile.water()))?;
    w.value("serf_index", tile.serf_index().0)?;

    if let Some(index) = tile.object_index() {
        return w.value("object_index", index);
    }
    w.value("idle_serf", u8::from(tile.idle_serf()))?;
    w.value("player", tile.player())?;
    if tile.deep_water() {
        w.value("fish", tile.fish())
    } else {
        w.value("resource.type", tile.resource_type())?;
        w.value("resource.amount", tile.resource_amount())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use settler_core::pos::Direction;
    use settler_core::test_utils::*;

    fn encode(world: &World) -> String {
        let mut out = Vec::new();
        write_text(world, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn globals_come_first_with_map_sizes() {
        let world = small_world();
        let text = encode(&world);
        assert!(text.starts_with("[globals]\nversion="));
        assert!(text.contains("\nmap.col_size=5\nmap.row_size=5\n"));
        assert!(text.contains("\nmax_ever_flag_index=1\n"));
    }

    #[test]
    fn one_map_section_per_tile() {
        let world = world_of_size(3, 2);
        let text = encode(&world);
        assert_eq!(text.matches("[map ").count(), 32);
        assert!(text.contains("[map 7 3]\n"));
        assert!(text.ends_with("\n\n"));
    }

    #[test]
    fn flag_sections_carry_links() {
        let mut world = small_world();
        let ids = flag_chain(&mut world, 0, 0, 2);
        world.flags.get_mut(ids[0]).slots[0].kind = 5;
        let text = encode(&world);
        assert!(text.contains("[flag 1]\npos=0,0\n"));
        assert!(text.contains("[flag 2]\npos=2,0\n"));
        assert!(text.contains("other_endpoint=2,0,0,0,0,0\n"));
        assert!(text.contains("other_endpoint=0,0,0,1,0,0\n"));
        assert!(text.contains("resources.type=5,0,0,0,0,0,0,0\n"));
        assert_eq!(
            world.flags.get(ids[1]).other_end_dir[Direction::Left.index()],
            Direction::Right as u8
        );
    }

    #[test]
    fn inactive_players_are_skipped() {
        let mut world = small_world();
        world.players[1].flags = settler_core::player::PLAYER_ACTIVE_BIT;
        let text = encode(&world);
        assert!(text.contains("[player 1]\n"));
        assert!(!text.contains("[player 0]"));
    }

    #[test]
    fn empty_out_queue_slots_are_negative() {
        let mut world = small_world();
        let flag = place_flag(&mut world, 5, 5);
        let castle = place_building(&mut world, flag, settler_core::building::BuildingType::Castle, 0);
        let inv = inventory_of(&world, castle).unwrap();
        world.inventories.get_mut(inv).out_queue[1].resource = Some(4);
        let text = encode(&world);
        assert!(text.contains(&format!("[building {}]\n", castle.0)));
        assert!(text.contains(&format!("inventory={}\n", inv.0)));
        assert!(text.contains("queue.type=-1,4\n"));
    }
}
