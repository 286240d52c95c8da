//! Reader for the text save format.
//!
//! Sections may appear in any order and unknown sections or keys are
//! skipped. Within a section a repeated key overwrites the earlier value.
//! Only `[globals]` with the two map sizes is mandatory; everything else
//! starts from zero.

use crate::config::{CodecConfig, TextOptions};
use crate::error::LoadError;
use crate::text_format::{FromInt, Fields, Section, parse_exact_int, parse_leading_int, parse_sections, section_index};
use settler_core::building::{Building, BuildingDetail, DetailKind};
use settler_core::flag::{ENDPOINT_BUILDING_BIT, Flag, OtherEnd};
use settler_core::id::{BuildingId, FlagId, InventoryId, SerfId};
use settler_core::inventory::Inventory;
use settler_core::player::{PLAYER_COUNT, PlayerSettings};
use settler_core::pos::{Direction, MapGeometry};
use settler_core::search::SearchCounter;
use settler_core::serf::{
    Constructing, Digging, FreeWalking, Leaving, LeavingInventory, Mining, OnPath, ResourceOut, Serf,
    SerfState, Smelting, Walking, code,
};
use settler_core::table::{EntityTable, TableError, TableIndex};
use settler_core::tile::{MapObject, Tile};
use settler_core::world::World;

/// Build a world from the text of a save file.
pub fn read_text(text: &str, config: &CodecConfig) -> Result<World, LoadError> {
    let options = &config.text;
    let sections = parse_sections(text);

    let globals = sections
        .iter()
        .find(|s| s.name == "globals")
        .ok_or(LoadError::MissingSection("globals"))?;
    let fields = Fields::new(globals, options);
    let col_size: u32 = fields.num("map.col_size", fields.require("map.col_size")?)?;
    let row_size: u32 = fields.num("map.row_size", fields.require("map.row_size")?)?;
    let geometry = MapGeometry::new(col_size, row_size)?;

    let mut world = World::new(geometry, &config.limits);
    read_globals(&mut world, globals, options)?;

    world.flags.clear_bitmap();
    world.flags.allocate_sentinel();
    world.buildings.clear_bitmap();
    world.buildings.allocate_sentinel();
    world.inventories.clear_bitmap();
    world.inventories.allocate_sentinel();
    world.serfs.clear_bitmap();
    world.serfs.allocate_sentinel();

    for section in &sections {
        match section.name.as_str() {
            "globals" => {}
            "player" => {
                let index = section_index(section, "player", options)?;
                if index >= PLAYER_COUNT {
                    return Err(LoadError::InvalidSectionParam {
                        section: "player",
                        param: section.param.clone().unwrap_or_default(),
                    });
                }
                read_player(&mut world.players[index], section, options)?;
            }
            "flag" => {
                let id: FlagId = claim(&mut world.flags, section_index(section, "flag", options)?)?;
                let flag = read_flag(section, options, world.geometry())?;
                world.flags.insert(id, flag)?;
            }
            "building" => {
                let id: BuildingId = claim(&mut world.buildings, section_index(section, "building", options)?)?;
                let building = read_building(section, options, world.geometry())?;
                world.buildings.insert(id, building)?;
            }
            "inventory" => {
                let id: InventoryId =
                    claim(&mut world.inventories, section_index(section, "inventory", options)?)?;
                let inventory = read_inventory(section, options)?;
                world.inventories.insert(id, inventory)?;
            }
            "serf" => {
                let id: SerfId = claim(&mut world.serfs, section_index(section, "serf", options)?)?;
                let serf = read_serf(section, options, world.geometry())?;
                world.serfs.insert(id, serf)?;
            }
            "map" => read_tile(&mut world, section, options)?,
            other => {
                tracing::debug!(target: "settler::save", "skipping unknown section [{other}]");
            }
        }
    }

    world.globals.pause_after_load();
    tracing::info!(
        target: "settler::save",
        sections = sections.len(),
        flags = world.flags.max_ever(),
        buildings = world.buildings.max_ever(),
        serfs = world.serfs.max_ever(),
        "loaded text save"
    );
    Ok(world)
}

/// Mark slot `index` live, growing the table and its high-water mark.
fn claim<K: TableIndex, T: Default + Clone>(table: &mut EntityTable<K, T>, index: usize) -> Result<K, LoadError> {
    if index >= table.limit() {
        return Err(TableError::IndexOutOfRange {
            kind: table.kind(),
            index,
            limit: table.limit(),
        }
        .into());
    }
    let id = K::from_index(index);
    table.cover(id)?;
    table.set_allocated(id);
    Ok(id)
}

// ---------------------------------------------------------------------------
// Globals and players
// ---------------------------------------------------------------------------

fn read_globals(world: &mut World, section: &Section, options: &TextOptions) -> Result<(), LoadError> {
    let f = Fields::new(section, options);
    let geometry = world.geometry().clone();
    let g = &mut world.globals;

    for setting in &section.settings {
        let (key, value) = (setting.key.as_str(), setting.value.as_str());
        match key {
            "version" | "map.col_size" | "map.row_size" => {}
            "split" => g.split = f.num(key, value)?,
            "update_map_initial_pos" => g.update_map_initial_pos = f.pos(&geometry, key, value)?,
            "cfg.left" => g.cfg_left = f.num(key, value)?,
            "cfg.right" => g.cfg_right = f.num(key, value)?,
            "game_type" => g.game_type = f.num(key, value)?,
            "game_tick" => g.game_tick = f.num(key, value)?,
            "game_stats_counter" => g.game_stats_counter = f.num(key, value)?,
            "history_counter" => g.history_counter = f.num(key, value)?,
            "rnd" => f.array(key, value, &mut g.rnd)?,
            "max_ever_flag_index" => world.flags.set_max_ever(f.num::<u32>(key, value)? as usize)?,
            "max_ever_building_index" => world.buildings.set_max_ever(f.num::<u32>(key, value)? as usize)?,
            "max_ever_serf_index" => world.serfs.set_max_ever(f.num::<u32>(key, value)? as usize)?,
            "max_ever_inventory_index" => {
                world.inventories.set_max_ever(f.num::<u32>(key, value)? as usize)?
            }
            "next_index" => g.next_index = f.num(key, value)?,
            "flag_search_counter" => world.search_counter = SearchCounter::new(f.num(key, value)?),
            "update_map_last_anim" => g.update_map_last_anim = f.num(key, value)?,
            "update_map_counter" => g.update_map_counter = f.num(key, value)?,
            "player_history_index" => f.array(key, value, &mut g.player_history_index)?,
            "player_history_counter" => f.array(key, value, &mut g.player_history_counter)?,
            "resource_history_index" => g.resource_history_index = f.num(key, value)?,
            "map.regions" => g.map_regions = f.num(key, value)?,
            "map.max_serfs_left" => g.map_max_serfs_left = f.num(key, value)?,
            "max_next_index" => g.max_next_index = f.num(key, value)?,
            "map.field_4A" => g.map_field_4a = f.num(key, value)?,
            "map.gold_deposit" => g.map_gold_deposit = f.num(key, value)?,
            "update_map_16_loop" => g.update_map_16_loop = f.num(key, value)?,
            "map.size" => g.map_size = f.num(key, value)?,
            "map.field_52" => g.map_field_52 = f.num(key, value)?,
            "map.62_5_times_regions" => g.map_62_5_times_regions = f.num(key, value)?,
            "map.gold_morale_factor" => g.map_gold_morale_factor = f.num(key, value)?,
            "winning_player" => g.winning_player = f.num(key, value)?,
            "player_score_leader" => g.player_score_leader = f.num(key, value)?,
            _ => f.unknown(key),
        }
    }
    Ok(())
}

fn read_player(p: &mut PlayerSettings, section: &Section, options: &TextOptions) -> Result<(), LoadError> {
    let f = Fields::new(section, options);

    for setting in &section.settings {
        let (key, value) = (setting.key.as_str(), setting.value.as_str());
        match key {
            "flags" => p.flags = f.num(key, value)?,
            "build" => p.build = f.num(key, value)?,
            "player_num" => p.player_num = f.num(key, value)?,
            "tool_prio" => f.array(key, value, &mut p.tool_prio)?,
            "resource_count" => f.array(key, value, &mut p.resource_count)?,
            "flag_prio" => f.array(key, value, &mut p.flag_prio)?,
            "serf_count" => f.array(key, value, &mut p.serf_count)?,
            "knight_occupation" => f.array(key, value, &mut p.knight_occupation)?,
            "completed_building_count" => f.array(key, value, &mut p.completed_building_count)?,
            "incomplete_building_count" => f.array(key, value, &mut p.incomplete_building_count)?,
            "inventory_prio" => f.array(key, value, &mut p.inventory_prio)?,
            "attacking_buildings" => f.array(key, value, &mut p.attacking_buildings)?,
            "current_sett_5_item" => p.current_sett_5_item = f.num(key, value)?,
            "current_sett_6_item" => p.current_sett_6_item = f.num(key, value)?,
            "map_cursor.col" => p.map_cursor_col = f.num(key, value)?,
            "map_cursor.row" => p.map_cursor_row = f.num(key, value)?,
            "map_cursor.type" => p.map_cursor_type = f.num(key, value)?,
            "panel_btn_type" => p.panel_btn_type = f.num(key, value)?,
            "building_height_after_level" => p.building_height_after_level = f.num(key, value)?,
            "building" => p.building = f.num(key, value)?,
            "castle_flag" => p.castle_flag = f.num(key, value)?,
            "castle_inventory" => p.castle_inventory = f.num(key, value)?,
            "cont_search_after_non_optimal_find" => p.cont_search_after_non_optimal_find = f.num(key, value)?,
            "knights_to_spawn" => p.knights_to_spawn = f.num(key, value)?,
            "field_110" => p.field_110 = f.num(key, value)?,
            "total_land_area" => p.total_land_area = f.num(key, value)?,
            "total_building_score" => p.total_building_score = f.num(key, value)?,
            "total_military_score" => p.total_military_score = f.num(key, value)?,
            "last_anim" => p.last_anim = f.num(key, value)?,
            "reproduction_counter" => p.reproduction_counter = f.num(key, value)?,
            "reproduction_reset" => p.reproduction_reset = f.num(key, value)?,
            "serf_to_knight_rate" => p.serf_to_knight_rate = f.num(key, value)?,
            "serf_to_knight_counter" => p.serf_to_knight_counter = f.num(key, value)?,
            "attacking_building_count" => p.attacking_building_count = f.num(key, value)?,
            "attacking_knights" => f.array(key, value, &mut p.attacking_knights)?,
            "total_attacking_knights" => p.total_attacking_knights = f.num(key, value)?,
            "building_attacked" => p.building_attacked = f.num(key, value)?,
            "knights_attacking" => p.knights_attacking = f.num(key, value)?,
            "analysis.goldore" => p.analysis_goldore = f.num(key, value)?,
            "analysis.ironore" => p.analysis_ironore = f.num(key, value)?,
            "analysis.coal" => p.analysis_coal = f.num(key, value)?,
            "analysis.stone" => p.analysis_stone = f.num(key, value)?,
            "food_stonemine" => p.food_stonemine = f.num(key, value)?,
            "food_coalmine" => p.food_coalmine = f.num(key, value)?,
            "food_ironmine" => p.food_ironmine = f.num(key, value)?,
            "food_goldmine" => p.food_goldmine = f.num(key, value)?,
            "planks_construction" => p.planks_construction = f.num(key, value)?,
            "planks_boatbuilder" => p.planks_boatbuilder = f.num(key, value)?,
            "planks_toolmaker" => p.planks_toolmaker = f.num(key, value)?,
            "steel_toolmaker" => p.steel_toolmaker = f.num(key, value)?,
            "steel_weaponsmith" => p.steel_weaponsmith = f.num(key, value)?,
            "coal_steelsmelter" => p.coal_steelsmelter = f.num(key, value)?,
            "coal_goldsmelter" => p.coal_goldsmelter = f.num(key, value)?,
            "coal_weaponsmith" => p.coal_weaponsmith = f.num(key, value)?,
            "wheat_pigfarm" => p.wheat_pigfarm = f.num(key, value)?,
            "wheat_mill" => p.wheat_mill = f.num(key, value)?,
            "castle_score" => p.castle_score = f.num(key, value)?,
            _ => f.unknown(key),
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

fn read_flag(section: &Section, options: &TextOptions, geometry: &MapGeometry) -> Result<Flag, LoadError> {
    let f = Fields::new(section, options);
    let mut flag = Flag::default();
    let mut links: Option<[u16; 6]> = None;
    let mut links_given = 0;
    let mut kinds = [0u8; 8];
    let mut dests = [0u16; 8];

    for setting in &section.settings {
        let (key, value) = (setting.key.as_str(), setting.value.as_str());
        match key {
            "pos" => flag.pos = f.pos(geometry, key, value)?,
            "search_num" => flag.search_num = f.num(key, value)?,
            "search_dir" => flag.search_dir = f.num(key, value)?,
            "path_con" => flag.path_con = f.num(key, value)?,
            "endpoints" => flag.endpoint = f.num(key, value)?,
            "transporter" => flag.transporter = f.num(key, value)?,
            "length" => f.array(key, value, &mut flag.length)?,
            "resources.type" => f.array(key, value, &mut kinds)?,
            "resources.dest" => f.array(key, value, &mut dests)?,
            "other_endpoint" => {
                let mut raw = links.unwrap_or_default();
                links_given = links_given.max(f.array_len(key, value, &mut raw)?);
                links = Some(raw);
            }
            "other_end_dir" => f.array(key, value, &mut flag.other_end_dir)?,
            "bld_flags" => flag.bld_flags = f.num(key, value)?,
            "stock1_prio" => flag.stock1_prio = f.num(key, value)?,
            "bld2_flags" => flag.bld2_flags = f.num(key, value)?,
            "stock2_prio" => flag.stock2_prio = f.num(key, value)?,
            _ => f.unknown(key),
        }
    }

    for (slot, (kind, dest)) in flag.slots.iter_mut().zip(kinds.into_iter().zip(dests)) {
        slot.kind = kind;
        slot.dest = dest;
    }

    let building_attached = flag.endpoint & ENDPOINT_BUILDING_BIT != 0;
    let links = match links {
        // The up-left entry must be present when a building is attached.
        Some(links) if !building_attached || links_given > Direction::UpLeft.index() => links,
        None if !building_attached => [0; 6],
        _ => {
            return Err(LoadError::MissingSetting {
                section: section.label(),
                key: "other_endpoint",
            });
        }
    };
    for (dir, &index) in links.iter().enumerate() {
        flag.other_end[dir] = match index {
            0 => None,
            _ if building_attached && dir == Direction::UpLeft.index() => Some(OtherEnd::Building(BuildingId(index))),
            _ => Some(OtherEnd::Flag(FlagId(index))),
        };
    }
    Ok(flag)
}

fn read_building(section: &Section, options: &TextOptions, geometry: &MapGeometry) -> Result<Building, LoadError> {
    let f = Fields::new(section, options);
    let mut building = Building::default();
    let mut inventory: Option<u16> = None;
    let mut flag: Option<u16> = None;
    let (mut level, mut planks_needed, mut stone_needed) = (0u16, 0u8, 0u8);

    for setting in &section.settings {
        let (key, value) = (setting.key.as_str(), setting.value.as_str());
        match key {
            "pos" => building.pos = f.pos(geometry, key, value)?,
            "bld" => building.bld = f.num(key, value)?,
            "serf" => building.serf = f.num(key, value)?,
            "flag_index" => building.flag = FlagId(f.num(key, value)?),
            "stock1" => building.stock1 = f.num(key, value)?,
            "stock2" => building.stock2 = f.num(key, value)?,
            "serf_index" => building.serf_index = SerfId(f.num(key, value)?),
            "progress" => building.progress = f.num(key, value)?,
            "inventory" => inventory = Some(f.num(key, value)?),
            "flag" => flag = Some(f.num(key, value)?),
            "level" => level = f.num(key, value)?,
            "planks_needed" => planks_needed = f.num(key, value)?,
            "stone_needed" => stone_needed = f.num(key, value)?,
            _ => f.unknown(key),
        }
    }

    let missing = |key: &'static str| LoadError::MissingSetting {
        section: section.label(),
        key,
    };
    building.detail = match building.detail_kind() {
        DetailKind::Inventory => BuildingDetail::Inventory(InventoryId(inventory.ok_or_else(|| missing("inventory"))?)),
        DetailKind::Flag => BuildingDetail::Flag(FlagId(flag.ok_or_else(|| missing("flag"))?)),
        DetailKind::Construction => BuildingDetail::Construction {
            level,
            planks_needed,
            stone_needed,
        },
    };
    Ok(building)
}

fn read_inventory(section: &Section, options: &TextOptions) -> Result<Inventory, LoadError> {
    let f = Fields::new(section, options);
    let mut inventory = Inventory::default();
    let mut queue_types = [-1i32; 2];
    let mut queue_dests = [0u16; 2];

    for setting in &section.settings {
        let (key, value) = (setting.key.as_str(), setting.value.as_str());
        match key {
            "player" => inventory.player = f.num(key, value)?,
            "res_dir" => inventory.res_dir = f.num(key, value)?,
            "flag" => inventory.flag = FlagId(f.num(key, value)?),
            "building" => inventory.building = BuildingId(f.num(key, value)?),
            "queue.type" => f.array(key, value, &mut queue_types)?,
            "queue.dest" => f.array(key, value, &mut queue_dests)?,
            "spawn_priority" => inventory.spawn_priority = f.num(key, value)?,
            "resources" => f.array(key, value, &mut inventory.resources)?,
            "serfs" => f.array(key, value, &mut inventory.serfs)?,
            _ => f.unknown(key),
        }
    }

    for (entry, (kind, dest)) in inventory.out_queue.iter_mut().zip(queue_types.into_iter().zip(queue_dests)) {
        entry.resource = u8::try_from(kind).ok();
        entry.dest = dest;
    }
    Ok(inventory)
}

/// Typed access to the `state.*` keys of a serf section, last value wins.
struct StateKeys<'a> {
    fields: Fields<'a>,
    section: &'a Section,
}

impl StateKeys<'_> {
    fn get<T: FromInt + Default>(&self, key: &str) -> Result<T, LoadError> {
        match self.section.settings.iter().rev().find(|s| s.key == key) {
            Some(setting) => self.fields.num(key, &setting.value),
            None => Ok(T::default()),
        }
    }

    fn walking(&self) -> Result<Walking, LoadError> {
        Ok(Walking {
            res: self.get("state.res")?,
            dest: self.get("state.dest")?,
            dir: self.get("state.dir")?,
            wait_counter: self.get("state.wait_counter")?,
        })
    }

    fn leaving(&self) -> Result<Leaving, LoadError> {
        Ok(Leaving {
            field_b: self.get("state.field_B")?,
            dest: self.get("state.dest")?,
            dest2: self.get("state.dest2")?,
            dir: self.get("state.dir")?,
            next_state: self.get("state.next_state")?,
        })
    }

    fn resource_out(&self) -> Result<ResourceOut, LoadError> {
        Ok(ResourceOut {
            res: self.get("state.res")?,
            res_dest: self.get("state.res_dest")?,
            next_state: self.get("state.next_state")?,
        })
    }

    fn free_walking(&self) -> Result<FreeWalking, LoadError> {
        Ok(FreeWalking {
            dist1: self.get("state.dist1")?,
            dist2: self.get("state.dist2")?,
            neg_dist1: self.get("state.neg_dist")?,
            neg_dist2: self.get("state.neg_dist2")?,
            flags: self.get("state.flags")?,
        })
    }

    fn on_path(&self) -> Result<OnPath, LoadError> {
        Ok(OnPath {
            rev_dir: self.get("state.rev_dir")?,
            flag: FlagId(self.get("state.flag")?),
            field_e: self.get("state.field_E")?,
        })
    }

    fn state(&self, state_code: u8) -> Result<SerfState, LoadError> {
        let mode = || self.get::<i8>("state.mode");
        let next_knight = || self.get::<u16>("state.next_knight");

        Ok(match state_code {
            code::IDLE_IN_STOCK => SerfState::IdleInStock {
                inventory: InventoryId(self.get("state.inventory")?),
            },
            code::WALKING => SerfState::Walking(self.walking()?),
            code::TRANSPORTING => SerfState::Transporting(self.walking()?),
            code::DELIVERING => SerfState::Delivering(self.walking()?),
            code::ENTERING_BUILDING => SerfState::EnteringBuilding {
                field_b: self.get("state.field_B")?,
                slope_len: self.get("state.slope_len")?,
            },
            code::LEAVING_BUILDING => SerfState::LeavingBuilding(self.leaving()?),
            code::READY_TO_LEAVE => SerfState::ReadyToLeave(self.leaving()?),
            code::READY_TO_ENTER => SerfState::ReadyToEnter {
                field_b: self.get("state.field_B")?,
            },
            code::LOST => SerfState::Lost {
                field_b: self.get("state.field_B")?,
            },
            code::DIGGING => SerfState::Digging(Digging {
                h_index: self.get("state.h_index")?,
                target_h: self.get("state.target_h")?,
                dig_pos: self.get("state.dig_pos")?,
                substate: self.get("state.substate")?,
            }),
            code::BUILDING => SerfState::Building(Constructing {
                mode: mode()?,
                bld_index: self.get("state.bld_index")?,
                material_step: self.get("state.material_step")?,
                counter: self.get("state.counter")?,
            }),
            code::BUILDING_CASTLE => SerfState::BuildingCastle {
                inventory: InventoryId(self.get("state.inv_index")?),
            },
            code::MOVE_RESOURCE_OUT => SerfState::MoveResourceOut(self.resource_out()?),
            code::DROP_RESOURCE_OUT => SerfState::DropResourceOut(self.resource_out()?),
            code::READY_TO_LEAVE_INVENTORY => SerfState::ReadyToLeaveInventory(LeavingInventory {
                mode: mode()?,
                dest: self.get("state.dest")?,
                inventory: InventoryId(self.get("state.inv_index")?),
            }),
            code::FREE_WALKING => SerfState::FreeWalking(self.free_walking()?),
            code::LOGGING => SerfState::Logging(self.free_walking()?),
            code::PLANTING => SerfState::Planting(self.free_walking()?),
            code::STONECUTTING => SerfState::Stonecutting(self.free_walking()?),
            code::STONECUTTER_FREE_WALKING => SerfState::StonecutterFreeWalking(self.free_walking()?),
            code::FISHING => SerfState::Fishing(self.free_walking()?),
            code::FARMING => SerfState::Farming(self.free_walking()?),
            code::SAMPLING_GEO_SPOT => SerfState::SamplingGeoSpot(self.free_walking()?),
            code::SAWING => SerfState::Sawing { mode: mode()? },
            code::MILLING => SerfState::Milling { mode: mode()? },
            code::BAKING => SerfState::Baking { mode: mode()? },
            code::PIGFARMING => SerfState::PigFarming { mode: mode()? },
            code::BUTCHERING => SerfState::Butchering { mode: mode()? },
            code::MAKING_WEAPON => SerfState::MakingWeapon { mode: mode()? },
            code::MAKING_TOOL => SerfState::MakingTool { mode: mode()? },
            code::BUILDING_BOAT => SerfState::BuildingBoat { mode: mode()? },
            code::MINING => SerfState::Mining(Mining {
                substate: self.get("state.substate")?,
                res: self.get("state.res")?,
                deposit: self.get("state.deposit")?,
            }),
            code::SMELTING => SerfState::Smelting(Smelting {
                mode: mode()?,
                counter: self.get("state.counter")?,
                kind: self.get("state.type")?,
            }),
            code::IDLE_ON_PATH => SerfState::IdleOnPath(self.on_path()?),
            code::WAIT_IDLE_ON_PATH => SerfState::WaitIdleOnPath(self.on_path()?),
            code::WAKE_AT_FLAG => SerfState::WakeAtFlag(self.on_path()?),
            code::WAKE_ON_PATH => SerfState::WakeOnPath(self.on_path()?),
            code::DEFENDING_HUT => SerfState::DefendingHut {
                next_knight: next_knight()?,
            },
            code::DEFENDING_TOWER => SerfState::DefendingTower {
                next_knight: next_knight()?,
            },
            code::DEFENDING_FORTRESS => SerfState::DefendingFortress {
                next_knight: next_knight()?,
            },
            code::DEFENDING_CASTLE => SerfState::DefendingCastle {
                next_knight: next_knight()?,
            },
            other => SerfState::without_payload(other).unwrap_or(SerfState::Other(other)),
        })
    }
}

fn read_serf(section: &Section, options: &TextOptions, geometry: &MapGeometry) -> Result<Serf, LoadError> {
    let f = Fields::new(section, options);
    let mut serf = Serf::default();
    let mut state_code = code::NULL;

    for setting in &section.settings {
        let (key, value) = (setting.key.as_str(), setting.value.as_str());
        match key {
            "type" => serf.kind = f.num(key, value)?,
            "animation" => serf.animation = f.num(key, value)?,
            "counter" => serf.counter = f.num(key, value)?,
            "pos" => serf.pos = f.pos(geometry, key, value)?,
            "anim" => serf.anim = f.num(key, value)?,
            "state" => state_code = f.num(key, value)?,
            _ if key.starts_with("state.") => {}
            _ => f.unknown(key),
        }
    }

    let keys = StateKeys { fields: f, section };
    serf.state = keys.state(state_code)?;
    Ok(serf)
}

// ---------------------------------------------------------------------------
// Map
// ---------------------------------------------------------------------------

fn map_coordinates(section: &Section, options: &TextOptions, geometry: &MapGeometry) -> Result<(u32, u32), LoadError> {
    let param = section.param.as_deref().unwrap_or("");
    let invalid = || LoadError::InvalidSectionParam {
        section: "map",
        param: param.to_string(),
    };
    let mut parts = param.split_whitespace();
    let mut next = || -> Result<i64, LoadError> {
        let part = parts.next().unwrap_or("");
        if options.strict_numbers {
            parse_exact_int(part).ok_or_else(invalid)
        } else {
            Ok(parse_leading_int(part))
        }
    };
    let (col, row) = (next()?, next()?);
    match (u32::try_from(col), u32::try_from(row)) {
        (Ok(col), Ok(row)) if col < geometry.cols() && row < geometry.rows() => Ok((col, row)),
        _ => Err(invalid()),
    }
}

fn read_tile(world: &mut World, section: &Section, options: &TextOptions) -> Result<(), LoadError> {
    let (col, row) = map_coordinates(section, options, world.geometry())?;
    let f = Fields::new(section, options);

    let (mut deep_water, mut paths, mut has_owner, mut owner, mut height) = (0u8, 0u8, 0u8, 0u8, 0u8);
    let (mut up, mut down, mut object, mut water, mut serf) = (0u8, 0u8, 0u8, 0u8, 0u16);
    let mut object_index: Option<u16> = None;
    let (mut idle_serf, mut player, mut fish, mut resource_type, mut amount) = (0u8, 0u8, 0u8, 0u8, 0u8);

    for setting in &section.settings {
        let (key, value) = (setting.key.as_str(), setting.value.as_str());
        match key {
            "deep_water" => deep_water = f.num(key, value)?,
            "paths" => paths = f.num(key, value)?,
            "has_owner" => has_owner = f.num(key, value)?,
            "owner" => owner = f.num(key, value)?,
            "height" => height = f.num(key, value)?,
            "type.up" => up = f.num(key, value)?,
            "type.down" => down = f.num(key, value)?,
            "object" => object = f.num(key, value)?,
            "water" => water = f.num(key, value)?,
            "serf_index" => serf = f.num(key, value)?,
            "object_index" => object_index = Some(f.num(key, value)?),
            "idle_serf" => idle_serf = f.num(key, value)?,
            "player" => player = f.num(key, value)?,
            "fish" => fish = f.num(key, value)?,
            "resource.type" => resource_type = f.num(key, value)?,
            "resource.amount" => amount = f.num(key, value)?,
            _ => f.unknown(key),
        }
    }

    let mut tile = Tile::default();
    tile.set_deep_water(deep_water & 1 != 0);
    tile.set_paths(paths);
    tile.set_has_owner(has_owner & 1 != 0);
    tile.set_owner(owner & 0x03);
    tile.set_height(height);
    tile.set_terrain_up(up & 0x0f);
    tile.set_terrain_down(down);
    tile.set_water(water & 1 != 0);
    tile.set_serf_index(SerfId(serf));

    let object = MapObject(object & 0x7f);
    if object.is_indexed() {
        let index = object_index.ok_or_else(|| LoadError::MissingSetting {
            section: section.label(),
            key: "object_index",
        })?;
        tile.set_indexed_object(object, index);
    } else {
        tile.set_object(object);
        tile.set_idle_serf(idle_serf & 1 != 0);
        tile.set_player(player);
        if tile.deep_water() {
            tile.set_fish(fish);
        } else {
            tile.set_resource_type(resource_type & 0x07);
            tile.set_resource_amount(amount);
        }
    }

    let pos = world.geometry().encode(col, row);
    *world.tiles.get_mut(pos) = tile;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text_encode::write_text;
    use settler_core::building::{BuildingType, pack_bld};
    use settler_core::test_utils::*;

    const MINIMAL: &str = "[globals]\nmap.col_size=5\nmap.row_size=5\n";

    fn load(text: &str) -> Result<World, LoadError> {
        read_text(text, &CodecConfig::default())
    }

    fn reload(world: &World) -> World {
        let mut out = Vec::new();
        write_text(world, &mut out).unwrap();
        load(&String::from_utf8(out).unwrap()).unwrap()
    }

    // -----------------------------------------------------------------------
    // Test 1: minimal file
    // -----------------------------------------------------------------------
    #[test]
    fn globals_alone_give_an_empty_paused_world() {
        let world = load(MINIMAL).unwrap();
        assert_eq!(world.geometry().cols(), 32);
        assert_eq!(world.tiles.len(), 1024);
        assert_eq!(world.flags.max_ever(), 1);
        assert!(world.flags.is_allocated(FlagId(0)));
        assert_eq!(world.globals.game_speed, 0);
        assert_eq!(world.globals.game_speed_save, 2);
    }

    #[test]
    fn missing_globals_or_sizes_fail() {
        assert!(matches!(load("[flag 1]\npos=1,1\n"), Err(LoadError::MissingSection("globals"))));
        assert!(matches!(
            load("[globals]\nmap.col_size=5\n"),
            Err(LoadError::MissingSetting { key: "map.row_size", .. })
        ));
        assert!(matches!(load("[globals]\nmap.col_size=0\nmap.row_size=5\n"), Err(LoadError::Geometry(_))));
    }

    // -----------------------------------------------------------------------
    // Test 2: entities
    // -----------------------------------------------------------------------
    #[test]
    fn flag_sections_allocate_and_cover() {
        let text = format!("{MINIMAL}\n[flag 7]\npos=3,4\nendpoints=1\npath_con=1\nother_endpoint=2\nlength=9\n");
        let world = load(&text).unwrap();
        assert_eq!(world.flags.max_ever(), 8);
        assert!(world.flags.is_allocated(FlagId(7)));
        assert!(!world.flags.is_allocated(FlagId(6)));
        let flag = world.flags.get(FlagId(7));
        assert_eq!(flag.pos, world.geometry().encode(3, 4));
        assert_eq!(flag.neighbor(Direction::Right), Some(FlagId(2)));
        assert_eq!(flag.length[0], 9);
        assert_eq!(flag.other_end[1], None);
    }

    #[test]
    fn building_link_needs_endpoint_bit() {
        let text = format!("{MINIMAL}[flag 1]\nendpoints=64\nother_endpoint=0,0,0,0,5,0\n");
        let world = load(&text).unwrap();
        assert_eq!(world.flags.get(FlagId(1)).building(), Some(BuildingId(5)));

        let text = format!("{MINIMAL}[flag 1]\nendpoints=64\n");
        assert!(matches!(
            load(&text),
            Err(LoadError::MissingSetting { key: "other_endpoint", .. })
        ));
    }

    #[test]
    fn short_link_array_cannot_drop_a_building() {
        let text = format!("{MINIMAL}[flag 1]\nendpoints=64\nother_endpoint=1\n");
        assert!(matches!(
            load(&text),
            Err(LoadError::MissingSetting { key: "other_endpoint", .. })
        ));

        let text = format!("{MINIMAL}[flag 1]\nendpoints=64\nother_endpoint=0,0,0,0,7\n");
        assert_eq!(load(&text).unwrap().flags.get(FlagId(1)).building(), Some(BuildingId(7)));

        // Without the building bit a short array is fine.
        let text = format!("{MINIMAL}[flag 1]\npath_con=1\nendpoints=1\nother_endpoint=2\n");
        assert_eq!(load(&text).unwrap().flags.get(FlagId(1)).neighbor(Direction::Right), Some(FlagId(2)));
    }

    #[test]
    fn building_detail_follows_status() {
        let castle = pack_bld(0, BuildingType::Castle, true);
        let hut = pack_bld(1, BuildingType::Lumberjack, true);
        let site = pack_bld(1, BuildingType::Lumberjack, false);
        let text = format!(
            "{MINIMAL}[building 1]\nbld={castle}\ninventory=3\n\n\
             [building 2]\nbld={hut}\nflag=4\ninventory=9\n\n\
             [building 3]\nbld={site}\nlevel=300\nplanks_needed=2\nstone_needed=1\n"
        );
        let world = load(&text).unwrap();
        assert_eq!(world.buildings.get(BuildingId(1)).detail, BuildingDetail::Inventory(InventoryId(3)));
        assert_eq!(world.buildings.get(BuildingId(2)).detail, BuildingDetail::Flag(FlagId(4)));
        assert_eq!(
            world.buildings.get(BuildingId(3)).detail,
            BuildingDetail::Construction {
                level: 300,
                planks_needed: 2,
                stone_needed: 1
            }
        );

        let text = format!("{MINIMAL}[building 1]\nbld={castle}\n");
        assert!(matches!(load(&text), Err(LoadError::MissingSetting { key: "inventory", .. })));
    }

    #[test]
    fn serf_state_keys_may_precede_state() {
        let text = format!(
            "{MINIMAL}[serf 2]\nstate.flag=6\nstate.rev_dir=3\nstate={}\ntype=13\npos=1,1\n",
            code::WAKE_ON_PATH
        );
        let world = load(&text).unwrap();
        let serf = world.serfs.get(SerfId(2));
        assert_eq!(serf.kind, 13);
        assert_eq!(
            serf.state,
            SerfState::WakeOnPath(OnPath {
                rev_dir: 3,
                flag: FlagId(6),
                field_e: 0
            })
        );
    }

    #[test]
    fn empty_out_queue_reads_back_as_none() {
        let text = format!("{MINIMAL}[inventory 0]\nqueue.type=-1,7\nqueue.dest=0,12\n");
        let world = load(&text).unwrap();
        let inv = world.inventories.get(InventoryId(0));
        assert_eq!(inv.out_queue[0].resource, None);
        assert_eq!(inv.out_queue[1].resource, Some(7));
        assert_eq!(inv.out_queue[1].dest, 12);
    }

    // -----------------------------------------------------------------------
    // Test 3: map tiles
    // -----------------------------------------------------------------------
    #[test]
    fn tiles_pack_fields_and_follow_object() {
        let text = format!(
            "{MINIMAL}[map 3 2]\npaths=5\nheight=20\nhas_owner=1\nowner=2\nobject=1\nobject_index=4\n\n\
             [map 4 2]\ndeep_water=1\nfish=200\nplayer=3\nidle_serf=1\n\n\
             [map 5 2]\nresource.type=2\nresource.amount=17\nobject=8\nwater=1\n"
        );
        let world = load(&text).unwrap();
        let g = world.geometry();

        let flag_tile = world.tiles.get(g.encode(3, 2));
        assert!(flag_tile.has_flag());
        assert_eq!(flag_tile.object_index(), Some(4));
        assert_eq!(flag_tile.paths(), 5);
        assert_eq!((flag_tile.height(), flag_tile.owner()), (20, 2));
        assert!(flag_tile.has_owner());

        let sea = world.tiles.get(g.encode(4, 2));
        assert_eq!(sea.fish(), 200);
        assert_eq!(sea.player(), 3);
        assert!(sea.idle_serf());

        let tree = world.tiles.get(g.encode(5, 2));
        assert_eq!((tree.resource_type(), tree.resource_amount()), (2, 17));
        assert!(tree.water());
        assert!(!tree.has_flag());
    }

    #[test]
    fn map_params_must_be_on_the_map() {
        let text = format!("{MINIMAL}[map 32 0]\n");
        assert!(matches!(load(&text), Err(LoadError::InvalidSectionParam { section: "map", .. })));
        let text = format!("{MINIMAL}[map 1 1]\nobject=3\n");
        assert!(matches!(
            load(&text),
            Err(LoadError::MissingSetting { key: "object_index", .. })
        ));
    }

    #[test]
    fn player_index_is_bounded() {
        let text = format!("{MINIMAL}[player 4]\nflags=64\n");
        assert!(matches!(load(&text), Err(LoadError::InvalidSectionParam { section: "player", .. })));
        let text = format!("{MINIMAL}[player 3]\nflags=64\ncastle_score=-12\n");
        let world = load(&text).unwrap();
        assert!(world.players[3].is_active());
        assert_eq!(world.players[3].castle_score, -12);
    }

    #[test]
    fn indices_past_the_limit_are_rejected() {
        let config = CodecConfig {
            limits: settler_core::table::TableLimits {
                serfs: 8,
                ..Default::default()
            },
            ..CodecConfig::default()
        };
        let text = format!("{MINIMAL}[serf 8]\ntype=1\n");
        assert!(matches!(read_text(&text, &config), Err(LoadError::Table(_))));
        let text = format!("{MINIMAL}[flag 70000]\n");
        assert!(matches!(load(&text), Err(LoadError::Table(_))));
    }

    // -----------------------------------------------------------------------
    // Test 4: write then read
    // -----------------------------------------------------------------------
    #[test]
    fn written_worlds_read_back_equal() {
        let mut world = small_world();
        world.players[0].flags = settler_core::player::PLAYER_ACTIVE_BIT;
        world.players[0].attacking_buildings[63] = 9;
        world.globals.game_tick = 123_456;
        world.globals.rnd = [1, 2, 3];
        world.search_counter = SearchCounter::new(77);
        let ids = flag_chain(&mut world, 2, 2, 3);
        let castle = place_building(&mut world, ids[0], BuildingType::Castle, 0);
        place_building(&mut world, ids[2], BuildingType::Lumberjack, 0);
        let inv = inventory_of(&world, castle).unwrap();
        world.inventories.get_mut(inv).resources[4] = 30;
        world.inventories.get_mut(inv).out_queue[0].resource = Some(0);

        let serf = world.serfs.allocate().unwrap();
        world.serfs.get_mut(serf).state = SerfState::IdleOnPath(OnPath {
            rev_dir: 2,
            flag: ids[1],
            field_e: 5,
        });
        let deep = world.geometry().encode(20, 20);
        world.tiles.get_mut(deep).set_deep_water(true);
        world.tiles.get_mut(deep).set_fish(140);

        let mut expected = world.clone();
        expected.globals.pause_after_load();
        assert_eq!(reload(&world), expected);
    }
}
