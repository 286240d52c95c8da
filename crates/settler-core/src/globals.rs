//! Game-wide scalars stored alongside the map.
//!
//! Most fields are opaque counters owned by the simulation; they are kept
//! here so that a load followed by a save reproduces them exactly. The table
//! high-water marks and the flag search counter are not in this struct:
//! they live with the tables and the [`SearchCounter`](crate::search::SearchCounter).

use crate::pos::MapPos;
use serde::{Deserialize, Serialize};

/// Game speed restored when a paused, freshly loaded game is resumed.
pub const DEFAULT_GAME_SPEED: u32 = 2;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameGlobals {
    /// Legacy scalar map size.
    pub map_size: u16,
    pub split: u8,
    pub update_map_initial_pos: MapPos,
    pub cfg_left: u8,
    pub cfg_right: u8,
    pub game_type: u16,
    pub game_tick: u32,
    pub game_stats_counter: u16,
    pub history_counter: u16,
    pub rnd: [u16; 3],
    pub next_index: u16,
    pub update_map_last_anim: u16,
    pub update_map_counter: u16,
    pub player_history_index: [u16; 4],
    pub player_history_counter: [u16; 3],
    pub resource_history_index: u16,
    pub map_regions: u16,
    pub map_max_serfs_left: u16,
    pub max_next_index: u16,
    pub map_field_4a: u16,
    pub map_gold_deposit: u32,
    pub update_map_16_loop: u16,
    pub map_field_52: u16,
    pub map_62_5_times_regions: u16,
    pub map_gold_morale_factor: u16,
    pub winning_player: u16,
    pub player_score_leader: u8,
    /// Current speed; zero means paused.
    pub game_speed: u32,
    /// Speed to resume with.
    pub game_speed_save: u32,
}

impl GameGlobals {
    /// Pause the game and arm the default resume speed, as done after
    /// every load.
    pub fn pause_after_load(&mut self) {
        self.game_speed = 0;
        self.game_speed_save = DEFAULT_GAME_SPEED;
    }
}
