//! Per-player settings and statistics carried in a save.

use serde::{Deserialize, Serialize};

/// Number of player slots in a world.
pub const PLAYER_COUNT: usize = 4;

/// Bit of [`PlayerSettings::flags`] set for a player taking part in the game.
pub const PLAYER_ACTIVE_BIT: u8 = 1 << 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSettings {
    pub tool_prio: [u16; 9],
    pub resource_count: [u8; 26],
    pub flag_prio: [u8; 26],
    pub serf_count: [u16; 27],
    pub knight_occupation: [u8; 4],
    pub player_num: u16,
    pub flags: u8,
    pub build: u8,
    pub completed_building_count: [u16; 23],
    pub incomplete_building_count: [u16; 23],
    pub inventory_prio: [u8; 26],
    #[serde(with = "serde_array_64")]
    pub attacking_buildings: [u16; 64],
    pub current_sett_5_item: u16,
    pub map_cursor_col: u16,
    pub map_cursor_row: u16,
    pub map_cursor_type: u8,
    pub panel_btn_type: u8,
    pub building_height_after_level: u16,
    pub building: u16,
    pub castle_flag: u16,
    pub castle_inventory: u16,
    pub cont_search_after_non_optimal_find: u16,
    pub knights_to_spawn: u16,
    pub field_110: u16,
    pub total_land_area: u32,
    pub total_building_score: u32,
    pub total_military_score: u32,
    pub last_anim: u16,
    pub reproduction_counter: u16,
    pub reproduction_reset: u16,
    pub serf_to_knight_rate: u16,
    pub serf_to_knight_counter: u16,
    pub attacking_building_count: u16,
    pub attacking_knights: [u16; 4],
    pub total_attacking_knights: u16,
    pub building_attacked: u16,
    pub knights_attacking: u16,
    pub analysis_goldore: u16,
    pub analysis_ironore: u16,
    pub analysis_coal: u16,
    pub analysis_stone: u16,
    pub food_stonemine: u16,
    pub food_coalmine: u16,
    pub food_ironmine: u16,
    pub food_goldmine: u16,
    pub planks_construction: u16,
    pub planks_boatbuilder: u16,
    pub planks_toolmaker: u16,
    pub steel_toolmaker: u16,
    pub steel_weaponsmith: u16,
    pub coal_steelsmelter: u16,
    pub coal_goldsmelter: u16,
    pub coal_weaponsmith: u16,
    pub wheat_pigfarm: u16,
    pub wheat_mill: u16,
    pub current_sett_6_item: u16,
    pub castle_score: i16,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            tool_prio: [0; 9],
            resource_count: [0; 26],
            flag_prio: [0; 26],
            serf_count: [0; 27],
            knight_occupation: [0; 4],
            player_num: 0,
            flags: 0,
            build: 0,
            completed_building_count: [0; 23],
            incomplete_building_count: [0; 23],
            inventory_prio: [0; 26],
            attacking_buildings: [0; 64],
            current_sett_5_item: 0,
            map_cursor_col: 0,
            map_cursor_row: 0,
            map_cursor_type: 0,
            panel_btn_type: 0,
            building_height_after_level: 0,
            building: 0,
            castle_flag: 0,
            castle_inventory: 0,
            cont_search_after_non_optimal_find: 0,
            knights_to_spawn: 0,
            field_110: 0,
            total_land_area: 0,
            total_building_score: 0,
            total_military_score: 0,
            last_anim: 0,
            reproduction_counter: 0,
            reproduction_reset: 0,
            serf_to_knight_rate: 0,
            serf_to_knight_counter: 0,
            attacking_building_count: 0,
            attacking_knights: [0; 4],
            total_attacking_knights: 0,
            building_attacked: 0,
            knights_attacking: 0,
            analysis_goldore: 0,
            analysis_ironore: 0,
            analysis_coal: 0,
            analysis_stone: 0,
            food_stonemine: 0,
            food_coalmine: 0,
            food_ironmine: 0,
            food_goldmine: 0,
            planks_construction: 0,
            planks_boatbuilder: 0,
            planks_toolmaker: 0,
            steel_toolmaker: 0,
            steel_weaponsmith: 0,
            coal_steelsmelter: 0,
            coal_goldsmelter: 0,
            coal_weaponsmith: 0,
            wheat_pigfarm: 0,
            wheat_mill: 0,
            current_sett_6_item: 0,
            castle_score: 0,
        }
    }
}

impl PlayerSettings {
    pub fn is_active(&self) -> bool {
        self.flags & PLAYER_ACTIVE_BIT != 0
    }
}

/// Serde support for the 64-entry attack list; serde's derive stops at 32.
mod serde_array_64 {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &[u16; 64], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(value.iter())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u16; 64], D::Error> {
        let items = Vec::<u16>::deserialize(deserializer)?;
        let len = items.len();
        items
            .try_into()
            .map_err(|_| D::Error::invalid_length(len, &"64 entries"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_bit() {
        let mut player = PlayerSettings::default();
        assert!(!player.is_active());
        player.flags = PLAYER_ACTIVE_BIT | 0x01;
        assert!(player.is_active());
    }
}
