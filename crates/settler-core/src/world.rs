//! The complete persisted game state.

use crate::building::Building;
use crate::flag::Flag;
use crate::globals::GameGlobals;
use crate::id::{BuildingId, FlagId, InventoryId, SerfId};
use crate::inventory::Inventory;
use crate::player::{PLAYER_COUNT, PlayerSettings};
use crate::pos::MapGeometry;
use crate::search::{FlagTable, SearchCounter, SearchOutcome, search_single};
use crate::serf::Serf;
use crate::table::{EntityTable, TableKind, TableLimits};
use crate::tile::TileStore;
use serde::{Deserialize, Serialize};

pub type BuildingTable = EntityTable<BuildingId, Building>;
pub type SerfTable = EntityTable<SerfId, Serf>;
pub type InventoryTable = EntityTable<InventoryId, Inventory>;

/// Everything a save file restores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct World {
    pub tiles: TileStore,
    pub flags: FlagTable,
    pub buildings: BuildingTable,
    pub serfs: SerfTable,
    pub inventories: InventoryTable,
    pub players: [PlayerSettings; PLAYER_COUNT],
    pub globals: GameGlobals,
    pub search_counter: SearchCounter,
}

impl World {
    /// Empty world with zeroed tiles and sentinel-only tables.
    pub fn new(geometry: MapGeometry, limits: &TableLimits) -> Self {
        Self {
            tiles: TileStore::new(geometry),
            flags: EntityTable::new(TableKind::Flag, limits.flags),
            buildings: EntityTable::new(TableKind::Building, limits.buildings),
            serfs: EntityTable::new(TableKind::Serf, limits.serfs),
            inventories: EntityTable::new(TableKind::Inventory, limits.inventories),
            players: Default::default(),
            globals: GameGlobals::default(),
            search_counter: SearchCounter::default(),
        }
    }

    pub fn geometry(&self) -> &MapGeometry {
        self.tiles.geometry()
    }

    /// Search the flag network outward from `source`.
    pub fn search_single<F>(
        &mut self,
        source: FlagId,
        callback: F,
        land_only: bool,
        transporter_only: bool,
    ) -> SearchOutcome
    where
        F: FnMut(FlagId, &Flag) -> bool,
    {
        search_single(
            &mut self.search_counter,
            &mut self.flags,
            source,
            callback,
            land_only,
            transporter_only,
        )
    }

    /// Players with the active bit set, with their slot numbers.
    pub fn active_players(&self) -> impl Iterator<Item = (usize, &PlayerSettings)> + '_ {
        self.players.iter().enumerate().filter(|(_, p)| p.is_active())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::PLAYER_ACTIVE_BIT;

    #[test]
    fn new_world_is_sentinel_only() {
        let world = World::new(MapGeometry::new(5, 5).unwrap(), &TableLimits::default());
        assert_eq!(world.tiles.len(), 1024);
        assert_eq!(world.flags.max_ever(), 1);
        assert!(world.serfs.is_allocated(SerfId(0)));
        assert_eq!(world.active_players().count(), 0);
    }

    #[test]
    fn limits_are_applied_per_table() {
        let limits = TableLimits {
            flags: 10,
            ..TableLimits::default()
        };
        let world = World::new(MapGeometry::new(4, 4).unwrap(), &limits);
        assert_eq!(world.flags.limit(), 10);
        assert_eq!(world.buildings.limit(), limits.buildings);
    }

    #[test]
    fn active_players_filter() {
        let mut world = World::new(MapGeometry::new(4, 4).unwrap(), &TableLimits::default());
        world.players[2].flags = PLAYER_ACTIVE_BIT;
        let active: Vec<usize> = world.active_players().map(|(i, _)| i).collect();
        assert_eq!(active, vec![2]);
    }
}
