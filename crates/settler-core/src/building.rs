//! Buildings and their construction state.
//!
//! The `bld` byte packs the owner (bits 0-1), the building type (bits 2-6)
//! and an under-construction bit (7). Bit 4 of the `serf` byte marks a
//! building on fire. Which detail a building carries follows from those
//! bits: finished stocks and castles point at an inventory, other finished
//! buildings at a flag, and anything else at its construction progress.

use crate::id::{FlagId, InventoryId, SerfId};
use crate::pos::MapPos;
use serde::{Deserialize, Serialize};

const BLD_CONSTRUCTION_BIT: u8 = 0x80;
const SERF_BURNING_BIT: u8 = 0x10;

/// Building types in legacy numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum BuildingType {
    None = 0,
    Fisher,
    Lumberjack,
    Boatbuilder,
    Stonecutter,
    StoneMine,
    CoalMine,
    IronMine,
    GoldMine,
    Forester,
    Stock,
    Hut,
    Farm,
    Butcher,
    PigFarm,
    Mill,
    Baker,
    Sawmill,
    SteelSmelter,
    Toolmaker,
    WeaponSmith,
    Tower,
    Fortress,
    GoldSmelter,
    Castle,
}

impl BuildingType {
    const ALL: [BuildingType; 25] = [
        BuildingType::None,
        BuildingType::Fisher,
        BuildingType::Lumberjack,
        BuildingType::Boatbuilder,
        BuildingType::Stonecutter,
        BuildingType::StoneMine,
        BuildingType::CoalMine,
        BuildingType::IronMine,
        BuildingType::GoldMine,
        BuildingType::Forester,
        BuildingType::Stock,
        BuildingType::Hut,
        BuildingType::Farm,
        BuildingType::Butcher,
        BuildingType::PigFarm,
        BuildingType::Mill,
        BuildingType::Baker,
        BuildingType::Sawmill,
        BuildingType::SteelSmelter,
        BuildingType::Toolmaker,
        BuildingType::WeaponSmith,
        BuildingType::Tower,
        BuildingType::Fortress,
        BuildingType::GoldSmelter,
        BuildingType::Castle,
    ];

    /// Decode a 5-bit type code. Codes past the castle are unused.
    pub fn from_code(code: u8) -> Option<BuildingType> {
        Self::ALL.get(code as usize).copied()
    }

    /// Buildings that own an inventory once finished.
    pub fn has_inventory(self) -> bool {
        matches!(self, BuildingType::Stock | BuildingType::Castle)
    }
}

/// How the detail of a building is to be read, derived from its status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailKind {
    Inventory,
    Flag,
    Construction,
}

/// Detail payload of a building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildingDetail {
    /// Finished stock or castle.
    Inventory(InventoryId),
    /// Other finished building.
    Flag(FlagId),
    /// Not finished yet, or burning.
    Construction {
        level: u16,
        planks_needed: u8,
        stone_needed: u8,
    },
}

impl Default for BuildingDetail {
    fn default() -> Self {
        BuildingDetail::Construction {
            level: 0,
            planks_needed: 0,
            stone_needed: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    pub pos: MapPos,
    pub bld: u8,
    pub serf: u8,
    pub flag: FlagId,
    pub stock1: u8,
    pub stock2: u8,
    pub serf_index: SerfId,
    pub progress: u16,
    pub detail: BuildingDetail,
}

impl Building {
    /// Raw 5-bit type code.
    pub fn type_code(&self) -> u8 {
        (self.bld >> 2) & 0x1f
    }

    pub fn building_type(&self) -> Option<BuildingType> {
        BuildingType::from_code(self.type_code())
    }

    pub fn player(&self) -> u8 {
        self.bld & 0x03
    }

    pub fn is_done(&self) -> bool {
        self.bld & BLD_CONSTRUCTION_BIT == 0
    }

    pub fn is_burning(&self) -> bool {
        self.serf & SERF_BURNING_BIT != 0
    }

    /// Which detail variant the status bits call for.
    pub fn detail_kind(&self) -> DetailKind {
        Self::detail_kind_for(self.bld, self.serf)
    }

    /// Same as [`Building::detail_kind`], from raw status bytes.
    pub fn detail_kind_for(bld: u8, serf: u8) -> DetailKind {
        let building = Building {
            bld,
            serf,
            ..Building::default()
        };
        let kind = building.building_type();
        let castle = kind == Some(BuildingType::Castle);
        if building.is_burning() || !(building.is_done() || castle) {
            DetailKind::Construction
        } else if kind.is_some_and(BuildingType::has_inventory) {
            DetailKind::Inventory
        } else {
            DetailKind::Flag
        }
    }

    pub fn inventory(&self) -> Option<InventoryId> {
        match self.detail {
            BuildingDetail::Inventory(id) => Some(id),
            _ => None,
        }
    }

    /// True if the stored detail agrees with the status bits.
    pub fn detail_matches_status(&self) -> bool {
        matches!(
            (self.detail_kind(), self.detail),
            (DetailKind::Inventory, BuildingDetail::Inventory(_))
                | (DetailKind::Flag, BuildingDetail::Flag(_))
                | (DetailKind::Construction, BuildingDetail::Construction { .. })
        )
    }
}

/// Pack owner, type and construction status into a `bld` byte.
pub fn pack_bld(player: u8, kind: BuildingType, done: bool) -> u8 {
    let status = if done { 0 } else { BLD_CONSTRUCTION_BIT };
    status | ((kind as u8) << 2) | (player & 0x03)
}
