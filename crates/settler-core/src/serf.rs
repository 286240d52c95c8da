//! Serfs and the persisted shape of their current activity.
//!
//! The behaviour of each state belongs to the simulation; this module only
//! describes the fields a state carries between ticks. Every state with
//! payload has its own variant of [`SerfState`]; states that persist nothing
//! beyond their code are kept in [`SerfState::Other`].

use crate::id::{FlagId, InventoryId};
use crate::pos::MapPos;
use serde::{Deserialize, Serialize};

/// Numeric state codes in legacy numbering.
pub mod code {
    pub const NULL: u8 = 0;
    pub const IDLE_IN_STOCK: u8 = 1;
    pub const WALKING: u8 = 2;
    pub const TRANSPORTING: u8 = 3;
    pub const ENTERING_BUILDING: u8 = 4;
    pub const LEAVING_BUILDING: u8 = 5;
    pub const READY_TO_ENTER: u8 = 6;
    pub const READY_TO_LEAVE: u8 = 7;
    pub const DIGGING: u8 = 8;
    pub const BUILDING: u8 = 9;
    pub const BUILDING_CASTLE: u8 = 10;
    pub const MOVE_RESOURCE_OUT: u8 = 11;
    pub const WAIT_FOR_RESOURCE_OUT: u8 = 12;
    pub const DROP_RESOURCE_OUT: u8 = 13;
    pub const DELIVERING: u8 = 14;
    pub const READY_TO_LEAVE_INVENTORY: u8 = 15;
    pub const FREE_WALKING: u8 = 16;
    pub const LOGGING: u8 = 17;
    pub const PLANTING: u8 = 18;
    pub const STONECUTTING: u8 = 19;
    pub const STONECUTTER_FREE_WALKING: u8 = 20;
    pub const SAWING: u8 = 21;
    pub const LOST: u8 = 22;
    pub const LOST_SAILOR: u8 = 23;
    pub const FREE_SAILING: u8 = 24;
    pub const ESCAPE_BUILDING: u8 = 25;
    pub const MINING: u8 = 26;
    pub const SMELTING: u8 = 27;
    pub const FISHING: u8 = 28;
    pub const FARMING: u8 = 29;
    pub const MILLING: u8 = 30;
    pub const BAKING: u8 = 31;
    pub const PIGFARMING: u8 = 32;
    pub const BUTCHERING: u8 = 33;
    pub const MAKING_WEAPON: u8 = 34;
    pub const MAKING_TOOL: u8 = 35;
    pub const BUILDING_BOAT: u8 = 36;
    pub const LOOKING_FOR_GEO_SPOT: u8 = 37;
    pub const SAMPLING_GEO_SPOT: u8 = 38;
    pub const KNIGHT_ENGAGING_BUILDING: u8 = 39;
    pub const KNIGHT_PREPARE_ATTACKING: u8 = 40;
    pub const KNIGHT_LEAVE_FOR_FIGHT: u8 = 41;
    pub const KNIGHT_PREPARE_DEFENDING: u8 = 42;
    pub const KNIGHT_ATTACKING: u8 = 43;
    pub const KNIGHT_DEFENDING: u8 = 44;
    pub const KNIGHT_ATTACKING_VICTORY: u8 = 45;
    pub const KNIGHT_ATTACKING_DEFEAT: u8 = 46;
    pub const KNIGHT_OCCUPY_ENEMY_BUILDING: u8 = 47;
    pub const KNIGHT_FREE_WALKING: u8 = 48;
    pub const KNIGHT_ENGAGE_DEFENDING_FREE: u8 = 49;
    pub const KNIGHT_ENGAGE_ATTACKING_FREE: u8 = 50;
    pub const KNIGHT_ENGAGE_ATTACKING_FREE_JOIN: u8 = 51;
    pub const KNIGHT_PREPARE_ATTACKING_FREE: u8 = 52;
    pub const KNIGHT_PREPARE_DEFENDING_FREE: u8 = 53;
    pub const KNIGHT_PREPARE_DEFENDING_FREE_WAIT: u8 = 54;
    pub const KNIGHT_ATTACKING_FREE: u8 = 55;
    pub const KNIGHT_DEFENDING_FREE: u8 = 56;
    pub const KNIGHT_ATTACKING_VICTORY_FREE: u8 = 57;
    pub const KNIGHT_DEFENDING_VICTORY_FREE: u8 = 58;
    pub const KNIGHT_ATTACKING_FREE_WAIT: u8 = 59;
    pub const KNIGHT_LEAVE_FOR_WALK_TO_FIGHT: u8 = 60;
    pub const IDLE_ON_PATH: u8 = 61;
    pub const WAIT_IDLE_ON_PATH: u8 = 62;
    pub const WAKE_AT_FLAG: u8 = 63;
    pub const WAKE_ON_PATH: u8 = 64;
    pub const DEFENDING_HUT: u8 = 65;
    pub const DEFENDING_TOWER: u8 = 66;
    pub const DEFENDING_FORTRESS: u8 = 67;
    pub const SCATTER: u8 = 68;
    pub const FINISHED_BUILDING: u8 = 69;
    pub const DEFENDING_CASTLE: u8 = 70;
    pub const KNIGHT_ATTACKING_DEFEAT_FREE: u8 = 71;
}

// ---------------------------------------------------------------------------
// Payload shapes
// ---------------------------------------------------------------------------

/// Walking, transporting and delivering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Walking {
    pub res: i8,
    pub dest: u16,
    pub dir: i8,
    pub wait_counter: i8,
}

/// Leaving a building, or waiting to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leaving {
    pub field_b: i8,
    pub dest: i8,
    pub dest2: i8,
    pub dir: i8,
    pub next_state: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Digging {
    pub h_index: i8,
    pub target_h: u8,
    pub dig_pos: i8,
    pub substate: i8,
}

/// A builder working on a construction site.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constructing {
    pub mode: i8,
    pub bld_index: u16,
    pub material_step: u8,
    pub counter: u8,
}

/// Moving or dropping a resource out of a building.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceOut {
    pub res: u8,
    pub res_dest: u16,
    pub next_state: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeavingInventory {
    pub mode: i8,
    pub dest: u16,
    pub inventory: InventoryId,
}

/// Shared by every serf roaming off-road around its workplace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeWalking {
    pub dist1: i8,
    pub dist2: i8,
    pub neg_dist1: i8,
    pub neg_dist2: i8,
    pub flags: i8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mining {
    pub substate: u8,
    pub res: u8,
    pub deposit: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Smelting {
    pub mode: i8,
    pub counter: i8,
    pub kind: u8,
}

/// Transporters resting on or waking up along a road.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnPath {
    pub rev_dir: i8,
    pub flag: FlagId,
    pub field_e: u8,
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SerfState {
    /// Unused slot.
    #[default]
    Null,
    IdleInStock { inventory: InventoryId },
    Walking(Walking),
    Transporting(Walking),
    Delivering(Walking),
    EnteringBuilding { field_b: i8, slope_len: u16 },
    LeavingBuilding(Leaving),
    ReadyToLeave(Leaving),
    ReadyToEnter { field_b: i8 },
    Digging(Digging),
    Building(Constructing),
    BuildingCastle { inventory: InventoryId },
    MoveResourceOut(ResourceOut),
    DropResourceOut(ResourceOut),
    ReadyToLeaveInventory(LeavingInventory),
    FreeWalking(FreeWalking),
    Logging(FreeWalking),
    Planting(FreeWalking),
    Stonecutting(FreeWalking),
    StonecutterFreeWalking(FreeWalking),
    Fishing(FreeWalking),
    Farming(FreeWalking),
    SamplingGeoSpot(FreeWalking),
    Sawing { mode: i8 },
    Lost { field_b: i8 },
    Mining(Mining),
    Smelting(Smelting),
    Milling { mode: i8 },
    Baking { mode: i8 },
    PigFarming { mode: i8 },
    Butchering { mode: i8 },
    MakingWeapon { mode: i8 },
    MakingTool { mode: i8 },
    BuildingBoat { mode: i8 },
    IdleOnPath(OnPath),
    WaitIdleOnPath(OnPath),
    WakeAtFlag(OnPath),
    WakeOnPath(OnPath),
    DefendingHut { next_knight: u16 },
    DefendingTower { next_knight: u16 },
    DefendingFortress { next_knight: u16 },
    DefendingCastle { next_knight: u16 },
    /// Any state without persisted payload, by code.
    Other(u8),
}

impl SerfState {
    /// Legacy numeric code of this state.
    pub fn code(&self) -> u8 {
        match self {
            SerfState::Null => code::NULL,
            SerfState::IdleInStock { .. } => code::IDLE_IN_STOCK,
            SerfState::Walking(_) => code::WALKING,
            SerfState::Transporting(_) => code::TRANSPORTING,
            SerfState::Delivering(_) => code::DELIVERING,
            SerfState::EnteringBuilding { .. } => code::ENTERING_BUILDING,
            SerfState::LeavingBuilding(_) => code::LEAVING_BUILDING,
            SerfState::ReadyToLeave(_) => code::READY_TO_LEAVE,
            SerfState::ReadyToEnter { .. } => code::READY_TO_ENTER,
            SerfState::Digging(_) => code::DIGGING,
            SerfState::Building(_) => code::BUILDING,
            SerfState::BuildingCastle { .. } => code::BUILDING_CASTLE,
            SerfState::MoveResourceOut(_) => code::MOVE_RESOURCE_OUT,
            SerfState::DropResourceOut(_) => code::DROP_RESOURCE_OUT,
            SerfState::ReadyToLeaveInventory(_) => code::READY_TO_LEAVE_INVENTORY,
            SerfState::FreeWalking(_) => code::FREE_WALKING,
            SerfState::Logging(_) => code::LOGGING,
            SerfState::Planting(_) => code::PLANTING,
            SerfState::Stonecutting(_) => code::STONECUTTING,
            SerfState::StonecutterFreeWalking(_) => code::STONECUTTER_FREE_WALKING,
            SerfState::Fishing(_) => code::FISHING,
            SerfState::Farming(_) => code::FARMING,
            SerfState::SamplingGeoSpot(_) => code::SAMPLING_GEO_SPOT,
            SerfState::Sawing { .. } => code::SAWING,
            SerfState::Lost { .. } => code::LOST,
            SerfState::Mining(_) => code::MINING,
            SerfState::Smelting(_) => code::SMELTING,
            SerfState::Milling { .. } => code::MILLING,
            SerfState::Baking { .. } => code::BAKING,
            SerfState::PigFarming { .. } => code::PIGFARMING,
            SerfState::Butchering { .. } => code::BUTCHERING,
            SerfState::MakingWeapon { .. } => code::MAKING_WEAPON,
            SerfState::MakingTool { .. } => code::MAKING_TOOL,
            SerfState::BuildingBoat { .. } => code::BUILDING_BOAT,
            SerfState::IdleOnPath(_) => code::IDLE_ON_PATH,
            SerfState::WaitIdleOnPath(_) => code::WAIT_IDLE_ON_PATH,
            SerfState::WakeAtFlag(_) => code::WAKE_AT_FLAG,
            SerfState::WakeOnPath(_) => code::WAKE_ON_PATH,
            SerfState::DefendingHut { .. } => code::DEFENDING_HUT,
            SerfState::DefendingTower { .. } => code::DEFENDING_TOWER,
            SerfState::DefendingFortress { .. } => code::DEFENDING_FORTRESS,
            SerfState::DefendingCastle { .. } => code::DEFENDING_CASTLE,
            SerfState::Other(code) => *code,
        }
    }

    /// Payload-free state for `code`; `None` when the code has a payload
    /// variant and must be built with its fields.
    pub fn without_payload(state_code: u8) -> Option<SerfState> {
        if state_code == code::NULL {
            return Some(SerfState::Null);
        }
        if has_payload(state_code) {
            None
        } else {
            Some(SerfState::Other(state_code))
        }
    }
}

/// True if states with this code persist payload fields.
pub fn has_payload(state_code: u8) -> bool {
    matches!(
        state_code,
        code::IDLE_IN_STOCK..=code::BUILDING_CASTLE
            | code::MOVE_RESOURCE_OUT
            | code::DROP_RESOURCE_OUT..=code::SAWING
            | code::LOST
            | code::MINING..=code::BUILDING_BOAT
            | code::SAMPLING_GEO_SPOT
            | code::IDLE_ON_PATH..=code::DEFENDING_FORTRESS
            | code::DEFENDING_CASTLE
    )
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Serf {
    /// Serf type in bits 2-6, owning player in bits 0-1.
    pub kind: u8,
    pub animation: u8,
    pub counter: u16,
    pub pos: MapPos,
    pub anim: u16,
    pub state: SerfState,
}

impl Serf {
    pub fn serf_type(&self) -> u8 {
        (self.kind >> 2) & 0x1f
    }

    pub fn player(&self) -> u8 {
        self.kind & 0x03
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_of_payload_variants() {
        assert_eq!(SerfState::Walking(Walking::default()).code(), code::WALKING);
        assert_eq!(SerfState::Delivering(Walking::default()).code(), 14);
        assert_eq!(SerfState::SamplingGeoSpot(FreeWalking::default()).code(), 38);
        assert_eq!(SerfState::DefendingCastle { next_knight: 3 }.code(), 70);
        assert_eq!(SerfState::Other(code::SCATTER).code(), code::SCATTER);
        assert_eq!(SerfState::default().code(), code::NULL);
    }

    #[test]
    fn payload_free_codes() {
        assert_eq!(SerfState::without_payload(0), Some(SerfState::Null));
        assert_eq!(
            SerfState::without_payload(code::WAIT_FOR_RESOURCE_OUT),
            Some(SerfState::Other(12))
        );
        assert_eq!(
            SerfState::without_payload(code::KNIGHT_DEFENDING_VICTORY_FREE),
            Some(SerfState::Other(58))
        );
        assert_eq!(SerfState::without_payload(code::LOOKING_FOR_GEO_SPOT), Some(SerfState::Other(37)));
        assert_eq!(SerfState::without_payload(200), Some(SerfState::Other(200)));
        assert_eq!(SerfState::without_payload(code::FARMING), None);
        assert_eq!(SerfState::without_payload(code::LOST_SAILOR), Some(SerfState::Other(23)));
    }

    #[test]
    fn payload_table_matches_variants() {
        for c in 0..=u8::MAX {
            if c == code::NULL {
                continue;
            }
            assert_eq!(
                SerfState::without_payload(c).is_none(),
                has_payload(c),
                "code {c}"
            );
        }
        assert!(has_payload(code::WAKE_ON_PATH));
        assert!(!has_payload(code::SCATTER));
        assert!(!has_payload(code::FINISHED_BUILDING));
    }

    #[test]
    fn serf_kind_bits() {
        let serf = Serf {
            kind: (7 << 2) | 3,
            ..Serf::default()
        };
        assert_eq!(serf.serf_type(), 7);
        assert_eq!(serf.player(), 3);
    }
}
