//! Flags: the nodes of the road network.
//!
//! A flag can have a road in each of the six hex directions. Three masks
//! describe them:
//!
//! - `path_con`: a road leaves the flag in that direction,
//! - `endpoint`: bits 0-5 mark land roads, bit 6 marks a building attached
//!   at the up-left direction,
//! - `transporter`: a serf is assigned to carry goods on that road.

use crate::building::{Building, BuildingType};
use crate::id::{BuildingId, FlagId};
use crate::pos::{Direction, MapPos};
use crate::table::EntityTable;
use serde::{Deserialize, Serialize};

/// Bit of `endpoint` set when a building hangs off the up-left direction.
pub const ENDPOINT_BUILDING_BIT: u8 = 1 << 6;

/// Number of resource slots waiting at a flag.
pub const FLAG_SLOTS: usize = 8;

/// Set in `other_end_dir[dir]` when a slot is chosen for pickup in `dir`;
/// the low three bits then hold the slot.
pub const PICKUP_SCHEDULED_BIT: u8 = 1 << 7;

/// Bits of `other_end_dir` that survive rescheduling a pickup.
const OTHER_END_DIR_KEEP: u8 = 0x78;

/// Slots scanned when choosing the next pickup. The last slot is never
/// offered.
const PICKUP_SLOTS: usize = 7;

/// Which building stock counter a resource type feeds, by resource code.
/// `Some(0)` is `stock1`, `Some(1)` is `stock2`.
const RESOURCE_STOCK: [Option<u8>; 26] = [
    None,
    Some(0), Some(0), Some(0), Some(0), Some(0), Some(0), Some(1), Some(0),
    None, Some(1), Some(1), Some(1), Some(0), Some(1), Some(1), None,
    None, None, None, None, None, None, None,
    None, None,
];

/// What sits at the far end of a road leaving a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OtherEnd {
    Flag(FlagId),
    /// Only possible in the up-left direction.
    Building(BuildingId),
}

/// A resource waiting at a flag for pickup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitingResource {
    /// Resource type plus one in bits 0-4, outgoing direction plus one in
    /// bits 5-7. Zero is an empty slot.
    pub kind: u8,
    pub dest: u16,
}

impl WaitingResource {
    /// Resource type, if the slot holds one.
    pub fn resource(&self) -> Option<u8> {
        (self.kind & 0x1f).checked_sub(1)
    }

    /// Direction the resource leaves the flag in, if assigned.
    pub fn direction(&self) -> Option<Direction> {
        ((self.kind >> 5) & 7).checked_sub(1).and_then(|d| Direction::from_index(d as usize))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flag {
    pub pos: MapPos,
    /// Id of the last search that reached this flag.
    pub search_num: u16,
    /// Tag carried from the source flag during a search.
    pub search_dir: u8,
    pub path_con: u8,
    pub endpoint: u8,
    pub transporter: u8,
    pub length: [u8; 6],
    pub slots: [WaitingResource; FLAG_SLOTS],
    pub other_end: [Option<OtherEnd>; 6],
    pub other_end_dir: [u8; 6],
    pub bld_flags: u8,
    pub stock1_prio: u8,
    pub bld2_flags: u8,
    pub stock2_prio: u8,
}

impl Flag {
    pub fn new(pos: MapPos) -> Self {
        Self {
            pos,
            ..Self::default()
        }
    }

    pub fn has_path(&self, dir: Direction) -> bool {
        self.path_con & dir.bit() != 0
    }

    /// True when the road in `dir` is a land road.
    pub fn is_land_path(&self, dir: Direction) -> bool {
        self.endpoint & dir.bit() != 0
    }

    pub fn has_transporter(&self, dir: Direction) -> bool {
        self.transporter & dir.bit() != 0
    }

    pub fn has_building(&self) -> bool {
        self.endpoint & ENDPOINT_BUILDING_BIT != 0
    }

    /// Flag at the other end of the road in `dir`, if any.
    pub fn neighbor(&self, dir: Direction) -> Option<FlagId> {
        match self.other_end.get(dir.index()).copied().flatten() {
            Some(OtherEnd::Flag(id)) if !id.is_none() => Some(id),
            _ => None,
        }
    }

    /// Building attached at up-left, if any.
    pub fn building(&self) -> Option<BuildingId> {
        if !self.has_building() {
            return None;
        }
        match self.other_end[Direction::UpLeft.index()] {
            Some(OtherEnd::Building(id)) if !id.is_none() => Some(id),
            _ => None,
        }
    }

    /// Link this flag to `other` with a land road in `dir`.
    ///
    /// Only this side is updated; callers link the reverse direction on the
    /// other flag themselves.
    pub fn connect(&mut self, dir: Direction, other: FlagId, length: u8) {
        let bit = dir.bit();
        self.path_con |= bit;
        self.endpoint |= bit;
        self.length[dir.index()] = length;
        self.other_end[dir.index()] = Some(OtherEnd::Flag(other));
        self.other_end_dir[dir.index()] = dir.reverse() as u8;
    }

    /// Attach a building at the up-left direction.
    pub fn attach_building(&mut self, building: BuildingId) {
        self.endpoint |= ENDPOINT_BUILDING_BIT;
        self.other_end[Direction::UpLeft.index()] = Some(OtherEnd::Building(building));
    }

    pub fn set_transporter(&mut self, dir: Direction, assigned: bool) {
        if assigned {
            self.transporter |= dir.bit();
        } else {
            self.transporter &= !dir.bit();
        }
    }

    /// Choose the waiting resource to carry out along `dir` next.
    ///
    /// Among slots bound for `dir`, the resource with the highest
    /// `flag_prio` wins; the lowest slot wins a tie. The choice is recorded
    /// in `other_end_dir[dir]` and returned. With nothing bound for `dir`
    /// the scheduled bit and slot are cleared.
    pub fn prioritize_pickup(&mut self, dir: Direction, flag_prio: &[u8]) -> Option<usize> {
        let mut best: Option<(usize, u8)> = None;
        for (i, slot) in self.slots.iter().take(PICKUP_SLOTS).enumerate() {
            if slot.direction() != Some(dir) {
                continue;
            }
            let Some(prio) = slot.resource().and_then(|res| flag_prio.get(res as usize).copied()) else {
                continue;
            };
            if best.is_none_or(|(_, top)| prio > top) {
                best = Some((i, prio));
            }
        }

        let entry = &mut self.other_end_dir[dir.index()];
        *entry &= OTHER_END_DIR_KEEP;
        let chosen = best.map(|(i, _)| i);
        if let Some(i) = chosen {
            *entry |= PICKUP_SCHEDULED_BIT | i as u8;
        }
        chosen
    }

    /// A resource bound for the building at this flag will no longer
    /// arrive: take it off the building's expected stock.
    ///
    /// Finished stocks and castles keep no such count and are left alone,
    /// as are resources that feed no stock counter.
    pub fn cancel_transported_stock(&self, buildings: &mut EntityTable<BuildingId, Building>, resource: u8) {
        let Some(stock) = RESOURCE_STOCK.get(resource as usize).copied().flatten() else {
            return;
        };
        let Some(building) = self.building().and_then(|id| buildings.try_get_mut(id)) else {
            return;
        };
        let warehouse = matches!(building.building_type(), Some(BuildingType::Stock | BuildingType::Castle));
        if building.is_done() && warehouse {
            return;
        }
        let counter = if stock == 0 { &mut building.stock1 } else { &mut building.stock2 };
        *counter = counter.saturating_sub(1);
    }

    /// Number of occupied resource slots.
    pub fn waiting_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.kind != 0).count()
    }
}
