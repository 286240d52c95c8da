//! Stock inventories held by castles and warehouses.

use crate::id::{BuildingId, FlagId};
use serde::{Deserialize, Serialize};

/// Number of resource types.
pub const RESOURCE_TYPES: usize = 26;

/// Number of serf types.
pub const SERF_TYPES: usize = 27;

/// One slot of the outbound shipment queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutQueueEntry {
    /// Resource type being shipped; `None` for an empty slot.
    pub resource: Option<u8>,
    pub dest: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub player: u8,
    /// Resource output direction mode.
    pub res_dir: u8,
    pub flag: FlagId,
    pub building: BuildingId,
    pub resources: [u16; RESOURCE_TYPES],
    pub out_queue: [OutQueueEntry; 2],
    pub spawn_priority: u16,
    pub serfs: [u16; SERF_TYPES],
}

impl Inventory {
    /// Total number of resource units in stock.
    pub fn resource_total(&self) -> u32 {
        self.resources.iter().map(|&n| n as u32).sum()
    }

    /// True when both outbound slots are taken.
    pub fn out_queue_full(&self) -> bool {
        self.out_queue.iter().all(|entry| entry.resource.is_some())
    }
}
