use serde::{Deserialize, Serialize};

/// Identifies a flag in the flag table. Index 0 is the "no flag" sentinel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FlagId(pub u16);

/// Identifies a building in the building table. Index 0 is the sentinel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BuildingId(pub u16);

/// Identifies a serf in the serf table. Index 0 is the sentinel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SerfId(pub u16);

/// Identifies an inventory in the inventory table.
///
/// Unlike the other tables, legacy saves place the first castle inventory
/// at index 0, so inventory 0 may hold a live record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InventoryId(pub u16);

macro_rules! impl_index {
    ($($ty:ident),*) => {
        $(
            impl $ty {
                /// Table index as `usize`.
                pub fn index(self) -> usize {
                    self.0 as usize
                }

                /// True for index 0, the "no entity" value.
                pub fn is_none(self) -> bool {
                    self.0 == 0
                }
            }

            impl From<u16> for $ty {
                fn from(raw: u16) -> Self {
                    Self(raw)
                }
            }
        )*
    };
}

impl_index!(FlagId, BuildingId, SerfId, InventoryId);
