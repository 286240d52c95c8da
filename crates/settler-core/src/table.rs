//! Index-addressed entity tables with allocation bitmaps.
//!
//! Every table is a dense arena of records plus a bitmap marking which
//! slots hold live entities. Index 0 is a sentinel meaning "no entity" and
//! is kept allocated. `max_ever` is an exclusive high-water mark: no index
//! at or above it has ever been used, so save and load only scan below it.
//!
//! Tables grow on demand up to a hard limit. The bitmap uses the legacy
//! byte layout (most significant bit first), so it can be imported and
//! exported without reshuffling.

use crate::id::{BuildingId, FlagId, InventoryId, SerfId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

// ---------------------------------------------------------------------------
// Index trait
// ---------------------------------------------------------------------------

/// An id type usable as a table index.
pub trait TableIndex: Copy {
    fn from_index(index: usize) -> Self;
    fn to_index(self) -> usize;
}

macro_rules! impl_table_index {
    ($($ty:ident),*) => {
        $(
            impl TableIndex for $ty {
                fn from_index(index: usize) -> Self {
                    $ty(index as u16)
                }

                fn to_index(self) -> usize {
                    self.0 as usize
                }
            }
        )*
    };
}

impl_table_index!(FlagId, BuildingId, SerfId, InventoryId);

// ---------------------------------------------------------------------------
// Kinds and limits
// ---------------------------------------------------------------------------

/// Largest number of slots any table can have: ids are 16-bit.
pub const MAX_TABLE_LEN: usize = u16::MAX as usize + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TableKind {
    Flag,
    Building,
    Serf,
    Inventory,
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TableKind::Flag => "flag",
            TableKind::Building => "building",
            TableKind::Serf => "serf",
            TableKind::Inventory => "inventory",
        };
        f.write_str(name)
    }
}

/// Hard capacity for each table. Tables start small and grow up to these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableLimits {
    pub flags: usize,
    pub buildings: usize,
    pub serfs: usize,
    pub inventories: usize,
}

impl Default for TableLimits {
    fn default() -> Self {
        Self {
            flags: MAX_TABLE_LEN,
            buildings: MAX_TABLE_LEN,
            serfs: MAX_TABLE_LEN,
            inventories: MAX_TABLE_LEN,
        }
    }
}

impl TableLimits {
    pub fn for_kind(&self, kind: TableKind) -> usize {
        match kind {
            TableKind::Flag => self.flags,
            TableKind::Building => self.buildings,
            TableKind::Serf => self.serfs,
            TableKind::Inventory => self.inventories,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    #[error("{kind} table is full ({limit} slots)")]
    Full { kind: TableKind, limit: usize },
    #[error("{kind} index {index} exceeds table limit {limit}")]
    IndexOutOfRange {
        kind: TableKind,
        index: usize,
        limit: usize,
    },
}

// ---------------------------------------------------------------------------
// Bitmap
// ---------------------------------------------------------------------------

/// One bit per slot, most significant bit first within each byte.
///
/// Equality ignores trailing zero bytes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllocBitmap {
    bytes: Vec<u8>,
}

impl AllocBitmap {
    fn significant(&self) -> &[u8] {
        let len = self.bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        &self.bytes[..len]
    }
}

impl PartialEq for AllocBitmap {
    fn eq(&self, other: &Self) -> bool {
        self.significant() == other.significant()
    }
}

impl Eq for AllocBitmap {}

impl AllocBitmap {
    fn mask(index: usize) -> u8 {
        0x80 >> (index & 7)
    }

    pub fn test(&self, index: usize) -> bool {
        self.bytes
            .get(index / 8)
            .is_some_and(|byte| byte & Self::mask(index) != 0)
    }

    pub fn set(&mut self, index: usize) {
        let byte = index / 8;
        if byte >= self.bytes.len() {
            self.bytes.resize(byte + 1, 0);
        }
        self.bytes[byte] |= Self::mask(index);
    }

    pub fn clear(&mut self, index: usize) {
        if let Some(byte) = self.bytes.get_mut(index / 8) {
            *byte &= !Self::mask(index);
        }
    }

    pub fn clear_all(&mut self) {
        self.bytes.iter_mut().for_each(|b| *b = 0);
    }

    /// Lowest clear index in `start..end`.
    pub fn first_clear(&self, start: usize, end: usize) -> Option<usize> {
        (start..end).find(|&i| !self.test(i))
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Dense table of `T` records addressed by `K` ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityTable<K, T> {
    kind: TableKind,
    limit: usize,
    records: Vec<T>,
    allocated: AllocBitmap,
    max_ever: usize,
    #[serde(skip)]
    _key: PhantomData<K>,
}

impl<K: TableIndex, T: Default + Clone> EntityTable<K, T> {
    /// Create a table holding only the allocated sentinel at index 0.
    pub fn new(kind: TableKind, limit: usize) -> Self {
        let limit = limit.clamp(1, MAX_TABLE_LEN);
        let mut table = Self {
            kind,
            limit,
            records: vec![T::default()],
            allocated: AllocBitmap::default(),
            max_ever: 0,
            _key: PhantomData,
        };
        table.allocate_sentinel();
        table
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }

    /// Hard capacity of the table.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Current number of slots.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Grow the table to at least `len` slots.
    pub fn ensure_len(&mut self, len: usize) -> Result<(), TableError> {
        if len > self.limit {
            return Err(TableError::IndexOutOfRange {
                kind: self.kind,
                index: len - 1,
                limit: self.limit,
            });
        }
        if len > self.records.len() {
            self.records.resize(len, T::default());
        }
        Ok(())
    }

    /// Record at `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` is beyond the current length.
    pub fn get(&self, id: K) -> &T {
        &self.records[id.to_index()]
    }

    /// Mutable record at `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` is beyond the current length.
    pub fn get_mut(&mut self, id: K) -> &mut T {
        &mut self.records[id.to_index()]
    }

    pub fn try_get(&self, id: K) -> Option<&T> {
        self.records.get(id.to_index())
    }

    pub fn try_get_mut(&mut self, id: K) -> Option<&mut T> {
        self.records.get_mut(id.to_index())
    }

    /// Store `record` at `id`, growing the table if needed. Does not touch
    /// the bitmap.
    pub fn insert(&mut self, id: K, record: T) -> Result<(), TableError> {
        let index = id.to_index();
        self.ensure_len(index + 1)?;
        self.records[index] = record;
        Ok(())
    }

    pub fn is_allocated(&self, id: K) -> bool {
        self.allocated.test(id.to_index())
    }

    pub fn set_allocated(&mut self, id: K) {
        self.allocated.set(id.to_index());
    }

    pub fn clear_allocated(&mut self, id: K) {
        self.allocated.clear(id.to_index());
    }

    /// Mark every slot free. Records and `max_ever` are left untouched.
    pub fn clear_bitmap(&mut self) {
        self.allocated.clear_all();
    }

    /// Re-allocate index 0 after the bitmap was cleared or imported.
    pub fn allocate_sentinel(&mut self) {
        self.allocated.set(0);
        self.max_ever = self.max_ever.max(1);
    }

    /// Claim the lowest free slot, reset its record and return its id.
    pub fn allocate(&mut self) -> Result<K, TableError> {
        let index = self
            .allocated
            .first_clear(1, self.limit)
            .ok_or(TableError::Full {
                kind: self.kind,
                limit: self.limit,
            })?;
        self.ensure_len(index + 1)?;
        self.records[index] = T::default();
        self.allocated.set(index);
        self.max_ever = self.max_ever.max(index + 1);
        Ok(K::from_index(index))
    }

    /// Exclusive upper bound of indices ever used.
    pub fn max_ever(&self) -> usize {
        self.max_ever
    }

    /// Set the high-water mark, growing the table to cover it.
    pub fn set_max_ever(&mut self, max_ever: usize) -> Result<(), TableError> {
        self.ensure_len(max_ever)?;
        self.max_ever = max_ever;
        Ok(())
    }

    /// Raise the high-water mark so that it covers `id`.
    pub fn cover(&mut self, id: K) -> Result<(), TableError> {
        let index = id.to_index();
        self.ensure_len(index + 1)?;
        self.max_ever = self.max_ever.max(index + 1);
        Ok(())
    }

    /// Replace the bitmap with legacy bytes. Bits at or above `max_ever`
    /// are ignored and the sentinel is re-allocated.
    pub fn load_bitmap_bytes(&mut self, bytes: &[u8]) {
        self.allocated.clear_all();
        let bits = self.max_ever.min(bytes.len() * 8);
        for index in 0..bits {
            if bytes[index / 8] & AllocBitmap::mask(index) != 0 {
                self.allocated.set(index);
            }
        }
        self.allocate_sentinel();
    }

    /// Legacy bitmap block: `4 * ceil(max_ever / 32)` bytes.
    pub fn bitmap_bytes(&self) -> Vec<u8> {
        let len = legacy_bitmap_len(self.max_ever);
        let mut bytes = vec![0u8; len];
        for index in 0..self.max_ever {
            if self.allocated.test(index) {
                bytes[index / 8] |= AllocBitmap::mask(index);
            }
        }
        bytes
    }

    /// Allocated records in `start..max_ever`.
    pub fn iter_allocated(&self, start: usize) -> impl Iterator<Item = (K, &T)> + '_ {
        let end = self.max_ever.min(self.records.len());
        (start..end)
            .filter(|&i| self.allocated.test(i))
            .map(|i| (K::from_index(i), &self.records[i]))
    }

    /// Ids of allocated records in `start..max_ever`.
    pub fn allocated_ids(&self, start: usize) -> Vec<K> {
        self.iter_allocated(start).map(|(id, _)| id).collect()
    }
}

/// Size in bytes of a legacy bitmap block covering `max_ever` slots.
pub fn legacy_bitmap_len(max_ever: usize) -> usize {
    4 * max_ever.div_ceil(32)
}

#[cfg(test)]
mod tests {
    use super::*;

    type Table = EntityTable<FlagId, u32>;

    #[test]
    fn new_table_has_allocated_sentinel() {
        let table = Table::new(TableKind::Flag, 16);
        assert!(table.is_allocated(FlagId(0)));
        assert!(!table.is_allocated(FlagId(1)));
        assert_eq!(table.max_ever(), 1);
        assert_eq!(table.iter_allocated(1).count(), 0);
    }

    #[test]
    fn allocate_takes_lowest_free_slot() {
        let mut table = Table::new(TableKind::Flag, 16);
        assert_eq!(table.allocate().unwrap(), FlagId(1));
        assert_eq!(table.allocate().unwrap(), FlagId(2));
        assert_eq!(table.allocate().unwrap(), FlagId(3));
        table.clear_allocated(FlagId(2));
        assert_eq!(table.allocate().unwrap(), FlagId(2));
        assert_eq!(table.max_ever(), 4);
    }

    #[test]
    fn allocate_resets_reused_record() {
        let mut table = Table::new(TableKind::Flag, 16);
        let id = table.allocate().unwrap();
        *table.get_mut(id) = 99;
        table.clear_allocated(id);
        let again = table.allocate().unwrap();
        assert_eq!(again, id);
        assert_eq!(*table.get(again), 0);
    }

    #[test]
    fn full_table_reports_error() {
        let mut table = Table::new(TableKind::Serf, 3);
        table.allocate().unwrap();
        table.allocate().unwrap();
        assert_eq!(
            table.allocate(),
            Err(TableError::Full {
                kind: TableKind::Serf,
                limit: 3
            })
        );
    }

    #[test]
    fn growth_stops_at_limit() {
        let mut table = Table::new(TableKind::Building, 8);
        assert!(table.ensure_len(8).is_ok());
        assert_eq!(table.len(), 8);
        assert!(matches!(
            table.ensure_len(9),
            Err(TableError::IndexOutOfRange { index: 8, limit: 8, .. })
        ));
        assert!(table.try_get(FlagId(8)).is_none());
    }

    #[test]
    fn default_limits_cover_every_u16_id() {
        let limits = TableLimits::default();
        assert_eq!(limits.for_kind(TableKind::Serf), 65_536);
        let mut table = Table::new(TableKind::Serf, limits.serfs);
        assert!(table.ensure_len(u16::MAX as usize + 1).is_ok());
        assert!(table.try_get(FlagId(u16::MAX)).is_some());
        assert!(table.ensure_len(u16::MAX as usize + 2).is_err());
    }

    #[test]
    fn bitmap_bytes_are_msb_first() {
        let mut table = Table::new(TableKind::Flag, 64);
        table.set_max_ever(40).unwrap();
        table.set_allocated(FlagId(1));
        table.set_allocated(FlagId(9));
        table.set_allocated(FlagId(39));
        let bytes = table.bitmap_bytes();
        assert_eq!(bytes.len(), 8);
        assert_eq!(bytes[0], 0b1100_0000);
        assert_eq!(bytes[1], 0b0100_0000);
        assert_eq!(bytes[4], 0b0000_0001);
    }

    #[test]
    fn load_bitmap_ignores_bits_past_max_ever() {
        let mut table = Table::new(TableKind::Flag, 64);
        table.set_max_ever(10).unwrap();
        table.load_bitmap_bytes(&[0b0110_0000, 0b0110_0000, 0xff, 0xff]);
        assert_eq!(table.allocated_ids(0), vec![FlagId(0), FlagId(1), FlagId(2), FlagId(9)]);
        assert!(!table.is_allocated(FlagId(10)));
    }

    #[test]
    fn clear_bitmap_keeps_records() {
        let mut table = Table::new(TableKind::Inventory, 8);
        let id = table.allocate().unwrap();
        *table.get_mut(id) = 5;
        table.clear_bitmap();
        assert!(!table.is_allocated(FlagId(0)));
        assert_eq!(*table.get(id), 5);
        table.allocate_sentinel();
        assert!(table.is_allocated(FlagId(0)));
    }

    #[test]
    fn legacy_bitmap_length_rounds_to_words() {
        assert_eq!(legacy_bitmap_len(0), 0);
        assert_eq!(legacy_bitmap_len(1), 4);
        assert_eq!(legacy_bitmap_len(32), 4);
        assert_eq!(legacy_bitmap_len(33), 8);
    }

    #[test]
    fn bitmap_equality_ignores_trailing_zero_bytes() {
        let mut short = AllocBitmap::default();
        short.set(3);
        let mut long = AllocBitmap::default();
        long.set(3);
        long.set(40);
        long.clear(40);
        assert_eq!(short, long);
        long.set(12);
        assert_ne!(short, long);
    }
}
