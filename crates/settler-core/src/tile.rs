//! Packed per-position map records.
//!
//! Each tile stores four bit-packed bytes, a 16-bit payload whose meaning
//! depends on the object code, and the index of the serf standing on it.
//!
//! | byte     | bits                                                        |
//! |----------|-------------------------------------------------------------|
//! | `flags`  | 7 has-flag marker, 6 deep water, 0-5 path mask              |
//! | `height` | 7 has owner, 5-6 owner, 0-4 elevation                       |
//! | `type`   | 4-7 up-triangle terrain, 0-3 down-triangle terrain          |
//! | `obj`    | 7 adjacent water, 0-6 object code                           |
//!
//! The payload holds an entity index when the object is a flag, building or
//! castle. Otherwise its low byte is a resource descriptor (deposit type in
//! bits 5-7 and amount in bits 0-4, or a fish count on deep water) and its
//! high byte carries the idle-serf bit (7) and the player (0-1).

use crate::id::SerfId;
use crate::pos::{Direction, MapGeometry, MapPos};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Object codes
// ---------------------------------------------------------------------------

/// Object-on-tile code (0..=127).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MapObject(pub u8);

impl MapObject {
    pub const NONE: MapObject = MapObject(0);
    pub const FLAG: MapObject = MapObject(1);
    pub const SMALL_BUILDING: MapObject = MapObject(2);
    pub const LARGE_BUILDING: MapObject = MapObject(3);
    pub const CASTLE: MapObject = MapObject(4);
    pub const TREE_0: MapObject = MapObject(8);
    pub const PINE_0: MapObject = MapObject(16);
    pub const PALM_0: MapObject = MapObject(24);
    pub const WATER_TREE_0: MapObject = MapObject(28);
    pub const STONE_0: MapObject = MapObject(72);
    pub const SANDSTONE_0: MapObject = MapObject(80);
    pub const CROSS: MapObject = MapObject(82);
    pub const STUB: MapObject = MapObject(83);
    pub const CADAVER_0: MapObject = MapObject(86);
    pub const WATER_STONE_0: MapObject = MapObject(88);
    pub const CACTUS_0: MapObject = MapObject(90);
    pub const DEAD_TREE: MapObject = MapObject(92);
    pub const FELLED_PINE_0: MapObject = MapObject(93);
    pub const FELLED_TREE_0: MapObject = MapObject(98);
    pub const NEW_PINE: MapObject = MapObject(103);
    pub const NEW_TREE: MapObject = MapObject(104);
    pub const SEEDS_0: MapObject = MapObject(105);
    pub const FIELD_EXPIRED: MapObject = MapObject(111);
    pub const SIGN_LARGE_GOLD: MapObject = MapObject(112);
    pub const SIGN_EMPTY: MapObject = MapObject(120);
    pub const FIELD_0: MapObject = MapObject(121);
    pub const FIELD_5: MapObject = MapObject(126);

    /// Flags, buildings and castles carry an entity index in the tile payload.
    pub fn is_indexed(self) -> bool {
        (Self::FLAG.0..=Self::CASTLE.0).contains(&self.0)
    }

    pub fn is_building(self) -> bool {
        (Self::SMALL_BUILDING.0..=Self::CASTLE.0).contains(&self.0)
    }

    pub fn is_tree(self) -> bool {
        (Self::TREE_0.0..=Self::WATER_TREE_0.0 + 3).contains(&self.0)
    }

    pub fn is_stone(self) -> bool {
        (Self::STONE_0.0..Self::CROSS.0).contains(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Ground deposits
// ---------------------------------------------------------------------------

/// Mineral deposit type stored in bits 5-7 of the resource byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum GroundDeposit {
    None = 0,
    Gold = 1,
    Iron = 2,
    Coal = 3,
    Stone = 4,
}

impl GroundDeposit {
    /// Decode a 3-bit deposit code. Codes 5-7 are unused.
    pub fn from_code(code: u8) -> Option<GroundDeposit> {
        Some(match code {
            0 => GroundDeposit::None,
            1 => GroundDeposit::Gold,
            2 => GroundDeposit::Iron,
            3 => GroundDeposit::Coal,
            4 => GroundDeposit::Stone,
            _ => return None,
        })
    }
}

// ---------------------------------------------------------------------------
// Payload view
// ---------------------------------------------------------------------------

/// Interpretation of the 16-bit tile payload, chosen by the object code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TilePayload {
    /// Index of the flag, building or castle occupying the tile.
    Index(u16),
    /// Resource descriptor and ownership byte.
    Resource { resource: u8, field_1: u8 },
}

// ---------------------------------------------------------------------------
// Tile
// ---------------------------------------------------------------------------

const BIT_HAS_FLAG: u8 = 0x80;
const BIT_DEEP_WATER: u8 = 0x40;
const MASK_PATHS: u8 = 0x3f;
const BIT_HAS_OWNER: u8 = 0x80;
const MASK_OWNER: u8 = 0x60;
const MASK_HEIGHT: u8 = 0x1f;
const BIT_WATER: u8 = 0x80;
const MASK_OBJECT: u8 = 0x7f;
const BIT_IDLE_SERF: u8 = 0x80;
const MASK_PLAYER: u8 = 0x03;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tile {
    flags: u8,
    height: u8,
    kind: u8,
    obj: u8,
    payload: u16,
    serf: u16,
}

fn with_bits(byte: u8, mask: u8, value: u8) -> u8 {
    (byte & !mask) | (value & mask)
}

fn with_flag(byte: u8, bit: u8, on: bool) -> u8 {
    if on { byte | bit } else { byte & !bit }
}

impl Tile {
    /// Build a tile from its raw bytes, as stored in the legacy layout.
    pub fn from_raw(flags: u8, height: u8, kind: u8, obj: u8, payload: u16, serf: u16) -> Self {
        Self {
            flags,
            height,
            kind,
            obj,
            payload,
            serf,
        }
    }

    pub fn flags_byte(&self) -> u8 {
        self.flags
    }

    pub fn height_byte(&self) -> u8 {
        self.height
    }

    pub fn type_byte(&self) -> u8 {
        self.kind
    }

    pub fn obj_byte(&self) -> u8 {
        self.obj
    }

    pub fn raw_payload(&self) -> u16 {
        self.payload
    }

    // -- flags byte --

    pub fn has_flag(&self) -> bool {
        self.flags & BIT_HAS_FLAG != 0
    }

    pub fn set_has_flag(&mut self, on: bool) {
        self.flags = with_flag(self.flags, BIT_HAS_FLAG, on);
    }

    pub fn deep_water(&self) -> bool {
        self.flags & BIT_DEEP_WATER != 0
    }

    pub fn set_deep_water(&mut self, on: bool) {
        self.flags = with_flag(self.flags, BIT_DEEP_WATER, on);
    }

    /// Six-bit mask of directions with a road leaving this tile.
    pub fn paths(&self) -> u8 {
        self.flags & MASK_PATHS
    }

    pub fn set_paths(&mut self, mask: u8) {
        self.flags = with_bits(self.flags, MASK_PATHS, mask);
    }

    pub fn has_path(&self, dir: Direction) -> bool {
        self.paths() & dir.bit() != 0
    }

    // -- height byte --

    pub fn has_owner(&self) -> bool {
        self.height & BIT_HAS_OWNER != 0
    }

    pub fn set_has_owner(&mut self, on: bool) {
        self.height = with_flag(self.height, BIT_HAS_OWNER, on);
    }

    pub fn owner(&self) -> u8 {
        (self.height & MASK_OWNER) >> 5
    }

    pub fn set_owner(&mut self, owner: u8) {
        self.height = with_bits(self.height, MASK_OWNER, owner << 5);
    }

    pub fn height(&self) -> u8 {
        self.height & MASK_HEIGHT
    }

    pub fn set_height(&mut self, height: u8) {
        self.height = with_bits(self.height, MASK_HEIGHT, height);
    }

    // -- type byte --

    pub fn terrain_up(&self) -> u8 {
        self.kind >> 4
    }

    pub fn set_terrain_up(&mut self, terrain: u8) {
        self.kind = with_bits(self.kind, 0xf0, terrain << 4);
    }

    pub fn terrain_down(&self) -> u8 {
        self.kind & 0x0f
    }

    pub fn set_terrain_down(&mut self, terrain: u8) {
        self.kind = with_bits(self.kind, 0x0f, terrain);
    }

    // -- obj byte --

    pub fn object(&self) -> MapObject {
        MapObject(self.obj & MASK_OBJECT)
    }

    pub fn set_object(&mut self, object: MapObject) {
        self.obj = with_bits(self.obj, MASK_OBJECT, object.0);
    }

    pub fn water(&self) -> bool {
        self.obj & BIT_WATER != 0
    }

    pub fn set_water(&mut self, on: bool) {
        self.obj = with_flag(self.obj, BIT_WATER, on);
    }

    // -- payload --

    /// The payload, interpreted according to the current object code.
    pub fn payload(&self) -> TilePayload {
        if self.object().is_indexed() {
            TilePayload::Index(self.payload)
        } else {
            TilePayload::Resource {
                resource: self.resource_byte(),
                field_1: self.field_1(),
            }
        }
    }

    /// Entity index if the tile holds a flag, building or castle.
    pub fn object_index(&self) -> Option<u16> {
        match self.payload() {
            TilePayload::Index(index) => Some(index),
            TilePayload::Resource { .. } => None,
        }
    }

    /// Place an indexed object (flag, building or castle) on the tile.
    ///
    /// The has-flag marker follows the object code.
    pub fn set_indexed_object(&mut self, object: MapObject, index: u16) {
        self.set_object(object);
        self.set_has_flag(object == MapObject::FLAG);
        self.payload = index;
    }

    fn resource_byte(&self) -> u8 {
        (self.payload & 0xff) as u8
    }

    fn field_1(&self) -> u8 {
        (self.payload >> 8) as u8
    }

    fn set_resource_byte(&mut self, value: u8) {
        self.payload = (self.payload & 0xff00) | value as u16;
    }

    fn set_field_1(&mut self, value: u8) {
        self.payload = (self.payload & 0x00ff) | ((value as u16) << 8);
    }

    pub fn idle_serf(&self) -> bool {
        self.field_1() & BIT_IDLE_SERF != 0
    }

    pub fn set_idle_serf(&mut self, on: bool) {
        self.set_field_1(with_flag(self.field_1(), BIT_IDLE_SERF, on));
    }

    /// Player recorded in the ownership byte of a non-indexed tile.
    pub fn player(&self) -> u8 {
        self.field_1() & MASK_PLAYER
    }

    pub fn set_player(&mut self, player: u8) {
        self.set_field_1(with_bits(self.field_1(), MASK_PLAYER, player));
    }

    /// Raw 3-bit deposit code.
    pub fn resource_type(&self) -> u8 {
        self.resource_byte() >> 5
    }

    pub fn deposit(&self) -> Option<GroundDeposit> {
        GroundDeposit::from_code(self.resource_type())
    }

    pub fn set_resource_type(&mut self, code: u8) {
        self.set_resource_byte(with_bits(self.resource_byte(), 0xe0, code << 5));
    }

    pub fn resource_amount(&self) -> u8 {
        self.resource_byte() & 0x1f
    }

    pub fn set_resource_amount(&mut self, amount: u8) {
        self.set_resource_byte(with_bits(self.resource_byte(), 0x1f, amount));
    }

    /// Fish count; the whole resource byte on deep water.
    pub fn fish(&self) -> u8 {
        self.resource_byte()
    }

    pub fn set_fish(&mut self, fish: u8) {
        self.set_resource_byte(fish);
    }

    // -- serf occupant --

    pub fn serf_index(&self) -> SerfId {
        SerfId(self.serf)
    }

    pub fn set_serf_index(&mut self, serf: SerfId) {
        self.serf = serf.0;
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Dense row-major array of tiles for one map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileStore {
    geometry: MapGeometry,
    tiles: Vec<Tile>,
}

impl TileStore {
    /// Create a store with every tile zeroed.
    pub fn new(geometry: MapGeometry) -> Self {
        let tiles = vec![Tile::default(); geometry.tile_count()];
        Self { geometry, tiles }
    }

    pub fn geometry(&self) -> &MapGeometry {
        &self.geometry
    }

    pub fn get(&self, pos: MapPos) -> &Tile {
        &self.tiles[self.geometry.tile_index(pos)]
    }

    pub fn get_mut(&mut self, pos: MapPos) -> &mut Tile {
        let index = self.geometry.tile_index(pos);
        &mut self.tiles[index]
    }

    /// Every position with its tile, in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (MapPos, &Tile)> + '_ {
        self.geometry.positions().zip(self.tiles.iter())
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}
