//! Native binary snapshots of a [`World`].
//!
//! A snapshot is the whole world encoded with `bitcode` behind a versioned
//! header. It is the fast path for round-tripping state inside one build;
//! the legacy and text formats remain the interchange formats.

use serde::{Deserialize, Serialize};
use settler_core::world::World;
use std::cmp::Ordering;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying a world snapshot.
pub const SNAPSHOT_MAGIC: u32 = 0x5E77_0001;

/// Current format version. Increment when breaking the wire format.
pub const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("could not encode world snapshot: {0}")]
    Encode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    #[error("not a world snapshot (magic 0x{0:08X})")]
    InvalidMagic(u32),
    #[error("world snapshot version {0} is no longer readable (current is {FORMAT_VERSION})")]
    UnsupportedVersion(u32),
    #[error("world snapshot version {0} is newer than this build (current is {FORMAT_VERSION})")]
    FutureVersion(u32),
    /// The header describes a different map than the payload holds.
    #[error("snapshot header says 2^{header:?} map, payload holds 2^{world:?}")]
    GeometryMismatch { header: (u8, u8), world: (u8, u8) },
    #[error("could not decode world snapshot: {0}")]
    Decode(String),
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// Summary stored in front of every snapshot, enough to list saves without
/// inspecting the world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub magic: u32,
    pub version: u32,
    pub game_tick: u32,
    /// Map size as `(col_size, row_size)`, log2 of the extents.
    pub map_size: (u8, u8),
    pub flags: u32,
    pub buildings: u32,
    pub serfs: u32,
}

fn map_size_of(world: &World) -> (u8, u8) {
    let geometry = world.geometry();
    (geometry.col_size() as u8, geometry.row_size() as u8)
}

impl SnapshotHeader {
    pub fn for_world(world: &World) -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: FORMAT_VERSION,
            game_tick: world.globals.game_tick,
            map_size: map_size_of(world),
            flags: world.flags.iter_allocated(1).count() as u32,
            buildings: world.buildings.iter_allocated(1).count() as u32,
            serfs: world.serfs.iter_allocated(1).count() as u32,
        }
    }

    /// Check the magic number and version. Older snapshots are not migrated.
    pub fn check_format(&self) -> Result<(), DeserializeError> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(DeserializeError::InvalidMagic(self.magic));
        }
        match self.version.cmp(&FORMAT_VERSION) {
            Ordering::Equal => Ok(()),
            Ordering::Greater => Err(DeserializeError::FutureVersion(self.version)),
            Ordering::Less => Err(DeserializeError::UnsupportedVersion(self.version)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WorldSnapshot {
    header: SnapshotHeader,
    world: World,
}

fn unpack(data: &[u8]) -> Result<WorldSnapshot, DeserializeError> {
    let snapshot: WorldSnapshot =
        bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
    snapshot.header.check_format()?;
    Ok(snapshot)
}

// ---------------------------------------------------------------------------
// Encode / decode
// ---------------------------------------------------------------------------

pub fn encode(world: &World) -> Result<Vec<u8>, SerializeError> {
    let snapshot = WorldSnapshot {
        header: SnapshotHeader::for_world(world),
        world: world.clone(),
    };
    let bytes = bitcode::serialize(&snapshot).map_err(|e| SerializeError::Encode(e.to_string()))?;
    tracing::debug!(
        target: "settler::save",
        bytes = bytes.len(),
        tick = snapshot.header.game_tick,
        "encoded snapshot"
    );
    Ok(bytes)
}

/// Decode a snapshot written by this format version.
pub fn decode(data: &[u8]) -> Result<World, DeserializeError> {
    let WorldSnapshot { header, world } = unpack(data)?;
    let world_size = map_size_of(&world);
    if header.map_size != world_size {
        return Err(DeserializeError::GeometryMismatch {
            header: header.map_size,
            world: world_size,
        });
    }
    Ok(world)
}

/// Validated header of an encoded snapshot.
///
/// bitcode has no partial decoding, so this decodes the whole payload.
pub fn read_header(data: &[u8]) -> Result<SnapshotHeader, DeserializeError> {
    unpack(data).map(|snapshot| snapshot.header)
}
