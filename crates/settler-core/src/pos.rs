//! Map geometry and position arithmetic.
//!
//! A position packs a column and a row into one integer,
//! `pos = (row << row_shift) | col`, where both extents are powers of two.
//! All arithmetic wraps around both axes, so the map is a torus.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Smallest supported log2 extent per axis.
pub const MIN_SIZE_LOG2: u32 = 1;

/// Largest supported log2 extent per axis (4096 tiles).
pub const MAX_SIZE_LOG2: u32 = 12;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeometryError {
    #[error("map size 2^{col_size} x 2^{row_size} outside supported range 2^{MIN_SIZE_LOG2}..=2^{MAX_SIZE_LOG2}")]
    InvalidSize { col_size: u32, row_size: u32 },
    #[error("legacy map size {0} is out of range")]
    InvalidMapSize(u32),
}

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// A packed map position. Only meaningful together with the [`MapGeometry`]
/// that produced it; never compare two positions by magnitude.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MapPos(pub u32);

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// Map directions in legacy numbering. The first six are the hex directions
/// roads can take; `UpRight` and `DownLeft` only appear in offset tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Direction {
    Right = 0,
    DownRight = 1,
    Down = 2,
    Left = 3,
    UpLeft = 4,
    Up = 5,
    UpRight = 6,
    DownLeft = 7,
}

impl Direction {
    /// The six hex directions, in numeric order.
    pub const HEX: [Direction; 6] = [
        Direction::Right,
        Direction::DownRight,
        Direction::Down,
        Direction::Left,
        Direction::UpLeft,
        Direction::Up,
    ];

    /// All eight directions, in numeric order.
    pub const ALL: [Direction; 8] = [
        Direction::Right,
        Direction::DownRight,
        Direction::Down,
        Direction::Left,
        Direction::UpLeft,
        Direction::Up,
        Direction::UpRight,
        Direction::DownLeft,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Bit for this direction in a 6-bit path/endpoint/transporter mask.
    pub fn bit(self) -> u8 {
        1 << (self as u8)
    }

    pub fn from_index(index: usize) -> Option<Direction> {
        Some(match index {
            0 => Direction::Right,
            1 => Direction::DownRight,
            2 => Direction::Down,
            3 => Direction::Left,
            4 => Direction::UpLeft,
            5 => Direction::Up,
            6 => Direction::UpRight,
            7 => Direction::DownLeft,
            _ => return None,
        })
    }

    /// The opposite hex direction.
    pub fn reverse(self) -> Direction {
        match self {
            Direction::Right => Direction::Left,
            Direction::DownRight => Direction::UpLeft,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::UpLeft => Direction::DownRight,
            Direction::Up => Direction::Down,
            Direction::UpRight => Direction::DownLeft,
            Direction::DownLeft => Direction::UpRight,
        }
    }

    /// Column and row step for this direction.
    fn step(self) -> (i32, i32) {
        match self {
            Direction::Right => (1, 0),
            Direction::DownRight => (1, 1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::UpLeft => (-1, -1),
            Direction::Up => (0, -1),
            Direction::UpRight => (1, -1),
            Direction::DownLeft => (-1, 1),
        }
    }
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Dimensions of a toroidal map plus the derived masks and direction table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapGeometry {
    col_size: u32,
    row_size: u32,
    cols: u32,
    rows: u32,
    col_mask: u32,
    row_mask: u32,
    row_shift: u32,
    dirs: [MapPos; 8],
}

impl MapGeometry {
    /// Build a geometry of `2^col_size` columns by `2^row_size` rows.
    pub fn new(col_size: u32, row_size: u32) -> Result<Self, GeometryError> {
        let valid = MIN_SIZE_LOG2..=MAX_SIZE_LOG2;
        if !valid.contains(&col_size) || !valid.contains(&row_size) {
            return Err(GeometryError::InvalidSize { col_size, row_size });
        }

        let cols = 1 << col_size;
        let rows = 1 << row_size;
        let mut geometry = Self {
            col_size,
            row_size,
            cols,
            rows,
            col_mask: cols - 1,
            row_mask: rows - 1,
            row_shift: col_size,
            dirs: [MapPos(0); 8],
        };

        for dir in Direction::ALL {
            let (dc, dr) = dir.step();
            // Negative steps wrap through the masks in `encode`.
            geometry.dirs[dir.index()] = geometry.encode(dc as u32, dr as u32);
        }

        Ok(geometry)
    }

    /// Build a geometry from the legacy scalar map size.
    pub fn from_map_size(map_size: u32) -> Result<Self, GeometryError> {
        if map_size == 0 {
            return Err(GeometryError::InvalidMapSize(map_size));
        }
        let col_size = 5 + map_size / 2;
        let row_size = 5 + (map_size - 1) / 2;
        Self::new(col_size, row_size).map_err(|_| GeometryError::InvalidMapSize(map_size))
    }

    pub fn col_size(&self) -> u32 {
        self.col_size
    }

    pub fn row_size(&self) -> u32 {
        self.row_size
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn row_shift(&self) -> u32 {
        self.row_shift
    }

    /// Number of tiles on the map.
    pub fn tile_count(&self) -> usize {
        (self.cols as usize) * (self.rows as usize)
    }

    /// Pack a column and row. Both are reduced modulo the map extents.
    pub fn encode(&self, col: u32, row: u32) -> MapPos {
        MapPos(((row & self.row_mask) << self.row_shift) | (col & self.col_mask))
    }

    /// Unpack a position into `(col, row)`.
    pub fn decode(&self, pos: MapPos) -> (u32, u32) {
        (self.col(pos), self.row(pos))
    }

    pub fn col(&self, pos: MapPos) -> u32 {
        pos.0 & self.col_mask
    }

    pub fn row(&self, pos: MapPos) -> u32 {
        (pos.0 >> self.row_shift) & self.row_mask
    }

    /// Component-wise modular addition of two positions.
    pub fn add(&self, pos: MapPos, offset: MapPos) -> MapPos {
        let col = self.col(pos).wrapping_add(self.col(offset));
        let row = self.row(pos).wrapping_add(self.row(offset));
        self.encode(col, row)
    }

    /// Offset for one step in `dir`.
    pub fn offset(&self, dir: Direction) -> MapPos {
        self.dirs[dir.index()]
    }

    /// The neighbouring position one step in `dir`.
    pub fn move_dir(&self, pos: MapPos, dir: Direction) -> MapPos {
        self.add(pos, self.offset(dir))
    }

    /// Dense array index of a position, in row-major order.
    pub fn tile_index(&self, pos: MapPos) -> usize {
        (self.row(pos) as usize) * (self.cols as usize) + self.col(pos) as usize
    }

    /// True if `pos` has no bits outside the packed column/row fields.
    pub fn contains(&self, pos: MapPos) -> bool {
        pos.0 >> (self.row_shift + self.row_size) == 0
    }

    /// All positions in row-major order.
    pub fn positions(&self) -> impl Iterator<Item = MapPos> + '_ {
        (0..self.rows).flat_map(move |row| (0..self.cols).map(move |col| self.encode(col, row)))
    }
}
