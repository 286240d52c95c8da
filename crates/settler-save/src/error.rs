use settler_core::pos::GeometryError;
use settler_core::table::{TableError, TableKind};

/// Errors that abort a load. No partially loaded world is ever returned.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The input ended before a fixed-size block was complete.
    #[error("short read in {stage}: expected {expected} bytes, got {got}")]
    ShortRead {
        stage: &'static str,
        expected: usize,
        got: usize,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid map geometry: {0}")]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Table(#[from] TableError),

    /// The legacy map block does not match the size declared in the globals.
    #[error(
        "map block declares {cols}x{rows} with row shift {row_shift}, \
         expected {expected_cols}x{expected_rows}"
    )]
    MapDimensionMismatch {
        cols: u32,
        rows: u32,
        row_shift: u32,
        expected_cols: u32,
        expected_rows: u32,
    },

    #[error("missing [{0}] section")]
    MissingSection(&'static str),

    #[error("[{section}] is missing required key '{key}'")]
    MissingSetting { section: String, key: &'static str },

    #[error("invalid parameter '{param}' for [{section}]")]
    InvalidSectionParam { section: &'static str, param: String },

    /// An index that must be dereferenced during load is out of range.
    #[error("{kind} index {index} is out of range")]
    IndexOutOfRange { kind: TableKind, index: usize },

    /// Only raised when strict number parsing is enabled.
    #[error("invalid number '{value}' for '{key}' in [{section}]")]
    InvalidNumber {
        section: String,
        key: String,
        value: String,
    },
}

/// Errors that can occur while writing a save.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
