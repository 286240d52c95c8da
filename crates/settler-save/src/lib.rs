//! Settler Save -- load and save a [`World`] in the legacy binary layout,
//! the sectioned text format and a native snapshot format.
//!
//! Loading is all-or-nothing: every loader builds a fresh world and returns
//! it only on success, and every successful load leaves the game paused.
//!
//! ```no_run
//! use settler_save::{CodecConfig, SaveFormat};
//!
//! let config = CodecConfig::default();
//! let world = settler_save::load_file("game.save".as_ref(), SaveFormat::Text, &config)?;
//! settler_save::save_text_file(&world, "copy.save".as_ref())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod binary;
pub mod config;
pub mod error;
pub mod snapshot;
pub mod text_decode;
pub mod text_encode;
pub mod text_format;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{CodecConfig, ConfigError, TextOptions};
pub use error::{LoadError, SaveError};
pub use settler_core::world::World;

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// On-disk save formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveFormat {
    /// Fixed-layout little-endian dump, read only.
    LegacyV0,
    /// Sectioned `key=value` text.
    Text,
}

/// Load a world from `reader`.
pub fn load<R: Read>(mut reader: R, format: SaveFormat, config: &CodecConfig) -> Result<World, LoadError> {
    match format {
        SaveFormat::LegacyV0 => binary::load_v0(reader, config),
        SaveFormat::Text => {
            let mut bytes = Vec::new();
            reader.read_to_end(&mut bytes)?;
            text_decode::read_text(&String::from_utf8_lossy(&bytes), config)
        }
    }
}

pub fn load_file(path: &Path, format: SaveFormat, config: &CodecConfig) -> Result<World, LoadError> {
    tracing::debug!(target: "settler::save", path = %path.display(), ?format, "loading save file");
    let file = File::open(path)?;
    load(BufReader::new(file), format, config)
}

/// Write `world` as text. Text is the only writable format.
pub fn save_text<W: Write>(world: &World, writer: W) -> Result<(), SaveError> {
    text_encode::write_text(world, writer)
}

pub fn save_text_string(world: &World) -> Result<String, SaveError> {
    let mut out = Vec::new();
    save_text(world, &mut out)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

pub fn save_text_file(world: &World, path: &Path) -> Result<(), SaveError> {
    let file = File::create(path)?;
    save_text(world, BufWriter::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use settler_core::test_utils::*;

    #[test]
    fn both_formats_load_through_one_entry_point() {
        let mut world = small_world();
        flag_chain(&mut world, 1, 1, 2);
        let config = CodecConfig::default();

        let image = test_utils::encode_v0(&world);
        let from_binary = load(image.as_slice(), SaveFormat::LegacyV0, &config).unwrap();
        let text = save_text_string(&from_binary).unwrap();
        let from_text = load(text.as_bytes(), SaveFormat::Text, &config).unwrap();
        assert_eq!(from_text.flags, from_binary.flags);
        assert_eq!(from_text.tiles, from_binary.tiles);
    }

    #[test]
    fn invalid_utf8_is_read_lossily() {
        let mut bytes = b"[globals]\nmap.col_size=4\nmap.row_size=4\n[bogus \xff]\n".to_vec();
        bytes.extend_from_slice(b"x=1\n");
        let world = load(bytes.as_slice(), SaveFormat::Text, &CodecConfig::default()).unwrap();
        assert_eq!(world.geometry().cols(), 16);
    }

    #[test]
    fn files_round_trip_through_disk() {
        let dir = std::env::temp_dir().join(format!("settler-save-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("world.save");

        let mut world = small_world();
        world.globals.game_tick = 99;
        save_text_file(&world, &path).unwrap();
        let loaded = load_file(&path, SaveFormat::Text, &CodecConfig::default()).unwrap();
        world.globals.pause_after_load();
        assert_eq!(loaded, world);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_file(
            Path::new("/nonexistent/settler.save"),
            SaveFormat::LegacyV0,
            &CodecConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, LoadError::Io(_)));
    }
}
