//! Settler Core -- world state and flag routing for a tile-based colony economy.
//!
//! This crate owns everything a save file describes: the toroidal map
//! geometry, the packed tile store, the four index-addressed entity tables
//! (flags, buildings, serfs, inventories), per-player settings and game
//! globals. It also provides the breadth-first flag search used for
//! resource routing.
//!
//! Persistence lives in the `settler-save` crate; this crate has no I/O.

pub mod building;
pub mod flag;
pub mod globals;
pub mod id;
pub mod inventory;
pub mod player;
pub mod pos;
pub mod search;
pub mod serf;
pub mod table;
pub mod tile;
pub mod world;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
