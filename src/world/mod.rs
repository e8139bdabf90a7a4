//! World model.
//!
//! Tile storage on a cylinder, units, terrain, movement and fog of war.
//! Everything here is synchronous and owned by the game thread.

pub mod grid;
pub mod pathfinding;
pub mod terrain;
pub mod tile;
pub mod units;
pub mod visibility;
pub mod worldgen;

pub use grid::{World, WorldError};
pub use pathfinding::{find_path, path_cost, PathResult, UNLIMITED_STAMINA};
pub use terrain::{TerrainError, TerrainKind, TerrainTable};
pub use tile::{Tile, Visibility, MAX_FACTIONS};
pub use units::{Unit, UnitCategory, UnitError, UnitStore, UnitsOnHex};
pub use visibility::{reveal_around, reveal_for_unit, reveal_starting_area, reset_visibility};
pub use worldgen::{
    generate_default, run_generator, CoordMode, DefaultGenerator, MapInterface, MapTable,
    WorldGenerator, WorldgenError,
};
