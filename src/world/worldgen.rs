//! Map Generation
//!
//! Generators never touch a `World` directly. They fill a `MapTable`
//! through the `MapInterface` contract (size, coordinate mode, one terrain
//! id per cell, 1-based indices) and the table is then read back into a
//! fresh world.

use thiserror::Error;
use tracing::debug;

use crate::core::hash::short_hash;
use crate::core::hex::HexCoord;
use crate::core::rng::MapRng;
use crate::world::grid::{World, WorldError};
use crate::world::terrain::TerrainTable;
use crate::world::tile::{Tile, UNSET_TERRAIN};

/// Map generation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorldgenError {
    /// `set_size` with a non-positive dimension.
    #[error("invalid map size {width}x{height}")]
    InvalidSize {
        /// Requested width.
        width: i32,
        /// Requested height.
        height: i32,
    },

    /// `set_tile_at` outside `1..=width` / `1..=height`.
    #[error("tile ({x}, {y}) outside {width}x{height} map")]
    OutOfBounds {
        /// 1-based column.
        x: i32,
        /// 1-based row.
        y: i32,
        /// Current width.
        width: i32,
        /// Current height.
        height: i32,
    },

    /// The finished table could not become a world.
    #[error(transparent)]
    World(#[from] WorldError),
}

/// How `set_tile_at` coordinates are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum CoordMode {
    /// `x` is axial `q`, `y` is axial `r`.
    #[default]
    Axial = 0,
    /// `x` is the odd-r offset column, `y` the row.
    Offset = 1,
}

impl CoordMode {
    /// Decode the numeric constant scripts pass in.
    pub fn from_i32(mode: i32) -> Option<Self> {
        match mode {
            0 => Some(Self::Axial),
            1 => Some(Self::Offset),
            _ => None,
        }
    }

    /// Coordinate of a 1-based table cell.
    pub fn coord(self, x: i32, y: i32) -> HexCoord {
        match self {
            Self::Axial => HexCoord::from_axial(x - 1, y - 1),
            Self::Offset => HexCoord::from_offset(x - 1, y - 1),
        }
    }
}

/// What a generator may do to the map under construction.
pub trait MapInterface {
    /// Resize, discarding everything set so far. New cells are unset.
    fn set_size(&mut self, width: i32, height: i32) -> Result<(), WorldgenError>;

    /// Choose how later `set_tile_at` calls are interpreted.
    fn set_tile_coords(&mut self, mode: CoordMode);

    /// Set the terrain id of a cell; `x` and `y` start at 1.
    fn set_tile_at(&mut self, x: i32, y: i32, terrain_id: i32) -> Result<(), WorldgenError>;
}

/// Table a generator writes into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapTable {
    width: i32,
    height: i32,
    mode: CoordMode,
    data: Vec<Vec<i32>>,
}

impl Default for MapTable {
    fn default() -> Self {
        Self {
            width: 1,
            height: 1,
            mode: CoordMode::Axial,
            data: vec![vec![0]],
        }
    }
}

impl MapTable {
    /// Declared width.
    pub fn width(&self) -> i32 {
        self.width
    }

    /// Declared height.
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Coordinate mode in effect.
    pub fn mode(&self) -> CoordMode {
        self.mode
    }

    /// Terrain id at a 1-based cell.
    pub fn tile_at(&self, x: i32, y: i32) -> Option<i32> {
        let row = self.data.get(usize::try_from(y - 1).ok()?)?;
        row.get(usize::try_from(x - 1).ok()?).copied()
    }

    /// Every cell as `(x, y, terrain_id)`, 1-based, row by row.
    pub fn cells(&self) -> impl Iterator<Item = (i32, i32, i32)> + '_ {
        self.data.iter().enumerate().flat_map(|(y, row)| {
            row.iter()
                .enumerate()
                .map(move |(x, &id)| (x as i32 + 1, y as i32 + 1, id))
        })
    }
}

impl MapInterface for MapTable {
    fn set_size(&mut self, width: i32, height: i32) -> Result<(), WorldgenError> {
        if width <= 0 || height <= 0 {
            return Err(WorldgenError::InvalidSize { width, height });
        }
        self.width = width;
        self.height = height;
        self.data = vec![vec![UNSET_TERRAIN; width as usize]; height as usize];
        Ok(())
    }

    fn set_tile_coords(&mut self, mode: CoordMode) {
        self.mode = mode;
    }

    fn set_tile_at(&mut self, x: i32, y: i32, terrain_id: i32) -> Result<(), WorldgenError> {
        let out_of_bounds = WorldgenError::OutOfBounds {
            x,
            y,
            width: self.width,
            height: self.height,
        };
        if !(1..=self.width).contains(&x) || !(1..=self.height).contains(&y) {
            return Err(out_of_bounds);
        }
        self.data[(y - 1) as usize][(x - 1) as usize] = terrain_id;
        Ok(())
    }
}

impl World {
    /// Build a world from a filled table. Cells are placed through the
    /// table's coordinate mode and the normalized accessor.
    pub fn from_map_table(table: &MapTable) -> Result<Self, WorldError> {
        let mut world = World::new(table.width, table.height, Tile::default(), Tile::default())?;
        for (x, y, id) in table.cells() {
            world.tile_mut(table.mode.coord(x, y)).terrain_id = id;
        }
        Ok(world)
    }
}

/// A map generator.
pub trait WorldGenerator {
    /// Name shown when picking a generator.
    fn name(&self) -> &str;

    /// Fill `map`.
    fn generate(&self, map: &mut dyn MapInterface) -> Result<(), WorldgenError>;
}

/// Run a generator against a fresh table and build the world.
pub fn run_generator(generator: &dyn WorldGenerator) -> Result<World, WorldgenError> {
    let mut table = MapTable::default();
    generator.generate(&mut table)?;
    let world = World::from_map_table(&table)?;
    debug!(
        generator = generator.name(),
        width = world.width(),
        height = world.height(),
        checksum = %short_hash(&world.checksum()),
        "World generated"
    );
    Ok(world)
}

/// Built-in generator: terrain ids drawn from a table, with runs along rows
/// and columns so the map forms patches rather than noise.
#[derive(Debug, Clone)]
pub struct DefaultGenerator {
    width: i32,
    height: i32,
    seed: u64,
    terrain_ids: Vec<i32>,
}

impl DefaultGenerator {
    /// Generator for a `width` x `height` map using every id in `terrain`.
    pub fn new(width: i32, height: i32, seed: u64, terrain: &TerrainTable) -> Self {
        Self {
            width,
            height,
            seed,
            terrain_ids: terrain.kinds().iter().map(|k| k.id).collect(),
        }
    }
}

impl WorldGenerator for DefaultGenerator {
    fn name(&self) -> &str {
        "default"
    }

    fn generate(&self, map: &mut dyn MapInterface) -> Result<(), WorldgenError> {
        map.set_size(self.width, self.height)?;
        map.set_tile_coords(CoordMode::Offset);

        let mut rng = MapRng::new(self.seed);
        let mut above: Vec<i32> = Vec::new();
        for y in 1..=self.height {
            let mut row = Vec::with_capacity(self.width as usize);
            for x in 1..=self.width {
                let left = row.last().copied();
                let up = above.get((x - 1) as usize).copied();
                let id = match (left, up) {
                    (Some(id), _) if rng.chance(45) => id,
                    (_, Some(id)) if rng.chance(35) => id,
                    _ => rng.choose(&self.terrain_ids).copied().unwrap_or(0),
                };
                map.set_tile_at(x, y, id)?;
                row.push(id);
            }
            above = row;
        }
        Ok(())
    }
}

/// Generate a `width` x `height` world from `seed` with the default
/// terrain table.
pub fn generate_default(width: i32, height: i32, seed: u64) -> Result<World, WorldgenError> {
    run_generator(&DefaultGenerator::new(
        width,
        height,
        seed,
        &TerrainTable::default(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_is_one_cell() {
        let world = World::from_map_table(&MapTable::default()).unwrap();
        assert_eq!((world.width(), world.height()), (1, 1));
        assert_eq!(world.tile(HexCoord::ORIGIN).terrain_id, 0);
    }

    #[test]
    fn test_set_size_resets_cells() {
        let mut table = MapTable::default();
        table.set_size(3, 2).unwrap();
        assert_eq!(table.cells().count(), 6);
        assert!(table.cells().all(|(_, _, id)| id == UNSET_TERRAIN));
        assert_eq!(
            table.set_size(0, 2),
            Err(WorldgenError::InvalidSize { width: 0, height: 2 })
        );
    }

    #[test]
    fn test_set_tile_bounds_are_one_based() {
        let mut table = MapTable::default();
        table.set_size(2, 2).unwrap();
        table.set_tile_at(1, 1, 4).unwrap();
        table.set_tile_at(2, 2, 5).unwrap();
        assert!(table.set_tile_at(0, 1, 1).is_err());
        assert!(table.set_tile_at(3, 1, 1).is_err());
        assert_eq!(table.tile_at(1, 1), Some(4));
        assert_eq!(table.tile_at(2, 2), Some(5));
        assert_eq!(table.tile_at(0, 0), None);
    }

    #[test]
    fn test_axial_readback() {
        let mut table = MapTable::default();
        table.set_size(4, 3).unwrap();
        table.set_tile_at(3, 2, 7).unwrap();
        let world = World::from_map_table(&table).unwrap();
        assert_eq!(world.tile(HexCoord::from_axial(2, 1)).terrain_id, 7);
        assert_eq!(world.tile(HexCoord::from_axial(0, 0)).terrain_id, UNSET_TERRAIN);
    }

    #[test]
    fn test_offset_readback() {
        let mut table = MapTable::default();
        table.set_size(4, 4).unwrap();
        table.set_tile_coords(CoordMode::Offset);
        // Row 3 (0-based 2), column 1 (0-based 0) is axial (-1, 2).
        table.set_tile_at(1, 3, 9).unwrap();
        let world = World::from_map_table(&table).unwrap();
        assert_eq!(world.tile(HexCoord::from_axial(-1, 2)).terrain_id, 9);
        assert_eq!(world.tile(HexCoord::from_axial(3, 2)).terrain_id, 9);
    }

    #[test]
    fn test_offset_fill_covers_every_cell() {
        let mut table = MapTable::default();
        table.set_size(5, 4).unwrap();
        table.set_tile_coords(CoordMode::Offset);
        for y in 1..=4 {
            for x in 1..=5 {
                table.set_tile_at(x, y, 1).unwrap();
            }
        }
        let world = World::from_map_table(&table).unwrap();
        assert!(world.cells().iter().all(|t| t.terrain_id == 1));
    }

    #[test]
    fn test_coord_mode_constants() {
        assert_eq!(CoordMode::from_i32(0), Some(CoordMode::Axial));
        assert_eq!(CoordMode::from_i32(1), Some(CoordMode::Offset));
        assert_eq!(CoordMode::from_i32(2), None);
    }

    #[test]
    fn test_generate_default_is_deterministic() {
        let a = generate_default(16, 12, 99).unwrap();
        let b = generate_default(16, 12, 99).unwrap();
        let c = generate_default(16, 12, 100).unwrap();
        assert_eq!(a.checksum(), b.checksum());
        assert_ne!(a.checksum(), c.checksum());
    }

    #[test]
    fn test_generate_default_uses_table_ids() {
        let world = generate_default(20, 20, 1).unwrap();
        let table = TerrainTable::default();
        assert!(world.cells().iter().all(|t| table.get(t.terrain_id).is_some()));
        assert!(world.cells().iter().all(|t| t.visibility == 0));
    }

    #[test]
    fn test_generate_rejects_bad_size() {
        assert!(matches!(
            generate_default(0, 10, 1),
            Err(WorldgenError::InvalidSize { .. })
        ));
    }
}
