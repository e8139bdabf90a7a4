//! Cylindrical Hex World
//!
//! Dense row-major tile storage addressed by axial coordinates. The map
//! wraps horizontally (positive modulo on `q`) and is bounded vertically:
//! normalized access clamps `r`, checked access reports rows outside
//! `0..height` as missing and reads them as the sentinel tile.

use thiserror::Error;

use crate::core::hash::{WorldHash, WorldHasher};
use crate::core::hex::HexCoord;
use crate::network::codec::{CodecError, PacketReader, PacketWriter};
use crate::world::tile::{Tile, Visibility, TILE_WIRE_SIZE};

/// World construction errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorldError {
    /// Width or height not positive, or the cell count overflows.
    #[error("invalid world dimensions {width}x{height}")]
    InvalidDimensions {
        /// Requested width.
        width: i32,
        /// Requested height.
        height: i32,
    },

    /// Cell vector length disagrees with the dimensions.
    #[error("expected {expected} cells, got {actual}")]
    CellCount {
        /// `width * height`.
        expected: usize,
        /// Cells supplied.
        actual: usize,
    },
}

fn cell_count(width: i32, height: i32) -> Result<usize, WorldError> {
    if width <= 0 || height <= 0 {
        return Err(WorldError::InvalidDimensions { width, height });
    }
    (width as usize)
        .checked_mul(height as usize)
        .ok_or(WorldError::InvalidDimensions { width, height })
}

/// The map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct World {
    width: i32,
    height: i32,
    sentinel: Tile,
    cells: Vec<Tile>,
}

impl World {
    /// Create a world with every cell set to `fill`.
    pub fn new(width: i32, height: i32, sentinel: Tile, fill: Tile) -> Result<Self, WorldError> {
        let count = cell_count(width, height)?;
        Ok(Self {
            width,
            height,
            sentinel,
            cells: vec![fill; count],
        })
    }

    /// Create a world from cells in storage order.
    pub fn from_cells(
        width: i32,
        height: i32,
        sentinel: Tile,
        cells: Vec<Tile>,
    ) -> Result<Self, WorldError> {
        let expected = cell_count(width, height)?;
        if cells.len() != expected {
            return Err(WorldError::CellCount {
                expected,
                actual: cells.len(),
            });
        }
        Ok(Self {
            width,
            height,
            sentinel,
            cells,
        })
    }

    /// Columns.
    pub fn width(&self) -> i32 {
        self.width
    }

    /// Rows.
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Tile returned for reads outside the vertical bounds.
    pub fn sentinel(&self) -> &Tile {
        &self.sentinel
    }

    /// Number of stored cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Always false for a constructed world.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// All cells in storage order.
    pub fn cells(&self) -> &[Tile] {
        &self.cells
    }

    /// True if row `r` has backing storage.
    pub fn contains_row(&self, r: i32) -> bool {
        (0..self.height).contains(&r)
    }

    /// Wrap `q` into `0..width`, clamp `r` into `0..height`.
    pub fn normalize(&self, coord: HexCoord) -> HexCoord {
        HexCoord::from_axial(
            coord.q().rem_euclid(self.width),
            coord.r().clamp(0, self.height - 1),
        )
    }

    /// Storage index of a coordinate after normalization.
    pub fn index(&self, coord: HexCoord) -> usize {
        let n = self.normalize(coord);
        n.r() as usize * self.width as usize + n.q() as usize
    }

    /// Normalized read; always a real cell.
    pub fn tile(&self, coord: HexCoord) -> &Tile {
        &self.cells[self.index(coord)]
    }

    /// Normalized write access.
    pub fn tile_mut(&mut self, coord: HexCoord) -> &mut Tile {
        let idx = self.index(coord);
        &mut self.cells[idx]
    }

    /// Checked read: wraps `q`, `None` if the row is out of range.
    pub fn tile_checked(&self, coord: HexCoord) -> Option<&Tile> {
        self.contains_row(coord.r()).then(|| self.tile(coord))
    }

    /// Checked read falling back to the sentinel.
    pub fn tile_or_sentinel(&self, coord: HexCoord) -> &Tile {
        self.tile_checked(coord).unwrap_or(&self.sentinel)
    }

    /// Checked write access. Rows out of range yield `None`; the sentinel
    /// is never handed out mutably.
    pub fn tile_mut_checked(&mut self, coord: HexCoord) -> Option<&mut Tile> {
        if self.contains_row(coord.r()) {
            Some(self.tile_mut(coord))
        } else {
            None
        }
    }

    /// Tile as seen by `faction`: `None` if the row is out of range or the
    /// faction has never seen it. `debug` viewers see everything.
    pub fn tile_info_for(&self, coord: HexCoord, faction: i32, debug: bool) -> Option<&Tile> {
        let tile = self.tile_checked(coord)?;
        (debug || tile.visibility(faction) != Visibility::None).then_some(tile)
    }

    /// Axial coordinate of every stored cell, in storage order.
    pub fn coords(&self) -> impl Iterator<Item = HexCoord> + '_ {
        (0..self.height).flat_map(move |r| (0..self.width).map(move |q| HexCoord::from_axial(q, r)))
    }

    /// Clear every faction's visibility on every cell.
    pub fn reset_visibility(&mut self) {
        for tile in &mut self.cells {
            tile.reset_visibility();
        }
    }

    /// SHA-256 over dimensions, sentinel and cells.
    pub fn checksum(&self) -> WorldHash {
        let mut hasher = WorldHasher::for_world();
        hasher.update_i32(self.width);
        hasher.update_i32(self.height);
        self.sentinel.hash_into(&mut hasher);
        for tile in &self.cells {
            tile.hash_into(&mut hasher);
        }
        hasher.finalize()
    }

    /// Bytes `encode` will produce.
    pub fn wire_size(&self) -> usize {
        8 + TILE_WIRE_SIZE * (self.cells.len() + 1)
    }

    /// Write the full snapshot: width, height, sentinel, cells.
    pub fn encode(&self, wr: &mut PacketWriter) -> Result<(), CodecError> {
        wr.write_i32(self.width)?;
        wr.write_i32(self.height)?;
        self.sentinel.encode(wr)?;
        for tile in &self.cells {
            tile.encode(wr)?;
        }
        Ok(())
    }

    /// Read a full snapshot. The declared size is checked against the bytes
    /// left before anything is allocated.
    pub fn decode(rd: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        let width = rd.read_i32()?;
        let height = rd.read_i32()?;
        let count = cell_count(width, height)
            .map_err(|_| CodecError::InvalidDimensions { width, height })?;

        let needed = count
            .checked_add(1)
            .and_then(|n| n.checked_mul(TILE_WIRE_SIZE))
            .ok_or(CodecError::InvalidDimensions { width, height })?;
        if needed > rd.remaining() {
            return Err(CodecError::Truncated {
                needed,
                remaining: rd.remaining(),
            });
        }

        let sentinel = Tile::decode(rd)?;
        let mut cells = Vec::with_capacity(count);
        for _ in 0..count {
            cells.push(Tile::decode(rd)?);
        }
        Ok(Self {
            width,
            height,
            sentinel,
            cells,
        })
    }
}
