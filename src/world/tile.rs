//! Tile State
//!
//! Per-cell payload: terrain, per-faction fog of war, and ownership fields.
//! The serialized form of a tile is also its wire form inside `WorldUpdate`.

use crate::core::hash::WorldHasher;
use crate::core::hex::Edge;
use crate::network::codec::{CodecError, PacketReader, PacketWriter};

/// Number of factions a visibility field can describe.
pub const MAX_FACTIONS: i32 = 16;

/// Terrain id of a cell nothing has been written to.
pub const UNSET_TERRAIN: i32 = -1;

/// Value of the ownership and structure fields when nothing is there.
pub const NONE_ID: i32 = -1;

/// Bytes a tile occupies on the wire.
pub const TILE_WIRE_SIZE: usize = 4 * (4 + 6 + 1 + 6);

/// Fog-of-war tier, two bits per faction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Visibility {
    /// Never seen.
    None = 0,
    /// Seen once, terrain known.
    Fog = 1,
    /// Currently observed.
    Normal = 2,
    /// Observed by a unit with full sight.
    Superior = 3,
}

impl Visibility {
    /// Decode the low two bits.
    pub const fn from_bits(bits: u32) -> Self {
        match bits & 0b11 {
            0 => Self::None,
            1 => Self::Fog,
            2 => Self::Normal,
            _ => Self::Superior,
        }
    }

    /// Two-bit representation.
    pub const fn bits(self) -> u32 {
        self as u32
    }
}

fn faction_shift(faction: i32) -> Option<u32> {
    (0..MAX_FACTIONS)
        .contains(&faction)
        .then(|| faction as u32 * 2)
}

/// One cell of the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tile {
    /// Terrain table id, `UNSET_TERRAIN` if never set.
    pub terrain_id: i32,
    /// Sixteen packed 2-bit `Visibility` slots, faction 0 in the low bits.
    pub visibility: u32,
    /// Owning faction, `NONE_ID` if unowned.
    pub owner_faction: i32,
    /// Structure on the cell.
    pub structure_id: i32,
    /// Structures along each edge, indexed by `Edge`.
    pub structure_edge_ids: [i32; 6],
    /// Upgrade on the cell.
    pub upgrade_id: i32,
    /// Upgrades along each edge, indexed by `Edge`.
    pub upgrade_edge_ids: [i32; 6],
}

impl Default for Tile {
    fn default() -> Self {
        Self {
            terrain_id: UNSET_TERRAIN,
            visibility: 0,
            owner_faction: NONE_ID,
            structure_id: NONE_ID,
            structure_edge_ids: [NONE_ID; 6],
            upgrade_id: NONE_ID,
            upgrade_edge_ids: [NONE_ID; 6],
        }
    }
}

impl Tile {
    /// Blank tile with the given terrain.
    pub fn with_terrain(terrain_id: i32) -> Self {
        Self {
            terrain_id,
            ..Self::default()
        }
    }

    /// Visibility tier of `faction`. Factions outside `0..MAX_FACTIONS`
    /// see nothing.
    pub fn visibility(&self, faction: i32) -> Visibility {
        match faction_shift(faction) {
            Some(shift) => Visibility::from_bits(self.visibility >> shift),
            None => Visibility::None,
        }
    }

    /// Raise `faction`'s tier. Bits are OR-ed in, so the stored tier never
    /// drops: `Fog` over `Normal` yields `Superior`, and `Superior` is
    /// absorbing. Out-of-range factions are ignored.
    pub fn set_visibility(&mut self, faction: i32, level: Visibility) {
        if let Some(shift) = faction_shift(faction) {
            self.visibility |= level.bits() << shift;
        }
    }

    /// Clear every faction's tier.
    pub fn reset_visibility(&mut self) {
        self.visibility = 0;
    }

    /// True if `faction` has ever seen this cell.
    pub fn is_revealed_to(&self, faction: i32) -> bool {
        self.visibility(faction) != Visibility::None
    }

    /// Structure along `edge`.
    pub fn structure_at(&self, edge: Edge) -> i32 {
        self.structure_edge_ids[edge.index()]
    }

    /// Upgrade along `edge`.
    pub fn upgrade_at(&self, edge: Edge) -> i32 {
        self.upgrade_edge_ids[edge.index()]
    }

    /// Write in wire order.
    pub fn encode(&self, wr: &mut PacketWriter) -> Result<(), CodecError> {
        wr.write_i32(self.terrain_id)?;
        wr.write_u32(self.visibility)?;
        wr.write_i32(self.owner_faction)?;
        wr.write_i32(self.structure_id)?;
        for id in self.structure_edge_ids {
            wr.write_i32(id)?;
        }
        wr.write_i32(self.upgrade_id)?;
        for id in self.upgrade_edge_ids {
            wr.write_i32(id)?;
        }
        Ok(())
    }

    /// Read in wire order.
    pub fn decode(rd: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        let terrain_id = rd.read_i32()?;
        let visibility = rd.read_u32()?;
        let owner_faction = rd.read_i32()?;
        let structure_id = rd.read_i32()?;
        let mut structure_edge_ids = [0; 6];
        for id in &mut structure_edge_ids {
            *id = rd.read_i32()?;
        }
        let upgrade_id = rd.read_i32()?;
        let mut upgrade_edge_ids = [0; 6];
        for id in &mut upgrade_edge_ids {
            *id = rd.read_i32()?;
        }
        Ok(Self {
            terrain_id,
            visibility,
            owner_faction,
            structure_id,
            structure_edge_ids,
            upgrade_id,
            upgrade_edge_ids,
        })
    }

    /// Feed into a world checksum, same field order as the wire.
    pub fn hash_into(&self, hasher: &mut WorldHasher) {
        hasher.update_i32(self.terrain_id);
        hasher.update_u32(self.visibility);
        hasher.update_i32(self.owner_faction);
        hasher.update_i32(self.structure_id);
        for id in self.structure_edge_ids {
            hasher.update_i32(id);
        }
        hasher.update_i32(self.upgrade_id);
        for id in self.upgrade_edge_ids {
            hasher.update_i32(id);
        }
    }
}
