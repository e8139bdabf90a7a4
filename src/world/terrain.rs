//! Terrain Table
//!
//! Maps a tile's `terrain_id` to its name and movement cost. Loaded from
//! JSON, with a built-in table for when no file is supplied.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::world::tile::Tile;

/// Cost of entering a tile whose terrain id is not in the table.
pub const UNKNOWN_TERRAIN_COST: i32 = 1;

/// Terrain loading errors.
#[derive(Debug, Error)]
pub enum TerrainError {
    /// File could not be read.
    #[error("failed to read terrain table: {0}")]
    Io(#[from] std::io::Error),

    /// File is not a valid table.
    #[error("failed to parse terrain table: {0}")]
    Parse(#[from] serde_json::Error),

    /// Table has no entries.
    #[error("terrain table is empty")]
    Empty,

    /// Two entries share an id.
    #[error("duplicate terrain id {0}")]
    DuplicateId(i32),

    /// Movement costs must be positive.
    #[error("terrain {id} has non-positive movement cost {cost}")]
    InvalidCost {
        /// Offending entry.
        id: i32,
        /// Its cost.
        cost: i32,
    },
}

fn default_cost() -> i32 {
    1
}

/// One terrain definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerrainKind {
    /// Value stored in `Tile::terrain_id`.
    pub id: i32,
    /// Display name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Stamina spent entering a tile of this kind.
    #[serde(default = "default_cost")]
    pub movement_cost: i32,
}

impl TerrainKind {
    fn new(id: i32, name: &str, movement_cost: i32) -> Self {
        Self {
            id,
            name: name.to_owned(),
            description: String::new(),
            movement_cost,
        }
    }
}

/// Lookup table of terrain kinds.
#[derive(Debug, Clone)]
pub struct TerrainTable {
    kinds: Vec<TerrainKind>,
    by_id: HashMap<i32, usize>,
}

impl Default for TerrainTable {
    fn default() -> Self {
        let kinds = vec![
            TerrainKind::new(0, "plains", 1),
            TerrainKind::new(1, "grassland", 1),
            TerrainKind::new(2, "forest", 2),
            TerrainKind::new(3, "hills", 2),
            TerrainKind::new(4, "mountains", 3),
            TerrainKind::new(5, "water", 4),
        ];
        let by_id = kinds.iter().enumerate().map(|(i, k)| (k.id, i)).collect();
        Self { kinds, by_id }
    }
}

impl TerrainTable {
    /// Build a table, validating ids and costs.
    pub fn new(kinds: Vec<TerrainKind>) -> Result<Self, TerrainError> {
        if kinds.is_empty() {
            return Err(TerrainError::Empty);
        }
        let mut by_id = HashMap::with_capacity(kinds.len());
        for (i, kind) in kinds.iter().enumerate() {
            if kind.movement_cost < 1 {
                return Err(TerrainError::InvalidCost {
                    id: kind.id,
                    cost: kind.movement_cost,
                });
            }
            if by_id.insert(kind.id, i).is_some() {
                return Err(TerrainError::DuplicateId(kind.id));
            }
        }
        Ok(Self { kinds, by_id })
    }

    /// Parse a JSON array of terrain kinds.
    pub fn from_json_str(json: &str) -> Result<Self, TerrainError> {
        Self::new(serde_json::from_str(json)?)
    }

    /// Load a JSON table from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TerrainError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Serialize back to JSON.
    pub fn to_json(&self) -> Result<String, TerrainError> {
        Ok(serde_json::to_string_pretty(&self.kinds)?)
    }

    /// Kind with the given id.
    pub fn get(&self, id: i32) -> Option<&TerrainKind> {
        self.by_id.get(&id).map(|&i| &self.kinds[i])
    }

    /// Display name, `"unknown"` for ids not in the table.
    pub fn name(&self, id: i32) -> &str {
        self.get(id).map_or("unknown", |k| k.name.as_str())
    }

    /// Movement cost of a terrain id.
    pub fn movement_cost(&self, id: i32) -> i32 {
        self.get(id).map_or(UNKNOWN_TERRAIN_COST, |k| k.movement_cost)
    }

    /// Cost of entering `tile`, the shape the pathfinder takes.
    pub fn tile_cost(&self, tile: &Tile) -> i32 {
        self.movement_cost(tile.terrain_id)
    }

    /// All kinds in declaration order.
    pub fn kinds(&self) -> &[TerrainKind] {
        &self.kinds
    }

    /// Number of kinds.
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Never true for a constructed table.
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let table = TerrainTable::default();
        assert_eq!(table.name(2), "forest");
        assert_eq!(table.movement_cost(4), 3);
        assert_eq!(table.movement_cost(-1), UNKNOWN_TERRAIN_COST);
        assert_eq!(table.name(77), "unknown");
    }

    #[test]
    fn test_parse_json() {
        let table = TerrainTable::from_json_str(
            r#"[
                {"id": 0, "name": "sand", "movement_cost": 2},
                {"id": 7, "name": "road", "description": "fast"}
            ]"#,
        )
        .unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.movement_cost(0), 2);
        assert_eq!(table.movement_cost(7), 1);
        assert_eq!(table.get(7).map(|k| k.description.as_str()), Some("fast"));
        assert_eq!(table.tile_cost(&Tile::with_terrain(0)), 2);
    }

    #[test]
    fn test_rejects_bad_tables() {
        assert!(matches!(TerrainTable::from_json_str("[]"), Err(TerrainError::Empty)));
        assert!(matches!(
            TerrainTable::from_json_str(r#"[{"id":1,"name":"a"},{"id":1,"name":"b"}]"#),
            Err(TerrainError::DuplicateId(1))
        ));
        assert!(matches!(
            TerrainTable::from_json_str(r#"[{"id":1,"name":"a","movement_cost":0}]"#),
            Err(TerrainError::InvalidCost { id: 1, cost: 0 })
        ));
        assert!(matches!(
            TerrainTable::from_json_str("{"),
            Err(TerrainError::Parse(_))
        ));
    }

    #[test]
    fn test_json_roundtrip() {
        let table = TerrainTable::default();
        let json = table.to_json().unwrap();
        let back = TerrainTable::from_json_str(&json).unwrap();
        assert_eq!(back.kinds(), table.kinds());
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            TerrainTable::load("/nonexistent/terrain.json"),
            Err(TerrainError::Io(_))
        ));
    }
}
