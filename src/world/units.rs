//! Unit Store
//!
//! Sparse map from hex to the units standing on it. A hex holds at most one
//! unit per category; the category is a tag on the slot, not on the unit.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use crate::core::hash::{WorldHash, WorldHasher};
use crate::core::hex::HexCoord;

/// Sight radius of a freshly created unit.
pub const DEFAULT_VISION_RANGE: i32 = 1;

/// Movement budget of a freshly created unit.
pub const DEFAULT_STAMINA: i32 = 100;

/// Health of a freshly created unit.
pub const DEFAULT_HEALTH: i32 = 100;

/// Unit category; one slot per category on every hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UnitCategory {
    /// Combat units.
    Military,
    /// Workers and settlers.
    Civilian,
    /// Everything else.
    Special,
}

impl UnitCategory {
    /// Slot order, also the selection cycling order.
    pub const ALL: [UnitCategory; 3] = [Self::Military, Self::Civilian, Self::Special];

    /// Slot index.
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for UnitCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Military => "military",
            Self::Civilian => "civilian",
            Self::Special => "special",
        };
        f.write_str(name)
    }
}

/// Fields shared by every unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Unit {
    /// Game-assigned id.
    pub id: i32,
    /// Faction, also the visibility slot it reveals for.
    pub faction: i32,
    /// Hit points.
    pub health: i32,
    /// Reveal radius in hex steps.
    pub vision_range: i32,
    /// Remaining movement budget.
    pub stamina: i32,
    /// Nickname of the controlling player.
    pub owner: String,
}

impl Unit {
    /// Unit with default health, vision and stamina.
    pub fn new(id: i32, faction: i32, owner: impl Into<String>) -> Self {
        Self {
            id,
            faction,
            health: DEFAULT_HEALTH,
            vision_range: DEFAULT_VISION_RANGE,
            stamina: DEFAULT_STAMINA,
            owner: owner.into(),
        }
    }
}

/// Unit store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitError {
    /// Target slot already holds a unit.
    #[error("{category} slot at {coord} is occupied")]
    Occupied {
        /// Target hex.
        coord: HexCoord,
        /// Target slot.
        category: UnitCategory,
    },

    /// Source slot is empty.
    #[error("no {category} unit at {coord}")]
    Vacant {
        /// Source hex.
        coord: HexCoord,
        /// Source slot.
        category: UnitCategory,
    },
}

/// The units standing on one hex.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitsOnHex {
    slots: [Option<Unit>; 3],
}

impl UnitsOnHex {
    /// Unit in `category`'s slot.
    pub fn slot(&self, category: UnitCategory) -> Option<&Unit> {
        self.slots[category.index()].as_ref()
    }

    /// Mutable access to `category`'s slot.
    pub fn slot_mut(&mut self, category: UnitCategory) -> Option<&mut Unit> {
        self.slots[category.index()].as_mut()
    }

    fn take(&mut self, category: UnitCategory) -> Option<Unit> {
        self.slots[category.index()].take()
    }

    fn put(&mut self, category: UnitCategory, unit: Unit) -> Option<Unit> {
        self.slots[category.index()].replace(unit)
    }

    /// True if any slot is filled.
    pub fn has_any(&self) -> bool {
        self.slots.iter().any(Option::is_some)
    }

    /// Occupied slots in category order.
    pub fn iter(&self) -> impl Iterator<Item = (UnitCategory, &Unit)> {
        UnitCategory::ALL
            .into_iter()
            .filter_map(|c| self.slot(c).map(|u| (c, u)))
    }

    /// First occupied category.
    pub fn first_category(&self) -> Option<UnitCategory> {
        self.iter().next().map(|(c, _)| c)
    }

    /// Next occupied category after `current`, wrapping around. Returns
    /// `current` itself if it is the only occupied slot.
    pub fn next_category_after(&self, current: UnitCategory) -> Option<UnitCategory> {
        (1..=UnitCategory::ALL.len())
            .map(|step| UnitCategory::ALL[(current.index() + step) % UnitCategory::ALL.len()])
            .find(|&c| self.slot(c).is_some())
    }

    /// Owner of the first occupied slot.
    pub fn owner(&self) -> Option<&str> {
        self.iter().next().map(|(_, u)| u.owner.as_str())
    }

    /// Stamina of the first occupied slot, 0 when empty.
    pub fn stamina(&self) -> i32 {
        self.iter().next().map_or(0, |(_, u)| u.stamina)
    }

    /// Add `delta` to every unit's stamina.
    pub fn add_stamina(&mut self, delta: i32) {
        for unit in self.slots.iter_mut().flatten() {
            unit.stamina = unit.stamina.saturating_add(delta);
        }
    }

    /// True if the hex's units belong to `nickname`.
    pub fn is_owned_by(&self, nickname: &str) -> bool {
        self.owner() == Some(nickname)
    }
}

/// Every unit on the map.
///
/// Keys are wrapped horizontally once the map width is known, so every
/// spelling of a seam cell lands on the same entry.
#[derive(Debug, Clone, Default)]
pub struct UnitStore {
    store: HashMap<HexCoord, UnitsOnHex>,
    wrap_width: Option<i32>,
}

impl UnitStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty store for a map `width` hexes around.
    pub fn with_wrap_width(width: i32) -> Self {
        let mut store = Self::default();
        store.set_wrap_width(width);
        store
    }

    /// Width used to wrap keys, if any.
    pub fn wrap_width(&self) -> Option<i32> {
        self.wrap_width
    }

    /// Adopt a map width and re-key existing placements. Units that end up
    /// on the same slot keep the one re-keyed last.
    pub fn set_wrap_width(&mut self, width: i32) {
        self.wrap_width = (width > 0).then_some(width);
        let old = std::mem::take(&mut self.store);
        for (coord, units) in old {
            let key = self.key(coord);
            let entry = self.store.entry(key).or_default();
            for (category, unit) in units.iter() {
                entry.put(category, unit.clone());
            }
        }
    }

    /// Storage key for `coord`: `q` wrapped into the map width.
    pub fn key(&self, coord: HexCoord) -> HexCoord {
        match self.wrap_width {
            Some(width) => HexCoord::from_axial(coord.q().rem_euclid(width), coord.r()),
            None => coord,
        }
    }

    /// Number of hexes holding at least one unit.
    pub fn occupied_hexes(&self) -> usize {
        self.store.len()
    }

    /// Units on `coord`, `None` if the hex is empty.
    pub fn units_at(&self, coord: HexCoord) -> Option<&UnitsOnHex> {
        self.store.get(&self.key(coord))
    }

    /// Mutable units on `coord`, `None` if the hex is empty.
    pub fn units_at_mut(&mut self, coord: HexCoord) -> Option<&mut UnitsOnHex> {
        let key = self.key(coord);
        self.store.get_mut(&key)
    }

    /// Unit in a specific slot.
    pub fn unit(&self, coord: HexCoord, category: UnitCategory) -> Option<&Unit> {
        self.units_at(coord)?.slot(category)
    }

    /// True if the selection points at an existing unit.
    pub fn is_selection_valid(&self, coord: HexCoord, category: UnitCategory) -> bool {
        self.unit(coord, category).is_some()
    }

    /// Place a unit; fails if the slot is taken.
    pub fn place(
        &mut self,
        coord: HexCoord,
        category: UnitCategory,
        unit: Unit,
    ) -> Result<(), UnitError> {
        let coord = self.key(coord);
        if self.is_selection_valid(coord, category) {
            return Err(UnitError::Occupied { coord, category });
        }
        self.store.entry(coord).or_default().put(category, unit);
        Ok(())
    }

    /// Place a unit, replacing and returning any previous occupant.
    pub fn force_place(&mut self, coord: HexCoord, category: UnitCategory, unit: Unit) -> Option<Unit> {
        let coord = self.key(coord);
        self.store.entry(coord).or_default().put(category, unit)
    }

    /// Remove and return a unit.
    pub fn remove(&mut self, coord: HexCoord, category: UnitCategory) -> Option<Unit> {
        let coord = self.key(coord);
        let units = self.store.get_mut(&coord)?;
        let unit = units.take(category);
        if !units.has_any() {
            self.store.remove(&coord);
        }
        unit
    }

    /// Move a unit between hexes, keeping its slot. The source must be
    /// occupied and the destination slot free; on failure nothing changes.
    pub fn teleport(
        &mut self,
        from: HexCoord,
        to: HexCoord,
        category: UnitCategory,
    ) -> Result<(), UnitError> {
        let (from, to) = (self.key(from), self.key(to));
        if !self.is_selection_valid(from, category) {
            return Err(UnitError::Vacant {
                coord: from,
                category,
            });
        }
        if from == to {
            return Ok(());
        }
        if self.is_selection_valid(to, category) {
            return Err(UnitError::Occupied { coord: to, category });
        }
        if let Some(unit) = self.remove(from, category) {
            self.store.entry(to).or_default().put(category, unit);
        }
        Ok(())
    }

    /// Every occupied hex, unordered.
    pub fn iter(&self) -> impl Iterator<Item = (HexCoord, &UnitsOnHex)> {
        self.store.iter().map(|(c, u)| (*c, u))
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.store.clear();
    }

    /// Order-independent digest of all placements.
    pub fn checksum(&self) -> WorldHash {
        let mut coords: Vec<_> = self.store.keys().copied().collect();
        coords.sort();

        let mut hasher = WorldHasher::for_units();
        for coord in coords {
            let Some(units) = self.store.get(&coord) else {
                continue;
            };
            for (category, unit) in units.iter() {
                hasher.update_coord(coord);
                hasher.update_u32(category.index() as u32);
                hasher.update_i32(unit.id);
                hasher.update_i32(unit.faction);
                hasher.update_i32(unit.health);
                hasher.update_i32(unit.vision_range);
                hasher.update_i32(unit.stamina);
                hasher.update_str(&unit.owner);
            }
        }
        hasher.finalize()
    }
}
