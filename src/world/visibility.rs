//! Visibility Engine
//!
//! Fog of war only ever lifts during play. Every reveal raises tiers through
//! `Tile::set_visibility`; `reset_visibility` is the single way back down.

use crate::core::hex::HexCoord;
use crate::world::grid::World;
use crate::world::tile::Visibility;
use crate::world::units::Unit;

/// Center of the area every faction starts with, in axial coordinates.
pub const STARTING_AREA_CENTER: HexCoord = HexCoord::from_axial(1, 1);

/// Raise every stored hex within `range` steps of `center` to `Superior`
/// for `faction`. Rows off the map are skipped. Returns the number of hexes
/// visited.
pub fn reveal_around(world: &mut World, center: HexCoord, range: i32, faction: i32) -> usize {
    let mut revealed = 0;
    for coord in center.spiral(range.max(0) as u32) {
        if let Some(tile) = world.tile_mut_checked(coord) {
            tile.set_visibility(faction, Visibility::Superior);
            revealed += 1;
        }
    }
    revealed
}

/// Reveal what `unit` sees from `position`.
pub fn reveal_for_unit(world: &mut World, position: HexCoord, unit: &Unit) -> usize {
    reveal_around(world, position, unit.vision_range, unit.faction)
}

/// Reveal the starting area for `faction`.
pub fn reveal_starting_area(world: &mut World, faction: i32) -> usize {
    reveal_around(world, STARTING_AREA_CENTER, 1, faction)
}

/// Clear all visibility, e.g. after the map is regenerated.
pub fn reset_visibility(world: &mut World) {
    world.reset_visibility();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::tile::Tile;
    use proptest::prelude::*;

    fn world(width: i32, height: i32) -> World {
        World::new(width, height, Tile::default(), Tile::with_terrain(0)).unwrap()
    }

    fn revealed(world: &World, faction: i32) -> usize {
        world
            .cells()
            .iter()
            .filter(|t| t.visibility(faction) != Visibility::None)
            .count()
    }

    #[test]
    fn test_reveal_range_one() {
        let mut w = world(8, 8);
        let center = HexCoord::from_axial(4, 4);
        assert_eq!(reveal_around(&mut w, center, 1, 3), 7);
        assert_eq!(revealed(&w, 3), 7);
        assert_eq!(w.tile(center).visibility(3), Visibility::Superior);
        for n in center.neighbors() {
            assert_eq!(w.tile(n).visibility(3), Visibility::Superior);
        }
        assert_eq!(revealed(&w, 2), 0);
    }

    #[test]
    fn test_reveal_range_zero_is_center_only() {
        let mut w = world(5, 5);
        assert_eq!(reveal_around(&mut w, HexCoord::from_axial(2, 2), 0, 0), 1);
        assert_eq!(reveal_around(&mut w, HexCoord::from_axial(2, 2), -3, 0), 1);
        assert_eq!(revealed(&w, 0), 1);
    }

    #[test]
    fn test_reveal_skips_rows_off_map() {
        let mut w = world(6, 4);
        let sentinel = *w.sentinel();
        let n = reveal_around(&mut w, HexCoord::from_axial(2, 0), 1, 1);
        assert_eq!(n, 5);
        assert_eq!(*w.sentinel(), sentinel);
    }

    #[test]
    fn test_reveal_wraps_horizontally() {
        let mut w = world(6, 4);
        reveal_around(&mut w, HexCoord::from_axial(0, 2), 1, 0);
        assert_eq!(w.tile(HexCoord::from_axial(5, 2)).visibility(0), Visibility::Superior);
    }

    #[test]
    fn test_starting_area() {
        let mut w = world(6, 6);
        assert_eq!(reveal_starting_area(&mut w, 2), 7);
        assert!(w.tile(HexCoord::from_axial(1, 1)).is_revealed_to(2));
        assert!(w.tile(HexCoord::from_axial(2, 0)).is_revealed_to(2));
        assert!(!w.tile(HexCoord::from_axial(3, 3)).is_revealed_to(2));
    }

    #[test]
    fn test_reveal_for_unit_uses_vision_range() {
        let mut w = world(10, 10);
        let mut unit = Unit::new(1, 5, "a");
        unit.vision_range = 2;
        assert_eq!(reveal_for_unit(&mut w, HexCoord::from_axial(5, 5), &unit), 19);
        assert_eq!(revealed(&w, 5), 19);
    }

    #[test]
    fn test_reset_is_the_only_way_down() {
        let mut w = world(4, 4);
        reveal_starting_area(&mut w, 0);
        let c = HexCoord::from_axial(1, 1);
        w.tile_mut(c).set_visibility(0, Visibility::Fog);
        assert_eq!(w.tile(c).visibility(0), Visibility::Superior);
        reset_visibility(&mut w);
        assert_eq!(revealed(&w, 0), 0);
    }

    proptest! {
        #[test]
        fn prop_reveals_never_lower(
            reveals in proptest::collection::vec((0i32..8, 0i32..8, 0i32..3, 0i32..4), 1..20),
        ) {
            let mut w = world(8, 8);
            let mut before: Vec<_> = w.cells().to_vec();
            for (q, r, range, faction) in reveals {
                reveal_around(&mut w, HexCoord::from_axial(q, r), range, faction);
                for (old, new) in before.iter().zip(w.cells()) {
                    for f in 0..4 {
                        prop_assert!(new.visibility(f) >= old.visibility(f));
                    }
                }
                before = w.cells().to_vec();
            }
        }
    }
}
