//! A* Pathfinding
//!
//! Searches the hex plane from a start to a goal hex, weighting each step by
//! the cost of the tile being entered and pruning anything beyond the
//! mover's stamina budget.
//!
//! Coordinates are searched as given, without wrapping, so a path may cross
//! the seam or run along the clamped rows; terrain is looked up through the
//! normalized accessor. Every step costs at least 1, which keeps the hex
//! distance heuristic admissible and bounds the search by the budget.
//!
//! The open set is a `BinaryHeap` with reversed ordering. Equal `f` scores
//! prefer the larger `g`, then the earlier insertion, so results are
//! reproducible across runs and platforms.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::core::hex::HexCoord;
use crate::world::grid::World;
use crate::world::tile::Tile;

/// Budget meaning "no limit".
pub const UNLIMITED_STAMINA: i32 = i32::MAX;

/// Outcome of a search. An empty `path` means no route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathResult {
    /// Hexes from start to goal, both inclusive.
    pub path: Vec<HexCoord>,
    /// Sum of entry costs along the path, start excluded.
    pub cost: i32,
    /// Hexes closed during the search, in the order they were closed.
    pub explored: Vec<HexCoord>,
}

impl PathResult {
    /// True if the path contains an actual move.
    pub fn is_move(&self) -> bool {
        self.path.len() > 1
    }

    /// Last hex of the path.
    pub fn destination(&self) -> Option<HexCoord> {
        self.path.last().copied()
    }
}

struct OpenEntry {
    coord: HexCoord,
    f: i32,
    g: i32,
    seq: u64,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: smallest f first, then largest g, then oldest entry.
        other
            .f
            .cmp(&self.f)
            .then_with(|| self.g.cmp(&other.g))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

fn step_cost<F>(world: &World, coord: HexCoord, cost_fn: &F) -> i32
where
    F: Fn(&Tile) -> i32,
{
    cost_fn(world.tile(coord)).max(1)
}

/// Find the cheapest path from `start` to `goal` whose cost stays within
/// `budget`. `cost_fn` gives the cost of entering a tile; values below 1
/// count as 1.
pub fn find_path<F>(world: &World, start: HexCoord, goal: HexCoord, budget: i32, cost_fn: F) -> PathResult
where
    F: Fn(&Tile) -> i32,
{
    let mut best: HashMap<HexCoord, i32> = HashMap::new();
    let mut closed: HashMap<HexCoord, i32> = HashMap::new();
    let mut explored = Vec::new();
    let mut open = BinaryHeap::new();
    let mut seq = 0u64;

    best.insert(start, 0);
    open.push(OpenEntry {
        coord: start,
        f: start.distance(goal),
        g: 0,
        seq,
    });

    while let Some(current) = open.pop() {
        if closed.contains_key(&current.coord) {
            continue;
        }
        if best.get(&current.coord).is_some_and(|&g| current.g > g) {
            continue;
        }
        closed.insert(current.coord, current.g);
        explored.push(current.coord);

        if current.coord == goal {
            return PathResult {
                path: reconstruct(world, start, goal, &closed, &cost_fn),
                cost: current.g,
                explored,
            };
        }

        for next in current.coord.neighbors() {
            if closed.contains_key(&next) {
                continue;
            }
            let Some(tentative) = current.g.checked_add(step_cost(world, next, &cost_fn)) else {
                continue;
            };
            if tentative > budget {
                continue;
            }
            if best.get(&next).is_some_and(|&g| tentative >= g) {
                continue;
            }
            best.insert(next, tentative);
            seq += 1;
            open.push(OpenEntry {
                coord: next,
                f: tentative.saturating_add(next.distance(goal)),
                g: tentative,
                seq,
            });
        }
    }

    PathResult {
        path: Vec::new(),
        cost: 0,
        explored,
    }
}

/// Walk back from the goal through closed hexes whose recorded cost plus
/// the step cost matches the current hex.
fn reconstruct<F>(
    world: &World,
    start: HexCoord,
    goal: HexCoord,
    closed: &HashMap<HexCoord, i32>,
    cost_fn: &F,
) -> Vec<HexCoord>
where
    F: Fn(&Tile) -> i32,
{
    let mut path = vec![goal];
    let mut current = goal;
    while current != start {
        let Some(&g) = closed.get(&current) else {
            break;
        };
        let enter = step_cost(world, current, cost_fn);
        let prev = current
            .neighbors()
            .into_iter()
            .find(|n| closed.get(n).is_some_and(|&pg| pg.checked_add(enter) == Some(g)));
        match prev {
            Some(prev) => {
                path.push(prev);
                current = prev;
            }
            None => break,
        }
    }
    path.reverse();
    path
}

/// Cost of walking `path`: entry costs of every hex after the first.
pub fn path_cost<F>(world: &World, path: &[HexCoord], cost_fn: F) -> i32
where
    F: Fn(&Tile) -> i32,
{
    path.iter()
        .skip(1)
        .fold(0i32, |acc, &c| acc.saturating_add(step_cost(world, c, &cost_fn)))
}
