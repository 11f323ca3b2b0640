//! Cluster detection - finding matching chains and floating bubbles.
//!
//! Both searches are flood fills (BFS) over the neighbor links stored on the
//! placed bubbles:
//! - a chain is every bubble reachable from the landed one through bubbles
//!   of the same color;
//! - a floater is every bubble that cannot be reached from the top row.

use std::collections::{HashSet, VecDeque};

use super::{grid::BubbleGrid, hex::CellAddress};

/// Minimum chain size to pop (match-3).
pub const MIN_CHAIN_SIZE: usize = 3;

/// Points for a chain of exactly [`MIN_CHAIN_SIZE`].
const BASE_CHAIN_POINTS: u32 = 30;

/// Bonus step for longer chains; doubles with every extra bubble.
const CHAIN_BONUS_STEP: u32 = 20;

/// Default points per floating bubble, awarded on the pass after a match.
pub const FLOATER_BONUS: u32 = 100;

/// Find all connected bubbles of the same color as the one at `start`.
///
/// Includes `start` itself. Empty if `start` holds no bubble.
pub fn connected_same_color(grid: &BubbleGrid, start: CellAddress) -> Vec<CellAddress> {
    let Some(origin) = grid.get(start) else {
        return Vec::new();
    };
    let target_color = origin.color;

    let mut chain = Vec::new();
    let mut visited = HashSet::from([start]);
    let mut queue = VecDeque::from([start]);

    while let Some(cell) = queue.pop_front() {
        let Some(bubble) = grid.get(cell) else {
            continue;
        };
        chain.push(cell);

        for (_, neighbor) in bubble.neighbors().iter() {
            let same_color = grid
                .get(neighbor)
                .is_some_and(|other| other.color == target_color);
            if same_color && visited.insert(neighbor) {
                queue.push_back(neighbor);
            }
        }
    }

    chain
}

/// Points for popping a chain of `len` bubbles.
///
/// 30 for a match-3, then `30 + 20 * (2^(len - 3) - 1)`: 50, 90, 170, ...
/// Chains below the minimum score nothing.
pub fn chain_score(len: usize) -> u32 {
    if len < MIN_CHAIN_SIZE {
        return 0;
    }
    let extra = u32::try_from(len - MIN_CHAIN_SIZE).unwrap_or(u32::MAX);
    let growth = 1u32.checked_shl(extra).unwrap_or(u32::MAX);
    BASE_CHAIN_POINTS.saturating_add(CHAIN_BONUS_STEP.saturating_mul(growth - 1))
}

/// Find all bubbles connected to the top row using BFS.
fn find_anchored(grid: &BubbleGrid) -> HashSet<CellAddress> {
    let mut anchored = HashSet::new();
    let mut queue = VecDeque::new();

    for col in 0..grid.cols() as i32 {
        let cell = CellAddress::new(0, col);
        if grid.is_occupied(cell) {
            anchored.insert(cell);
            queue.push_back(cell);
        }
    }

    while let Some(cell) = queue.pop_front() {
        let Some(bubble) = grid.get(cell) else {
            continue;
        };
        for (_, neighbor) in bubble.neighbors().iter() {
            if grid.is_occupied(neighbor) && anchored.insert(neighbor) {
                queue.push_back(neighbor);
            }
        }
    }

    anchored
}

/// Every placed bubble with no path to the ceiling.
///
/// Listed bottom row first so the cascade drops from the bottom up.
pub fn find_floaters(grid: &BubbleGrid) -> Vec<CellAddress> {
    let anchored = find_anchored(grid);
    let mut floaters: Vec<CellAddress> = grid
        .occupied_cells()
        .filter(|cell| !anchored.contains(cell))
        .collect();
    // Occupied cells come out row-major; flip rows, keep columns left to right.
    floaters.sort_by(|a, b| b.row.cmp(&a.row).then(a.col.cmp(&b.col)));
    floaters
}
