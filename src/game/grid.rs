//! The hexagonal grid that holds all placed bubbles.
//!
//! Storage is a dense row-major arena of `Option<Bubble>`. Neighbor links on
//! each bubble are addresses into this same arena, so adding or removing a
//! bubble only ever touches slots and addresses, never ownership.

use bevy::prelude::*;
use tracing::{debug, info, warn};

use super::{
    bubble::{Bubble, ColorSource, Neighbors},
    engine::GameOverCause,
    hex::{CellAddress, HexLayout},
};

/// The occupied-cell matrix plus the layout it is drawn with.
#[derive(Debug, Clone, PartialEq)]
pub struct BubbleGrid {
    layout: HexLayout,
    cells: Vec<Option<Bubble>>,
}

impl BubbleGrid {
    /// Create an empty grid.
    pub fn new(layout: HexLayout) -> Self {
        Self {
            layout,
            cells: vec![None; layout.rows() * layout.cols()],
        }
    }

    pub fn layout(&self) -> &HexLayout {
        &self.layout
    }

    pub fn rows(&self) -> usize {
        self.layout.rows()
    }

    pub fn cols(&self) -> usize {
        self.layout.cols()
    }

    /// Get the bubble at a cell, if any.
    pub fn get(&self, cell: CellAddress) -> Option<&Bubble> {
        self.layout
            .index(cell)
            .and_then(|index| self.cells[index].as_ref())
    }

    fn get_mut(&mut self, cell: CellAddress) -> Option<&mut Bubble> {
        self.layout
            .index(cell)
            .and_then(|index| self.cells[index].as_mut())
    }

    /// Check if a cell is occupied.
    pub fn is_occupied(&self, cell: CellAddress) -> bool {
        self.get(cell).is_some()
    }

    /// Get the number of bubbles in the grid.
    pub fn len(&self) -> usize {
        self.cells.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(Option::is_none)
    }

    /// Iterate over all placed bubbles in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = &Bubble> {
        self.cells.iter().flatten()
    }

    /// Get all occupied cells in row-major order.
    pub fn occupied_cells(&self) -> impl Iterator<Item = CellAddress> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(index, _)| self.layout.address(index))
    }

    /// Whether any cell of the last row holds a bubble.
    pub fn bottom_row_occupied(&self) -> bool {
        let cols = self.cols();
        self.cells[self.cells.len() - cols..]
            .iter()
            .any(Option::is_some)
    }

    /// Remove every bubble and restore the default row parity.
    pub fn clear(&mut self) {
        self.cells.iter_mut().for_each(|slot| *slot = None);
        self.layout.reset_parity();
    }

    /// Commit a bubble to a cell and wire links to every occupied neighbor,
    /// in both directions.
    ///
    /// Returns false (and drops nothing into the grid) if the cell is outside
    /// the grid or already taken.
    pub fn place_bubble(&mut self, mut bubble: Bubble, cell: CellAddress) -> bool {
        let Some(index) = self.layout.index(cell) else {
            warn!("Ignoring out-of-bounds placement at {}", cell);
            return false;
        };
        if self.cells[index].is_some() {
            warn!("Ignoring placement onto occupied cell {}", cell);
            return false;
        }

        bubble.position = self.layout.position_for_cell(cell);
        bubble.velocity = Vec2::ZERO;
        bubble.last_hit_cell = None;
        bubble.cell = Some(cell);
        bubble.neighbors.clear();

        for (dir, neighbor_cell) in self.layout.neighbor_coords(cell) {
            if let Some(neighbor) = self.get_mut(neighbor_cell) {
                neighbor.neighbors.set(dir.reverse(), Some(cell));
                bubble.neighbors.set(dir, Some(neighbor_cell));
            }
        }

        self.cells[index] = Some(bubble);
        true
    }

    /// Take a bubble out of the grid, cutting its links on both sides.
    ///
    /// Removing an empty cell is a logic error: it asserts in debug builds
    /// and is logged and ignored in release builds.
    pub fn remove_bubble(&mut self, cell: CellAddress) -> Option<Bubble> {
        let taken = self
            .layout
            .index(cell)
            .and_then(|index| self.cells[index].take());
        debug_assert!(taken.is_some(), "removed a bubble from empty cell {cell}");
        let Some(mut bubble) = taken else {
            warn!("Ignoring removal from empty cell {}", cell);
            return None;
        };

        for (dir, neighbor_cell) in bubble.neighbors.iter() {
            let Some(neighbor) = self.get_mut(neighbor_cell) else {
                continue;
            };
            if neighbor.neighbors.get(dir.reverse()) == Some(cell) {
                neighbor.neighbors.set(dir.reverse(), None);
            }
        }

        bubble.neighbors.clear();
        bubble.cell = None;
        Some(bubble)
    }

    /// Pick the cell a landed bubble at `position` should snap into.
    ///
    /// With a hit cell the candidates are the hit cell and its neighbors.
    /// Without one (the bubble stopped at the ceiling) the candidate is the
    /// cell under the bubble, falling back to that cell's neighbors when it
    /// is taken. Among empty candidates the closest center wins; ties go to
    /// the lowest row, then the lowest column.
    pub fn snap_target(&self, position: Vec2, hit: Option<CellAddress>) -> Option<CellAddress> {
        match hit {
            Some(hit) => {
                let candidates = std::iter::once(hit)
                    .chain(self.layout.neighbor_coords(hit).into_iter().map(|(_, c)| c));
                self.closest_empty(position, candidates)
            }
            None => {
                let cell = self.layout.cell_for_position(position);
                if !self.layout.contains(cell) {
                    return None;
                }
                if !self.is_occupied(cell) {
                    return Some(cell);
                }
                let candidates = self.layout.neighbor_coords(cell).into_iter().map(|(_, c)| c);
                self.closest_empty(position, candidates)
            }
        }
    }

    fn closest_empty(
        &self,
        position: Vec2,
        candidates: impl IntoIterator<Item = CellAddress>,
    ) -> Option<CellAddress> {
        let mut candidates: Vec<CellAddress> = candidates
            .into_iter()
            .filter(|cell| self.layout.contains(*cell) && !self.is_occupied(*cell))
            .collect();
        candidates.sort_unstable();
        candidates.dedup();

        let mut best: Option<(CellAddress, f32)> = None;
        for cell in candidates {
            let distance_sq = self.layout.position_for_cell(cell).distance_squared(position);
            if best.is_none_or(|(_, best_sq)| distance_sq < best_sq) {
                best = Some((cell, distance_sq));
            }
        }
        best.map(|(cell, _)| cell)
    }

    /// Snap a landed projectile into the grid.
    ///
    /// Consumes the bubble's `last_hit_cell`. Returns the cell it was placed
    /// in, or `None` when there is nowhere valid to put it.
    pub fn snap_to_grid(&mut self, mut bubble: Bubble) -> Option<CellAddress> {
        let hit = bubble.last_hit_cell.take();
        let Some(cell) = self.snap_target(bubble.position, hit) else {
            info!(
                "No valid cell for bubble at {:?} (hit cell {:?})",
                bubble.position, hit
            );
            return None;
        };
        self.place_bubble(bubble, cell).then_some(cell)
    }

    /// Fill the top `rows` rows with freshly colored bubbles.
    ///
    /// Returns how many bubbles were placed.
    pub fn populate_rows(&mut self, rows: usize, colors: &mut dyn ColorSource) -> usize {
        let rows = rows.min(self.rows()) as i32;
        let cols = self.cols() as i32;
        let mut count = 0;

        for row in 0..rows {
            for col in 0..cols {
                let bubble = Bubble::new(colors.next_color(), Vec2::ZERO);
                if self.place_bubble(bubble, CellAddress::new(row, col)) {
                    count += 1;
                }
            }
        }

        count
    }

    /// Push every row down by one and fill row 0 with new bubbles.
    ///
    /// Fails without touching the grid if the last row holds any bubble,
    /// since it would be pushed off the board.
    pub fn inject_row(&mut self, colors: &mut dyn ColorSource) -> Result<(), GameOverCause> {
        if self.bottom_row_occupied() {
            warn!("Bottom row occupied, cannot inject a new row");
            return Err(GameOverCause::GridOverflow);
        }

        // The bottom row is empty, so rotating moves it to the top.
        let cols = self.cols();
        self.cells.rotate_right(cols);
        self.layout.flip_parity();

        for index in cols..self.cells.len() {
            let cell = self.layout.address(index);
            let position = self.layout.position_for_cell(cell);
            if let Some(bubble) = self.cells[index].as_mut() {
                bubble.cell = Some(cell);
                bubble.position = position;
            }
        }

        for index in 0..cols {
            let cell = self.layout.address(index);
            let mut bubble = Bubble::new(colors.next_color(), self.layout.position_for_cell(cell));
            bubble.cell = Some(cell);
            self.cells[index] = Some(bubble);
        }

        self.rebuild_links();
        debug!(
            "Injected a new row, parity flipped={}",
            self.layout.parity_flipped()
        );
        Ok(())
    }

    /// The links a bubble at `cell` should have, given current occupancy.
    fn expected_links(&self, cell: CellAddress) -> Neighbors {
        let mut links = Neighbors::default();
        for (dir, neighbor) in self.layout.neighbor_coords(cell) {
            if self.is_occupied(neighbor) {
                links.set(dir, Some(neighbor));
            }
        }
        links
    }

    /// Recompute every bubble's links from occupancy.
    pub fn rebuild_links(&mut self) {
        for index in 0..self.cells.len() {
            if self.cells[index].is_none() {
                continue;
            }
            let links = self.expected_links(self.layout.address(index));
            if let Some(bubble) = self.cells[index].as_mut() {
                bubble.neighbors = links;
            }
        }
    }

    /// Check that every bubble knows its own cell and that its links match
    /// the occupied adjacency exactly.
    pub fn links_consistent(&self) -> bool {
        self.cells.iter().enumerate().all(|(index, slot)| {
            let Some(bubble) = slot else {
                return true;
            };
            let cell = self.layout.address(index);
            bubble.cell == Some(cell) && bubble.neighbors == self.expected_links(cell)
        })
    }
}
