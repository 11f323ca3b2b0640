//! Hexagonal cell addressing for the bubble grid.
//!
//! Rows are packed "pointy-top": every other row is shifted right by half a
//! cell. Which rows are shifted is not fixed. Each time a row is injected at
//! the top the whole pattern flips, so the layout carries a parity flag that
//! every coordinate conversion and neighbor lookup goes through.
//!
//! A row is *flush-left* when `(row is even) XOR parity_flipped`; all other
//! rows are offset by half a column width.

use bevy::prelude::*;

/// Square root of 3, used for row spacing.
pub const SQRT_3: f32 = 1.732_050_8;

/// A slot in the hex grid.
///
/// Rows grow downward from 0 at the ceiling, columns grow to the right.
/// Addresses may point outside the grid (e.g. a projectile below the last
/// row); use [`HexLayout::contains`] before indexing.
///
/// Ordering is row-major, which is also the tie-break order for snapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellAddress {
    /// Row (y-axis)
    pub row: i32,
    /// Column (x-axis)
    pub col: i32,
}

impl CellAddress {
    /// Create a new cell address.
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// The address shifted by a (row, col) delta.
    #[inline]
    pub const fn offset(self, d_row: i32, d_col: i32) -> Self {
        Self::new(self.row + d_row, self.col + d_col)
    }
}

impl std::fmt::Display for CellAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// The six neighbor directions of a hex cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    TopLeft,
    TopRight,
    Left,
    Right,
    BottomLeft,
    BottomRight,
}

impl Direction {
    /// All directions, in the order neighbor lookups emit them.
    pub const ALL: [Direction; 6] = [
        Direction::TopLeft,
        Direction::TopRight,
        Direction::Left,
        Direction::Right,
        Direction::BottomLeft,
        Direction::BottomRight,
    ];

    /// The direction pointing back the other way.
    pub const fn reverse(self) -> Self {
        match self {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
            Direction::TopLeft => Direction::BottomRight,
            Direction::BottomRight => Direction::TopLeft,
            Direction::TopRight => Direction::BottomLeft,
            Direction::BottomLeft => Direction::TopRight,
        }
    }

    /// Stable slot index, used by [`Neighbors`](super::bubble::Neighbors).
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// (row, col) deltas for a flush-left row, in [`Direction::ALL`] order.
const FLUSH_LEFT_OFFSETS: [(i32, i32); 6] = [(-1, -1), (-1, 0), (0, -1), (0, 1), (1, -1), (1, 0)];

/// (row, col) deltas for a row shifted right by half a cell.
const SHIFTED_OFFSETS: [(i32, i32); 6] = [(-1, 0), (-1, 1), (0, -1), (0, 1), (1, 0), (1, 1)];

/// Geometry of the grid: extent, cell size, screen origin and the row
/// parity flag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HexLayout {
    rows: usize,
    cols: usize,
    radius: f32,
    margin: f32,
    left: f32,
    top: f32,
    parity_flipped: bool,
}

impl HexLayout {
    /// Create a layout for a `rows` x `cols` grid of bubbles with the given
    /// radius and spacing margin. `origin` is the top-left corner of the field.
    pub fn new(rows: usize, cols: usize, radius: f32, margin: f32, origin: Vec2) -> Self {
        Self {
            rows,
            cols,
            radius,
            margin,
            left: origin.x,
            top: origin.y,
            parity_flipped: false,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Bubble radius in pixels.
    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn left_offset(&self) -> f32 {
        self.left
    }

    pub fn top_offset(&self) -> f32 {
        self.top
    }

    /// Vertical distance between row centers: `(radius + margin) * sqrt(3)`.
    pub fn row_height(&self) -> f32 {
        (self.radius + self.margin) * SQRT_3
    }

    /// Horizontal distance between column centers: `2 * (radius + margin)`.
    pub fn col_width(&self) -> f32 {
        2.0 * (self.radius + self.margin)
    }

    pub fn field_width(&self) -> f32 {
        self.col_width() * self.cols as f32
    }

    /// Field width including the half cell that shifted rows stick out by.
    /// This is where the side walls sit.
    pub fn field_draw_width(&self) -> f32 {
        self.field_width() + 0.5 * self.col_width()
    }

    pub fn field_height(&self) -> f32 {
        self.row_height() * self.rows as f32
    }

    /// Where the loaded bubble waits: centered, two and a half rows below
    /// the field.
    pub fn shooter_position(&self) -> Vec2 {
        Vec2::new(
            self.left + self.field_width() / 2.0,
            self.top + self.field_height() + 2.5 * self.row_height(),
        )
    }

    /// Where the next-bubble preview is shown, level with the shooter.
    pub fn preview_position(&self) -> Vec2 {
        Vec2::new(
            self.left + 0.5 * self.col_width(),
            self.shooter_position().y,
        )
    }

    /// Whether a point lies inside the playfield rectangle (walls included).
    pub fn playfield_contains(&self, pos: Vec2) -> bool {
        pos.x >= self.left
            && pos.x <= self.left + self.field_draw_width()
            && pos.y >= self.top
            && pos.y <= self.top + self.field_height()
    }

    /// Check if a cell address is within the grid.
    pub fn contains(&self, cell: CellAddress) -> bool {
        cell.row >= 0
            && cell.col >= 0
            && (cell.row as usize) < self.rows
            && (cell.col as usize) < self.cols
    }

    /// Row-major index of a cell, if it is inside the grid.
    pub fn index(&self, cell: CellAddress) -> Option<usize> {
        self.contains(cell)
            .then(|| cell.row as usize * self.cols + cell.col as usize)
    }

    /// Inverse of [`index`](Self::index).
    pub fn address(&self, index: usize) -> CellAddress {
        CellAddress::new((index / self.cols) as i32, (index % self.cols) as i32)
    }

    pub fn parity_flipped(&self) -> bool {
        self.parity_flipped
    }

    /// Toggle which rows are shifted. Called once per injected row.
    pub fn flip_parity(&mut self) {
        self.parity_flipped = !self.parity_flipped;
    }

    pub fn reset_parity(&mut self) {
        self.parity_flipped = false;
    }

    /// Whether `row` starts flush against the left wall.
    #[inline]
    pub fn is_flush_left(&self, row: i32) -> bool {
        (row.rem_euclid(2) == 0) != self.parity_flipped
    }

    /// Map a position to the cell it falls in.
    ///
    /// The column is clamped into the grid; the row is not, so callers can
    /// tell "above the ceiling" and "below the last row" apart from a real
    /// cell.
    pub fn cell_for_position(&self, pos: Vec2) -> CellAddress {
        let row = ((pos.y - self.top) / self.row_height()).floor() as i32;

        let mut x = pos.x - self.left;
        if !self.is_flush_left(row) {
            x -= self.col_width() / 2.0;
        }
        let max_col = self.cols.saturating_sub(1) as i32;
        let col = ((x / self.col_width()).floor() as i32).clamp(0, max_col);

        CellAddress::new(row, col)
    }

    /// Center of a cell in screen space.
    pub fn position_for_cell(&self, cell: CellAddress) -> Vec2 {
        let y = self.top + (cell.row as f32 + 0.5) * self.row_height();
        let x = if self.is_flush_left(cell.row) {
            self.left + (cell.col as f32 + 0.5) * self.col_width()
        } else {
            self.left + (cell.col as f32 + 1.0) * self.col_width()
        };
        Vec2::new(x, y)
    }

    /// The in-bounds neighbors of a cell, each paired with its direction.
    pub fn neighbor_coords(&self, cell: CellAddress) -> Vec<(Direction, CellAddress)> {
        let offsets = if self.is_flush_left(cell.row) {
            &FLUSH_LEFT_OFFSETS
        } else {
            &SHIFTED_OFFSETS
        };

        Direction::ALL
            .iter()
            .zip(offsets)
            .map(|(&dir, &(d_row, d_col))| (dir, cell.offset(d_row, d_col)))
            .filter(|(_, neighbor)| self.contains(*neighbor))
            .collect()
    }

    /// The neighbor of `cell` in one direction, if it is inside the grid.
    pub fn neighbor(&self, cell: CellAddress, dir: Direction) -> Option<CellAddress> {
        self.neighbor_coords(cell)
            .into_iter()
            .find(|(d, _)| *d == dir)
            .map(|(_, neighbor)| neighbor)
    }

    /// Iterate over every cell of the grid in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = CellAddress> + use<> {
        let (rows, cols) = (self.rows as i32, self.cols as i32);
        (0..rows).flat_map(move |row| (0..cols).map(move |col| CellAddress::new(row, col)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> HexLayout {
        HexLayout::new(15, 17, 15.0, 3.0, Vec2::new(50.0, 50.0))
    }

    #[test]
    fn test_geometry_constants() {
        let layout = layout();
        assert_eq!(layout.col_width(), 36.0);
        assert!((layout.row_height() - 18.0 * SQRT_3).abs() < 1e-4);
        assert_eq!(layout.field_draw_width(), 36.0 * 17.0 + 18.0);
        assert_eq!(layout.shooter_position().x, 50.0 + 306.0);
    }

    #[test]
    fn test_position_roundtrip_all_cells() {
        let mut layout = layout();
        for _ in 0..2 {
            for cell in layout.cells() {
                let pos = layout.position_for_cell(cell);
                assert_eq!(layout.cell_for_position(pos), cell, "flipped={}", layout.parity_flipped());
            }
            layout.flip_parity();
        }
    }

    #[test]
    fn test_shifted_rows_sit_half_a_cell_right() {
        let mut layout = layout();
        let even = layout.position_for_cell(CellAddress::new(0, 3));
        let odd = layout.position_for_cell(CellAddress::new(1, 3));
        assert_eq!(odd.x - even.x, 18.0);

        layout.flip_parity();
        let even = layout.position_for_cell(CellAddress::new(0, 3));
        let odd = layout.position_for_cell(CellAddress::new(1, 3));
        assert_eq!(even.x - odd.x, 18.0);
    }

    #[test]
    fn test_column_clamped_row_not_clamped() {
        let layout = layout();
        let far_left = layout.cell_for_position(Vec2::new(-500.0, 60.0));
        assert_eq!(far_left, CellAddress::new(0, 0));

        let far_right = layout.cell_for_position(Vec2::new(5000.0, 60.0));
        assert_eq!(far_right.col, 16);

        let above = layout.cell_for_position(Vec2::new(100.0, 10.0));
        assert_eq!(above.row, -2);
        assert!(!layout.contains(above));

        let below = layout.cell_for_position(Vec2::new(100.0, 50.0 + layout.field_height() + 1.0));
        assert_eq!(below.row, 15);
        assert!(!layout.contains(below));
    }

    #[test]
    fn test_reverse_is_involution() {
        for dir in Direction::ALL {
            assert_ne!(dir.reverse(), dir);
            assert_eq!(dir.reverse().reverse(), dir);
        }
    }

    #[test]
    fn test_neighbors_are_mutual() {
        let mut layout = layout();
        for _ in 0..2 {
            for cell in layout.cells() {
                for (dir, neighbor) in layout.neighbor_coords(cell) {
                    assert_eq!(
                        layout.neighbor(neighbor, dir.reverse()),
                        Some(cell),
                        "{cell} -> {neighbor} via {dir:?}"
                    );
                }
            }
            layout.flip_parity();
        }
    }

    #[test]
    fn test_neighbor_counts() {
        let layout = layout();
        // Corner of a flush-left top row: right and bottom-right only.
        let corner = layout.neighbor_coords(CellAddress::new(0, 0));
        assert_eq!(corner.len(), 2);
        assert_eq!(layout.neighbor_coords(CellAddress::new(5, 5)).len(), 6);
    }

    #[test]
    fn test_neighbors_are_equidistant() {
        let layout = layout();
        let cell = CellAddress::new(4, 7);
        let center = layout.position_for_cell(cell);
        for (_, neighbor) in layout.neighbor_coords(cell) {
            let distance = center.distance(layout.position_for_cell(neighbor));
            assert!((distance - layout.col_width()).abs() < 1e-3);
        }
    }
}
