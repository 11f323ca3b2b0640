//! Bubbles - the colored pieces that fly across the field and sit on the grid.
//!
//! A bubble is either in flight (no cell, no links) or placed (cell assigned,
//! links to every occupied neighbor). Links are cell addresses into the grid
//! arena rather than references, so the neighbor graph never owns anything.

use bevy::prelude::*;
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use super::hex::{CellAddress, Direction};

/// The bubble palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum BubbleColor {
    #[default]
    Red,
    Green,
    Blue,
    Yellow,
    Magenta,
    Cyan,
}

impl BubbleColor {
    /// Get all possible bubble colors.
    pub const ALL: [BubbleColor; 6] = [
        BubbleColor::Red,
        BubbleColor::Green,
        BubbleColor::Blue,
        BubbleColor::Yellow,
        BubbleColor::Magenta,
        BubbleColor::Cyan,
    ];

    /// sRGB triple for rendering.
    pub const fn rgb(self) -> [u8; 3] {
        match self {
            BubbleColor::Red => [255, 0, 0],
            BubbleColor::Green => [0, 255, 0],
            BubbleColor::Blue => [0, 0, 255],
            BubbleColor::Yellow => [255, 255, 0],
            BubbleColor::Magenta => [255, 0, 255],
            BubbleColor::Cyan => [0, 255, 255],
        }
    }
}

/// Links from a placed bubble to its occupied neighbors, one slot per
/// [`Direction`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Neighbors([Option<CellAddress>; 6]);

impl Neighbors {
    pub fn get(&self, dir: Direction) -> Option<CellAddress> {
        self.0[dir.index()]
    }

    pub fn set(&mut self, dir: Direction, cell: Option<CellAddress>) {
        self.0[dir.index()] = cell;
    }

    pub fn clear(&mut self) {
        self.0 = [None; 6];
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Option::is_none)
    }

    /// Linked neighbors with their directions.
    pub fn iter(&self) -> impl Iterator<Item = (Direction, CellAddress)> + '_ {
        Direction::ALL
            .into_iter()
            .filter_map(move |dir| self.get(dir).map(|cell| (dir, cell)))
    }
}

/// A single bubble, in flight or placed.
#[derive(Debug, Clone, PartialEq)]
pub struct Bubble {
    pub color: BubbleColor,
    /// Center in screen space.
    pub position: Vec2,
    /// Pixels per second; zero when at rest.
    pub velocity: Vec2,
    /// The cell the projectile collided with on its last step, consumed by
    /// the snap.
    pub last_hit_cell: Option<CellAddress>,
    pub(crate) cell: Option<CellAddress>,
    pub(crate) neighbors: Neighbors,
}

impl Bubble {
    /// A new free bubble at rest.
    pub fn new(color: BubbleColor, position: Vec2) -> Self {
        Self {
            color,
            position,
            velocity: Vec2::ZERO,
            last_hit_cell: None,
            cell: None,
            neighbors: Neighbors::default(),
        }
    }

    /// The grid cell this bubble occupies, `None` while in flight.
    pub fn cell(&self) -> Option<CellAddress> {
        self.cell
    }

    pub fn neighbors(&self) -> &Neighbors {
        &self.neighbors
    }

    pub fn neighbor(&self, dir: Direction) -> Option<CellAddress> {
        self.neighbors.get(dir)
    }

    pub fn is_placed(&self) -> bool {
        self.cell.is_some()
    }

    pub fn is_moving(&self) -> bool {
        self.velocity != Vec2::ZERO
    }
}

/// Where new bubble colors come from.
///
/// The engine never reaches for a global RNG; hosts inject a source so
/// replays and tests are deterministic.
pub trait ColorSource: Send + Sync {
    fn next_color(&mut self) -> BubbleColor;
}

/// Uniformly random colors from a seedable generator.
#[derive(Debug, Clone)]
pub struct RandomColors {
    rng: StdRng,
}

impl RandomColors {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Seeded from the operating system.
    pub fn from_os_rng() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }
}

impl Default for RandomColors {
    fn default() -> Self {
        Self::from_os_rng()
    }
}

impl ColorSource for RandomColors {
    fn next_color(&mut self) -> BubbleColor {
        BubbleColor::ALL[self.rng.random_range(0..BubbleColor::ALL.len())]
    }
}

/// Repeats a fixed sequence of colors forever.
#[derive(Debug, Clone)]
pub struct ColorCycle {
    colors: Vec<BubbleColor>,
    cursor: usize,
}

impl ColorCycle {
    /// An empty sequence falls back to the whole palette.
    pub fn new(colors: impl IntoIterator<Item = BubbleColor>) -> Self {
        let mut colors: Vec<BubbleColor> = colors.into_iter().collect();
        if colors.is_empty() {
            colors = BubbleColor::ALL.to_vec();
        }
        Self { colors, cursor: 0 }
    }
}

impl ColorSource for ColorCycle {
    fn next_color(&mut self) -> BubbleColor {
        let color = self.colors[self.cursor % self.colors.len()];
        self.cursor = (self.cursor + 1) % self.colors.len();
        color
    }
}
