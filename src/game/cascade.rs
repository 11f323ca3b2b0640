//! The pop queue - drains matched and floating bubbles one at a time.
//!
//! Matched bubbles stay on the grid until their turn comes, then pop at a
//! fixed cadence. Floater detection waits until the match queue is fully
//! drained, so the chain visibly resolves before anything drops:
//!
//! ```text
//! Idle --enqueue_chain--> Popping --drained--> FloaterPending
//!   ^                        ^                      |
//!   |                        +---- floaters found --+
//!   +-------------------------- none found ---------+
//! ```

use std::{collections::VecDeque, time::Duration};

use tracing::{debug, info};

use super::{
    bubble::Bubble,
    cluster::find_floaters,
    grid::BubbleGrid,
    hex::CellAddress,
};

/// Where the scheduler is in its drain cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeState {
    /// Nothing queued, nothing pending.
    Idle,
    /// Bubbles waiting to pop.
    Popping,
    /// Queue drained; the floater search runs on the next update.
    FloaterPending,
}

/// What one [`PopScheduler::update`] call did.
#[derive(Debug, Default)]
pub struct CascadeStep {
    /// Bubbles removed from the grid this update, with the cell they left.
    pub popped: Vec<(CellAddress, Bubble)>,
    /// Floaters found (and queued) this update.
    pub floaters: Vec<CellAddress>,
    /// Bonus points earned by those floaters.
    pub floater_bonus: u32,
}

/// Timed pop queue with deferred floater detection.
#[derive(Debug, Clone)]
pub struct PopScheduler {
    queue: VecDeque<CellAddress>,
    next_pop_at: Duration,
    interval: Duration,
    pending_floater_check: bool,
    score_floaters: bool,
    floater_bonus: u32,
}

impl PopScheduler {
    pub fn new(interval: Duration, floater_bonus: u32) -> Self {
        Self {
            queue: VecDeque::new(),
            next_pop_at: Duration::ZERO,
            interval,
            pending_floater_check: false,
            score_floaters: false,
            floater_bonus,
        }
    }

    pub fn state(&self) -> CascadeState {
        if !self.queue.is_empty() {
            CascadeState::Popping
        } else if self.pending_floater_check {
            CascadeState::FloaterPending
        } else {
            CascadeState::Idle
        }
    }

    /// Number of bubbles waiting to pop.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Queued cells, front first.
    pub fn queued(&self) -> impl Iterator<Item = CellAddress> + '_ {
        self.queue.iter().copied()
    }

    pub fn is_queued(&self, cell: CellAddress) -> bool {
        self.queue.contains(&cell)
    }

    pub fn next_pop_at(&self) -> Duration {
        self.next_pop_at
    }

    pub fn pending_floater_check(&self) -> bool {
        self.pending_floater_check
    }

    fn push_unique(&mut self, cells: &[CellAddress]) -> usize {
        let mut added = 0;
        for &cell in cells {
            if !self.queue.contains(&cell) {
                self.queue.push_back(cell);
                added += 1;
            }
        }
        added
    }

    /// Queue a matched chain for popping.
    ///
    /// Starts the cadence at `now + interval` unless a drain is already
    /// running, and arms a scoring floater check for when the queue empties.
    pub fn enqueue_chain(&mut self, chain: &[CellAddress], now: Duration) -> usize {
        let was_empty = self.queue.is_empty();
        let added = self.push_unique(chain);
        if was_empty && added > 0 {
            self.next_pop_at = now + self.interval;
        }
        self.pending_floater_check = true;
        self.score_floaters = true;
        added
    }

    /// Pop every bubble whose time has come, then run the floater check if
    /// the queue has drained.
    pub fn update(&mut self, now: Duration, grid: &mut BubbleGrid) -> CascadeStep {
        let mut step = CascadeStep::default();

        while let Some(&cell) = self.queue.front() {
            if now < self.next_pop_at {
                break;
            }
            self.queue.pop_front();
            // Advance from the schedule, not from `now`, to keep a steady beat.
            self.next_pop_at += self.interval;
            if let Some(bubble) = grid.remove_bubble(cell) {
                debug!("Popped {:?} bubble at {}", bubble.color, cell);
                step.popped.push((cell, bubble));
            }
        }

        if self.queue.is_empty() && self.pending_floater_check {
            self.pending_floater_check = false;
            let floaters = find_floaters(grid);

            if self.score_floaters {
                let count = u32::try_from(floaters.len()).unwrap_or(u32::MAX);
                step.floater_bonus = count.saturating_mul(self.floater_bonus);
            }
            self.score_floaters = false;

            if !floaters.is_empty() {
                info!("Found {} floating bubbles to drop", floaters.len());
                self.push_unique(&floaters);
                self.next_pop_at = now + self.interval;
            }
            step.floaters = floaters;
        }

        step
    }

    /// Follow the grid when every row moves down by one.
    pub fn shift_rows_down(&mut self) {
        for cell in &mut self.queue {
            cell.row += 1;
        }
    }

    /// Forget everything queued.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.next_pop_at = Duration::ZERO;
        self.pending_floater_check = false;
        self.score_floaters = false;
    }
}
