//! Projectile - the bubble being shot.
//!
//! The projectile travels in a straight line, bouncing off the side walls,
//! until it touches a placed bubble or reaches the ceiling. Collision is only
//! tested against the cell under the projectile and that cell's neighbors,
//! so a step costs the same no matter how full the grid is.

use bevy::prelude::*;

use super::{bubble::Bubble, grid::BubbleGrid, hex::CellAddress};

/// Outcome of advancing a projectile by one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flight {
    /// Not moving; nothing happened.
    Resting,
    /// Still travelling.
    Flying,
    /// Stopped this step, either against a bubble (`hit` is its cell) or at
    /// the ceiling (`hit` is `None`).
    Landed { hit: Option<CellAddress> },
}

/// Center distance at which a projectile counts as touching a placed bubble.
///
/// Slightly tighter than two radii so bubbles can brush past each other.
pub fn collision_distance(radius: f32) -> f32 {
    2.0 * (radius - 2.0)
}

/// Velocity that carries a bubble from `start` toward `target` at `speed`.
pub fn compute_velocity(start: Vec2, target: Vec2, speed: f32) -> Vec2 {
    (target - start).normalize_or_zero() * speed
}

/// Move the projectile by `velocity * dt` and resolve what it ran into.
pub fn advance(bubble: &mut Bubble, dt: f32, grid: &BubbleGrid) -> Flight {
    if !bubble.is_moving() {
        return Flight::Resting;
    }

    let layout = grid.layout();
    let radius = layout.radius();
    let step = bubble.velocity * dt;
    bubble.position += step;

    if let Some(hit) = find_collision(bubble.position, grid) {
        // Back off so the snap sees the bubble where it touched, not overlapping.
        bubble.position -= step;
        bubble.velocity = Vec2::ZERO;
        bubble.last_hit_cell = Some(hit);
        return Flight::Landed { hit: Some(hit) };
    }

    // Side walls bounce
    let left_wall = layout.left_offset();
    let right_wall = left_wall + layout.field_draw_width();
    if bubble.position.x - radius <= left_wall {
        bubble.position.x = left_wall + radius;
        bubble.velocity.x = bubble.velocity.x.abs();
    } else if bubble.position.x + radius >= right_wall {
        bubble.position.x = right_wall - radius;
        bubble.velocity.x = -bubble.velocity.x.abs();
    }

    // Ceiling stops
    if bubble.position.y - radius <= layout.top_offset() {
        bubble.position.y = layout.top_offset() + radius;
        bubble.velocity = Vec2::ZERO;
        bubble.last_hit_cell = None;
        return Flight::Landed { hit: None };
    }

    Flight::Flying
}

/// The closest placed bubble within collision distance of `position`,
/// searching only the local cell and its neighbors.
pub fn find_collision(position: Vec2, grid: &BubbleGrid) -> Option<CellAddress> {
    let layout = grid.layout();
    let reach_sq = collision_distance(layout.radius()).powi(2);
    let center = layout.cell_for_position(position);

    std::iter::once(center)
        .chain(layout.neighbor_coords(center).into_iter().map(|(_, cell)| cell))
        .filter_map(|cell| {
            grid.get(cell)
                .map(|other| (cell, other.position.distance_squared(position)))
        })
        .filter(|(_, distance_sq)| *distance_sq <= reach_sq)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(cell, _)| cell)
}
