//! The gameplay engine for the bubble shooter.
//!
//! This module contains all the gameplay logic including:
//! - Hexagonal grid geometry and neighbor topology
//! - Bubbles, colors and color sources
//! - Projectile physics
//! - The grid store and snapping
//! - Chain and floater detection
//! - The timed pop queue and row injection
//! - The engine facade that ties them together

pub mod bubble;
pub mod cascade;
pub mod cluster;
pub mod config;
pub mod engine;
pub mod grid;
pub mod hex;
pub mod injection;
pub mod projectile;

use bevy::prelude::*;

pub(super) fn plugin(app: &mut App) {
    app.add_plugins(engine::plugin);
}
