//! Hexpop - the engine of a hexagonal bubble shooter.
//!
//! Players fire colored bubbles into a packed hex grid. Chains of three or
//! more matching bubbles pop, groups cut off from the ceiling drop, and a
//! new row pushes in after too many misses. The game ends when the grid
//! overflows.
//!
//! Rendering, input and sound playback belong to the host. The engine is a
//! plain struct ([`BubbleEngine`]) usable on its own, and [`HexPopPlugin`]
//! mounts it into a Bevy app.

pub mod audio;
pub mod game;

use bevy::prelude::*;

pub use audio::{AudioCue, AudioSink, CueLog, Silent};
pub use game::{
    bubble::{Bubble, BubbleColor, ColorCycle, ColorSource, RandomColors},
    cascade::CascadeState,
    config::{ConfigError, EngineConfig},
    engine::{
        BubbleEngine, EngineEvent, EngineSystems, FireBubble, GameOverCause, RestartGame, Shooter,
    },
    grid::BubbleGrid,
    hex::{CellAddress, Direction, HexLayout},
};

/// Registers the [`BubbleEngine`] resource, its messages and systems.
pub struct HexPopPlugin;

impl Plugin for HexPopPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(game::plugin);
    }
}
