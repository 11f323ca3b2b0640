//! The engine facade - one resource that owns a whole game session.
//!
//! Hosts drive it with three commands (`fire_bubble`, `tick`, `restart`),
//! read its state through queries, and learn what happened from the
//! [`EngineEvent`]s it buffers. Inside Bevy the [`plugin`] wires those to
//! messages and the frame clock.

use std::{mem, time::Duration};

use bevy::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{
    bubble::{Bubble, BubbleColor, ColorSource, RandomColors},
    cascade::{CascadeState, PopScheduler},
    cluster::{MIN_CHAIN_SIZE, chain_score, connected_same_color},
    config::EngineConfig,
    grid::BubbleGrid,
    hex::CellAddress,
    injection::InjectionPolicy,
    projectile::{self, Flight},
};
use crate::audio::{AudioCue, AudioSink, Silent};

pub(super) fn plugin(app: &mut App) {
    app.add_message::<FireBubble>();
    app.add_message::<RestartGame>();
    app.add_message::<EngineEvent>();

    // Hosts (and tests) may insert their own engine before the plugin.
    if !app.world().contains_resource::<BubbleEngine>() {
        app.insert_resource(BubbleEngine::new(EngineConfig::load()));
    }

    app.add_systems(
        Update,
        (handle_restart, handle_fire, tick_engine, publish_events)
            .chain()
            .in_set(EngineSystems),
    );
}

/// Why a game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GameOverCause {
    #[error("landed bubble has no valid cell to snap into")]
    OutOfBoundsSnap,
    #[error("no room left to push a new row in")]
    GridOverflow,
}

/// Something that happened inside the engine, for the presentation layer.
#[derive(Message, Debug, Clone, PartialEq)]
pub enum EngineEvent {
    BubbleFired {
        color: BubbleColor,
        velocity: Vec2,
    },
    BubbleLanded {
        cell: CellAddress,
        color: BubbleColor,
    },
    /// A chain was matched and queued for popping.
    ChainMatched {
        cells: Vec<CellAddress>,
        points: u32,
    },
    BubblePopped {
        cell: CellAddress,
        color: BubbleColor,
    },
    /// Bubbles cut off from the ceiling, queued to drop.
    FloatersDetached {
        cells: Vec<CellAddress>,
        bonus: u32,
    },
    /// A shot stuck without completing a chain.
    ShotAbsorbedNoMatch {
        chain_len: usize,
    },
    RowInjected {
        next_threshold: u32,
    },
    GameOver {
        cause: GameOverCause,
        score: u32,
    },
}

/// Message asking the engine to fire toward a point on the playfield.
#[derive(Message, Debug, Clone)]
pub struct FireBubble {
    pub target: Vec2,
}

/// Message asking the engine to start a new game.
#[derive(Message, Debug, Clone, Default)]
pub struct RestartGame;

/// System set for the engine systems.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct EngineSystems;

/// The bubble at the launcher.
#[derive(Debug, Clone, PartialEq)]
pub enum Shooter {
    /// Waiting to be fired.
    Loaded(Bubble),
    /// Fired and still travelling.
    InFlight(Bubble),
    /// Slot empty; refilled on the next tick unless the game is over.
    Reloading,
}

#[derive(Resource)]
pub struct BubbleEngine {
    config: EngineConfig,
    grid: BubbleGrid,
    cascade: PopScheduler,
    injection: InjectionPolicy,
    score: u32,
    shooter: Shooter,
    next_color: BubbleColor,
    game_over: Option<GameOverCause>,
    events: Vec<EngineEvent>,
    colors: Box<dyn ColorSource>,
    audio: Box<dyn AudioSink>,
}

impl BubbleEngine {
    /// A fresh game with random colors and no sound.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_collaborators(
            config,
            Box::new(RandomColors::from_os_rng()),
            Box::new(Silent),
        )
    }

    /// A fresh game using the given color source and audio sink.
    pub fn with_collaborators(
        config: EngineConfig,
        colors: Box<dyn ColorSource>,
        audio: Box<dyn AudioSink>,
    ) -> Self {
        let mut engine = Self {
            grid: BubbleGrid::new(config.layout()),
            cascade: PopScheduler::new(config.pop_interval(), config.floater_bonus),
            injection: InjectionPolicy::new(config.max_shot_threshold, config.min_shot_threshold),
            score: 0,
            shooter: Shooter::Reloading,
            next_color: BubbleColor::default(),
            game_over: None,
            events: Vec::new(),
            colors,
            audio,
            config,
        };
        engine.restart();
        engine
    }

    /// Throw the current game away and start over.
    pub fn restart(&mut self) {
        self.grid.clear();
        let placed = self
            .grid
            .populate_rows(self.config.starting_rows, self.colors.as_mut());
        self.cascade.clear();
        self.injection.reset();
        self.score = 0;
        self.game_over = None;
        self.events.clear();
        self.next_color = self.colors.next_color();
        self.load_shooter();
        info!("New game started with {} bubbles", placed);
    }

    fn load_shooter(&mut self) {
        let color = mem::replace(&mut self.next_color, self.colors.next_color());
        let position = self.grid.layout().shooter_position();
        self.shooter = Shooter::Loaded(Bubble::new(color, position));
    }

    /// Launch the loaded bubble toward `target`.
    ///
    /// Refused (returning false) after game over, while a shot is already
    /// in flight, or when `target` lies outside the playfield.
    pub fn fire_bubble(&mut self, target: Vec2) -> bool {
        if self.game_over.is_some() {
            return false;
        }
        if !self.grid.layout().playfield_contains(target) {
            debug!("Ignoring fire request outside the playfield: {:?}", target);
            return false;
        }

        let mut bubble = match mem::replace(&mut self.shooter, Shooter::Reloading) {
            Shooter::Loaded(bubble) => bubble,
            other => {
                self.shooter = other;
                return false;
            }
        };

        let velocity =
            projectile::compute_velocity(bubble.position, target, self.config.projectile_speed);
        if velocity == Vec2::ZERO {
            self.shooter = Shooter::Loaded(bubble);
            return false;
        }

        bubble.velocity = velocity;
        self.audio.play(AudioCue::Launch);
        self.events.push(EngineEvent::BubbleFired {
            color: bubble.color,
            velocity,
        });
        self.shooter = Shooter::InFlight(bubble);
        true
    }

    /// Advance one frame: move the projectile, pop what is due, reload.
    ///
    /// `dt` is the frame time in seconds, `now` the game clock.
    pub fn tick(&mut self, dt: f32, now: Duration) {
        if self.game_over.is_some() {
            return;
        }

        self.advance_projectile(dt, now);
        if self.game_over.is_some() {
            return;
        }

        self.drain_pops(now);

        if matches!(self.shooter, Shooter::Reloading) {
            self.load_shooter();
        }
    }

    fn advance_projectile(&mut self, dt: f32, now: Duration) {
        let Shooter::InFlight(bubble) = &mut self.shooter else {
            return;
        };
        match projectile::advance(bubble, dt, &self.grid) {
            Flight::Flying => {}
            // A stopped projectile counts as landed wherever it rests.
            Flight::Resting | Flight::Landed { .. } => {
                if let Shooter::InFlight(bubble) = mem::replace(&mut self.shooter, Shooter::Reloading)
                {
                    self.land(bubble, now);
                }
            }
        }
    }

    /// Snap a stopped projectile and resolve the shot.
    fn land(&mut self, bubble: Bubble, now: Duration) {
        let color = bubble.color;
        let Some(cell) = self.grid.snap_to_grid(bubble) else {
            self.end_game(GameOverCause::OutOfBoundsSnap);
            return;
        };

        debug!("{:?} bubble landed at {}", color, cell);
        self.events.push(EngineEvent::BubbleLanded { cell, color });

        let chain = connected_same_color(&self.grid, cell);
        self.destroy_bubbles(&chain, now);
    }

    /// Resolve the chain formed by a landed bubble.
    ///
    /// A full chain scores and is queued for popping. Anything shorter is
    /// a non-clearing shot. Returns false only if that shot ended the game.
    pub fn destroy_bubbles(&mut self, chain: &[CellAddress], now: Duration) -> bool {
        if chain.len() < MIN_CHAIN_SIZE {
            self.audio.play(AudioCue::Plop);
            self.events.push(EngineEvent::ShotAbsorbedNoMatch {
                chain_len: chain.len(),
            });
            return self.register_non_clearing_shot();
        }

        let points = chain_score(chain.len());
        self.score = self.score.saturating_add(points);
        self.cascade.enqueue_chain(chain, now);
        info!(
            "Chain of {} matched, +{} points (total: {})",
            chain.len(),
            points,
            self.score
        );
        self.events.push(EngineEvent::ChainMatched {
            cells: chain.to_vec(),
            points,
        });
        true
    }

    /// Count a shot that cleared nothing, injecting a row when one is due.
    ///
    /// Returns false when the injection had no room, which ends the game.
    pub fn register_non_clearing_shot(&mut self) -> bool {
        if !self.injection.register_shot() {
            return true;
        }

        match self.grid.inject_row(self.colors.as_mut()) {
            Ok(()) => {
                self.cascade.shift_rows_down();
                self.injection.row_injected();
                info!(
                    "Row injected, next one after {} misses",
                    self.injection.threshold()
                );
                self.events.push(EngineEvent::RowInjected {
                    next_threshold: self.injection.threshold(),
                });
                true
            }
            Err(cause) => {
                self.end_game(cause);
                false
            }
        }
    }

    fn drain_pops(&mut self, now: Duration) {
        let step = self.cascade.update(now, &mut self.grid);

        for (cell, bubble) in step.popped {
            self.audio.play(AudioCue::Pop);
            self.events.push(EngineEvent::BubblePopped {
                cell,
                color: bubble.color,
            });
        }

        if !step.floaters.is_empty() {
            self.score = self.score.saturating_add(step.floater_bonus);
            self.events.push(EngineEvent::FloatersDetached {
                cells: step.floaters,
                bonus: step.floater_bonus,
            });
        }
    }

    fn end_game(&mut self, cause: GameOverCause) {
        if self.game_over.is_some() {
            return;
        }
        warn!("Game over: {} (final score: {})", cause, self.score);
        self.game_over = Some(cause);
        self.events.push(EngineEvent::GameOver {
            cause,
            score: self.score,
        });
    }

    pub fn grid(&self) -> &BubbleGrid {
        &self.grid
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    /// Misses left before the next row comes in.
    pub fn shots_remaining(&self) -> u32 {
        self.injection.shots_remaining()
    }

    pub fn shooter(&self) -> &Shooter {
        &self.shooter
    }

    /// The bubble in flight, if any.
    pub fn projectile(&self) -> Option<&Bubble> {
        match &self.shooter {
            Shooter::InFlight(bubble) => Some(bubble),
            _ => None,
        }
    }

    /// The bubble waiting at the launcher, if any.
    pub fn loaded_bubble(&self) -> Option<&Bubble> {
        match &self.shooter {
            Shooter::Loaded(bubble) => Some(bubble),
            _ => None,
        }
    }

    /// Color of the bubble loaded after the current one.
    pub fn next_color(&self) -> BubbleColor {
        self.next_color
    }

    pub fn preview_position(&self) -> Vec2 {
        self.grid.layout().preview_position()
    }

    pub fn shooter_position(&self) -> Vec2 {
        self.grid.layout().shooter_position()
    }

    pub fn cascade_state(&self) -> CascadeState {
        self.cascade.state()
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over.is_some()
    }

    pub fn game_over_cause(&self) -> Option<GameOverCause> {
        self.game_over
    }

    /// Events not yet drained, oldest first.
    pub fn events(&self) -> &[EngineEvent] {
        &self.events
    }

    /// Take every buffered event.
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        mem::take(&mut self.events)
    }
}

fn handle_restart(mut requests: MessageReader<RestartGame>, mut engine: ResMut<BubbleEngine>) {
    if requests.read().count() > 0 {
        engine.restart();
    }
}

fn handle_fire(mut requests: MessageReader<FireBubble>, mut engine: ResMut<BubbleEngine>) {
    for request in requests.read() {
        if !engine.fire_bubble(request.target) {
            debug!("Fire request toward {:?} rejected", request.target);
        }
    }
}

fn tick_engine(time: Res<Time>, mut engine: ResMut<BubbleEngine>) {
    engine.tick(time.delta_secs(), time.elapsed());
}

fn publish_events(mut engine: ResMut<BubbleEngine>, mut events: MessageWriter<EngineEvent>) {
    if engine.events().is_empty() {
        return;
    }
    events.write_batch(engine.drain_events());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::CueLog,
        game::bubble::{BubbleColor::*, ColorCycle},
    };

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    fn engine(colors: &[BubbleColor]) -> (BubbleEngine, CueLog) {
        let log = CueLog::default();
        let config = EngineConfig {
            starting_rows: 0,
            ..EngineConfig::default()
        };
        let engine = BubbleEngine::with_collaborators(
            config,
            Box::new(ColorCycle::new(colors.iter().copied())),
            Box::new(log.clone()),
        );
        (engine, log)
    }

    fn place(engine: &mut BubbleEngine, cells: &[((i32, i32), BubbleColor)]) {
        for &((row, col), color) in cells {
            assert!(
                engine
                    .grid
                    .place_bubble(Bubble::new(color, Vec2::ZERO), CellAddress::new(row, col))
            );
        }
    }

    fn count_events(engine: &BubbleEngine, f: impl Fn(&EngineEvent) -> bool) -> usize {
        engine.events().iter().filter(|e| f(e)).count()
    }

    #[test]
    fn test_new_game_layout() {
        let log = CueLog::default();
        let engine = BubbleEngine::with_collaborators(
            EngineConfig::default(),
            Box::new(ColorCycle::new([Red, Blue])),
            Box::new(log),
        );
        assert_eq!(engine.grid().len(), 11 * 17);
        assert!(engine.grid().links_consistent());
        assert_eq!(engine.shots_remaining(), 6);
        assert_eq!(engine.score(), 0);
        assert!(engine.loaded_bubble().is_some());
        assert!(engine.projectile().is_none());
        assert_eq!(engine.cascade_state(), CascadeState::Idle);
        assert_eq!(engine.preview_position().y, engine.shooter_position().y);
    }

    #[test]
    fn test_chain_of_three_scores_and_pops_on_schedule() {
        let (mut engine, log) = engine(&[Blue]);
        place(&mut engine, &[((0, 0), Red), ((0, 1), Red), ((0, 2), Red)]);

        let chain = connected_same_color(engine.grid(), CellAddress::new(0, 0));
        assert!(engine.destroy_bubbles(&chain, ms(0)));
        assert_eq!(engine.score(), 30);
        assert_eq!(engine.cascade.len(), 3);
        assert_eq!(engine.grid().len(), 3);
        assert_eq!(engine.cascade_state(), CascadeState::Popping);

        engine.tick(0.0, ms(179));
        assert_eq!(engine.grid().len(), 1);

        engine.tick(0.0, ms(180));
        assert!(engine.grid().is_empty());
        assert_eq!(log.count(AudioCue::Pop), 3);
        assert_eq!(
            count_events(&engine, |e| matches!(e, EngineEvent::BubblePopped { .. })),
            3
        );
        assert_eq!(engine.cascade_state(), CascadeState::Idle);
        assert_eq!(engine.score(), 30);
    }

    #[test]
    fn test_chain_of_two_is_absorbed() {
        let (mut engine, log) = engine(&[Blue]);
        place(&mut engine, &[((0, 0), Red), ((0, 1), Red)]);
        let before = engine.grid().clone();

        let chain = connected_same_color(engine.grid(), CellAddress::new(0, 1));
        assert_eq!(chain.len(), 2);
        assert!(engine.destroy_bubbles(&chain, ms(0)));

        assert_eq!(engine.grid(), &before);
        assert_eq!(engine.score(), 0);
        assert_eq!(engine.shots_remaining(), 5);
        assert_eq!(log.cues(), vec![AudioCue::Plop]);
        assert_eq!(
            engine.events(),
            &[EngineEvent::ShotAbsorbedNoMatch { chain_len: 2 }]
        );
    }

    #[test]
    fn test_chain_of_five_scores_ninety() {
        let (mut engine, _) = engine(&[Blue]);
        let reds: Vec<_> = (0..5).map(|col| ((0, col), Red)).collect();
        place(&mut engine, &reds);

        let chain = connected_same_color(engine.grid(), CellAddress::new(0, 4));
        engine.destroy_bubbles(&chain, ms(0));
        assert_eq!(engine.score(), 90);
    }

    #[test]
    fn test_sixth_miss_injects_one_row() {
        let (mut engine, _) = engine(&[Blue]);
        for _ in 0..5 {
            assert!(engine.register_non_clearing_shot());
        }
        assert!(engine.grid().is_empty());
        assert_eq!(engine.shots_remaining(), 1);

        assert!(engine.register_non_clearing_shot());
        assert_eq!(engine.grid().len(), 17);
        assert!(engine.grid().layout().parity_flipped());
        assert_eq!(engine.injection.threshold(), 5);
        assert_eq!(engine.shots_remaining(), 5);
        assert_eq!(
            engine.events(),
            &[EngineEvent::RowInjected { next_threshold: 5 }]
        );
    }

    #[test]
    fn test_threshold_wraps_back_to_max() {
        let (mut engine, _) = engine(&[Blue]);
        // 6 + 5 + 4 + 3 + 2 misses make five injections.
        for _ in 0..20 {
            assert!(engine.register_non_clearing_shot());
        }
        assert_eq!(engine.grid().len(), 5 * 17);
        assert_eq!(engine.injection.threshold(), 6);
        assert!(engine.grid().links_consistent());
    }

    #[test]
    fn test_overflow_ends_game_and_keeps_grid() {
        let (mut engine, _) = engine(&[Blue]);
        place(&mut engine, &[((14, 3), Green)]);
        let before = engine.grid().clone();

        for _ in 0..5 {
            assert!(engine.register_non_clearing_shot());
        }
        assert!(!engine.register_non_clearing_shot());

        assert_eq!(engine.grid(), &before);
        assert!(engine.is_game_over());
        assert_eq!(engine.game_over_cause(), Some(GameOverCause::GridOverflow));
        assert!(engine.events().contains(&EngineEvent::GameOver {
            cause: GameOverCause::GridOverflow,
            score: 0,
        }));
        assert!(!engine.fire_bubble(Vec2::new(200.0, 200.0)));
    }

    #[test]
    fn test_injection_moves_queued_pops_with_their_bubbles() {
        let (mut engine, _) = engine(&[Blue]);
        place(&mut engine, &[((0, 0), Red), ((0, 1), Red), ((0, 2), Red)]);
        let chain = connected_same_color(engine.grid(), CellAddress::new(0, 0));
        engine.destroy_bubbles(&chain, ms(0));

        for _ in 0..6 {
            engine.register_non_clearing_shot();
        }
        assert!(engine.cascade.is_queued(CellAddress::new(1, 0)));

        engine.tick(0.0, ms(180));
        // The three reds are gone, the injected blue row stays.
        assert_eq!(engine.grid().len(), 17);
        assert!(engine.grid().iter().all(|bubble| bubble.color == Blue));
    }

    #[test]
    fn test_floaters_drop_after_chain_and_score_bonus() {
        let (mut engine, _) = engine(&[Yellow]);
        place(
            &mut engine,
            &[
                ((0, 0), Blue),
                ((1, 0), Red),
                ((1, 1), Red),
                ((2, 0), Red),
                ((2, 2), Green),
            ],
        );

        let chain = connected_same_color(engine.grid(), CellAddress::new(2, 0));
        assert_eq!(chain.len(), 3);
        engine.destroy_bubbles(&chain, ms(0));

        engine.tick(0.0, ms(120));
        assert!(engine.grid().is_occupied(CellAddress::new(2, 2)));
        assert_eq!(
            count_events(&engine, |e| matches!(e, EngineEvent::FloatersDetached { .. })),
            0
        );

        engine.tick(0.0, ms(180));
        assert_eq!(engine.score(), 130);
        assert!(engine.events().contains(&EngineEvent::FloatersDetached {
            cells: vec![CellAddress::new(2, 2)],
            bonus: 100,
        }));
        assert!(engine.grid().is_occupied(CellAddress::new(2, 2)));

        engine.tick(0.0, ms(240));
        assert_eq!(engine.grid().len(), 1);
        assert!(engine.grid().is_occupied(CellAddress::new(0, 0)));
        assert_eq!(engine.score(), 130);
    }

    #[test]
    fn test_shot_travels_to_ceiling_and_reloads() {
        let (mut engine, log) = engine(&[Red, Green, Blue]);
        assert_eq!(engine.loaded_bubble().map(|b| b.color), Some(Red));
        assert_eq!(engine.next_color(), Green);

        let shooter = engine.shooter_position();
        assert!(engine.fire_bubble(Vec2::new(shooter.x, 100.0)));
        assert!(engine.projectile().is_some());
        assert!(!engine.fire_bubble(Vec2::new(shooter.x, 100.0)));

        let mut now = Duration::ZERO;
        for _ in 0..200 {
            if engine.projectile().is_none() {
                break;
            }
            now += ms(20);
            engine.tick(0.02, now);
        }

        let landed = CellAddress::new(0, 8);
        assert_eq!(engine.grid().get(landed).map(|b| b.color), Some(Red));
        assert_eq!(engine.loaded_bubble().map(|b| b.color), Some(Green));
        assert_eq!(engine.next_color(), Blue);
        assert_eq!(log.cues(), vec![AudioCue::Launch, AudioCue::Plop]);

        let events = engine.drain_events();
        assert!(matches!(events[0], EngineEvent::BubbleFired { color: Red, .. }));
        assert_eq!(
            events[1..],
            [
                EngineEvent::BubbleLanded {
                    cell: landed,
                    color: Red
                },
                EngineEvent::ShotAbsorbedNoMatch { chain_len: 1 },
            ]
        );
        assert!(engine.events().is_empty());
    }

    #[test]
    fn test_landing_below_grid_is_game_over() {
        let (mut engine, _) = engine(&[Blue]);
        engine.shooter = Shooter::InFlight(Bubble::new(Red, Vec2::new(200.0, 540.0)));

        engine.tick(0.016, ms(16));
        assert_eq!(
            engine.game_over_cause(),
            Some(GameOverCause::OutOfBoundsSnap)
        );
        assert!(matches!(engine.shooter(), Shooter::Reloading));

        // Ticking stops once the game is over.
        engine.tick(0.016, ms(32));
        assert!(matches!(engine.shooter(), Shooter::Reloading));

        engine.restart();
        assert!(!engine.is_game_over());
        assert!(engine.loaded_bubble().is_some());
        assert!(engine.events().is_empty());
    }

    #[test]
    fn test_fire_rejects_targets_outside_playfield() {
        let (mut engine, log) = engine(&[Blue]);
        assert!(!engine.fire_bubble(Vec2::new(10.0, 10.0)));
        let below = engine.shooter_position() + Vec2::new(0.0, 10.0);
        assert!(!engine.fire_bubble(below));
        assert!(engine.loaded_bubble().is_some());
        assert!(log.cues().is_empty());
    }

    #[test]
    fn test_plugin_routes_fire_requests() {
        let (engine, _) = engine(&[Red]);
        let target = Vec2::new(engine.shooter_position().x, 100.0);

        let mut app = App::new();
        app.init_resource::<Time>();
        app.insert_resource(engine);
        app.add_plugins(crate::HexPopPlugin);

        app.world_mut().write_message(FireBubble { target });
        app.update();

        let engine = app.world().resource::<BubbleEngine>();
        assert!(engine.projectile().is_some());
        // Buffered events were handed to the message queue.
        assert!(engine.events().is_empty());

        app.world_mut().write_message(RestartGame);
        app.update();
        let engine = app.world().resource::<BubbleEngine>();
        assert!(engine.projectile().is_none());
        assert!(engine.loaded_bubble().is_some());
    }
}
