//! Game state and core simulation types
//!
//! Everything needed to resume a game with identical future behavior lives
//! in [`GameState`]. There is no other mutable simulation state.

use super::grid::{Color, Grid};
use super::input::{MoveInput, MoveInputEvent};
use super::pill::{PillColors, PillLocation};
use super::rng::seed_random_color;
use super::viruses::generate_enemies;
use crate::error::SimError;
use crate::settings::GameOptions;

/// Current phase of the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameMode {
    /// Waiting for the first tick
    Ready,
    /// A pill is falling (or about to spawn) under player control
    Playing,
    /// Pill has landed; look for lines
    Reconcile,
    /// Lines are shown as destroyed before being cleared
    Destruction,
    /// Unsupported debris falls
    Cascade,
    /// Game over (won or lost)
    Ended,
}

impl GameMode {
    pub const ALL: [GameMode; 6] = [
        GameMode::Ready,
        GameMode::Playing,
        GameMode::Reconcile,
        GameMode::Destruction,
        GameMode::Cascade,
        GameMode::Ended,
    ];

    /// Modes reachable from this one. Any live mode may end, since a
    /// remote defeat or forfeit can arrive at any time.
    pub fn allowed_transitions(self) -> &'static [GameMode] {
        use GameMode::*;
        match self {
            Ready => &[Playing, Ended],
            Playing => &[Reconcile, Cascade, Ended],
            Reconcile => &[Destruction, Cascade, Ended],
            Destruction => &[Cascade, Ended],
            Cascade => &[Playing, Reconcile, Ended],
            Ended => &[],
        }
    }

    pub fn can_transition_to(self, next: GameMode) -> bool {
        self.allowed_transitions().contains(&next)
    }
}

/// Final outcome of a game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameResult {
    Win,
    Lose,
}

/// Signal produced by a tick, consumed by the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameTickResult {
    Win,
    Lose,
    /// Combo finished with enough lines to send garbage to the opponent
    Garbage(Vec<Color>),
}

impl From<GameResult> for GameTickResult {
    fn from(result: GameResult) -> Self {
        match result {
            GameResult::Win => GameTickResult::Win,
            GameResult::Lose => GameTickResult::Lose,
        }
    }
}

/// Complete game state (deterministic, serializable)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameState {
    /// Current phase
    pub mode: GameMode,
    pub grid: Grid,
    /// Active pill, if one is falling
    pub pill: Option<PillLocation>,
    /// Colors of the pill spawned next
    pub next_pill: PillColors,
    /// Held keys and their repeat counters, in press order
    pub moving_counters: Vec<(MoveInput, u32)>,
    /// Run seed for reproducibility
    pub seed: String,
    /// Simulation tick counter (never reset)
    pub frame: u64,
    /// Ticks spent in Playing, for the time bonus
    pub game_ticks: u64,
    /// Ticks since entering the current mode
    pub mode_ticks: u32,
    /// Pills spawned so far
    pub pill_count: u32,
    pub score: u64,
    pub time_bonus: u64,
    /// One color per line destroyed in the current combo
    pub line_colors: Vec<Color>,
    /// Consecutive reconciles that found lines
    pub combo: u32,
    /// Lines destroyed in the current combo
    pub combo_lines: u32,
    /// Key events waiting for the next tick
    pub queued_moves: Vec<MoveInputEvent>,
    /// Received garbage waiting to drop before the next pill
    pub pending_garbage: Vec<Color>,
    /// Set once the game has ended
    pub result: Option<GameResult>,
}

impl GameState {
    /// Fresh game: empty field with the level's viruses, first pill chosen
    pub fn new(options: &GameOptions) -> Self {
        Self::with_seed(options, &options.seed, 0)
    }

    /// Fresh game for `seed`, starting at `frame`
    pub fn with_seed(options: &GameOptions, seed: &str, frame: u64) -> Self {
        let empty = Grid::with_playable_size(options.width, options.height);
        let grid = generate_enemies(&empty, options.level, &Color::ALL, &format!("{seed}:viruses"));
        Self {
            mode: GameMode::Ready,
            grid,
            pill: None,
            next_pill: pill_colors_for(seed, 0),
            moving_counters: Vec::new(),
            seed: seed.to_string(),
            frame,
            game_ticks: 0,
            mode_ticks: 0,
            pill_count: 0,
            score: 0,
            time_bonus: 0,
            line_colors: Vec::new(),
            combo: 0,
            combo_lines: 0,
            queued_moves: Vec::new(),
            pending_garbage: Vec::new(),
            result: None,
        }
    }

    /// Move to `next`, resetting the mode tick counter
    pub fn transition(&mut self, next: GameMode) -> Result<(), SimError> {
        if !self.mode.can_transition_to(next) {
            return Err(SimError::IllegalTransition {
                from: self.mode,
                to: next,
            });
        }
        log::debug!("frame {}: {:?} -> {:?}", self.frame, self.mode, next);
        self.mode = next;
        self.mode_ticks = 0;
        Ok(())
    }

    pub fn is_ended(&self) -> bool {
        self.mode == GameMode::Ended
    }
}

/// Colors of the pill with the given spawn index
pub fn pill_colors_for(seed: &str, index: u32) -> PillColors {
    [
        seed_random_color(&format!("{seed}:pill:{index}:0")),
        seed_random_color(&format!("{seed}:pill:{index}:1")),
    ]
}
