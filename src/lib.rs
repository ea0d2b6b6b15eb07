//! Mirror Pills - a falling-pill puzzle core with deterministic mirror play
//!
//! Core modules:
//! - `sim`: Deterministic simulation (grid rules, input repeat, game state machine)
//! - `controller`: Frame pacing, action history and rewind/replay
//! - `codec`: Compact wire encodings for grids, actions and game state
//! - `settings`: Speed presets and game/controller options
//! - `fsm`: Explicit state machine used for controller modes

pub mod codec;
pub mod controller;
pub mod error;
pub mod fsm;
pub mod settings;
pub mod sim;

pub use controller::{ControllerMode, ControllerState, GameController};
pub use error::{DecodeError, SimError};
pub use settings::{ControllerOptions, GameOptions, Settings, SpeedPreset, TickSource};

/// Game configuration constants
pub mod consts {
    /// Simulation rate (ticks per second)
    pub const FRAMES_PER_SECOND: f64 = 60.0;
    /// Milliseconds per simulation tick
    pub const FRAME_MS: f64 = 1000.0 / FRAMES_PER_SECOND;

    /// Default playable grid size (a hidden top row is added on top)
    pub const DEFAULT_GRID_WIDTH: usize = 8;
    pub const DEFAULT_GRID_HEIGHT: usize = 16;

    /// Minimum run of same-colored cells that forms a line
    pub const MIN_LINE_LENGTH: usize = 4;

    /// Speed goes up by one every this many pills
    pub const ACCELERATE_INTERVAL: u32 = 10;

    /// Frames between gravity drops, indexed by speed
    pub const GRAVITY_TABLE: [u32; 81] = [
        69, 67, 65, 63, 61, 59, 57, 55, 53, 51, 49, 47, 45, 43, 41, 39, 37, 35, 33, 31, 29, 27,
        25, 23, 21, 19, 18, 17, 16, 15, 14, 13, 12, 11, 10, 9, 9, 8, 8, 7, 7, 6, 6, 5, 5, 5, 5,
        5, 5, 5, 5, 5, 5, 5, 5, 4, 4, 4, 4, 4, 3, 3, 3, 3, 3, 2, 2, 2, 2, 2, 1, 1, 1, 1, 1, 1,
        1, 1, 1, 1, 0,
    ];

    /// Number of viruses placed at each level
    pub const VIRUS_COUNT_TABLE: [u32; 21] = [
        4, 8, 12, 16, 20, 24, 28, 32, 36, 40, 44, 48, 52, 56, 60, 64, 68, 72, 76, 80, 84,
    ];

    /// Playable rows kept free of viruses at each level (counted from the top)
    pub const MIN_VIRUS_ROW_TABLE: [usize; 21] =
        [6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 5, 5, 4, 4, 3, 3];

    /// Ticks spent showing destroyed cells before they are cleared
    pub const DESTRUCTION_TICKS: u32 = 20;
    /// Ticks between debris drops while cascading
    pub const CASCADE_TICKS: u32 = 15;

    /// Points per destroyed cell (raised to the combo power)
    pub const POINTS_PER_CELL: u64 = 5;
    /// Extra multiplier applied to destroyed viruses
    pub const VIRUS_POINT_MULTIPLIER: u64 = 3;

    /// Expected ticks per virus used for the time bonus
    pub const BONUS_TICKS_PER_VIRUS: u64 = 320;
    /// Virus count below which each missing virus adds bonus ticks
    pub const BONUS_VIRUS_THRESHOLD: u64 = 40;
    /// Bonus ticks per virus below the threshold
    pub const BONUS_TICKS_PER_MISSING_VIRUS: u64 = 3;

    /// Most garbage cells sent for one combo
    pub const MAX_GARBAGE: usize = 4;
    /// Lines needed in one combo before garbage is sent
    pub const MIN_GARBAGE_LINES: u32 = 2;
}
