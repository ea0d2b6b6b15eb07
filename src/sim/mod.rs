//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - One fixed tick per frame
//! - Seeded, string-keyed RNG only
//! - Grids are immutable values; every rule returns a new grid
//! - No rendering, transport or clock dependencies

pub mod action;
pub mod grid;
pub mod input;
pub mod lines;
pub mod pill;
pub mod rng;
pub mod state;
pub mod tick;
pub mod viruses;

pub use action::{Action, TimedActions};
pub use grid::{Cell, CellLocation, Color, Direction, Grid, Neighbors, get_cell_neighbors};
pub use input::{InputEventType, InputRepeater, MoveInput, MoveInputEvent};
pub use lines::{
    DestroyLinesResult, DropResult, clear_top_row, destroy_lines, drop_debris, find_lines,
    find_lines_in, find_widows, remove_destroyed,
};
pub use pill::{
    GivePillResult, MovePillResult, MoveResult, PillColors, PillLocation, Rotation, give_pill,
    move_cell, move_cells, move_pill, rotate_pill, slam_pill,
};
pub use rng::{seed_random, seed_random_color, seed_random_int};
pub use state::{GameMode, GameResult, GameState, GameTickResult};
pub use tick::{Game, gravity_interval};
pub use viruses::{generate_enemies, place_garbage};
