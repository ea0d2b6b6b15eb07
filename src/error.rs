//! Error types
//!
//! Gameplay outcomes (blocked spawns, failed moves, wins and losses) are plain
//! values; these errors only cover malformed wire data and caller bugs.

use thiserror::Error;

use crate::sim::GameMode;

/// Failure to decode a wire string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unexpected end of input while reading {what}")]
    UnexpectedEnd { what: &'static str },
    #[error("invalid {what} character {found:?} at position {pos}")]
    InvalidChar {
        what: &'static str,
        found: char,
        pos: usize,
    },
    #[error("invalid base-36 number {0:?}")]
    InvalidNumber(String),
    #[error("malformed grid header {0:?}")]
    GridHeader(String),
    #[error("grid expected {expected} cells, found {found}")]
    GridSize { expected: usize, found: usize },
    #[error("unknown action prefix {0:?}")]
    UnknownAction(char),
    #[error("malformed {what}: {reason}")]
    Malformed { what: &'static str, reason: String },
    #[error("invalid json: {0}")]
    Json(String),
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError::Json(err.to_string())
    }
}

/// Illegal request made of a simulation or controller
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    #[error("cannot tick to frame {requested}, simulation is already at frame {current}")]
    FrameInPast { requested: u64, current: u64 },
    #[error("cannot rewrite past frame {frame}: history is disabled")]
    HistoryDisabled { frame: u64 },
    #[error("illegal mode transition {from:?} -> {to:?}")]
    IllegalTransition { from: GameMode, to: GameMode },
}
