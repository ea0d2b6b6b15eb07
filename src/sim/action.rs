//! Actions applied to a game at a given frame

use super::grid::Color;
use super::input::MoveInputEvent;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    /// Raw key event fed to the input repeater
    Move(MoveInputEvent),
    /// Garbage sent by the opponent
    Garbage(Vec<Color>),
    /// Restart the game with a new seed
    Seed(String),
    /// This player has been defeated
    Defeat,
    /// The opponent forfeited
    ForfeitWin,
}

/// Actions that apply when the simulation enters `frame`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedActions {
    pub frame: u64,
    pub actions: Vec<Action>,
}

impl TimedActions {
    pub fn new(frame: u64, actions: Vec<Action>) -> Self {
        Self { frame, actions }
    }

    /// Append `actions`, skipping any already present so a retried message
    /// merges to the same list
    pub fn merge(&mut self, actions: impl IntoIterator<Item = Action>) {
        for action in actions {
            if !self.actions.contains(&action) {
                self.actions.push(action);
            }
        }
    }
}

/// Insert into a frame-sorted list, merging with an existing entry for the
/// same frame
pub fn insert_sorted(list: &mut Vec<TimedActions>, timed: TimedActions) {
    match list.binary_search_by_key(&timed.frame, |t| t.frame) {
        Ok(i) => list[i].merge(timed.actions),
        Err(i) => {
            let mut entry = TimedActions::new(timed.frame, Vec::new());
            entry.merge(timed.actions);
            list.insert(i, entry);
        }
    }
}
