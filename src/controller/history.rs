//! Applied actions and post-tick snapshots, both sorted by frame

use crate::sim::action::insert_sorted;
use crate::sim::{GameState, TimedActions};

#[derive(Debug, Clone, Default)]
pub struct History {
    actions: Vec<TimedActions>,
    states: Vec<GameState>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actions(&self) -> &[TimedActions] {
        &self.actions
    }

    pub fn states(&self) -> &[GameState] {
        &self.states
    }

    /// Merge into the action list at its sorted position
    pub fn record_actions(&mut self, timed: TimedActions) {
        insert_sorted(&mut self.actions, timed);
    }

    /// Append a snapshot taken right after the tick into `state.frame`.
    /// Snapshots at or after that frame are replaced.
    pub fn record_state(&mut self, state: GameState) {
        self.truncate_states_from(state.frame);
        self.states.push(state);
    }

    /// Latest snapshot at or before `frame`
    pub fn nearest_state(&self, frame: u64) -> Option<&GameState> {
        let idx = self.states.partition_point(|s| s.frame <= frame);
        idx.checked_sub(1).map(|i| &self.states[i])
    }

    /// Drop snapshots at or after `frame`
    pub fn truncate_states_from(&mut self, frame: u64) {
        let idx = self.states.partition_point(|s| s.frame < frame);
        self.states.truncate(idx);
    }

    /// Action entries strictly after `frame`, up to and including `until`
    pub fn actions_between(&self, frame: u64, until: u64) -> impl Iterator<Item = &TimedActions> {
        self.actions
            .iter()
            .filter(move |t| t.frame > frame && t.frame <= until)
    }

    pub fn clear(&mut self) {
        self.actions.clear();
        self.states.clear();
    }
}
