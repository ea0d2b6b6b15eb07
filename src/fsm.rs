//! Explicit finite state machine
//!
//! A state variable, a table of allowed transitions, and on-enter callbacks
//! run in registration order right after the state changes.

use std::fmt;

/// Rejected transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("transition {from:?} -> {to:?} is not allowed")]
pub struct TransitionError<S: fmt::Debug> {
    pub from: S,
    pub to: S,
}

type EnterCallback<S> = Box<dyn FnMut(S, S)>;

pub struct StateMachine<S> {
    state: S,
    transitions: Vec<(S, Vec<S>)>,
    on_enter: Vec<(S, EnterCallback<S>)>,
}

impl<S: Copy + Eq + fmt::Debug> StateMachine<S> {
    pub fn new(initial: S, transitions: Vec<(S, Vec<S>)>) -> Self {
        Self {
            state: initial,
            transitions,
            on_enter: Vec::new(),
        }
    }

    pub fn state(&self) -> S {
        self.state
    }

    pub fn can(&self, to: S) -> bool {
        self.transitions
            .iter()
            .any(|(from, targets)| *from == self.state && targets.contains(&to))
    }

    /// Call `callback(from, to)` every time `state` is entered
    pub fn on_enter(&mut self, state: S, callback: impl FnMut(S, S) + 'static) {
        self.on_enter.push((state, Box::new(callback)));
    }

    /// Move to `to` if the table allows it, then run its on-enter callbacks
    pub fn transition(&mut self, to: S) -> Result<(), TransitionError<S>> {
        if !self.can(to) {
            return Err(TransitionError {
                from: self.state,
                to,
            });
        }
        let from = self.state;
        self.state = to;
        for (state, callback) in &mut self.on_enter {
            if *state == to {
                callback(from, to);
            }
        }
        Ok(())
    }

    /// Force the state without checks or callbacks (reset)
    pub fn reset(&mut self, state: S) {
        self.state = state;
    }

    pub fn clear_callbacks(&mut self) {
        self.on_enter.clear();
    }
}

impl<S: fmt::Debug> fmt::Debug for StateMachine<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("state", &self.state)
            .field("callbacks", &self.on_enter.len())
            .finish()
    }
}
