//! Game controller: frame pacing, action scheduling and rollback
//!
//! A controller owns one [`Game`] and drives it either from a wall clock or
//! from explicit `tick_to_frame` calls. Actions are keyed by the frame they
//! apply on. Actions for future frames wait in a sorted list; actions that
//! arrive for frames already simulated rewind to a snapshot and replay the
//! corrected history, which keeps a remote mirror bit-identical to the
//! player it shadows.

pub mod history;
pub mod ports;

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::consts::FRAME_MS;
use crate::error::SimError;
use crate::fsm::StateMachine;
use crate::settings::{ControllerOptions, GameOptions, TickSource};
use crate::sim::action::insert_sorted;
use crate::sim::{
    Action, Color, Game, GameResult, GameState, GameTickResult, MoveInputEvent, TimedActions,
};

pub use history::History;
pub use ports::{
    Clock, InputCallback, InputSource, RenderSink, SubscriptionHandle, SystemClock, Transport,
};

/// Controller lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControllerMode {
    Ready,
    Playing,
    Paused,
    Victory,
    Defeat,
}

impl ControllerMode {
    pub const ALL: [ControllerMode; 5] = [
        ControllerMode::Ready,
        ControllerMode::Playing,
        ControllerMode::Paused,
        ControllerMode::Victory,
        ControllerMode::Defeat,
    ];

    fn transition_table() -> Vec<(ControllerMode, Vec<ControllerMode>)> {
        use ControllerMode::*;
        vec![
            (Ready, vec![Playing]),
            (Playing, vec![Paused, Victory, Defeat]),
            (Paused, vec![Playing, Victory, Defeat]),
            (Victory, vec![]),
            (Defeat, vec![]),
        ]
    }

    pub fn is_over(self) -> bool {
        matches!(self, ControllerMode::Victory | ControllerMode::Defeat)
    }
}

/// What a renderer or a remote peer sees
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerState {
    pub mode: ControllerMode,
    pub game: GameState,
}

pub struct GameController {
    options: ControllerOptions,
    game: Game,
    modes: StateMachine<ControllerMode>,
    future_actions: Vec<TimedActions>,
    /// `None` when the controller runs without history
    history: Option<History>,
    /// Wall clock reference point
    ref_time: f64,
    ref_frame: u64,
    /// Garbage produced by local combos, waiting to be sent to the opponent
    outgoing_garbage: Vec<Vec<Color>>,
    /// Every garbage emission so far, keyed by the frame that produced it
    sent_garbage: Vec<(u64, Vec<Color>)>,
    /// Key events pushed by the input source since the last update
    inbox: Rc<RefCell<Vec<MoveInputEvent>>>,
    clock: Box<dyn Clock>,
    renderer: Option<Box<dyn RenderSink>>,
    input: Option<Box<dyn InputSource>>,
    transport: Option<Box<dyn Transport>>,
}

impl GameController {
    pub fn new(options: ControllerOptions) -> Self {
        let game = Game::new(options.game.clone());
        let mut modes =
            StateMachine::new(ControllerMode::Ready, ControllerMode::transition_table());
        for mode in ControllerMode::ALL {
            modes.on_enter(mode, |from, to| log::debug!("controller {from:?} -> {to:?}"));
        }
        let history = options.has_history.then(History::new);
        Self {
            options,
            game,
            modes,
            future_actions: Vec::new(),
            history,
            ref_time: 0.0,
            ref_frame: 0,
            outgoing_garbage: Vec::new(),
            sent_garbage: Vec::new(),
            inbox: Rc::new(RefCell::new(Vec::new())),
            clock: Box::new(SystemClock::new()),
            renderer: None,
            input: None,
            transport: None,
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_renderer(mut self, renderer: impl RenderSink + 'static) -> Self {
        self.renderer = Some(Box::new(renderer));
        self
    }

    /// Local actions are published on the configured channel
    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    /// Subscribe to an input source; its events are picked up on the next
    /// update or tick
    pub fn with_input(mut self, mut input: impl InputSource + 'static) -> Self {
        let inbox = Rc::clone(&self.inbox);
        input.subscribe(Box::new(move |event| inbox.borrow_mut().push(event)));
        input.set_mode(self.modes.state());
        self.input = Some(Box::new(input));
        self
    }

    /// Register a callback run whenever the controller enters `mode`
    pub fn on_enter(
        &mut self,
        mode: ControllerMode,
        callback: impl FnMut(ControllerMode, ControllerMode) + 'static,
    ) {
        self.modes.on_enter(mode, callback);
    }

    pub fn options(&self) -> &ControllerOptions {
        &self.options
    }

    pub fn mode(&self) -> ControllerMode {
        self.modes.state()
    }

    pub fn frame(&self) -> u64 {
        self.game.frame()
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    pub fn history(&self) -> Option<&History> {
        self.history.as_ref()
    }

    pub fn future_actions(&self) -> &[TimedActions] {
        &self.future_actions
    }

    pub fn state(&self) -> ControllerState {
        ControllerState {
            mode: self.modes.state(),
            game: self.game.state().clone(),
        }
    }

    /// Garbage sent by local combos since the last call
    pub fn take_outgoing_garbage(&mut self) -> Vec<Vec<Color>> {
        std::mem::take(&mut self.outgoing_garbage)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Start playing, anchoring the wall clock at the current time
    pub fn start(&mut self) {
        if self.set_mode(ControllerMode::Playing) {
            self.rebase(self.clock.now_ms());
        }
    }

    pub fn pause(&mut self) {
        if self.modes.state() == ControllerMode::Playing {
            self.set_mode(ControllerMode::Paused);
        }
    }

    /// Resume after a pause. Paused time is not caught up.
    pub fn resume(&mut self) {
        if self.modes.state() == ControllerMode::Paused && self.set_mode(ControllerMode::Playing) {
            self.rebase(self.clock.now_ms());
        }
    }

    /// Start over with a new seed, dropping all scheduled actions and history
    pub fn reset(&mut self, seed: &str) {
        log::info!("Resetting controller with seed {seed:?}");
        self.options.game.seed = seed.to_string();
        self.game = Game::new(self.options.game.clone());
        self.future_actions.clear();
        if let Some(history) = &mut self.history {
            history.clear();
        }
        self.outgoing_garbage.clear();
        self.sent_garbage.clear();
        self.inbox.borrow_mut().clear();
        self.modes.reset(ControllerMode::Ready);
        self.ref_frame = 0;
        self.mode_changed();
    }

    /// Detach every collaborator and drop input subscriptions
    pub fn cleanup(&mut self) {
        if let Some(mut input) = self.input.take() {
            input.unsubscribe_all();
        }
        self.renderer = None;
        self.transport = None;
        self.modes.clear_callbacks();
        self.inbox.borrow_mut().clear();
        log::info!("Controller cleaned up at frame {}", self.game.frame());
    }

    // -----------------------------------------------------------------------
    // Ticking
    // -----------------------------------------------------------------------

    /// Frame the wall clock says the simulation should be at
    pub fn expected_frame(&self, now: f64) -> u64 {
        let elapsed = ((now - self.ref_time) / FRAME_MS).floor();
        self.ref_frame + elapsed.max(0.0) as u64
    }

    /// Drain pending input and, on a wall clock, catch up with the clock
    pub fn update(&mut self) -> Result<(), SimError> {
        let now = self.clock.now_ms();
        self.tick_wall_clock(now)
    }

    /// Tick forward to the frame expected at `now`, never backwards
    pub fn tick_wall_clock(&mut self, now: f64) -> Result<(), SimError> {
        self.drain_input();
        if self.options.tick_source != TickSource::WallClock {
            return Ok(());
        }
        let target = self.expected_frame(now).max(self.game.frame());
        self.tick_to_frame(target)
    }

    /// Tick one frame at a time until `target`, applying scheduled actions
    /// on the frame they name and stopping once the game is decided
    pub fn tick_to_frame(&mut self, target: u64) -> Result<(), SimError> {
        let current = self.game.frame();
        if target < current {
            return Err(SimError::FrameInPast {
                requested: target,
                current,
            });
        }
        self.drain_input();

        while self.modes.state() == ControllerMode::Playing && self.game.frame() < target {
            let entering = self.game.frame() + 1;
            let scheduled = self.take_future_actions(entering);

            let mut results = Vec::new();
            if let Some(timed) = &scheduled {
                results.extend(self.game.apply_actions(&timed.actions));
            }
            results.extend(self.game.tick());

            if let (Some(timed), Some(history)) = (scheduled, &mut self.history) {
                history.record_actions(timed);
                history.record_state(self.game.state().clone());
            }

            self.render(Some(FRAME_MS));
            for result in results {
                match result {
                    GameTickResult::Garbage(colors) => {
                        self.sent_garbage.push((self.game.frame(), colors.clone()));
                        self.outgoing_garbage.push(colors);
                    }
                    GameTickResult::Win => {
                        self.set_mode(ControllerMode::Victory);
                    }
                    GameTickResult::Lose => {
                        self.set_mode(ControllerMode::Defeat);
                    }
                }
            }
        }
        Ok(())
    }

    fn take_future_actions(&mut self, frame: u64) -> Option<TimedActions> {
        match self.future_actions.first() {
            Some(first) if first.frame == frame => Some(self.future_actions.remove(0)),
            _ => None,
        }
    }

    // -----------------------------------------------------------------------
    // Actions
    // -----------------------------------------------------------------------

    /// Schedule actions. Future frames wait for their tick; frames already
    /// simulated rewrite history. Frame 0 is never entered, so its actions
    /// apply on frame 1.
    pub fn add_frame_actions(&mut self, mut timed: TimedActions) -> Result<(), SimError> {
        timed.frame = timed.frame.max(1);
        if timed.frame > self.game.frame() {
            insert_sorted(&mut self.future_actions, timed);
            Ok(())
        } else {
            self.rewrite_history(timed)
        }
    }

    /// Schedule a local key event for the next frame and publish it
    pub fn handle_input(&mut self, event: MoveInputEvent) {
        if self.modes.state() != ControllerMode::Playing {
            log::trace!("Ignoring {event:?} while {:?}", self.modes.state());
            return;
        }
        self.schedule_local(vec![Action::Move(event)]);
    }

    /// Schedule local actions for the next frame and publish everything
    /// scheduled for that frame so far. Receivers merge duplicates, so the
    /// last message for a frame carries its complete, ordered action list.
    pub fn schedule_local(&mut self, actions: Vec<Action>) {
        let frame = self.game.frame() + 1;
        insert_sorted(&mut self.future_actions, TimedActions::new(frame, actions));
        let (Some(transport), Some(channel)) = (&mut self.transport, &self.options.channel) else {
            return;
        };
        if let Some(entry) = self.future_actions.iter().find(|t| t.frame == frame) {
            transport.publish(channel, &codec::encode_timed_actions(entry));
        }
    }

    /// Accept an encoded timed-actions message from the transport.
    /// Malformed messages are logged and dropped.
    pub fn receive_encoded(&mut self, payload: &str) -> Result<(), SimError> {
        match codec::decode_timed_actions(payload) {
            Ok(timed) => self.add_frame_actions(timed),
            Err(err) => {
                log::warn!("Discarding malformed message {payload:?}: {err}");
                Ok(())
            }
        }
    }

    fn drain_input(&mut self) {
        let events = std::mem::take(&mut *self.inbox.borrow_mut());
        for event in events {
            self.handle_input(event);
        }
    }

    /// Insert actions for an already simulated frame and replay from the
    /// nearest snapshot before it up to the current frame
    fn rewrite_history(&mut self, timed: TimedActions) -> Result<(), SimError> {
        let live_frame = self.game.frame();
        let Some(history) = &mut self.history else {
            return Err(SimError::HistoryDisabled { frame: timed.frame });
        };
        let frame = timed.frame;
        log::debug!(
            "Rewriting history at frame {frame} (live frame {live_frame}, {} actions)",
            timed.actions.len()
        );

        let options: &GameOptions = self.game.options();
        let snapshot = history.nearest_state(frame - 1).cloned();
        let mut scratch = match snapshot {
            Some(state) => Game::from_state(options.clone(), state),
            None => Game::from_state(options.clone(), GameState::new(options)),
        };

        history.record_actions(TimedActions::new(frame, timed.actions));
        history.truncate_states_from(frame);

        let replay: Vec<TimedActions> = history
            .actions_between(scratch.frame(), live_frame)
            .cloned()
            .collect();
        let mut garbage = Vec::new();
        let mut collect = |scratch: &Game, result: Option<GameTickResult>| {
            if let Some(GameTickResult::Garbage(colors)) = result {
                garbage.push((scratch.frame(), colors));
            }
        };
        for entry in replay {
            while scratch.frame() + 1 < entry.frame {
                let result = scratch.tick();
                collect(&scratch, result);
            }
            scratch.apply_actions(&entry.actions);
            let result = scratch.tick();
            collect(&scratch, result);
            history.record_state(scratch.state().clone());
        }
        while scratch.frame() < live_frame {
            let result = scratch.tick();
            collect(&scratch, result);
        }

        self.game.restore(scratch.into_state());
        self.reconcile_garbage(frame, garbage);
        self.sync_mode_with_result();
        self.render(None);
        Ok(())
    }

    /// Send garbage that only the corrected timeline produced. Garbage
    /// already sent cannot be recalled; it is only reported.
    fn reconcile_garbage(&mut self, from_frame: u64, replayed: Vec<(u64, Vec<Color>)>) {
        for sent in self.sent_garbage.iter().filter(|(f, _)| *f >= from_frame) {
            if !replayed.contains(sent) {
                log::warn!(
                    "Garbage {:?} sent at frame {} was undone by a replay",
                    sent.1,
                    sent.0
                );
            }
        }
        for emitted in replayed {
            if !self.sent_garbage.contains(&emitted) {
                log::debug!("Replay produced garbage {:?} at frame {}", emitted.1, emitted.0);
                self.outgoing_garbage.push(emitted.1.clone());
                self.sent_garbage.push(emitted);
            }
        }
    }

    /// After a replay the outcome may differ from what the live game saw
    fn sync_mode_with_result(&mut self) {
        let wanted = match self.game.state().result {
            Some(GameResult::Win) => ControllerMode::Victory,
            Some(GameResult::Lose) => ControllerMode::Defeat,
            None if self.modes.state().is_over() => ControllerMode::Playing,
            None => return,
        };
        if wanted == self.modes.state() {
            return;
        }
        log::debug!("Replay changed outcome: {:?} -> {wanted:?}", self.modes.state());
        if !self.set_mode(wanted) {
            self.modes.reset(wanted);
            if wanted == ControllerMode::Playing {
                self.rebase(self.clock.now_ms());
            }
            self.mode_changed();
        }
    }

    // -----------------------------------------------------------------------
    // Modes and collaborators
    // -----------------------------------------------------------------------

    fn set_mode(&mut self, mode: ControllerMode) -> bool {
        if self.modes.state() == mode {
            return false;
        }
        if let Err(err) = self.modes.transition(mode) {
            log::debug!("{err}");
            return false;
        }
        self.mode_changed();
        true
    }

    fn mode_changed(&mut self) {
        let mode = self.modes.state();
        if let Some(input) = &mut self.input {
            input.set_mode(mode);
        }
        self.render(None);
    }

    fn rebase(&mut self, now: f64) {
        self.ref_time = now;
        self.ref_frame = self.game.frame();
    }

    fn render(&mut self, dt: Option<f64>) {
        if self.renderer.is_none() {
            return;
        }
        let state = self.state();
        if let Some(renderer) = &mut self.renderer {
            renderer.render(&state, dt);
        }
    }
}

impl std::fmt::Debug for GameController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameController")
            .field("mode", &self.modes.state())
            .field("frame", &self.game.frame())
            .field("future_actions", &self.future_actions.len())
            .field("has_history", &self.history.is_some())
            .finish()
    }
}
