//! Collaborator capabilities a controller is wired to
//!
//! Concrete keyboards, renderers and network channels live outside this
//! crate; the controller only sees these traits.

use std::time::Instant;

use super::{ControllerMode, ControllerState};
use crate::sim::MoveInputEvent;

/// Receives a snapshot after every mode change and every tick
pub trait RenderSink {
    /// `dt` is the simulated time in ms covered by the call, `None` after a
    /// mode change
    fn render(&mut self, state: &ControllerState, dt: Option<f64>);
}

pub type InputCallback = Box<dyn FnMut(MoveInputEvent)>;

/// Token returned by [`InputSource::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(pub u64);

/// Push-only source of key events (keyboard, touch, gamepad...)
pub trait InputSource {
    fn subscribe(&mut self, callback: InputCallback) -> SubscriptionHandle;

    /// Told about every controller mode change, e.g. to switch key maps
    fn set_mode(&mut self, mode: ControllerMode);

    fn unsubscribe_all(&mut self);
}

/// Outbound half of a message channel. Inbound strings are handed to
/// [`GameController::receive_encoded`](super::GameController::receive_encoded).
pub trait Transport {
    fn publish(&mut self, channel: &str, payload: &str);
}

/// Monotonic milliseconds, used for pacing only
pub trait Clock {
    fn now_ms(&self) -> f64;
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}
