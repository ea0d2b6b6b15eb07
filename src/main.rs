//! Headless mirror soak runner
//!
//! Plays a scripted local game on a simulated clock, ships every local action
//! through an in-process transport with a random delivery delay, and checks
//! that a mirror controller fed only those messages stays identical.
//!
//! Usage: `mirror-pills [seed] [frames] [settings.json]`

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::path::Path;
use std::process::ExitCode;
use std::rc::Rc;

use mirror_pills::codec;
use mirror_pills::consts::FRAME_MS;
use mirror_pills::controller::{Clock, RenderSink, Transport};
use mirror_pills::sim::{MoveInput, MoveInputEvent, seed_random, seed_random_int};
use mirror_pills::{ControllerMode, ControllerState, GameController, Settings, TickSource};

const DEFAULT_FRAMES: u64 = 60 * 60 * 5;
/// Longest delivery delay of a message, in frames
const MAX_DELAY: i64 = 45;

#[derive(Clone, Default)]
struct SimulatedClock(Rc<Cell<f64>>);

impl Clock for SimulatedClock {
    fn now_ms(&self) -> f64 {
        self.0.get()
    }
}

/// Published `(channel, payload)` pairs waiting to be picked up
#[derive(Clone, Default)]
struct Loopback {
    queue: Rc<RefCell<VecDeque<(String, String)>>>,
}

impl Transport for Loopback {
    fn publish(&mut self, channel: &str, payload: &str) {
        self.queue
            .borrow_mut()
            .push_back((channel.to_string(), payload.to_string()));
    }
}

/// Logs a one-line summary once per simulated second
#[derive(Default)]
struct LogRenderer {
    frames: u64,
}

impl RenderSink for LogRenderer {
    fn render(&mut self, state: &ControllerState, dt: Option<f64>) {
        match dt {
            None => log::info!("Local controller is {:?}", state.mode),
            Some(_) => {
                self.frames += 1;
                if self.frames % 60 == 0 {
                    log::debug!(
                        "frame {} mode {:?} score {} viruses {}",
                        state.game.frame,
                        state.game.mode,
                        state.game.score,
                        state.game.grid.virus_count()
                    );
                }
            }
        }
    }
}

fn init_logging() {
    #[cfg(not(target_arch = "wasm32"))]
    env_logger::init();
}

/// Deterministic key script: roughly every third of a second press or
/// release a random key
fn scripted_event(seed: &str, frame: u64) -> Option<MoveInputEvent> {
    if frame % 20 != 0 {
        return None;
    }
    let key = format!("{seed}:script:{frame}");
    let index = seed_random_int(&key, 0, MoveInput::ALL.len() as i64 - 1);
    let input = MoveInput::ALL[index as usize];
    if seed_random(&format!("{key}:release")) < 0.4 {
        Some(MoveInputEvent::up(input))
    } else {
        Some(MoveInputEvent::down(input))
    }
}

fn main() -> ExitCode {
    init_logging();

    let args: Vec<String> = std::env::args().collect();
    let seed = args.get(1).cloned().unwrap_or_else(|| "soak".to_string());
    let frames = args
        .get(2)
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_FRAMES);
    let settings = match args.get(3) {
        Some(path) => Settings::load(Path::new(path)),
        None => Settings::default(),
    };
    log::info!(
        "Soak run: seed={seed:?} frames={frames} speed={} level={}",
        settings.speed.as_str(),
        settings.level
    );

    let clock = SimulatedClock::default();
    let transport = Loopback::default();

    let mut local_options = settings.controller_options(&seed, TickSource::WallClock);
    local_options.channel = Some("local".to_string());
    let mut local = GameController::new(local_options)
        .with_clock(clock.clone())
        .with_transport(transport.clone())
        .with_renderer(LogRenderer::default());

    let mut mirror_options = settings.controller_options(&seed, TickSource::External);
    mirror_options.has_history = true;
    let mut mirror = GameController::new(mirror_options);

    local.start();
    mirror.start();

    let mut in_flight: Vec<(u64, String)> = Vec::new();
    let mut delivered = 0usize;

    for frame in 1..=frames {
        clock.0.set(frame as f64 * FRAME_MS + FRAME_MS / 2.0);
        if let Err(err) = local.update() {
            log::error!("Local controller failed: {err}");
            return ExitCode::FAILURE;
        }
        if let Some(event) = scripted_event(&seed, frame) {
            local.handle_input(event);
        }

        for (_, payload) in transport.queue.borrow_mut().drain(..) {
            let delay = seed_random_int(&format!("{seed}:delay:{payload}"), 0, MAX_DELAY) as u64;
            in_flight.push((frame + delay, payload));
        }

        if let Err(err) = mirror.tick_to_frame(local.frame()) {
            log::error!("Mirror failed to follow: {err}");
            return ExitCode::FAILURE;
        }
        let (due, pending): (Vec<_>, Vec<_>) =
            in_flight.into_iter().partition(|(at, _)| *at <= frame);
        in_flight = pending;
        for (_, payload) in due {
            if let Err(err) = mirror.receive_encoded(&payload) {
                log::error!("Mirror rejected {payload:?}: {err}");
                return ExitCode::FAILURE;
            }
            delivered += 1;
        }

        if local.mode() != ControllerMode::Playing && in_flight.is_empty() {
            break;
        }
    }

    for (_, payload) in in_flight.drain(..) {
        if let Err(err) = mirror.receive_encoded(&payload) {
            log::error!("Mirror rejected {payload:?}: {err}");
            return ExitCode::FAILURE;
        }
        delivered += 1;
    }
    if let Err(err) = mirror.tick_to_frame(local.frame()) {
        log::error!("Mirror failed to follow: {err}");
        return ExitCode::FAILURE;
    }

    let local_state = local.state();
    let mirror_state = mirror.state();
    local.cleanup();
    mirror.cleanup();

    if local_state != mirror_state {
        log::error!(
            "Mirror diverged at frame {}\nlocal:  {}\nmirror: {}",
            local_state.game.frame,
            codec::encode_controller_state(&local_state),
            codec::encode_controller_state(&mirror_state)
        );
        return ExitCode::FAILURE;
    }

    log::info!(
        "Mirror matched after {} frames ({delivered} messages): {:?}, score {}",
        local_state.game.frame,
        local_state.mode,
        local_state.game.score
    );
    log::info!("\n{}", codec::encode_grid(&local_state.game.grid, true));
    ExitCode::SUCCESS
}
