//! Key repeat normalization
//!
//! Turns raw key down/up events into the list of moves applied on a tick.
//! Held keys are kept in press order, which fixes the order of repeats that
//! fire on the same tick.

/// Player move inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MoveInput {
    Up,
    Down,
    Left,
    Right,
    RotateCcw,
    RotateCw,
}

impl MoveInput {
    pub const ALL: [MoveInput; 6] = [
        MoveInput::Up,
        MoveInput::Down,
        MoveInput::Left,
        MoveInput::Right,
        MoveInput::RotateCcw,
        MoveInput::RotateCw,
    ];

    /// Ticks a held key waits before repeating
    pub fn repeat_interval(self) -> u32 {
        match self {
            MoveInput::Down => 4,
            MoveInput::Up => 24,
            MoveInput::Left | MoveInput::Right => 8,
            MoveInput::RotateCcw | MoveInput::RotateCw => 12,
        }
    }

    /// Stable numeric code (0..=5)
    pub fn code(self) -> u8 {
        match self {
            MoveInput::Up => 0,
            MoveInput::Down => 1,
            MoveInput::Left => 2,
            MoveInput::Right => 3,
            MoveInput::RotateCcw => 4,
            MoveInput::RotateCw => 5,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputEventType {
    KeyDown,
    KeyUp,
}

/// A single raw key event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MoveInputEvent {
    pub input: MoveInput,
    pub event_type: InputEventType,
}

impl MoveInputEvent {
    pub fn down(input: MoveInput) -> Self {
        Self {
            input,
            event_type: InputEventType::KeyDown,
        }
    }

    pub fn up(input: MoveInput) -> Self {
        Self {
            input,
            event_type: InputEventType::KeyUp,
        }
    }
}

/// Held keys and the ticks since each last fired
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputRepeater {
    counters: Vec<(MoveInput, u32)>,
}

impl InputRepeater {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from saved counters (press order preserved)
    pub fn from_counters(counters: Vec<(MoveInput, u32)>) -> Self {
        Self { counters }
    }

    pub fn counters(&self) -> &[(MoveInput, u32)] {
        &self.counters
    }

    pub fn is_held(&self, input: MoveInput) -> bool {
        self.counters.iter().any(|(held, _)| *held == input)
    }

    /// Advance one tick and return the moves to apply, newly pressed keys
    /// first (in event order), then repeats (in press order)
    pub fn tick(&mut self, events: &[MoveInputEvent]) -> Vec<MoveInput> {
        for (_, ticks) in &mut self.counters {
            *ticks += 1;
        }

        let mut moves = Vec::new();
        for event in events {
            match event.event_type {
                InputEventType::KeyDown if !self.is_held(event.input) => {
                    moves.push(event.input);
                    self.counters.push((event.input, 0));
                }
                InputEventType::KeyDown => {}
                InputEventType::KeyUp => self.counters.retain(|(held, _)| *held != event.input),
            }
        }

        for (input, ticks) in &mut self.counters {
            if *ticks >= input.repeat_interval() {
                moves.push(*input);
                *ticks = 0;
            }
        }
        moves
    }

    pub fn clear(&mut self) {
        self.counters.clear();
    }
}
