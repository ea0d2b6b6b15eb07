//! Compact wire encodings
//!
//! Single characters for cells and key events, base-36 for integers, and
//! small composite strings for grids and timed actions. Whole game and
//! controller states travel as JSON objects whose fields use these encodings.
//! Every decoder rejects malformed input with a [`DecodeError`].

use serde::{Deserialize, Serialize};

use crate::controller::{ControllerMode, ControllerState};
use crate::error::DecodeError;
use crate::sim::{
    Action, Cell, CellLocation, Color, GameMode, GameResult, GameState, Grid, InputEventType,
    MoveInput, MoveInputEvent, PillColors, PillLocation, TimedActions,
};

/// High bit pattern of every cell character
const CELL_MASK: u32 = 0b100_0000;
/// High bit pattern of every move event character
const MOVE_MASK: u32 = 0b100_1000;
/// Color field value for cells without a color
const NO_COLOR: u32 = 0b11;

const ACTION_MOVE: char = 'M';
const ACTION_GARBAGE: char = 'G';
const ACTION_SEED: char = 'S';
const ACTION_DEFEAT: char = 'D';
const ACTION_FORFEIT_WIN: char = 'W';

// ---------------------------------------------------------------------------
// Primitives
// ---------------------------------------------------------------------------

/// Lowercase base-36
pub fn encode_int(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(std::char::from_digit((value % 36) as u32, 36).unwrap_or('0'));
        value /= 36;
    }
    digits.iter().rev().collect()
}

/// Lowercase base-36 digits only; `from_str_radix` alone would also take a
/// sign and uppercase letters
pub fn decode_int(s: &str) -> Result<u64, DecodeError> {
    let digits = |c: char| c.is_ascii_digit() || c.is_ascii_lowercase();
    if s.is_empty() || !s.chars().all(digits) {
        return Err(DecodeError::InvalidNumber(s.to_string()));
    }
    u64::from_str_radix(s, 36).map_err(|_| DecodeError::InvalidNumber(s.to_string()))
}

fn decode_small(s: &str) -> Result<u32, DecodeError> {
    let value = decode_int(s)?;
    u32::try_from(value).map_err(|_| DecodeError::InvalidNumber(s.to_string()))
}

fn decode_usize(s: &str) -> Result<usize, DecodeError> {
    let value = decode_int(s)?;
    usize::try_from(value).map_err(|_| DecodeError::InvalidNumber(s.to_string()))
}

pub fn encode_color(color: Color) -> char {
    char::from(b'0' + color.index())
}

pub fn decode_color(c: char) -> Result<Color, DecodeError> {
    c.to_digit(10)
        .and_then(|d| Color::from_index(d as u8))
        .ok_or(DecodeError::InvalidChar {
            what: "color",
            found: c,
            pos: 0,
        })
}

fn encode_colors(colors: &[Color]) -> String {
    colors.iter().map(|&c| encode_color(c)).collect()
}

fn decode_colors(s: &str) -> Result<Vec<Color>, DecodeError> {
    s.chars()
        .enumerate()
        .map(|(pos, c)| {
            decode_color(c).map_err(|_| DecodeError::InvalidChar {
                what: "color",
                found: c,
                pos,
            })
        })
        .collect()
}

fn cell_type_code(cell: Cell) -> u32 {
    match cell {
        Cell::Empty => 0,
        Cell::Destroyed => 1,
        Cell::Virus(_) => 2,
        Cell::PillTop(_) => 3,
        Cell::PillBottom(_) => 4,
        Cell::PillLeft(_) => 5,
        Cell::PillRight(_) => 6,
        Cell::PillSegment(_) => 7,
    }
}

/// `0b1TTTCC`: three type bits and two color bits
pub fn encode_cell(cell: Cell) -> char {
    let color = cell.color().map_or(NO_COLOR, |c| c.index() as u32);
    let code = CELL_MASK | cell_type_code(cell) << 2 | color;
    char::from_u32(code).unwrap_or('@')
}

pub fn decode_cell(c: char) -> Result<Cell, DecodeError> {
    let invalid = || DecodeError::InvalidChar {
        what: "cell",
        found: c,
        pos: 0,
    };
    let v = c as u32;
    if v & !0b1_1111 != CELL_MASK {
        return Err(invalid());
    }
    let color_bits = v & 0b11;
    let color = Color::from_index(color_bits as u8);
    let cell = match ((v >> 2) & 0b111, color) {
        (0, None) => Cell::Empty,
        (1, None) => Cell::Destroyed,
        (2, Some(c)) => Cell::Virus(c),
        (3, Some(c)) => Cell::PillTop(c),
        (4, Some(c)) => Cell::PillBottom(c),
        (5, Some(c)) => Cell::PillLeft(c),
        (6, Some(c)) => Cell::PillRight(c),
        (7, Some(c)) => Cell::PillSegment(c),
        _ => return Err(invalid()),
    };
    Ok(cell)
}

/// `0b1E01III`: event type in bit 4, input in bits 0-2
pub fn encode_move_event(event: MoveInputEvent) -> char {
    let event_bit = match event.event_type {
        InputEventType::KeyDown => 0,
        InputEventType::KeyUp => 1,
    };
    let code = MOVE_MASK | event_bit << 4 | event.input.code() as u32;
    char::from_u32(code).unwrap_or('H')
}

pub fn decode_move_event(c: char) -> Result<MoveInputEvent, DecodeError> {
    let invalid = || DecodeError::InvalidChar {
        what: "move event",
        found: c,
        pos: 0,
    };
    let v = c as u32;
    if v & !0b1_0111 != MOVE_MASK {
        return Err(invalid());
    }
    let input = MoveInput::from_code((v & 0b111) as u8).ok_or_else(invalid)?;
    let event_type = if v & 0b1_0000 == 0 {
        InputEventType::KeyDown
    } else {
        InputEventType::KeyUp
    };
    Ok(MoveInputEvent { input, event_type })
}

/// Both colors in one base-36 digit: `(c0 << 2) + c1`
pub fn encode_pill_colors(colors: PillColors) -> char {
    let value = ((colors[0].index() as u32) << 2) + colors[1].index() as u32;
    std::char::from_digit(value, 36).unwrap_or('0')
}

pub fn decode_pill_colors(c: char) -> Result<PillColors, DecodeError> {
    let invalid = || DecodeError::InvalidChar {
        what: "pill colors",
        found: c,
        pos: 0,
    };
    let value = c.to_digit(36).ok_or_else(invalid)?;
    let first = Color::from_index((value >> 2) as u8).ok_or_else(invalid)?;
    let second = Color::from_index((value & 0b11) as u8).ok_or_else(invalid)?;
    Ok([first, second])
}

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

/// `g<rows>,<cols>:` followed by one character per cell, row-major. Pretty
/// printing puts each row on its own line.
pub fn encode_grid(grid: &Grid, pretty: bool) -> String {
    let mut out = format!(
        "g{},{}:",
        encode_int(grid.height() as u64),
        encode_int(grid.width() as u64)
    );
    for row in grid.rows() {
        if pretty {
            out.push('\n');
        }
        out.extend(row.iter().map(|&cell| encode_cell(cell)));
    }
    out
}

/// Whitespace anywhere in the input is ignored
pub fn decode_grid(s: &str) -> Result<Grid, DecodeError> {
    let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    let header_error = || DecodeError::GridHeader(compact.chars().take(16).collect());

    let rest = compact.strip_prefix('g').ok_or_else(header_error)?;
    let (dims, cells) = rest.split_once(':').ok_or_else(header_error)?;
    let (rows, cols) = dims.split_once(',').ok_or_else(header_error)?;
    let rows = decode_usize(rows)?;
    let cols = decode_usize(cols)?;

    let expected = rows.checked_mul(cols).ok_or_else(header_error)?;
    let found = cells.chars().count();
    if found != expected {
        return Err(DecodeError::GridSize { expected, found });
    }

    let header_len = compact.len() - cells.len();
    let mut decoded = Vec::with_capacity(rows);
    let mut chars = cells.chars().enumerate();
    for _ in 0..rows {
        let mut row = Vec::with_capacity(cols);
        for (i, c) in chars.by_ref().take(cols) {
            row.push(decode_cell(c).map_err(|_| DecodeError::InvalidChar {
                what: "cell",
                found: c,
                pos: header_len + i,
            })?);
        }
        decoded.push(row);
    }
    if rows == 0 {
        return Ok(Grid::new(0, cols));
    }
    Ok(Grid::from_rows(decoded))
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

pub fn encode_action(action: &Action) -> String {
    match action {
        Action::Move(event) => format!("{ACTION_MOVE}{}", encode_move_event(*event)),
        Action::Garbage(colors) => format!("{ACTION_GARBAGE}{}", encode_colors(colors)),
        Action::Seed(seed) => format!(
            "{ACTION_SEED}{}:{seed}",
            encode_int(seed.chars().count() as u64)
        ),
        Action::Defeat => ACTION_DEFEAT.to_string(),
        Action::ForfeitWin => ACTION_FORFEIT_WIN.to_string(),
    }
}

/// `<frame>:<action>|<action>|...`
pub fn encode_timed_actions(timed: &TimedActions) -> String {
    let actions: Vec<String> = timed.actions.iter().map(encode_action).collect();
    format!("{}:{}", encode_int(timed.frame), actions.join("|"))
}

/// Cursor over the characters of an action list
struct ActionReader {
    chars: Vec<char>,
    pos: usize,
    /// Offset of `chars[0]` in the full message, for error positions
    offset: usize,
}

impl ActionReader {
    fn next(&mut self, what: &'static str) -> Result<char, DecodeError> {
        let c = *self.chars.get(self.pos).ok_or(DecodeError::UnexpectedEnd { what })?;
        self.pos += 1;
        Ok(c)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn take_until(&mut self, stop: char) -> String {
        let start = self.pos;
        while self.pos < self.chars.len() && self.chars[self.pos] != stop {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn invalid(&self, what: &'static str, found: char) -> DecodeError {
        DecodeError::InvalidChar {
            what,
            found,
            pos: self.offset + self.pos.saturating_sub(1),
        }
    }

    fn read_action(&mut self) -> Result<Action, DecodeError> {
        match self.next("action")? {
            ACTION_MOVE => {
                let c = self.next("move event")?;
                decode_move_event(c)
                    .map(Action::Move)
                    .map_err(|_| self.invalid("move event", c))
            }
            ACTION_GARBAGE => {
                let start = self.offset + self.pos;
                let colors = self.take_until('|');
                decode_colors(&colors).map(Action::Garbage).map_err(|err| match err {
                    DecodeError::InvalidChar { what, found, pos } => DecodeError::InvalidChar {
                        what,
                        found,
                        pos: start + pos,
                    },
                    other => other,
                })
            }
            ACTION_SEED => {
                let len = decode_usize(&self.take_until(':'))?;
                self.next("seed separator")?;
                if self.pos + len > self.chars.len() {
                    return Err(DecodeError::UnexpectedEnd { what: "seed" });
                }
                let seed: String = self.chars[self.pos..self.pos + len].iter().collect();
                self.pos += len;
                Ok(Action::Seed(seed))
            }
            ACTION_DEFEAT => Ok(Action::Defeat),
            ACTION_FORFEIT_WIN => Ok(Action::ForfeitWin),
            other => Err(DecodeError::UnknownAction(other)),
        }
    }
}

pub fn decode_timed_actions(s: &str) -> Result<TimedActions, DecodeError> {
    let (frame, body) = s.split_once(':').ok_or_else(|| DecodeError::Malformed {
        what: "timed actions",
        reason: "missing ':' after frame".to_string(),
    })?;
    let mut reader = ActionReader {
        chars: body.chars().collect(),
        pos: 0,
        offset: frame.chars().count() + 1,
    };
    let frame = decode_int(frame)?;
    let mut actions = Vec::new();
    while !reader.at_end() {
        actions.push(reader.read_action()?);
        if !reader.at_end() {
            let sep = reader.next("separator")?;
            if sep != '|' {
                return Err(reader.invalid("separator", sep));
            }
            if reader.at_end() {
                return Err(DecodeError::UnexpectedEnd { what: "action" });
            }
        }
    }
    Ok(TimedActions { frame, actions })
}

// ---------------------------------------------------------------------------
// Game and controller state
// ---------------------------------------------------------------------------

/// JSON shape of a [`GameState`], every field in its compact encoding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedGameState {
    pub mode: String,
    pub grid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pill: Option<String>,
    pub next_pill: String,
    #[serde(default)]
    pub moving_counters: String,
    pub seed: String,
    pub frame: String,
    pub game_ticks: String,
    pub mode_ticks: String,
    pub pill_count: String,
    pub score: String,
    pub time_bonus: String,
    #[serde(default)]
    pub line_colors: String,
    #[serde(default)]
    pub combo: String,
    #[serde(default)]
    pub combo_lines: String,
    #[serde(default)]
    pub queued_moves: String,
    #[serde(default)]
    pub pending_garbage: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

fn mode_name(mode: GameMode) -> &'static str {
    match mode {
        GameMode::Ready => "ready",
        GameMode::Playing => "playing",
        GameMode::Reconcile => "reconcile",
        GameMode::Destruction => "destruction",
        GameMode::Cascade => "cascade",
        GameMode::Ended => "ended",
    }
}

fn parse_mode(s: &str) -> Result<GameMode, DecodeError> {
    GameMode::ALL
        .into_iter()
        .find(|&m| mode_name(m) == s)
        .ok_or_else(|| DecodeError::Malformed {
            what: "game mode",
            reason: format!("unknown mode {s:?}"),
        })
}

fn encode_pill(pill: &PillLocation) -> String {
    pill.iter()
        .flat_map(|loc| [loc.row, loc.col])
        .map(|n| encode_int(n as u64))
        .collect::<Vec<_>>()
        .join(",")
}

fn decode_pill(s: &str) -> Result<PillLocation, DecodeError> {
    let parts = s
        .split(',')
        .map(decode_usize)
        .collect::<Result<Vec<_>, _>>()?;
    match parts.as_slice() {
        &[r0, c0, r1, c1] => Ok([CellLocation::new(r0, c0), CellLocation::new(r1, c1)]),
        _ => Err(DecodeError::Malformed {
            what: "pill",
            reason: format!("expected 4 coordinates, found {}", parts.len()),
        }),
    }
}

/// `<input code><ticks>` entries joined by `,`, in press order
fn encode_counters(counters: &[(MoveInput, u32)]) -> String {
    counters
        .iter()
        .map(|(input, ticks)| format!("{}{}", input.code(), encode_int(*ticks as u64)))
        .collect::<Vec<_>>()
        .join(",")
}

fn decode_counters(s: &str) -> Result<Vec<(MoveInput, u32)>, DecodeError> {
    if s.is_empty() {
        return Ok(Vec::new());
    }
    s.split(',')
        .map(|entry| {
            let mut chars = entry.chars();
            let code = chars.next().ok_or(DecodeError::UnexpectedEnd {
                what: "moving counter",
            })?;
            let input = code
                .to_digit(10)
                .and_then(|d| MoveInput::from_code(d as u8))
                .ok_or(DecodeError::InvalidChar {
                    what: "move input",
                    found: code,
                    pos: 0,
                })?;
            Ok((input, decode_small(chars.as_str())?))
        })
        .collect()
}

fn encode_moves(events: &[MoveInputEvent]) -> String {
    events.iter().map(|&e| encode_move_event(e)).collect()
}

fn decode_moves(s: &str) -> Result<Vec<MoveInputEvent>, DecodeError> {
    s.chars().map(decode_move_event).collect()
}

fn single_char(s: &str, what: &'static str) -> Result<char, DecodeError> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(DecodeError::Malformed {
            what,
            reason: format!("expected one character, found {s:?}"),
        }),
    }
}

fn decode_optional_small(s: &str) -> Result<u32, DecodeError> {
    if s.is_empty() { Ok(0) } else { decode_small(s) }
}

impl From<&GameState> for EncodedGameState {
    fn from(state: &GameState) -> Self {
        Self {
            mode: mode_name(state.mode).to_string(),
            grid: encode_grid(&state.grid, false),
            pill: state.pill.as_ref().map(encode_pill),
            next_pill: encode_pill_colors(state.next_pill).to_string(),
            moving_counters: encode_counters(&state.moving_counters),
            seed: state.seed.clone(),
            frame: encode_int(state.frame),
            game_ticks: encode_int(state.game_ticks),
            mode_ticks: encode_int(state.mode_ticks as u64),
            pill_count: encode_int(state.pill_count as u64),
            score: encode_int(state.score),
            time_bonus: encode_int(state.time_bonus),
            line_colors: encode_colors(&state.line_colors),
            combo: encode_int(state.combo as u64),
            combo_lines: encode_int(state.combo_lines as u64),
            queued_moves: encode_moves(&state.queued_moves),
            pending_garbage: encode_colors(&state.pending_garbage),
            result: state.result.map(|r| {
                match r {
                    GameResult::Win => "W",
                    GameResult::Lose => "L",
                }
                .to_string()
            }),
        }
    }
}

impl TryFrom<&EncodedGameState> for GameState {
    type Error = DecodeError;

    fn try_from(encoded: &EncodedGameState) -> Result<Self, Self::Error> {
        let result = match encoded.result.as_deref() {
            None => None,
            Some("W") => Some(GameResult::Win),
            Some("L") => Some(GameResult::Lose),
            Some(other) => {
                return Err(DecodeError::Malformed {
                    what: "game result",
                    reason: format!("unknown result {other:?}"),
                });
            }
        };
        Ok(GameState {
            mode: parse_mode(&encoded.mode)?,
            grid: decode_grid(&encoded.grid)?,
            pill: encoded.pill.as_deref().map(decode_pill).transpose()?,
            next_pill: decode_pill_colors(single_char(&encoded.next_pill, "next pill")?)?,
            moving_counters: decode_counters(&encoded.moving_counters)?,
            seed: encoded.seed.clone(),
            frame: decode_int(&encoded.frame)?,
            game_ticks: decode_int(&encoded.game_ticks)?,
            mode_ticks: decode_small(&encoded.mode_ticks)?,
            pill_count: decode_small(&encoded.pill_count)?,
            score: decode_int(&encoded.score)?,
            time_bonus: decode_int(&encoded.time_bonus)?,
            line_colors: decode_colors(&encoded.line_colors)?,
            combo: decode_optional_small(&encoded.combo)?,
            combo_lines: decode_optional_small(&encoded.combo_lines)?,
            queued_moves: decode_moves(&encoded.queued_moves)?,
            pending_garbage: decode_colors(&encoded.pending_garbage)?,
            result,
        })
    }
}

pub fn encode_game_state(state: &GameState) -> String {
    serde_json::to_string(&EncodedGameState::from(state)).unwrap_or_default()
}

pub fn decode_game_state(s: &str) -> Result<GameState, DecodeError> {
    let encoded: EncodedGameState = serde_json::from_str(s)?;
    GameState::try_from(&encoded)
}

/// JSON shape of a [`ControllerState`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedControllerState {
    pub mode: ControllerMode,
    pub game: EncodedGameState,
}

pub fn encode_controller_state(state: &ControllerState) -> String {
    let encoded = EncodedControllerState {
        mode: state.mode,
        game: EncodedGameState::from(&state.game),
    };
    serde_json::to_string(&encoded).unwrap_or_default()
}

pub fn decode_controller_state(s: &str) -> Result<ControllerState, DecodeError> {
    let encoded: EncodedControllerState = serde_json::from_str(s)?;
    Ok(ControllerState {
        mode: encoded.mode,
        game: GameState::try_from(&encoded.game)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::GameOptions;
    use crate::sim::Game;
    use proptest::prelude::*;

    fn arb_color() -> impl Strategy<Value = Color> {
        prop::sample::select(Color::ALL.to_vec())
    }

    fn arb_cell() -> impl Strategy<Value = Cell> {
        prop_oneof![
            Just(Cell::Empty),
            Just(Cell::Destroyed),
            arb_color().prop_map(Cell::Virus),
            arb_color().prop_map(Cell::PillTop),
            arb_color().prop_map(Cell::PillBottom),
            arb_color().prop_map(Cell::PillLeft),
            arb_color().prop_map(Cell::PillRight),
            arb_color().prop_map(Cell::PillSegment),
        ]
    }

    fn arb_event() -> impl Strategy<Value = MoveInputEvent> {
        (prop::sample::select(MoveInput::ALL.to_vec()), any::<bool>()).prop_map(|(input, up)| {
            if up {
                MoveInputEvent::up(input)
            } else {
                MoveInputEvent::down(input)
            }
        })
    }

    fn arb_grid() -> impl Strategy<Value = Grid> {
        (1usize..=80, 1usize..=40).prop_flat_map(|(rows, cols)| {
            prop::collection::vec(prop::collection::vec(arb_cell(), cols), rows)
                .prop_map(Grid::from_rows)
        })
    }

    fn arb_action() -> impl Strategy<Value = Action> {
        prop_oneof![
            arb_event().prop_map(Action::Move),
            prop::collection::vec(arb_color(), 0..6).prop_map(Action::Garbage),
            ".{0,12}".prop_map(Action::Seed),
            Just(Action::Defeat),
            Just(Action::ForfeitWin),
        ]
    }

    proptest! {
        #[test]
        fn prop_cell_round_trip(cell in arb_cell()) {
            prop_assert_eq!(decode_cell(encode_cell(cell)), Ok(cell));
        }

        #[test]
        fn prop_grid_round_trip(grid in arb_grid(), pretty in any::<bool>()) {
            prop_assert_eq!(decode_grid(&encode_grid(&grid, pretty)), Ok(grid));
        }

        #[test]
        fn prop_event_round_trip(event in arb_event()) {
            prop_assert_eq!(decode_move_event(encode_move_event(event)), Ok(event));
        }

        #[test]
        fn prop_int_round_trip(n in any::<u64>()) {
            prop_assert_eq!(decode_int(&encode_int(n)), Ok(n));
        }

        #[test]
        fn prop_timed_actions_round_trip(
            frame in any::<u64>(),
            actions in prop::collection::vec(arb_action(), 0..5),
        ) {
            let timed = TimedActions::new(frame, actions);
            prop_assert_eq!(decode_timed_actions(&encode_timed_actions(&timed)), Ok(timed));
        }
    }

    #[test]
    fn test_pill_colors_round_trip() {
        for a in Color::ALL {
            for b in Color::ALL {
                assert_eq!(decode_pill_colors(encode_pill_colors([a, b])), Ok([a, b]));
            }
        }
        assert!(decode_pill_colors('b').is_err());
        assert!(decode_pill_colors('3').is_err());
    }

    #[test]
    fn test_cell_chars_are_distinct_printable() {
        let mut cells = vec![Cell::Empty, Cell::Destroyed];
        for c in Color::ALL {
            cells.extend([
                Cell::Virus(c),
                Cell::PillTop(c),
                Cell::PillBottom(c),
                Cell::PillLeft(c),
                Cell::PillRight(c),
                Cell::PillSegment(c),
            ]);
        }
        let mut chars: Vec<char> = cells.iter().map(|&c| encode_cell(c)).collect();
        assert!(chars.iter().all(|c| c.is_ascii_graphic()));
        chars.sort();
        chars.dedup();
        assert_eq!(chars.len(), cells.len());
    }

    #[test]
    fn test_event_chars_are_distinct() {
        let mut chars = Vec::new();
        for input in MoveInput::ALL {
            chars.push(encode_move_event(MoveInputEvent::down(input)));
            chars.push(encode_move_event(MoveInputEvent::up(input)));
        }
        assert!(chars.iter().all(|c| c.is_ascii_graphic()));
        chars.sort();
        chars.dedup();
        assert_eq!(chars.len(), 12);
    }

    #[test]
    fn test_grid_literal() {
        let grid = Grid::from_rows(vec![
            vec![Cell::Empty, Cell::Virus(Color::Color2)],
            vec![Cell::PillTop(Color::Color1), Cell::Destroyed],
        ]);
        let encoded = encode_grid(&grid, false);
        assert!(encoded.starts_with("g2,2:"));
        assert_eq!(encoded.len(), "g2,2:".len() + 4);
        assert_eq!(encoded, "g2,2:CILG");
        assert_eq!(decode_grid(&encoded), Ok(grid.clone()));

        let pretty = encode_grid(&grid, true);
        assert_eq!(pretty.lines().count(), 3);
        assert_eq!(decode_grid(&pretty), Ok(grid));
    }

    #[test]
    fn test_decode_int_takes_only_lowercase_digits() {
        assert_eq!(decode_int("zz"), Ok(36 * 36 - 1));
        for bad in ["+1", "-1", "A", "1F", " 1", ""] {
            assert_eq!(decode_int(bad), Err(DecodeError::InvalidNumber(bad.to_string())));
        }
    }

    #[test]
    fn test_grid_header_uses_base36() {
        let grid = Grid::new(40, 12);
        assert!(encode_grid(&grid, false).starts_with("g14,c:"));
    }

    #[test]
    fn test_decode_grid_rejects_malformed() {
        assert!(matches!(decode_grid("x2,2:@@@@"), Err(DecodeError::GridHeader(_))));
        assert!(matches!(decode_grid("g2,2@@@@"), Err(DecodeError::GridHeader(_))));
        assert_eq!(
            decode_grid("g2,2:@@@"),
            Err(DecodeError::GridSize {
                expected: 4,
                found: 3
            })
        );
        assert!(matches!(
            decode_grid("g1,2:@!"),
            Err(DecodeError::InvalidChar { what: "cell", .. })
        ));
        // Empty with a color is not a valid cell
        assert!(decode_cell('@').is_err());
        assert_eq!(decode_cell('C'), Ok(Cell::Empty));
    }

    #[test]
    fn test_timed_actions_format() {
        let timed = TimedActions::new(
            100,
            vec![
                Action::Move(MoveInputEvent::down(MoveInput::Left)),
                Action::Garbage(vec![Color::Color1, Color::Color3]),
                Action::Seed("a|b:c".to_string()),
                Action::Defeat,
                Action::ForfeitWin,
            ],
        );
        let encoded = encode_timed_actions(&timed);
        assert_eq!(encoded, "2s:MJ|G02|S5:a|b:c|D|W");
        assert_eq!(decode_timed_actions(&encoded), Ok(timed));
        assert_eq!(
            decode_timed_actions("5:"),
            Ok(TimedActions::new(5, Vec::new()))
        );
    }

    #[test]
    fn test_decode_timed_actions_rejects_malformed() {
        assert!(decode_timed_actions("no-colon").is_err());
        assert_eq!(decode_timed_actions("1:X"), Err(DecodeError::UnknownAction('X')));
        assert!(decode_timed_actions("1:M").is_err());
        assert!(decode_timed_actions("1:G09").is_err());
        assert!(decode_timed_actions("1:S9:ab").is_err());
        assert!(decode_timed_actions("1:DW").is_err());
        assert!(decode_timed_actions("1:D|").is_err());
    }

    #[test]
    fn test_game_state_round_trip() {
        let mut game = Game::new(GameOptions {
            level: 5,
            seed: "codec".to_string(),
            ..Default::default()
        });
        game.apply_action(&Action::Move(MoveInputEvent::down(MoveInput::Right)));
        for _ in 0..40 {
            game.tick();
        }
        game.apply_action(&Action::Move(MoveInputEvent::down(MoveInput::Left)));
        game.apply_action(&Action::Garbage(vec![Color::Color2]));

        let state = game.state().clone();
        assert!(state.pill.is_some());
        let encoded = encode_game_state(&state);
        assert_eq!(decode_game_state(&encoded), Ok(state));
    }

    #[test]
    fn test_decode_game_state_rejects_bad_fields() {
        let state = Game::new(GameOptions::default()).into_state();
        let mut encoded = EncodedGameState::from(&state);
        encoded.grid = "g1,1:".to_string();
        assert!(GameState::try_from(&encoded).is_err());

        let mut encoded = EncodedGameState::from(&state);
        encoded.mode = "sleeping".to_string();
        assert!(GameState::try_from(&encoded).is_err());

        let mut encoded = EncodedGameState::from(&state);
        encoded.combo = encode_int(u32::MAX as u64 + 2);
        assert_eq!(
            GameState::try_from(&encoded),
            Err(DecodeError::InvalidNumber("1z141z5".to_string()))
        );

        let mut encoded = EncodedGameState::from(&state);
        encoded.combo_lines = String::new();
        assert_eq!(GameState::try_from(&encoded).map(|s| s.combo_lines), Ok(0));

        assert!(matches!(decode_game_state("{"), Err(DecodeError::Json(_))));
    }

    #[test]
    fn test_controller_state_round_trip() {
        let state = ControllerState {
            mode: ControllerMode::Playing,
            game: Game::new(GameOptions::default()).into_state(),
        };
        let encoded = encode_controller_state(&state);
        assert_eq!(decode_controller_state(&encoded), Ok(state));
    }
}
