//! Fixed timestep simulation tick
//!
//! Core game loop that advances a single game deterministically, one frame
//! per call.

use super::action::Action;
use super::grid::Direction;
use super::input::{InputRepeater, MoveInput};
use super::lines::{clear_top_row, destroy_lines, drop_debris, remove_destroyed};
use super::pill::{Rotation, give_pill, move_pill, rotate_pill, slam_pill};
use super::state::{GameMode, GameResult, GameState, GameTickResult, pill_colors_for};
use super::viruses::{place_garbage, virus_count_for_level};
use crate::consts::*;
use crate::settings::GameOptions;

/// Gravity table index for a base speed after `pill_count` pills
pub fn speed_for(base_speed: u32, pill_count: u32) -> u32 {
    (base_speed + pill_count / ACCELERATE_INTERVAL).min(GRAVITY_TABLE.len() as u32 - 1)
}

/// Ticks between gravity drops at a base speed after `pill_count` pills
pub fn gravity_interval(base_speed: u32, pill_count: u32) -> u32 {
    GRAVITY_TABLE[speed_for(base_speed, pill_count) as usize]
}

/// Score for one reconcile pass. The combo count is used as an exponent, so
/// long combos are rewarded super-linearly.
pub fn reconcile_score(destroyed: u32, viruses: u32, combo: u32) -> u64 {
    let cells = (destroyed as u64).saturating_pow(combo);
    let virus = (viruses as u64).saturating_pow(combo);
    cells
        .saturating_mul(POINTS_PER_CELL)
        .saturating_add(virus.saturating_mul(VIRUS_POINT_MULTIPLIER * POINTS_PER_CELL))
}

/// Bonus for clearing the field faster than expected
pub fn time_bonus(orig_virus_count: u64, game_ticks: u64) -> u64 {
    let per_virus = BONUS_TICKS_PER_VIRUS
        + BONUS_VIRUS_THRESHOLD.saturating_sub(orig_virus_count) * BONUS_TICKS_PER_MISSING_VIRUS;
    (orig_virus_count * per_virus).saturating_sub(game_ticks)
}

/// One simulation instance
#[derive(Debug, Clone)]
pub struct Game {
    options: GameOptions,
    state: GameState,
}

impl Game {
    pub fn new(options: GameOptions) -> Self {
        let state = GameState::new(&options);
        log::info!(
            "New game: seed={:?} level={} speed={} viruses={}",
            options.seed,
            options.level,
            options.base_speed,
            state.grid.virus_count()
        );
        Self { options, state }
    }

    /// Resume from a saved state
    pub fn from_state(options: GameOptions, state: GameState) -> Self {
        Self { options, state }
    }

    pub fn options(&self) -> &GameOptions {
        &self.options
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn into_state(self) -> GameState {
        self.state
    }

    /// Replace the whole state (rewind)
    pub fn restore(&mut self, state: GameState) {
        self.state = state;
    }

    pub fn frame(&self) -> u64 {
        self.state.frame
    }

    pub fn is_ended(&self) -> bool {
        self.state.is_ended()
    }

    /// Current gravity table index
    pub fn speed(&self) -> u32 {
        speed_for(self.options.base_speed, self.state.pill_count)
    }

    /// Current ticks between gravity drops
    pub fn gravity_interval(&self) -> u32 {
        gravity_interval(self.options.base_speed, self.state.pill_count)
    }

    /// Apply one action ahead of the next tick. Returns a result if the
    /// action ended the game.
    pub fn apply_action(&mut self, action: &Action) -> Option<GameTickResult> {
        match action {
            Action::Move(event) => {
                self.state.queued_moves.push(*event);
                None
            }
            Action::Garbage(colors) => {
                self.state.pending_garbage.extend(colors.iter().copied());
                None
            }
            Action::Seed(seed) => {
                log::info!("Reseeding game at frame {} with {seed:?}", self.state.frame);
                self.state = GameState::with_seed(&self.options, seed, self.state.frame);
                None
            }
            Action::Defeat => self.end(GameResult::Lose),
            Action::ForfeitWin => self.end(GameResult::Win),
        }
    }

    pub fn apply_actions(&mut self, actions: &[Action]) -> Option<GameTickResult> {
        let mut result = None;
        for action in actions {
            if let Some(r) = self.apply_action(action) {
                result = Some(r);
            }
        }
        result
    }

    /// Advance the game state by one frame
    pub fn tick(&mut self) -> Option<GameTickResult> {
        self.state.frame += 1;
        if self.state.is_ended() {
            self.state.queued_moves.clear();
            return None;
        }

        let events = std::mem::take(&mut self.state.queued_moves);
        let mut repeater =
            InputRepeater::from_counters(std::mem::take(&mut self.state.moving_counters));
        let moves = repeater.tick(&events);
        let holding_down = repeater.is_held(MoveInput::Down);
        self.state.moving_counters = repeater.counters().to_vec();

        match self.state.mode {
            GameMode::Ready => {
                self.set_mode(GameMode::Playing);
                None
            }
            GameMode::Playing => self.tick_playing(&moves, holding_down),
            GameMode::Reconcile => self.tick_reconcile(),
            GameMode::Destruction => {
                self.tick_destruction();
                None
            }
            GameMode::Cascade => self.tick_cascade(),
            GameMode::Ended => None,
        }
    }

    fn set_mode(&mut self, mode: GameMode) {
        if let Err(err) = self.state.transition(mode) {
            log::error!("{err}");
            debug_assert!(false, "{err}");
        }
    }

    fn end(&mut self, result: GameResult) -> Option<GameTickResult> {
        if self.state.is_ended() {
            return None;
        }
        self.set_mode(GameMode::Ended);
        self.state.pill = None;
        self.state.result = Some(result);
        log::info!(
            "Game ended at frame {}: {result:?}, score {}",
            self.state.frame,
            self.state.score
        );
        Some(result.into())
    }

    fn tick_playing(&mut self, moves: &[MoveInput], holding_down: bool) -> Option<GameTickResult> {
        let s = &mut self.state;
        s.game_ticks += 1;
        s.mode_ticks += 1;

        if s.pill.is_none() {
            if !s.pending_garbage.is_empty() {
                let garbage = std::mem::take(&mut s.pending_garbage);
                let seed = format!("{}:{}", s.seed, s.frame);
                s.grid = place_garbage(&s.grid, &garbage, &seed);
                self.set_mode(GameMode::Cascade);
                return None;
            }

            let given = give_pill(&s.grid, s.next_pill);
            if !given.did_give {
                return self.end(GameResult::Lose);
            }
            s.grid = given.grid;
            s.pill = given.pill;
            s.pill_count += 1;
            s.next_pill = pill_colors_for(&s.seed, s.pill_count);
        }

        let mut reconcile = false;
        for &input in moves {
            let Some(pill) = s.pill else { break };
            let moved = match input {
                MoveInput::Up => {
                    reconcile = true;
                    slam_pill(&s.grid, pill)
                }
                MoveInput::Down => {
                    let moved = move_pill(&s.grid, pill, Direction::Down);
                    reconcile = !moved.did_move;
                    moved
                }
                MoveInput::Left => move_pill(&s.grid, pill, Direction::Left),
                MoveInput::Right => move_pill(&s.grid, pill, Direction::Right),
                MoveInput::RotateCcw => rotate_pill(&s.grid, pill, Rotation::CounterClockwise),
                MoveInput::RotateCw => rotate_pill(&s.grid, pill, Rotation::Clockwise),
            };
            s.grid = moved.grid;
            s.pill = Some(moved.pill);
            if reconcile {
                break;
            }
        }

        let interval = gravity_interval(self.options.base_speed, s.pill_count);
        if !reconcile && s.mode_ticks > interval && !holding_down {
            s.mode_ticks = 0;
            if let Some(pill) = s.pill {
                let moved = move_pill(&s.grid, pill, Direction::Down);
                reconcile = !moved.did_move;
                s.grid = moved.grid;
                s.pill = Some(moved.pill);
            }
        }

        if reconcile {
            s.pill = None;
            self.set_mode(GameMode::Reconcile);
        }
        None
    }

    fn tick_reconcile(&mut self) -> Option<GameTickResult> {
        let s = &mut self.state;
        s.grid = clear_top_row(&s.grid);
        let destroyed = destroy_lines(&s.grid);
        s.grid = destroyed.grid;

        if destroyed.has_lines {
            s.combo += 1;
            s.combo_lines += destroyed.line_colors.len() as u32;
            s.line_colors.extend(destroyed.line_colors);
            let points = reconcile_score(destroyed.destroyed_count, destroyed.virus_count, s.combo);
            s.score = s.score.saturating_add(points);
        }

        if s.grid.virus_count() == 0 {
            let orig = virus_count_for_level(self.options.level) as u64;
            s.time_bonus = time_bonus(orig, s.game_ticks);
            s.score = s.score.saturating_add(s.time_bonus);
            return self.end(GameResult::Win);
        }

        if destroyed.has_lines {
            self.set_mode(GameMode::Destruction);
        } else {
            self.set_mode(GameMode::Cascade);
        }
        None
    }

    fn tick_destruction(&mut self) {
        let s = &mut self.state;
        if s.mode_ticks >= DESTRUCTION_TICKS {
            s.grid = remove_destroyed(&s.grid);
            self.set_mode(GameMode::Cascade);
        } else {
            s.mode_ticks += 1;
        }
    }

    fn tick_cascade(&mut self) -> Option<GameTickResult> {
        let s = &mut self.state;
        if s.mode_ticks == 0 && drop_debris(&s.grid).falling_cells.is_empty() {
            let garbage = finish_combo(s);
            self.set_mode(GameMode::Playing);
            return garbage;
        }

        if s.mode_ticks > 0 && s.mode_ticks % CASCADE_TICKS == 0 {
            let dropped = drop_debris(&s.grid);
            s.grid = dropped.grid;
            let next = drop_debris(&s.grid);
            if next.falling_cells.len() < dropped.falling_cells.len() {
                self.set_mode(GameMode::Reconcile);
                return None;
            }
        }
        s.mode_ticks += 1;
        None
    }
}

/// Close out a combo, returning garbage for the opponent if it was big enough
fn finish_combo(s: &mut GameState) -> Option<GameTickResult> {
    let colors = std::mem::take(&mut s.line_colors);
    let lines = s.combo_lines;
    s.combo = 0;
    s.combo_lines = 0;
    (lines >= MIN_GARBAGE_LINES)
        .then(|| GameTickResult::Garbage(colors.into_iter().take(MAX_GARBAGE).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::grid::{Cell, CellLocation, Color, Grid};
    use crate::sim::input::MoveInputEvent;
    use crate::sim::pill::spawn_location;

    fn options() -> GameOptions {
        GameOptions {
            seed: "tick-tests".to_string(),
            ..Default::default()
        }
    }

    fn loc(row: usize, col: usize) -> CellLocation {
        CellLocation::new(row, col)
    }

    /// Game in Playing with a custom grid and no active pill
    fn playing_with(grid: Grid) -> Game {
        let mut game = Game::new(options());
        game.tick();
        assert_eq!(game.state().mode, GameMode::Playing);
        game.state.grid = grid;
        game
    }

    fn tick_until(game: &mut Game, mode: GameMode, limit: u32) -> Vec<GameTickResult> {
        let mut results = Vec::new();
        for _ in 0..limit {
            if game.state().mode == mode {
                return results;
            }
            results.extend(game.tick());
        }
        panic!("never reached {mode:?}, stuck in {:?}", game.state().mode);
    }

    #[test]
    fn test_ready_to_playing_spawns_pill() {
        let mut game = Game::new(options());
        assert_eq!(game.tick(), None);
        assert_eq!(game.state().mode, GameMode::Playing);
        let first = game.state().next_pill;

        game.tick();
        let pill = game.state().pill.unwrap();
        assert_eq!(pill, spawn_location(8));
        assert_eq!(game.state().grid.get(pill[0]), Some(Cell::PillLeft(first[0])));
        assert_eq!(game.state().pill_count, 1);
        assert_eq!(game.state().next_pill, pill_colors_for("tick-tests", 1));
        assert_eq!(game.state().frame, 2);
    }

    #[test]
    fn test_blocked_spawn_loses() {
        let [a, b] = spawn_location(8);
        let grid = Grid::with_playable_size(8, 16)
            .set(a, Cell::Virus(Color::Color1))
            .set(b, Cell::Virus(Color::Color2));
        let mut game = playing_with(grid);
        assert_eq!(game.tick(), Some(GameTickResult::Lose));
        assert_eq!(game.state().mode, GameMode::Ended);
        assert_eq!(game.state().result, Some(GameResult::Lose));

        // ended games only count frames
        let frame = game.frame();
        assert_eq!(game.tick(), None);
        assert_eq!(game.frame(), frame + 1);
    }

    #[test]
    fn test_gravity_table_lookup() {
        for pill_count in 0..10 {
            assert_eq!(gravity_interval(15, pill_count), GRAVITY_TABLE[15]);
        }
        assert_eq!(gravity_interval(15, 10), GRAVITY_TABLE[16]);
        assert_eq!(gravity_interval(80, 50), GRAVITY_TABLE[80]);
    }

    #[test]
    fn test_gravity_moves_pill_down() {
        let mut game = playing_with(Grid::with_playable_size(8, 16));
        game.tick();
        let start = game.state().pill.unwrap();
        let interval = game.gravity_interval();
        // mode_ticks is already 1 after the spawn tick
        for _ in 1..interval {
            game.tick();
        }
        assert_eq!(game.state().pill, Some(start));
        game.tick();
        assert_eq!(game.state().pill.unwrap()[0].row, start[0].row + 1);
    }

    #[test]
    fn test_slam_forces_reconcile() {
        let mut game = playing_with(Grid::with_playable_size(8, 16));
        game.tick();
        game.apply_action(&Action::Move(MoveInputEvent::down(MoveInput::Up)));
        game.tick();
        assert_eq!(game.state().mode, GameMode::Reconcile);
        assert_eq!(game.state().pill, None);
        let [a, b] = spawn_location(8);
        assert!(game.state().grid.get(loc(16, a.col)).is_some_and(Cell::is_pill_half));
        assert!(game.state().grid.get(loc(16, b.col)).is_some_and(Cell::is_pill_half));
    }

    #[test]
    fn test_moves_shift_and_rotate() {
        let mut game = playing_with(Grid::with_playable_size(8, 16));
        game.tick();
        let [a, _] = game.state().pill.unwrap();
        game.apply_action(&Action::Move(MoveInputEvent::down(MoveInput::Left)));
        game.apply_action(&Action::Move(MoveInputEvent::down(MoveInput::RotateCw)));
        game.tick();
        let pill = game.state().pill.unwrap();
        // moved left, then stood up on the left half
        assert_eq!(pill, [loc(a.row - 1, a.col - 1), loc(a.row, a.col - 1)]);
    }

    #[test]
    fn test_combo_scoring_is_exponential() {
        // Deliberately unusual: the combo count is an exponent, not a multiplier
        assert_eq!(reconcile_score(4, 0, 1), 20);
        assert_eq!(reconcile_score(4, 0, 2), 80);
        assert_eq!(reconcile_score(4, 1, 1), 20 + 15);
        assert_eq!(reconcile_score(0, 0, 3), 0);
    }

    #[test]
    fn test_time_bonus() {
        // 4 viruses: 4 * (320 + 36 * 3) = 1712 expected ticks
        assert_eq!(time_bonus(4, 0), 1712);
        assert_eq!(time_bonus(4, 712), 1000);
        assert_eq!(time_bonus(4, 5000), 0);
        assert_eq!(time_bonus(44, 0), 44 * 320);
    }

    #[test]
    fn test_clearing_last_virus_wins() {
        // one virus with three matching segments stacked on it
        let grid = Grid::with_playable_size(8, 16).set_many(&[
            (loc(13, 0), Cell::PillSegment(Color::Color2)),
            (loc(14, 0), Cell::PillSegment(Color::Color2)),
            (loc(15, 0), Cell::PillSegment(Color::Color2)),
            (loc(16, 0), Cell::Virus(Color::Color2)),
        ]);
        let mut game = playing_with(grid);
        game.state.mode = GameMode::Reconcile;
        let result = game.tick();
        assert_eq!(result, Some(GameTickResult::Win));
        assert_eq!(game.state().result, Some(GameResult::Win));
        let bonus = game.state().time_bonus;
        assert!(bonus > 0);
        assert_eq!(game.state().score, 20 + 15 + bonus);
    }

    #[test]
    fn test_combo_sends_garbage() {
        // two separate lines in one pass, plus a virus elsewhere to keep playing
        let mut grid = Grid::with_playable_size(8, 16).set(loc(10, 7), Cell::Virus(Color::Color3));
        for col in 0..4 {
            grid = grid.set(loc(16, col), Cell::PillSegment(Color::Color1));
            grid = grid.set(loc(15, col), Cell::PillSegment(Color::Color2));
        }
        let mut game = playing_with(grid);
        game.state.mode = GameMode::Reconcile;

        game.tick();
        assert_eq!(game.state().mode, GameMode::Destruction);
        assert_eq!(game.state().score, 8 * 5);
        assert_eq!(game.state().combo, 1);

        let results = tick_until(&mut game, GameMode::Playing, 200);
        assert_eq!(
            results,
            vec![GameTickResult::Garbage(vec![Color::Color2, Color::Color1])]
        );
        assert_eq!(game.state().combo, 0);
        assert!(game.state().line_colors.is_empty());
        assert_eq!(game.state().grid.count(|c| c != Cell::Empty), 1);
    }

    #[test]
    fn test_second_combo_pass_scores_with_exponent_two() {
        // a Color1 column clears, the Color2 segment on top falls onto three
        // Color2 viruses and clears them in the next pass
        let grid = Grid::with_playable_size(8, 16).set_many(&[
            (loc(12, 4), Cell::PillSegment(Color::Color2)),
            (loc(13, 4), Cell::PillSegment(Color::Color1)),
            (loc(14, 4), Cell::PillSegment(Color::Color1)),
            (loc(15, 4), Cell::PillSegment(Color::Color1)),
            (loc(16, 4), Cell::PillSegment(Color::Color1)),
            (loc(16, 5), Cell::Virus(Color::Color2)),
            (loc(16, 6), Cell::Virus(Color::Color2)),
            (loc(16, 7), Cell::Virus(Color::Color2)),
            (loc(10, 0), Cell::Virus(Color::Color3)),
        ]);
        let mut game = playing_with(grid);
        game.state.mode = GameMode::Reconcile;

        assert_eq!(game.tick(), None);
        assert_eq!(game.state().combo, 1);
        assert_eq!(game.state().score, 20);

        tick_until(&mut game, GameMode::Cascade, 100);
        tick_until(&mut game, GameMode::Reconcile, 200);
        assert_eq!(
            game.state().grid.get(loc(16, 4)),
            Some(Cell::PillSegment(Color::Color2))
        );

        assert_eq!(game.tick(), None);
        assert_eq!(game.state().combo, 2);
        // 4^1 * 5, then 4^2 * 5 + 3^2 * 15
        assert_eq!(game.state().score, 20 + 80 + 135);

        let results = tick_until(&mut game, GameMode::Playing, 200);
        assert_eq!(
            results,
            vec![GameTickResult::Garbage(vec![Color::Color1, Color::Color2])]
        );
        assert_eq!(game.state().grid.virus_count(), 1);
    }

    #[test]
    fn test_cascade_drops_debris_then_reconciles() {
        let grid = Grid::with_playable_size(8, 16).set_many(&[
            (loc(14, 0), Cell::PillSegment(Color::Color1)),
            (loc(16, 7), Cell::Virus(Color::Color3)),
        ]);
        let mut game = playing_with(grid);
        game.state.mode = GameMode::Cascade;

        tick_until(&mut game, GameMode::Reconcile, 100);
        // one drop every CASCADE_TICKS until the segment lands on the floor
        assert_eq!(game.state().frame, 1 + 2 * CASCADE_TICKS as u64 + 1);
        assert_eq!(game.state().grid.get(loc(16, 0)), Some(Cell::PillSegment(Color::Color1)));

        // no lines, nothing left falling: back to Playing with no garbage
        assert_eq!(game.tick(), None);
        assert_eq!(game.state().mode, GameMode::Cascade);
        assert_eq!(game.tick(), None);
        assert_eq!(game.state().mode, GameMode::Playing);
    }

    #[test]
    fn test_received_garbage_drops_before_next_pill() {
        let grid = Grid::with_playable_size(8, 16).set(loc(16, 7), Cell::Virus(Color::Color1));
        let mut game = playing_with(grid);
        game.apply_action(&Action::Garbage(vec![Color::Color2, Color::Color3]));
        game.tick();
        assert_eq!(game.state().mode, GameMode::Cascade);
        assert_eq!(game.state().pill, None);
        assert_eq!(
            game.state().grid.row(1).unwrap().iter().filter(|c| !c.is_empty()).count(),
            2
        );
        assert!(game.state().pending_garbage.is_empty());
    }

    #[test]
    fn test_defeat_and_forfeit_actions() {
        let mut game = Game::new(options());
        assert_eq!(game.apply_action(&Action::Defeat), Some(GameTickResult::Lose));
        assert_eq!(game.apply_action(&Action::ForfeitWin), None);
        assert_eq!(game.state().result, Some(GameResult::Lose));

        let mut game = Game::new(options());
        game.tick();
        assert_eq!(game.apply_action(&Action::ForfeitWin), Some(GameTickResult::Win));
    }

    #[test]
    fn test_seed_action_restarts_game() {
        let mut game = Game::new(options());
        for _ in 0..30 {
            game.tick();
        }
        game.apply_action(&Action::Seed("fresh".to_string()));
        let expected = GameState::with_seed(&options(), "fresh", 30);
        assert_eq!(game.state(), &expected);
    }

    #[test]
    fn test_determinism() {
        // Two games with the same seed and inputs stay identical
        let mut game1 = Game::new(options());
        let mut game2 = Game::new(options());
        let script = [
            (3, MoveInputEvent::down(MoveInput::Left)),
            (9, MoveInputEvent::up(MoveInput::Left)),
            (12, MoveInputEvent::down(MoveInput::RotateCw)),
            (13, MoveInputEvent::up(MoveInput::RotateCw)),
            (20, MoveInputEvent::down(MoveInput::Up)),
            (21, MoveInputEvent::up(MoveInput::Up)),
            (200, MoveInputEvent::down(MoveInput::Down)),
        ];
        for frame in 0..2000u64 {
            for (at, event) in &script {
                if *at == frame {
                    game1.apply_action(&Action::Move(*event));
                    game2.apply_action(&Action::Move(*event));
                }
            }
            assert_eq!(game1.tick(), game2.tick());
            assert_eq!(game1.state(), game2.state());
        }
        assert!(game1.state().pill_count > 1);
    }
}
