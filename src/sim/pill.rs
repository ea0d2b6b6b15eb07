//! Pill spawning, movement and rotation
//!
//! Pure functions over [`Grid`]. A failed move or rotation is not an error:
//! it returns the input grid with `did_move == false`.

use super::grid::{Cell, CellLocation, Color, Direction, Grid};

/// Locations of the active pill: `[top, bottom]` when vertical,
/// `[left, right]` when horizontal
pub type PillLocation = [CellLocation; 2];

/// Colors of the two pill halves, in spawn order (left, right)
pub type PillColors = [Color; 2];

/// Row the pill spawns on (row 0 is the hidden top row)
pub const SPAWN_ROW: usize = 1;

/// Rotation direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rotation {
    Clockwise,
    CounterClockwise,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GivePillResult {
    pub grid: Grid,
    pub pill: Option<PillLocation>,
    pub did_give: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MoveResult {
    pub grid: Grid,
    /// Locations after the move, in input order
    pub cells: Vec<CellLocation>,
    pub did_move: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MovePillResult {
    pub grid: Grid,
    pub pill: PillLocation,
    pub did_move: bool,
}

/// Spawn locations for a grid of the given width
pub fn spawn_location(width: usize) -> PillLocation {
    let left = (width / 2).saturating_sub(1);
    [
        CellLocation::new(SPAWN_ROW, left),
        CellLocation::new(SPAWN_ROW, left + 1),
    ]
}

/// Place a new horizontal pill at the top center. Fails (grid unchanged) if
/// either spawn cell is occupied.
pub fn give_pill(grid: &Grid, colors: PillColors) -> GivePillResult {
    let pill = spawn_location(grid.width());
    let free = pill.iter().all(|&loc| grid.get(loc) == Some(Cell::Empty));
    if !free {
        return GivePillResult {
            grid: grid.clone(),
            pill: None,
            did_give: false,
        };
    }

    let grid = grid.set_many(&[
        (pill[0], Cell::PillLeft(colors[0])),
        (pill[1], Cell::PillRight(colors[1])),
    ]);
    GivePillResult {
        grid,
        pill: Some(pill),
        did_give: true,
    }
}

/// Move one cell a single step
pub fn move_cell(grid: &Grid, cell: CellLocation, direction: Direction) -> MoveResult {
    move_cells(grid, &[cell], direction)
}

/// Move a group of cells one step, all or nothing. A destination must be in
/// bounds and either empty or vacated by another member of the group.
pub fn move_cells(grid: &Grid, cells: &[CellLocation], direction: Direction) -> MoveResult {
    let unchanged = || MoveResult {
        grid: grid.clone(),
        cells: cells.to_vec(),
        did_move: false,
    };

    let mut targets = Vec::with_capacity(cells.len());
    for &cell in cells {
        let Some(target) = cell.offset(direction, 1) else {
            return unchanged();
        };
        match grid.get(target) {
            Some(Cell::Empty) => {}
            Some(_) if cells.contains(&target) => {}
            _ => return unchanged(),
        }
        targets.push(target);
    }

    // Furthest along the direction of travel goes first so nothing is overwritten
    let mut order: Vec<usize> = (0..cells.len()).collect();
    order.sort_by_key(|&i| {
        let CellLocation { row, col } = cells[i];
        match direction {
            Direction::Down => usize::MAX - row,
            Direction::Up => row,
            Direction::Right => usize::MAX - col,
            Direction::Left => col,
        }
    });

    let mut next = grid.clone();
    for i in order {
        let value = next.get(cells[i]).unwrap_or_default();
        next = next.set_many(&[(targets[i], value), (cells[i], Cell::Empty)]);
    }

    MoveResult {
        grid: next,
        cells: targets,
        did_move: true,
    }
}

pub fn move_pill(grid: &Grid, pill: PillLocation, direction: Direction) -> MovePillResult {
    let moved = move_cells(grid, &pill, direction);
    MovePillResult {
        grid: moved.grid,
        pill: [moved.cells[0], moved.cells[1]],
        did_move: moved.did_move,
    }
}

/// Drop the pill until it is blocked. `did_move` is true if it fell at all.
pub fn slam_pill(grid: &Grid, pill: PillLocation) -> MovePillResult {
    let mut result = MovePillResult {
        grid: grid.clone(),
        pill,
        did_move: false,
    };
    loop {
        let step = move_pill(&result.grid, result.pill, Direction::Down);
        if !step.did_move {
            return result;
        }
        result = MovePillResult {
            did_move: true,
            ..step
        };
    }
}

/// Rotate the pill a quarter turn.
///
/// Vertical to horizontal pivots on the bottom half: it tries the cell to the
/// right first, then kicks one cell left. Horizontal to vertical pivots on the
/// left half and needs the cell above it free. The rotation direction only
/// decides which half lands where.
pub fn rotate_pill(grid: &Grid, pill: PillLocation, rotation: Rotation) -> MovePillResult {
    let unchanged = MovePillResult {
        grid: grid.clone(),
        pill,
        did_move: false,
    };
    let (Some(first), Some(second)) = (grid.get(pill[0]), grid.get(pill[1])) else {
        return unchanged;
    };
    let (Some(a), Some(b)) = (first.color(), second.color()) else {
        return unchanged;
    };

    match (first, second) {
        (Cell::PillTop(_), Cell::PillBottom(_)) => {
            let [top, bottom] = pill;
            let is_free = |loc: Option<CellLocation>| {
                loc.filter(|&l| grid.get(l) == Some(Cell::Empty))
            };
            let (left, right) = if let Some(right) = is_free(bottom.offset(Direction::Right, 1)) {
                (bottom, right)
            } else if let Some(left) = is_free(bottom.offset(Direction::Left, 1)) {
                (left, bottom)
            } else {
                return unchanged;
            };
            let (left_color, right_color) = match rotation {
                Rotation::Clockwise => (b, a),
                Rotation::CounterClockwise => (a, b),
            };
            let grid = grid.set_many(&[
                (top, Cell::Empty),
                (bottom, Cell::Empty),
                (left, Cell::PillLeft(left_color)),
                (right, Cell::PillRight(right_color)),
            ]);
            MovePillResult {
                grid,
                pill: [left, right],
                did_move: true,
            }
        }
        (Cell::PillLeft(_), Cell::PillRight(_)) => {
            let [left, right] = pill;
            let Some(above) = left.offset(Direction::Up, 1) else {
                return unchanged;
            };
            if grid.get(above) != Some(Cell::Empty) {
                return unchanged;
            }
            let (top_color, bottom_color) = match rotation {
                Rotation::Clockwise => (a, b),
                Rotation::CounterClockwise => (b, a),
            };
            let grid = grid.set_many(&[
                (right, Cell::Empty),
                (above, Cell::PillTop(top_color)),
                (left, Cell::PillBottom(bottom_color)),
            ]);
            MovePillResult {
                grid,
                pill: [above, left],
                did_move: true,
            }
        }
        _ => unchanged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Color::*;

    fn loc(row: usize, col: usize) -> CellLocation {
        CellLocation::new(row, col)
    }

    #[test]
    fn test_give_pill_centered() {
        let grid = Grid::with_playable_size(8, 16);
        let result = give_pill(&grid, [Color1, Color3]);
        assert!(result.did_give);
        assert_eq!(result.pill, Some([loc(1, 3), loc(1, 4)]));
        assert_eq!(result.grid.get(loc(1, 3)), Some(Cell::PillLeft(Color1)));
        assert_eq!(result.grid.get(loc(1, 4)), Some(Cell::PillRight(Color3)));
    }

    #[test]
    fn test_give_pill_blocked() {
        for blocked in [loc(1, 3), loc(1, 4)] {
            let grid = Grid::with_playable_size(8, 16).set(blocked, Cell::Virus(Color2));
            let result = give_pill(&grid, [Color1, Color1]);
            assert!(!result.did_give);
            assert_eq!(result.pill, None);
            assert!(result.grid.ptr_eq(&grid));
        }
    }

    #[test]
    fn test_move_pill_is_atomic() {
        // right half is blocked below, so the whole pill stays put
        let grid = Grid::new(4, 4)
            .set_many(&[
                (loc(1, 1), Cell::PillLeft(Color1)),
                (loc(1, 2), Cell::PillRight(Color2)),
                (loc(2, 2), Cell::Virus(Color3)),
            ]);
        let result = move_pill(&grid, [loc(1, 1), loc(1, 2)], Direction::Down);
        assert!(!result.did_move);
        assert_eq!(result.grid, grid);
        assert_eq!(result.pill, [loc(1, 1), loc(1, 2)]);
    }

    #[test]
    fn test_move_pill_sideways_into_itself() {
        let grid = Grid::new(3, 4).set_many(&[
            (loc(1, 1), Cell::PillLeft(Color1)),
            (loc(1, 2), Cell::PillRight(Color2)),
        ]);
        let result = move_pill(&grid, [loc(1, 1), loc(1, 2)], Direction::Right);
        assert!(result.did_move);
        assert_eq!(result.pill, [loc(1, 2), loc(1, 3)]);
        assert_eq!(result.grid.get(loc(1, 1)), Some(Cell::Empty));
        assert_eq!(result.grid.get(loc(1, 2)), Some(Cell::PillLeft(Color1)));
        assert_eq!(result.grid.get(loc(1, 3)), Some(Cell::PillRight(Color2)));

        let left = move_pill(&result.grid, result.pill, Direction::Left);
        assert_eq!(left.grid, grid);
    }

    #[test]
    fn test_move_out_of_bounds_fails() {
        let grid = Grid::new(3, 3).set(loc(2, 0), Cell::PillSegment(Color1));
        assert!(!move_cell(&grid, loc(2, 0), Direction::Down).did_move);
        assert!(!move_cell(&grid, loc(2, 0), Direction::Left).did_move);
        assert!(move_cell(&grid, loc(2, 0), Direction::Up).did_move);
    }

    #[test]
    fn test_slam_pill() {
        let grid = give_pill(&Grid::with_playable_size(8, 16), [Color1, Color2]).grid;
        let result = slam_pill(&grid, [loc(1, 3), loc(1, 4)]);
        assert!(result.did_move);
        assert_eq!(result.pill, [loc(16, 3), loc(16, 4)]);

        let again = slam_pill(&result.grid, result.pill);
        assert!(!again.did_move);
        assert!(again.grid.ptr_eq(&result.grid));
    }

    #[test]
    fn test_rotate_horizontal_to_vertical() {
        let grid = Grid::new(4, 4).set_many(&[
            (loc(2, 1), Cell::PillLeft(Color1)),
            (loc(2, 2), Cell::PillRight(Color2)),
        ]);
        let pill = [loc(2, 1), loc(2, 2)];

        let cw = rotate_pill(&grid, pill, Rotation::Clockwise);
        assert!(cw.did_move);
        assert_eq!(cw.pill, [loc(1, 1), loc(2, 1)]);
        assert_eq!(cw.grid.get(loc(1, 1)), Some(Cell::PillTop(Color1)));
        assert_eq!(cw.grid.get(loc(2, 1)), Some(Cell::PillBottom(Color2)));
        assert_eq!(cw.grid.get(loc(2, 2)), Some(Cell::Empty));

        let ccw = rotate_pill(&grid, pill, Rotation::CounterClockwise);
        assert_eq!(ccw.grid.get(loc(1, 1)), Some(Cell::PillTop(Color2)));
        assert_eq!(ccw.grid.get(loc(2, 1)), Some(Cell::PillBottom(Color1)));
    }

    #[test]
    fn test_rotate_blocked_above() {
        let pill = [loc(2, 1), loc(2, 2)];
        let grid = Grid::new(4, 4).set_many(&[
            (pill[0], Cell::PillLeft(Color1)),
            (pill[1], Cell::PillRight(Color2)),
            (loc(1, 1), Cell::Virus(Color3)),
        ]);
        for rotation in [Rotation::Clockwise, Rotation::CounterClockwise] {
            assert!(!rotate_pill(&grid, pill, rotation).did_move);
        }

        // top boundary: nothing above row 0
        let top = [loc(0, 1), loc(0, 2)];
        let grid = Grid::new(4, 4).set_many(&[
            (top[0], Cell::PillLeft(Color1)),
            (top[1], Cell::PillRight(Color2)),
        ]);
        assert!(!rotate_pill(&grid, top, Rotation::Clockwise).did_move);
    }

    #[test]
    fn test_rotate_vertical_wall_kick() {
        // against the right wall: kicks left
        let pill = [loc(1, 3), loc(2, 3)];
        let grid = Grid::new(4, 4).set_many(&[
            (pill[0], Cell::PillTop(Color1)),
            (pill[1], Cell::PillBottom(Color2)),
        ]);
        let result = rotate_pill(&grid, pill, Rotation::CounterClockwise);
        assert!(result.did_move);
        assert_eq!(result.pill, [loc(2, 2), loc(2, 3)]);
        assert_eq!(result.grid.get(loc(2, 2)), Some(Cell::PillLeft(Color1)));
        assert_eq!(result.grid.get(loc(2, 3)), Some(Cell::PillRight(Color2)));
        assert_eq!(result.grid.get(loc(1, 3)), Some(Cell::Empty));

        // boxed in on both sides: fails
        let boxed = grid.set(loc(2, 2), Cell::Virus(Color3));
        assert!(!rotate_pill(&boxed, pill, Rotation::Clockwise).did_move);
    }

    #[test]
    fn test_rotate_full_turn_restores_grid() {
        let pill = [loc(2, 1), loc(2, 2)];
        let grid = Grid::new(4, 4).set_many(&[
            (pill[0], Cell::PillLeft(Color1)),
            (pill[1], Cell::PillRight(Color2)),
        ]);
        let mut current = MovePillResult {
            grid: grid.clone(),
            pill,
            did_move: false,
        };
        for _ in 0..4 {
            current = rotate_pill(&current.grid, current.pill, Rotation::Clockwise);
            assert!(current.did_move);
        }
        assert_eq!(current.grid, grid);
        assert_eq!(current.pill, pill);
    }
}
