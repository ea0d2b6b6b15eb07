//! Seeded virus placement and garbage drops

use std::collections::HashSet;

use super::grid::{Cell, CellLocation, Color, Grid, get_cell_neighbors};
use super::pill::SPAWN_ROW;
use super::rng::seed_random_int;
use crate::consts::{MIN_VIRUS_ROW_TABLE, VIRUS_COUNT_TABLE};

/// Give up on placement after this many full restarts
const MAX_RESTARTS: u32 = 256;

/// Number of viruses placed at `level` (levels past the table use its last entry)
pub fn virus_count_for_level(level: u32) -> u32 {
    VIRUS_COUNT_TABLE[(level as usize).min(VIRUS_COUNT_TABLE.len() - 1)]
}

/// First grid row (hidden row included) that may hold a virus at `level`
pub fn min_virus_row_for_level(level: u32) -> usize {
    MIN_VIRUS_ROW_TABLE[(level as usize).min(MIN_VIRUS_ROW_TABLE.len() - 1)] + 1
}

fn pick<T: Copy>(items: &[T], seed: &str) -> T {
    items[seed_random_int(seed, 0, items.len() as i64 - 1) as usize]
}

/// Colors found two cells away from `loc` in each direction
fn nearby_colors(grid: &Grid, loc: CellLocation) -> HashSet<Color> {
    get_cell_neighbors(grid, loc, 2)
        .iter()
        .filter_map(Cell::color)
        .collect()
}

fn accepts(grid: &Grid, loc: CellLocation, color: Color, colors: &[Color]) -> bool {
    if grid.get(loc) != Some(Cell::Empty) {
        return false;
    }
    let nearby = nearby_colors(grid, loc);
    !colors.iter().all(|c| nearby.contains(c)) && !nearby.contains(&color)
}

/// One placement pass; `None` when some virus ran off the end of the grid
fn place_all(
    grid: &Grid,
    count: u32,
    min_row: usize,
    colors: &[Color],
    seed: &str,
) -> Option<Grid> {
    let mut grid = grid.clone();
    let max_row = grid.height().checked_sub(1)?;
    let max_col = grid.width().checked_sub(1)?;
    if min_row > max_row {
        return None;
    }

    for i in 0..count {
        let virus_seed = format!("{seed}:virus:{i}");
        let row = seed_random_int(&format!("{virus_seed}:row"), min_row as i64, max_row as i64);
        let col = seed_random_int(&format!("{virus_seed}:col"), 0, max_col as i64);
        let color = pick(colors, &format!("{virus_seed}:color"));

        let mut loc = CellLocation::new(row as usize, col as usize);
        while !accepts(&grid, loc, color, colors) {
            loc = grid.next_cell(loc)?;
        }
        grid = grid.set(loc, Cell::Virus(color));
    }
    Some(grid)
}

/// Place the level's viruses at seeded positions.
///
/// A candidate cell is rejected if it is occupied, if every allowed color
/// already sits two cells away, or if the virus color does; the scan then
/// moves on in row-major order. Running off the end restarts the whole
/// placement with a new seed suffix.
pub fn generate_enemies(grid: &Grid, level: u32, colors: &[Color], seed: &str) -> Grid {
    assert!(!colors.is_empty(), "generate_enemies needs at least one color");
    let count = virus_count_for_level(level);
    let min_row = min_virus_row_for_level(level);

    for restart in 0..MAX_RESTARTS {
        let attempt_seed = format!("{seed}:enemies:{restart}");
        if let Some(placed) = place_all(grid, count, min_row, colors, &attempt_seed) {
            if restart > 0 {
                log::debug!("Virus placement for level {level} needed {restart} restarts");
            }
            return placed;
        }
    }

    log::warn!("Could not place {count} viruses for level {level}; leaving grid empty");
    grid.clone()
}

/// Drop received garbage as lone segments into the spawn row, one per
/// distinct seeded column. Colors that find no free column are dropped.
pub fn place_garbage(grid: &Grid, colors: &[Color], seed: &str) -> Grid {
    let width = grid.width();
    if width == 0 {
        return grid.clone();
    }
    let mut grid = grid.clone();
    for (i, &color) in colors.iter().enumerate() {
        let start = seed_random_int(&format!("{seed}:garbage:{i}"), 0, width as i64 - 1) as usize;
        let free = (0..width)
            .map(|step| CellLocation::new(SPAWN_ROW, (start + step) % width))
            .find(|&loc| grid.get(loc) == Some(Cell::Empty));
        match free {
            Some(loc) => grid = grid.set(loc, Cell::PillSegment(color)),
            None => log::debug!("No room for garbage {color:?}"),
        }
    }
    grid
}
