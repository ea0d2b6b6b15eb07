//! Line detection, destruction and debris gravity

use std::collections::HashSet;

use super::grid::{Cell, CellLocation, Color, Direction, Grid};
use super::pill::move_cells;
use crate::consts::MIN_LINE_LENGTH;

#[derive(Debug, Clone, PartialEq)]
pub struct DestroyLinesResult {
    pub grid: Grid,
    pub has_lines: bool,
    /// Unique cells destroyed (overlapping lines count once)
    pub destroyed_count: u32,
    /// Destroyed cells that were viruses
    pub virus_count: u32,
    /// One color per line found
    pub line_colors: Vec<Color>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropResult {
    pub grid: Grid,
    /// Pre-drop locations of every cell that fell one row
    pub falling_cells: Vec<CellLocation>,
}

/// Runs of at least `min_length` same-colored cells in a row or column.
/// Cells for which `exclude(index)` holds never join a run.
pub fn find_lines_in(
    cells: &[Cell],
    min_length: usize,
    exclude: impl Fn(usize) -> bool,
) -> Vec<Vec<usize>> {
    let mut lines = Vec::new();
    let mut run: Vec<usize> = Vec::new();
    let mut run_color: Option<Color> = None;

    let mut flush = |run: &mut Vec<usize>| {
        if run.len() >= min_length {
            lines.push(std::mem::take(run));
        } else {
            run.clear();
        }
    };

    for (i, cell) in cells.iter().enumerate() {
        let color = if exclude(i) { None } else { cell.color() };
        match color {
            Some(c) if run_color == Some(c) => run.push(i),
            Some(c) => {
                flush(&mut run);
                run.push(i);
                run_color = Some(c);
            }
            None => {
                flush(&mut run);
                run_color = None;
            }
        }
    }
    flush(&mut run);
    lines
}

/// Horizontal lines (row by row) followed by vertical lines (column by column)
pub fn find_lines(grid: &Grid, exclude: &HashSet<CellLocation>) -> Vec<Vec<CellLocation>> {
    let mut lines = Vec::new();
    for (row, cells) in grid.rows().enumerate() {
        let found = find_lines_in(cells, MIN_LINE_LENGTH, |col| {
            exclude.contains(&CellLocation::new(row, col))
        });
        lines.extend(
            found
                .into_iter()
                .map(|run| run.into_iter().map(|col| CellLocation::new(row, col)).collect()),
        );
    }
    for col in 0..grid.width() {
        let cells = grid.column(col);
        let found = find_lines_in(&cells, MIN_LINE_LENGTH, |row| {
            exclude.contains(&CellLocation::new(row, col))
        });
        lines.extend(
            found
                .into_iter()
                .map(|run| run.into_iter().map(|row| CellLocation::new(row, col)).collect()),
        );
    }
    lines
}

fn has_partner(grid: &Grid, loc: CellLocation, cell: Cell) -> bool {
    let Some(dir) = cell.partner_direction() else {
        return false;
    };
    let partner = loc.offset(dir, 1).and_then(|l| grid.get(l));
    matches!(
        (cell, partner),
        (Cell::PillTop(_), Some(Cell::PillBottom(_)))
            | (Cell::PillBottom(_), Some(Cell::PillTop(_)))
            | (Cell::PillLeft(_), Some(Cell::PillRight(_)))
            | (Cell::PillRight(_), Some(Cell::PillLeft(_)))
    )
}

/// Pill halves whose partner half is missing
pub fn find_widows(grid: &Grid) -> Vec<CellLocation> {
    grid.locations()
        .filter(|&loc| {
            grid.get(loc)
                .is_some_and(|cell| cell.is_pill_half() && !has_partner(grid, loc, cell))
        })
        .collect()
}

/// Turn every widowed half into a lone segment
pub fn convert_widows(grid: &Grid) -> Grid {
    let changes: Vec<_> = find_widows(grid)
        .into_iter()
        .filter_map(|loc| {
            let color = grid.get(loc)?.color()?;
            Some((loc, Cell::PillSegment(color)))
        })
        .collect();
    grid.set_many(&changes)
}

/// Mark every line as destroyed. Cells that are still falling are left out
/// of the search, since falling pieces cannot form lines.
pub fn destroy_lines(grid: &Grid) -> DestroyLinesResult {
    let falling: HashSet<CellLocation> = drop_debris(grid).falling_cells.into_iter().collect();
    let lines = find_lines(grid, &falling);
    if lines.is_empty() {
        return DestroyLinesResult {
            grid: grid.clone(),
            has_lines: false,
            destroyed_count: 0,
            virus_count: 0,
            line_colors: Vec::new(),
        };
    }

    let line_colors = lines
        .iter()
        .filter_map(|line| line.first().and_then(|&l| grid.get(l)).and_then(Cell::color))
        .collect();

    let mut destroyed: Vec<CellLocation> = lines.into_iter().flatten().collect();
    destroyed.sort_unstable();
    destroyed.dedup();

    let virus_count = destroyed
        .iter()
        .filter(|&&loc| grid.get(loc).is_some_and(Cell::is_virus))
        .count() as u32;
    let changes: Vec<_> = destroyed.iter().map(|&loc| (loc, Cell::Destroyed)).collect();
    let grid = convert_widows(&grid.set_many(&changes));

    DestroyLinesResult {
        grid,
        has_lines: true,
        destroyed_count: destroyed.len() as u32,
        virus_count,
        line_colors,
    }
}

/// Clear all destroyed cells
pub fn remove_destroyed(grid: &Grid) -> Grid {
    let changes: Vec<_> = grid
        .locations()
        .filter(|&loc| grid.get(loc) == Some(Cell::Destroyed))
        .map(|loc| (loc, Cell::Empty))
        .collect();
    grid.set_many(&changes)
}

/// Empty the hidden top row and re-widow anything it split
pub fn clear_top_row(grid: &Grid) -> Grid {
    let changes: Vec<_> = (0..grid.width())
        .map(|col| (CellLocation::new(0, col), Cell::Empty))
        .collect();
    convert_widows(&grid.set_many(&changes))
}

/// Cells that fall together with the cell at `loc`
fn falling_unit(grid: &Grid, loc: CellLocation, cell: Cell) -> Option<Vec<CellLocation>> {
    match cell {
        Cell::PillSegment(_) => Some(vec![loc]),
        Cell::PillBottom(_) | Cell::PillLeft(_) if has_partner(grid, loc, cell) => {
            let dir = cell.partner_direction()?;
            Some(vec![loc, loc.offset(dir, 1)?])
        }
        // the other half moves with its partner
        Cell::PillTop(_) | Cell::PillRight(_) if has_partner(grid, loc, cell) => None,
        // a lone half falls like a segment
        cell if cell.is_pill_half() => Some(vec![loc]),
        _ => None,
    }
}

/// One step of gravity. Scans bottom to top so stacked debris falls together;
/// both halves of a pill fall together or not at all. Viruses never fall.
pub fn drop_debris(grid: &Grid) -> DropResult {
    let mut next = grid.clone();
    let mut falling_cells = Vec::new();

    for row in (0..grid.height().saturating_sub(1)).rev() {
        for col in 0..grid.width() {
            let loc = CellLocation::new(row, col);
            let Some(cell) = next.get(loc) else { continue };
            let Some(unit) = falling_unit(&next, loc, cell) else {
                continue;
            };
            let moved = move_cells(&next, &unit, Direction::Down);
            if moved.did_move {
                next = moved.grid;
                falling_cells.extend(unit);
            }
        }
    }

    DropResult {
        grid: next,
        falling_cells,
    }
}
