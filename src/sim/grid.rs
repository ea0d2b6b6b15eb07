//! Grid and cell model
//!
//! The grid is an immutable value. Rows are shared behind `Arc`s, so every
//! mutation clones the row table and replaces only the rows it touched.
//! Successive grids can be compared cheaply with [`Grid::ptr_eq`].

use std::sync::Arc;

/// One of the three pill/virus colors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Color {
    Color1,
    Color2,
    Color3,
}

impl Color {
    pub const ALL: [Color; 3] = [Color::Color1, Color::Color2, Color::Color3];

    /// Stable numeric code (0..=2)
    pub fn index(self) -> u8 {
        match self {
            Color::Color1 => 0,
            Color::Color2 => 1,
            Color::Color3 => 2,
        }
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }
}

/// A single grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Cell {
    #[default]
    Empty,
    /// Part of a line that was just destroyed (shown until cleared)
    Destroyed,
    Virus(Color),
    PillTop(Color),
    PillBottom(Color),
    PillLeft(Color),
    PillRight(Color),
    /// Lone rounded pill half whose partner is gone
    PillSegment(Color),
}

impl Cell {
    pub fn color(self) -> Option<Color> {
        match self {
            Cell::Empty | Cell::Destroyed => None,
            Cell::Virus(c)
            | Cell::PillTop(c)
            | Cell::PillBottom(c)
            | Cell::PillLeft(c)
            | Cell::PillRight(c)
            | Cell::PillSegment(c) => Some(c),
        }
    }

    pub fn is_empty(self) -> bool {
        self == Cell::Empty
    }

    pub fn is_virus(self) -> bool {
        matches!(self, Cell::Virus(_))
    }

    /// Top, bottom, left or right half of a two-cell pill
    pub fn is_pill_half(self) -> bool {
        matches!(
            self,
            Cell::PillTop(_) | Cell::PillBottom(_) | Cell::PillLeft(_) | Cell::PillRight(_)
        )
    }

    /// Direction of this half's partner, if it is a pill half
    pub fn partner_direction(self) -> Option<Direction> {
        match self {
            Cell::PillTop(_) => Some(Direction::Down),
            Cell::PillBottom(_) => Some(Direction::Up),
            Cell::PillLeft(_) => Some(Direction::Right),
            Cell::PillRight(_) => Some(Direction::Left),
            _ => None,
        }
    }
}

/// Movement direction on the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }
}

/// `(row, col)` position in a grid; row 0 is the hidden top row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellLocation {
    pub row: usize,
    pub col: usize,
}

impl CellLocation {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Location `distance` cells away, or `None` if it would go negative
    pub fn offset(self, direction: Direction, distance: usize) -> Option<Self> {
        let Self { row, col } = self;
        match direction {
            Direction::Up => row.checked_sub(distance).map(|row| Self { row, col }),
            Direction::Down => Some(Self {
                row: row + distance,
                col,
            }),
            Direction::Left => col.checked_sub(distance).map(|col| Self { row, col }),
            Direction::Right => Some(Self {
                row,
                col: col + distance,
            }),
        }
    }
}

/// Immutable rectangular grid of cells
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    width: usize,
    rows: Arc<Vec<Arc<Vec<Cell>>>>,
}

impl Grid {
    /// All-empty grid with `height` rows in total (including the hidden top row)
    pub fn new(height: usize, width: usize) -> Self {
        let row = Arc::new(vec![Cell::Empty; width]);
        Self {
            width,
            rows: Arc::new(vec![row; height]),
        }
    }

    /// All-empty grid for a playable area, adding the hidden top row
    pub fn with_playable_size(width: usize, playable_height: usize) -> Self {
        Self::new(playable_height + 1, width)
    }

    /// Build from explicit rows. All rows must share one width.
    pub fn from_rows(rows: Vec<Vec<Cell>>) -> Self {
        let width = rows.first().map_or(0, Vec::len);
        assert!(
            rows.iter().all(|r| r.len() == width),
            "grid rows must all have the same width"
        );
        Self {
            width,
            rows: Arc::new(rows.into_iter().map(Arc::new).collect()),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Total rows, including the hidden top row
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn row(&self, row: usize) -> Option<&[Cell]> {
        self.rows.get(row).map(|r| r.as_slice())
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.rows.iter().map(|r| r.as_slice())
    }

    pub fn column(&self, col: usize) -> Vec<Cell> {
        self.rows.iter().filter_map(|r| r.get(col).copied()).collect()
    }

    pub fn to_rows(&self) -> Vec<Vec<Cell>> {
        self.rows.iter().map(|r| r.as_ref().clone()).collect()
    }

    pub fn contains(&self, loc: CellLocation) -> bool {
        loc.row < self.height() && loc.col < self.width
    }

    /// Cell at `loc`, or `None` when out of bounds
    pub fn get(&self, loc: CellLocation) -> Option<Cell> {
        self.rows.get(loc.row).and_then(|r| r.get(loc.col)).copied()
    }

    /// New grid with `loc` set to `cell`; out of bounds returns `self` unchanged
    pub fn set(&self, loc: CellLocation, cell: Cell) -> Grid {
        self.set_many(&[(loc, cell)])
    }

    /// New grid with several cells replaced. Out-of-bounds entries are skipped
    /// and writes that change nothing return the same shared grid.
    pub fn set_many(&self, changes: &[(CellLocation, Cell)]) -> Grid {
        let changes: Vec<_> = changes
            .iter()
            .filter(|(loc, cell)| self.get(*loc).is_some_and(|cur| cur != *cell))
            .collect();
        if changes.is_empty() {
            return self.clone();
        }

        let mut rows = self.rows.as_ref().clone();
        let mut touched: Vec<usize> = changes.iter().map(|(loc, _)| loc.row).collect();
        touched.sort_unstable();
        touched.dedup();
        for &r in &touched {
            let mut row = rows[r].as_ref().clone();
            for (loc, cell) in changes.iter().filter(|(loc, _)| loc.row == r) {
                row[loc.col] = *cell;
            }
            rows[r] = Arc::new(row);
        }

        Grid {
            width: self.width,
            rows: Arc::new(rows),
        }
    }

    /// True if both grids share the same row table (no change between them)
    pub fn ptr_eq(&self, other: &Grid) -> bool {
        Arc::ptr_eq(&self.rows, &other.rows)
    }

    /// All locations in row-major order
    pub fn locations(&self) -> impl Iterator<Item = CellLocation> + '_ {
        let width = self.width;
        (0..self.height()).flat_map(move |row| (0..width).map(move |col| CellLocation { row, col }))
    }

    pub fn count(&self, pred: impl Fn(Cell) -> bool) -> usize {
        self.rows.iter().flat_map(|r| r.iter()).filter(|c| pred(**c)).count()
    }

    pub fn virus_count(&self) -> usize {
        self.count(Cell::is_virus)
    }

    /// Row-major successor of `loc`, or `None` past the last cell
    pub fn next_cell(&self, loc: CellLocation) -> Option<CellLocation> {
        if loc.col + 1 < self.width {
            Some(CellLocation::new(loc.row, loc.col + 1))
        } else if loc.row + 1 < self.height() {
            Some(CellLocation::new(loc.row + 1, 0))
        } else {
            None
        }
    }
}

/// Neighbors of a cell; `None` where the neighbor is off the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbors {
    pub up: Option<Cell>,
    pub down: Option<Cell>,
    pub left: Option<Cell>,
    pub right: Option<Cell>,
}

impl Neighbors {
    pub fn iter(&self) -> impl Iterator<Item = Cell> {
        [self.up, self.down, self.left, self.right].into_iter().flatten()
    }

    pub fn get(&self, direction: Direction) -> Option<Cell> {
        match direction {
            Direction::Up => self.up,
            Direction::Down => self.down,
            Direction::Left => self.left,
            Direction::Right => self.right,
        }
    }
}

/// Cell `distance` away from `loc` in each direction
pub fn get_cell_neighbors(grid: &Grid, loc: CellLocation, distance: usize) -> Neighbors {
    let at = |dir| loc.offset(dir, distance).and_then(|l| grid.get(l));
    Neighbors {
        up: at(Direction::Up),
        down: at(Direction::Down),
        left: at(Direction::Left),
        right: at(Direction::Right),
    }
}
