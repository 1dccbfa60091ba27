//! Board state: an N×N grid of gems, bonus tokens and holes, with the primitive mutations
//! the cascade is built from (swap, clear, gravity, refill, initial fill).

use std::fmt;

/// Special tokens spawned by long runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BonusKind {
    /// Clears the 3×3 neighbourhood around itself.
    Bomb,
    /// Clears its whole row.
    LineHorizontal,
    /// Clears its whole column.
    LineVertical,
    /// Clears every gem of one randomly chosen colour.
    RainbowClear,
}

impl BonusKind {
    /// Strength used when two runs want to place a bonus on the same cell.
    pub fn rank(self) -> u8 {
        match self {
            Self::Bomb | Self::LineHorizontal | Self::LineVertical => 1,
            Self::RainbowClear => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Bomb => "Bomb",
            Self::LineHorizontal => "Row blast",
            Self::LineVertical => "Column blast",
            Self::RainbowClear => "Rainbow",
        }
    }
}

/// Single cell: a hole, a gem of colour 1..=6, or a bonus token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cell {
    Empty,
    Gem(u8),
    Bonus(BonusKind),
}

impl Cell {
    #[inline]
    pub fn is_empty(self) -> bool {
        self == Self::Empty
    }

    /// Colour if this cell takes part in runs.
    #[inline]
    pub fn color(self) -> Option<u8> {
        match self {
            Self::Gem(c) => Some(c),
            _ => None,
        }
    }
}

/// (row, col), 0-indexed, row 0 is the top of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// True when the Manhattan distance is exactly 1.
    pub fn is_adjacent(self, other: Self) -> bool {
        self.row.abs_diff(other.row) + self.col.abs_diff(other.col) == 1
    }

    /// Neighbour one step away, if it stays on a `size`×`size` board.
    pub fn offset(self, d_row: isize, d_col: isize, size: usize) -> Option<Self> {
        let row = self.row.checked_add_signed(d_row)?;
        let col = self.col.checked_add_signed(d_col)?;
        (row < size && col < size).then_some(Self { row, col })
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Board. rows[0] is the top row; the grid is never resized during play.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    size: usize,
    rows: Vec<Vec<Cell>>,
}

impl Grid {
    /// All-empty board.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            rows: vec![vec![Cell::Empty; size]; size],
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn contains(&self, pos: Position) -> bool {
        pos.row < self.size && pos.col < self.size
    }

    #[inline]
    pub fn get(&self, pos: Position) -> Option<Cell> {
        self.rows.get(pos.row).and_then(|row| row.get(pos.col)).copied()
    }

    #[inline]
    pub fn set(&mut self, pos: Position, cell: Cell) {
        if let Some(slot) = self.rows.get_mut(pos.row).and_then(|row| row.get_mut(pos.col)) {
            *slot = cell;
        }
    }

    /// Every position, row by row.
    pub fn positions(&self) -> impl Iterator<Item = Position> + use<> {
        let size = self.size;
        (0..size).flat_map(move |row| (0..size).map(move |col| Position { row, col }))
    }

    /// Number of non-empty cells.
    pub fn occupied(&self) -> usize {
        self.rows.iter().flatten().filter(|c| !c.is_empty()).count()
    }

    /// Exchange two cells. Out-of-bounds positions leave the grid untouched.
    pub fn swap(&mut self, a: Position, b: Position) {
        if !self.contains(a) || !self.contains(b) {
            return;
        }
        let (ca, cb) = (self.rows[a.row][a.col], self.rows[b.row][b.col]);
        self.rows[a.row][a.col] = cb;
        self.rows[b.row][b.col] = ca;
    }

    /// Turn every listed cell into a hole.
    pub fn clear<'a>(&mut self, positions: impl IntoIterator<Item = &'a Position>) {
        for &pos in positions {
            self.set(pos, Cell::Empty);
        }
    }

    /// Compact every column downward, keeping the relative order of its tokens.
    /// Returns the number of tokens that moved.
    pub fn apply_gravity(&mut self) -> usize {
        let mut moved = 0;
        for col in 0..self.size {
            let mut write = self.size;
            for row in (0..self.size).rev() {
                let cell = self.rows[row][col];
                if cell.is_empty() {
                    continue;
                }
                write -= 1;
                if write != row {
                    self.rows[write][col] = cell;
                    self.rows[row][col] = Cell::Empty;
                    moved += 1;
                }
            }
        }
        moved
    }

    /// Replace every hole with a fresh gem. Returns the refilled positions.
    pub fn fill_empties(&mut self, mut next_color: impl FnMut() -> u8) -> Vec<Position> {
        let mut filled = Vec::new();
        for pos in self.positions() {
            if self.rows[pos.row][pos.col].is_empty() {
                self.rows[pos.row][pos.col] = Cell::Gem(next_color());
                filled.push(pos);
            }
        }
        filled
    }

    /// Fill the whole board so that no cell starts inside a run, re-rolling each cell up to
    /// `max_attempts` times before accepting whatever the last roll produced.
    /// Returns how many cells had to be accepted while still matching.
    pub fn initialize_without_matches(
        &mut self,
        mut next_color: impl FnMut() -> u8,
        max_attempts: u32,
        match_length: usize,
    ) -> usize {
        let mut residual = 0;
        for pos in self.positions() {
            let mut attempts = 0;
            loop {
                self.rows[pos.row][pos.col] = Cell::Gem(next_color());
                attempts += 1;
                if !self.has_match_at(pos, match_length) {
                    break;
                }
                if attempts >= max_attempts.max(1) {
                    residual += 1;
                    break;
                }
            }
        }
        residual
    }

    /// True if the gem at `pos` sits inside a horizontal or vertical run of at least
    /// `match_length` equal colours.
    pub fn has_match_at(&self, pos: Position, match_length: usize) -> bool {
        let Some(color) = self.get(pos).and_then(Cell::color) else {
            return false;
        };
        let same = |p: Option<Position>| p.and_then(|p| self.get(p)) == Some(Cell::Gem(color));
        let run = |d_row: isize, d_col: isize| {
            let mut count = 0;
            let mut cursor = pos;
            while let Some(next) = cursor.offset(d_row, d_col, self.size) {
                if !same(Some(next)) {
                    break;
                }
                count += 1;
                cursor = next;
            }
            count
        };
        1 + run(0, -1) + run(0, 1) >= match_length || 1 + run(-1, 0) + run(1, 0) >= match_length
    }

    /// Build a board from one string per row: `1`..`6` gems, `.` hole, `B` bomb,
    /// `R` rainbow, `H`/`V` line bonuses. Whitespace is ignored.
    #[cfg(test)]
    pub fn from_ascii(rows: &[&str]) -> Self {
        let size = rows.len();
        let mut grid = Self::new(size);
        for (row, line) in rows.iter().enumerate() {
            let cells: Vec<char> = line.chars().filter(|c| !c.is_whitespace()).collect();
            assert_eq!(cells.len(), size, "row {row} is not {size} wide");
            for (col, ch) in cells.into_iter().enumerate() {
                let cell = match ch {
                    '.' => Cell::Empty,
                    'B' => Cell::Bonus(BonusKind::Bomb),
                    'R' => Cell::Bonus(BonusKind::RainbowClear),
                    'H' => Cell::Bonus(BonusKind::LineHorizontal),
                    'V' => Cell::Bonus(BonusKind::LineVertical),
                    d => Cell::Gem(d.to_digit(10).expect("gem digit") as u8),
                };
                grid.set(Position::new(row, col), cell);
            }
        }
        grid
    }
}
