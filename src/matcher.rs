//! Run detection: rows and columns are scanned for runs of equal gem colours.

use crate::config::EngineConfig;
use crate::grid::{BonusKind, Grid, Position};
use std::collections::BTreeSet;

/// Unique matched positions of one detection pass.
pub type MatchSet = BTreeSet<Position>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// One maximal run of at least `match_length` equal colours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run {
    pub color: u8,
    pub length: usize,
    pub orientation: Orientation,
    pub start: Position,
}

impl Run {
    /// Cell at `start + length / 2` along the run; bonuses are placed here.
    pub fn center(&self) -> Position {
        self.cell(self.length / 2)
    }

    fn cell(&self, i: usize) -> Position {
        match self.orientation {
            Orientation::Horizontal => Position::new(self.start.row, self.start.col + i),
            Orientation::Vertical => Position::new(self.start.row + i, self.start.col),
        }
    }

    pub fn cells(&self) -> impl Iterator<Item = Position> + '_ {
        (0..self.length).map(|i| self.cell(i))
    }

    /// Bonus earned by this run: none at the minimum length, a bomb (or line blast) one
    /// longer, a rainbow clear beyond that.
    pub fn bonus(&self, config: &EngineConfig) -> Option<BonusKind> {
        let extra = self.length.saturating_sub(config.match_length);
        match extra {
            0 => None,
            1 if config.line_bonuses => Some(match self.orientation {
                Orientation::Horizontal => BonusKind::LineHorizontal,
                Orientation::Vertical => BonusKind::LineVertical,
            }),
            1 => Some(BonusKind::Bomb),
            _ => Some(BonusKind::RainbowClear),
        }
    }
}

/// Result of scanning the whole board.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Detection {
    pub matched: MatchSet,
    pub runs: Vec<Run>,
}

impl Detection {
    pub fn is_empty(&self) -> bool {
        self.matched.is_empty()
    }
}

/// Scan every row left to right and every column top to bottom. Holes and bonus tokens
/// break runs; a cell in both a horizontal and a vertical run is matched once but
/// belongs to two runs.
pub fn find_all_matches(grid: &Grid, match_length: usize) -> Detection {
    let size = grid.size();
    let mut detection = Detection::default();
    for orientation in [Orientation::Horizontal, Orientation::Vertical] {
        for line in 0..size {
            let at = |i: usize| match orientation {
                Orientation::Horizontal => Position::new(line, i),
                Orientation::Vertical => Position::new(i, line),
            };
            let mut i = 0;
            while i < size {
                let Some(color) = grid.get(at(i)).and_then(|c| c.color()) else {
                    i += 1;
                    continue;
                };
                let mut end = i + 1;
                while end < size && grid.get(at(end)).and_then(|c| c.color()) == Some(color) {
                    end += 1;
                }
                let length = end - i;
                if length >= match_length {
                    let run = Run {
                        color,
                        length,
                        orientation,
                        start: at(i),
                    };
                    detection.matched.extend(run.cells());
                    detection.runs.push(run);
                }
                i = end;
            }
        }
    }
    detection
}

/// First adjacent swap (row-major, right before down) that would create a run.
pub fn find_swap_hint(grid: &Grid, match_length: usize) -> Option<(Position, Position)> {
    let size = grid.size();
    let mut probe = grid.clone();
    for a in grid.positions() {
        for (d_row, d_col) in [(0, 1), (1, 0)] {
            let Some(b) = a.offset(d_row, d_col, size) else {
                continue;
            };
            let (ca, cb) = (grid.get(a), grid.get(b));
            if ca == cb || ca.is_none_or(|c| c.is_empty()) || cb.is_none_or(|c| c.is_empty()) {
                continue;
            }
            probe.swap(a, b);
            let hit = probe.has_match_at(a, match_length) || probe.has_match_at(b, match_length);
            probe.swap(a, b);
            if hit {
                return Some((a, b));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Difficulty;

    #[test]
    fn leftmost_three_match_and_nothing_else() {
        let grid = Grid::from_ascii(&["11122", "34343", "43434", "34343", "43434"]);
        let detection = find_all_matches(&grid, 3);
        let expected: MatchSet = [(0, 0), (0, 1), (0, 2)]
            .into_iter()
            .map(|(r, c)| Position::new(r, c))
            .collect();
        assert_eq!(detection.matched, expected);
        assert_eq!(detection.runs.len(), 1);
        assert_eq!(detection.runs[0].center(), Position::new(0, 1));
    }

    #[test]
    fn crossing_runs_share_a_cell() {
        let grid = Grid::from_ascii(&["34143", "43134", "11111", "34143", "43434"]);
        let detection = find_all_matches(&grid, 3);
        // row 2 (5 cells) + column 2 (4 cells) sharing (2, 2)
        assert_eq!(detection.matched.len(), 8);
        assert_eq!(detection.runs.len(), 2);
        let vertical = detection
            .runs
            .iter()
            .find(|r| r.orientation == Orientation::Vertical)
            .unwrap();
        assert_eq!(vertical.length, 4);
        assert_eq!(vertical.start, Position::new(0, 2));
        assert_eq!(vertical.center(), Position::new(2, 2));
    }

    #[test]
    fn bonus_and_holes_break_runs() {
        let grid = Grid::from_ascii(&["11B11", "22.22", "34343", "43434", "34343"]);
        assert!(find_all_matches(&grid, 3).is_empty());
    }

    #[test]
    fn run_bonus_by_length() {
        let config = crate::config::EngineConfig::for_difficulty(Difficulty::Normal);
        let run = |length| Run {
            color: 1,
            length,
            orientation: Orientation::Vertical,
            start: Position::new(0, 0),
        };
        assert_eq!(run(3).bonus(&config), None);
        assert_eq!(run(4).bonus(&config), Some(BonusKind::Bomb));
        assert_eq!(run(5).bonus(&config), Some(BonusKind::RainbowClear));
        assert_eq!(run(8).bonus(&config), Some(BonusKind::RainbowClear));
        let lines = crate::config::EngineConfig {
            line_bonuses: true,
            ..config
        };
        assert_eq!(run(4).bonus(&lines), Some(BonusKind::LineVertical));
    }

    #[test]
    fn hint_finds_a_match_making_swap() {
        let grid = Grid::from_ascii(&["11211", "34343", "43434", "34343", "43434"]);
        let (a, b) = find_swap_hint(&grid, 3).expect("hint");
        let mut probe = grid.clone();
        probe.swap(a, b);
        assert!(!find_all_matches(&probe, 3).is_empty());
    }

    #[test]
    fn no_hint_on_a_dead_board() {
        let grid = Grid::from_ascii(&["1234", "3412", "1234", "3412"]);
        assert_eq!(find_swap_hint(&grid, 3), None);
    }
}
