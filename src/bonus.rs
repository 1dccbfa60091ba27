//! Bonus activation: bombs, line blasts and rainbow clears, chained to a fixed point.

use crate::grid::{BonusKind, Cell, Grid, Position};
use log::warn;
use rand::Rng;
use std::collections::{HashSet, VecDeque};

/// One bonus going off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detonation {
    pub kind: BonusKind,
    pub pos: Position,
    /// Colour wiped by a rainbow clear.
    pub color: Option<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BonusOutcome {
    pub detonations: Vec<Detonation>,
    /// Every cell emptied by the blasts, with what it held.
    pub cleared: Vec<(Position, Cell)>,
    /// The activation cap cut the chain short.
    pub capped: bool,
}

/// Cells hit by `kind` going off at `pos`. `color` selects the rainbow target.
pub fn blast_area(grid: &Grid, kind: BonusKind, pos: Position, color: u8) -> Vec<Position> {
    let size = grid.size();
    match kind {
        BonusKind::Bomb => {
            let mut area = Vec::with_capacity(9);
            for d_row in -1..=1 {
                for d_col in -1..=1 {
                    if let Some(p) = pos.offset(d_row, d_col, size) {
                        area.push(p);
                    }
                }
            }
            area
        }
        BonusKind::LineHorizontal => (0..size).map(|col| Position::new(pos.row, col)).collect(),
        BonusKind::LineVertical => (0..size).map(|row| Position::new(row, pos.col)).collect(),
        BonusKind::RainbowClear => {
            let mut area: Vec<Position> = grid
                .positions()
                .filter(|&p| grid.get(p) == Some(Cell::Gem(color)))
                .collect();
            area.push(pos);
            area
        }
    }
}

/// Detonate every bonus in `triggers`, then every bonus caught in those blasts, until no
/// unactivated bonus is hit or `max_chain` activations have happened.
pub fn resolve<R: Rng>(
    grid: &mut Grid,
    triggers: impl IntoIterator<Item = Position>,
    palette_size: u8,
    max_chain: usize,
    rng: &mut R,
) -> BonusOutcome {
    let mut outcome = BonusOutcome::default();
    let mut queue: VecDeque<Position> = VecDeque::new();
    let mut seen: HashSet<Position> = HashSet::new();
    for pos in triggers {
        if seen.insert(pos) {
            queue.push_back(pos);
        }
    }

    while let Some(pos) = queue.pop_front() {
        let Some(Cell::Bonus(kind)) = grid.get(pos) else {
            continue;
        };
        if outcome.detonations.len() >= max_chain {
            warn!("bonus chain stopped at {max_chain} activations");
            outcome.capped = true;
            break;
        }
        let color = (kind == BonusKind::RainbowClear).then(|| rng.random_range(1..=palette_size.max(1)));
        outcome.detonations.push(Detonation { kind, pos, color });

        // The bonus itself goes first so it is never re-queued by its own blast.
        grid.set(pos, Cell::Empty);
        outcome.cleared.push((pos, Cell::Bonus(kind)));
        for p in blast_area(grid, kind, pos, color.unwrap_or(0)) {
            match grid.get(p) {
                Some(Cell::Empty) | None => {}
                Some(Cell::Bonus(_)) => {
                    if seen.insert(p) {
                        queue.push_back(p);
                    }
                }
                Some(cell) => {
                    grid.set(p, Cell::Empty);
                    outcome.cleared.push((p, cell));
                }
            }
        }
    }
    outcome
}
