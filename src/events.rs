//! What the engine tells its collaborators: discrete game events and per-step board frames.

use crate::grid::{BonusKind, Grid, Position};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    /// Cells removed by runs in one cascade step (bonus spawn cells excluded).
    Matched(Vec<Position>),
    /// Combo reached `n` (only sent from 2 upward).
    ComboReached(u32),
    BonusSpawned { kind: BonusKind, pos: Position },
    BonusActivated { kind: BonusKind, pos: Position },
    /// A no-match swap cost this many points.
    Penalty(u32),
    LevelUp(u32),
    AchievementUnlocked(&'static str),
    DailyChallengeCompleted,
    /// No swap can make a match and the score cannot pay for another try.
    GameOver,
}

/// Which discrete step produced a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPhase {
    Swapped,
    SwapReverted,
    Cleared,
    BonusesResolved,
    Settled,
    Refilled,
}

/// Board snapshot after one step, for paced playback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFrame {
    pub phase: StepPhase,
    pub grid: Grid,
    /// Cells worth highlighting in this frame (cleared, blasted or refilled).
    pub highlight: Vec<Position>,
}

/// Called after every discrete mutation of a move. Implementors may record the board to
/// replay it at their own pace; the engine itself never waits.
pub trait StepObserver {
    fn on_step(&mut self, phase: StepPhase, grid: &Grid, highlight: &[Position]);
}

impl StepObserver for () {
    fn on_step(&mut self, _phase: StepPhase, _grid: &Grid, _highlight: &[Position]) {}
}

impl StepObserver for Vec<StepFrame> {
    fn on_step(&mut self, phase: StepPhase, grid: &Grid, highlight: &[Position]) {
        self.push(StepFrame {
            phase,
            grid: grid.clone(),
            highlight: highlight.to_vec(),
        });
    }
}
