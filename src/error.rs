//! Why a proposed swap did not go through.

use crate::grid::Position;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MoveError {
    #[error("{0} is off the board")]
    OutOfBounds(Position),
    #[error("{0} and {1} are not neighbours")]
    NotAdjacent(Position, Position),
    #[error("{0} is empty")]
    EmptyCell(Position),
    /// A move is still being resolved (or played back); the request is dropped.
    #[error("a move is already in progress")]
    Busy,
    #[error("no match, and {score} points cannot cover the {penalty} point penalty")]
    InsufficientScore { score: u32, penalty: u32 },
    #[error("the game is over")]
    GameOver,
    /// The cascade hit its step cap. The board keeps its last complete state.
    #[error("cascade did not settle within {steps} steps")]
    CascadeOverrun { steps: usize, score_delta: u32 },
}

impl MoveError {
    /// Engine faults, as opposed to rejections the player caused.
    pub fn is_fault(&self) -> bool {
        matches!(self, Self::CascadeOverrun { .. })
    }

    /// Rejections that are deliberately not shown to the player.
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::Busy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_overrun_is_a_fault() {
        assert!(MoveError::CascadeOverrun { steps: 50, score_delta: 0 }.is_fault());
        assert!(!MoveError::Busy.is_fault());
        assert!(MoveError::Busy.is_silent());
        assert!(!MoveError::InsufficientScore { score: 0, penalty: 10 }.is_silent());
    }

    #[test]
    fn messages_name_the_cells() {
        let err = MoveError::NotAdjacent(Position::new(0, 0), Position::new(2, 2));
        assert_eq!(err.to_string(), "(0, 0) and (2, 2) are not neighbours");
    }
}
