//! Tuning constants for the match engine.

use crate::Difficulty;
use thiserror::Error;

/// Largest palette the renderer and the persistence record know about.
pub const MAX_COLORS: u8 = 6;

/// Largest board edge; keeps allocation and terminal cell arithmetic bounded.
pub const MAX_BOARD_SIZE: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("palette size must be between 1 and {MAX_COLORS}, got {0}")]
    PaletteSize(u8),
    #[error("match length must be at least 2, got {0}")]
    MatchLength(usize),
    #[error("board size {size} is smaller than the match length {match_length}")]
    BoardTooSmall { size: usize, match_length: usize },
    #[error("board size must be at most {MAX_BOARD_SIZE}, got {0}")]
    BoardTooLarge(usize),
    #[error("level threshold must be positive")]
    LevelThreshold,
    #[error("cascade cap must be positive")]
    CascadeCap,
}

/// Everything the engine needs to know about the rules of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub board_size: usize,
    /// Number of gem colours in play (1..=6).
    pub palette_size: u8,
    /// Minimum run length that counts as a match.
    pub match_length: usize,
    /// Points per matched cell before the combo multiplier.
    pub base_value: u32,
    /// Extra multiplier per combo step, in percent: 50 means x1, x1.5, x2, ...
    pub combo_step_percent: u32,
    pub difficulty: Difficulty,
    /// Points lost for a swap that makes no match.
    pub penalty: u32,
    /// Score interval between level-ups.
    pub level_threshold: u32,
    /// Safety cap on cascade steps per move.
    pub max_cascade_steps: usize,
    /// Safety cap on bonus activations per cascade step.
    pub max_bonus_chain: usize,
    /// Re-rolls per cell during the initial fill.
    pub init_reroll_attempts: u32,
    /// Runs of `match_length + 1` spawn a line blast along the run instead of a bomb.
    pub line_bonuses: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::for_difficulty(Difficulty::default())
    }
}

impl EngineConfig {
    pub fn for_difficulty(difficulty: Difficulty) -> Self {
        Self {
            board_size: 8,
            palette_size: MAX_COLORS,
            match_length: 3,
            base_value: 10,
            combo_step_percent: 50,
            difficulty,
            penalty: difficulty.penalty(),
            level_threshold: difficulty.level_threshold(),
            max_cascade_steps: 50,
            max_bonus_chain: 64,
            init_reroll_attempts: 100,
            line_bonuses: false,
        }
    }

    /// Switch difficulty, resetting penalty and level threshold to its defaults.
    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self.penalty = difficulty.penalty();
        self.level_threshold = difficulty.level_threshold();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_COLORS).contains(&self.palette_size) {
            return Err(ConfigError::PaletteSize(self.palette_size));
        }
        if self.match_length < 2 {
            return Err(ConfigError::MatchLength(self.match_length));
        }
        if self.board_size < self.match_length {
            return Err(ConfigError::BoardTooSmall {
                size: self.board_size,
                match_length: self.match_length,
            });
        }
        if self.board_size > MAX_BOARD_SIZE {
            return Err(ConfigError::BoardTooLarge(self.board_size));
        }
        if self.level_threshold == 0 {
            return Err(ConfigError::LevelThreshold);
        }
        if self.max_cascade_steps == 0 {
            return Err(ConfigError::CascadeCap);
        }
        Ok(())
    }

    /// Score for `matched` cells cleared at combo step `combo` (1-based), rounded down.
    pub fn step_score(&self, matched: usize, combo: u32) -> u32 {
        let base = matched as u64 * u64::from(self.base_value);
        let percent = 100 + u64::from(self.combo_step_percent) * u64::from(combo.saturating_sub(1));
        (base * percent / 100).min(u64::from(u32::MAX)) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difficulty_defaults() {
        let easy = EngineConfig::for_difficulty(Difficulty::Easy);
        assert_eq!((easy.penalty, easy.level_threshold), (5, 500));
        let normal = EngineConfig::default();
        assert_eq!((normal.penalty, normal.level_threshold), (10, 1000));
        let hard = normal.with_difficulty(Difficulty::Hard);
        assert_eq!((hard.penalty, hard.level_threshold), (15, 1500));
    }

    #[test]
    fn combo_multiplier_steps_by_half() {
        let config = EngineConfig::default();
        assert_eq!(config.step_score(3, 1), 30);
        assert_eq!(config.step_score(3, 2), 45);
        assert_eq!(config.step_score(3, 3), 60);
        // 5 * 10 * 1.5 = 75
        assert_eq!(config.step_score(5, 2), 75);
    }

    #[test]
    fn rejects_bad_values() {
        let mut config = EngineConfig::default();
        config.palette_size = 7;
        assert_eq!(config.validate(), Err(ConfigError::PaletteSize(7)));
        let mut config = EngineConfig::default();
        config.board_size = 2;
        assert!(matches!(config.validate(), Err(ConfigError::BoardTooSmall { .. })));
        config.board_size = 1_000_000;
        assert_eq!(config.validate(), Err(ConfigError::BoardTooLarge(1_000_000)));
        config.board_size = MAX_BOARD_SIZE;
        assert!(config.validate().is_ok());
        assert!(EngineConfig::default().validate().is_ok());
    }
}
