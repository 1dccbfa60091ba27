//! One game session: owns the board, score and record, and gates the player's swaps.

use crate::cascade::{CascadeReport, resolve_cascade};
use crate::config::{ConfigError, EngineConfig};
use crate::error::MoveError;
use crate::events::{GameEvent, StepFrame, StepObserver, StepPhase};
use crate::grid::{Cell, Grid, Position};
use crate::matcher::{find_all_matches, find_swap_hint};
use crate::progress::Progress;
use log::{debug, info, warn};
use rand::Rng;
use rand::rngs::StdRng;
use std::collections::VecDeque;

/// Rounds of re-rolling leftover runs after the initial fill.
const INIT_REPAIR_ROUNDS: usize = 8;

/// How an accepted swap ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The swap made matches; the cascade ran to a stable board.
    Accepted(CascadeReport),
    /// No match, but the score paid for it; the swap stays.
    Penalized { penalty: u32 },
}

pub struct GameSession {
    config: EngineConfig,
    grid: Grid,
    rng: StdRng,
    score: u32,
    moves: u32,
    /// Peak combo of the last move; back to 0 when a new swap starts.
    combo: u32,
    level: u32,
    /// Set while a move is resolving or its frames are still being played back.
    processing: bool,
    pacing: bool,
    frames: VecDeque<StepFrame>,
    events: Vec<GameEvent>,
    progress: Progress,
    game_over: bool,
    today: u64,
}

impl GameSession {
    pub fn new(
        config: EngineConfig,
        mut progress: Progress,
        mut rng: StdRng,
        today: u64,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        progress.difficulty = config.difficulty;
        progress.ensure_daily(today, config.palette_size, &mut rng);
        let grid = seed_grid(&config, &mut rng);
        info!(
            "new {}x{} session, {} colours, difficulty {:?}",
            config.board_size, config.board_size, config.palette_size, config.difficulty
        );
        let mut session = Self {
            config,
            grid,
            rng,
            score: 0,
            moves: 0,
            combo: 0,
            level: 1,
            processing: false,
            pacing: false,
            frames: VecDeque::new(),
            events: Vec::new(),
            progress,
            game_over: false,
            today,
        };
        session.check_game_over();
        Ok(session)
    }

    /// Record step frames and hold the processing flag until they are played back.
    pub fn set_pacing(&mut self, pacing: bool) {
        self.pacing = pacing;
        if !pacing {
            self.frames.clear();
            self.processing = false;
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Live board.
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Board the player should see: the frame being played back, or the live board.
    pub fn display_grid(&self) -> &Grid {
        self.frames.front().map_or(&self.grid, |f| &f.grid)
    }

    pub fn current_frame(&self) -> Option<&StepFrame> {
        self.frames.front()
    }

    /// Drop the frame on screen. Returns true while more frames are queued; the last one
    /// releases the processing flag.
    pub fn advance_frame(&mut self) -> bool {
        self.frames.pop_front();
        if self.frames.is_empty() {
            self.processing = false;
            return false;
        }
        true
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn moves(&self) -> u32 {
        self.moves
    }

    pub fn combo(&self) -> u32 {
        self.combo
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    pub fn penalty(&self) -> u32 {
        self.config.penalty
    }

    pub fn hint(&self) -> Option<(Position, Position)> {
        find_swap_hint(&self.grid, self.config.match_length)
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Try to swap two neighbouring cells.
    ///
    /// Invalid requests are rejected without touching anything. A swap that makes no
    /// match either costs the penalty or, when the score cannot cover it, is undone.
    pub fn propose_swap(&mut self, a: Position, b: Position) -> Result<MoveOutcome, MoveError> {
        if self.processing {
            return Err(MoveError::Busy);
        }
        if self.game_over {
            return Err(MoveError::GameOver);
        }
        for pos in [a, b] {
            match self.grid.get(pos) {
                None => return Err(MoveError::OutOfBounds(pos)),
                Some(Cell::Empty) => return Err(MoveError::EmptyCell(pos)),
                Some(_) => {}
            }
        }
        if !a.is_adjacent(b) {
            return Err(MoveError::NotAdjacent(a, b));
        }

        self.processing = true;
        self.combo = 0;
        let mut recorded: Vec<StepFrame> = Vec::new();
        let mut ignore = ();
        let observer: &mut dyn StepObserver = if self.pacing { &mut recorded } else { &mut ignore };

        self.grid.swap(a, b);
        observer.on_step(StepPhase::Swapped, &self.grid, &[a, b]);
        let detection = find_all_matches(&self.grid, self.config.match_length);

        let result = if detection.is_empty() {
            let penalty = self.config.penalty;
            if self.score >= penalty {
                self.score -= penalty;
                self.events.push(GameEvent::Penalty(penalty));
                debug!("swap {a} <-> {b}: no match, -{penalty}");
                Ok(MoveOutcome::Penalized { penalty })
            } else {
                self.grid.swap(a, b);
                observer.on_step(StepPhase::SwapReverted, &self.grid, &[a, b]);
                debug!("swap {a} <-> {b}: no match, reverted at score {}", self.score);
                Err(MoveError::InsufficientScore {
                    score: self.score,
                    penalty,
                })
            }
        } else {
            self.moves += 1;
            match resolve_cascade(&mut self.grid, detection, &self.config, &mut self.rng, observer) {
                Ok(report) => {
                    self.apply_report(&report);
                    debug!(
                        "swap {a} <-> {b}: {} steps, {} cleared, +{}",
                        report.steps.len(),
                        report.cells_cleared,
                        report.score_delta
                    );
                    Ok(MoveOutcome::Accepted(report))
                }
                Err(overrun) => {
                    warn!("swap {a} <-> {b}: {overrun}");
                    self.apply_report(&overrun.report);
                    Err(MoveError::CascadeOverrun {
                        steps: overrun.steps,
                        score_delta: overrun.report.score_delta,
                    })
                }
            }
        };

        self.finish_move();
        self.frames.extend(recorded);
        self.processing = self.pacing && !self.frames.is_empty();
        result
    }

    /// Fold the finished game into the record and deal a fresh board.
    pub fn restart(&mut self) {
        self.record_finished_game();
        self.new_board();
    }

    /// Switch to new rules (e.g. another difficulty) on a fresh board. A game with moves
    /// on it counts as finished.
    pub fn reconfigure(&mut self, config: EngineConfig) -> Result<(), ConfigError> {
        config.validate()?;
        if self.moves > 0 {
            self.record_finished_game();
        }
        info!("switching to difficulty {:?}", config.difficulty);
        self.progress.difficulty = config.difficulty;
        self.config = config;
        self.new_board();
        Ok(())
    }

    fn record_finished_game(&mut self) {
        self.progress.games_played += 1;
        self.progress.high_score = self.progress.high_score.max(self.score);
        self.progress.best_combo = self.progress.best_combo.max(self.combo);
        self.unlock_achievements();
        info!(
            "game {} over: {} points in {} moves",
            self.progress.games_played, self.score, self.moves
        );
    }

    fn new_board(&mut self) {
        self.progress
            .ensure_daily(self.today, self.config.palette_size, &mut self.rng);
        self.grid = seed_grid(&self.config, &mut self.rng);
        self.score = 0;
        self.moves = 0;
        self.combo = 0;
        self.level = 1;
        self.processing = false;
        self.frames.clear();
        self.game_over = false;
        self.check_game_over();
    }

    fn apply_report(&mut self, report: &CascadeReport) {
        self.score = self.score.saturating_add(report.score_delta);
        self.combo = report.peak_combo;
        for step in &report.steps {
            self.progress.total_matches += (step.matched.len() + step.spawned.len()) as u64;
            self.events.push(GameEvent::Matched(step.matched.clone()));
            for &(kind, pos) in &step.spawned {
                self.events.push(GameEvent::BonusSpawned { kind, pos });
            }
            for d in &step.detonations {
                if let Some(color) = d.color {
                    debug!("rainbow at {} wiped colour {color}", d.pos);
                }
                self.events.push(GameEvent::BonusActivated {
                    kind: d.kind,
                    pos: d.pos,
                });
            }
            if step.combo >= 2 {
                self.events.push(GameEvent::ComboReached(step.combo));
            }
            if self.progress.record_daily(&step.cleared_colors) {
                self.events.push(GameEvent::DailyChallengeCompleted);
            }
        }
    }

    fn finish_move(&mut self) {
        let reached = 1 + self.score / self.config.level_threshold;
        if reached > self.level {
            self.level = reached;
            self.events.push(GameEvent::LevelUp(reached));
        }
        self.progress.high_score = self.progress.high_score.max(self.score);
        self.progress.best_combo = self.progress.best_combo.max(self.combo);
        self.unlock_achievements();
        self.check_game_over();
    }

    fn unlock_achievements(&mut self) {
        for id in self.progress.unlock_achievements() {
            info!("achievement unlocked: {id}");
            self.events.push(GameEvent::AchievementUnlocked(id));
        }
    }

    /// Over when no swap can match and a miss cannot be paid for.
    fn check_game_over(&mut self) {
        if self.game_over || self.score >= self.config.penalty || self.hint().is_some() {
            return;
        }
        info!("no moves left at {} points", self.score);
        self.game_over = true;
        self.events.push(GameEvent::GameOver);
    }
}

/// Fill a board with no starting runs; leftovers from the bounded re-roll are re-rolled
/// again for a few rounds before being accepted.
fn seed_grid(config: &EngineConfig, rng: &mut impl Rng) -> Grid {
    let palette = config.palette_size;
    let mut grid = Grid::new(config.board_size);
    grid.initialize_without_matches(
        || rng.random_range(1..=palette),
        config.init_reroll_attempts,
        config.match_length,
    );
    for _ in 0..INIT_REPAIR_ROUNDS {
        let leftover = find_all_matches(&grid, config.match_length);
        if leftover.is_empty() {
            return grid;
        }
        for &pos in &leftover.matched {
            for _ in 0..config.init_reroll_attempts.max(1) {
                grid.set(pos, Cell::Gem(rng.random_range(1..=palette)));
                if !grid.has_match_at(pos, config.match_length) {
                    break;
                }
            }
        }
    }
    if !find_all_matches(&grid, config.match_length).is_empty() {
        warn!("starting board still has runs after re-rolling");
    }
    grid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Difficulty;
    use crate::grid::BonusKind;
    use rand::SeedableRng;

    fn session_with(config: EngineConfig, rows: &[&str]) -> GameSession {
        let mut session =
            GameSession::new(config, Progress::default(), StdRng::seed_from_u64(42), 1).unwrap();
        session.grid = Grid::from_ascii(rows);
        session.game_over = false;
        session.drain_events();
        session
    }

    const QUIET: [&str; 8] = [
        "23232323", "46464646", "23232323", "46464646", "23232323", "46464646", "23232323",
        "46464646",
    ];

    /// QUIET has no match-making swap at all; this one has exactly one, in the bottom rows.
    const LIVE: [&str; 8] = [
        "23232323", "46464646", "23232323", "46464646", "23232323", "46464646", "23132323",
        "11646464",
    ];

    fn p(row: usize, col: usize) -> Position {
        Position::new(row, col)
    }

    #[test]
    fn fresh_session_has_a_clean_board() {
        let session =
            GameSession::new(EngineConfig::default(), Progress::default(), StdRng::seed_from_u64(3), 9)
                .unwrap();
        assert!(find_all_matches(session.grid(), 3).is_empty());
        assert_eq!(session.grid().occupied(), 64);
        assert_eq!(session.progress().daily.as_ref().map(|d| d.day), Some(9));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = EngineConfig {
            palette_size: 0,
            ..EngineConfig::default()
        };
        assert!(GameSession::new(config, Progress::default(), StdRng::seed_from_u64(1), 0).is_err());
    }

    #[test]
    fn invalid_swaps_change_nothing() {
        let mut rows = QUIET;
        rows[0] = "2.232323";
        let mut session = session_with(EngineConfig::default(), &rows);
        session.score = 50;
        let before = session.grid.clone();
        assert_eq!(session.propose_swap(p(0, 0), p(2, 0)), Err(MoveError::NotAdjacent(p(0, 0), p(2, 0))));
        assert_eq!(session.propose_swap(p(0, 0), p(1, 1)), Err(MoveError::NotAdjacent(p(0, 0), p(1, 1))));
        assert_eq!(session.propose_swap(p(7, 7), p(7, 8)), Err(MoveError::OutOfBounds(p(7, 8))));
        assert_eq!(session.propose_swap(p(0, 0), p(0, 1)), Err(MoveError::EmptyCell(p(0, 1))));
        assert_eq!(session.grid, before);
        assert_eq!(session.score, 50);
        assert!(!session.is_processing());
    }

    #[test]
    fn unpaid_miss_is_reverted() {
        let mut session = session_with(EngineConfig::default(), &QUIET);
        let before = session.grid.clone();
        let err = session.propose_swap(p(0, 0), p(0, 1)).unwrap_err();
        assert_eq!(err, MoveError::InsufficientScore { score: 0, penalty: 10 });
        assert_eq!(session.grid, before);
        assert!(!session.is_processing());
    }

    #[test]
    fn score_never_goes_negative() {
        let mut session = session_with(EngineConfig::default(), &LIVE);
        session.score = 25;
        let swap = (p(3, 3), p(3, 4));
        assert_eq!(session.propose_swap(swap.0, swap.1), Ok(MoveOutcome::Penalized { penalty: 10 }));
        assert_eq!(session.score(), 15);
        assert_eq!(session.propose_swap(swap.0, swap.1), Ok(MoveOutcome::Penalized { penalty: 10 }));
        assert_eq!(session.score(), 5);
        let before = session.grid.clone();
        assert!(matches!(
            session.propose_swap(swap.0, swap.1),
            Err(MoveError::InsufficientScore { score: 5, .. })
        ));
        assert_eq!(session.score(), 5);
        assert_eq!(session.grid, before);
        assert!(session.drain_events().contains(&GameEvent::Penalty(10)));
    }

    #[test]
    fn five_in_a_row_spawns_a_rainbow() {
        let mut rows = QUIET;
        rows[2] = "23132323";
        rows[3] = "11511646";
        let mut session = session_with(EngineConfig::default(), &rows);
        let outcome = session.propose_swap(p(2, 2), p(3, 2)).unwrap();
        let MoveOutcome::Accepted(report) = outcome else {
            panic!("expected matches");
        };
        let first = &report.steps[0];
        assert_eq!(first.combo, 1);
        assert_eq!(first.spawned, vec![(BonusKind::RainbowClear, p(3, 2))]);
        assert_eq!(first.matched, vec![p(3, 0), p(3, 1), p(3, 3), p(3, 4)]);
        let events = session.drain_events();
        assert_eq!(events[0], GameEvent::Matched(vec![p(3, 0), p(3, 1), p(3, 3), p(3, 4)]));
        assert!(events.contains(&GameEvent::BonusSpawned {
            kind: BonusKind::RainbowClear,
            pos: p(3, 2)
        }));
        assert!(session.combo() >= 1);
        assert_eq!(session.moves(), 1);
        assert_eq!(session.score(), report.score_delta);
        assert!(session.score() >= 50);
    }

    #[test]
    fn combo_resets_on_each_new_swap() {
        let mut rows = QUIET;
        rows[1] = "46164646";
        rows[2] = "11323232";
        let mut session = session_with(EngineConfig::default(), &rows);
        let MoveOutcome::Accepted(report) = session.propose_swap(p(1, 2), p(2, 2)).unwrap() else {
            panic!("expected matches");
        };
        assert_eq!(session.combo(), report.peak_combo);
        assert!(session.combo() >= 1);
        session.grid = Grid::from_ascii(&LIVE);
        session.score = 100;
        assert_eq!(
            session.propose_swap(p(4, 4), p(4, 5)),
            Ok(MoveOutcome::Penalized { penalty: 10 })
        );
        assert_eq!(session.combo(), 0);
    }

    #[test]
    fn crossing_the_threshold_levels_up() {
        let mut rows = QUIET;
        rows[7] = "11146464";
        let config = EngineConfig::for_difficulty(Difficulty::Easy);
        let mut session = session_with(config, &rows);
        session.score = 490;
        let before = session.grid.clone();
        // Swapping two cells of the run keeps it intact.
        session.propose_swap(p(7, 0), p(7, 1)).unwrap();
        assert_ne!(session.grid, before);
        assert!(session.score() >= 520);
        assert_eq!(session.level(), 2);
        assert!(session.drain_events().contains(&GameEvent::LevelUp(2)));
    }

    #[test]
    fn busy_while_frames_play_back() {
        let mut rows = QUIET;
        rows[7] = "11146464";
        let mut session = session_with(EngineConfig::default(), &rows);
        session.set_pacing(true);
        session.propose_swap(p(7, 0), p(7, 1)).unwrap();
        assert!(session.is_processing());
        assert_eq!(session.current_frame().map(|f| f.phase), Some(StepPhase::Swapped));
        let score = session.score();
        assert_eq!(session.propose_swap(p(0, 0), p(0, 1)), Err(MoveError::Busy));
        assert_eq!(session.score(), score);
        let mut guard = 0;
        while session.advance_frame() {
            guard += 1;
            assert!(session.is_processing());
            assert!(guard < 10_000);
        }
        assert!(!session.is_processing());
        assert_eq!(session.display_grid(), session.grid());
    }

    #[test]
    fn dead_board_with_points_is_not_over() {
        let mut session = session_with(EngineConfig::default(), &QUIET);
        assert_eq!(session.hint(), None);
        session.score = 40;
        session.propose_swap(p(0, 0), p(0, 1)).unwrap();
        assert!(!session.is_game_over());
        session.propose_swap(p(0, 0), p(0, 1)).unwrap();
        assert!(!session.is_game_over());
        session.propose_swap(p(0, 0), p(0, 1)).unwrap();
        assert_eq!(session.score(), 10);
        session.propose_swap(p(0, 0), p(0, 1)).unwrap();
        assert_eq!(session.score(), 0);
        assert!(session.is_game_over());
    }

    #[test]
    fn overrun_is_a_fault_and_play_continues() {
        let config = EngineConfig {
            palette_size: 1,
            max_cascade_steps: 4,
            board_size: 3,
            ..EngineConfig::default()
        };
        let mut session = session_with(config, &["111", "111", "111"]);
        let err = session.propose_swap(p(0, 0), p(0, 1)).unwrap_err();
        assert!(err.is_fault());
        assert!(matches!(err, MoveError::CascadeOverrun { steps: 4, .. }));
        assert!(session.score() > 0);
        assert!(!session.is_processing());
        assert_eq!(session.grid().occupied(), 9);
        assert!(session.propose_swap(p(1, 1), p(1, 2)).unwrap_err().is_fault());
    }

    #[test]
    fn stuck_and_broke_is_game_over() {
        let config = EngineConfig {
            board_size: 4,
            ..EngineConfig::default()
        };
        let mut session = session_with(config, &["1234", "3412", "1234", "3412"]);
        assert!(session.propose_swap(p(0, 0), p(0, 1)).is_err());
        assert!(session.is_game_over());
        assert!(session.drain_events().contains(&GameEvent::GameOver));
        assert_eq!(session.propose_swap(p(0, 0), p(0, 1)), Err(MoveError::GameOver));
        session.restart();
        assert_eq!(session.progress().games_played, 1);
        assert_eq!(session.score(), 0);
    }

    #[test]
    fn restart_keeps_records() {
        let mut rows = QUIET;
        rows[7] = "11146464";
        let mut session = session_with(EngineConfig::default(), &rows);
        session.propose_swap(p(7, 0), p(7, 1)).unwrap();
        let scored = session.score();
        assert!(session.progress().total_matches >= 3);
        let events = session.drain_events();
        assert!(events.contains(&GameEvent::AchievementUnlocked("first_match")));
        session.restart();
        assert_eq!(session.progress().high_score, scored);
        assert_eq!(session.progress().games_played, 1);
        assert_eq!((session.score(), session.moves(), session.level()), (0, 0, 1));
        assert!(find_all_matches(session.grid(), 3).is_empty());
    }

    #[test]
    fn reconfigure_switches_rules() {
        let mut rows = QUIET;
        rows[7] = "11146464";
        let mut session = session_with(EngineConfig::default(), &rows);
        session.propose_swap(p(7, 0), p(7, 1)).unwrap();
        let hard = EngineConfig::for_difficulty(Difficulty::Hard);
        session.reconfigure(hard).unwrap();
        assert_eq!(session.penalty(), 15);
        assert_eq!(session.progress().difficulty, Difficulty::Hard);
        assert_eq!(session.progress().games_played, 1);
        assert_eq!(session.score(), 0);
        let broken = EngineConfig {
            match_length: 1,
            ..EngineConfig::default()
        };
        assert!(session.reconfigure(broken).is_err());
        assert_eq!(session.penalty(), 15);
    }
}
