//! Cascade resolution for one move: clear, settle, refill, detonate, detect, repeat.

use crate::bonus::{self, Detonation};
use crate::config::{EngineConfig, MAX_COLORS};
use crate::events::{StepObserver, StepPhase};
use crate::grid::{BonusKind, Cell, Grid, Position};
use crate::matcher::{Detection, Run, find_all_matches};
use log::{debug, warn};
use rand::Rng;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CascadePhase {
    #[default]
    Idle,
    Resolving,
    Stable,
}

/// Counters for the move being resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadeState {
    pub phase: CascadePhase,
    pub combo: u32,
    pub score_delta: u32,
    pub cells_cleared: usize,
}

/// What one resolving step did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepReport {
    pub combo: u32,
    pub runs: Vec<Run>,
    /// Cells removed by runs; bonus spawn cells are not in here.
    pub matched: Vec<Position>,
    pub spawned: Vec<(BonusKind, Position)>,
    pub detonations: Vec<Detonation>,
    /// Every cell emptied this step, runs and blasts together.
    pub cleared: usize,
    pub score: u32,
    /// Cleared gems per colour, indexed by colour (slot 0 unused).
    pub cleared_colors: [u32; MAX_COLORS as usize + 1],
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadeReport {
    pub steps: Vec<StepReport>,
    pub score_delta: u32,
    pub cells_cleared: usize,
    pub peak_combo: u32,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cascade did not settle within {steps} steps")]
pub struct CascadeOverrun {
    pub steps: usize,
    /// Steps completed before the abort.
    pub report: CascadeReport,
}

/// Drives one move's cascade through `Idle -> Resolving -> Stable`.
pub struct Cascade<'a, R: Rng> {
    grid: &'a mut Grid,
    config: &'a EngineConfig,
    rng: &'a mut R,
    state: CascadeState,
    pending: Detection,
    report: CascadeReport,
}

impl<'a, R: Rng> Cascade<'a, R> {
    pub fn new(grid: &'a mut Grid, config: &'a EngineConfig, rng: &'a mut R) -> Self {
        Self {
            grid,
            config,
            rng,
            state: CascadeState::default(),
            pending: Detection::default(),
            report: CascadeReport::default(),
        }
    }

    /// Hand over the matches of the player's swap.
    pub fn start(&mut self, detection: Detection) {
        self.state.phase = if detection.is_empty() {
            CascadePhase::Stable
        } else {
            CascadePhase::Resolving
        };
        self.pending = detection;
    }

    /// Run one clear/settle/refill/detonate/detect step.
    pub fn step<O: StepObserver + ?Sized>(&mut self, observer: &mut O) -> CascadePhase {
        if self.state.phase != CascadePhase::Resolving {
            return self.state.phase;
        }
        let detection = std::mem::take(&mut self.pending);
        let config = self.config;

        self.state.combo += 1;
        let combo = self.state.combo;
        let score = config.step_score(detection.matched.len(), combo);

        let mut placements: BTreeMap<Position, BonusKind> = BTreeMap::new();
        for run in &detection.runs {
            let Some(kind) = run.bonus(config) else {
                continue;
            };
            placements
                .entry(run.center())
                .and_modify(|k| {
                    if kind.rank() > k.rank() {
                        *k = kind;
                    }
                })
                .or_insert(kind);
        }

        let mut step = StepReport {
            combo,
            runs: detection.runs,
            score,
            ..StepReport::default()
        };
        for &pos in &detection.matched {
            if placements.contains_key(&pos) {
                continue;
            }
            if let Some(Cell::Gem(color)) = self.grid.get(pos) {
                step.cleared_colors[usize::from(color.min(MAX_COLORS))] += 1;
            }
            step.matched.push(pos);
        }
        self.grid.clear(&step.matched);
        for (&pos, &kind) in &placements {
            self.grid.set(pos, Cell::Bonus(kind));
            step.spawned.push((kind, pos));
        }
        observer.on_step(StepPhase::Cleared, self.grid, &step.matched);

        self.settle_and_refill(observer);

        // Every bonus on the refilled board goes off within this step.
        let armed: Vec<Position> = self
            .grid
            .positions()
            .filter(|&p| matches!(self.grid.get(p), Some(Cell::Bonus(_))))
            .collect();
        let blast = bonus::resolve(
            self.grid,
            armed,
            config.palette_size,
            config.max_bonus_chain,
            self.rng,
        );
        if !blast.detonations.is_empty() {
            for (_, cell) in &blast.cleared {
                if let Cell::Gem(color) = cell {
                    step.cleared_colors[usize::from((*color).min(MAX_COLORS))] += 1;
                }
            }
            let blasted: Vec<Position> = blast.cleared.iter().map(|(p, _)| *p).collect();
            observer.on_step(StepPhase::BonusesResolved, self.grid, &blasted);
            self.settle_and_refill(observer);
        }
        step.detonations = blast.detonations;
        step.cleared = step.matched.len() + blast.cleared.len();

        debug!(
            "cascade step {}: {} runs, {} matched, {} bonus spawned, {} detonated{}, {} cleared, +{}",
            combo,
            step.runs.len(),
            step.matched.len(),
            step.spawned.len(),
            step.detonations.len(),
            if blast.capped { " (capped)" } else { "" },
            step.cleared,
            step.score
        );

        self.state.score_delta = self.state.score_delta.saturating_add(step.score);
        self.state.cells_cleared += step.cleared;
        self.report.score_delta = self.state.score_delta;
        self.report.cells_cleared = self.state.cells_cleared;
        self.report.peak_combo = combo;
        self.report.steps.push(step);

        self.pending = find_all_matches(self.grid, config.match_length);
        if self.pending.is_empty() {
            self.state.phase = CascadePhase::Stable;
        }
        self.state.phase
    }

    fn settle_and_refill<O: StepObserver + ?Sized>(&mut self, observer: &mut O) {
        self.grid.apply_gravity();
        observer.on_step(StepPhase::Settled, self.grid, &[]);
        let palette = self.config.palette_size;
        let rng = &mut *self.rng;
        let filled = self.grid.fill_empties(|| rng.random_range(1..=palette));
        debug_assert_eq!(self.grid.occupied(), self.grid.size() * self.grid.size());
        observer.on_step(StepPhase::Refilled, self.grid, &filled);
    }

    /// Step until stable, or fail once `max_cascade_steps` steps have not been enough.
    pub fn run<O: StepObserver + ?Sized>(
        mut self,
        observer: &mut O,
    ) -> Result<CascadeReport, CascadeOverrun> {
        while self.state.phase == CascadePhase::Resolving {
            if self.report.steps.len() >= self.config.max_cascade_steps {
                warn!(
                    "cascade still matching after {} steps, aborting",
                    self.report.steps.len()
                );
                return Err(CascadeOverrun {
                    steps: self.report.steps.len(),
                    report: self.report,
                });
            }
            self.step(observer);
        }
        Ok(self.report)
    }
}

/// Resolve `detection` and everything it sets off.
pub fn resolve_cascade<R: Rng, O: StepObserver + ?Sized>(
    grid: &mut Grid,
    detection: Detection,
    config: &EngineConfig,
    rng: &mut R,
    observer: &mut O,
) -> Result<CascadeReport, CascadeOverrun> {
    let mut cascade = Cascade::new(grid, config, rng);
    cascade.start(detection);
    cascade.run(observer)
}
