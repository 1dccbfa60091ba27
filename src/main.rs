//! Swaptui: match-three tile-swapping puzzle in the terminal.

mod app;
mod bonus;
mod cascade;
mod config;
mod error;
mod events;
mod grid;
mod input;
mod matcher;
mod progress;
mod session;
mod theme;
mod ui;

use anyhow::{Context, Result};
use app::App;
use clap::{Parser, ValueEnum};
use config::EngineConfig;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_file.as_deref())?;

    let theme = theme::Theme::load(args.theme.as_deref(), args.palette).unwrap_or_else(|e| {
        log::warn!("theme not loaded, using defaults: {e}");
        theme::Theme::default_for_palette(args.palette)
    });
    let progress = if args.no_save {
        progress::Progress::default()
    } else {
        progress::load()
    };
    let config = args.engine_config(args.starting_difficulty(&progress));
    config.validate().context("invalid game options")?;
    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let mut app = App::new(args, config, theme, progress, rng)?;
    app.run()?;
    Ok(())
}

/// Logs go to a file only; the terminal belongs to the game.
fn init_logging(path: Option<&Path>) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating log file {}", path.display()))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

/// Match-three puzzle game in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "swaptui",
    version,
    about = "Match-three puzzle in the terminal. Swap neighbouring gems to line up three or more of a colour.",
    long_about = "Swaptui is a terminal match-three game.\n\n\
        Swap two neighbouring gems to line up three or more of the same colour. Matched gems \
        vanish, the rest fall and new gems drop in; new lines cascade for a growing combo. \
        Four in a row leaves a bomb, five or more a rainbow clear. A swap that matches \
        nothing costs points.\n\n\
        CONTROLS:\n  Arrows / hjkl  Move cursor      Space / Enter  Select, then pick a neighbour\n  \
        ?              Hint             P              Pause\n  R              Restart          Q / Esc        Quit\n\n\
        Use --theme to load a btop-style theme (e.g. onedark.theme)."
)]
pub struct Args {
    /// Difficulty: sets the miss penalty (easy 5, normal 10, hard 15) and points per level.
    /// Defaults to the last difficulty played.
    #[arg(short, long)]
    pub difficulty: Option<Difficulty>,

    /// Board side length in cells.
    #[arg(long, default_value = "8", value_name = "N")]
    pub board_size: usize,

    /// Number of gem colours (1-6).
    #[arg(long, default_value = "6", value_name = "N")]
    pub colors: u8,

    /// Shortest run that counts as a match.
    #[arg(long, default_value = "3", value_name = "N")]
    pub match_length: usize,

    /// Points lost for a swap that matches nothing. Defaults to the difficulty's penalty.
    #[arg(long, value_name = "POINTS")]
    pub penalty: Option<u32>,

    /// Points between level-ups. Defaults to the difficulty's threshold.
    #[arg(long, value_name = "POINTS")]
    pub level_threshold: Option<u32>,

    /// Combo bonus per cascade step, in percent of the base score.
    #[arg(long, default_value = "50", value_name = "PERCENT")]
    pub combo_step: u32,

    /// Give up on a cascade after this many steps.
    #[arg(long, default_value = "50", value_name = "N")]
    pub cascade_cap: usize,

    /// Four in a row leaves a line blast along the run instead of a bomb.
    #[arg(long)]
    pub line_bonuses: bool,

    /// Seed for a reproducible game.
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Path to theme file (btop-style theme[key]=\"value\"). Uses One Dark if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Show only the settled board after each move.
    #[arg(long)]
    pub no_animation: bool,

    /// Delay between cascade steps when animating.
    #[arg(long, default_value = "120", value_name = "MS")]
    pub step_delay_ms: u64,

    /// Target render frames per second.
    #[arg(long, default_value = "25.0", value_name = "RATE")]
    pub frame_rate: f64,

    /// Skip main menu and start game immediately.
    #[arg(long)]
    pub no_menu: bool,

    /// Do not read or write the progress file.
    #[arg(long)]
    pub no_save: bool,

    /// Write logs to this file (level from RUST_LOG, default info).
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

impl Args {
    /// The `--difficulty` flag if given, otherwise the one saved with the player's progress.
    pub fn starting_difficulty(&self, progress: &progress::Progress) -> Difficulty {
        self.difficulty.unwrap_or(progress.difficulty)
    }

    /// Rules for a game at `difficulty`, with the command-line overrides applied.
    pub fn engine_config(&self, difficulty: Difficulty) -> EngineConfig {
        let mut config = EngineConfig::default().with_difficulty(difficulty);
        config.board_size = self.board_size;
        config.palette_size = self.colors;
        config.match_length = self.match_length;
        config.combo_step_percent = self.combo_step;
        config.max_cascade_steps = self.cascade_cap;
        config.line_bonuses = self.line_bonuses;
        if let Some(penalty) = self.penalty {
            config.penalty = penalty;
        }
        if let Some(threshold) = self.level_threshold {
            config.level_threshold = threshold;
        }
        config
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
}

impl Difficulty {
    /// Points lost for a swap that matches nothing.
    pub fn penalty(self) -> u32 {
        match self {
            Difficulty::Easy => 5,
            Difficulty::Normal => 10,
            Difficulty::Hard => 15,
        }
    }

    pub fn level_threshold(self) -> u32 {
        match self {
            Difficulty::Easy => 500,
            Difficulty::Normal => 1000,
            Difficulty::Hard => 1500,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Normal => "Normal",
            Difficulty::Hard => "Hard",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Difficulty::Easy => Difficulty::Normal,
            Difficulty::Normal => Difficulty::Hard,
            Difficulty::Hard => Difficulty::Easy,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            Difficulty::Easy => Difficulty::Hard,
            Difficulty::Normal => Difficulty::Easy,
            Difficulty::Hard => Difficulty::Normal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_survive_a_difficulty_change() {
        let args = Args::try_parse_from(["swaptui", "--penalty", "3", "--colors", "4"]).unwrap();
        assert_eq!(args.difficulty, None);
        let config = args.engine_config(Difficulty::Hard);
        assert_eq!(config.penalty, 3);
        assert_eq!(config.palette_size, 4);
        assert_eq!(config.level_threshold, 1500);
    }

    #[test]
    fn difficulty_defaults() {
        let args = Args::try_parse_from(["swaptui", "-d", "easy"]).unwrap();
        let config = args.engine_config(args.starting_difficulty(&progress::Progress::default()));
        assert_eq!((config.penalty, config.level_threshold), (5, 500));
        assert_eq!(Difficulty::Hard.next(), Difficulty::Easy);
        assert_eq!(Difficulty::Easy.prev(), Difficulty::Hard);
    }

    #[test]
    fn saved_difficulty_applies_unless_overridden() {
        let saved = progress::Progress {
            difficulty: Difficulty::Hard,
            ..Default::default()
        };
        let args = Args::try_parse_from(["swaptui"]).unwrap();
        assert_eq!(args.starting_difficulty(&saved), Difficulty::Hard);
        let config = args.engine_config(args.starting_difficulty(&saved));
        assert_eq!((config.penalty, config.level_threshold), (15, 1500));

        let args = Args::try_parse_from(["swaptui", "-d", "easy"]).unwrap();
        assert_eq!(args.starting_difficulty(&saved), Difficulty::Easy);
    }
}
