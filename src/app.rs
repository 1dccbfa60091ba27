//! App: terminal init, main loop, frame playback and key handling.

use crate::config::EngineConfig;
use crate::events::GameEvent;
use crate::grid::Position;
use crate::input::{Action, key_to_action};
use crate::progress::{self, Progress};
use crate::session::{GameSession, MoveOutcome};
use crate::theme::Theme;
use crate::{Args, Difficulty};
use anyhow::Result;
use crossterm::event::{self, Event, KeyEventKind};
use log::{info, warn};
use rand::rngs::StdRng;
use ratatui::DefaultTerminal;
use ratatui::style::Color;
use std::time::{Duration, Instant};

/// How long a toast stays on screen.
const TOAST_MS: u32 = 1800;
const MAX_TOASTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Menu,
    Playing,
    GameOver,
    QuitMenu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuitOption {
    Resume,
    MainMenu,
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuState {
    pub selected_difficulty: Difficulty,
}

/// Short message shown over the sidebar after a game event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub text: String,
    pub color: Color,
    pub age_ms: u32,
}

/// Everything the renderer needs besides the session.
pub struct View<'a> {
    pub screen: Screen,
    pub session: &'a GameSession,
    pub theme: &'a Theme,
    pub cursor: Position,
    pub selected: Option<Position>,
    pub hint: Option<(Position, Position)>,
    pub paused: bool,
    pub toasts: &'a [Toast],
    pub menu_state: &'a MenuState,
    pub quit_selected: QuitOption,
    /// Best score before this game started, to flag a new record.
    pub best_before: u32,
}

pub struct App {
    args: Args,
    theme: Theme,
    session: GameSession,
    screen: Screen,
    paused: bool,
    cursor: Position,
    selected: Option<Position>,
    hint: Option<(Position, Position)>,
    toasts: Vec<Toast>,
    menu_state: MenuState,
    quit_selected: QuitOption,
    /// When the frame on screen was shown; paced playback moves on after `step_delay_ms`.
    last_step: Instant,
    best_before: u32,
}

impl App {
    pub fn new(
        args: Args,
        config: EngineConfig,
        theme: Theme,
        progress: Progress,
        rng: StdRng,
    ) -> Result<Self> {
        let mut session = GameSession::new(config, progress, rng, progress::today())?;
        session.set_pacing(!args.no_animation);
        let screen = if args.no_menu {
            Screen::Playing
        } else {
            Screen::Menu
        };
        let center = session.config().board_size / 2;
        let best_before = session.progress().high_score;
        Ok(Self {
            menu_state: MenuState {
                selected_difficulty: session.config().difficulty,
            },
            args,
            theme,
            session,
            screen,
            paused: false,
            cursor: Position::new(center, center),
            selected: None,
            hint: None,
            toasts: Vec::new(),
            quit_selected: QuitOption::Resume,
            last_step: Instant::now(),
            best_before,
        })
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            execute,
            terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let mut terminal =
            ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;

        let result = self.run_loop(&mut terminal);

        execute!(std::io::stdout(), LeaveAlternateScreen)?;
        disable_raw_mode()?;
        self.save_progress();

        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        let frame_duration = Duration::from_secs_f64(1.0 / self.args.frame_rate.max(1.0));
        let step_delay = Duration::from_millis(self.args.step_delay_ms);
        let mut last_frame = Instant::now();
        loop {
            terminal.draw(|f| crate::ui::draw(f, &self.view()))?;

            let now = Instant::now();
            let delta_ms = now.duration_since(last_frame).as_millis().min(1000) as u32;
            last_frame = now;
            self.tick_toasts(delta_ms);

            if self.session.is_processing() && self.last_step.elapsed() >= step_delay {
                self.session.advance_frame();
                self.last_step = Instant::now();
            }
            if self.screen == Screen::Playing
                && self.session.is_game_over()
                && !self.session.is_processing()
            {
                self.screen = Screen::GameOver;
                self.selected = None;
            }

            let timeout = frame_duration.saturating_sub(now.elapsed());
            if event::poll(timeout)? {
                while event::poll(Duration::ZERO)? {
                    if let Event::Key(key) = event::read()? {
                        if key.kind != KeyEventKind::Press {
                            continue;
                        }
                        if self.handle_action(key_to_action(key))? {
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    fn view(&self) -> View<'_> {
        View {
            screen: self.screen,
            session: &self.session,
            theme: &self.theme,
            cursor: self.cursor,
            selected: self.selected,
            hint: self.hint,
            paused: self.paused,
            toasts: &self.toasts,
            menu_state: &self.menu_state,
            quit_selected: self.quit_selected,
            best_before: self.best_before,
        }
    }

    /// Apply one key action. Returns true when the player asked to exit.
    fn handle_action(&mut self, action: Action) -> Result<bool> {
        match self.screen {
            Screen::Menu => match action {
                Action::Quit => return Ok(true),
                Action::Left | Action::Up => {
                    self.menu_state.selected_difficulty = self.menu_state.selected_difficulty.prev();
                }
                Action::Right | Action::Down => {
                    self.menu_state.selected_difficulty = self.menu_state.selected_difficulty.next();
                }
                Action::Select => self.start_game()?,
                _ => {}
            },
            Screen::Playing if self.paused => match action {
                Action::Pause => self.paused = false,
                Action::Quit => self.open_quit_menu(),
                _ => {}
            },
            Screen::Playing => match action {
                Action::Pause => self.paused = true,
                Action::Quit => self.open_quit_menu(),
                Action::Restart => self.restart(),
                Action::Hint => {
                    self.hint = self.session.hint();
                    if self.hint.is_none() {
                        self.toast("No swaps left".to_string(), Color::Red);
                    }
                }
                Action::Select => self.select(),
                _ => {
                    if let Some((d_row, d_col)) = action.direction() {
                        self.step(d_row, d_col);
                    }
                }
            },
            Screen::QuitMenu => match action {
                Action::Down | Action::Right => {
                    self.quit_selected = match self.quit_selected {
                        QuitOption::Resume => QuitOption::MainMenu,
                        QuitOption::MainMenu => QuitOption::Exit,
                        QuitOption::Exit => QuitOption::Resume,
                    };
                }
                Action::Up | Action::Left => {
                    self.quit_selected = match self.quit_selected {
                        QuitOption::Resume => QuitOption::Exit,
                        QuitOption::MainMenu => QuitOption::Resume,
                        QuitOption::Exit => QuitOption::MainMenu,
                    };
                }
                Action::Select => match self.quit_selected {
                    QuitOption::Resume => self.screen = Screen::Playing,
                    QuitOption::MainMenu => self.screen = Screen::Menu,
                    QuitOption::Exit => return Ok(true),
                },
                Action::Pause | Action::Quit => self.screen = Screen::Playing,
                _ => {}
            },
            Screen::GameOver => match action {
                Action::Quit => return Ok(true),
                Action::Restart | Action::Select => {
                    self.restart();
                    self.screen = Screen::Playing;
                }
                _ => {}
            },
        }
        Ok(false)
    }

    fn open_quit_menu(&mut self) {
        self.screen = Screen::QuitMenu;
        self.quit_selected = QuitOption::Resume;
    }

    fn start_game(&mut self) -> Result<()> {
        let difficulty = self.menu_state.selected_difficulty;
        if difficulty != self.session.config().difficulty || self.session.moves() > 0 {
            self.session.reconfigure(self.args.engine_config(difficulty))?;
            self.best_before = self.session.progress().high_score;
        }
        self.reset_view();
        self.screen = Screen::Playing;
        self.handle_events();
        Ok(())
    }

    fn restart(&mut self) {
        self.session.restart();
        self.best_before = self.session.progress().high_score;
        self.reset_view();
        self.handle_events();
        self.save_progress();
    }

    fn reset_view(&mut self) {
        let center = self.session.config().board_size / 2;
        self.cursor = Position::new(center, center);
        self.selected = None;
        self.hint = None;
        self.paused = false;
        self.toasts.clear();
    }

    /// Move the cursor, or with a gem picked, swap it towards that direction.
    fn step(&mut self, d_row: isize, d_col: isize) {
        let size = self.session.config().board_size;
        match self.selected {
            Some(from) => {
                if let Some(to) = from.offset(d_row, d_col, size) {
                    self.selected = None;
                    self.cursor = to;
                    self.swap(from, to);
                }
            }
            None => {
                if let Some(to) = self.cursor.offset(d_row, d_col, size) {
                    self.cursor = to;
                }
            }
        }
    }

    fn select(&mut self) {
        match self.selected {
            Some(from) if from == self.cursor => self.selected = None,
            Some(from) if from.is_adjacent(self.cursor) => {
                self.selected = None;
                self.swap(from, self.cursor);
            }
            _ => self.selected = Some(self.cursor),
        }
    }

    fn swap(&mut self, a: Position, b: Position) {
        self.hint = None;
        match self.session.propose_swap(a, b) {
            Ok(MoveOutcome::Accepted(report)) => {
                let text = if report.peak_combo > 1 {
                    format!("+{} (x{})", report.score_delta, report.peak_combo)
                } else {
                    format!("+{}", report.score_delta)
                };
                self.toast(text, Color::Yellow);
            }
            Ok(MoveOutcome::Penalized { .. }) => {}
            Err(e) if e.is_silent() => {}
            Err(e) => {
                if e.is_fault() {
                    warn!("move {a} <-> {b} aborted: {e}");
                }
                self.toast(e.to_string(), Color::Red);
            }
        }
        self.last_step = Instant::now();
        self.handle_events();
        self.save_progress();
    }

    /// Turn engine events into toasts.
    fn handle_events(&mut self) {
        for event in self.session.drain_events() {
            match event {
                GameEvent::Matched(_) => {}
                GameEvent::ComboReached(n) => self.toast(format!("Combo x{n}!"), Color::Cyan),
                GameEvent::BonusSpawned { kind, .. } => {
                    self.toast(format!("{} ready", kind.name()), self.theme.title);
                }
                GameEvent::BonusActivated { kind, .. } => {
                    self.toast(format!("{}!", kind.name()), self.theme.title);
                }
                GameEvent::Penalty(points) => {
                    self.toast(format!("No match: -{points}"), Color::Red);
                }
                GameEvent::LevelUp(level) => self.toast(format!("Level {level}!"), Color::Green),
                GameEvent::AchievementUnlocked(id) => {
                    let name = progress::achievement(id).map_or(id, |a| a.name);
                    self.toast(format!("Achievement: {name}"), Color::Magenta);
                }
                GameEvent::DailyChallengeCompleted => {
                    self.toast("Daily challenge complete!".to_string(), Color::Green);
                }
                GameEvent::GameOver => info!("game over at {} points", self.session.score()),
            }
        }
    }

    fn toast(&mut self, text: String, color: Color) {
        self.toasts.push(Toast {
            text,
            color,
            age_ms: 0,
        });
        if self.toasts.len() > MAX_TOASTS {
            self.toasts.remove(0);
        }
    }

    fn tick_toasts(&mut self, delta_ms: u32) {
        self.toasts.retain_mut(|t| {
            t.age_ms += delta_ms;
            t.age_ms < TOAST_MS
        });
    }

    fn save_progress(&self) {
        if self.args.no_save {
            return;
        }
        if let Err(e) = progress::save(self.session.progress()) {
            warn!("could not save progress: {e:#}");
        }
    }
}
