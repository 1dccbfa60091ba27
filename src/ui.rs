//! Layout and drawing: menu, board, sidebar, toasts, pause, quit menu, game over.

use crate::app::{QuitOption, Screen, View};
use crate::events::StepPhase;
use crate::grid::{BonusKind, Cell, Position};
use crate::progress::ACHIEVEMENTS;
use crate::theme::Theme;
use crate::Difficulty;
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Margin, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, Gauge, Paragraph, Widget};

/// Terminal columns per board cell: the glyph with a margin (or cursor bracket) each side.
const CELL_WIDTH: u16 = 3;
const SIDEBAR_WIDTH: u16 = 28;
/// Sidebar needs this many rows whatever the board size.
const SIDEBAR_MIN_HEIGHT: u16 = 22;

/// Board size in terminal cells, border included.
fn board_pixel_size(board_size: usize) -> (u16, u16) {
    let n = board_size as u16;
    (n * CELL_WIDTH + 2, n + 2)
}

pub fn glyph(cell: Cell) -> &'static str {
    match cell {
        Cell::Empty => "·",
        Cell::Gem(_) => "●",
        Cell::Bonus(BonusKind::Bomb) => "✹",
        Cell::Bonus(BonusKind::RainbowClear) => "✦",
        Cell::Bonus(BonusKind::LineHorizontal) => "═",
        Cell::Bonus(BonusKind::LineVertical) => "║",
    }
}

fn cell_color(theme: &Theme, cell: Cell) -> Color {
    match cell {
        Cell::Empty => theme.inactive_fg,
        Cell::Gem(c) => theme.gem_color(c),
        Cell::Bonus(_) => theme.bonus,
    }
}

/// Centered rect of the given size, clipped to `area`.
fn centered(area: Rect, width: u16, height: u16) -> Rect {
    Rect {
        x: area.x + area.width.saturating_sub(width) / 2,
        y: area.y + area.height.saturating_sub(height) / 2,
        width: width.min(area.width),
        height: height.min(area.height),
    }
}

pub fn draw(frame: &mut Frame, view: &View) {
    let area = frame.area();
    match view.screen {
        Screen::Menu => draw_menu(frame, view, area),
        Screen::Playing => {
            draw_game(frame, view, area);
            if view.paused {
                draw_pause_overlay(frame, view.theme, area);
            }
        }
        Screen::QuitMenu => {
            draw_game(frame, view, area);
            draw_quit_menu(frame, view.theme, view.quit_selected);
        }
        Screen::GameOver => {
            draw_game(frame, view, area);
            draw_game_over(frame, view, area);
        }
    }
}

fn draw_menu(frame: &mut Frame, view: &View, area: Rect) {
    let theme = view.theme;
    let progress = view.session.progress();
    let fg = Style::default().fg(theme.main_fg);
    let title_style = Style::default().fg(theme.title).add_modifier(Modifier::BOLD);

    let mut difficulty_spans = vec![Span::styled(" Difficulty: ", fg)];
    for d in [Difficulty::Easy, Difficulty::Normal, Difficulty::Hard] {
        let style = if d == view.menu_state.selected_difficulty {
            Style::default()
                .fg(theme.bg)
                .bg(theme.title)
                .add_modifier(Modifier::BOLD)
        } else {
            fg
        };
        difficulty_spans.push(Span::styled(format!(" {} ", d.label()), style));
    }
    let selected = view.menu_state.selected_difficulty;

    let gems: Vec<Span> = (1..=view.session.config().palette_size)
        .map(|c| Span::styled("● ", Style::default().fg(theme.gem_color(c))))
        .collect();

    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled("S W A P T U I", title_style)),
        Line::from(gems),
        Line::from(""),
        Line::from(difficulty_spans),
        Line::from(Span::styled(
            format!(
                " Miss penalty {}   Level every {} points ",
                selected.penalty(),
                selected.level_threshold()
            ),
            Style::default().fg(theme.inactive_fg),
        )),
        Line::from(""),
        Line::from(Span::styled(
            format!(
                " Best {}   Best combo x{}   Games {} ",
                progress.high_score, progress.best_combo, progress.games_played
            ),
            fg,
        )),
        Line::from(Span::styled(
            format!(
                " Achievements {}/{} ",
                progress.achievements.len(),
                ACHIEVEMENTS.len()
            ),
            fg,
        )),
    ];
    if let Some(next) = ACHIEVEMENTS
        .iter()
        .find(|a| !progress.achievements.iter().any(|id| id == a.id))
    {
        lines.push(Line::from(Span::styled(
            format!(" Next: {} ({}) ", next.name, next.description),
            Style::default().fg(theme.inactive_fg),
        )));
    }
    if let Some(daily) = &progress.daily {
        lines.push(Line::from(vec![
            Span::styled(" Today: clear ", fg),
            Span::styled(
                format!("{} ", daily.target),
                Style::default().fg(theme.gem_color(daily.target_color)),
            ),
            Span::styled("●", Style::default().fg(theme.gem_color(daily.target_color))),
            Span::styled(
                if daily.completed { "  done " } else { " " },
                Style::default().fg(Color::Green),
            ),
        ]));
    }
    lines.extend([
        Line::from(""),
        Line::from(Span::styled(
            " ←/→ Difficulty   Enter Start   Q Quit ",
            Style::default().fg(theme.inactive_fg),
        )),
        Line::from(""),
    ]);

    let popup = centered(area, 50, lines.len() as u16 + 2);
    Clear.render(popup, frame.buffer_mut());
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
                .title(Span::styled(" Swaptui ", theme.title)),
        )
        .render(popup, frame.buffer_mut());
}

fn draw_pause_overlay(frame: &mut Frame, theme: &Theme, area: Rect) {
    let popup = centered(area, 28, 5);
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Paused ",
            Style::default().fg(Color::Black).bg(Color::Yellow),
        )),
        Line::from(""),
        Line::from(Span::styled(
            " P — Resume    Q — Quit ",
            Style::default().fg(theme.main_fg),
        )),
    ];
    Clear.render(popup, frame.buffer_mut());
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
        )
        .render(popup, frame.buffer_mut());
}

fn draw_game_over(frame: &mut Frame, view: &View, area: Rect) {
    let theme = view.theme;
    let session = view.session;
    let fg = Style::default().fg(theme.main_fg);
    let mut lines: Vec<Line> = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Game Over ",
            Style::default().fg(Color::White).bg(Color::Red),
        )),
        Line::from(Span::styled(" No swaps left ", Style::default().fg(theme.inactive_fg))),
        Line::from(""),
        Line::from(Span::styled(format!(" Score: {} ", session.score()), fg)),
        Line::from(Span::styled(format!(" Moves: {} ", session.moves()), fg)),
        Line::from(Span::styled(
            format!(" Best: {} ", session.progress().high_score),
            fg,
        )),
    ];
    if session.score() > view.best_before {
        lines.push(Line::from(Span::styled(
            " New record! ",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(" R — Restart    Q — Quit ", fg)));
    lines.push(Line::from(""));

    let popup = centered(area, 32, lines.len() as u16 + 2);
    Clear.render(popup, frame.buffer_mut());
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
                .title(Span::styled(" Swaptui ", theme.title)),
        )
        .render(popup, frame.buffer_mut());
}

/// Board + sidebar, centered in the full area.
fn draw_game(frame: &mut Frame, view: &View, area: Rect) {
    let (pw, ph) = board_pixel_size(view.session.config().board_size);
    let total_w = pw + SIDEBAR_WIDTH;
    let total_h = ph.max(SIDEBAR_MIN_HEIGHT);

    let horiz_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(total_w),
            Constraint::Fill(1),
        ])
        .split(area);
    let vert_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(total_h),
            Constraint::Fill(1),
        ])
        .split(horiz_chunks[1]);
    let inner = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(pw), Constraint::Length(SIDEBAR_WIDTH)])
        .split(vert_chunks[1]);

    let board_area = Rect {
        height: ph.min(inner[0].height),
        ..inner[0]
    };
    draw_board(frame, view, board_area);
    draw_sidebar(frame, view, inner[1]);
}

fn draw_board(frame: &mut Frame, view: &View, area: Rect) {
    let theme = view.theme;
    let session = view.session;
    let step = session.current_frame();
    let title = match step.map(|f| f.phase) {
        Some(StepPhase::Swapped) => " Swap ",
        Some(StepPhase::SwapReverted) => " No match ",
        Some(StepPhase::Cleared) => " Match! ",
        Some(StepPhase::BonusesResolved) => " Boom ",
        Some(StepPhase::Settled | StepPhase::Refilled) => " Cascade ",
        None => " Swaptui ",
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .title(Span::styled(title, theme.title));
    let inner = block.inner(area);
    block.render(area, frame.buffer_mut());

    let grid = session.display_grid();
    let highlight = step.map_or(&[][..], |f| f.highlight.as_slice());
    let hinted = |pos: Position| view.hint.is_some_and(|(a, b)| a == pos || b == pos);
    let live = view.screen == Screen::Playing && !session.is_processing();

    let buf = frame.buffer_mut();
    for pos in grid.positions() {
        let Some(cell) = grid.get(pos) else {
            continue;
        };
        let rx = inner.x + pos.col as u16 * CELL_WIDTH;
        let ry = inner.y + pos.row as u16;
        if rx + CELL_WIDTH > inner.x + inner.width || ry >= inner.y + inner.height {
            continue;
        }

        let mut bg = theme.bg;
        if highlight.contains(&pos) {
            bg = theme.div_line;
        } else if hinted(pos) {
            bg = theme.inactive_fg;
        }
        let mut style = Style::default().fg(cell_color(theme, cell)).bg(bg);
        if matches!(cell, Cell::Bonus(_)) {
            style = style.add_modifier(Modifier::BOLD);
        }
        if live && view.selected == Some(pos) {
            style = Style::default()
                .fg(theme.bg)
                .bg(cell_color(theme, cell))
                .add_modifier(Modifier::BOLD);
        }
        let (left, right) = if live && view.cursor == pos {
            ("[", "]")
        } else {
            (" ", " ")
        };
        let bracket = Style::default().fg(theme.cursor).bg(bg);
        buf.set_string(rx, ry, left, bracket);
        buf.set_string(rx + 1, ry, glyph(cell), style);
        buf.set_string(rx + 2, ry, right, bracket);
    }
}

fn draw_sidebar(frame: &mut Frame, view: &View, area: Rect) {
    let theme = view.theme;
    let session = view.session;
    let title_style = Style::default().fg(theme.title);
    let fg_style = Style::default().fg(theme.main_fg);
    let border_style = Style::default().fg(theme.div_line).bg(theme.bg);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(7), // Stats
            Constraint::Length(4), // Level progress
            Constraint::Length(4), // Daily challenge
            Constraint::Fill(1),   // Toasts
        ])
        .split(area);

    // --- Stats ---
    let stats_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(Span::styled(
            format!(" {} ", session.config().difficulty.label()),
            title_style,
        ));
    let stats_inner = stats_block.inner(chunks[0]);
    stats_block.render(chunks[0], frame.buffer_mut());
    let best = session.progress().high_score;
    let stat = |label: &'static str, value: String| {
        Line::from(vec![
            Span::styled(label, title_style),
            Span::styled(value, fg_style),
        ])
    };
    let stats_lines = vec![
        stat("Score: ", session.score().to_string()),
        stat("Best:  ", best.to_string()),
        stat("Moves: ", session.moves().to_string()),
        stat(
            "Combo: ",
            if session.combo() > 1 {
                format!("x{}", session.combo())
            } else {
                "-".to_string()
            },
        ),
        stat("Miss:  ", format!("-{}", session.penalty())),
    ];
    Paragraph::new(Text::from(stats_lines)).render(stats_inner, frame.buffer_mut());

    // --- Level ---
    let level_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    let level_inner = level_block.inner(chunks[1]);
    level_block.render(chunks[1], frame.buffer_mut());
    let level_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1)])
        .split(level_inner);
    Paragraph::new(Line::from(Span::styled(
        format!("Level {}", session.level()),
        title_style,
    )))
    .render(level_layout[0], frame.buffer_mut());
    let threshold = session.config().level_threshold.max(1);
    let ratio = f64::from(session.score() % threshold) / f64::from(threshold);
    Gauge::default()
        .ratio(ratio.clamp(0.0, 1.0))
        .label("")
        .gauge_style(Style::default().fg(Color::Green))
        .render(level_layout[1], frame.buffer_mut());

    // --- Daily challenge ---
    let daily_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    let daily_inner = daily_block.inner(chunks[2]);
    daily_block.render(chunks[2], frame.buffer_mut());
    let daily_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1)])
        .split(daily_inner);
    if let Some(daily) = &session.progress().daily {
        let gem = Style::default().fg(theme.gem_color(daily.target_color));
        Paragraph::new(Line::from(vec![
            Span::styled("Daily ", title_style),
            Span::styled("●", gem),
            Span::styled(format!(" {}/{}", daily.progress, daily.target), fg_style),
        ]))
        .render(daily_layout[0], frame.buffer_mut());
        let ratio = f64::from(daily.progress) / f64::from(daily.target.max(1));
        let color = if daily.completed { Color::Green } else { Color::Yellow };
        Gauge::default()
            .ratio(ratio.clamp(0.0, 1.0))
            .label("")
            .gauge_style(Style::default().fg(color))
            .render(daily_layout[1], frame.buffer_mut());
    }

    // --- Toasts, newest first ---
    let toast_lines: Vec<Line> = view
        .toasts
        .iter()
        .rev()
        .map(|t| {
            Line::from(Span::styled(
                t.text.clone(),
                Style::default().fg(t.color).add_modifier(Modifier::BOLD),
            ))
        })
        .collect();
    let mut footer = toast_lines;
    footer.push(Line::from(""));
    footer.push(Line::from(Span::styled(
        "? hint  p pause  r restart",
        Style::default().fg(theme.inactive_fg),
    )));
    Paragraph::new(Text::from(footer)).render(chunks[3].inner(Margin::new(1, 0)), frame.buffer_mut());
}

pub fn draw_quit_menu(frame: &mut Frame, theme: &Theme, selected: QuitOption) {
    let quit_rect = centered(frame.area(), 24, 8);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.title))
        .title(" Quit? ");

    // Clear background
    for y in quit_rect.y..quit_rect.y + quit_rect.height {
        for x in quit_rect.x..quit_rect.x + quit_rect.width {
            frame.buffer_mut()[(x, y)]
                .set_symbol(" ")
                .set_style(Style::default().bg(theme.bg));
        }
    }

    let inner = block.inner(quit_rect);
    block.render(quit_rect, frame.buffer_mut());

    let options = [
        (QuitOption::Resume, " Resume "),
        (QuitOption::MainMenu, " Main Menu "),
        (QuitOption::Exit, " Exit "),
    ];

    for (i, (opt, label)) in options.iter().enumerate() {
        let style = if *opt == selected {
            Style::default()
                .fg(theme.bg)
                .bg(theme.title)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(theme.title)
        };
        let rx = inner.x + (inner.width.saturating_sub(label.len() as u16)) / 2;
        let ry = inner.y + 1 + i as u16 * 2;
        if ry < inner.y + inner.height {
            frame.buffer_mut().set_string(rx, ry, label, style);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{MenuState, Toast};
    use crate::config::EngineConfig;
    use crate::progress::Progress;
    use crate::session::GameSession;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn render(screen: Screen, toasts: &[Toast]) -> String {
        let session = GameSession::new(
            EngineConfig::default(),
            Progress::default(),
            StdRng::seed_from_u64(1),
            3,
        )
        .unwrap();
        let theme = Theme::default();
        let menu_state = MenuState {
            selected_difficulty: Difficulty::Normal,
        };
        let view = View {
            screen,
            session: &session,
            theme: &theme,
            cursor: Position::new(0, 0),
            selected: None,
            hint: None,
            paused: false,
            toasts,
            menu_state: &menu_state,
            quit_selected: QuitOption::Resume,
            best_before: 0,
        };
        let mut terminal = Terminal::new(TestBackend::new(80, 30)).unwrap();
        terminal.draw(|f| draw(f, &view)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    #[test]
    fn board_and_sidebar_render() {
        let toasts = [Toast {
            text: "Combo x3!".to_string(),
            color: Color::Cyan,
            age_ms: 0,
        }];
        let screen = render(Screen::Playing, &toasts);
        assert!(screen.contains("Score: 0"));
        assert!(screen.contains("Combo x3!"));
        // Cursor brackets around the top-left gem.
        assert!(screen.contains("[●]"));
        assert!(screen.matches('●').count() >= 64);
    }

    #[test]
    fn menu_and_quit_render() {
        assert!(render(Screen::Menu, &[]).contains("Normal"));
        assert!(render(Screen::QuitMenu, &[]).contains("Main Menu"));
    }

    #[test]
    fn every_cell_has_a_glyph() {
        let cells = [
            Cell::Empty,
            Cell::Gem(1),
            Cell::Bonus(BonusKind::Bomb),
            Cell::Bonus(BonusKind::RainbowClear),
            Cell::Bonus(BonusKind::LineHorizontal),
            Cell::Bonus(BonusKind::LineVertical),
        ];
        let glyphs: std::collections::BTreeSet<&str> = cells.into_iter().map(glyph).collect();
        assert_eq!(glyphs.len(), cells.len());
    }
}
