use std::io;
use std::time::Duration;

use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Clear, Gauge, Paragraph};

use nba_winpct_terminal::config::Settings;
use nba_winpct_terminal::logging;
use nba_winpct_terminal::pipeline::{InputSource, LoadOptions, Pipeline};
use nba_winpct_terminal::state::{AppState, InputMode, Stage, Step};

struct App {
    pipeline: Pipeline,
    state: AppState,
    root: String,
    should_quit: bool,
}

impl App {
    fn new(pipeline: Pipeline, root: String) -> Self {
        let mut state = AppState::new(&pipeline);
        state.push_log(format!(
            "[INFO] Loaded {} features, {} team-seasons",
            pipeline.features().len(),
            pipeline.dataset().rows().len()
        ));
        Self {
            pipeline,
            state,
            root,
            should_quit: false,
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        if self.state.is_editing() {
            self.on_edit_key(key);
            return;
        }
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Tab | KeyCode::Char('m') => self.state.toggle_mode(),
            KeyCode::Char('j') | KeyCode::Down => self.state.select_next(),
            KeyCode::Char('k') | KeyCode::Up => self.state.select_prev(),
            KeyCode::Char('l') | KeyCode::Right => self.state.adjust(true, Step::Fine),
            KeyCode::Char('h') | KeyCode::Left => self.state.adjust(false, Step::Fine),
            KeyCode::Char('L') | KeyCode::Char(']') => self.state.adjust(true, Step::Coarse),
            KeyCode::Char('H') | KeyCode::Char('[') => self.state.adjust(false, Step::Coarse),
            KeyCode::Char('e') => self.state.begin_edit(),
            KeyCode::Char('r') => self.state.reset_field(),
            KeyCode::Enter => match self.state.mode {
                InputMode::Manual => self.state.begin_edit(),
                InputMode::TeamSeason => self.state.predict(&self.pipeline),
            },
            KeyCode::Char('p') | KeyCode::Char(' ') => self.state.predict(&self.pipeline),
            KeyCode::Char('x') => self.state.toggle_show_inputs(),
            KeyCode::Char('?') => self.state.help_overlay = !self.state.help_overlay,
            KeyCode::Esc => self.state.help_overlay = false,
            _ => {}
        }
    }

    fn on_edit_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => {
                self.state.commit_edit();
            }
            KeyCode::Esc => self.state.cancel_edit(),
            KeyCode::Backspace => self.state.edit_backspace(),
            KeyCode::Char(c) => self.state.edit_push(c),
            _ => {}
        }
    }
}

fn main() -> io::Result<()> {
    let settings = Settings::from_process();
    if let Some(path) = settings.log_file.as_deref()
        && let Err(err) = logging::init_file(path)
    {
        eprintln!("warning: {err:#}");
    }

    // Startup failures end the session before the terminal is taken over.
    let opts = LoadOptions {
        strict_features: settings.strict_features,
    };
    let pipeline = match Pipeline::load(&settings.paths, opts) {
        Ok(p) => p,
        Err(err) => {
            tracing::error!(%err, "startup failed");
            eprintln!("Repo root: {}", settings.paths.root.display());
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let mut app = App::new(pipeline, settings.paths.root.display().to_string());
    let res = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("error: {err}");
    }
    Ok(())
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);

    loop {
        terminal.draw(|f| ui(f, app))?;

        if event::poll(tick_rate)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.on_key(key);
                }
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Min(1),
            Constraint::Length(5),
            Constraint::Length(2),
        ])
        .split(frame.size());

    let header = Paragraph::new(header_text(app))
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(chunks[1]);
    render_form(frame, columns[0], &app.state);
    render_result(frame, columns[1], &app.state);

    let console = Paragraph::new(console_text(&app.state))
        .block(Block::default().title("Console").borders(Borders::ALL));
    frame.render_widget(console, chunks[2]);

    let footer = Paragraph::new(footer_text(&app.state))
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(footer, chunks[3]);

    if app.state.help_overlay {
        render_help_overlay(frame, frame.size());
    }
}

fn header_text(app: &App) -> String {
    let line1 = format!("  NBA WIN% PREDICTOR | {}", mode_label(app.state.mode));
    let line2 = format!(
        "  Model: linear regression on team advanced stats. {}",
        app.pipeline.metrics().caption()
    );
    let line3 = format!("  Repo root: {}", app.root);
    format!("{line1}\n{line2}\n{line3}")
}

fn footer_text(state: &AppState) -> String {
    if state.is_editing() {
        return "Type value | Enter Apply | Backspace Delete | Esc Cancel".to_string();
    }
    match state.mode {
        InputMode::TeamSeason => {
            "Tab Mode | j/k Row | h/l Change | p Predict | x Inputs | ? Help | q Quit".to_string()
        }
        InputMode::Manual => {
            "Tab Mode | j/k Field | h/l Step | H/L Coarse | e Edit | r Reset | p Predict | x Inputs | ? Help | q Quit"
                .to_string()
        }
    }
}

fn render_form(frame: &mut Frame, area: Rect, state: &AppState) {
    let title = match state.mode {
        InputMode::TeamSeason => "Pick team & season",
        InputMode::Manual => "Manual feature inputs",
    };
    let block = Block::default().title(title).borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);
    if inner.height == 0 || inner.width == 0 {
        return;
    }

    match state.mode {
        InputMode::TeamSeason => {
            let team = state.selected_team().unwrap_or("-");
            let season = state.selected_season().unwrap_or("-");
            let rows = [("Team", team), ("Season", season)];
            let lines: Vec<Line> = rows
                .iter()
                .enumerate()
                .map(|(idx, (label, value))| {
                    let selected = idx == state.selected;
                    let prefix = if selected { "> " } else { "  " };
                    Line::styled(
                        format!("{prefix}{label:<8} < {value} >"),
                        row_style(selected),
                    )
                })
                .collect();
            frame.render_widget(Paragraph::new(lines), inner);
        }
        InputMode::Manual => render_manual_fields(frame, inner, state),
    }
}

fn render_manual_fields(frame: &mut Frame, area: Rect, state: &AppState) {
    if state.fields.is_empty() {
        let empty =
            Paragraph::new("No features to enter").style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, area);
        return;
    }

    let name_width = state
        .fields
        .iter()
        .map(|f| f.name.chars().count())
        .max()
        .unwrap_or(0)
        .min(24);
    let visible = area.height as usize;
    let (start, end) = visible_range(state.selected, state.fields.len(), visible);

    let lines: Vec<Line> = (start..end)
        .map(|idx| {
            let field = &state.fields[idx];
            let selected = idx == state.selected;
            let prefix = if selected { "> " } else { "  " };
            let value = match (&state.editing, selected) {
                (Some(buf), true) => format!("{buf}_"),
                _ => format!("{:.4}", state.values[idx]),
            };
            Line::styled(
                format!(
                    "{prefix}{:<name_width$} {value:>12}  [{:.4}, {:.4}]",
                    field.name, field.min, field.max
                ),
                row_style(selected),
            )
        })
        .collect();
    frame.render_widget(Paragraph::new(lines), area);
}

fn render_result(frame: &mut Frame, area: Rect, state: &AppState) {
    let block = Block::default().title("Prediction").borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);
    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let (Stage::ResultDisplayed, Some(pred)) = (state.stage, state.result.as_ref()) else {
        let hint = Paragraph::new("Press p to predict").style(Style::default().fg(Color::DarkGray));
        frame.render_widget(hint, inner);
        return;
    };

    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Min(0),
        ])
        .split(inner);

    let source = match &pred.input.source {
        InputSource::TeamSeason { team, season } => format!("{team} {season}"),
        InputSource::Manual => "manual inputs".to_string(),
    };
    let summary = [
        format!("Predicted Win%: {}", pred.win_pct_label()),
        format!("Predicted Wins (82 gms): {}", pred.wins_label()),
        format!("From: {source}"),
    ]
    .join("\n");
    frame.render_widget(
        Paragraph::new(summary).style(Style::default().add_modifier(Modifier::BOLD)),
        sections[0],
    );

    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(Color::Green))
        .ratio(pred.win_pct.clamp(0.0, 1.0));
    frame.render_widget(gauge, sections[1]);

    if state.show_inputs {
        let inputs = pred
            .input
            .iter()
            .map(|(name, value)| format!("{name}: {value:.4}"))
            .collect::<Vec<_>>()
            .join("\n");
        frame.render_widget(
            Paragraph::new(inputs).block(Block::default().title("Inputs").borders(Borders::TOP)),
            sections[2],
        );
    }
}

fn row_style(selected: bool) -> Style {
    if selected {
        Style::default().fg(Color::White).bg(Color::DarkGray)
    } else {
        Style::default()
    }
}

fn visible_range(selected: usize, total: usize, visible: usize) -> (usize, usize) {
    if total == 0 {
        return (0, 0);
    }
    if total <= visible {
        return (0, total);
    }

    let mut start = selected.saturating_sub(visible / 2);
    if start + visible > total {
        start = total - visible;
    }
    (start, start + visible)
}

fn console_text(state: &AppState) -> String {
    if state.logs.is_empty() {
        return "No alerts yet".to_string();
    }
    let start = state.logs.len().saturating_sub(3);
    state
        .logs
        .iter()
        .skip(start)
        .cloned()
        .collect::<Vec<_>>()
        .join("\n")
}

fn mode_label(mode: InputMode) -> &'static str {
    match mode {
        InputMode::TeamSeason => "TEAM & SEASON",
        InputMode::Manual => "MANUAL",
    }
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 60, area);
    frame.render_widget(Clear, popup_area);

    let text = [
        "NBA Win% Predictor - Help",
        "",
        "Global:",
        "  Tab / m      Switch input mode",
        "  p / Space    Predict",
        "  x            Show/hide inputs",
        "  ?            Toggle help",
        "  q            Quit",
        "",
        "Team & season:",
        "  j/k or ↑/↓   Pick row",
        "  h/l or ←/→   Change team / season",
        "  Enter        Predict",
        "",
        "Manual:",
        "  j/k or ↑/↓   Pick feature",
        "  h/l          Step by 0.001",
        "  H/L or [/]   Step by 1% of range",
        "  e / Enter    Type a value",
        "  r            Reset to mean",
    ]
    .join("\n");

    let help = Paragraph::new(text)
        .block(Block::default().title("Help").borders(Borders::ALL))
        .style(Style::default());
    frame.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}
