//! TUI rendering and host-terminal session management.
//!
//! Owns the host terminal: raw mode, alternate screen, and SGR mouse capture
//! on the way in; mouse-off, input drain, and full restore on the way out.
//! Drawing is immediate-mode: every frame renders the process list, the
//! selected process's output panel (with optional wrap and a scrollbar), and
//! the status bar straight from current state.

use std::io::{self, Stdout, Write};

use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::execute;
use crossterm::style::{Attribute, ResetColor, SetAttribute};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::{Frame, Terminal};

use crate::app::{App, InputMode, PROCESS_LIST_WIDTH};
use crate::process::ManagedProcess;
use crate::runner::ProcessManager;
use crate::screen::Cell;

pub type TuiTerminal = Terminal<CrosstermBackend<Stdout>>;

const BROWSE_HINTS: &str =
    "[↑↓/jk] select  [Tab/Enter] focus  [r] restart  [A] restart All  [x] kill  [q] quit  [?] help";

/// Enables raw mode, enters the alternate screen, and turns on SGR mouse
/// reporting.
pub fn init_terminal() -> io::Result<TuiTerminal> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend)
}

/// Restores the host terminal. Mouse capture is disabled before draining
/// pending input: the host keeps emitting mouse reports until told to stop,
/// and a partial escape left in the queue would leak into the shell.
pub fn restore_terminal(mut terminal: TuiTerminal) -> io::Result<()> {
    execute!(terminal.backend_mut(), DisableMouseCapture)?;
    while crossterm::event::poll(std::time::Duration::from_millis(10))? {
        let _ = crossterm::event::read();
    }
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        ResetColor,
        SetAttribute(Attribute::Reset),
    )?;
    terminal.show_cursor()?;
    io::stdout().flush()?;
    Ok(())
}

/// Draws one frame: process list, delimiter, output panel, status bar, and
/// the help overlay when open.
pub fn draw(app: &App, pm: &ProcessManager, terminal: &mut TuiTerminal) -> io::Result<()> {
    terminal.draw(|frame| {
        let area = frame.area();
        let vertical = Layout::vertical([Constraint::Min(0), Constraint::Length(1)]).split(area);
        let content = Layout::horizontal([
            Constraint::Length(PROCESS_LIST_WIDTH),
            Constraint::Length(1),
            Constraint::Min(0),
        ])
        .split(vertical[0]);

        render_process_list(frame, content[0], app, pm);
        render_output_panel(frame, content[2], app, pm);
        render_status_bar(frame, vertical[1], app, pm);

        if app.show_help {
            render_help(frame, area);
        }
    })?;
    Ok(())
}

fn render_process_list(frame: &mut Frame, area: Rect, app: &App, pm: &ProcessManager) {
    let mut lines: Vec<Line> = Vec::new();
    for (i, name) in pm.process_names().iter().enumerate() {
        let Some(process) = pm.get_process(name) else {
            continue;
        };
        let row_style = if i == app.selected_index {
            match app.mode {
                InputMode::Browse => Style::default().bg(Color::Blue),
                InputMode::Focus => Style::default().bg(Color::DarkGray),
            }
        } else {
            Style::default()
        };

        let mut spans = Vec::new();
        if !process.auto_scroll {
            spans.push(Span::styled(
                "⇅",
                Style::default().fg(Color::White).bg(Color::Red),
            ));
        }
        if process.wrap_enabled {
            spans.push(Span::styled("w", Style::default().fg(Color::Cyan)));
        }
        if !spans.is_empty() {
            spans.push(Span::raw(" "));
        }
        spans.push(Span::styled(
            format!("{} ", process.status.icon()),
            Style::default().fg(process.status.color()),
        ));
        spans.push(Span::raw(name.clone()));
        lines.push(Line::from(spans).style(row_style));
    }
    frame.render_widget(Paragraph::new(Text::from(lines)), area);
}

fn render_output_panel(frame: &mut Frame, area: Rect, app: &App, pm: &ProcessManager) {
    let selected = pm.process_names().get(app.selected_index);
    let process = selected.and_then(|name| pm.get_process(name));
    let Some(process) = process else {
        let empty = Paragraph::new("No process selected").style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, area);
        return;
    };

    let width = area.width as usize;
    let height = area.height as usize;
    if width == 0 || height == 0 {
        return;
    }

    let rows = build_display_rows(process, width);
    let total = rows.len().max(1);
    let start = process.scroll_offset.min(total.saturating_sub(1));
    let end = (start + height).min(rows.len());
    let visible: Vec<Line> = if start < end {
        rows[start..end].to_vec()
    } else {
        Vec::new()
    };
    frame.render_widget(Paragraph::new(Text::from(visible)), area);

    if total > height {
        render_scrollbar(frame, area, total, height, start);
    }
}

/// Expands the screen buffer into display rows: trailing empty lines are
/// skipped, and each line is either wrapped into `width`-sized chunks or
/// truncated at `width` (truncation happens here only; the buffer keeps the
/// full line).
fn build_display_rows(process: &ManagedProcess, width: usize) -> Vec<Line<'static>> {
    let screen = &process.screen;
    let content = screen.content_line_count().min(screen.lines().len());
    let mut rows = Vec::with_capacity(content);
    for line in screen.lines().iter().take(content) {
        if process.wrap_enabled {
            if line.cells.is_empty() {
                rows.push(Line::default());
            } else {
                for chunk in line.cells.chunks(width) {
                    rows.push(cells_to_line(chunk));
                }
            }
        } else {
            let cut = line.cells.len().min(width);
            rows.push(cells_to_line(&line.cells[..cut]));
        }
    }
    rows
}

/// Converts cells into spans, merging runs that share a style to keep the
/// span count proportional to styling changes rather than characters.
fn cells_to_line(cells: &[Cell]) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut buf = String::new();
    let mut run_style: Option<Style> = None;
    for cell in cells {
        match run_style {
            Some(style) if style == cell.style => buf.push(cell.c),
            Some(style) => {
                spans.push(Span::styled(std::mem::take(&mut buf), style));
                run_style = Some(cell.style);
                buf.push(cell.c);
            }
            None => {
                run_style = Some(cell.style);
                buf.push(cell.c);
            }
        }
    }
    if let (Some(style), false) = (run_style, buf.is_empty()) {
        spans.push(Span::styled(buf, style));
    }
    Line::from(spans)
}

fn render_scrollbar(frame: &mut Frame, area: Rect, total: usize, height: usize, offset: usize) {
    let max_scroll = total - height;
    let thumb = ((height * height + total / 2) / total).max(1);
    let position = if max_scroll > 0 {
        ((height - thumb) * offset + max_scroll / 2) / max_scroll
    } else {
        0
    };

    let x = area.x + area.width - 1;
    let buf = frame.buffer_mut();
    for y in 0..height as u16 {
        let in_thumb = (y as usize) >= position && (y as usize) < position + thumb;
        if let Some(cell) = buf.cell_mut((x, area.y + y)) {
            if in_thumb {
                cell.set_symbol("█").set_style(Style::default().fg(Color::White));
            } else {
                cell.set_symbol("│")
                    .set_style(Style::default().fg(Color::DarkGray));
            }
        }
    }
}

fn render_status_bar(frame: &mut Frame, area: Rect, app: &App, pm: &ProcessManager) {
    let line = match app.mode {
        InputMode::Browse => Line::from(Span::styled(
            BROWSE_HINTS,
            Style::default().fg(Color::DarkGray),
        )),
        InputMode::Focus => {
            let name = pm
                .process_names()
                .get(app.selected_index)
                .map(String::as_str)
                .unwrap_or("?");
            let passthrough = pm
                .get_process(name)
                .map(|p| p.spec.decorators.passthrough)
                .unwrap_or(false);
            // Shift-Tab never exits focus when the process carries the `!`
            // decorator or the global --no-shift-tab flag is set.
            let exit_hint = if passthrough || app.no_shift_tab {
                "[Esc]"
            } else {
                "[Shift-Tab/Esc]"
            };
            Line::from(vec![
                Span::styled(
                    format!(" FOCUS: {} ", name),
                    Style::default()
                        .fg(Color::Black)
                        .bg(Color::Green)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    format!("— Type to interact, {} to exit focus mode", exit_hint),
                    Style::default().fg(Color::DarkGray),
                ),
            ])
        }
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn render_help(frame: &mut Frame, area: Rect) {
    let popup = centered_rect(60, 70, area);
    frame.render_widget(Clear, popup);

    let binding = |keys: &str, what: &str| {
        Line::from(vec![
            Span::styled(format!("{:<11}", keys), Style::default().fg(Color::Yellow)),
            Span::raw(what.to_string()),
        ])
    };
    let section = |title: &str| {
        Line::from(Span::styled(
            title.to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ))
    };

    let help_text = vec![
        section("Browse"),
        Line::from(""),
        binding("↑/k ↓/j", "Select process"),
        binding("Enter/Tab", "Focus selected process"),
        binding("r", "Restart selected process"),
        binding("A", "Restart all processes"),
        binding("x", "Kill selected process"),
        binding("g", "Toggle auto-scroll pin"),
        binding("t", "Scroll to top"),
        binding("b/G", "Scroll to bottom"),
        binding("PgUp/PgDn", "Scroll one page"),
        binding("w", "Toggle line wrap"),
        binding("?", "Toggle help"),
        binding("q / Ctrl+c", "Quit"),
        Line::from(""),
        section("Focus"),
        Line::from(""),
        binding("Esc", "Exit focus mode (forwarded for `!` names)"),
        binding("Shift-Tab", "Exit focus mode (forwarded for `!` names)"),
        binding("Ctrl+c", "Quit"),
        Line::from(""),
        section("Mouse"),
        Line::from(""),
        binding("Scroll", "Scroll output"),
        binding("Click", "Select process / focus output"),
        Line::from(""),
        Line::from(Span::styled(
            "Press any key to close",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Help ");
    frame.render_widget(Paragraph::new(help_text).block(block), popup);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::vertical([
        Constraint::Percentage((100 - percent_y) / 2),
        Constraint::Percentage(percent_y),
        Constraint::Percentage((100 - percent_y) / 2),
    ])
    .split(r);

    Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .split(popup_layout[1])[1]
}
