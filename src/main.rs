//! Panex: run several commands in PTYs behind a split-pane TUI.
//!
//! This is the entry point of the application. It parses command-line
//! arguments, builds the process fleet, and runs the single event loop that
//! owns the host terminal: PTY readers and the input listener feed one
//! channel, and this loop is the only place process or screen state mutates.

mod app;
mod config;
mod events;
mod process;
mod pty;
mod runner;
mod screen;
mod tui;

use std::time::{Duration, Instant};

use anyhow::Result;
use clap::builder::styling::{AnsiColor, Effects, Style};
use clap::builder::Styles;
use clap::Parser;
use tokio::sync::mpsc;

use crate::app::{App, PROCESS_LIST_WIDTH};
use crate::config::Config;
use crate::events::AppEvent;
use crate::runner::ProcessManager;

/// Host resize events are coalesced for this long before children are told.
const RESIZE_DEBOUNCE: Duration = Duration::from_millis(50);
/// Loop tick: fires the resize deadline and keeps redraws flowing.
const TICK_RATE: Duration = Duration::from_millis(50);

/// Command-line interface definition.
#[derive(Debug, Parser)]
#[command(
    name = "panex",
    version,
    about = "Run commands in PTYs behind a split-pane TUI",
    styles = help_styles(),
    color = clap::ColorChoice::Always
)]
struct Cli {
    /// Shell commands to run, one per process.
    #[arg(required = true)]
    commands: Vec<String>,
    /// Comma-separated process names aligned with the commands.
    ///
    /// A name may end in `!` (keep Esc/Shift-Tab flowing to the child) and/or
    /// `:w` (wrap long lines), in any order.
    #[arg(short, long)]
    names: Option<String>,
    /// Working directories aligned with the command list (one shared value or
    /// one per command).
    #[arg(long)]
    cwd: Vec<String>,
    /// Env entries (KEY=VAL, or name:KEY=VAL for per-process).
    #[arg(long)]
    env: Vec<String>,
    /// Restart processes that exit with a failure.
    #[arg(long)]
    restart_on_fail: bool,
    /// Grace period between SIGTERM and SIGKILL (ms).
    #[arg(long, default_value_t = 50)]
    kill_timeout_ms: u64,
    /// Forward Shift-Tab to every child instead of exiting focus mode.
    #[arg(long)]
    no_shift_tab: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_args(
        cli.commands,
        cli.names,
        cli.cwd,
        cli.env,
        cli.restart_on_fail,
        cli.no_shift_tab,
        cli.kill_timeout_ms,
    )?;
    run(config).await
}

async fn run(config: Config) -> Result<()> {
    let mut terminal = tui::init_terminal()?;
    let result = run_app(&mut terminal, config).await;
    tui::restore_terminal(terminal)?;
    result
}

async fn run_app(terminal: &mut tui::TuiTerminal, config: Config) -> Result<()> {
    let (event_tx, mut event_rx) = mpsc::channel::<AppEvent>(256);

    let size = terminal.size()?;
    // Output panel gets everything right of the process list and delimiter,
    // minus the status bar row.
    let output_cols = size.width.saturating_sub(PROCESS_LIST_WIDTH + 1);
    let output_rows = size.height.saturating_sub(1);
    let mut pm = ProcessManager::new(
        event_tx.clone(),
        output_cols,
        output_rows,
        config.kill_timeout_ms,
    );
    for spec in config.processes {
        pm.add_process(spec);
    }
    if pm.start_all() == 0 {
        anyhow::bail!("no process could be started");
    }

    let mut app = App::new(config.no_shift_tab);
    spawn_input_listener(event_tx.clone());

    let mut ticker = tokio::time::interval(TICK_RATE);
    let mut pending_resize: Option<(u16, u16)> = None;
    let mut resize_deadline: Option<Instant> = None;

    loop {
        if let Err(err) = tui::draw(&app, &pm, terminal) {
            // The host terminal is gone; all we can do is take the fleet down.
            shutdown(&mut pm).await;
            return Err(err.into());
        }

        if app.should_quit {
            shutdown(&mut pm).await;
            return Ok(());
        }

        // Apply a debounced resize once its deadline passes.
        if let (Some((cols, rows)), Some(deadline)) = (pending_resize, resize_deadline) {
            if Instant::now() >= deadline {
                pm.resize(
                    cols.saturating_sub(PROCESS_LIST_WIDTH + 1),
                    rows.saturating_sub(1),
                );
                pending_resize = None;
                resize_deadline = None;
            }
        }

        let term_size = match terminal.size() {
            Ok(size) => size,
            Err(err) => {
                shutdown(&mut pm).await;
                return Err(err.into());
            }
        };
        let visible_height = term_size.height.saturating_sub(1) as usize;
        let viewport_width = term_size.width.saturating_sub(PROCESS_LIST_WIDTH + 1) as usize;

        tokio::select! {
            Some(event) = event_rx.recv() => match event {
                AppEvent::Output { name, gen, data } => pm.handle_output(&name, gen, &data),
                AppEvent::Exited { name, gen, code } => pm.handle_exit(&name, gen, code),
                AppEvent::Error { name, gen, message } => pm.handle_error(&name, gen, &message),
                AppEvent::RestartRequest { name, gen } => pm.handle_restart_request(&name, gen),
                AppEvent::Key(key) => app.handle_key(key, &mut pm, visible_height, viewport_width),
                AppEvent::Mouse(mouse) => {
                    app.handle_mouse(mouse, &mut pm, visible_height, viewport_width)
                }
                AppEvent::Resize { width, height } => {
                    pending_resize = Some((width, height));
                    resize_deadline = Some(Instant::now() + RESIZE_DEBOUNCE);
                }
            },
            _ = ticker.tick() => {}
        }
    }
}

/// Kills every process group, then gives readers a moment to drain so their
/// final events don't race the terminal teardown.
async fn shutdown(pm: &mut ProcessManager) {
    pm.kill_all();
    tokio::time::sleep(Duration::from_millis(50)).await;
}

/// Pumps host-terminal input into the event channel from a dedicated thread;
/// the async loop never blocks on crossterm directly.
fn spawn_input_listener(tx: mpsc::Sender<AppEvent>) {
    std::thread::spawn(move || loop {
        if crossterm::event::poll(Duration::from_millis(50)).unwrap_or(false) {
            match crossterm::event::read() {
                Ok(crossterm::event::Event::Key(key)) => {
                    if tx.blocking_send(AppEvent::Key(key)).is_err() {
                        break;
                    }
                }
                Ok(crossterm::event::Event::Mouse(mouse)) => {
                    if tx.blocking_send(AppEvent::Mouse(mouse)).is_err() {
                        break;
                    }
                }
                Ok(crossterm::event::Event::Resize(width, height)) => {
                    if tx.blocking_send(AppEvent::Resize { width, height }).is_err() {
                        break;
                    }
                }
                _ => {}
            }
        }
    });
}

fn help_styles() -> Styles {
    Styles::styled()
        .header(
            Style::new()
                .fg_color(Some(AnsiColor::Cyan.into()))
                .effects(Effects::BOLD),
        )
        .usage(
            Style::new()
                .fg_color(Some(AnsiColor::Green.into()))
                .effects(Effects::BOLD),
        )
        .literal(Style::new().fg_color(Some(AnsiColor::Yellow.into())))
        .placeholder(Style::new().fg_color(Some(AnsiColor::Magenta.into())))
}
