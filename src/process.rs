//! Data structures for tracking managed-process state.

use ratatui::style::Color;

use crate::config::ProcessSpec;
use crate::events::Generation;
use crate::pty::PtyHandle;
use crate::screen::Screen;

/// The current lifecycle status of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    /// Spawn is underway.
    Starting,
    /// Child is alive in its PTY.
    Running,
    /// Not running: killed by the user or exited cleanly.
    Stopped,
    /// Exited non-zero or failed to spawn; carries the exit code
    /// (`-1` for spawn failures).
    Error(i32),
}

impl ProcessStatus {
    pub fn icon(&self) -> &'static str {
        match self {
            ProcessStatus::Running => "●",
            ProcessStatus::Error(_) => "✗",
            ProcessStatus::Starting | ProcessStatus::Stopped => "○",
        }
    }

    pub fn color(&self) -> Color {
        match self {
            ProcessStatus::Running => Color::Green,
            ProcessStatus::Error(_) => Color::Red,
            ProcessStatus::Starting => Color::Yellow,
            ProcessStatus::Stopped => Color::Gray,
        }
    }
}

/// Runtime state of a single process in the fleet.
///
/// Created when the manager is built and destroyed only at teardown; a dead
/// process keeps its entry so its last output stays visible.
pub struct ManagedProcess {
    pub spec: ProcessSpec,
    pub status: ProcessStatus,
    /// Terminal model of everything the child has drawn.
    pub screen: Screen,
    /// `None` when not running.
    pub pty: Option<PtyHandle>,
    /// Bumped on every (re)start; events tagged with an older generation are
    /// discarded.
    pub generation: Generation,
    /// Display-line index of the topmost visible output row.
    pub scroll_offset: usize,
    /// Follow mode: pin the view to the newest output.
    pub auto_scroll: bool,
    /// Wrap long lines in the output panel instead of truncating.
    pub wrap_enabled: bool,
    pub exit_code: Option<i32>,
    /// Set by an explicit kill; suppresses exit-status noise and cancels any
    /// pending auto-restart.
    pub user_killed: bool,
}

impl ManagedProcess {
    pub fn new(spec: ProcessSpec, cols: usize, rows: usize) -> Self {
        let wrap_enabled = spec.decorators.wrap;
        Self {
            spec,
            status: ProcessStatus::Starting,
            screen: Screen::new(cols, rows),
            pty: None,
            generation: 0,
            scroll_offset: 0,
            auto_scroll: true,
            wrap_enabled,
            exit_code: None,
            user_killed: false,
        }
    }
}
