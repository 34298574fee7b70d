//! UI state and input handling.
//!
//! `App` is the view-side state machine: which process is selected, whether
//! the operator is focused into a process, and how keyboard and mouse input
//! map onto manager operations. In focus mode keystrokes are translated to
//! the byte sequences a real terminal would send and forwarded to the child's
//! PTY; scroll state lives on each `ManagedProcess`, so switching selection
//! keeps every process's position.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};

use crate::process::ManagedProcess;
use crate::runner::ProcessManager;

/// Columns reserved for the process list on the left.
pub const PROCESS_LIST_WIDTH: u16 = 20;
/// Display lines moved per wheel notch.
const WHEEL_SCROLL: usize = 3;

/// Modes of user interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Navigating the fleet; keys drive selection and lifecycle.
    Browse,
    /// Interacting with the selected process as if it owned the terminal.
    Focus,
}

/// View-side application state.
pub struct App {
    pub selected_index: usize,
    pub mode: InputMode,
    pub show_help: bool,
    pub should_quit: bool,
    /// Global: forward Shift-Tab instead of exiting focus mode.
    pub no_shift_tab: bool,
}

impl App {
    pub fn new(no_shift_tab: bool) -> Self {
        Self {
            selected_index: 0,
            mode: InputMode::Browse,
            show_help: false,
            should_quit: false,
            no_shift_tab,
        }
    }

    pub fn select_next(&mut self, count: usize) {
        if count > 0 {
            self.selected_index = (self.selected_index + 1) % count;
        }
    }

    pub fn select_prev(&mut self, count: usize) {
        if count > 0 {
            self.selected_index = (self.selected_index + count - 1) % count;
        }
    }

    pub fn enter_focus(&mut self) {
        self.mode = InputMode::Focus;
    }

    pub fn exit_focus(&mut self) {
        self.mode = InputMode::Browse;
    }

    pub fn handle_key(
        &mut self,
        key: KeyEvent,
        pm: &mut ProcessManager,
        visible_height: usize,
        viewport_width: usize,
    ) {
        // Ctrl-C is global: quit regardless of mode, never forwarded.
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }
        if self.show_help {
            self.show_help = false;
            return;
        }
        match self.mode {
            InputMode::Browse => self.handle_browse_key(key, pm, visible_height, viewport_width),
            InputMode::Focus => self.handle_focus_key(key, pm),
        }
    }

    fn handle_browse_key(
        &mut self,
        key: KeyEvent,
        pm: &mut ProcessManager,
        visible_height: usize,
        viewport_width: usize,
    ) {
        let count = pm.process_count();
        let selected_name = pm.process_names().get(self.selected_index).cloned();

        match key.code {
            KeyCode::Char('q') => self.should_quit = true,

            KeyCode::Up | KeyCode::Char('k') => self.select_prev(count),
            KeyCode::Down | KeyCode::Char('j') => self.select_next(count),

            KeyCode::Enter | KeyCode::Tab => self.enter_focus(),

            KeyCode::Char('r') => {
                if let Some(name) = selected_name {
                    let _ = pm.restart_process(&name);
                }
            }
            KeyCode::Char('A') => pm.restart_all(),
            KeyCode::Char('x') => {
                if let Some(name) = selected_name {
                    pm.kill_process(&name);
                }
            }

            KeyCode::Char('g') => {
                if let Some(process) = selected_process_mut(pm, &selected_name) {
                    if process.auto_scroll {
                        process.auto_scroll = false;
                    } else {
                        scroll_to_bottom(process, visible_height, viewport_width);
                    }
                }
            }
            KeyCode::Char('t') => {
                if let Some(process) = selected_process_mut(pm, &selected_name) {
                    scroll_to_top(process);
                }
            }
            KeyCode::Char('b') | KeyCode::Char('G') => {
                if let Some(process) = selected_process_mut(pm, &selected_name) {
                    scroll_to_bottom(process, visible_height, viewport_width);
                }
            }
            KeyCode::PageUp => {
                if let Some(process) = selected_process_mut(pm, &selected_name) {
                    scroll_up(process, visible_height.max(1));
                }
            }
            KeyCode::PageDown => {
                if let Some(process) = selected_process_mut(pm, &selected_name) {
                    scroll_down(process, visible_height.max(1), visible_height, viewport_width);
                }
            }

            KeyCode::Char('w') => {
                if let Some(process) = selected_process_mut(pm, &selected_name) {
                    process.wrap_enabled = !process.wrap_enabled;
                }
            }

            KeyCode::Char('?') => self.show_help = !self.show_help,

            _ => {}
        }
    }

    fn handle_focus_key(&mut self, key: KeyEvent, pm: &mut ProcessManager) {
        let Some(name) = pm.process_names().get(self.selected_index).cloned() else {
            return;
        };
        let passthrough = pm
            .get_process(&name)
            .map(|p| p.spec.decorators.passthrough)
            .unwrap_or(false);

        match key.code {
            KeyCode::Esc if !passthrough => {
                self.exit_focus();
                return;
            }
            KeyCode::BackTab if !passthrough && !self.no_shift_tab => {
                self.exit_focus();
                return;
            }
            KeyCode::BackTab => {
                pm.write_to_process(&name, b"\x1b[Z");
                return;
            }
            _ => {}
        }

        if let Some(bytes) = key_to_bytes(key) {
            pm.write_to_process(&name, &bytes);
        }
    }

    pub fn handle_mouse(
        &mut self,
        mouse: MouseEvent,
        pm: &mut ProcessManager,
        visible_height: usize,
        viewport_width: usize,
    ) {
        let selected_name = pm.process_names().get(self.selected_index).cloned();

        match mouse.kind {
            MouseEventKind::ScrollUp => {
                if let Some(process) = selected_process_mut(pm, &selected_name) {
                    scroll_up(process, WHEEL_SCROLL);
                }
            }
            MouseEventKind::ScrollDown => {
                if let Some(process) = selected_process_mut(pm, &selected_name) {
                    scroll_down(process, WHEEL_SCROLL, visible_height, viewport_width);
                }
            }
            MouseEventKind::Down(MouseButton::Left) => {
                let row = mouse.row as usize;
                if row >= visible_height {
                    // Status bar
                    self.exit_focus();
                } else if mouse.column < PROCESS_LIST_WIDTH {
                    self.exit_focus();
                    if row < pm.process_count() {
                        self.selected_index = row;
                    }
                } else if mouse.column >= PROCESS_LIST_WIDTH + 1 {
                    self.enter_focus();
                }
            }
            _ => {}
        }
    }
}

fn selected_process_mut<'a>(
    pm: &'a mut ProcessManager,
    name: &Option<String>,
) -> Option<&'a mut ManagedProcess> {
    name.as_deref().and_then(|n| pm.get_process_mut(n))
}

/// Scrolling up always unpins the view.
pub fn scroll_up(process: &mut ManagedProcess, amount: usize) {
    process.scroll_offset = process.scroll_offset.saturating_sub(amount);
    process.auto_scroll = false;
}

/// Scrolling back down re-pins once the view is within one line of the
/// bottom.
pub fn scroll_down(
    process: &mut ManagedProcess,
    amount: usize,
    visible_height: usize,
    viewport_width: usize,
) {
    let total = process
        .screen
        .display_line_count(viewport_width, process.wrap_enabled);
    let max_scroll = total.saturating_sub(visible_height);
    let next = (process.scroll_offset + amount).min(max_scroll);
    process.scroll_offset = next;
    if max_scroll.saturating_sub(next) <= 1 {
        process.auto_scroll = true;
    }
}

pub fn scroll_to_top(process: &mut ManagedProcess) {
    process.scroll_offset = 0;
    process.auto_scroll = false;
}

pub fn scroll_to_bottom(process: &mut ManagedProcess, visible_height: usize, viewport_width: usize) {
    let total = process
        .screen
        .display_line_count(viewport_width, process.wrap_enabled);
    process.scroll_offset = total.saturating_sub(visible_height);
    process.auto_scroll = true;
}

/// Translates a key event into the bytes a real terminal would send.
fn key_to_bytes(key: KeyEvent) -> Option<Vec<u8>> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);

    let bytes = match key.code {
        KeyCode::Char(c) => {
            if ctrl {
                // Ctrl+A = 0x01 … Ctrl+Z = 0x1A
                let ctrl_byte = (c.to_ascii_lowercase() as u8).saturating_sub(b'a' - 1);
                if alt {
                    vec![0x1b, ctrl_byte]
                } else {
                    vec![ctrl_byte]
                }
            } else if alt {
                let mut bytes = vec![0x1b];
                bytes.extend(c.to_string().into_bytes());
                bytes
            } else {
                c.to_string().into_bytes()
            }
        }
        KeyCode::Enter => vec![0x0d],
        KeyCode::Tab => vec![0x09],
        KeyCode::Backspace => vec![0x7f],
        KeyCode::Esc => vec![0x1b],
        KeyCode::Up => vec![0x1b, b'[', b'A'],
        KeyCode::Down => vec![0x1b, b'[', b'B'],
        KeyCode::Right => vec![0x1b, b'[', b'C'],
        KeyCode::Left => vec![0x1b, b'[', b'D'],
        KeyCode::Home => vec![0x1b, b'[', b'H'],
        KeyCode::End => vec![0x1b, b'[', b'F'],
        KeyCode::Insert => vec![0x1b, b'[', b'2', b'~'],
        KeyCode::Delete => vec![0x1b, b'[', b'3', b'~'],
        KeyCode::PageUp => vec![0x1b, b'[', b'5', b'~'],
        KeyCode::PageDown => vec![0x1b, b'[', b'6', b'~'],
        KeyCode::F(n) => match n {
            1 => vec![0x1b, b'O', b'P'],
            2 => vec![0x1b, b'O', b'Q'],
            3 => vec![0x1b, b'O', b'R'],
            4 => vec![0x1b, b'O', b'S'],
            5 => vec![0x1b, b'[', b'1', b'5', b'~'],
            6 => vec![0x1b, b'[', b'1', b'7', b'~'],
            7 => vec![0x1b, b'[', b'1', b'8', b'~'],
            8 => vec![0x1b, b'[', b'1', b'9', b'~'],
            9 => vec![0x1b, b'[', b'2', b'0', b'~'],
            10 => vec![0x1b, b'[', b'2', b'1', b'~'],
            11 => vec![0x1b, b'[', b'2', b'3', b'~'],
            12 => vec![0x1b, b'[', b'2', b'4', b'~'],
            _ => return None,
        },
        _ => return None,
    };

    Some(bytes)
}
