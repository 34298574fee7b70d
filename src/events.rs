//! Event definitions for the application event loop.
//!
//! Everything that can happen (PTY output, process exits, user input, host
//! resizes) is funneled into a single `AppEvent` channel consumed by the main
//! loop, which is the only mutator of process and screen state.

use crossterm::event::{KeyEvent, MouseEvent};

/// Per-process start counter. Incremented on every (re)start; readers tag
/// their events with the generation they were launched under so the manager
/// can discard output arriving from a reader that outlived a restart.
pub type Generation = u64;

/// Represents an event in the application's main event loop.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// Raw bytes read from a process's PTY.
    Output {
        name: String,
        gen: Generation,
        data: Vec<u8>,
    },
    /// A process's PTY reached end-of-file; carries the best-effort exit code
    /// (`-1` when the child could not be reaped).
    Exited {
        name: String,
        gen: Generation,
        code: i32,
    },
    /// The PTY reader hit an unexpected read error.
    Error {
        name: String,
        gen: Generation,
        message: String,
    },
    /// A delayed auto-restart is due.
    RestartRequest { name: String, gen: Generation },
    /// A keyboard event received from the user.
    Key(KeyEvent),
    /// A mouse event received from the user.
    Mouse(MouseEvent),
    /// The host terminal was resized.
    Resize { width: u16, height: u16 },
}
