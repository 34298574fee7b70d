//! Process fleet ownership and lifecycle control.
//!
//! `ProcessManager` owns every `ManagedProcess`, spawns PTYs and their reader
//! threads, and applies events delivered back to it by the main loop. Readers
//! never touch shared state: they only emit `AppEvent`s tagged with the
//! generation they were started under, and every handler here compares that
//! generation against the process's current one before acting. A reader that
//! outlived a restart can therefore never corrupt the new instance's screen.

use std::collections::HashMap;
use std::io::Read;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio::sync::mpsc;

use crate::config::ProcessSpec;
use crate::events::{AppEvent, Generation};
use crate::process::{ManagedProcess, ProcessStatus};
use crate::pty::{PtyHandle, SharedChild};
use crate::screen::Screen;

/// Delay before an auto-restart after a non-zero exit.
const RESTART_DELAY: Duration = Duration::from_secs(1);

/// Manages the lifecycle and I/O of the PTY-backed process fleet.
pub struct ProcessManager {
    processes: HashMap<String, ManagedProcess>,
    order: Vec<String>,
    event_tx: mpsc::Sender<AppEvent>,
    cols: u16,
    rows: u16,
    kill_grace: Duration,
}

impl ProcessManager {
    /// `cols`/`rows` are the output-panel dimensions advertised to children.
    pub fn new(event_tx: mpsc::Sender<AppEvent>, cols: u16, rows: u16, kill_grace_ms: u64) -> Self {
        Self {
            processes: HashMap::new(),
            order: Vec::new(),
            event_tx,
            cols,
            rows,
            kill_grace: Duration::from_millis(kill_grace_ms),
        }
    }

    pub fn add_process(&mut self, spec: ProcessSpec) {
        let name = spec.name.clone();
        let process = ManagedProcess::new(spec, self.cols as usize, self.rows as usize);
        self.processes.insert(name.clone(), process);
        self.order.push(name);
    }

    /// Starts every process, reporting how many spawned successfully. Spawn
    /// failures are written into the affected screens and do not stop the
    /// rest of the fleet from starting.
    pub fn start_all(&mut self) -> usize {
        let names = self.order.clone();
        let mut started = 0;
        for name in names {
            if self.start_process(&name).is_ok() {
                started += 1;
            }
        }
        started
    }

    /// (Re)spawns one process. An existing handle is killed first; the
    /// generation is bumped so the old reader's remaining events are ignored.
    pub fn start_process(&mut self, name: &str) -> Result<()> {
        let (cols, rows, kill_grace) = (self.cols, self.rows, self.kill_grace);
        let process = self
            .processes
            .get_mut(name)
            .ok_or_else(|| anyhow!("unknown process: {}", name))?;

        if let Some(pty) = process.pty.take() {
            pty.kill();
        }
        process.generation += 1;
        process.status = ProcessStatus::Starting;
        process.user_killed = false;
        process.exit_code = None;
        let generation = process.generation;

        match PtyHandle::spawn(&process.spec, cols, rows, kill_grace) {
            Ok((pty, reader)) => {
                spawn_reader(
                    name.to_string(),
                    generation,
                    reader,
                    pty.child(),
                    self.event_tx.clone(),
                );
                process.pty = Some(pty);
                process.status = ProcessStatus::Running;
                Ok(())
            }
            Err(err) => {
                process.status = ProcessStatus::Error(-1);
                let message = format!("panex: {:#}\r\n", err);
                process.screen.write(message.as_bytes());
                Err(err)
            }
        }
    }

    /// Kill, clear the screen, start again.
    pub fn restart_process(&mut self, name: &str) -> Result<()> {
        self.reset_for_restart(name);
        self.start_process(name)
    }

    /// Kills every process first, then starts them all.
    pub fn restart_all(&mut self) {
        let names = self.order.clone();
        for name in &names {
            self.reset_for_restart(name);
        }
        for name in &names {
            let _ = self.start_process(name);
        }
    }

    fn reset_for_restart(&mut self, name: &str) {
        let (cols, rows) = (self.cols as usize, self.rows as usize);
        if let Some(process) = self.processes.get_mut(name) {
            if let Some(pty) = process.pty.take() {
                pty.kill();
            }
            process.screen = Screen::new(cols, rows);
            process.scroll_offset = 0;
            process.auto_scroll = true;
        }
    }

    /// Kills the process group but keeps the entry so its last output stays
    /// visible.
    pub fn kill_process(&mut self, name: &str) {
        if let Some(process) = self.processes.get_mut(name) {
            process.user_killed = true;
            if let Some(pty) = process.pty.take() {
                pty.kill();
            }
            process.status = ProcessStatus::Stopped;
        }
    }

    pub fn kill_all(&mut self) {
        let names = self.order.clone();
        for name in names {
            self.kill_process(&name);
        }
    }

    /// Forwards bytes to the process's PTY; a no-op for dead processes.
    pub fn write_to_process(&self, name: &str, data: &[u8]) {
        if let Some(process) = self.processes.get(name) {
            if let Some(pty) = &process.pty {
                let _ = pty.write(data);
            }
        }
    }

    /// Applies new output-panel dimensions to every screen and PTY.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        self.cols = cols;
        self.rows = rows;
        for process in self.processes.values_mut() {
            process.screen.resize(cols as usize, rows as usize);
            if let Some(pty) = &process.pty {
                let _ = pty.resize(cols, rows);
            }
        }
    }

    /// Feeds PTY output into the screen, answers any capability queries the
    /// child raised, and keeps the view pinned to the bottom while following.
    pub fn handle_output(&mut self, name: &str, gen: Generation, data: &[u8]) {
        let (cols, rows) = (self.cols as usize, self.rows as usize);
        let Some(process) = self.processes.get_mut(name) else {
            return;
        };
        if process.generation != gen {
            return;
        }

        let evicted = process.screen.write(data);
        if evicted > 0 {
            process.scroll_offset = process.scroll_offset.saturating_sub(evicted);
        }

        for reply in process.screen.take_pending_responses() {
            if let Some(pty) = &process.pty {
                let _ = pty.write(&reply);
            }
        }

        if process.auto_scroll {
            let total = process.screen.display_line_count(cols, process.wrap_enabled);
            // Strictly greater: the empty cursor row below the last content
            // row must not pull the view down (it causes one-row flicker in
            // full-screen children).
            process.scroll_offset = if total > rows { total - rows } else { 0 };
        }
    }

    /// Records an exit and, for auto-restart processes that failed, schedules
    /// a restart request tagged with the exiting generation.
    pub fn handle_exit(&mut self, name: &str, gen: Generation, code: i32) {
        let Some(process) = self.processes.get_mut(name) else {
            return;
        };
        if process.generation != gen {
            return;
        }

        process.pty = None;
        process.exit_code = Some(code);
        if process.user_killed {
            process.status = ProcessStatus::Stopped;
            return;
        }
        process.status = if code == 0 {
            ProcessStatus::Stopped
        } else {
            ProcessStatus::Error(code)
        };

        if code != 0 && process.spec.auto_restart {
            let tx = self.event_tx.clone();
            let name = name.to_string();
            tokio::spawn(async move {
                tokio::time::sleep(RESTART_DELAY).await;
                let _ = tx.send(AppEvent::RestartRequest { name, gen }).await;
            });
        }
    }

    /// Surfaces a reader error inside the process's screen. Status is left to
    /// the exit event that follows.
    pub fn handle_error(&mut self, name: &str, gen: Generation, message: &str) {
        if let Some(process) = self.processes.get_mut(name) {
            if process.generation != gen || process.user_killed {
                return;
            }
            let text = format!("panex: read error: {}\r\n", message);
            process.screen.write(text.as_bytes());
        }
    }

    /// A delayed auto-restart fired; drop it if the process moved on (new
    /// generation) or the user killed it in the meantime.
    pub fn handle_restart_request(&mut self, name: &str, gen: Generation) {
        let Some(process) = self.processes.get(name) else {
            return;
        };
        if process.generation != gen || process.user_killed {
            return;
        }
        if process.status == ProcessStatus::Stopped {
            return;
        }
        let _ = self.restart_process(name);
    }

    pub fn get_process(&self, name: &str) -> Option<&ManagedProcess> {
        self.processes.get(name)
    }

    pub fn get_process_mut(&mut self, name: &str) -> Option<&mut ManagedProcess> {
        self.processes.get_mut(name)
    }

    pub fn process_names(&self) -> &[String] {
        &self.order
    }

    pub fn process_count(&self) -> usize {
        self.order.len()
    }
}

/// One reader thread per start. Blocks on the PTY master, forwarding chunks
/// tagged with `(name, generation)`; on EOF it reaps the child for its exit
/// code and terminates. Sends apply backpressure via the bounded channel.
fn spawn_reader(
    name: String,
    gen: Generation,
    mut reader: Box<dyn Read + Send>,
    child: SharedChild,
    tx: mpsc::Sender<AppEvent>,
) {
    std::thread::spawn(move || {
        let mut buf = [0u8; 4096];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    let event = AppEvent::Output {
                        name: name.clone(),
                        gen,
                        data: buf[..n].to_vec(),
                    };
                    if tx.blocking_send(event).is_err() {
                        return;
                    }
                }
                Err(err) => {
                    // Linux reports EIO on the master once the child side is
                    // gone; that is an ordinary EOF, not a failure.
                    if !is_hangup(&err) {
                        let _ = tx.blocking_send(AppEvent::Error {
                            name: name.clone(),
                            gen,
                            message: err.to_string(),
                        });
                    }
                    break;
                }
            }
        }

        let code = child
            .lock()
            .ok()
            .and_then(|mut child| child.wait().ok())
            .map(|status| status.exit_code() as i32)
            .unwrap_or(-1);
        let _ = tx.blocking_send(AppEvent::Exited { name, gen, code });
    });
}

#[cfg(unix)]
fn is_hangup(err: &std::io::Error) -> bool {
    err.raw_os_error() == Some(libc::EIO)
}

#[cfg(not(unix))]
fn is_hangup(_err: &std::io::Error) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;

    use crate::config::Decorators;

    fn spec(name: &str) -> ProcessSpec {
        ProcessSpec {
            name: name.into(),
            decorators: Decorators::default(),
            command: "true".into(),
            cwd: None,
            env: StdHashMap::new(),
            auto_restart: false,
        }
    }

    fn manager() -> ProcessManager {
        let (tx, _rx) = mpsc::channel(16);
        let mut pm = ProcessManager::new(tx, 80, 24, 50);
        pm.add_process(spec("p"));
        pm
    }

    fn screen_text(pm: &ProcessManager, name: &str) -> String {
        pm.get_process(name)
            .unwrap()
            .screen
            .lines()
            .iter()
            .flat_map(|line| line.cells.iter().map(|c| c.c))
            .collect()
    }

    #[test]
    fn stale_generation_output_is_discarded() {
        let mut pm = manager();
        pm.get_process_mut("p").unwrap().generation = 2;
        pm.handle_output("p", 1, b"stale");
        assert!(!screen_text(&pm, "p").contains("stale"));
        pm.handle_output("p", 2, b"fresh");
        assert!(screen_text(&pm, "p").contains("fresh"));
    }

    #[test]
    fn stale_generation_exit_is_discarded() {
        let mut pm = manager();
        {
            let process = pm.get_process_mut("p").unwrap();
            process.generation = 2;
            process.status = ProcessStatus::Running;
        }
        pm.handle_exit("p", 1, 9);
        assert_eq!(
            pm.get_process("p").unwrap().status,
            ProcessStatus::Running
        );
    }

    #[test]
    fn exit_codes_map_to_status() {
        let mut pm = manager();
        pm.handle_exit("p", 0, 0);
        assert_eq!(pm.get_process("p").unwrap().status, ProcessStatus::Stopped);
        pm.handle_exit("p", 0, 3);
        assert_eq!(pm.get_process("p").unwrap().status, ProcessStatus::Error(3));
        assert_eq!(pm.get_process("p").unwrap().exit_code, Some(3));
    }

    #[test]
    fn user_kill_suppresses_error_status() {
        let mut pm = manager();
        pm.kill_process("p");
        assert_eq!(pm.get_process("p").unwrap().status, ProcessStatus::Stopped);
        // The reader's trailing exit event (same generation) must not flip
        // the killed process into an error state.
        pm.handle_exit("p", 0, 137);
        assert_eq!(pm.get_process("p").unwrap().status, ProcessStatus::Stopped);
    }

    #[test]
    fn following_view_pins_to_bottom_with_strict_comparison() {
        let mut pm = manager();
        // Exactly filling the viewport plus a trailing newline must not
        // scroll: the empty cursor row is not content.
        let mut data = Vec::new();
        for i in 0..24 {
            data.extend_from_slice(format!("row{}\n", i).as_bytes());
        }
        pm.handle_output("p", 0, &data);
        assert_eq!(pm.get_process("p").unwrap().scroll_offset, 0);

        pm.handle_output("p", 0, b"row24\n");
        assert_eq!(pm.get_process("p").unwrap().scroll_offset, 1);
    }

    #[test]
    fn eviction_shifts_a_pinned_scroll_offset() {
        let mut pm = manager();
        {
            let process = pm.get_process_mut("p").unwrap();
            process.auto_scroll = false;
        }
        let line = b"x\n".repeat(crate::screen::MAX_SCROLLBACK);
        pm.handle_output("p", 0, &line);
        {
            let process = pm.get_process_mut("p").unwrap();
            process.scroll_offset = 10;
        }
        pm.handle_output("p", 0, b"x\nx\nx\nx\nx\n");
        assert_eq!(pm.get_process("p").unwrap().scroll_offset, 5);
    }

    #[test]
    fn restart_request_is_dropped_after_user_kill() {
        let mut pm = manager();
        {
            let process = pm.get_process_mut("p").unwrap();
            process.generation = 1;
            process.status = ProcessStatus::Error(1);
        }
        pm.kill_process("p");
        pm.handle_restart_request("p", 1);
        assert_eq!(pm.get_process("p").unwrap().status, ProcessStatus::Stopped);
    }

    #[test]
    fn restart_request_with_stale_generation_is_dropped() {
        let mut pm = manager();
        {
            let process = pm.get_process_mut("p").unwrap();
            process.generation = 3;
            process.status = ProcessStatus::Error(1);
        }
        pm.handle_restart_request("p", 2);
        assert_eq!(pm.get_process("p").unwrap().status, ProcessStatus::Error(1));
    }

    #[test]
    fn reader_errors_surface_in_the_screen() {
        let mut pm = manager();
        pm.handle_error("p", 0, "boom");
        assert!(screen_text(&pm, "p").contains("read error: boom"));
        // Stale-generation errors are ignored.
        pm.get_process_mut("p").unwrap().generation = 5;
        pm.handle_error("p", 0, "late");
        assert!(!screen_text(&pm, "p").contains("late"));
    }
}
