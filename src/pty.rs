//! PTY ownership for a single child process.
//!
//! Wraps `portable-pty`: opens a pseudo-terminal at the output-panel size and
//! spawns the platform shell on the slave side, which makes the shell a
//! session leader (its PID equals its process-group ID). Exposes write,
//! resize, and a fire-and-forget kill that signals the whole process group:
//! SIGTERM, a short grace period, then SIGKILL.

use std::io::{Read, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};

use crate::config::ProcessSpec;

pub type SharedChild = Arc<Mutex<Box<dyn Child + Send + Sync>>>;

pub struct PtyHandle {
    master: Mutex<Box<dyn MasterPty + Send>>,
    writer: Mutex<Box<dyn Write + Send>>,
    child: SharedChild,
    kill_grace: Duration,
}

impl PtyHandle {
    /// Opens a PTY of the given size and spawns `spec.command` under the
    /// platform shell. Returns the handle plus the master-side reader for the
    /// caller's reader thread.
    pub fn spawn(
        spec: &ProcessSpec,
        cols: u16,
        rows: u16,
        kill_grace: Duration,
    ) -> Result<(Self, Box<dyn Read + Send>)> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .context("failed to open pty")?;

        let mut cmd = if cfg!(windows) {
            let mut cmd = CommandBuilder::new("powershell.exe");
            cmd.args(["-c", spec.command.as_str()]);
            cmd
        } else {
            let mut cmd = CommandBuilder::new("bash");
            cmd.args(["-c", spec.command.as_str()]);
            cmd
        };
        if let Some(cwd) = &spec.cwd {
            cmd.cwd(cwd);
        }
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }
        cmd.env("TERM", "xterm-256color");

        let child = pair
            .slave
            .spawn_command(cmd)
            .with_context(|| format!("failed to spawn `{}`", spec.command))?;

        let reader = pair
            .master
            .try_clone_reader()
            .context("failed to clone pty reader")?;
        let writer = pair
            .master
            .take_writer()
            .context("failed to take pty writer")?;

        Ok((
            Self {
                master: Mutex::new(pair.master),
                writer: Mutex::new(writer),
                child: Arc::new(Mutex::new(child)),
                kill_grace,
            },
            reader,
        ))
    }

    /// Shared child handle; the reader thread uses it to reap the process and
    /// collect its exit code after EOF.
    pub fn child(&self) -> SharedChild {
        Arc::clone(&self.child)
    }

    pub fn write(&self, data: &[u8]) -> Result<()> {
        let mut writer = self.writer.lock().map_err(|_| anyhow!("writer poisoned"))?;
        writer.write_all(data).context("pty write failed")?;
        writer.flush().context("pty flush failed")?;
        Ok(())
    }

    pub fn resize(&self, cols: u16, rows: u16) -> Result<()> {
        let master = self.master.lock().map_err(|_| anyhow!("master poisoned"))?;
        master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .context("pty resize failed")?;
        Ok(())
    }

    /// Kills the child's entire process group without blocking the caller:
    /// SIGTERM to `-pid`, wait the grace period, SIGKILL to `-pid`. Children
    /// that re-parent into their own group are not guaranteed to die. The
    /// reader thread reaps the child when the PTY reaches EOF.
    pub fn kill(&self) {
        let child = Arc::clone(&self.child);
        let grace = self.kill_grace;
        std::thread::spawn(move || kill_child_group(&child, grace));
    }
}

#[cfg(unix)]
fn kill_child_group(child: &SharedChild, grace: Duration) {
    let pid = child
        .lock()
        .ok()
        .and_then(|c| c.process_id())
        .map(|pid| pid as i32);
    let Some(pid) = pid else { return };
    unsafe {
        libc::kill(-pid, libc::SIGTERM);
    }
    std::thread::sleep(grace);
    unsafe {
        libc::kill(-pid, libc::SIGKILL);
    }
}

#[cfg(windows)]
fn kill_child_group(child: &SharedChild, grace: Duration) {
    use windows_sys::Win32::System::Console::{GenerateConsoleCtrlEvent, CTRL_BREAK_EVENT};

    // Windows has no process-group signals; CTRL_BREAK is the closest console
    // event, followed by a hard kill after the grace period.
    let pid = child.lock().ok().and_then(|c| c.process_id());
    if let Some(pid) = pid {
        unsafe {
            GenerateConsoleCtrlEvent(CTRL_BREAK_EVENT, pid);
        }
        std::thread::sleep(grace);
    }
    if let Ok(mut child) = child.lock() {
        let _ = child.kill();
    }
}

#[cfg(all(not(unix), not(windows)))]
fn kill_child_group(child: &SharedChild, _grace: Duration) {
    if let Ok(mut child) = child.lock() {
        let _ = child.kill();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Instant;

    use crate::config::Decorators;

    fn spec(command: &str) -> ProcessSpec {
        ProcessSpec {
            name: "test".into(),
            decorators: Decorators::default(),
            command: command.into(),
            cwd: None,
            env: HashMap::new(),
            auto_restart: false,
        }
    }

    #[test]
    #[cfg(unix)]
    fn spawn_captures_output_until_eof() {
        let (handle, mut reader) =
            PtyHandle::spawn(&spec("printf hello"), 80, 24, Duration::from_millis(50)).unwrap();
        let mut collected = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => collected.extend_from_slice(&buf[..n]),
                Err(_) => break,
            }
        }
        let text = String::from_utf8_lossy(&collected);
        assert!(text.contains("hello"), "got: {:?}", text);
        let code = handle
            .child()
            .lock()
            .unwrap()
            .wait()
            .map(|status| status.exit_code())
            .unwrap_or(99);
        assert_eq!(code, 0);
    }

    #[test]
    #[cfg(unix)]
    fn kill_terminates_a_sigterm_ignoring_child() {
        let (handle, mut reader) = PtyHandle::spawn(
            &spec("trap '' TERM; sleep 30"),
            80,
            24,
            Duration::from_millis(50),
        )
        .unwrap();
        let start = Instant::now();
        handle.kill();
        // EOF arrives once the group is gone; SIGKILL fires after ~50 ms.
        let mut buf = [0u8; 1024];
        loop {
            match reader.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
        }
        assert!(
            start.elapsed() < Duration::from_secs(5),
            "kill did not take effect"
        );
    }
}
