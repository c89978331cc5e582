//! The user's controlling terminal.

use std::io::{self, IsTerminal, Read};

use crossterm::terminal;
use jumpline_pty::WindowSize;
use tokio::sync::mpsc;

/// Puts stdin into raw mode for as long as it lives.
///
/// Does nothing when stdin is not a terminal.
#[derive(Debug)]
pub struct RawModeGuard {
    active: bool,
}

impl RawModeGuard {
    /// Enter raw mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal mode cannot be changed.
    pub fn enable() -> io::Result<Self> {
        if !io::stdin().is_terminal() {
            return Ok(Self { active: false });
        }
        terminal::enable_raw_mode()?;
        Ok(Self { active: true })
    }

    /// Whether raw mode was actually entered.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if self.active {
            let _ = terminal::disable_raw_mode();
        }
    }
}

/// Size of the controlling terminal, if stdout is one.
#[must_use]
pub fn current_size() -> Option<WindowSize> {
    if !io::stdout().is_terminal() {
        return None;
    }
    terminal::size()
        .ok()
        .map(WindowSize::from)
        .filter(|size| !size.is_empty())
}

/// Read stdin on a dedicated thread and deliver it through a channel.
///
/// The channel closes at end of input. The thread stays blocked in `read`
/// after the receiver is dropped until the next keystroke or process exit.
#[must_use]
pub fn spawn_stdin_reader() -> mpsc::Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel(32);
    let spawned = std::thread::Builder::new()
        .name("jumpline-stdin".into())
        .spawn(move || {
            let mut stdin = io::stdin().lock();
            let mut buf = [0u8; 1024];
            loop {
                match stdin.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.blocking_send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                    Err(e) => {
                        tracing::debug!(error = %e, "stdin read failed");
                        break;
                    }
                }
            }
        });
    if let Err(e) = spawned {
        tracing::warn!(error = %e, "could not start stdin reader; input disabled");
    }
    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_without_terminal_is_inert() {
        // Test harnesses do not run with a terminal on stdin.
        if io::stdin().is_terminal() {
            return;
        }
        let guard = RawModeGuard::enable().unwrap();
        assert!(!guard.is_active());
    }
}
