//! Interactive pass-through once a login has reached a shell.
//!
//! This is a one-way door: the controlling terminal goes into raw mode,
//! keystrokes flow to the child, child output flows to stdout, and window
//! size changes are forwarded to the PTY until the child exits. Nothing is
//! matched or injected any more.

pub mod terminal;

use jumpline_pty::{ExitStatus, PtyChild, PtyMaster};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::signal::unix::{SignalKind, signal};

use crate::error::LoginError;

/// Relay between the user's terminal and `master` until the child exits.
///
/// `replay` holds the output already consumed during the automated phase
/// and is written to stdout before anything else.
///
/// # Errors
///
/// Returns [`LoginError::Io`] if the terminal or the PTY fails, or a PTY
/// error if the child cannot be reaped.
pub async fn run(
    mut master: PtyMaster,
    mut child: PtyChild,
    replay: Vec<u8>,
) -> Result<ExitStatus, LoginError> {
    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(&replay)
        .await
        .map_err(|e| LoginError::io("writing to terminal", e))?;
    stdout
        .flush()
        .await
        .map_err(|e| LoginError::io("writing to terminal", e))?;

    let raw = terminal::RawModeGuard::enable()
        .map_err(|e| LoginError::io("entering raw mode", e))?;

    if let Some(size) = terminal::current_size()
        && let Err(e) = master.resize(size)
    {
        tracing::debug!(error = %e, "initial resize failed");
    }

    let mut resizes = signal(SignalKind::window_change())
        .map_err(|e| LoginError::io("installing SIGWINCH handler", e))?;
    let mut input = terminal::spawn_stdin_reader();
    let mut input_open = true;
    let mut buf = [0u8; 4096];

    tracing::info!(pid = child.pid(), "interactive session started");

    loop {
        tokio::select! {
            read = master.read(&mut buf) => {
                let n = read.map_err(|e| LoginError::io("reading session output", e))?;
                if n == 0 {
                    break;
                }
                stdout
                    .write_all(&buf[..n])
                    .await
                    .map_err(|e| LoginError::io("writing to terminal", e))?;
                stdout
                    .flush()
                    .await
                    .map_err(|e| LoginError::io("writing to terminal", e))?;
            }

            keys = input.recv(), if input_open => {
                match keys {
                    Some(data) => {
                        master
                            .write_all(&data)
                            .await
                            .map_err(|e| LoginError::io("writing to session", e))?;
                    }
                    None => input_open = false,
                }
            }

            _ = resizes.recv() => {
                if let Some(size) = terminal::current_size()
                    && master.window_size().ok() != Some(size)
                {
                    tracing::trace!(cols = size.cols, rows = size.rows, "forwarding resize");
                    if let Err(e) = master.resize(size) {
                        tracing::debug!(error = %e, "resize failed");
                    }
                }
            }
        }
    }

    drop(raw);
    let status = child.wait().await?;
    tracing::info!(%status, "interactive session ended");
    Ok(status)
}
